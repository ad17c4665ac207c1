use chrono::{SecondsFormat, Utc};
use ignore::WalkBuilder;
use regex::Regex;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::LazyLock;

use crate::error::Result;

pub const SYSTEM_SOURCE: &str = "system";

static LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[(DEBUG|INFO|WARN|ERROR)\]\s+(\S+)\s+([^:]+):\s?(.*)$").expect("valid log line regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_uppercase().as_str() {
            "DEBUG" => Some(LogLevel::Debug),
            "INFO" => Some(LogLevel::Info),
            "WARN" | "WARNING" => Some(LogLevel::Warn),
            "ERROR" => Some(LogLevel::Error),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub timestamp: String,
    pub origin: String,
    pub message: String,
}

impl LogEntry {
    pub fn parse(line: &str) -> Self {
        match LINE_RE.captures(line) {
            Some(caps) => Self {
                level: LogLevel::parse(&caps[1]).unwrap_or(LogLevel::Info),
                timestamp: caps[2].to_string(),
                origin: caps[3].trim().to_string(),
                message: caps[4].to_string(),
            },
            // keep foreign lines visible rather than dropping them
            None => Self {
                level: LogLevel::Info,
                timestamp: String::new(),
                origin: String::new(),
                message: line.to_string(),
            },
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.timestamp.is_empty() && self.origin.is_empty() {
            return f.write_str(&self.message);
        }
        write!(
            f,
            "[{}] {} {}: {}",
            self.level.label(),
            self.timestamp,
            self.origin,
            self.message
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub text: Option<String>,
    pub min_level: Option<LogLevel>,
}

impl LogFilter {
    fn matches(&self, entry: &LogEntry, raw: &str) -> bool {
        let text_ok = self
            .text
            .as_deref()
            .is_none_or(|text| raw.to_lowercase().contains(&text.to_lowercase()));
        let level_ok = self.min_level.is_none_or(|min| entry.level >= min);
        text_ok && level_ok
    }
}

/// One append-only file per log source under a single directory.
#[derive(Debug, Clone)]
pub struct LogStore {
    dir: PathBuf,
}

impl LogStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path(&self, source: &str) -> PathBuf {
        self.dir.join(format!("{}.log", sanitize_source(source)))
    }

    pub fn append(&self, source: &str, level: LogLevel, origin: &str, message: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(source))?;

        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        writeln!(file, "[{}] {timestamp} {origin}: {message}", level.label())?;
        Ok(())
    }

    pub fn sources(&self) -> Vec<String> {
        if !self.dir.is_dir() {
            return Vec::new();
        }

        let mut sources: Vec<String> = WalkBuilder::new(&self.dir)
            .max_depth(Some(1))
            .standard_filters(false)
            .build()
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                if !path.is_file() || path.extension().and_then(|ext| ext.to_str()) != Some("log") {
                    return None;
                }
                path.file_stem()?.to_str().map(str::to_string)
            })
            .collect();

        sources.sort();
        sources
    }

    pub fn read(&self, source: &str, filter: &LogFilter) -> Result<Vec<LogEntry>> {
        let path = self.path(source);
        if !path.exists() {
            return Ok(vec![LogEntry {
                level: LogLevel::Info,
                timestamp: String::new(),
                origin: String::new(),
                message: format!("[INFO] No specific logs for {source}."),
            }]);
        }

        let raw = fs::read_to_string(path)?;
        Ok(raw
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| {
                let entry = LogEntry::parse(line);
                filter.matches(&entry, line).then_some(entry)
            })
            .collect())
    }

    /// Last `n` entries, for inline snippets.
    pub fn tail(&self, source: &str, n: usize) -> Result<Vec<LogEntry>> {
        let mut entries = self.read(source, &LogFilter::default())?;
        let skip = entries.len().saturating_sub(n);
        Ok(entries.split_off(skip))
    }
}

fn sanitize_source(source: &str) -> String {
    let cleaned: String = source
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        SYSTEM_SOURCE.to_string()
    } else {
        trimmed.to_string()
    }
}
