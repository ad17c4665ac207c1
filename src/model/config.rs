use anyhow::{Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULTS: &str = include_str!("../../config/default.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub chains: ChainsConfig,
    pub rpc: RpcConfig,
    pub logs: LogsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    pub data_dir: String,
    pub state_file: String,
    pub log_filter: String,
    pub operation_history: usize,
    pub watch_state: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainsConfig {
    pub default_enabled: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    pub validate_urls: bool,
    pub allowed_schemes: Vec<String>,
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogsConfig {
    pub snippet_lines: usize,
}

impl AppConfig {
    /// Load configuration with layering: defaults → user config.
    pub fn load() -> Result<Self> {
        let user_path = directories::ProjectDirs::from("", "", "cypherpunk")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .filter(|path| path.exists());

        let mut config = match user_path {
            Some(path) => Self::layered(&fs::read_to_string(&path)?)?,
            None => Self::defaults()?,
        };

        config.resolve_data_dir()?;
        Ok(config)
    }

    pub fn defaults() -> Result<Self> {
        Ok(toml::from_str(DEFAULTS)?)
    }

    /// Defaults with `user` merged over them table by table.
    pub fn layered(user: &str) -> Result<Self> {
        let mut base: toml::Value = toml::from_str(DEFAULTS)?;
        let overlay: toml::Value = toml::from_str(user)?;
        merge(&mut base, overlay);
        Ok(base.try_into()?)
    }

    /// Config rooted at an explicit data directory. Used by tests and `--data-dir`.
    pub fn with_data_dir(mut self, dir: &Path) -> Self {
        self.general.data_dir = dir.to_string_lossy().into_owned();
        self
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.general.data_dir)
    }

    pub fn state_path(&self) -> PathBuf {
        self.data_dir().join(&self.general.state_file)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir().join("logs")
    }

    fn resolve_data_dir(&mut self) -> Result<()> {
        if self.general.data_dir.is_empty() {
            self.general.data_dir = directories::ProjectDirs::from("", "", "cypherpunk")
                .map(|dirs| dirs.data_dir().to_string_lossy().into_owned())
                .unwrap_or_else(|| ".cypherpunk".to_string());
            return Ok(());
        }

        // Expand ~ in data_dir
        if self.general.data_dir.starts_with('~') {
            let home = dirs_home().ok_or_else(|| anyhow!("cannot determine home directory"))?;
            self.general.data_dir = self
                .general
                .data_dir
                .replacen('~', &home.to_string_lossy(), 1);
        }

        Ok(())
    }
}

fn merge(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}
