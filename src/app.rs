use std::collections::VecDeque;
use std::path::Path;
use std::time::{Duration, Instant, SystemTime};

use anyhow::{Result, anyhow, bail};

use crate::logs::{LogFilter, LogLevel};
use crate::model::chain::ChainDefinition;
use crate::model::config::AppConfig;
use crate::model::status::{ChainConfig, ConnectionType};
use crate::msg::Msg;
use crate::plugin::PluginManager;
use crate::plugin::manifest::{AppDefinition, MainCategory};
use crate::plugin::runtime::LifecycleAction;

/// Watcher events this soon after our own write are echoes of it.
const OWN_SAVE_WINDOW: Duration = Duration::from_millis(1200);

const HELP: &[&str] = &[
    "commands:",
    "  status",
    "  chains | chains.all | chains.enable [<id>...]",
    "  chain <id>",
    "  chain <id> use plugin|external",
    "  chain <id> select <plugin>",
    "  chain <id> rpc <url> | chain <id> rpc.test",
    "  chain <id> plugin install|uninstall|start|stop",
    "  apps [query] [--main chain|app|theme] [--category <name>]",
    "  apps.installed | apps.categories [--main chain|app|theme]",
    "  app <id> | app <id> install|uninstall|start|stop",
    "  logs | logs <source> [filter] [--level debug|info|warn|error]",
    "  ops | reload | quit (alias: q)",
    "  quote arguments with spaces: apps \"self hosted\"",
];

pub struct App {
    pub config: AppConfig,
    pub manager: PluginManager,
    pub should_quit: bool,
    notifications: VecDeque<String>,
    last_saved: Option<Instant>,
}

impl App {
    pub fn new(config: AppConfig) -> Result<Self> {
        let manager = PluginManager::open(&config)?;
        let mut app = Self {
            config,
            manager,
            should_quit: false,
            notifications: VecDeque::new(),
            last_saved: None,
        };

        let summary = app.manager.summary();
        app.push_notification(format!(
            "cypherpunk: {} chains enabled, {} apps installed. type 'help' for commands",
            summary.enabled_chains, summary.installed_apps
        ));
        Ok(app)
    }

    // ── Update ──────────────────────────────────────────────────

    pub fn update(&mut self, msg: Msg) {
        match msg {
            Msg::Command(line) => self.handle_command(&line),
            Msg::StateChanged(path) => self.handle_state_changed(&path),
            Msg::Quit => self.should_quit = true,
        }
    }

    pub fn take_notifications(&mut self) -> Vec<String> {
        self.notifications.drain(..).collect()
    }

    fn push_notification(&mut self, message: String) {
        self.notifications.push_back(message);
    }

    fn handle_command(&mut self, line: &str) {
        let args = split_command_input(line);
        let Some((head, rest)) = args.split_first() else {
            return;
        };

        let before = self.state_mtime();
        let result: Result<Vec<String>> = match head.as_str() {
            "help" | "?" => Ok(HELP.iter().map(|line| line.to_string()).collect()),
            "status" => Ok(self.status_lines()),
            "chains" => Ok(self.chain_lines()),
            "chains.all" => Ok(self.all_chain_lines()),
            "chains.enable" => self.enable_chains(rest),
            "chain" => self.chain_command(rest),
            "apps" => self.apps_command(rest),
            "apps.installed" => Ok(self.installed_app_lines()),
            "apps.categories" => self.category_lines(rest),
            "app" => self.app_command(rest),
            "logs" => self.logs_command(rest),
            "ops" => Ok(self.operation_lines()),
            "reload" => self.reload(),
            "quit" | "q" => {
                self.should_quit = true;
                Ok(Vec::new())
            }
            other => Err(anyhow!("unknown command '{other}', try 'help'")),
        };

        if self.state_mtime() != before {
            self.last_saved = Some(Instant::now());
        }

        match result {
            Ok(notes) => {
                for note in notes {
                    self.push_notification(note);
                }
            }
            Err(err) => {
                tracing::debug!(command = %line, "command failed: {err}");
                self.push_notification(format!("error: {err}"));
            }
        }
    }

    fn handle_state_changed(&mut self, path: &Path) {
        if !same_file_path(path, self.manager.state_path()) {
            return;
        }

        if self
            .last_saved
            .is_some_and(|saved_at| saved_at.elapsed() <= OWN_SAVE_WINDOW)
        {
            return;
        }

        match self.manager.reload() {
            Ok(()) => {
                tracing::info!(path = %path.display(), "state reloaded after external change");
                self.push_notification("state: reloaded from disk".to_string());
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), "state reload failed: {err}");
                self.push_notification(format!("state: reload failed: {err}"));
            }
        }
    }

    fn reload(&mut self) -> Result<Vec<String>> {
        self.manager.reload()?;
        let mut notes = vec!["state: reloaded".to_string()];
        notes.extend(self.status_lines());
        Ok(notes)
    }

    fn state_mtime(&self) -> Option<SystemTime> {
        std::fs::metadata(self.manager.state_path())
            .and_then(|meta| meta.modified())
            .ok()
    }

    // ── Chains ──────────────────────────────────────────────────

    fn status_lines(&self) -> Vec<String> {
        let summary = self.manager.summary();
        vec![
            format!(
                "chains: {} enabled ({} plugin, {} external, {} unconfigured)",
                summary.enabled_chains,
                summary.plugin_chains,
                summary.external_chains,
                summary.unconfigured_chains
            ),
            format!("nodes: {} running", summary.running_nodes),
            format!("apps: {} installed", summary.installed_apps),
            format!(
                "errors: {} apps, {} chains",
                summary.errors, summary.chain_errors
            ),
        ]
    }

    fn chain_lines(&self) -> Vec<String> {
        let chains = self.manager.managed_chains();
        if chains.is_empty() {
            return vec!["chains: none enabled, see 'chains.all'".to_string()];
        }
        chains
            .iter()
            .map(|(chain, config)| chain_line(chain, config))
            .collect()
    }

    fn all_chain_lines(&self) -> Vec<String> {
        self.manager
            .catalog()
            .chains()
            .iter()
            .map(|chain| {
                let marker = if self.manager.is_enabled(chain.id.as_str()) {
                    "[x]"
                } else {
                    "[ ]"
                };
                let support = if chain.supports_local_node {
                    "local node"
                } else {
                    "external only"
                };
                format!(
                    "{marker} {:<11} {} {:<16} {support}",
                    chain.id.as_str(),
                    chain.layer.label(),
                    chain.name
                )
            })
            .collect()
    }

    fn enable_chains(&mut self, ids: &[String]) -> Result<Vec<String>> {
        let enabled = if ids.is_empty() {
            self.manager.enabled_chain_ids()
        } else {
            self.manager.set_enabled_chains(ids.iter().map(String::as_str))?
        };
        let listed = enabled
            .iter()
            .map(|id| id.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Ok(vec![format!("chains: managing {listed}")])
    }

    fn chain_command(&mut self, args: &[String]) -> Result<Vec<String>> {
        let Some((id, rest)) = args.split_first() else {
            bail!("usage: chain <id> [use|select|rpc|rpc.test|plugin] ...");
        };
        let id = id.as_str();
        let rest: Vec<&str> = rest.iter().map(String::as_str).collect();

        let config = match rest.as_slice() {
            [] => return self.chain_details(id),
            ["use", target] => {
                let target = ConnectionType::parse_target(target)
                    .ok_or_else(|| anyhow!("use: expected plugin or external, got '{target}'"))?;
                self.manager.set_connection_type(id, target)?
            }
            ["select", plugin] => self.manager.select_plugin(id, plugin)?,
            ["rpc", url] => self.manager.save_rpc_url(id, url)?,
            ["rpc.test"] => self.manager.test_rpc(id)?,
            ["plugin", action] => {
                let action = parse_action(action)?;
                let operation = self.manager.plugin_action(id, action)?;
                let config = self.manager.chain_config(id)?;
                let chain = self.manager.catalog().chain(id)?;
                return Ok(vec![operation.to_string(), chain_line(chain, &config)]);
            }
            _ => bail!("usage: chain <id> [use|select|rpc|rpc.test|plugin] ..."),
        };

        let chain = self.manager.catalog().chain(id)?;
        Ok(vec![chain_line(chain, &config)])
    }

    fn chain_details(&self, id: &str) -> Result<Vec<String>> {
        let config = self.manager.chain_config(id)?;
        let chain = self.manager.catalog().chain(id)?;

        let mut lines = vec![
            format!("{} ({}, {})", chain.name, chain.id, chain.layer.label()),
            format!("  {}", chain.description),
            format!("  connection: {}", config.connection_type.label()),
            format!("  status: {}", config.status),
            format!("  rpc: {}", config.external_rpc_url),
        ];
        if let Some(native) = &chain.native_plugin_id {
            lines.push(format!("  native plugin: {native}"));
        }
        if let Some(plugin) = &config.plugin_details {
            lines.push(format!(
                "  plugin: {} v{} by {}",
                plugin.name, plugin.version, plugin.developer
            ));
        }

        if !chain.supports_local_node {
            lines.push("  plugins: external RPC only".to_string());
        } else if config.available_plugins.is_empty() {
            lines.push("  plugins: none in catalog".to_string());
        }
        for plugin in &config.available_plugins {
            let marker = if config.selected_plugin_id.as_ref() == Some(&plugin.id) {
                "*"
            } else {
                " "
            };
            lines.push(format!(
                "  {marker} {:<22} {:<14} {}",
                plugin.id.as_str(),
                plugin.name,
                app_state(plugin)
            ));
        }

        if let Some(explorer) = &chain.block_explorer_url {
            lines.push(format!("  explorer: {explorer}"));
        }

        lines.extend(self.log_snippet(id)?);
        Ok(lines)
    }

    // ── Apps ────────────────────────────────────────────────────

    fn apps_command(&self, args: &[String]) -> Result<Vec<String>> {
        let mut args = args.to_vec();
        let main = parse_main_flag(&mut args)?;
        let category = take_flag(&mut args, "--category")?;
        let query = args.join(" ");

        let hits = self
            .manager
            .catalog()
            .search(&query, main, category.as_deref());
        if hits.is_empty() {
            return Ok(vec!["apps: no matches".to_string()]);
        }
        Ok(hits.into_iter().map(app_line).collect())
    }

    fn category_lines(&self, args: &[String]) -> Result<Vec<String>> {
        let mut args = args.to_vec();
        let main = parse_main_flag(&mut args)?;
        let categories = self.manager.catalog().sub_categories(main);
        Ok(vec![format!("categories: {}", categories.join(", "))])
    }

    fn installed_app_lines(&self) -> Vec<String> {
        let installed = self.manager.catalog().installed_apps();
        if installed.is_empty() {
            return vec!["apps: nothing installed".to_string()];
        }
        installed.into_iter().map(app_line).collect()
    }

    fn app_command(&mut self, args: &[String]) -> Result<Vec<String>> {
        match args {
            [id] => self.app_details(id),
            [id, action] => {
                let action = parse_action(action)?;
                let operation = self.manager.app_action(id, action)?;
                let app = self.manager.catalog().app(id)?;
                Ok(vec![operation.to_string(), app_line(app)])
            }
            _ => bail!("usage: app <id> [install|uninstall|start|stop]"),
        }
    }

    fn app_details(&self, id: &str) -> Result<Vec<String>> {
        let app = self.manager.catalog().app(id)?;

        let mut lines = vec![
            format!("{} ({})", app.display_name(), app.id),
            format!(
                "  {} / {}  v{} by {}",
                app.main_category.label(),
                app.category,
                app.version,
                app.developer
            ),
            format!("  state: {}", app_state(app)),
            format!("  {}", app.description),
        ];
        if !app.long_description.is_empty() {
            lines.push(format!("  {}", app.long_description));
        }
        if let Some(url) = &app.rpc_url {
            lines.push(format!("  rpc: {url}"));
        }
        if let Some(port) = app.port {
            lines.push(format!("  port: {port}"));
        }
        if !app.dependencies.is_empty() {
            lines.push(format!("  depends on: {}", app.dependencies.join(", ")));
        }
        if !app.supported_networks.is_empty() {
            let active = app.active_network.as_deref().unwrap_or("-");
            lines.push(format!(
                "  networks: {} (active: {active})",
                app.supported_networks.join(", ")
            ));
        }
        for (label, link) in [("repo", &app.repo), ("website", &app.website)] {
            if let Some(link) = link {
                lines.push(format!("  {label}: {link}"));
            }
        }

        lines.extend(self.log_snippet(id)?);
        Ok(lines)
    }

    // ── Logs & operations ───────────────────────────────────────

    fn logs_command(&self, args: &[String]) -> Result<Vec<String>> {
        let mut args = args.to_vec();
        let min_level = take_flag(&mut args, "--level")?
            .map(|raw| LogLevel::parse(&raw).ok_or_else(|| anyhow!("unknown log level '{raw}'")))
            .transpose()?;

        let Some((source, rest)) = args.split_first() else {
            let sources = self.manager.logs().sources();
            if sources.is_empty() {
                return Ok(vec!["logs: nothing recorded yet".to_string()]);
            }
            return Ok(vec![format!("logs: {}", sources.join(", "))]);
        };

        let filter = LogFilter {
            text: (!rest.is_empty()).then(|| rest.join(" ")),
            min_level,
        };
        let entries = self.manager.logs().read(source, &filter)?;
        if entries.is_empty() {
            return Ok(vec![format!("logs: no entries in {source} match")]);
        }
        Ok(entries.iter().map(ToString::to_string).collect())
    }

    fn log_snippet(&self, source: &str) -> Result<Vec<String>> {
        let entries = self
            .manager
            .logs()
            .tail(source, self.config.logs.snippet_lines)?;
        let mut lines = vec!["  recent logs:".to_string()];
        lines.extend(entries.iter().map(|entry| format!("    {entry}")));
        Ok(lines)
    }

    fn operation_lines(&self) -> Vec<String> {
        let lines: Vec<String> = self.manager.operations().map(ToString::to_string).collect();
        if lines.is_empty() {
            return vec!["ops: none yet".to_string()];
        }
        lines
    }
}

fn chain_line(chain: &ChainDefinition, config: &ChainConfig) -> String {
    format!(
        "{:<11} {} {:<16} {:<8} {}",
        config.chain_id.as_str(),
        chain.layer.label(),
        chain.name,
        config.connection_type.label(),
        config.status_text()
    )
}

fn app_line(app: &AppDefinition) -> String {
    format!(
        "{:<34} {:<30} {:<16} {}",
        app.id.as_str(),
        app.display_name(),
        app.category,
        app_state(app)
    )
}

fn app_state(app: &AppDefinition) -> &'static str {
    if !app.installed {
        "not installed"
    } else if app.has_error {
        "error"
    } else if app.running {
        "running"
    } else {
        "stopped"
    }
}

fn parse_action(raw: &str) -> Result<LifecycleAction> {
    LifecycleAction::parse(raw)
        .ok_or_else(|| anyhow!("expected install, uninstall, start or stop, got '{raw}'"))
}

fn parse_main_flag(args: &mut Vec<String>) -> Result<Option<MainCategory>> {
    take_flag(args, "--main")?
        .map(|raw| MainCategory::parse(&raw).ok_or_else(|| anyhow!("unknown main category '{raw}'")))
        .transpose()
}

/// Remove `name <value>` from `args`, returning the value.
fn take_flag(args: &mut Vec<String>, name: &str) -> Result<Option<String>> {
    let Some(idx) = args.iter().position(|arg| arg == name) else {
        return Ok(None);
    };
    if idx + 1 >= args.len() {
        bail!("{name} needs a value");
    }
    let value = args.remove(idx + 1);
    args.remove(idx);
    Ok(Some(value))
}

/// Split a command line into arguments. Quotes group words and a backslash
/// escapes the next character, inside or outside quotes.
fn split_command_input(raw: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut in_arg = false;

    for ch in raw.trim().chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }

        match (quote, ch) {
            (_, '\\') => {
                escaped = true;
                in_arg = true;
            }
            (Some(open), ch) if ch == open => quote = None,
            (Some(_), ch) => current.push(ch),
            (None, '"' | '\'') => {
                quote = Some(ch);
                in_arg = true;
            }
            (None, ch) if ch.is_whitespace() => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            (None, ch) => {
                current.push(ch);
                in_arg = true;
            }
        }
    }

    if escaped {
        current.push('\\');
    }
    if in_arg {
        args.push(current);
    }
    args
}

fn same_file_path(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }

    let a_canon = std::fs::canonicalize(a);
    let b_canon = std::fs::canonicalize(b);
    matches!((a_canon, b_canon), (Ok(ca), Ok(cb)) if ca == cb)
}
