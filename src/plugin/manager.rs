use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CypherpunkError, Result};
use crate::logs::{LogLevel, LogStore, SYSTEM_SOURCE};
use crate::model::catalog::Catalog;
use crate::model::chain::{ChainDefinition, ChainId};
use crate::model::config::{AppConfig, RpcConfig};
use crate::model::enablement::EnablementSet;
use crate::model::state::PersistedState;
use crate::model::status::{ChainConfig, ConnectionType};
use crate::plugin::installer::ConnectionInstaller;
use crate::plugin::manifest::{AppId, SourceType};
use crate::plugin::endpoint;
use crate::plugin::resolver::{self, ChainChoices};
use crate::plugin::runtime::{LifecycleAction, Operation};

const SYSTEM_ORIGIN: &str = "CypherpunkOS";

/// Counts shown on the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub enabled_chains: usize,
    pub plugin_chains: usize,
    pub external_chains: usize,
    pub unconfigured_chains: usize,
    pub running_nodes: usize,
    pub installed_apps: usize,
    pub errors: usize,
    pub chain_errors: usize,
}

/// Single owner of the catalog and every user choice layered on it.
///
/// All writes go through here and are persisted before returning.
#[derive(Debug)]
pub struct PluginManager {
    catalog: Catalog,
    enabled: EnablementSet,
    selections: BTreeMap<ChainId, AppId>,
    staged_rpc: BTreeMap<ChainId, String>,
    operations: VecDeque<Operation>,
    next_operation: u64,
    history_limit: usize,
    state_path: PathBuf,
    default_enabled: Vec<String>,
    rpc: RpcConfig,
    logs: LogStore,
}

impl PluginManager {
    pub fn open(config: &AppConfig) -> Result<Self> {
        let mut manager = Self {
            catalog: Catalog::builtin()?,
            enabled: EnablementSet::new(config.chains.default_enabled.iter().cloned()),
            selections: BTreeMap::new(),
            staged_rpc: BTreeMap::new(),
            operations: VecDeque::new(),
            next_operation: 1,
            history_limit: config.general.operation_history.max(1),
            state_path: config.state_path(),
            default_enabled: config.chains.default_enabled.clone(),
            rpc: config.rpc.clone(),
            logs: LogStore::new(config.logs_dir()),
        };

        manager.load_state()?;
        tracing::info!(
            chains = manager.catalog.chains().len(),
            apps = manager.catalog.apps().len(),
            enabled = manager.enabled.len(),
            "catalog loaded"
        );
        Ok(manager)
    }

    /// Re-read persisted state over a fresh seed.
    pub fn reload(&mut self) -> Result<()> {
        self.catalog = Catalog::builtin()?;
        self.enabled = EnablementSet::new(self.default_enabled.iter().cloned());
        self.selections.clear();
        self.staged_rpc.clear();
        self.load_state()
    }

    fn load_state(&mut self) -> Result<()> {
        let Some(state) = PersistedState::read(&self.state_path)? else {
            return Ok(());
        };

        self.catalog.overlay(state.apps);
        self.enabled = EnablementSet::new(state.enabled);
        self.selections = state.selections;
        self.staged_rpc = state.staged_rpc;
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let state = PersistedState {
            enabled: self.enabled.current().into_iter().collect(),
            selections: self.selections.clone(),
            staged_rpc: self.staged_rpc.clone(),
            apps: self.catalog.apps().to_vec(),
        };
        state.write(&self.state_path)?;
        tracing::debug!(path = %self.state_path.display(), "state saved");
        Ok(())
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn logs(&self) -> &LogStore {
        &self.logs
    }

    // ── Enablement ──────────────────────────────────────────────

    pub fn enabled_chain_ids(&self) -> BTreeSet<ChainId> {
        self.enabled.current()
    }

    pub fn is_enabled(&self, chain_id: &str) -> bool {
        self.enabled.is_enabled(chain_id)
    }

    /// Replace the enabled set. Unknown ids reject the whole request.
    pub fn set_enabled_chains<I, S>(&mut self, ids: I) -> Result<BTreeSet<ChainId>>
    where
        I: IntoIterator<Item = S>,
        S: Into<ChainId>,
    {
        let ids: BTreeSet<ChainId> = ids.into_iter().map(Into::into).collect();
        for id in &ids {
            self.catalog.chain(id.as_str())?;
        }

        self.enabled.replace(ids);
        self.save()?;

        let listed = if self.enabled.is_empty() {
            "none".to_string()
        } else {
            self.enabled
                .iter()
                .map(ChainId::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        };
        tracing::info!(enabled = %listed, "enabled chains replaced");
        self.log(
            SYSTEM_SOURCE,
            LogLevel::Info,
            SYSTEM_ORIGIN,
            &format!("Enabled chains updated: {listed}"),
        );
        Ok(self.enabled.current())
    }

    // ── Resolution ──────────────────────────────────────────────

    fn choices(&self, chain_id: &str) -> ChainChoices<'_> {
        ChainChoices {
            plugin: self.selections.get(chain_id),
            staged_rpc: self.staged_rpc.get(chain_id).map(String::as_str),
        }
    }

    /// Connection view for any known chain, enabled or not.
    pub fn preview(&self, chain_id: &str) -> Result<ChainConfig> {
        let chain = self.catalog.chain(chain_id)?;
        Ok(resolver::resolve(&self.catalog, chain, self.choices(chain_id)))
    }

    /// Connection view for a managed chain.
    pub fn chain_config(&self, chain_id: &str) -> Result<ChainConfig> {
        self.enabled_chain(chain_id)?;
        self.preview(chain_id)
    }

    /// Every enabled chain, in catalog order.
    pub fn managed_chains(&self) -> Vec<(&ChainDefinition, ChainConfig)> {
        self.catalog
            .chains()
            .iter()
            .filter(|chain| self.enabled.is_enabled(chain.id.as_str()))
            .map(|chain| {
                let config =
                    resolver::resolve(&self.catalog, chain, self.choices(chain.id.as_str()));
                (chain, config)
            })
            .collect()
    }

    fn enabled_chain(&self, chain_id: &str) -> Result<ChainDefinition> {
        let chain = self.catalog.chain(chain_id)?.clone();
        if !self.enabled.is_enabled(chain_id) {
            return Err(CypherpunkError::ChainNotEnabled(chain_id.to_string()));
        }
        Ok(chain)
    }

    // ── Connection changes ──────────────────────────────────────

    pub fn set_connection_type(
        &mut self,
        chain_id: &str,
        target: ConnectionType,
    ) -> Result<ChainConfig> {
        let chain = self.enabled_chain(chain_id)?;

        match target {
            ConnectionType::Plugin => {
                if !chain.supports_local_node {
                    return Err(CypherpunkError::conflict(format!(
                        "{} only supports external RPC",
                        chain.name
                    )));
                }
                let selected = self.preview(chain_id)?.selected_plugin_id;
                ConnectionInstaller::use_plugin(&mut self.catalog, chain_id, selected.as_ref())?;
            }
            ConnectionType::External => {
                let staged = self.staged_rpc.get(chain_id).cloned();
                let activated = ConnectionInstaller::use_external(
                    &mut self.catalog,
                    &chain,
                    staged.as_deref(),
                    now_millis(),
                )?;
                if activated.is_none() {
                    tracing::info!(chain = chain_id, "no external endpoint to activate yet");
                    return Err(CypherpunkError::validation(format!(
                        "no external RPC configured for {}; set one with 'chain {chain_id} rpc <url>'",
                        chain.name
                    )));
                }
            }
            ConnectionType::None => {
                return Err(CypherpunkError::validation(
                    "connection type must be plugin or external",
                ));
            }
        }

        self.save()?;
        tracing::info!(chain = chain_id, target = target.label(), "connection type switched");
        self.log(
            chain_id,
            LogLevel::Info,
            &chain.name,
            &format!("Connection switched to {}", target.label()),
        );
        self.preview(chain_id)
    }

    pub fn select_plugin(&mut self, chain_id: &str, plugin_id: &str) -> Result<ChainConfig> {
        self.enabled_chain(chain_id)?;
        let config = self.preview(chain_id)?;

        let Some(plugin) = config
            .available_plugins
            .iter()
            .find(|plugin| plugin.id.as_str() == plugin_id)
        else {
            return Err(CypherpunkError::NotFound {
                kind: "plugin",
                id: format!("{plugin_id} (chain {chain_id})"),
            });
        };

        self.selections
            .insert(ChainId::new(chain_id), plugin.id.clone());
        self.save()?;
        tracing::info!(chain = chain_id, plugin = plugin_id, "plugin selected");
        self.preview(chain_id)
    }

    pub fn save_rpc_url(&mut self, chain_id: &str, url: &str) -> Result<ChainConfig> {
        let chain = self.enabled_chain(chain_id)?;
        let url = url.trim();

        if self.rpc.validate_urls {
            endpoint::parse_endpoint(url, &self.rpc.allowed_schemes)?;
        } else if url.is_empty() {
            return Err(CypherpunkError::validation("RPC URL is empty"));
        }

        self.staged_rpc
            .insert(ChainId::new(chain_id), url.to_string());
        let id = ConnectionInstaller::save_rpc_url(&mut self.catalog, &chain, url, now_millis())?;

        self.save()?;
        tracing::info!(chain = chain_id, app = %id, "external RPC saved");
        self.log(
            chain_id,
            LogLevel::Info,
            &chain.name,
            &format!("External RPC set to {url}"),
        );
        self.preview(chain_id)
    }

    /// Dial the active external endpoint and record the outcome on its record.
    pub fn test_rpc(&mut self, chain_id: &str) -> Result<ChainConfig> {
        let chain = self.enabled_chain(chain_id)?;
        let config = self.preview(chain_id)?;
        let Some(external_id) = config.active_external_id else {
            return Err(CypherpunkError::NotFound {
                kind: "active external RPC",
                id: chain_id.to_string(),
            });
        };

        let url = config.external_rpc_url;
        let timeout = Duration::from_millis(self.rpc.connect_timeout_ms);
        let outcome = match endpoint::check_reachable(&url, timeout) {
            // a malformed URL was never dialed, so the record's health is unknown
            Err(CypherpunkError::Validation(reason)) => {
                self.log(
                    chain_id,
                    LogLevel::Warn,
                    &chain.name,
                    &format!("External RPC {url} is not a valid endpoint."),
                );
                return Err(CypherpunkError::Validation(reason));
            }
            other => other,
        };

        let record = self.catalog.app_mut(external_id.as_str())?;
        match &outcome {
            Ok(addr) => {
                record.running = true;
                record.has_error = false;
                tracing::info!(chain = chain_id, %addr, "external RPC reachable");
            }
            Err(err) => {
                record.running = false;
                record.has_error = true;
                tracing::warn!(chain = chain_id, url = %url, "external RPC unreachable: {err}");
            }
        }
        self.save()?;

        match outcome {
            Ok(_) => {
                self.log(chain_id, LogLevel::Info, &chain.name, &format!("Connection to {url} established."));
                self.preview(chain_id)
            }
            Err(err) => {
                self.log(
                    chain_id,
                    LogLevel::Warn,
                    &chain.name,
                    &format!("External RPC {url} is currently unreachable."),
                );
                Err(err)
            }
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────

    /// Run `action` on the chain's selected plugin.
    pub fn plugin_action(&mut self, chain_id: &str, action: LifecycleAction) -> Result<Operation> {
        self.enabled_chain(chain_id)?;
        let Some(plugin_id) = self.preview(chain_id)?.selected_plugin_id else {
            return Err(CypherpunkError::NotFound {
                kind: "plugin",
                id: format!("no plugin for chain {chain_id}"),
            });
        };
        self.app_action(plugin_id.as_str(), action)
    }

    /// Run `action` on any catalog record.
    pub fn app_action(&mut self, app_id: &str, action: LifecycleAction) -> Result<Operation> {
        let mut operation =
            Operation::pending(self.next_operation, AppId::new(app_id), action);
        self.next_operation += 1;

        let result = self.run_action(&mut operation);
        operation.settle(&result);
        self.record(operation.clone());

        let name = match result {
            Ok(name) => name,
            Err(err) => {
                tracing::warn!(app = app_id, action = action.label(), "lifecycle action failed: {err}");
                return Err(err);
            }
        };

        self.save()?;
        tracing::info!(app = app_id, action = action.label(), "lifecycle action applied");
        self.log(app_id, LogLevel::Info, &name, &format!("{} requested", action.label()));
        Ok(operation)
    }

    /// Chain-bound records follow their chain's enablement, and external
    /// endpoints only become active through the single-binding switch.
    fn run_action(&mut self, operation: &mut Operation) -> Result<String> {
        let app_id = operation.target.clone();
        let app = self.catalog.app(app_id.as_str())?;
        let name = app.name.clone();
        let bound_chain = app.plugin_for_chain_id.clone();
        let external = app.source_type == Some(SourceType::External);

        if let Some(chain_id) = &bound_chain {
            self.enabled_chain(chain_id.as_str())?;
        }

        if let (true, Some(chain_id)) = (external, &bound_chain) {
            match operation.action {
                LifecycleAction::Start => {
                    return Err(CypherpunkError::conflict(format!(
                        "{app_id} is an external endpoint; check it with 'chain {chain_id} rpc.test'"
                    )));
                }
                LifecycleAction::Install => {
                    ConnectionInstaller::activate_external(
                        &mut self.catalog,
                        chain_id.as_str(),
                        &app_id,
                    )?;
                    return Ok(name);
                }
                LifecycleAction::Uninstall | LifecycleAction::Stop => {}
            }
        }

        operation.run(self.catalog.app_mut(app_id.as_str())?)?;
        Ok(name)
    }

    fn record(&mut self, operation: Operation) {
        self.operations.push_back(operation);
        while self.operations.len() > self.history_limit {
            self.operations.pop_front();
        }
    }

    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter()
    }

    // ── Dashboard ───────────────────────────────────────────────

    pub fn summary(&self) -> Summary {
        let mut summary = Summary {
            enabled_chains: self.enabled.len(),
            installed_apps: self.catalog.installed_apps().len(),
            ..Default::default()
        };

        for (_, config) in self.managed_chains() {
            if config.status.is_error() {
                summary.chain_errors += 1;
            }
            match config.connection_type {
                ConnectionType::Plugin => summary.plugin_chains += 1,
                ConnectionType::External => summary.external_chains += 1,
                ConnectionType::None => summary.unconfigured_chains += 1,
            }
        }

        summary.running_nodes = self
            .catalog
            .local_node_plugins()
            .into_iter()
            .filter(|plugin| plugin.installed && plugin.running)
            .count();
        summary.errors = self
            .catalog
            .apps_where(|app| app.installed && app.has_error)
            .count();
        summary
    }

    /// Log-store write failures are reported, never fatal to the action that caused them.
    fn log(&self, source: &str, level: LogLevel, origin: &str, message: &str) {
        if let Err(err) = self.logs.append(source, level, origin, message) {
            tracing::warn!(source, "failed to append log line: {err}");
        }
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::LogFilter;
    use crate::model::status::ChainStatus;
    use crate::plugin::runtime::OperationState;
    use std::net::TcpListener;

    fn open(dir: &Path) -> PluginManager {
        let config = AppConfig::defaults().unwrap().with_data_dir(dir);
        PluginManager::open(&config).unwrap()
    }

    #[test]
    fn defaults_without_state_file() {
        let dir = tempfile::tempdir().unwrap();
        let manager = open(dir.path());

        let ids: Vec<_> = manager
            .enabled_chain_ids()
            .into_iter()
            .map(|id| id.0)
            .collect();
        assert_eq!(ids, vec!["arbitrum", "base", "ethereum"]);
        assert!(!manager.state_path().exists());
    }

    #[test]
    fn arbitrum_scenario_resolves_to_external_error() {
        let dir = tempfile::tempdir().unwrap();
        let manager = open(dir.path());

        let config = manager.chain_config("arbitrum").unwrap();
        assert_eq!(config.connection_type, ConnectionType::External);
        assert_eq!(config.status, ChainStatus::ExternalError);
        assert!(config.status_text().contains("Error"));
    }

    #[test]
    fn disabled_chains_are_gated() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = open(dir.path());

        assert!(matches!(
            manager.chain_config("optimism"),
            Err(CypherpunkError::ChainNotEnabled(_))
        ));
        assert!(matches!(
            manager.set_connection_type("optimism", ConnectionType::External),
            Err(CypherpunkError::ChainNotEnabled(_))
        ));
        assert!(manager.preview("optimism").is_ok());
    }

    #[test]
    fn switching_to_plugin_leaves_no_active_external() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = open(dir.path());

        let config = manager
            .set_connection_type("arbitrum", ConnectionType::Plugin)
            .unwrap();

        assert_eq!(config.connection_type, ConnectionType::Plugin);
        assert_eq!(
            manager
                .catalog()
                .externals_for_chain("arbitrum")
                .filter(|app| app.installed)
                .count(),
            0
        );
        assert_eq!(config.status, ChainStatus::Stopped("Arbitrum One".to_string()));
    }

    #[test]
    fn plugin_switch_is_refused_on_external_only_chains() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = open(dir.path());
        manager
            .set_enabled_chains(["ethereum", "optimism"])
            .unwrap();

        assert!(matches!(
            manager.set_connection_type("optimism", ConnectionType::Plugin),
            Err(CypherpunkError::Conflict(_))
        ));
    }

    #[test]
    fn uninstall_via_chain_clears_both_flags() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = open(dir.path());

        let op = manager
            .plugin_action("base", LifecycleAction::Uninstall)
            .unwrap();
        assert_eq!(op.state, OperationState::Succeeded);

        let plugin = manager.catalog().app("l2-base-plugin").unwrap();
        assert!(!plugin.installed);
        assert!(!plugin.running);
    }

    #[test]
    fn failed_actions_are_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = open(dir.path());

        assert!(
            manager
                .app_action("cypherpunk-wallet", LifecycleAction::Uninstall)
                .is_err()
        );
        assert!(
            manager
                .app_action("missing", LifecycleAction::Start)
                .is_err()
        );

        let states: Vec<_> = manager.operations().map(|op| op.state.clone()).collect();
        assert_eq!(states.len(), 2);
        assert!(
            states
                .iter()
                .all(|state| matches!(state, OperationState::Failed(_)))
        );
    }

    #[test]
    fn operation_history_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::layered("[general]\noperation_history = 2")
            .unwrap()
            .with_data_dir(dir.path());
        let mut manager = PluginManager::open(&config).unwrap();

        for _ in 0..5 {
            manager
                .app_action("aave-interface", LifecycleAction::Install)
                .unwrap();
        }

        let ids: Vec<_> = manager.operations().map(|op| op.id).collect();
        assert_eq!(ids, vec![4, 5]);
    }

    #[test]
    fn enablement_rejects_unknown_chains_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = open(dir.path());
        let before = manager.enabled_chain_ids();

        assert!(matches!(
            manager.set_enabled_chains(["base", "dogecoin"]),
            Err(CypherpunkError::NotFound { kind: "chain", .. })
        ));
        assert_eq!(manager.enabled_chain_ids(), before);
    }

    #[test]
    fn enablement_copy_is_detached() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = open(dir.path());
        manager.set_enabled_chains(["base"]).unwrap();

        let mut copy = manager.enabled_chain_ids();
        copy.insert(ChainId::new("linea"));

        assert!(!manager.is_enabled("linea"));
        assert_eq!(manager.managed_chains().len(), 1);
    }

    #[test]
    fn save_rpc_url_validates_and_activates() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = open(dir.path());

        assert!(matches!(
            manager.save_rpc_url("base", "mainnet.base.org"),
            Err(CypherpunkError::Validation(_))
        ));

        let config = manager
            .save_rpc_url("base", "https://base.example/rpc")
            .unwrap();
        assert_eq!(config.connection_type, ConnectionType::External);
        assert_eq!(config.external_rpc_url, "https://base.example/rpc");
        assert_eq!(config.status, ChainStatus::ExternalConfigured);
        assert_eq!(manager.catalog().apps().len(), 12);

        // back to the plugin, then external again reuses the same record
        manager
            .set_connection_type("base", ConnectionType::Plugin)
            .unwrap();
        let config = manager
            .set_connection_type("base", ConnectionType::External)
            .unwrap();
        assert_eq!(config.connection_type, ConnectionType::External);
        assert_eq!(manager.catalog().apps().len(), 12);
    }

    #[test]
    fn select_plugin_requires_a_chain_plugin() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = open(dir.path());

        assert!(matches!(
            manager.select_plugin("base", "nodeset"),
            Err(CypherpunkError::NotFound { kind: "plugin", .. })
        ));

        let config = manager.select_plugin("base", "l2-base-plugin").unwrap();
        assert_eq!(
            config.selected_plugin_id,
            Some(AppId::new("l2-base-plugin"))
        );
    }

    #[test]
    fn state_survives_a_restart() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut manager = open(dir.path());
            manager
                .set_enabled_chains(["ethereum", "linea"])
                .unwrap();
            manager
                .save_rpc_url("linea", "https://linea.example")
                .unwrap();
            manager
                .plugin_action("ethereum", LifecycleAction::Stop)
                .unwrap();
        }

        let manager = open(dir.path());
        assert!(manager.is_enabled("linea"));
        assert!(!manager.is_enabled("base"));
        assert!(!manager.catalog().app("nodeset").unwrap().running);

        let config = manager.chain_config("linea").unwrap();
        assert_eq!(config.connection_type, ConnectionType::External);
        assert_eq!(config.external_rpc_url, "https://linea.example");
    }

    #[test]
    fn reload_picks_up_foreign_writes() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = open(dir.path());
        let mut second = open(dir.path());

        second
            .app_action("aave-interface", LifecycleAction::Install)
            .unwrap();
        assert!(!first.catalog().app("aave-interface").unwrap().installed);

        first.reload().unwrap();
        assert!(first.catalog().app("aave-interface").unwrap().installed);
    }

    #[test]
    fn rpc_test_marks_reachable_endpoints_connected() {
        let dir = tempfile::tempdir().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut manager = open(dir.path());

        manager
            .save_rpc_url("arbitrum", &format!("http://127.0.0.1:{port}"))
            .unwrap();
        let config = manager.test_rpc("arbitrum").unwrap();

        assert_eq!(config.status, ChainStatus::ExternalConnected);
    }

    #[test]
    fn rpc_test_marks_unreachable_endpoints_errored() {
        let dir = tempfile::tempdir().unwrap();
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let mut manager = open(dir.path());

        manager
            .save_rpc_url("arbitrum", &format!("http://127.0.0.1:{port}"))
            .unwrap();
        assert!(matches!(
            manager.test_rpc("arbitrum"),
            Err(CypherpunkError::ConnectionRefused { .. })
        ));
        assert_eq!(
            manager.chain_config("arbitrum").unwrap().status,
            ChainStatus::ExternalError
        );
    }

    #[test]
    fn rpc_test_without_external_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = open(dir.path());
        assert!(matches!(
            manager.test_rpc("base"),
            Err(CypherpunkError::NotFound { .. })
        ));
    }

    #[test]
    fn actions_write_log_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = open(dir.path());
        manager
            .plugin_action("base", LifecycleAction::Stop)
            .unwrap();

        let entries = manager
            .logs()
            .read("l2-base-plugin", &LogFilter::default())
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].origin, "Base");
        assert!(entries[0].message.contains("stop"));
    }

    #[test]
    fn summary_counts_the_seed() {
        let dir = tempfile::tempdir().unwrap();
        let manager = open(dir.path());
        let summary = manager.summary();

        assert_eq!(summary.enabled_chains, 3);
        assert_eq!(summary.plugin_chains, 2);
        assert_eq!(summary.external_chains, 1);
        assert_eq!(summary.running_nodes, 2);
        assert_eq!(summary.installed_apps, 2);
        // arbitrum external + tornado cash
        assert_eq!(summary.errors, 2);
        assert_eq!(summary.chain_errors, 1);
    }

    #[test]
    fn unknown_targets_settle_as_failed() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = open(dir.path());

        assert!(matches!(
            manager.app_action("missing", LifecycleAction::Start),
            Err(CypherpunkError::NotFound { kind: "app", .. })
        ));

        let last = manager.operations().last().unwrap();
        assert_eq!(
            last.state,
            OperationState::Failed("app not found: missing".to_string())
        );
        assert_eq!(last.to_string(), "#1 start missing [failed: app not found: missing]");
    }

    #[test]
    fn leaving_an_external_clears_its_connection() {
        let dir = tempfile::tempdir().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut manager = open(dir.path());

        manager
            .save_rpc_url("arbitrum", &format!("http://127.0.0.1:{port}"))
            .unwrap();
        manager.test_rpc("arbitrum").unwrap();
        manager
            .set_connection_type("arbitrum", ConnectionType::Plugin)
            .unwrap();
        assert!(
            manager
                .catalog()
                .apps()
                .iter()
                .all(|app| !app.running || app.installed)
        );

        drop(listener);
        let config = manager
            .set_connection_type("arbitrum", ConnectionType::External)
            .unwrap();
        assert_eq!(config.status, ChainStatus::ExternalConfigured);
    }

    #[test]
    fn bound_records_follow_chain_enablement() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = open(dir.path());
        manager.set_enabled_chains(["ethereum"]).unwrap();

        assert!(matches!(
            manager.app_action("external-arb-l2-custom", LifecycleAction::Start),
            Err(CypherpunkError::ChainNotEnabled(_))
        ));
        assert!(matches!(
            manager.app_action("l2-arbitrum-plugin", LifecycleAction::Install),
            Err(CypherpunkError::ChainNotEnabled(_))
        ));
        assert!(matches!(
            manager.operations().last().unwrap().state,
            OperationState::Failed(_)
        ));
        assert_eq!(
            manager.preview("arbitrum").unwrap().status,
            ChainStatus::ExternalError
        );
        assert!(!manager.catalog().app("l2-arbitrum-plugin").unwrap().installed);
    }

    #[test]
    fn external_endpoints_cannot_be_started_directly() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = open(dir.path());

        assert!(matches!(
            manager.app_action("external-arb-l2-custom", LifecycleAction::Start),
            Err(CypherpunkError::Conflict(_))
        ));
        assert!(!manager.catalog().app("external-arb-l2-custom").unwrap().running);
    }

    #[test]
    fn installing_an_external_switches_the_chain_binding() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = open(dir.path());
        manager
            .set_connection_type("arbitrum", ConnectionType::Plugin)
            .unwrap();

        let op = manager
            .app_action("external-arb-l2-custom", LifecycleAction::Install)
            .unwrap();
        assert_eq!(op.state, OperationState::Succeeded);

        let config = manager.chain_config("arbitrum").unwrap();
        assert_eq!(config.connection_type, ConnectionType::External);
        assert_eq!(
            config.active_external_id,
            Some(AppId::new("external-arb-l2-custom"))
        );
        assert_eq!(
            manager
                .catalog()
                .externals_for_chain("arbitrum")
                .filter(|app| app.installed)
                .count(),
            1
        );
    }

    #[test]
    fn switching_to_external_needs_an_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = open(dir.path());

        assert!(matches!(
            manager.set_connection_type("base", ConnectionType::External),
            Err(CypherpunkError::Validation(_))
        ));
        assert_eq!(
            manager.chain_config("base").unwrap().connection_type,
            ConnectionType::Plugin
        );
        assert!(!manager.logs().sources().contains(&"base".to_string()));
        assert!(!manager.state_path().exists());
    }

    #[test]
    fn malformed_endpoints_leave_the_record_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::layered("[rpc]\nvalidate_urls = false")
            .unwrap()
            .with_data_dir(dir.path());
        let mut manager = PluginManager::open(&config).unwrap();

        manager.save_rpc_url("base", "not a url").unwrap();
        assert!(matches!(
            manager.test_rpc("base"),
            Err(CypherpunkError::Validation(_))
        ));

        let config = manager.chain_config("base").unwrap();
        assert_eq!(config.status, ChainStatus::ExternalConfigured);
    }
}
