use smallvec::SmallVec;
use std::fmt;

use crate::model::chain::ChainId;
use crate::plugin::manifest::{AppDefinition, AppId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionType {
    Plugin,
    External,
    None,
}

impl ConnectionType {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionType::Plugin => "plugin",
            ConnectionType::External => "external",
            ConnectionType::None => "none",
        }
    }

    /// Parse a user-selectable target. `none` is derived, never chosen.
    pub fn parse_target(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "plugin" | "local" => Some(ConnectionType::Plugin),
            "external" | "rpc" => Some(ConnectionType::External),
            _ => None,
        }
    }
}

/// Derived health of a chain binding. Rendered to text only at the edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainStatus {
    ExternalConnected,
    ExternalError,
    ExternalConfigured,
    Running(String),
    Stopped(String),
    Error(String),
    PluginAvailable(String),
    PluginsAvailable,
    ExternalNotConfigured,
    ReadyToConfigure,
}

impl ChainStatus {
    /// Status of an installed plugin; error wins over running.
    pub fn for_installed_plugin(plugin: &AppDefinition) -> Self {
        if plugin.has_error {
            ChainStatus::Error(plugin.name.clone())
        } else if plugin.running {
            ChainStatus::Running(plugin.name.clone())
        } else {
            ChainStatus::Stopped(plugin.name.clone())
        }
    }

    /// Status of the active external binding; a live connection wins over a stale error.
    pub fn for_external(external: &AppDefinition) -> Self {
        if external.running {
            ChainStatus::ExternalConnected
        } else if external.has_error {
            ChainStatus::ExternalError
        } else {
            ChainStatus::ExternalConfigured
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ChainStatus::ExternalError | ChainStatus::Error(_))
    }
}

impl fmt::Display for ChainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainStatus::ExternalConnected => f.write_str("Connected (External)"),
            ChainStatus::ExternalError => f.write_str("Error (External)"),
            ChainStatus::ExternalConfigured => f.write_str("Configured (External)"),
            ChainStatus::Running(name) => write!(f, "Running ({name})"),
            ChainStatus::Stopped(name) => write!(f, "Stopped ({name})"),
            ChainStatus::Error(name) => write!(f, "Error ({name})"),
            ChainStatus::PluginAvailable(name) => write!(f, "Plugin available: {name}"),
            ChainStatus::PluginsAvailable => {
                f.write_str("Plugin(s) available, select to configure.")
            }
            ChainStatus::ExternalNotConfigured => f.write_str("External RPC (Not Configured)"),
            ChainStatus::ReadyToConfigure => f.write_str("Ready to configure"),
        }
    }
}

/// Per-chain connection view, recomputed from the catalog on every read.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub chain_id: ChainId,
    pub connection_type: ConnectionType,
    pub external_rpc_url: String,
    pub status: ChainStatus,
    /// Snapshot of the selected plugin record.
    pub plugin_details: Option<AppDefinition>,
    pub available_plugins: SmallVec<[AppDefinition; 2]>,
    pub selected_plugin_id: Option<AppId>,
    /// Active external record backing `external_rpc_url`, if any.
    pub active_external_id: Option<AppId>,
}

impl ChainConfig {
    pub fn status_text(&self) -> String {
        self.status.to_string()
    }
}
