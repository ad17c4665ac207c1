use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

use crate::model::chain::{ChainDefinition, ChainId};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(pub String);

impl AppId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for AppId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AppId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MainCategory {
    Chain,
    App,
    Theme,
}

impl MainCategory {
    pub fn label(&self) -> &'static str {
        match self {
            MainCategory::Chain => "Chain",
            MainCategory::App => "App",
            MainCategory::Theme => "Theme",
        }
    }

    /// Case-insensitive parse. `None` for anything else, including `All`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "chain" => Some(MainCategory::Chain),
            "app" => Some(MainCategory::App),
            "theme" => Some(MainCategory::Theme),
            _ => None,
        }
    }
}

/// How a chain-bound entry provides connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Local node implementation.
    Plugin,
    /// Remote endpoint supplied by the user or a provider.
    External,
}

/// Mutable catalog record. Doubles as a plugin when `is_node` is set.
///
/// `running` implies `installed`; the lifecycle actions in [`crate::plugin::runtime`]
/// and the binding switches in [`crate::plugin::installer`] keep that pairing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppDefinition {
    pub id: AppId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_name: Option<String>,
    pub main_category: MainCategory,
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub long_description: String,
    pub version: String,
    pub developer: String,
    #[serde(default)]
    pub installed: bool,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub has_error: bool,
    #[serde(default)]
    pub is_node: bool,
    #[serde(default)]
    pub is_core: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<SourceType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_for_chain_id: Option<ChainId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supported_networks: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

impl AppDefinition {
    pub fn is_plugin_for(&self, chain_id: &str) -> bool {
        self.is_node
            && self.source_type == Some(SourceType::Plugin)
            && self.bound_to(chain_id)
    }

    pub fn is_external_for(&self, chain_id: &str) -> bool {
        self.source_type == Some(SourceType::External) && self.bound_to(chain_id)
    }

    fn bound_to(&self, chain_id: &str) -> bool {
        self.plugin_for_chain_id
            .as_ref()
            .is_some_and(|id| id.as_str() == chain_id)
    }

    /// Label used on dashboards: tier, chain name and where it runs.
    pub fn display_name(&self) -> String {
        if !self.is_node {
            return self.name.clone();
        }

        let tier = if self
            .sub_name
            .as_deref()
            .is_some_and(|sub| sub.contains("L1"))
        {
            "L1"
        } else {
            "L2"
        };
        let base = format!("{tier} - {}", self.name);

        if self.id.as_str() == "nodeset" {
            return format!("{base} (Nodeset)");
        }

        match self.source_type {
            Some(SourceType::Plugin) => format!("{base} (Local)"),
            Some(SourceType::External) => {
                let url = match self.rpc_url.as_deref() {
                    Some(url) if url.chars().count() > 25 => {
                        format!("{}...", url.chars().take(22).collect::<String>())
                    }
                    Some(url) if !url.is_empty() => url.to_string(),
                    _ => "Unknown URL".to_string(),
                };
                format!("{base} (External RPC: {url})")
            }
            None => base,
        }
    }

    /// Record for a user-supplied endpoint on a chain with no external entry yet.
    pub fn custom_external(chain: &ChainDefinition, rpc_url: &str, created_millis: i64) -> Self {
        Self {
            id: AppId::new(format!("{}-external-custom-{created_millis}", chain.id)),
            name: chain.name.clone(),
            sub_name: Some("External RPC".to_string()),
            main_category: MainCategory::Chain,
            category: format!("{} Node", chain.layer.label()),
            description: format!("User-configured external RPC for {}", chain.name),
            long_description: format!("User-configured external RPC endpoint for {}.", chain.name),
            version: "N/A".to_string(),
            developer: "User Configured".to_string(),
            installed: true,
            running: false,
            has_error: false,
            is_node: true,
            is_core: false,
            source_type: Some(SourceType::External),
            plugin_for_chain_id: Some(chain.id.clone()),
            rpc_url: Some(rpc_url.to_string()),
            port: None,
            dependencies: Vec::new(),
            supported_networks: vec![chain.name.clone()],
            active_network: None,
            repo: None,
            website: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AppSeed {
    pub apps: Vec<AppDefinition>,
}
