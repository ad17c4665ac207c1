use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub String);

impl ChainId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ChainId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ChainId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ChainId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Settlement tier. Informational only; nothing is gated on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Layer {
    L1,
    L2,
    L3,
}

impl Layer {
    pub fn label(&self) -> &'static str {
        match self {
            Layer::L1 => "L1",
            Layer::L2 => "L2",
            Layer::L3 => "L3",
        }
    }
}

/// Static descriptor of a network the node can connect to.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainDefinition {
    pub id: ChainId,
    pub name: String,
    pub layer: Layer,
    #[serde(default)]
    pub description: String,
    /// Plugin shipped by the core distribution for this chain, if any.
    #[serde(default)]
    pub native_plugin_id: Option<String>,
    pub supports_local_node: bool,
    /// Advisory default shown before the user provides an endpoint. May not be a URL.
    #[serde(default)]
    pub default_external_rpc_placeholder: Option<String>,
    #[serde(default)]
    pub block_explorer_url: Option<String>,
}

impl ChainDefinition {
    pub fn placeholder(&self) -> &str {
        self.default_external_rpc_placeholder.as_deref().unwrap_or("")
    }

    pub fn is_placeholder(&self, url: &str) -> bool {
        self.default_external_rpc_placeholder.as_deref() == Some(url)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChainSeed {
    pub chains: Vec<ChainDefinition>,
}
