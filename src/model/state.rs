use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::model::chain::ChainId;
use crate::plugin::manifest::{AppDefinition, AppId};

/// On-disk snapshot of everything the user can change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub enabled: Vec<ChainId>,
    /// Explicit plugin choice per chain.
    #[serde(default)]
    pub selections: BTreeMap<ChainId, AppId>,
    /// RPC URL entered for a chain, applied on the next switch to external.
    #[serde(default)]
    pub staged_rpc: BTreeMap<ChainId, String>,
    #[serde(default)]
    pub apps: Vec<AppDefinition>,
}

impl PersistedState {
    /// `Ok(None)` when no state has been saved yet.
    pub fn read(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = fs::read_to_string(path)?;
        Ok(Some(toml::from_str(&raw)?))
    }

    /// Write through a sibling temp file so readers never see a partial file.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let body = toml::to_string(self)?;
        let tmp = path.with_extension("toml.tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}
