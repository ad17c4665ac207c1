use crate::error::{CypherpunkError, Result};
use crate::model::catalog::Catalog;
use crate::model::chain::ChainDefinition;
use crate::plugin::manifest::{AppDefinition, AppId};

/// Moves a chain's active binding between its local plugin and external endpoints.
///
/// Every external activation goes through [`ConnectionInstaller::activate_external`],
/// so a chain has at most one installed external record at any time.
#[derive(Debug, Default)]
pub struct ConnectionInstaller;

impl ConnectionInstaller {
    /// Make `app_id` the chain's only active external binding.
    pub fn activate_external(catalog: &mut Catalog, chain_id: &str, app_id: &AppId) -> Result<()> {
        if !catalog.app(app_id.as_str())?.is_external_for(chain_id) {
            return Err(CypherpunkError::conflict(format!(
                "{app_id} is not an external endpoint for {chain_id}"
            )));
        }

        let others: Vec<AppId> = catalog
            .externals_for_chain(chain_id)
            .filter(|app| app.id != *app_id && app.installed)
            .map(|app| app.id.clone())
            .collect();

        for other in others {
            deactivate(catalog.app_mut(other.as_str())?);
            tracing::debug!(chain = chain_id, app = %other, "deactivated external endpoint");
        }

        catalog.app_mut(app_id.as_str())?.installed = true;
        Ok(())
    }

    /// Deactivate every external for the chain and mark `selected` as the active plugin.
    ///
    /// Marking is not an install workflow: nothing is downloaded or verified.
    pub fn use_plugin(
        catalog: &mut Catalog,
        chain_id: &str,
        selected: Option<&AppId>,
    ) -> Result<()> {
        let externals: Vec<AppId> = catalog
            .externals_for_chain(chain_id)
            .map(|app| app.id.clone())
            .collect();

        for id in externals {
            deactivate(catalog.app_mut(id.as_str())?);
        }

        if let Some(plugin_id) = selected {
            catalog.app_mut(plugin_id.as_str())?.installed = true;
        }

        Ok(())
    }

    /// Activate the chain's external binding.
    ///
    /// Reuses the first existing external record, applying `staged` to it when
    /// present. Without one, a staged non-placeholder URL gets a fresh record.
    /// Returns the activated record, or `None` when there was nothing to activate.
    pub fn use_external(
        catalog: &mut Catalog,
        chain: &ChainDefinition,
        staged: Option<&str>,
        now_millis: i64,
    ) -> Result<Option<AppId>> {
        let chain_id = chain.id.as_str();
        let staged = staged.filter(|url| !url.is_empty());

        let first = catalog
            .externals_for_chain(chain_id)
            .next()
            .map(|app| app.id.clone());

        if let Some(existing) = first {
            if let Some(url) = staged {
                catalog.app_mut(existing.as_str())?.rpc_url = Some(url.to_string());
            }
            Self::activate_external(catalog, chain_id, &existing)?;
            return Ok(Some(existing));
        }

        match staged {
            Some(url) if !chain.is_placeholder(url) => {
                Self::synthesize(catalog, chain, url, now_millis).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Point the chain at `url`, creating an external record if none exists.
    pub fn save_rpc_url(
        catalog: &mut Catalog,
        chain: &ChainDefinition,
        url: &str,
        now_millis: i64,
    ) -> Result<AppId> {
        let chain_id = chain.id.as_str();

        // prefer the record that is already active
        let existing = catalog
            .externals_for_chain(chain_id)
            .find(|app| app.installed)
            .or_else(|| catalog.externals_for_chain(chain_id).next())
            .map(|app| app.id.clone());

        let Some(id) = existing else {
            return Self::synthesize(catalog, chain, url, now_millis);
        };

        let record = catalog.app_mut(id.as_str())?;
        record.rpc_url = Some(url.to_string());
        // a new endpoint has not been tested yet
        record.running = false;
        record.has_error = false;

        Self::activate_external(catalog, chain_id, &id)?;
        Ok(id)
    }

    fn synthesize(
        catalog: &mut Catalog,
        chain: &ChainDefinition,
        url: &str,
        now_millis: i64,
    ) -> Result<AppId> {
        let mut stamp = now_millis;
        let mut record = AppDefinition::custom_external(chain, url, stamp);
        while catalog.app(record.id.as_str()).is_ok() {
            stamp += 1;
            record = AppDefinition::custom_external(chain, url, stamp);
        }

        let id = record.id.clone();
        catalog.push_app(record)?;
        Self::activate_external(catalog, chain.id.as_str(), &id)?;
        tracing::info!(chain = %chain.id, app = %id, "created external endpoint record");
        Ok(id)
    }
}

/// An inactive endpoint is neither connected nor failing; it needs a fresh test
/// once reactivated.
fn deactivate(app: &mut AppDefinition) {
    app.installed = false;
    app.running = false;
    app.has_error = false;
}
