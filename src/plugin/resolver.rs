use smallvec::SmallVec;

use crate::model::catalog::Catalog;
use crate::model::chain::ChainDefinition;
use crate::model::status::{ChainConfig, ChainStatus, ConnectionType};
use crate::plugin::manifest::{AppDefinition, AppId};

/// User choices that feed resolution but live outside the app records.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainChoices<'a> {
    pub plugin: Option<&'a AppId>,
    pub staged_rpc: Option<&'a str>,
}

/// Derive the connection view for `chain` from the current catalog.
///
/// Priority, first match wins:
/// 1. an installed external binding
/// 2. an installed local plugin
/// 3. plugins exist for a chain that can run one locally
/// 4. external-only chain with nothing configured
/// 5. nothing to offer
///
/// Plugins are ignored on chains without local node support, so such a chain
/// never resolves to [`ConnectionType::Plugin`].
pub fn resolve(
    catalog: &Catalog,
    chain: &ChainDefinition,
    choices: ChainChoices<'_>,
) -> ChainConfig {
    let chain_id = chain.id.as_str();
    let available: SmallVec<[AppDefinition; 2]> = if chain.supports_local_node {
        catalog.plugins_for_chain(chain_id).cloned().collect()
    } else {
        SmallVec::new()
    };

    let selected = choices
        .plugin
        .and_then(|id| available.iter().find(|plugin| plugin.id == *id))
        .or_else(|| available.iter().find(|plugin| plugin.installed))
        .or_else(|| available.first())
        .cloned();

    let active_external = catalog
        .externals_for_chain(chain_id)
        .find(|app| app.installed);

    let active_plugin = selected
        .as_ref()
        .filter(|plugin| plugin.installed)
        .or_else(|| available.iter().find(|plugin| plugin.installed));

    let fallback_url = choices
        .staged_rpc
        .filter(|url| !url.is_empty())
        .unwrap_or_else(|| chain.placeholder())
        .to_string();

    let (connection_type, status, external_rpc_url) = if let Some(external) = active_external {
        let url = external
            .rpc_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .unwrap_or(fallback_url);
        (
            ConnectionType::External,
            ChainStatus::for_external(external),
            url,
        )
    } else if let Some(plugin) = active_plugin {
        (
            ConnectionType::Plugin,
            ChainStatus::for_installed_plugin(plugin),
            fallback_url,
        )
    } else if chain.supports_local_node && !available.is_empty() {
        let status = match selected.as_ref() {
            Some(plugin) if plugin.installed => ChainStatus::for_installed_plugin(plugin),
            Some(plugin) => ChainStatus::PluginAvailable(plugin.name.clone()),
            None => ChainStatus::PluginsAvailable,
        };
        (ConnectionType::Plugin, status, fallback_url)
    } else if !chain.supports_local_node {
        (
            ConnectionType::External,
            ChainStatus::ExternalNotConfigured,
            fallback_url,
        )
    } else {
        (
            ConnectionType::None,
            ChainStatus::ReadyToConfigure,
            fallback_url,
        )
    };

    ChainConfig {
        chain_id: chain.id.clone(),
        connection_type,
        external_rpc_url,
        status,
        selected_plugin_id: selected.as_ref().map(|plugin| plugin.id.clone()),
        plugin_details: selected,
        available_plugins: available,
        active_external_id: active_external.map(|app| app.id.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::chain::{ChainId, Layer};
    use crate::plugin::manifest::SourceType;

    fn catalog() -> Catalog {
        Catalog::builtin().unwrap()
    }

    fn resolve_id(catalog: &Catalog, id: &str) -> ChainConfig {
        let chain = catalog.chain(id).unwrap().clone();
        resolve(catalog, &chain, ChainChoices::default())
    }

    #[test]
    fn arbitrum_external_error_beats_uninstalled_plugin() {
        let catalog = catalog();
        let config = resolve_id(&catalog, "arbitrum");

        assert_eq!(config.connection_type, ConnectionType::External);
        assert!(config.status_text().contains("Error"));
        assert_eq!(config.external_rpc_url, "my-arb-provider.com");
        assert_eq!(
            config.selected_plugin_id,
            Some(AppId::new("l2-arbitrum-plugin"))
        );
    }

    #[test]
    fn external_wins_even_when_plugin_is_installed() {
        let mut catalog = catalog();
        catalog.app_mut("l2-arbitrum-plugin").unwrap().installed = true;
        catalog.app_mut("l2-arbitrum-plugin").unwrap().running = true;

        let config = resolve_id(&catalog, "arbitrum");
        assert_eq!(config.connection_type, ConnectionType::External);
    }

    #[test]
    fn running_plugin_reports_its_name() {
        let catalog = catalog();
        let config = resolve_id(&catalog, "base");

        assert_eq!(config.connection_type, ConnectionType::Plugin);
        assert_eq!(config.status, ChainStatus::Running("Base".to_string()));
        assert_eq!(config.external_rpc_url, "https://mainnet.base.org");
    }

    #[test]
    fn plugin_error_overrides_running() {
        let mut catalog = catalog();
        catalog.app_mut("nodeset").unwrap().has_error = true;

        let config = resolve_id(&catalog, "ethereum");
        assert_eq!(config.status.to_string(), "Error (Ethereum)");
    }

    #[test]
    fn uninstalled_plugin_is_offered() {
        let mut catalog = catalog();
        catalog.app_mut("external-arb-l2-custom").unwrap().installed = false;

        let config = resolve_id(&catalog, "arbitrum");
        assert_eq!(config.connection_type, ConnectionType::Plugin);
        assert_eq!(config.status_text(), "Plugin available: Arbitrum One");
    }

    #[test]
    fn external_only_chain_without_config() {
        let catalog = catalog();
        let config = resolve_id(&catalog, "optimism");

        assert_eq!(config.connection_type, ConnectionType::External);
        assert_eq!(config.status, ChainStatus::ExternalNotConfigured);
        assert_eq!(config.external_rpc_url, "https://mainnet.optimism.io");
        assert!(config.available_plugins.is_empty());
    }

    #[test]
    fn local_chain_without_plugins_is_ready_to_configure() {
        let seed = catalog();
        let chain = ChainDefinition {
            id: ChainId::new("l3-test"),
            name: "L3 Test".to_string(),
            layer: Layer::L3,
            description: String::new(),
            native_plugin_id: None,
            supports_local_node: true,
            default_external_rpc_placeholder: None,
            block_explorer_url: None,
        };
        let mut chains = seed.chains().to_vec();
        chains.push(chain.clone());
        let catalog = Catalog::new(chains, seed.apps().to_vec());

        let config = resolve(&catalog, &chain, ChainChoices::default());
        assert_eq!(config.connection_type, ConnectionType::None);
        assert_eq!(config.status_text(), "Ready to configure");
        assert_eq!(config.external_rpc_url, "");
    }

    #[test]
    fn chains_without_local_support_never_resolve_to_plugin() {
        let mut catalog = catalog();
        // a stray installed plugin bound to an external-only chain
        let mut stray = catalog.app("l2-base-plugin").unwrap().clone();
        stray.id = AppId::new("op-plugin");
        stray.plugin_for_chain_id = Some(ChainId::new("optimism"));
        stray.source_type = Some(SourceType::Plugin);
        catalog.push_app(stray).unwrap();

        for chain in catalog.chains().to_vec() {
            let config = resolve(&catalog, &chain, ChainChoices::default());
            if !chain.supports_local_node {
                assert_ne!(config.connection_type, ConnectionType::Plugin, "{}", chain.id);
            }
        }
    }

    #[test]
    fn explicit_selection_is_honoured_when_available() {
        let mut catalog = catalog();
        let mut alt = catalog.app("l2-base-plugin").unwrap().clone();
        alt.id = AppId::new("l2-base-reth");
        alt.name = "Base (reth)".to_string();
        alt.installed = false;
        alt.running = false;
        catalog.push_app(alt).unwrap();
        let chain = catalog.chain("base").unwrap().clone();

        let chosen = AppId::new("l2-base-reth");
        let config = resolve(
            &catalog,
            &chain,
            ChainChoices {
                plugin: Some(&chosen),
                staged_rpc: None,
            },
        );

        assert_eq!(config.available_plugins.len(), 2);
        assert_eq!(config.selected_plugin_id, Some(chosen));
        // the installed sibling still drives the status
        assert_eq!(config.status, ChainStatus::Running("Base".to_string()));

        let stale = AppId::new("gone");
        let config = resolve(
            &catalog,
            &chain,
            ChainChoices {
                plugin: Some(&stale),
                staged_rpc: None,
            },
        );
        assert_eq!(
            config.selected_plugin_id,
            Some(AppId::new("l2-base-plugin"))
        );
    }

    #[test]
    fn staged_url_replaces_the_placeholder() {
        let catalog = catalog();
        let chain = catalog.chain("linea").unwrap().clone();
        let config = resolve(
            &catalog,
            &chain,
            ChainChoices {
                plugin: None,
                staged_rpc: Some("https://linea.example"),
            },
        );
        assert_eq!(config.external_rpc_url, "https://linea.example");
    }

    #[test]
    fn resolution_is_deterministic() {
        let catalog = catalog();
        for chain in catalog.chains() {
            let a = resolve(&catalog, chain, ChainChoices::default());
            let b = resolve(&catalog, chain, ChainChoices::default());
            assert_eq!(a.connection_type, b.connection_type);
            assert_eq!(a.status, b.status);
            assert_eq!(a.selected_plugin_id, b.selected_plugin_id);
        }
    }
}
