use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use std::collections::BTreeSet;

use crate::error::{CypherpunkError, Result};
use crate::model::chain::{ChainDefinition, ChainSeed};
use crate::plugin::manifest::{AppDefinition, AppSeed, MainCategory, SourceType};

const CHAINS: &str = include_str!("../../config/chains.toml");
const APPS: &str = include_str!("../../config/apps.toml");

/// Owned store of every known chain and app record.
///
/// Chains are immutable after load. Apps are mutated in place and may be
/// appended to, never removed.
#[derive(Debug, Clone)]
pub struct Catalog {
    chains: Vec<ChainDefinition>,
    apps: Vec<AppDefinition>,
}

impl Catalog {
    pub fn new(chains: Vec<ChainDefinition>, apps: Vec<AppDefinition>) -> Self {
        Self { chains, apps }
    }

    /// Seed data compiled into the binary.
    pub fn builtin() -> Result<Self> {
        let chains: ChainSeed = toml::from_str(CHAINS)?;
        let apps: AppSeed = toml::from_str(APPS)?;
        Ok(Self::new(chains.chains, apps.apps))
    }

    /// Lay persisted app records over the seed. Persisted records win by id;
    /// unknown ids (synthesized endpoints) are appended in persisted order.
    pub fn overlay(&mut self, persisted: Vec<AppDefinition>) {
        for record in persisted {
            match self.apps.iter_mut().find(|app| app.id == record.id) {
                Some(existing) => *existing = record,
                None => self.apps.push(record),
            }
        }
    }

    pub fn chains(&self) -> &[ChainDefinition] {
        &self.chains
    }

    pub fn chain(&self, id: &str) -> Result<&ChainDefinition> {
        self.chains
            .iter()
            .find(|chain| chain.id.as_str() == id)
            .ok_or_else(|| CypherpunkError::chain_not_found(id))
    }

    pub fn apps(&self) -> &[AppDefinition] {
        &self.apps
    }

    pub fn app(&self, id: &str) -> Result<&AppDefinition> {
        self.apps
            .iter()
            .find(|app| app.id.as_str() == id)
            .ok_or_else(|| CypherpunkError::app_not_found(id))
    }

    pub fn app_mut(&mut self, id: &str) -> Result<&mut AppDefinition> {
        self.apps
            .iter_mut()
            .find(|app| app.id.as_str() == id)
            .ok_or_else(|| CypherpunkError::app_not_found(id))
    }

    pub fn apps_where<P>(&self, predicate: P) -> impl Iterator<Item = &AppDefinition>
    where
        P: Fn(&AppDefinition) -> bool,
    {
        self.apps.iter().filter(move |app| predicate(app))
    }

    pub fn push_app(&mut self, app: AppDefinition) -> Result<()> {
        if self.apps.iter().any(|existing| existing.id == app.id) {
            return Err(CypherpunkError::conflict(format!(
                "app id already exists: {}",
                app.id
            )));
        }
        self.apps.push(app);
        Ok(())
    }

    /// Local node plugins bound to `chain_id`, in catalog order.
    pub fn plugins_for_chain<'a>(
        &'a self,
        chain_id: &'a str,
    ) -> impl Iterator<Item = &'a AppDefinition> + 'a {
        self.apps.iter().filter(move |app| app.is_plugin_for(chain_id))
    }

    pub fn externals_for_chain<'a>(
        &'a self,
        chain_id: &'a str,
    ) -> impl Iterator<Item = &'a AppDefinition> + 'a {
        self.apps
            .iter()
            .filter(move |app| app.is_external_for(chain_id))
    }

    /// User-facing apps that are installed, excluding nodes and core components.
    pub fn installed_apps(&self) -> Vec<&AppDefinition> {
        self.apps
            .iter()
            .filter(|app| {
                app.installed && !app.is_node && !app.is_core && app.main_category == MainCategory::App
            })
            .collect()
    }

    pub fn local_node_plugins(&self) -> Vec<&AppDefinition> {
        self.apps
            .iter()
            .filter(|app| app.is_node && app.source_type == Some(SourceType::Plugin))
            .collect()
    }

    /// App store filter. `None` categories mean "All".
    ///
    /// Descriptions match by substring. Names also match fuzzily, and results
    /// are ranked by name score with substring hits first.
    pub fn search(
        &self,
        query: &str,
        main: Option<MainCategory>,
        sub: Option<&str>,
    ) -> Vec<&AppDefinition> {
        let needle = query.trim().to_lowercase();
        let matcher = SkimMatcherV2::default();

        let mut hits: Vec<(bool, i64, usize, &AppDefinition)> = self
            .apps
            .iter()
            .enumerate()
            .filter(|(_, app)| main.is_none_or(|main| app.main_category == main))
            .filter(|(_, app)| sub.is_none_or(|sub| app.category.eq_ignore_ascii_case(sub)))
            .filter_map(|(idx, app)| {
                if needle.is_empty() {
                    return Some((true, 0, idx, app));
                }

                let sub_name = app.sub_name.as_deref().unwrap_or("");
                let exact = app.name.to_lowercase().contains(&needle)
                    || app.description.to_lowercase().contains(&needle)
                    || sub_name.to_lowercase().contains(&needle);

                let score = matcher
                    .fuzzy_match(&app.name, &needle)
                    .max(matcher.fuzzy_match(sub_name, &needle));

                match (exact, score) {
                    (true, score) => Some((true, score.unwrap_or(0), idx, app)),
                    (false, Some(score)) => Some((false, score, idx, app)),
                    (false, None) => None,
                }
            })
            .collect();

        hits.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)).then(a.2.cmp(&b.2)));
        hits.into_iter().map(|(_, _, _, app)| app).collect()
    }

    /// Sorted unique sub-categories, optionally within one main category.
    pub fn sub_categories(&self, main: Option<MainCategory>) -> Vec<String> {
        self.apps
            .iter()
            .filter(|app| main.is_none_or(|main| app.main_category == main))
            .map(|app| app.category.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
