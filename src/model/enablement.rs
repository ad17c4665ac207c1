use std::collections::BTreeSet;

use crate::model::chain::ChainId;

/// Chains the user has chosen to manage. Replaced wholesale on save.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnablementSet {
    ids: BTreeSet<ChainId>,
}

impl EnablementSet {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ChainId>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Copy of the current set. Mutating it does not touch `self`.
    pub fn current(&self) -> BTreeSet<ChainId> {
        self.ids.clone()
    }

    pub fn replace(&mut self, ids: BTreeSet<ChainId>) {
        self.ids = ids;
    }

    pub fn is_enabled(&self, chain_id: &str) -> bool {
        self.ids.contains(chain_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChainId> {
        self.ids.iter()
    }
}
