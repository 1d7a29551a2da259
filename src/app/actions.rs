use anyhow::Result;

use crate::app::state::{BlogViewState, SaveOutcome};
use crate::providers::{CategoryProvider, IndexProvider, KeyStore, ReadSet};
use crate::repo::BlogRepo;
use crate::storage::StorageHandle;

pub struct ActionDispatcher<'a> {
    storage: &'a StorageHandle,
    repo: &'a BlogRepo,
    keys: &'a KeyStore,
}

impl<'a> ActionDispatcher<'a> {
    pub fn new(storage: &'a StorageHandle, repo: &'a BlogRepo, keys: &'a KeyStore) -> Self {
        Self {
            storage,
            repo,
            keys,
        }
    }

    /// Pulls the index and category list into the view.
    pub fn reload(&self, state: &mut BlogViewState) -> Result<()> {
        state.set_loading(true);
        let items = match self.repo.fetch_index() {
            Ok(items) => items,
            Err(err) => {
                state.set_loading(false);
                return Err(err.into());
            }
        };
        state.replace_items(items);
        match self.repo.fetch_categories() {
            Ok(categories) => state.replace_categories(categories),
            Err(err) => {
                tracing::warn!(?err, "category list unavailable, keeping previous list");
            }
        }
        Ok(())
    }

    pub fn mark_read(&self, slug: &str) -> Result<()> {
        self.storage.mark_read(slug)
    }

    pub fn read_set(&self) -> Result<ReadSet> {
        self.storage.fetch_read_slugs()
    }

    /// Saves pending edits; on success refreshes the view and drops read
    /// marks of removed posts.
    pub fn save(&self, state: &mut BlogViewState) -> Result<SaveOutcome> {
        match state.begin_save(self.keys) {
            Ok(removed) => self.finish_save(state, removed),
            Err(outcome) => Ok(outcome),
        }
    }

    /// Completes a save started with [`BlogViewState::begin_save`].
    pub fn finish_save(
        &self,
        state: &mut BlogViewState,
        removed: Vec<String>,
    ) -> Result<SaveOutcome> {
        let outcome = state.finish_save(self.repo, removed);
        if let SaveOutcome::Saved { removed } = &outcome {
            let forgotten = self.storage.forget_read(removed)?;
            tracing::debug!(forgotten, "dropped read marks for removed posts");
            self.reload(state)?;
        }
        Ok(outcome)
    }
}
