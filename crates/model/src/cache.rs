//! Process-wide model cache keyed by (level, target)
//!
//! Read-mostly: lookups take a shared lock, a miss loads from the store
//! without holding any lock and then inserts. Two concurrent misses for the
//! same key may both load; the first insert wins and both callers get a
//! valid bundle. Entries live until the process exits.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use roas_cohort::{Level, Target};
use tracing::{debug, info, instrument, warn};

use crate::bundle::ModelBundle;
use crate::errors::Result;
use crate::store::ModelStore;

type Key = (Level, Target);

#[derive(Debug)]
pub struct ModelCache {
    store: ModelStore,
    models: RwLock<HashMap<Key, Arc<ModelBundle>>>,
}

impl ModelCache {
    pub fn new(store: ModelStore) -> Self {
        Self {
            store,
            models: RwLock::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    /// Cached bundle, loading it on first use
    #[instrument(skip(self))]
    pub fn get(&self, level: Level, target: Target) -> Result<Arc<ModelBundle>> {
        if let Some(bundle) = self.models.read().get(&(level, target)) {
            return Ok(Arc::clone(bundle));
        }

        let loaded = Arc::new(self.store.load(level, target)?);
        let mut models = self.models.write();
        let entry = models.entry((level, target)).or_insert_with(|| {
            debug!("cached model bundle");
            loaded
        });
        Ok(Arc::clone(entry))
    }

    pub fn is_cached(&self, level: Level, target: Target) -> bool {
        self.models.read().contains_key(&(level, target))
    }

    pub fn len(&self) -> usize {
        self.models.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.read().is_empty()
    }

    /// Load every artifact present on disk. Failures are logged and left
    /// for the request path to report.
    pub fn warm(&self) -> usize {
        let mut loaded = 0;
        for (level, target) in self.store.trained() {
            match self.get(level, target) {
                Ok(_) => loaded += 1,
                Err(e) => warn!(%level, %target, error = %e, "failed to preload model"),
            }
        }
        info!(loaded, "model cache warmed");
        loaded
    }
}
