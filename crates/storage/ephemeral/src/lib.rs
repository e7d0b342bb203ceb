use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use fnos_proxy_core::{model::PhotoId, traits::MetadataStore};
use parking_lot::RwLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EphemeralError {
    #[error("store unavailable")]
    Unavailable,
}

/// Path → ids map with a query counter.
pub struct EphemeralMetadataStore {
    map: RwLock<HashMap<String, Vec<PhotoId>>>,
    queries: AtomicUsize,
    failing: AtomicBool,
}

impl EphemeralMetadataStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<String>, id: PhotoId) {
        let mut map = self.map.write();
        map.entry(path.into()).or_default().push(id);
    }

    /// Number of lookups that reached the store (empty inputs excluded).
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Makes every subsequent lookup fail with [`EphemeralError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl Default for EphemeralMetadataStore {
    fn default() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
            queries: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }
}

impl<P, I> FromIterator<(P, I)> for EphemeralMetadataStore
where
    P: Into<String>,
    I: IntoIterator<Item = PhotoId>,
{
    fn from_iter<T: IntoIterator<Item = (P, I)>>(iter: T) -> Self {
        let store = Self::new();
        for (path, ids) in iter {
            let path = path.into();
            for id in ids {
                store.insert(path.clone(), id);
            }
        }
        store
    }
}

impl MetadataStore for EphemeralMetadataStore {
    type Error = EphemeralError;

    fn photo_ids_by_paths(&self, paths: &[String]) -> Result<Vec<PhotoId>, Self::Error> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(EphemeralError::Unavailable);
        }
        let map = self.map.read();
        Ok(paths
            .iter()
            .filter_map(|p| map.get(p))
            .flatten()
            .copied()
            .collect())
    }
}
