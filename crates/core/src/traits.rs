use std::future::Future;

use crate::model::{GalleryItem, PhotoId, SearchHit, Session};

/// Path → identifier lookup against the backend's metadata database.
/// Blocking; async callers should use spawn_blocking.
pub trait MetadataStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Resolves identifiers for `paths` in one query. Unknown paths are
    /// dropped; an empty input returns an empty result without querying.
    fn photo_ids_by_paths(&self, paths: &[String]) -> Result<Vec<PhotoId>, Self::Error>;
}

/// External image-text index.
pub trait AssetIndex {
    type Error: std::error::Error + Send + Sync + 'static;

    fn search_ocr(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<Vec<SearchHit>, Self::Error>> + Send;
}

/// Detail lookups against the backend's own gallery API.
pub trait GalleryFetcher {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetches every id or fails as a whole. `null` details are omitted.
    fn fetch_details(
        &self,
        ids: &[PhotoId],
        session: &Session,
    ) -> impl Future<Output = Result<Vec<GalleryItem>, Self::Error>> + Send;
}
