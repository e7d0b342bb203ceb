//! OCR search pipeline: index search → path rewrite → id lookup → details.

use std::sync::Arc;
use std::time::{Duration, Instant};

use fnos_proxy_core::{
    keyword::ClientKind,
    model::{MagicSearchPayload, Session},
    paths::PathRewriter,
    traits::{AssetIndex, GalleryFetcher, MetadataStore},
};
use thiserror::Error;
use tracing::info;

pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("ocr search: {0}")]
    Search(String),
    #[error("metadata store: {0}")]
    Store(String),
    #[error("gallery fetch: {0}")]
    Gallery(String),
    #[error("pipeline exceeded its {0:?} deadline")]
    Deadline(Duration),
}

impl PipelineError {
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Search(_) => "search",
            PipelineError::Store(_) => "store",
            PipelineError::Gallery(_) => "gallery",
            PipelineError::Deadline(_) => "deadline",
        }
    }

    /// Short message returned to the caller; details stay in the logs.
    pub fn public_message(&self) -> &'static str {
        match self {
            PipelineError::Search(_) => "Failed to search OCR",
            PipelineError::Store(_) => "Failed to query database",
            PipelineError::Gallery(_) => "Failed to get gallery items",
            PipelineError::Deadline(_) => "OCR search timed out",
        }
    }
}

pub struct OcrPipeline<S, A, G> {
    store: Arc<S>,
    index: A,
    gallery: G,
    rewriter: PathRewriter,
    deadline: Duration,
}

impl<S, A, G> OcrPipeline<S, A, G>
where
    S: MetadataStore + Send + Sync + 'static,
    A: AssetIndex + Send + Sync,
    G: GalleryFetcher + Send + Sync,
{
    pub fn new(store: S, index: A, gallery: G, rewriter: PathRewriter) -> Self {
        Self::with_shared_store(Arc::new(store), index, gallery, rewriter)
    }

    pub fn with_shared_store(store: Arc<S>, index: A, gallery: G, rewriter: PathRewriter) -> Self {
        Self {
            store,
            index,
            gallery,
            rewriter,
            deadline: DEFAULT_DEADLINE,
        }
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn rewriter(&self) -> &PathRewriter {
        &self.rewriter
    }

    pub fn index(&self) -> &A {
        &self.index
    }

    pub fn gallery(&self) -> &G {
        &self.gallery
    }

    /// Runs every stage under one deadline. Dropping the returned future
    /// cancels whatever stage is in flight.
    pub async fn run(
        &self,
        text: &str,
        session: &Session,
        client: ClientKind,
    ) -> Result<MagicSearchPayload, PipelineError> {
        match tokio::time::timeout(self.deadline, self.run_stages(text, session, client)).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Deadline(self.deadline)),
        }
    }

    async fn run_stages(
        &self,
        text: &str,
        session: &Session,
        client: ClientKind,
    ) -> Result<MagicSearchPayload, PipelineError> {
        let start = Instant::now();
        let hits = self
            .index
            .search_ocr(text)
            .await
            .map_err(|e| PipelineError::Search(e.to_string()))?;
        info!(
            hits = hits.len(),
            elapsed_ms = elapsed_ms(start),
            "ocr search completed"
        );

        let paths = self
            .rewriter
            .rewrite_all(hits.iter().map(|h| h.original_path.as_str()));
        if paths.is_empty() {
            return Ok(MagicSearchPayload::Empty);
        }

        let start = Instant::now();
        let store = Arc::clone(&self.store);
        let ids = tokio::task::spawn_blocking(move || store.photo_ids_by_paths(&paths))
            .await
            .map_err(|e| PipelineError::Store(e.to_string()))?
            .map_err(|e| PipelineError::Store(e.to_string()))?;
        info!(
            ids = ids.len(),
            elapsed_ms = elapsed_ms(start),
            "photo id lookup completed"
        );
        if ids.is_empty() {
            return Ok(MagicSearchPayload::Empty);
        }

        if client.is_mobile() {
            return Ok(MagicSearchPayload::IdList(ids));
        }

        let start = Instant::now();
        let items = self
            .gallery
            .fetch_details(&ids, session)
            .await
            .map_err(|e| PipelineError::Gallery(e.to_string()))?;
        info!(
            requested = ids.len(),
            items = items.len(),
            elapsed_ms = elapsed_ms(start),
            "gallery details fetched"
        );
        Ok(MagicSearchPayload::detailed(items))
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
pub(crate) mod fakes {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use fnos_proxy_core::model::{GalleryItem, PhotoId, SearchHit, Session};
    use fnos_proxy_core::traits::{AssetIndex, GalleryFetcher};
    use serde_json::json;

    #[derive(Debug, thiserror::Error)]
    #[error("fake failure")]
    pub struct FakeError;

    #[derive(Default)]
    pub struct FakeIndex {
        pub paths: Vec<String>,
        pub fail: bool,
        pub delay: Option<Duration>,
        pub calls: AtomicUsize,
        pub last_text: Mutex<Option<String>>,
    }

    impl FakeIndex {
        pub fn with_paths(paths: &[&str]) -> Self {
            Self {
                paths: paths.iter().map(|p| p.to_string()).collect(),
                ..Default::default()
            }
        }
    }

    impl AssetIndex for FakeIndex {
        type Error = FakeError;

        async fn search_ocr(&self, text: &str) -> Result<Vec<SearchHit>, FakeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_text.lock().unwrap() = Some(text.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(FakeError);
            }
            Ok(self
                .paths
                .iter()
                .map(|p| SearchHit {
                    original_path: p.clone(),
                })
                .collect())
        }
    }

    #[derive(Default)]
    pub struct FakeGallery {
        pub fail: bool,
        pub calls: AtomicUsize,
        pub last_session: Mutex<Option<Session>>,
    }

    impl GalleryFetcher for FakeGallery {
        type Error = FakeError;

        async fn fetch_details(
            &self,
            ids: &[PhotoId],
            session: &Session,
        ) -> Result<Vec<GalleryItem>, FakeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_session.lock().unwrap() = Some(session.clone());
            if self.fail {
                return Err(FakeError);
            }
            Ok(ids
                .iter()
                .filter_map(|id| GalleryItem::from_value(json!({"id": id, "title": format!("photo {id}")})))
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fakes::{FakeGallery, FakeIndex};
    use super::*;
    use fnos_proxy_core::paths::PathRule;
    use fnos_proxy_storage_ephemeral::EphemeralMetadataStore;
    use serde_json::json;
    use std::sync::atomic::Ordering;

    type TestPipeline = OcrPipeline<EphemeralMetadataStore, FakeIndex, FakeGallery>;

    fn store() -> EphemeralMetadataStore {
        [("/data/a/1.jpg", vec![11]), ("/data/a/2.jpg", vec![12])]
            .into_iter()
            .collect()
    }

    fn rewriter() -> PathRewriter {
        PathRewriter::new(vec![PathRule::new("/mnt/a", "/data/a")]).unwrap()
    }

    fn pipeline(index: FakeIndex, gallery: FakeGallery) -> TestPipeline {
        OcrPipeline::new(store(), index, gallery, rewriter())
    }

    fn web() -> ClientKind {
        ClientKind::Other
    }

    #[tokio::test]
    async fn web_caller_gets_details_and_id_list() {
        let p = pipeline(
            FakeIndex::with_paths(&["/mnt/a/1.jpg", "/mnt/a/2.jpg", "/elsewhere/3.jpg"]),
            FakeGallery::default(),
        );
        let session = Session::new(Vec::new(), "tok");
        let payload = p.run("cat", &session, web()).await.unwrap();
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "list": [{"id": 11, "title": "photo 11"}, {"id": 12, "title": "photo 12"}],
                "idList": [11, 12]
            })
        );
        assert_eq!(p.index.last_text.lock().unwrap().as_deref(), Some("cat"));
        assert_eq!(
            p.gallery.last_session.lock().unwrap().as_ref().map(|s| s.access_token.as_str()),
            Some("tok")
        );
    }

    #[tokio::test]
    async fn no_hits_short_circuits_before_store() {
        let p = pipeline(FakeIndex::default(), FakeGallery::default());
        let payload = p.run("nothing", &Session::default(), web()).await.unwrap();
        assert_eq!(payload, MagicSearchPayload::Empty);
        assert_eq!(p.store.query_count(), 0);
        assert_eq!(p.gallery.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unresolved_paths_return_empty() {
        let p = pipeline(FakeIndex::with_paths(&["/mnt/b/9.jpg"]), FakeGallery::default());
        let payload = p.run("x", &Session::default(), web()).await.unwrap();
        assert_eq!(payload, MagicSearchPayload::Empty);
        assert_eq!(p.store.query_count(), 1);
        assert_eq!(p.gallery.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn mobile_caller_skips_gallery() {
        let p = pipeline(
            FakeIndex::with_paths(&["/mnt/a/2.jpg", "/mnt/a/1.jpg"]),
            FakeGallery::default(),
        );
        let payload = p
            .run("x", &Session::default(), ClientKind::Mobile)
            .await
            .unwrap();
        assert_eq!(payload, MagicSearchPayload::IdList(vec![12, 11]));
        assert_eq!(p.gallery.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stage_failures_map_to_their_stage() {
        let failing_index = FakeIndex {
            fail: true,
            ..Default::default()
        };
        let p = pipeline(failing_index, FakeGallery::default());
        let err = p.run("x", &Session::default(), web()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Search(_)));
        assert_eq!(err.public_message(), "Failed to search OCR");

        let p = pipeline(FakeIndex::with_paths(&["/mnt/a/1.jpg"]), FakeGallery::default());
        p.store.set_failing(true);
        let err = p.run("x", &Session::default(), web()).await.unwrap_err();
        assert_eq!(err.stage(), "store");
        assert_eq!(err.public_message(), "Failed to query database");

        let failing_gallery = FakeGallery {
            fail: true,
            ..Default::default()
        };
        let p = pipeline(FakeIndex::with_paths(&["/mnt/a/1.jpg"]), failing_gallery);
        let err = p.run("x", &Session::default(), web()).await.unwrap_err();
        assert_eq!(err.public_message(), "Failed to get gallery items");
    }

    #[tokio::test]
    async fn slow_stage_hits_the_deadline() {
        let slow = FakeIndex {
            delay: Some(Duration::from_millis(500)),
            ..Default::default()
        };
        let p = pipeline(slow, FakeGallery::default()).with_deadline(Duration::from_millis(20));
        let err = p.run("x", &Session::default(), web()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Deadline(_)));
        assert_eq!(err.public_message(), "OCR search timed out");
    }
}
