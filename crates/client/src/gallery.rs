//! Concurrent detail lookups against fnOS `gallery/getOne`.

use std::sync::Arc;

use fnos_proxy_core::model::{GalleryItem, PhotoId, Session};
use fnos_proxy_core::traits::GalleryFetcher;
use fnos_proxy_proto::{gallery_item_path, GalleryResponse, HEADER_ACCESS_TOKEN, HEADER_SIGNATURE};
use reqwest::header::COOKIE;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::{read_json, trim_base, AuthDelegateClient, ClientError};

#[derive(Clone, Debug)]
pub struct GalleryClient {
    http: reqwest::Client,
    base_url: String,
    auth: AuthDelegateClient,
    login_fallback: bool,
}

impl GalleryClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, auth: AuthDelegateClient) -> Self {
        Self {
            http,
            base_url: trim_base(base_url),
            auth,
            login_fallback: false,
        }
    }

    /// When the caller sent no cookies, borrow the delegate's login session.
    #[must_use]
    pub fn with_login_fallback(mut self, enabled: bool) -> Self {
        self.login_fallback = enabled;
        self
    }

    /// One signed detail request. `Ok(None)` when fnOS answers with `data: null`.
    async fn fetch_one(
        &self,
        id: PhotoId,
        session: &Session,
    ) -> Result<Option<GalleryItem>, ClientError> {
        let path = gallery_item_path(id);
        let signature = self.auth.sign("GET", &path, None, None).await?;

        let mut req = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .header(HEADER_SIGNATURE, signature)
            .header(HEADER_ACCESS_TOKEN, session.access_token.as_str());
        if let Some(cookie) = session.cookie_header() {
            req = req.header(COOKIE, cookie);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| ClientError::transport("gallery", e))?;
        let body: GalleryResponse = read_json(resp, "gallery").await?;
        Ok(GalleryItem::from_value(body.data))
    }

    async fn effective_session(&self, session: &Session) -> Result<Session, ClientError> {
        if !self.login_fallback || session.has_cookies() {
            return Ok(session.clone());
        }
        debug!("no caller cookies; using delegate login session");
        let cookies = self.auth.login().await?;
        Ok(Session::new(cookies, session.access_token.clone()))
    }
}

impl GalleryFetcher for GalleryClient {
    type Error = ClientError;

    /// Fans out one task per id with no concurrency cap. The first failure
    /// aborts the remaining tasks; every task is joined before returning and
    /// no partial list is ever produced. Output follows input order.
    async fn fetch_details(
        &self,
        ids: &[PhotoId],
        session: &Session,
    ) -> Result<Vec<GalleryItem>, ClientError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let session = Arc::new(self.effective_session(session).await?);

        let mut tasks = JoinSet::new();
        for (index, &id) in ids.iter().enumerate() {
            let client = self.clone();
            let session = Arc::clone(&session);
            tasks.spawn(async move { (index, id, client.fetch_one(id, &session).await) });
        }

        let mut slots: Vec<Option<GalleryItem>> = vec![None; ids.len()];
        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, _, Ok(item))) => slots[index] = item,
                Ok((_, id, Err(err))) => {
                    warn!(photo_id = id, error = %err, "gallery fetch failed");
                    if failures.is_empty() {
                        tasks.abort_all();
                    }
                    failures.push(ClientError::item(id, err));
                }
                Err(join_err) if join_err.is_cancelled() => {}
                Err(join_err) => {
                    tasks.abort_all();
                    failures.push(ClientError::Task(join_err.to_string()));
                }
            }
        }

        if !failures.is_empty() {
            return Err(ClientError::Batch {
                total: ids.len(),
                failures,
            });
        }
        Ok(slots.into_iter().flatten().collect())
    }
}
