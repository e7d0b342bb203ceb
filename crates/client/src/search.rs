use fnos_proxy_core::model::SearchHit;
use fnos_proxy_core::traits::AssetIndex;
use fnos_proxy_proto::{AssetSearchRequest, AssetSearchResponse, IMMICH_METADATA_SEARCH_PATH};
use tracing::debug;

use crate::{read_json, trim_base, ClientError};

/// Immich metadata search restricted to OCR text.
#[derive(Clone, Debug)]
pub struct AssetSearchClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AssetSearchClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: trim_base(base_url),
            api_key: api_key.into(),
        }
    }
}

impl AssetIndex for AssetSearchClient {
    type Error = ClientError;

    async fn search_ocr(&self, text: &str) -> Result<Vec<SearchHit>, ClientError> {
        let url = format!("{}{}", self.base_url, IMMICH_METADATA_SEARCH_PATH);
        let resp = self
            .http
            .post(url)
            .query(&[("apiKey", self.api_key.as_str())])
            .json(&AssetSearchRequest::ocr(text))
            .send()
            .await
            .map_err(|e| ClientError::transport("ocr search", e))?;
        let body: AssetSearchResponse = read_json(resp, "ocr search").await?;
        debug!(
            total = body.assets.total,
            returned = body.assets.items.len(),
            "ocr search page received"
        );
        Ok(body.assets.items)
    }
}
