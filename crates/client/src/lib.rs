//! Outbound HTTP clients. Every client shares one `reqwest::Client` with a
//! fixed per-request timeout.

pub mod auth;
pub mod error;
pub mod gallery;
pub mod search;

use std::time::Duration;

use serde::de::DeserializeOwned;

pub use auth::AuthDelegateClient;
pub use error::ClientError;
pub use gallery::GalleryClient;
pub use search::AssetSearchClient;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, ClientError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ClientError::Setup(e.to_string()))
}

pub(crate) fn trim_base(url: impl Into<String>) -> String {
    let mut url = url.into();
    while url.ends_with('/') {
        url.pop();
    }
    url
}

/// Rejects non-2xx responses, then decodes the body as JSON.
pub(crate) async fn read_json<T: DeserializeOwned>(
    resp: reqwest::Response,
    context: &'static str,
) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        return Err(ClientError::Status {
            context,
            status: status.as_u16(),
        });
    }
    let body = resp
        .bytes()
        .await
        .map_err(|e| ClientError::transport(context, e))?;
    serde_json::from_slice(&body).map_err(|e| ClientError::Decode {
        context,
        message: e.to_string(),
    })
}

#[cfg(test)]
pub(crate) mod stub {
    use axum::Router;

    /// Serves `app` on an ephemeral local port and returns its base URL.
    pub async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    pub fn http() -> reqwest::Client {
        super::build_http_client(std::time::Duration::from_secs(5)).unwrap()
    }
}
