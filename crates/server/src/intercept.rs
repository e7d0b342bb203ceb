//! Request dispatch: magic-search interception, everything else proxied.

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header, request::Parts, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use fnos_proxy_core::{
    classify_keyword,
    keyword::ClientKind,
    model::Session,
    traits::{AssetIndex, GalleryFetcher, MetadataStore},
    SearchMode,
};
use fnos_proxy_proto::{Envelope, MagicSearchRequest, HEADER_ACCESS_TOKEN, MAGIC_SEARCH_PATH};
use futures_util::{stream, StreamExt};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::AppState;

/// Search bodies are a few hundred bytes; larger ones are not inspected and
/// go to fnOS as they are.
pub(crate) const MAX_SEARCH_BODY_BYTES: usize = 1 << 20;

pub(crate) async fn dispatch<S, A, G>(
    State(state): State<Arc<AppState<S, A, G>>>,
    req: Request,
) -> Response
where
    S: MetadataStore + Send + Sync + 'static,
    A: AssetIndex + Send + Sync + 'static,
    G: GalleryFetcher + Send + Sync + 'static,
{
    if req.method() != Method::POST || req.uri().path() != MAGIC_SEARCH_PATH {
        return state.passthrough.forward(req).await;
    }
    let request_id = Uuid::new_v4();
    magic_search(&state, req)
        .instrument(info_span!("magic_search", %request_id))
        .await
}

async fn magic_search<S, A, G>(state: &AppState<S, A, G>, req: Request) -> Response
where
    S: MetadataStore + Send + Sync + 'static,
    A: AssetIndex + Send + Sync + 'static,
    G: GalleryFetcher + Send + Sync + 'static,
{
    let (parts, body) = req.into_parts();
    let mut chunks = body.into_data_stream();
    let mut buffered = Vec::new();
    while let Some(chunk) = chunks.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => {
                warn!(error = %err, "reading magic-search body failed");
                return error_response(StatusCode::BAD_REQUEST, "Failed to read request body");
            }
        };
        buffered.extend_from_slice(&chunk);
        if buffered.len() > MAX_SEARCH_BODY_BYTES {
            debug!(read = buffered.len(), "magic-search body too large to inspect; forwarding");
            let head = stream::once(async move { Ok::<_, axum::Error>(Bytes::from(buffered)) });
            let body = Body::from_stream(head.chain(chunks));
            return state.passthrough.forward(Request::from_parts(parts, body)).await;
        }
    }
    let bytes = Bytes::from(buffered);
    let query: MagicSearchRequest = match serde_json::from_slice(&bytes) {
        Ok(query) => query,
        Err(err) => {
            debug!(error = %err, "magic-search body is not valid json");
            return error_response(StatusCode::BAD_REQUEST, "Invalid JSON format");
        }
    };

    let text = match classify_keyword(&query.keyword) {
        SearchMode::Ocr(text) => text,
        SearchMode::Native => return passthrough_consumed(state, parts, bytes).await,
    };

    let session = session_from_headers(&parts.headers);
    let client = ClientKind::from_user_agent(
        parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok()),
    );
    info!(text, mobile = client.is_mobile(), "ocr search requested");

    match state.pipeline.run(text, &session, client).await {
        Ok(payload) => {
            info!(results = payload.len(), "ocr search served");
            (StatusCode::OK, Json(Envelope::success(payload))).into_response()
        }
        Err(err) => {
            error!(stage = err.stage(), error = %err, "ocr search failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err.public_message())
        }
    }
}

async fn passthrough_consumed<S, A, G>(
    state: &AppState<S, A, G>,
    parts: Parts,
    bytes: Bytes,
) -> Response {
    debug!("keyword has no ocr prefix; forwarding");
    state.passthrough.forward_bytes(parts, bytes).await
}

/// Caller credentials: every `Cookie` header plus the `accesstoken` header.
pub(crate) fn session_from_headers(headers: &HeaderMap) -> Session {
    let cookies = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(Session::parse_cookie_header)
        .collect();
    let access_token = headers
        .get(HEADER_ACCESS_TOKEN)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    Session::new(cookies, access_token)
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    (status, Json(Envelope::error(msg))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderName, HeaderValue};

    #[test]
    fn session_collects_all_cookie_headers() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("a=1; b=2"));
        headers.append(header::COOKIE, HeaderValue::from_static("c=3"));
        headers.insert(
            HeaderName::from_bytes(b"AccessToken").unwrap(),
            HeaderValue::from_static("tok"),
        );
        let session = session_from_headers(&headers);
        assert_eq!(session.cookie_header().as_deref(), Some("a=1; b=2; c=3"));
        assert_eq!(session.access_token, "tok");
    }

    #[test]
    fn missing_credentials_give_an_empty_session() {
        let session = session_from_headers(&HeaderMap::new());
        assert!(!session.has_cookies());
        assert!(session.access_token.is_empty());
    }
}
