//! Transparent reverse proxy to the fnOS backend.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::{Body, Bytes, HttpBody},
    extract::ConnectInfo,
    http::{header, request::Parts, HeaderMap, HeaderName, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use fnos_proxy_proto::Envelope;
use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;
use tracing::{debug, info_span, warn, Instrument};
use url::Url;

use crate::ServerError;

/// Connection-scoped headers that are never forwarded in either direction.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Client for proxied traffic. Redirects go back to the caller untouched and
/// there is no overall timeout, since responses may be long media streams.
pub fn http_client(connect_timeout: Duration) -> Result<reqwest::Client, ServerError> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .connect_timeout(connect_timeout)
        .build()
        .map_err(|e| ServerError::Config(format!("passthrough client: {e}")))
}

#[derive(Clone, Debug)]
pub struct Passthrough {
    http: reqwest::Client,
    upstream: Url,
}

impl Passthrough {
    pub fn new(http: reqwest::Client, upstream: &str) -> Result<Self, ServerError> {
        let upstream =
            Url::parse(upstream).map_err(|e| ServerError::Config(format!("upstream url: {e}")))?;
        if upstream.cannot_be_a_base() {
            return Err(ServerError::Config(format!(
                "upstream url {upstream} cannot carry a path"
            )));
        }
        Ok(Self { http, upstream })
    }

    pub fn upstream(&self) -> &Url {
        &self.upstream
    }

    /// Forwards a request whose body has not been read yet; the body is
    /// streamed through without buffering. Upgrade requests are tunnelled.
    pub async fn forward(&self, mut req: axum::extract::Request) -> Response {
        if let Some(protocol) = upgrade_protocol(req.headers()) {
            let inbound = hyper::upgrade::on(&mut req);
            let (parts, _) = req.into_parts();
            return self.forward_upgrade(parts, protocol, inbound).await;
        }
        let (parts, body) = req.into_parts();
        let body = if HttpBody::is_end_stream(&body) {
            reqwest::Body::from(Bytes::new())
        } else {
            reqwest::Body::wrap_stream(body.into_data_stream())
        };
        self.forward_parts(parts, body).await
    }

    /// Forwards a request whose body was already consumed; `body` holds the
    /// exact bytes that were read.
    pub async fn forward_bytes(&self, parts: Parts, body: Bytes) -> Response {
        self.forward_parts(parts, reqwest::Body::from(body)).await
    }

    async fn forward_parts(&self, parts: Parts, body: reqwest::Body) -> Response {
        let method = parts.method.clone();
        let path = parts.uri.path().to_string();
        let headers = outbound_headers(&parts);
        match self.send(parts, headers, body).await {
            Ok(upstream) => relay(upstream, StripMode::All),
            Err(err) => {
                warn!(%method, %path, error = %err, "upstream request failed");
                proxy_error(&err)
            }
        }
    }

    /// Sends the handshake upstream; on `101 Switching Protocols` both
    /// connections are spliced once the caller has received the 101.
    async fn forward_upgrade(&self, parts: Parts, protocol: HeaderValue, inbound: OnUpgrade) -> Response {
        let path = parts.uri.path().to_string();
        let mut headers = outbound_headers(&parts);
        headers.insert(header::CONNECTION, HeaderValue::from_static("upgrade"));
        headers.insert(header::UPGRADE, protocol.clone());

        let upstream = match self.send(parts, headers, reqwest::Body::from(Bytes::new())).await {
            Ok(upstream) => upstream,
            Err(err) => {
                warn!(%path, error = %err, "upstream upgrade request failed");
                return proxy_error(&err);
            }
        };
        if upstream.status() != StatusCode::SWITCHING_PROTOCOLS {
            debug!(%path, status = %upstream.status(), "upstream declined upgrade");
            return relay(upstream, StripMode::All);
        }

        debug!(%path, ?protocol, "upgrading connection");
        let response = relay_head(&upstream, StripMode::KeepUpgrade);
        tokio::spawn(tunnel(upstream, inbound).instrument(info_span!("upgrade", %path)));
        response
    }

    async fn send(
        &self,
        parts: Parts,
        headers: HeaderMap,
        body: reqwest::Body,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let url = self.target_url(&parts.uri);
        debug!(method = %parts.method, %url, "forwarding upstream");
        self.http
            .request(parts.method, url)
            .headers(headers)
            .body(body)
            .send()
            .await
    }

    /// Upstream base path joined with the inbound path; the query is kept verbatim.
    fn target_url(&self, uri: &Uri) -> Url {
        let mut url = self.upstream.clone();
        let base = self.upstream.path().trim_end_matches('/');
        url.set_path(&format!("{base}{}", uri.path()));
        url.set_query(uri.query());
        url
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StripMode {
    All,
    KeepUpgrade,
}

/// Inbound headers minus hop-by-hop ones, plus the caller's address in
/// `x-forwarded-for`. The caller's `Host` is kept.
fn outbound_headers(parts: &Parts) -> HeaderMap {
    let mut headers = parts.headers.clone();
    strip_hop_by_hop(&mut headers);
    if !headers.contains_key(header::HOST) {
        // HTTP/2 callers carry the host in the request target.
        if let Some(host) = parts
            .uri
            .authority()
            .and_then(|a| HeaderValue::from_str(a.as_str()).ok())
        {
            headers.insert(header::HOST, host);
        }
    }
    if let Some(ConnectInfo(peer)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
        append_forwarded_for(&mut headers, peer);
    }
    headers
}

fn relay(upstream: reqwest::Response, mode: StripMode) -> Response {
    let head = relay_head(&upstream, mode);
    let (parts, _) = head.into_parts();
    Response::from_parts(parts, Body::from_stream(upstream.bytes_stream()))
}

/// Status and headers of an upstream response, with an empty body.
fn relay_head(upstream: &reqwest::Response, mode: StripMode) -> Response {
    let mut headers = upstream.headers().clone();
    let accepted = headers.get(header::UPGRADE).cloned();
    strip_hop_by_hop(&mut headers);
    if mode == StripMode::KeepUpgrade {
        headers.insert(header::CONNECTION, HeaderValue::from_static("upgrade"));
        if let Some(protocol) = accepted {
            headers.insert(header::UPGRADE, protocol);
        }
    }
    let mut response = Response::new(Body::empty());
    *response.status_mut() = upstream.status();
    *response.headers_mut() = headers;
    response
}

async fn tunnel(upstream: reqwest::Response, inbound: OnUpgrade) {
    let mut upstream = match upstream.upgrade().await {
        Ok(io) => io,
        Err(err) => {
            warn!(error = %err, "upstream connection did not upgrade");
            return;
        }
    };
    let mut inbound = match inbound.await {
        Ok(io) => TokioIo::new(io),
        Err(err) => {
            warn!(error = %err, "caller connection did not upgrade");
            return;
        }
    };
    match tokio::io::copy_bidirectional(&mut inbound, &mut upstream).await {
        Ok((sent, received)) => debug!(sent, received, "upgraded connection closed"),
        Err(err) => debug!(error = %err, "upgraded connection ended"),
    }
}

/// Protocol named in `Upgrade` when `Connection` carries the `upgrade` token.
fn upgrade_protocol(headers: &HeaderMap) -> Option<HeaderValue> {
    let requested = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));
    if !requested {
        return None;
    }
    headers.get(header::UPGRADE).cloned()
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    // Headers named by Connection are connection-scoped too.
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, peer: &SocketAddr) {
    let ip = peer.ip().to_string();
    let value = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(prior) => format!("{prior}, {ip}"),
        None => ip,
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

fn proxy_error(err: &reqwest::Error) -> Response {
    (
        StatusCode::BAD_GATEWAY,
        Json(Envelope::error(format!("Proxy error: {err}"))),
    )
        .into_response()
}
