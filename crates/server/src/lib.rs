//! HTTP front for fnOS: serves OCR-prefixed magic searches itself and
//! reverse-proxies every other request to the backend unchanged.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use fnos_proxy_core::traits::{AssetIndex, GalleryFetcher, MetadataStore};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

mod intercept;
pub mod passthrough;
pub mod pipeline;

pub use passthrough::{http_client as passthrough_client, Passthrough};
pub use pipeline::{OcrPipeline, PipelineError, DEFAULT_DEADLINE};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("io: {0}")]
    Io(String),
    #[error("config: {0}")]
    Config(String),
}

pub(crate) struct AppState<S, A, G> {
    pub(crate) pipeline: OcrPipeline<S, A, G>,
    pub(crate) passthrough: Passthrough,
}

pub struct Server<S, A, G> {
    state: Arc<AppState<S, A, G>>,
}

impl<S, A, G> Clone for Server<S, A, G> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<S, A, G> Server<S, A, G>
where
    S: MetadataStore + Send + Sync + 'static,
    A: AssetIndex + Send + Sync + 'static,
    G: GalleryFetcher + Send + Sync + 'static,
{
    pub fn new(pipeline: OcrPipeline<S, A, G>, passthrough: Passthrough) -> Self {
        Self {
            state: Arc::new(AppState {
                pipeline,
                passthrough,
            }),
        }
    }

    /// Every method and path lands in one handler; only the magic-search
    /// POST is handled locally.
    pub fn router(&self) -> Router {
        Router::new()
            .fallback(intercept::dispatch::<S, A, G>)
            .with_state(Arc::clone(&self.state))
    }

    /// Serves on `listener` until `shutdown` is cancelled, then drains
    /// in-flight connections.
    pub async fn serve(
        &self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), ServerError> {
        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
            })
            .await
            .map_err(|e| ServerError::Io(e.to_string()))
    }

    pub async fn run_http(&self, addr: &str) -> Result<(), ServerError> {
        let bind_addr: SocketAddr = addr
            .parse()
            .map_err(|e: std::net::AddrParseError| ServerError::Io(e.to_string()))?;
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| ServerError::Io(e.to_string()))?;

        let shutdown_token = CancellationToken::new();
        info!(
            %addr,
            upstream = %self.state.passthrough.upstream(),
            "http proxy listening"
        );
        let server = self.serve(listener, shutdown_token.child_token());
        tokio::pin!(server);

        tokio::select! {
            res = &mut server => res,
            _ = tokio::signal::ctrl_c() => {
                info!("ctrl_c received; shutting down http server");
                shutdown_token.cancel();
                server.as_mut().await
            }
        }
    }
}
