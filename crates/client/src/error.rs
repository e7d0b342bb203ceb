use fnos_proxy_core::model::PhotoId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http client setup: {0}")]
    Setup(String),
    #[error("{context}: transport error: {message}")]
    Transport {
        context: &'static str,
        message: String,
    },
    #[error("{context}: unexpected status {status}")]
    Status { context: &'static str, status: u16 },
    #[error("{context}: malformed response: {message}")]
    Decode {
        context: &'static str,
        message: String,
    },
    #[error("signature rejected by delegate (status {0:?})")]
    SignRejected(String),
    #[error("gallery item {id}: {source}")]
    Item {
        id: PhotoId,
        #[source]
        source: Box<ClientError>,
    },
    #[error("gallery fetch task failed: {0}")]
    Task(String),
    #[error("{} of {total} gallery fetches failed; first: {}", .failures.len(), first_failure(.failures))]
    Batch {
        total: usize,
        failures: Vec<ClientError>,
    },
}

impl ClientError {
    /// The request URL is dropped from the message; it can carry the index api key.
    pub(crate) fn transport(context: &'static str, err: reqwest::Error) -> Self {
        ClientError::Transport {
            context,
            message: err.without_url().to_string(),
        }
    }

    pub(crate) fn item(id: PhotoId, err: ClientError) -> Self {
        ClientError::Item {
            id,
            source: Box::new(err),
        }
    }
}

fn first_failure(failures: &[ClientError]) -> String {
    failures
        .first()
        .map(ToString::to_string)
        .unwrap_or_default()
}
