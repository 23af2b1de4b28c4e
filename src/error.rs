use crate::model::EntityKind;
use crate::store::StoreError;

/// All errors that can abort an import operation.
///
/// Problems with a single record inside an otherwise valid batch are not
/// errors; they are tallied as [`RecordFailure`](crate::model::RecordFailure)s
/// on the [`ImportReport`](crate::ImportReport).
#[derive(thiserror::Error, Debug)]
pub enum ImportError {
    /// HTTP request failed (network, DNS, TLS, timeout, etc.).
    #[error("http request failed for {url}: {source}")]
    Http {
        url: String,
        source: reqwest::Error,
    },

    /// Server returned a non-success HTTP status code.
    #[error("unexpected status {status} for {url}")]
    UnexpectedStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    /// Failed to read the response body as text.
    #[error("failed to read response body from {url}: {source}")]
    ResponseBody {
        url: String,
        source: reqwest::Error,
    },

    /// The response body did not have the expected top-level shape.
    #[error("malformed payload from {context}: {source}")]
    Parse {
        context: String,
        source: serde_json::Error,
    },

    /// Reading from or writing to the local store failed.
    #[error(transparent)]
    Store(StoreError),

    /// An entity the operation depends on is not in the local store.
    #[error("{kind} {key} not found in local store")]
    NotFound { kind: EntityKind, key: String },

    /// The caller cancelled the operation before it finished.
    #[error("import cancelled")]
    Cancelled,
}

impl ImportError {
    /// Whether the remote source could not be reached or answered badly.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            Self::Http { .. } | Self::UnexpectedStatus { .. } | Self::ResponseBody { .. }
        )
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }

    pub fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<StoreError> for ImportError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Missing { kind, key } => Self::NotFound { kind, key },
            other => Self::Store(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;
