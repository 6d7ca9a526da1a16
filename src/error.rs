use std::path::PathBuf;
use thiserror::Error;

/// Result type alias used across the crate
pub type Result<T> = std::result::Result<T, VisualReviewError>;

/// Errors raised while talking to the VisualReview server or the browser driver
#[derive(Error, Debug)]
pub enum VisualReviewError {
    /// Network-level failure (DNS, refused connection, TLS)
    #[error("transport error on {method} {path}: {message}")]
    Transport {
        method: String,
        path: String,
        message: String,
    },

    /// HTTP status in [400, 600)
    #[error("server error on {method} {path}: code {status}: {body}")]
    Server {
        method: String,
        path: String,
        status: u16,
        body: String,
    },

    /// Response (or stored data) with an unexpected shape
    #[error("protocol error on {context}: {message}")]
    Protocol { context: String, message: String },

    /// Element size/location query failed
    #[error("geometry error: {0}")]
    Geometry(String),

    /// Capability, window size or screenshot capture failed in the driver
    #[error("driver error: {0}")]
    Driver(String),

    #[error("{0}")]
    Precondition(String),

    #[error("server API version mismatch: expected {expected}, server reports {actual}")]
    VersionMismatch { expected: String, actual: String },

    #[error("run identity file {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    /// Inner error annotated with the project/suite/run prefix
    #[error("{prefix} {source}")]
    Scoped {
        prefix: String,
        #[source]
        source: Box<VisualReviewError>,
    },
}

impl VisualReviewError {
    /// Wraps the error with a log prefix, keeping the original as source
    pub fn scoped(self, prefix: impl Into<String>) -> Self {
        VisualReviewError::Scoped {
            prefix: prefix.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error, looking through any number of scopes
    pub fn root(&self) -> &VisualReviewError {
        match self {
            VisualReviewError::Scoped { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_precondition(&self) -> bool {
        matches!(self.root(), VisualReviewError::Precondition(_))
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self.root(), VisualReviewError::Protocol { .. })
    }

    pub(crate) fn protocol(context: impl Into<String>, message: impl Into<String>) -> Self {
        VisualReviewError::Protocol {
            context: context.into(),
            message: message.into(),
        }
    }
}
