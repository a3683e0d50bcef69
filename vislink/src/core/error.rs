use thiserror::Error;

use vislink_protocol::codes;

use crate::core::path::PathError;
use crate::graph::GraphError;

/// Engine-boundary error taxonomy.
///
/// Everything except unmatched responses (logged only) flows through this
/// type: resolution and graph failures raised while serving the peer, peer
/// errors reconstituted from failed responses, and local lifecycle failures.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error(transparent)]
    Resolution(#[from] PathError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("protocol violation: {0}")]
    Protocol(String),
    #[error("remote error {code}: {message}")]
    Remote { code: i64, message: String },
    #[error("link closed")]
    Closed,
    #[error("frame codec failed: {0}")]
    Codec(#[from] serde_json::Error),
}

impl LinkError {
    /// Numeric code carried in an outbound error response
    pub fn wire_code(&self) -> i64 {
        match self {
            LinkError::Resolution(_) => codes::NOT_FOUND,
            LinkError::Graph(GraphError::NoSuchMember(_))
            | LinkError::Graph(GraphError::NoSuchEvent(_)) => codes::NOT_FOUND,
            LinkError::Graph(_) => codes::INTERNAL_ERROR,
            LinkError::Protocol(_) => codes::INVALID_REQUEST,
            LinkError::Remote { code, .. } => *code,
            LinkError::Closed => codes::INTERNAL_ERROR,
            LinkError::Codec(_) => codes::PARSE_ERROR,
        }
    }
}
