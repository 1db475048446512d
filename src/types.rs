//! Shared error and result types

use thiserror::Error;

/// Errors surfaced by the atheneum service
#[derive(Debug, Error)]
pub enum AtheneumError {
    /// MongoDB connection or query failures
    #[error("Database error: {0}")]
    Database(String),

    /// NATS connection or publish failures
    #[error("NATS error: {0}")]
    Nats(String),

    /// Graph store (Neo4j) failures
    #[error("Graph error: {0}")]
    Graph(String),

    /// ML extraction service failures
    #[error("Extraction error: {0}")]
    Ml(String),

    /// Hosted LLM call failures
    #[error("LLM error: {0}")]
    Llm(String),

    /// Request body or parameter validation failures
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing or malformed requester identity
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Acting user lacks ownership or role for the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Record lookup miss
    #[error("Not found: {0}")]
    NotFound(String),

    /// Service at capacity (pipeline queue full)
    #[error("Overloaded: {0}")]
    Overloaded(String),

    /// Internal invariant violations (closed channels, poisoned state)
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AtheneumError {
    /// Stable machine-readable code for JSON error bodies
    pub fn code(&self) -> &'static str {
        match self {
            Self::Database(_) => "DATABASE_ERROR",
            Self::Nats(_) => "NATS_ERROR",
            Self::Graph(_) => "GRAPH_ERROR",
            Self::Ml(_) => "EXTRACTION_ERROR",
            Self::Llm(_) => "LLM_UNAVAILABLE",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Overloaded(_) => "OVERLOADED",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Io(_) => "IO_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, AtheneumError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(AtheneumError::Llm("down".into()).code(), "LLM_UNAVAILABLE");
        assert_eq!(
            AtheneumError::Validation("missing".into()).code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(AtheneumError::NotFound("x".into()).code(), "NOT_FOUND");
    }

    #[test]
    fn display_includes_message() {
        let err = AtheneumError::Ml("service unreachable".into());
        assert!(err.to_string().contains("service unreachable"));
    }
}
