//! Client error types

/// Error type for Pomelo client operations
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("namespace not found: {0}")]
    NotFound(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("server returned status {0}")]
    ServerStatus(u16),

    #[error("all config services failed: {0}")]
    AllServersFailed(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("client is shut down")]
    Shutdown,
}

impl ClientError {
    /// Errors the caller may retry after backing off.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Transport(_)
                | ClientError::ServerStatus(_)
                | ClientError::AllServersFailed(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClientError::InvalidArgument("namespace is empty".to_string());
        assert_eq!(err.to_string(), "invalid argument: namespace is empty");

        let err = ClientError::ServerStatus(503);
        assert_eq!(err.to_string(), "server returned status 503");

        let err = ClientError::Shutdown;
        assert_eq!(err.to_string(), "client is shut down");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ClientError::ServerStatus(500).is_retryable());
        assert!(ClientError::AllServersFailed("x".to_string()).is_retryable());
        assert!(!ClientError::InvalidArgument("x".to_string()).is_retryable());
        assert!(!ClientError::NotFound("x".to_string()).is_retryable());
    }
}
