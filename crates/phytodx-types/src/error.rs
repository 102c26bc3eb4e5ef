use thiserror::Error;

/// Errors from the remote diagnosis and soil services.
///
/// Every variant is transient from the workflow's point of view: the step
/// that produced it records a user-facing message and can be retried.
/// Domain outcomes such as an invalid inference are not errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("service returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },

    #[error("request cancelled")]
    Cancelled,

    #[error("local asset unreadable: {0}")]
    Asset(String),
}

impl RemoteError {
    /// Message shown next to the failed step.
    pub fn user_message(&self, operation: &str) -> String {
        match self {
            RemoteError::Timeout { secs, .. } => {
                format!("{operation} did not respond within {secs}s; please retry")
            }
            RemoteError::Status { status, .. } if *status >= 500 => {
                format!("{operation} failed: the service is unavailable ({status}); please retry")
            }
            RemoteError::Status { status, message } => {
                format!("{operation} was rejected ({status}): {message}")
            }
            RemoteError::Transport(_) => {
                format!("{operation} failed: could not reach the service; please retry")
            }
            RemoteError::Decode(_) => {
                format!("{operation} failed: the service sent an unexpected response")
            }
            RemoteError::Asset(detail) => format!("{operation} failed: {detail}"),
            RemoteError::Cancelled => format!("{operation} was cancelled"),
        }
    }
}

/// Errors from session store operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("io error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_mentions_retry() {
        let err = RemoteError::Timeout {
            operation: "upload".to_string(),
            secs: 60,
        };
        assert_eq!(err.to_string(), "upload timed out after 60s");
        assert!(err.user_message("Image upload").contains("retry"));
    }

    #[test]
    fn test_status_message_distinguishes_server_errors() {
        let server = RemoteError::Status {
            status: 503,
            message: "busy".to_string(),
        };
        assert!(server.user_message("Detection").contains("unavailable"));

        let client = RemoteError::Status {
            status: 413,
            message: "image too large".to_string(),
        };
        let msg = client.user_message("Image upload");
        assert!(msg.contains("413"));
        assert!(msg.contains("image too large"));
    }

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Io("disk full".to_string());
        assert_eq!(err.to_string(), "io error: disk full");
    }
}
