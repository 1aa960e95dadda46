use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while indexing, parsing, or evaluating rules.
///
/// None of these abort sibling work: callers record them against the file,
/// rule, or component they belong to and continue.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("failed to parse {}: {diagnostic}", .path.display())]
    Parse { path: PathBuf, diagnostic: String },

    #[error("module '{module}' has no source file at {}", .path.display())]
    MissingFile { module: String, path: PathBuf },

    #[error("rule '{rule}' was not dispatched: {reason}")]
    RuleDispatch { rule: String, reason: String },

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("analysis cancelled")]
    Cancelled,

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures of the model-backed analyzer handed to analyzer rules.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("analyzer request timed out")]
    Timeout,
    #[error("analyzer network error: {0}")]
    Http(String),
    #[error("analyzer returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("analyzer returned an unusable response: {0}")]
    InvalidResponse(String),
    #[error("analyzer unavailable: {0}")]
    Unavailable(String),
}

impl UpstreamError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            UpstreamError::Timeout | UpstreamError::Http(_) => true,
            UpstreamError::Status { status, .. } => *status == 429 || *status >= 500,
            UpstreamError::InvalidResponse(_) | UpstreamError::Unavailable(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_message_names_file() {
        let err = AnalysisError::Parse {
            path: PathBuf::from("domain/order.py"),
            diagnostic: "syntax error at 3:5".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to parse domain/order.py: syntax error at 3:5"
        );
    }

    #[test]
    fn test_transient_upstream_errors() {
        assert!(UpstreamError::Timeout.is_transient());
        assert!(UpstreamError::Status {
            status: 503,
            body: String::new()
        }
        .is_transient());
        assert!(UpstreamError::Status {
            status: 429,
            body: String::new()
        }
        .is_transient());
        assert!(!UpstreamError::Status {
            status: 401,
            body: String::new()
        }
        .is_transient());
        assert!(!UpstreamError::InvalidResponse("not json".to_string()).is_transient());
    }
}
