//! Resolver errors
//!
//! Every failure carries the request path so a log line alone is enough to
//! find the resource that broke the traversal.

use reqwest::StatusCode;

/// Errors produced while walking the Cloud Foundry resource graph
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The API answered 404 for a resource the traversal expected to exist
    #[error("invalid response [{status}] for GET {path}: {body}")]
    NotFound {
        path: String,
        status: StatusCode,
        body: String,
    },

    /// Any other non-2xx answer
    #[error("invalid response [{status}] for GET {path}: {body}")]
    Unavailable {
        path: String,
        status: StatusCode,
        body: String,
    },

    /// The request never produced a response
    #[error("GET {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    /// The body was not the envelope we expected
    #[error("invalid JSON for GET {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Bearer token acquisition failed
    #[error("failed to obtain access token from {token_url}: {reason}")]
    Auth { token_url: String, reason: String },
}

impl ResolveError {
    /// Path of the failing request, if the failure was tied to one
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::NotFound { path, .. }
            | Self::Unavailable { path, .. }
            | Self::Transport { path, .. }
            | Self::Decode { path, .. } => Some(path),
            Self::Auth { .. } => None,
        }
    }

    /// HTTP status of the failing response, if there was one
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::NotFound { status, .. } | Self::Unavailable { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
