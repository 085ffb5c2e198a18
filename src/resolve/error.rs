use axum::http::StatusCode;

use crate::metrics::Outcome;

use super::engine::ENTRY_FILE_CANDIDATES;

pub const EXPECTED_PATTERN: &str = "/:user/:repo{@:version}?/:path(.*)";

/// Terminal failure of one resolution.  Every variant maps to an HTTP
/// status and carries a message telling the caller how to fix the request.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    /// The metadata API answered with a non-2xx status other than a rate
    /// limit.  Status and body are passed through.
    #[error("GitHub API returned {status} for {user}/{repo}: {body}")]
    Upstream {
        user: String,
        repo: String,
        status: StatusCode,
        body: String,
    },

    /// Rate-limited and no conventional branch could be confirmed.
    #[error(
        "GitHub API rate limit exceeded while looking up the default branch of {user}/{repo}{}, \
         and none of the conventional branches (master, main) could be confirmed. \
         Request an explicit version (/{user}/{repo}@<ref>/...) or send an Authorization \
         header to use your own API quota.",
        retry_hint(.retry_after_secs)
    )]
    Forbidden {
        user: String,
        repo: String,
        retry_after_secs: Option<u64>,
    },

    /// No conventional entry file exists in the requested directory.
    #[error(
        "no entry file found in {} of {user}/{repo}@{git_ref}. \
         Request an explicit file path or add one of: {}",
        directory_label(.directory),
        ENTRY_FILE_CANDIDATES.join(", ")
    )]
    PathUndiscoverable {
        user: String,
        repo: String,
        git_ref: String,
        directory: String,
    },

    /// The request path does not follow the URL grammar.
    #[error("{path:?} needs to match pattern '{}'", EXPECTED_PATTERN)]
    Malformed { path: String },

    /// Transport or decoding failure talking to the metadata API.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ResolutionError {
    pub fn status(&self) -> StatusCode {
        match self {
            ResolutionError::Upstream { status, .. } => *status,
            ResolutionError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ResolutionError::PathUndiscoverable { .. } | ResolutionError::Malformed { .. } => {
                StatusCode::BAD_REQUEST
            }
            ResolutionError::Internal(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn outcome(&self) -> Outcome {
        match self {
            ResolutionError::Upstream { .. } => Outcome::Upstream,
            ResolutionError::Forbidden { .. } => Outcome::Forbidden,
            ResolutionError::PathUndiscoverable { .. } => Outcome::PathUndiscoverable,
            ResolutionError::Malformed { .. } => Outcome::Malformed,
            ResolutionError::Internal(_) => Outcome::Internal,
        }
    }

    /// Text shown to the caller.  Upstream errors pass the body through
    /// untouched; everything else uses the display message.
    pub fn user_message(&self) -> String {
        match self {
            ResolutionError::Upstream { body, .. } => body.clone(),
            ResolutionError::Internal(err) => format!("upstream request failed: {err:#}"),
            other => other.to_string(),
        }
    }
}

fn retry_hint(retry_after_secs: &Option<u64>) -> String {
    match retry_after_secs {
        Some(secs) => format!(" (quota resets in {secs}s)"),
        None => String::new(),
    }
}

fn directory_label(directory: &str) -> String {
    if directory.is_empty() {
        "the repository root".to_string()
    } else {
        format!("directory '{directory}'")
    }
}
