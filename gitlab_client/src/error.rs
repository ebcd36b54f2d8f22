use reqwest::StatusCode;

/// Failure of a single facade call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FacadeError {
    /// Transient network or service fault; a later run may succeed.
    #[error("remote service unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The newest pipeline exists but has not been picked up by a runner yet.
    #[error("pipeline {pipeline_id} is still pending")]
    Pending { pipeline_id: u64 },

    /// The service answered with a body that does not match the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl FacadeError {
    /// Classifies a non-success HTTP status for the request described by `what`.
    pub fn from_status(status: StatusCode, what: &str) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                FacadeError::Unauthorized(format!("{what}: HTTP {status}"))
            }
            StatusCode::NOT_FOUND => FacadeError::NotFound(what.to_string()),
            _ => FacadeError::RemoteUnavailable(format!("{what}: HTTP {status}")),
        }
    }
}

impl From<reqwest::Error> for FacadeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            FacadeError::Malformed(e.to_string())
        } else {
            FacadeError::RemoteUnavailable(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_onto_taxonomy() {
        assert!(matches!(
            FacadeError::from_status(StatusCode::FORBIDDEN, "branch"),
            FacadeError::Unauthorized(_)
        ));
        assert_eq!(
            FacadeError::from_status(StatusCode::NOT_FOUND, "branch lab1"),
            FacadeError::NotFound("branch lab1".into())
        );
        assert!(matches!(
            FacadeError::from_status(StatusCode::BAD_GATEWAY, "trace"),
            FacadeError::RemoteUnavailable(_)
        ));
        assert!(matches!(
            FacadeError::from_status(StatusCode::TOO_MANY_REQUESTS, "trace"),
            FacadeError::RemoteUnavailable(_)
        ));
    }
}
