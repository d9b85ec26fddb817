//! Errors from the registry and course-import clients.

use val_core::error::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote side returned a non-2xx status code.
    #[error("API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The credentials were rejected (HTTP 401 or 403).
    #[error("Permission denied ({status}); check the API token")]
    Permissions { status: u16 },

    /// The course import reported a failure status.
    #[error("Course import failed at stage {stage}")]
    UploadFailed { stage: i64 },

    /// A local store backing a candidate source failed.
    #[error(transparent)]
    Store(#[from] CoreError),

    /// Reading the archive to upload failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Whether this error means every later request will fail too, so a
    /// batch run should stop instead of moving on to the next course.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Permissions { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_permission_errors_are_fatal() {
        assert!(ClientError::Permissions { status: 403 }.is_fatal());
        assert!(!ClientError::Api {
            status: 500,
            body: String::new()
        }
        .is_fatal());
        assert!(!ClientError::UploadFailed { stage: -2 }.is_fatal());
        assert!(!ClientError::Store(CoreError::video_not_found("v")).is_fatal());
    }
}
