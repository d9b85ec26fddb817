//! Errors of a migration run.

use val_client::ClientError;
use val_core::error::CoreError;

use crate::archive::ArchiveError;

#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl MigrateError {
    /// Whether the whole batch must stop, not just the current course.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Client(e) if e.is_fatal())
    }
}

/// Step of a course run, recorded with its failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Read,
    Match,
    Write,
    Upload,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Match => "match",
            Self::Write => "write",
            Self::Upload => "upload",
        }
    }

    /// Stage at which a reconciliation error happened.
    pub fn of_reconcile_error(error: &MigrateError) -> Self {
        match error {
            MigrateError::Archive(ArchiveError::Write(_)) => Self::Write,
            MigrateError::Client(_) => Self::Match,
            _ => Self::Read,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_errors_stop_the_batch() {
        let err = MigrateError::from(ClientError::Permissions { status: 401 });
        assert!(err.is_fatal());
        let err = MigrateError::from(ArchiveError::malformed("bad"));
        assert!(!err.is_fatal());
        assert!(!MigrateError::Config("no course id".to_string()).is_fatal());
    }

    #[test]
    fn stages_follow_error_kind() {
        let write = MigrateError::from(ArchiveError::Write(std::io::Error::other("disk full")));
        assert_eq!(Stage::of_reconcile_error(&write), Stage::Write);
        let read = MigrateError::from(ArchiveError::malformed("truncated"));
        assert_eq!(Stage::of_reconcile_error(&read), Stage::Read);
        let fetch = MigrateError::from(ClientError::Api {
            status: 500,
            body: String::new(),
        });
        assert_eq!(Stage::of_reconcile_error(&fetch), Stage::Match);
        assert_eq!(Stage::Upload.to_string(), "upload");
    }
}
