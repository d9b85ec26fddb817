//! The candidate lookup contract used by the reconciler.

use async_trait::async_trait;
use val_core::candidate::RegistryVideo;
use val_store::{MemoryStore, VideoStore};

use crate::error::ClientError;

/// Read access to the registry's per-course video listing.
///
/// An empty list is a normal answer: the course simply has no registered
/// videos.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    async fn videos_for_course(&self, course_id: &str) -> Result<Vec<RegistryVideo>, ClientError>;
}

#[async_trait]
impl CandidateSource for MemoryStore {
    async fn videos_for_course(&self, course_id: &str) -> Result<Vec<RegistryVideo>, ClientError> {
        Ok(VideoStore::videos_for_course(self, course_id)?)
    }
}
