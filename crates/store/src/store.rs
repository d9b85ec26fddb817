//! The registry persistence contract.

use val_core::candidate::RegistryVideo;
use val_core::error::CoreError;
use val_core::types::VideoStatus;

use crate::models::course_video::CourseVideo;
use crate::models::encoded_video::{CreateEncodedVideo, EncodedVideo};
use crate::models::profile::Profile;
use crate::models::transcript::{CreateTranscript, Transcript};
use crate::models::video::{CreateVideo, Video};

/// A video with everything it owns.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoDetail {
    pub video: Video,
    /// Ordered by profile name.
    pub encodings: Vec<EncodedVideo>,
    /// Visible and hidden links alike.
    pub courses: Vec<CourseVideo>,
    /// Ordered by language code.
    pub transcripts: Vec<Transcript>,
}

/// A batch of writes that must land together or not at all.
///
/// Rows that already exist when the batch is applied are left untouched;
/// applying the same batch twice is a no-op the second time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    pub video: Option<CreateVideo>,
    pub profiles: Vec<Profile>,
    pub encodings: Vec<CreateEncodedVideo>,
    pub transcripts: Vec<CreateTranscript>,
    /// `(edx_video_id, course_id)` links to get-or-create.
    pub course_links: Vec<(String, String)>,
}

/// What [`VideoStore::apply`] actually changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    pub video_created: bool,
    pub profiles_created: Vec<String>,
    pub encodings_created: usize,
    pub transcripts_created: usize,
    pub course_links_created: usize,
}

/// Read and write access to the video registry.
pub trait VideoStore: Send + Sync {
    fn get_video(&self, edx_video_id: &str) -> Result<Option<Video>, CoreError>;

    /// The video with its encodings, course links and transcripts.
    fn video_detail(&self, edx_video_id: &str) -> Result<Option<VideoDetail>, CoreError>;

    /// Create a video. Fails with [`CoreError::CannotCreate`] on invalid
    /// input or a duplicate id.
    fn create_video(&self, input: &CreateVideo) -> Result<Video, CoreError>;

    fn update_video_status(&self, edx_video_id: &str, status: VideoStatus)
        -> Result<Video, CoreError>;

    fn get_profile(&self, name: &str) -> Result<Option<Profile>, CoreError>;

    /// Fetch a profile, creating it with default geometry if missing.
    /// Returns the profile and whether it was created.
    fn get_or_create_profile(&self, name: &str) -> Result<(Profile, bool), CoreError>;

    fn list_profiles(&self) -> Result<Vec<Profile>, CoreError>;

    fn get_encoding(
        &self,
        edx_video_id: &str,
        profile: &str,
    ) -> Result<Option<EncodedVideo>, CoreError>;

    fn get_transcript(
        &self,
        edx_video_id: &str,
        language_code: &str,
    ) -> Result<Option<Transcript>, CoreError>;

    /// Visible videos linked to a course, in registry-listing form.
    fn videos_for_course(&self, course_id: &str) -> Result<Vec<RegistryVideo>, CoreError>;

    /// Every registered video, in registry-listing form.
    fn all_videos(&self) -> Result<Vec<RegistryVideo>, CoreError>;

    /// Ids of visible videos linked to a course.
    fn course_video_ids(&self, course_id: &str) -> Result<Vec<String>, CoreError> {
        Ok(self
            .videos_for_course(course_id)?
            .into_iter()
            .map(|v| v.edx_video_id)
            .collect())
    }

    /// Get-or-create a course link. Returns the link and whether it was created.
    fn get_or_create_course_video(
        &self,
        edx_video_id: &str,
        course_id: &str,
    ) -> Result<(CourseVideo, bool), CoreError>;

    /// Soft-remove a video from a course. Returns `true` if a visible link was hidden.
    fn hide_video_for_course(&self, edx_video_id: &str, course_id: &str)
        -> Result<bool, CoreError>;

    /// Set the course-specific thumbnail image of a linked video.
    fn update_video_image(
        &self,
        edx_video_id: &str,
        course_id: &str,
        image: &str,
    ) -> Result<CourseVideo, CoreError>;

    /// Apply a batch atomically.
    fn apply(&self, batch: &WriteBatch) -> Result<BatchResult, CoreError>;
}
