//! Course association model.
//!
//! Links are soft-removed by setting `is_hidden` so a course's history is
//! kept.

use serde::Serialize;
use val_core::types::Timestamp;

/// A link between a video and a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseVideo {
    pub edx_video_id: String,
    pub course_id: String,
    pub is_hidden: bool,
    /// Course-specific thumbnail image file name.
    pub image: Option<String>,
    pub created_at: Timestamp,
}
