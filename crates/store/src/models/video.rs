//! Video record model and DTOs.

use serde::{Deserialize, Serialize};
use val_core::ident;
use val_core::types::{Timestamp, VideoStatus};
use validator::{Validate, ValidationError};

/// A registered video.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Video {
    pub edx_video_id: String,
    pub client_video_id: String,
    pub duration: f64,
    pub status: VideoStatus,
    pub created_at: Timestamp,
}

/// DTO for creating a new video.
#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
pub struct CreateVideo {
    #[validate(custom(function = "check_video_id"))]
    pub edx_video_id: String,
    #[validate(length(max = 255))]
    pub client_video_id: String,
    #[validate(range(min = 0.0))]
    pub duration: f64,
    pub status: VideoStatus,
}

fn check_video_id(id: &str) -> Result<(), ValidationError> {
    ident::validate_video_id(id).map_err(|msg| {
        let mut err = ValidationError::new("edx_video_id");
        err.message = Some(msg.into());
        err
    })
}
