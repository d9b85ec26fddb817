//! Encoded variant model: one delivery URL per (video, profile).

use serde::{Deserialize, Serialize};
use val_core::types::Timestamp;

/// A stored encoding of a video for one profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncodedVideo {
    pub edx_video_id: String,
    pub profile: String,
    pub url: String,
    pub file_size: u64,
    pub bitrate: u32,
    pub created_at: Timestamp,
}

/// DTO for creating an encoded variant.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateEncodedVideo {
    pub edx_video_id: String,
    pub profile: String,
    pub url: String,
    pub file_size: u64,
    pub bitrate: u32,
}
