//! Registry-side view of a video, as returned by the course listing.

use serde::{Deserialize, Serialize};

use crate::types::YOUTUBE_PROFILE;

/// One encoding of a registry video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedUrl {
    pub profile: String,
    pub url: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub bitrate: u32,
}

/// A registry video considered during matching for a given course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryVideo {
    pub edx_video_id: String,
    #[serde(default)]
    pub client_video_id: String,
    #[serde(default)]
    pub encoded_videos: Vec<EncodedUrl>,
}

impl RegistryVideo {
    /// The stored `youtube` profile value, if any.
    pub fn youtube_url(&self) -> Option<&str> {
        self.encoded_videos
            .iter()
            .find(|e| e.profile == YOUTUBE_PROFILE)
            .map(|e| e.url.as_str())
    }

    /// Whether this video has a `youtube` encoding equal to `youtube_id`,
    /// ignoring whitespace around the stored value.
    pub fn has_youtube_id(&self, youtube_id: &str) -> bool {
        self.encoded_videos
            .iter()
            .any(|e| e.profile == YOUTUBE_PROFILE && e.url.trim() == youtube_id)
    }
}
