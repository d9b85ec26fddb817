//! Transcript model, unique per (video, language).

use serde::{Deserialize, Serialize};
use val_core::types::Timestamp;

/// A stored transcript reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transcript {
    pub edx_video_id: String,
    pub language_code: String,
    pub provider: String,
    pub file_format: String,
    pub file_name: String,
    pub created_at: Timestamp,
}

/// DTO for creating a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateTranscript {
    pub edx_video_id: String,
    pub language_code: String,
    pub provider: String,
    pub file_format: String,
    pub file_name: String,
}
