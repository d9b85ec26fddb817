use serde::{Deserialize, Serialize};

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Name of the profile whose "url" holds a YouTube video id rather than a URL.
pub const YOUTUBE_PROFILE: &str = "youtube";

// ---------------------------------------------------------------------------
// Video lifecycle status
// ---------------------------------------------------------------------------

/// Lifecycle status of a registered video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    Upload,
    Uploading,
    Ingest,
    TranscodeQueue,
    TranscodeActive,
    Transcoding,
    FileDelivered,
    FileComplete,
    FileCorrupt,
    FileFailed,
    PipelineError,
    InvalidToken,
    Imported,
    TranscriptionInProgress,
    TranscriptReady,
}

impl VideoStatus {
    /// Return the status name as stored in the registry.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Uploading => "uploading",
            Self::Ingest => "ingest",
            Self::TranscodeQueue => "transcode_queue",
            Self::TranscodeActive => "transcode_active",
            Self::Transcoding => "transcoding",
            Self::FileDelivered => "file_delivered",
            Self::FileComplete => "file_complete",
            Self::FileCorrupt => "file_corrupt",
            Self::FileFailed => "file_failed",
            Self::PipelineError => "pipeline_error",
            Self::InvalidToken => "invalid_token",
            Self::Imported => "imported",
            Self::TranscriptionInProgress => "transcription_in_progress",
            Self::TranscriptReady => "transcript_ready",
        }
    }

    /// Parse a status string. Returns `None` for unknown values.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "upload" => Some(Self::Upload),
            "uploading" => Some(Self::Uploading),
            "ingest" => Some(Self::Ingest),
            "transcode_queue" => Some(Self::TranscodeQueue),
            "transcode_active" => Some(Self::TranscodeActive),
            "transcoding" => Some(Self::Transcoding),
            "file_delivered" => Some(Self::FileDelivered),
            "file_complete" => Some(Self::FileComplete),
            "file_corrupt" => Some(Self::FileCorrupt),
            "file_failed" => Some(Self::FileFailed),
            "pipeline_error" => Some(Self::PipelineError),
            "invalid_token" => Some(Self::InvalidToken),
            "imported" => Some(Self::Imported),
            "transcription_in_progress" => Some(Self::TranscriptionInProgress),
            "transcript_ready" => Some(Self::TranscriptReady),
            _ => None,
        }
    }

    /// All valid status values.
    pub const ALL: &'static [&'static str] = &[
        "upload",
        "uploading",
        "ingest",
        "transcode_queue",
        "transcode_active",
        "transcoding",
        "file_delivered",
        "file_complete",
        "file_corrupt",
        "file_failed",
        "pipeline_error",
        "invalid_token",
        "imported",
        "transcription_in_progress",
        "transcript_ready",
    ];
}

impl std::fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
