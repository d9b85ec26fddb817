//! Encoding profiles (`mobile`, `desktop`, `hls`, `youtube`, ...).

use serde::{Deserialize, Serialize};

/// Width assigned to profiles created on the fly by an import.
pub const DEFAULT_PROFILE_WIDTH: u32 = 1280;

/// Height assigned to profiles created on the fly by an import.
pub const DEFAULT_PROFILE_HEIGHT: u32 = 720;

/// A named encoding target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub width: u32,
    pub height: u32,
}

impl Profile {
    /// A profile with the default import geometry.
    pub fn with_default_geometry(name: &str) -> Self {
        Self {
            name: name.to_string(),
            width: DEFAULT_PROFILE_WIDTH,
            height: DEFAULT_PROFILE_HEIGHT,
        }
    }
}
