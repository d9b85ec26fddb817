//! Registry record structs and DTOs.
//!
//! Each submodule contains:
//! - A `Serialize` record struct as held by the store
//! - A `Deserialize` create DTO for inserts

pub mod course_video;
pub mod encoded_video;
pub mod profile;
pub mod transcript;
pub mod video;
