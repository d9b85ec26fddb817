//! Pure domain logic for the video registry tooling.
//!
//! No database, no network, no async. Identifier conventions, descriptor
//! parsing and rewriting, the interchange document, and the matcher that
//! resolves legacy descriptors to registry identifiers all live here.

pub mod candidate;
pub mod descriptor;
pub mod error;
pub mod ident;
pub mod interchange;
pub mod matcher;
pub mod types;
