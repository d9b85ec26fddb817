//! Course archive migration: rewrite every video descriptor of a course
//! export with its registry id, report what could not be matched, and
//! optionally hand the result back to the authoring site.

pub mod archive;
pub mod batch;
pub mod config;
pub mod error;
pub mod reconcile;
pub mod report;

pub use error::MigrateError;
