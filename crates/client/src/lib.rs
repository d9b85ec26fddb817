//! Clients for the video registry and the course-import endpoint.
//!
//! - [`source::CandidateSource`] is the read contract the reconciler
//!   depends on, with implementations over HTTP ([`registry::RegistryApi`])
//!   and over an in-process [`val_store::VideoStore`].
//! - [`aliases::CourseAliases`] wraps any source with the renamed-course
//!   compatibility lookup.
//! - [`upload::StudioApi`] sends rewritten archives in chunks and polls the
//!   import status until it settles.

pub mod aliases;
pub mod error;
mod http;
pub mod registry;
pub mod source;
pub mod upload;

pub use aliases::CourseAliases;
pub use error::ClientError;
pub use registry::RegistryApi;
pub use source::CandidateSource;
pub use upload::StudioApi;
