//! Video registry records, the store contract, and the interchange
//! import/export merger.

pub mod interchange;
pub mod memory;
pub mod models;
pub mod store;

pub use memory::MemoryStore;
pub use store::{BatchResult, VideoDetail, VideoStore, WriteBatch};
