//! Storage layer
//!
//! `DocumentStore` is the seam the rest of the service talks to. MongoDB
//! backs it in production; the in-memory store backs development fallback
//! and tests. `TimedStore` bounds every call of whichever backend is live.

pub mod memory;
pub mod mongo;
pub mod schemas;
pub mod store;
pub mod timed;

#[cfg(test)]
pub(crate) mod faulty;

pub use memory::MemoryStore;
pub use mongo::{IntoIndexes, MongoClient, MongoStore};
pub use store::{DeleteOutcome, DocumentStore, InsertOutcome, UpdateOutcome};
pub use timed::TimedStore;
