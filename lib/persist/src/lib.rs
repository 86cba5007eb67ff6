//! Persistence gateway.
//!
//! [`DocumentStore`] is the async boundary between the synchronous client
//! core and whatever holds documents at rest. Stores deal exclusively in
//! [`DocumentSnapshot`]s, the same record the collaboration snapshot
//! message carries, so persistence and resync share one format.
//!
//! Saves are idempotent per revision: retrying a save of the same
//! revision is safe and cheap.

pub mod error;
pub mod store;

pub use error::PersistError;
pub use store::{DocumentStore, FileStore, MemoryStore};
