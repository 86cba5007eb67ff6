//! Collaboration engine.
//!
//! Each client runs a [`CollabSession`]: local operations queue until the
//! relay acknowledges them; remote operations are transformed against the
//! pending queue before application, so all clients converge on the same
//! document regardless of arrival order.
//!
//! Transform rules are intentionally small and type-specific:
//! - concurrent node inserts never conflict (distinct ids);
//! - concurrent node updates merge per field, last writer (by logical
//!   timestamp) wins per field;
//! - delete wins over concurrent edits referencing the deleted node; the
//!   losing operation is voided and surfaced;
//! - concurrent connections on one port pair: first in server order wins.
//!
//! Presence (cursors, selections) rides a separate non-authoritative
//! channel and is never transformed or persisted.

pub mod error;
pub mod presence;
pub mod session;
pub mod transform;
pub mod wire;

pub use error::{ConflictVoid, SyncError, VoidReason};
pub use presence::{PresenceState, PresenceTracker};
pub use session::{CollabSession, SessionEvent};
pub use wire::WireMessage;
