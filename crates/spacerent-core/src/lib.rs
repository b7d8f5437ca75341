//! Domain types for the spacerent client.
//!
//! This crate holds the value objects shared by the client:
//! - authenticated identity and role records
//! - the notification value delivered over the broker
//! - broker topic names and the role-based selection policy
//! - the session persistence seam (file-backed and in-memory stores)

mod identity;
mod notification;
mod session;
mod topic;

pub use identity::{Identity, Role};
pub use notification::{Notification, kinds, parse_timestamp};
pub use session::{FileSessionStore, MemorySessionStore, SessionError, SessionStore};
pub use topic::Topic;
