//! Generation of opaque, collision-resistant identifiers.
//!
//! Both `local_id` (the queue's own primary key) and `idempotency_key` (the token the server
//! dedupes replays on) are UUID v4 strings: 122 bits of randomness, negligible collision
//! probability at any realistic queue size.

use uuid::Uuid;

/// Generates a fresh idempotency key for a new queue record.
#[must_use]
pub fn generate_idempotency_key() -> String {
    Uuid::new_v4().to_string()
}

/// Generates a fresh local id for a new queue record.
#[must_use]
pub fn generate_local_id() -> String {
    Uuid::new_v4().to_string()
}
