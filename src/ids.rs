//! Opaque id generation for requests and, where no id arrives on the wire,
//! new sessions.
//!
//! Not cryptographically unguessable — callers that need that (signed
//! session cookies, bearer tokens) compose it with `anvil_auth`'s own
//! primitives. This just needs to be unique within the process.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn generate() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{nanos:x}-{seq:x}")
}
