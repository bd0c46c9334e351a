// User identifiers are random v4 UUIDs. They are opaque to callers and
// carry no ordering, so the timestamp-sortable v7 layout buys nothing here.

use uuid::Uuid;

/// Generate a new opaque user identifier.
pub fn new_uid() -> String {
    Uuid::new_v4().to_string()
}
