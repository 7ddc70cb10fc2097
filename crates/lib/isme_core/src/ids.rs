// Identifier and one-time code generation.
//
// Row ids and token ids are UUIDv7 so they sort by creation time. Handoff and
// exchange codes are opaque random strings and carry no timestamp.

use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use uuid::Uuid;

/// Length of handoff and authorization codes.
const CODE_LEN: usize = 32;

/// Generate a new UUIDv7 (timestamp-sortable).
pub fn uuidv7() -> Uuid {
    Uuid::now_v7()
}

/// New row or token id as a hyphenated string.
pub fn new_id() -> String {
    uuidv7().to_string()
}

/// Random alphanumeric string of `len` characters.
pub fn random_alphanumeric(len: usize) -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Unguessable single-use code for the login handoff and code exchange.
pub fn one_time_code() -> String {
    random_alphanumeric(CODE_LEN)
}
