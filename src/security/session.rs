//! Session id
//!
//! One id is generated per process and stored as `_sid`. Pages embed it as a
//! hidden `sid` field; a post that echoes a different id is downgraded.

use rand::Rng;

/// Number of hex digits in a session id
pub const SESSION_ID_LEN: usize = 16;

/// Generate a random hexadecimal session id
pub fn generate_session_id() -> String {
    let mut rng = rand::thread_rng();
    (0..SESSION_ID_LEN)
        .map(|_| char::from_digit(rng.gen_range(0..16), 16).unwrap_or('0'))
        .collect()
}

/// Whether the id echoed by the client matches ours
///
/// An absent id on either side never matches.
pub fn session_matches(expected: Option<&str>, received: Option<&str>) -> bool {
    match (expected, received) {
        (Some(expected), Some(received)) => !expected.is_empty() && expected == received,
        _ => false,
    }
}
