// web-server/src/utils/token.rs
use rand::{thread_rng, Rng};
use rand::distributions::Alphanumeric;
use sha2::{Sha256, Digest};
use std::time::{SystemTime, UNIX_EPOCH};

/// Random alphanumeric string of `length` characters
pub fn generate_secure_token(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Hex SHA-256 of `input`
pub fn hash_string(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Opaque token for the session cookie
pub fn create_session_token() -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();

    hash_string(&format!("{}-{}", timestamp, generate_secure_token(32)))
}

/// Whether `token` has the shape of a `create_session_token` result
pub fn is_session_token(token: &str) -> bool {
    token.len() == 64 && token.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Name under which a session's key is stored. Derived from the cookie so a
/// returning browser finds its login again; the raw token never touches storage.
pub fn session_key_id(session_token: &str) -> String {
    hash_string(&format!("session-key:{}", session_token))
}
