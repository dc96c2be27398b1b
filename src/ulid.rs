use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    time::{SystemTime, UNIX_EPOCH},
};

use rand::Rng;

/// Crockford Base32 alphabet (no I, L, O, U).
const ENCODING: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Generate a new ULID: 10 timestamp characters followed by 16 random
/// characters, 26 total, lexicographically sortable by creation time.
pub fn generate() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    let mut rng = rand::rng();
    let mut out = encode_time(millis);
    for _ in 0..16 {
        out.push(ENCODING[rng.random_range(0..32)] as char);
    }
    out
}

/// Derive a stable placeholder ULID from an arbitrary seed string.
///
/// The timestamp part is all zeros so placeholders sort before any real id.
/// Used by the index builder when a content file carries no `id` field, so
/// that two builds over the same tree produce identical indexes.
pub fn from_seed(seed: &str) -> String {
    let mut out = String::from("0000000000");
    let mut value = hash_with_salt(seed, 0);
    for round in 1..=16u64 {
        if round % 12 == 0 {
            value = hash_with_salt(seed, round);
        }
        out.push(ENCODING[(value % 32) as usize] as char);
        value /= 32;
    }
    out
}

fn hash_with_salt(seed: &str, salt: u64) -> u64 {
    let mut hasher = DefaultHasher::new();
    salt.hash(&mut hasher);
    seed.hash(&mut hasher);
    hasher.finish()
}

fn encode_time(mut millis: u64) -> String {
    let mut buf = [b'0'; 10];
    for slot in buf.iter_mut().rev() {
        *slot = ENCODING[(millis % 32) as usize];
        millis /= 32;
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Validate a ULID string: 26 Crockford Base32 characters.
pub fn is_valid(ulid: &str) -> bool {
    ulid.len() == 26
        && ulid
            .bytes()
            .all(|b| ENCODING.contains(&b.to_ascii_uppercase()))
}

/// Extract the timestamp from a ULID (milliseconds since the Unix epoch).
/// Returns `None` for invalid input.
pub fn timestamp(ulid: &str) -> Option<u64> {
    if !is_valid(ulid) {
        return None;
    }
    let mut value: u64 = 0;
    for b in ulid.bytes().take(10) {
        let pos = ENCODING
            .iter()
            .position(|&c| c == b.to_ascii_uppercase())?;
        value = value * 32 + pos as u64;
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ulid_is_valid() {
        let id = generate();
        assert_eq!(id.len(), 26);
        assert!(is_valid(&id));
    }

    #[test]
    fn generated_ulids_differ() {
        assert_ne!(generate(), generate());
    }

    #[test]
    fn timestamp_roundtrip() {
        let id = generate();
        let ts = timestamp(&id).unwrap();
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64;
        assert!(ts <= now);
        assert!(now - ts < 10_000, "timestamp should be recent");
    }

    #[test]
    fn sorts_by_creation_time() {
        let a = encode_time(1_000);
        let b = encode_time(2_000);
        assert!(a < b);
    }

    #[test]
    fn rejects_invalid() {
        assert!(!is_valid("short"));
        assert!(!is_valid("IIIIIIIIIIIIIIIIIIIIIIIIII")); // I is excluded
        assert!(!is_valid(&"x".repeat(27)));
    }

    #[test]
    fn seed_ids_are_stable_and_valid() {
        let a = from_seed("posts/hello.md");
        let b = from_seed("posts/hello.md");
        let c = from_seed("posts/other.md");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(is_valid(&a));
        assert!(a.starts_with("0000000000"));
    }
}
