//! Password hashing.
//!
//! Hashes are stored as `sha256$<salt>$<hex digest>` where the digest
//! covers `salt:password`. Bare 64-character hex digests of the unsalted
//! password, as written by older account files, are still accepted by
//! [`verify_password`].

use sha2::{Digest, Sha256};

const SCHEME: &str = "sha256";

/// Hashes `password` with a fresh random salt.
#[must_use]
pub fn hash_password(password: &str) -> String {
    let salt = uuid::Uuid::new_v4().simple().to_string();
    let digest = salted_digest(&salt, password);
    format!("{SCHEME}${salt}${digest}")
}

/// Checks `password` against a stored hash.
#[must_use]
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(SCHEME), Some(salt), Some(digest)) => {
            constant_time_eq(&salted_digest(salt, password), digest)
        }
        (Some(legacy), None, None) if is_hex_digest(legacy) => {
            constant_time_eq(&hex::encode(Sha256::digest(password.as_bytes())), legacy)
        }
        _ => false,
    }
}

fn salted_digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn is_hex_digest(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a
            .bytes()
            .zip(b.bytes())
            .fold(0_u8, |acc, (x, y)| acc | (x ^ y.to_ascii_lowercase()))
            == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_own_hash() {
        let stored = hash_password("s3cret");
        assert!(stored.starts_with("sha256$"));
        assert!(verify_password("s3cret", &stored));
        assert!(!verify_password("S3cret", &stored));
    }

    #[test]
    fn salts_every_hash() {
        assert_ne!(hash_password("same"), hash_password("same"));
    }

    #[test]
    fn accepts_legacy_unsalted_digest() {
        // sha256("admin")
        let legacy = "8c6976e5b5410415bde908bd4dee15dfb167a9c873fc4bb8a81f6f2ab448a918";
        assert!(verify_password("admin", legacy));
        assert!(verify_password("admin", &legacy.to_uppercase()));
        assert!(!verify_password("admin1", legacy));
    }

    #[test]
    fn rejects_malformed_hash() {
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "md5$salt$abc"));
        assert!(!verify_password("x", "plaintext"));
    }
}
