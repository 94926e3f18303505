use sha2::{Digest, Sha256};

/// Prefix mixed into every salted fingerprint.
pub const FINGERPRINT_NAMESPACE: &str = "dflook/terraform-github-actions/";

/// Salted SHA-256 of `text`, hex encoded.
///
/// The digest covers `FINGERPRINT_NAMESPACE + salt + text` as raw UTF-8 bytes,
/// so the result does not depend on platform or locale. Plan hashes use the
/// issue URL as salt; cache keys use an empty salt.
pub fn fingerprint(text: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(FINGERPRINT_NAMESPACE.as_bytes());
    hasher.update(salt.as_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
