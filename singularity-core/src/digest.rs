use crate::error::{Result, SingularityError};
use sha2::{Digest, Sha256};

/// Length in bytes of the integrity digest (BLAKE3 extended output).
pub const INTEGRITY_DIGEST_LEN: usize = 64;

/// Compute the content identifier: SHA256 over the canonical payload bytes.
pub fn content_id(canonical: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical);
    hex::encode(hasher.finalize())
}

/// Compute the content identifier of canonical bytes of a given shape.
/// The shape tag is hashed ahead of the bytes, so equal bytes of different
/// shapes never share an id.
pub fn tagged_content_id(tag: &str, canonical: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tag.as_bytes());
    hasher.update(b"\n");
    hasher.update(canonical);
    hex::encode(hasher.finalize())
}

/// Compute the integrity digest: 512-bit BLAKE3 output over the compressed bytes.
pub fn integrity_digest(compressed: &[u8]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(compressed);
    let mut out = [0u8; INTEGRITY_DIGEST_LEN];
    hasher.finalize_xof().fill(&mut out);
    hex::encode(out)
}

/// Verify that compressed bytes still match the digest stored for `id`.
pub fn verify_integrity(id: &str, compressed: &[u8], expected: &str) -> Result<()> {
    let actual = integrity_digest(compressed);
    if actual != expected {
        return Err(SingularityError::IntegrityViolation {
            id: id.to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}
