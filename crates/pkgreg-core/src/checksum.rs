//! # Checksum Algorithms
//!
//! Archive verification compares a lowercase hex digest of the downloaded
//! body against an expected checksum. The digest function is pluggable via
//! [`ChecksumAlgorithm`]; the registry client never assumes which one is
//! configured.

use sha2::{Digest, Sha256};

/// A cryptographic digest function.
pub trait ChecksumAlgorithm: Send + Sync {
    /// Short identifier, e.g. `sha256`.
    fn name(&self) -> &'static str;

    /// Compute the raw digest of `data`.
    fn hash(&self, data: &[u8]) -> Vec<u8>;

    /// Compute the digest of `data` rendered as lowercase hex.
    fn hex_digest(&self, data: &[u8]) -> String {
        to_hex(&self.hash(data))
    }
}

/// SHA-256, the digest registries publish for source archives.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Checksum;

impl ChecksumAlgorithm for Sha256Checksum {
    fn name(&self) -> &'static str {
        "sha256"
    }

    fn hash(&self, data: &[u8]) -> Vec<u8> {
        Sha256::digest(data).to_vec()
    }
}

/// Render bytes as a lowercase hex string.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
