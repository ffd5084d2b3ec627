//! Content addressing for scenewire payloads.
//!
//! Every binary buffer that crosses the wire is identified by the SHA-1
//! digest of its bytes. The digest is a cache identity, not a security
//! boundary: the cache layer keeps the source bytes and compares them on
//! re-insertion, so a collision is detected rather than trusted away.

use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha1::{Digest, Sha1};

/// Bytes in a content digest.
pub const DIGEST_BYTES: usize = 20;

/// A 160-bit content digest.
///
/// Renders as 40 lowercase hex characters and serializes as that hex string,
/// so digests read the same in logs, JSON, and test output.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentDigest([u8; DIGEST_BYTES]);

impl ContentDigest {
    /// Digest a byte slice.
    pub fn of(data: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_BYTES] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a digest from its 40-character hex form.
    pub fn from_hex(s: &str) -> Result<Self, DigestError> {
        if s.len() != DIGEST_BYTES * 2 {
            return Err(DigestError::BadLength(s.len()));
        }
        let raw = hex::decode(s).map_err(|_| DigestError::InvalidHex)?;
        let mut bytes = [0u8; DIGEST_BYTES];
        bytes.copy_from_slice(&raw);
        Ok(Self(bytes))
    }
}

impl From<[u8; DIGEST_BYTES]> for ContentDigest {
    fn from(bytes: [u8; DIGEST_BYTES]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", self.to_hex())
    }
}

impl Serialize for ContentDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ContentDigest::from_hex(&s).map_err(de::Error::custom)
    }
}

/// Incremental digest for payloads that arrive in pieces.
///
/// # Example
/// ```
/// use scenewire_core::digest::{ContentDigest, Hasher};
/// let mut h = Hasher::new();
/// h.update(b"tri");
/// h.update(b"angles");
/// assert_eq!(h.finalize(), ContentDigest::of(b"triangles"));
/// ```
pub struct Hasher(Sha1);

impl Hasher {
    pub fn new() -> Self {
        Self(Sha1::new())
    }

    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    pub fn finalize(self) -> ContentDigest {
        ContentDigest(self.0.finalize().into())
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DigestError {
    #[error("digest hex must be {} characters, got {0}", DIGEST_BYTES * 2)]
    BadLength(usize),

    #[error("digest contains non-hex characters")]
    InvalidHex,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
