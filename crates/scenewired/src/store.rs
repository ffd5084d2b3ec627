//! Shared content store.
//!
//! Digest-keyed blob storage shared by every connection the daemon
//! serves. A client that reconnects, or a second client sending the same
//! geometry, resolves against content a previous connection uploaded.
//! Inserts follow the same rule as the per-connection cache: first writer
//! wins, later writers must carry byte-identical content.

use bytes::Bytes;
use dashmap::DashMap;

use scenewire_core::cache::CacheError;
use scenewire_core::digest::ContentDigest;

/// Cross-connection blob store. DashMap's entry API serializes inserts
/// per digest, which is all the first-writer-wins rule needs.
pub struct ContentStore {
    entries: DashMap<ContentDigest, Bytes>,
}

impl ContentStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn get(&self, digest: &ContentDigest) -> Option<Bytes> {
        self.entries.get(digest).map(|e| e.value().clone())
    }

    pub fn contains(&self, digest: &ContentDigest) -> bool {
        self.entries.contains_key(digest)
    }

    /// Store content under its digest. A no-op when the identical content
    /// is already present; an error when different content claims the
    /// same digest.
    pub fn insert(&self, digest: ContentDigest, content: Bytes) -> Result<(), CacheError> {
        match self.entries.entry(digest) {
            dashmap::mapref::entry::Entry::Occupied(existing) => {
                if *existing.get() == content {
                    Ok(())
                } else {
                    Err(CacheError::DigestCollision { digest })
                }
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(content);
                Ok(())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ContentStore {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
