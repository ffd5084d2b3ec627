//! Digest-keyed resource cache.
//!
//! Maps a content digest to the handle produced when that content was first
//! materialized. Entries are insert-only for the life of a session: an entry
//! is never overwritten, and inserting different content under an existing
//! digest is an error, not a replacement. The cache retains the source bytes
//! so that check compares content, not just digests.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use bytes::Bytes;

use crate::digest::ContentDigest;

/// Insert-only digest → handle map. One per side of a connection.
///
/// `H` is whatever the owner considers a resource handle: the client uses
/// `()` (it only needs "have I sent this"), the daemon keeps handles for
/// materialized buffers.
#[derive(Debug)]
pub struct ResourceCache<H> {
    entries: HashMap<ContentDigest, CacheEntry<H>>,
}

#[derive(Debug)]
struct CacheEntry<H> {
    content: Bytes,
    handle: H,
}

impl<H> ResourceCache<H> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Handle stored for this digest, if the content has been seen.
    pub fn lookup(&self, digest: &ContentDigest) -> Option<&H> {
        self.entries.get(digest).map(|e| &e.handle)
    }

    /// Source bytes stored for this digest.
    pub fn content(&self, digest: &ContentDigest) -> Option<&Bytes> {
        self.entries.get(digest).map(|e| &e.content)
    }

    pub fn contains(&self, digest: &ContentDigest) -> bool {
        self.entries.contains_key(digest)
    }

    /// Record content under its digest.
    ///
    /// Re-inserting byte-identical content is a no-op that keeps the
    /// original handle. Inserting different content under an existing
    /// digest fails and leaves the entry untouched: first writer wins.
    pub fn insert(
        &mut self,
        digest: ContentDigest,
        content: Bytes,
        handle: H,
    ) -> Result<(), CacheError> {
        match self.entries.entry(digest) {
            Entry::Occupied(existing) => {
                if existing.get().content == content {
                    Ok(())
                } else {
                    Err(CacheError::DigestCollision { digest })
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(CacheEntry { content, handle });
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

impl<H> Default for ResourceCache<H> {
    fn default() -> Self {
        Self::new()
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// Two different payloads claimed the same digest. The cache never
    /// resolves this by overwriting.
    #[error("digest {digest} already maps to different content")]
    DigestCollision { digest: ContentDigest },
}

// ── Tests ─────────────────────────────────────────────────────────────────────
