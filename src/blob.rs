//! In-memory store of revocable blob handles
//!
//! A handle plays the role of a browser object URL: it names bytes held in
//! memory until it is revoked. The controller revokes the previous handle before
//! installing a new one, so repeated cycles do not accumulate payloads.

use bytes::Bytes;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// Opaque reference to bytes held in a `BlobStore`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct BlobHandle(String);

impl BlobHandle {
    fn generate() -> Self {
        Self(format!("blob:{}", Uuid::new_v4()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BlobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registry of live blob handles
#[derive(Debug, Default)]
pub struct BlobStore {
    entries: HashMap<BlobHandle, Bytes>,
}

impl BlobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register bytes and return a fresh handle for them
    pub fn create(&mut self, bytes: Bytes) -> BlobHandle {
        let handle = BlobHandle::generate();
        log::trace!("Created {} ({} bytes)", handle, bytes.len());
        self.entries.insert(handle.clone(), bytes);
        handle
    }

    /// Bytes behind a handle, if it has not been revoked
    #[must_use]
    pub fn resolve(&self, handle: &BlobHandle) -> Option<&Bytes> {
        self.entries.get(handle)
    }

    /// Release a handle. Returns false if it was unknown or already revoked.
    pub fn revoke(&mut self, handle: &BlobHandle) -> bool {
        let removed = self.entries.remove(handle).is_some();
        if removed {
            log::trace!("Revoked {}", handle);
        }
        removed
    }

    /// Number of handles that still resolve
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.entries.len()
    }
}
