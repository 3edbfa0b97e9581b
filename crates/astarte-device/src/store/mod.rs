// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Persisted introspection blob.
//!
//! When permanent storage is available, the device keeps one blob: the
//! canonical introspection string it last announced. On a session-resumed
//! reconnect a matching blob means the broker already knows the current
//! interface set and the handshake can be skipped.
//!
//! Store failures are never fatal to the device; callers log and carry on.

use std::io;
use std::path::PathBuf;

use parking_lot::Mutex;

/// Storage capability for the announced-introspection blob.
pub trait IntrospectionStore: Send {
    /// The stored canonical string, `None` when nothing was stored yet.
    fn load(&self) -> io::Result<Option<String>>;

    /// Replace the stored canonical string.
    fn store(&self, introspection: &str) -> io::Result<()>;
}

/// File-backed store holding the blob at a fixed path.
pub struct FileIntrospectionStore {
    path: PathBuf,
}

impl FileIntrospectionStore {
    /// Store backed by the given file path. The file is created on the
    /// first [`IntrospectionStore::store`] call.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl IntrospectionStore for FileIntrospectionStore {
    fn load(&self) -> io::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn store(&self, introspection: &str) -> io::Result<()> {
        std::fs::write(&self.path, introspection)
    }
}

/// In-memory store for tests.
#[derive(Default)]
pub struct MemoryIntrospectionStore {
    slot: Mutex<Option<String>>,
}

impl MemoryIntrospectionStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl IntrospectionStore for MemoryIntrospectionStore {
    fn load(&self) -> io::Result<Option<String>> {
        Ok(self.slot.lock().clone())
    }

    fn store(&self, introspection: &str) -> io::Result<()> {
        *self.slot.lock() = Some(introspection.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let store = FileIntrospectionStore::new(dir.path().join("introspection"));

        assert_eq!(store.load().expect("load should succeed"), None);

        store
            .store("org.example.A:1:0;org.example.B:0:3")
            .expect("store should succeed");
        assert_eq!(
            store.load().expect("load should succeed").as_deref(),
            Some("org.example.A:1:0;org.example.B:0:3")
        );

        store.store("org.example.A:1:1").expect("store should succeed");
        assert_eq!(
            store.load().expect("load should succeed").as_deref(),
            Some("org.example.A:1:1")
        );
    }

    #[test]
    fn test_file_store_unwritable_path_errors() {
        let store = FileIntrospectionStore::new("/nonexistent-dir/introspection");
        assert!(store.store("blob").is_err());
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryIntrospectionStore::new();
        assert_eq!(store.load().expect("load should succeed"), None);
        store.store("a:1:0").expect("store should succeed");
        assert_eq!(
            store.load().expect("load should succeed").as_deref(),
            Some("a:1:0")
        );
    }
}
