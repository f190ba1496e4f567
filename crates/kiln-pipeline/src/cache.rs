//! Content cache for skipping unchanged files across reruns.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use sha2::{Digest, Sha256};

type Key = (&'static str, PathBuf);

/// Remembers the last content hash seen per namespace and path.
#[derive(Debug, Default)]
pub struct ContentCache {
    entries: Mutex<HashMap<Key, [u8; 32]>>,
}

impl ContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `content` for `path` and report whether it differs from the
    /// previous call. The first sighting of a path counts as changed.
    pub fn changed(&self, namespace: &'static str, path: &Path, content: &[u8]) -> bool {
        let digest: [u8; 32] = Sha256::digest(content).into();
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match entries.insert((namespace, path.to_path_buf()), digest) {
            Some(previous) => previous != digest,
            None => true,
        }
    }

    /// Whether `content` is exactly what was last recorded for `path`.
    pub fn matches(&self, namespace: &'static str, path: &Path, content: &[u8]) -> bool {
        let digest: [u8; 32] = Sha256::digest(content).into();
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        entries.get(&(namespace, path.to_path_buf())) == Some(&digest)
    }

    /// Forget a path, e.g. after its output was removed.
    pub fn forget(&self, namespace: &'static str, path: &Path) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.remove(&(namespace, path.to_path_buf()));
    }

    /// Drop every entry, so the next run processes everything.
    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}
