//! Per-document write serialization.
//!
//! Every store operation is a load-mutate-store cycle over whole files. Two
//! overlapping cycles on the same document would silently drop one writer's
//! change, so each cycle holds the mutex registered for its document group.
//!
//! Stores lock whole directories under the data root (`todos/`, `notes/`,
//! `journals/`), so the registry holds a handful of entries per root no
//! matter how many documents get touched.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Registry of mutexes keyed by document (or document-group) path.
///
/// Shared by all stores of a context so that different handles to the same
/// data root serialize against each other.
#[derive(Debug, Default)]
pub struct DocumentLocks {
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl DocumentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock registered for `key`.
    pub fn with<T>(&self, key: &Path, f: impl FnOnce() -> T) -> T {
        // Look up under the registry lock, then release it before blocking.
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(key.to_path_buf()).or_default())
        };

        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    /// Run `f` while holding the lock for the directory `resolve` returns.
    ///
    /// `resolve` is asked again once the lock is held. If the answer changed
    /// while waiting (the data root was switched), the lock is released and
    /// the new directory locked instead. `f` receives the directory it holds,
    /// and must derive every path it touches from it.
    pub fn with_dir<T>(&self, resolve: impl Fn() -> PathBuf, f: impl FnOnce(&Path) -> T) -> T {
        let mut f = Some(f);
        loop {
            let dir = resolve();
            let result = self.with(&dir, || {
                if resolve() != dir {
                    return None;
                }
                f.take().map(|f| f(&dir))
            });
            if let Some(result) = result {
                return result;
            }
            log::debug!("{} moved while waiting for its lock, retrying", dir.display());
        }
    }

    /// Number of distinct documents that have been locked so far.
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
