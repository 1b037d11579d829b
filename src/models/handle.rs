//! Process-wide model handle with lazy one-time initialization.
//!
//! Loading the MusicGen sessions takes seconds and hundreds of megabytes,
//! so the handle is loaded at most once per process and shared from then
//! on. The contract is single-writer-at-init, read-only-after-init: the
//! first caller runs the loader, every later caller gets the same `Arc`.
//! Caching is an optimization, not a correctness requirement; a failed
//! load leaves the cell empty so the next call tries again.

use std::sync::{Arc, Mutex};

use once_cell::sync::OnceCell;

use crate::config::ServiceConfig;
use crate::error::Result;
use crate::models::musicgen::MusicGenModels;

/// A lazily initialized, shared-ownership cell for an expensive resource.
pub struct LazyShared<T> {
    cell: OnceCell<Arc<T>>,
}

impl<T> LazyShared<T> {
    /// Creates an empty cell; nothing is loaded until first use.
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Returns the shared resource, running `load` if and only if the
    /// cell is still empty. Repeated calls reuse the first result.
    pub fn get_or_load<F>(&self, load: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        let arc = self.cell.get_or_try_init(|| load().map(Arc::new))?;
        Ok(Arc::clone(arc))
    }

    /// Returns the resource if it has already been loaded.
    pub fn get(&self) -> Option<Arc<T>> {
        self.cell.get().map(Arc::clone)
    }

    /// Returns true once a load has completed successfully.
    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<T> Default for LazyShared<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for LazyShared<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyShared")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// The process-wide MusicGen handle.
///
/// The inner `Mutex` serializes generations: ort sessions need `&mut`,
/// so one request generates at a time while the handle itself stays
/// read-shared.
pub type ModelHandle = LazyShared<Mutex<MusicGenModels>>;

/// Returns the loaded model handle, loading the sessions on first call.
pub fn acquire(handle: &ModelHandle, config: &ServiceConfig) -> Result<Arc<Mutex<MusicGenModels>>> {
    handle.get_or_load(|| {
        let models = MusicGenModels::load(config)?;
        Ok(Mutex::new(models))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn loader_runs_exactly_once() {
        let cell: LazyShared<u32> = LazyShared::new();
        let calls = AtomicUsize::new(0);

        let first = cell
            .get_or_load(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(7)
            })
            .unwrap();
        let second = cell
            .get_or_load(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(8)
            })
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*first, 7);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn failed_load_leaves_cell_empty() {
        let cell: LazyShared<u32> = LazyShared::new();

        let err = cell.get_or_load(|| Err(ServiceError::model_load_failed("boom")));
        assert!(err.is_err());
        assert!(!cell.is_loaded());

        // Next attempt runs the loader again and can succeed
        let value = cell.get_or_load(|| Ok(42)).unwrap();
        assert_eq!(*value, 42);
        assert!(cell.is_loaded());
    }

    #[test]
    fn get_before_load_is_none() {
        let cell: LazyShared<u32> = LazyShared::new();
        assert!(cell.get().is_none());
        cell.get_or_load(|| Ok(1)).unwrap();
        assert_eq!(cell.get().map(|v| *v), Some(1));
    }
}
