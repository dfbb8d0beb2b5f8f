//! Explicit process-wide state.
//!
//! Device and solver-library handles are acquired once per process. A
//! [`ProcessContext`] holds such a resource with an explicit lifecycle:
//! [`init_with`](ProcessContext::init_with) acquires it,
//! [`get`](ProcessContext::get) hands out shared references, and
//! [`shutdown`](ProcessContext::shutdown) releases the process's reference.
//! Nothing is created implicitly on first use.
//!
//! ```rust
//! use cuchol_solver::ProcessContext;
//!
//! static HANDLES: ProcessContext<String> = ProcessContext::new("handles");
//!
//! HANDLES.init_with(|| Ok("device 0".to_string())).unwrap();
//! assert_eq!(HANDLES.get().unwrap().as_str(), "device 0");
//! assert!(HANDLES.shutdown());
//! assert!(HANDLES.get().is_err());
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Error, Result};

/// A slot for one process-wide resource.
pub struct ProcessContext<T> {
    name: &'static str,
    slot: Mutex<Option<Arc<T>>>,
}

impl<T> ProcessContext<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            slot: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Arc<T>>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Acquire the resource.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Context`] if already initialized, or whatever `init`
    /// returns.
    pub fn init_with<F>(&self, init: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        let mut slot = self.lock();
        if slot.is_some() {
            return Err(Error::Context(format!("{} already initialized", self.name)));
        }
        let resource = Arc::new(init()?);
        *slot = Some(resource.clone());
        log::info!("{} initialized", self.name);
        Ok(resource)
    }

    /// Return the resource, acquiring it with `init` if the slot is empty.
    pub fn get_or_init_with<F>(&self, init: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        let mut slot = self.lock();
        if let Some(resource) = slot.as_ref() {
            return Ok(resource.clone());
        }
        let resource = Arc::new(init()?);
        *slot = Some(resource.clone());
        log::info!("{} initialized", self.name);
        Ok(resource)
    }

    /// # Errors
    ///
    /// Returns [`Error::Context`] if not initialized.
    pub fn get(&self) -> Result<Arc<T>> {
        self.lock()
            .clone()
            .ok_or_else(|| Error::Context(format!("{} not initialized", self.name)))
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().is_some()
    }

    /// Release the process's reference. The resource itself is dropped once
    /// every outstanding [`Arc`] is gone. Returns whether anything was held.
    pub fn shutdown(&self) -> bool {
        let released = self.lock().take();
        if released.is_some() {
            log::info!("{} shut down", self.name);
        }
        released.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Tracked<'a>(&'a AtomicUsize);

    impl Drop for Tracked<'_> {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_lifecycle() {
        let ctx: ProcessContext<u32> = ProcessContext::new("test");
        assert!(!ctx.is_initialized());
        assert!(matches!(ctx.get(), Err(Error::Context(_))));

        ctx.init_with(|| Ok(7)).unwrap();
        assert!(ctx.is_initialized());
        assert_eq!(*ctx.get().unwrap(), 7);

        assert!(ctx.shutdown());
        assert!(!ctx.shutdown());
        assert!(!ctx.is_initialized());
    }

    #[test]
    fn test_double_init_rejected() {
        let ctx: ProcessContext<u32> = ProcessContext::new("test");
        ctx.init_with(|| Ok(1)).unwrap();
        assert!(matches!(ctx.init_with(|| Ok(2)), Err(Error::Context(_))));
        assert_eq!(*ctx.get().unwrap(), 1);
    }

    #[test]
    fn test_failed_init_leaves_slot_empty() {
        let ctx: ProcessContext<u32> = ProcessContext::new("test");
        let err = ctx
            .init_with(|| Err(Error::Unavailable("no device".into())))
            .unwrap_err();
        assert!(matches!(err, Error::Unavailable(_)));
        assert!(!ctx.is_initialized());
    }

    #[test]
    fn test_get_or_init_initializes_once() {
        let ctx: ProcessContext<u32> = ProcessContext::new("test");
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            let v = ctx
                .get_or_init_with(|| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(5)
                })
                .unwrap();
            assert_eq!(*v, 5);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_shutdown_waits_for_outstanding_references() {
        let drops = AtomicUsize::new(0);
        let ctx: ProcessContext<Tracked<'_>> = ProcessContext::new("test");
        let held = ctx.init_with(|| Ok(Tracked(&drops))).unwrap();

        ctx.shutdown();
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        drop(held);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }
}
