//! Standard stream binding
//!
//! Rebinding stdin/stdout to the console is process-wide state. The backend
//! reference-counts the binding; this guard makes sure every successful
//! bind is matched by exactly one release, on every exit path.

use tracing::{debug, warn};

use super::Result;
use crate::backend::ConsoleBackend;

/// One reference to the process standard streams being bound to the console
pub struct StreamBinding<B: ConsoleBackend> {
    backend: B,
    bound: bool,
}

impl<B: ConsoleBackend> StreamBinding<B> {
    /// Bind (or share an existing binding of) the standard streams
    pub fn acquire(backend: B) -> Result<Self> {
        backend.rebind_std_streams()?;
        debug!("Standard streams bound to console");
        Ok(Self {
            backend,
            bound: true,
        })
    }

    /// Release explicitly, reporting failure. A failed release stays bound
    /// and can be retried; drop tries once more.
    pub fn release(&mut self) -> Result<()> {
        if !self.bound {
            return Ok(());
        }
        self.backend.restore_std_streams()?;
        self.bound = false;
        debug!("Standard streams released");
        Ok(())
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }
}

impl<B: ConsoleBackend> Drop for StreamBinding<B> {
    fn drop(&mut self) {
        if self.bound {
            if let Err(e) = self.backend.restore_std_streams() {
                warn!("Failed to release standard streams: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Faults, MemoryBackend};

    #[test]
    fn test_nested_bindings_share_one_refcount() {
        let backend = MemoryBackend::attached(80, 25);

        let outer = StreamBinding::acquire(backend.clone()).unwrap();
        let mut inner = StreamBinding::acquire(backend.clone()).unwrap();
        assert_eq!(backend.stream_refs(), 2);

        inner.release().unwrap();
        assert_eq!(backend.stream_refs(), 1);

        drop(outer);
        assert_eq!(backend.stream_refs(), 0);
    }

    #[test]
    fn test_release_on_early_exit() {
        let backend = MemoryBackend::attached(80, 25);

        let run = |backend: &MemoryBackend| -> Result<()> {
            let _binding = StreamBinding::acquire(backend.clone())?;
            backend.inject(Faults::WRITE);
            Err(crate::console::ConsoleError::NotOpen)
        };

        assert!(run(&backend).is_err());
        assert_eq!(backend.stream_refs(), 0);
    }

    #[test]
    fn test_failed_release_can_be_retried() {
        let backend = MemoryBackend::attached(80, 25);
        let mut binding = StreamBinding::acquire(backend.clone()).unwrap();

        backend.inject(Faults::STREAMS);
        assert!(binding.release().is_err());
        assert!(binding.is_bound());
        assert_eq!(backend.stream_refs(), 1);

        backend.heal();
        binding.release().unwrap();
        assert!(!binding.is_bound());
        assert_eq!(backend.stream_refs(), 0);

        // Already released: drop must not release again
        drop(binding);
        assert_eq!(backend.stream_refs(), 0);
    }

    #[test]
    fn test_drop_retries_failed_release() {
        let backend = MemoryBackend::attached(80, 25);
        let mut binding = StreamBinding::acquire(backend.clone()).unwrap();

        backend.inject(Faults::STREAMS);
        assert!(binding.release().is_err());
        backend.heal();

        drop(binding);
        assert_eq!(backend.stream_refs(), 0);
    }

    #[test]
    fn test_failed_bind_holds_nothing() {
        let backend = MemoryBackend::attached(80, 25);
        backend.inject(Faults::STREAMS);
        assert!(StreamBinding::acquire(backend.clone()).is_err());
        backend.heal();
        assert_eq!(backend.stream_refs(), 0);
    }
}
