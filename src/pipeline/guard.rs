//! Run guard ensuring sync runs never overlap.

use std::sync::atomic::{AtomicBool, Ordering};

/// Instance-owned idle/running flag.
#[derive(Debug, Default)]
pub struct RunGuard {
    running: AtomicBool,
}

/// Proof of a successful acquire. Releases the guard when dropped.
#[derive(Debug)]
pub struct RunPermit<'a> {
    guard: &'a RunGuard,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically move idle -> running. Returns `None` if already running.
    pub fn try_acquire(&self) -> Option<RunPermit<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunPermit { guard: self })
    }

    /// Move back to idle.
    pub fn release(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for RunPermit<'_> {
    fn drop(&mut self) {
        self.guard.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_while_held() {
        let guard = RunGuard::new();

        let permit = guard.try_acquire();
        assert!(permit.is_some());
        assert!(guard.is_running());
        assert!(guard.try_acquire().is_none());

        drop(permit);
        assert!(!guard.is_running());
        assert!(guard.try_acquire().is_some());
    }

    #[test]
    fn guards_are_independent() {
        let a = RunGuard::new();
        let b = RunGuard::new();

        let _held = a.try_acquire().unwrap();
        assert!(b.try_acquire().is_some());
    }
}
