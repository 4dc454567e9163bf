//! Per-operation-class re-entrancy locks.
//!
//! At most one swap, one bet, and one approval may be in flight per session.
//! The lock is acquired at orchestration entry and released by the guard's
//! `Drop`, so every exit path (success, revert, rejection, early return)
//! clears it.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

#[derive(Clone, Debug, Default)]
pub struct OpLock(Arc<AtomicBool>);

impl OpLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the lock, or `None` if an operation of this class is already in
    /// flight. A failed acquisition is the caller's signal to no-op.
    pub fn try_acquire(&self) -> Option<OpGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| OpGuard(Arc::clone(&self.0)))
    }

    pub fn is_held(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct OpGuard(Arc<AtomicBool>);

impl Drop for OpGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    #[test]
    fn try_acquire__second_acquisition_fails_while_held() {
        let lock = OpLock::new();
        let guard = lock.try_acquire();
        assert!(guard.is_some());
        assert!(lock.try_acquire().is_none());
        assert!(lock.is_held());
    }

    #[test]
    fn drop__releases_on_every_exit_path() {
        let lock = OpLock::new();
        {
            let _guard = lock.try_acquire().unwrap();
        }
        assert!(!lock.is_held());
        assert!(lock.try_acquire().is_some());
    }
}
