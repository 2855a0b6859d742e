use crate::error::ErrorCode;
use std::{
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError},
    thread,
    time::{Duration, Instant},
};

/// Errors from acquiring a [`SharedTree`] guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// Another holder kept the lock past the deadline (or, for `try_*`,
    /// held it at all).
    Timeout { waited: Duration },
    /// A writer panicked while holding the lock; the tree may be half-updated.
    Poisoned,
}

impl LockError {
    /// Machine-readable code associated with this lock error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Timeout { .. } => ErrorCode::LockContention,
            Self::Poisoned => ErrorCode::LockPoisoned,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

impl std::fmt::Display for LockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout { waited } => {
                write!(f, "{}: tree lock timed out after {waited:?}", self.code().code())
            }
            Self::Poisoned => write!(f, "{}: {}", self.code().code(), self.code().message()),
        }
    }
}

impl std::error::Error for LockError {}

/// Single-writer / multi-reader handle to a tree.
///
/// Cloning the handle shares the tree. Mutations (`insert`, `update`,
/// `remove`) go through a write guard; queries may hold read guards
/// concurrently while no writer is active.
#[derive(Debug, Default)]
pub struct SharedTree<T> {
    inner: Arc<RwLock<T>>,
}

impl<T> Clone for SharedTree<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> SharedTree<T> {
    pub fn new(tree: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(tree)),
        }
    }

    /// Block until a read guard is available.
    pub fn read(&self) -> Result<RwLockReadGuard<'_, T>, LockError> {
        self.inner.read().map_err(|_| LockError::Poisoned)
    }

    /// Block until the write guard is available.
    pub fn write(&self) -> Result<RwLockWriteGuard<'_, T>, LockError> {
        self.inner.write().map_err(|_| LockError::Poisoned)
    }

    /// Read guard without blocking.
    pub fn try_read(&self) -> Result<RwLockReadGuard<'_, T>, LockError> {
        self.inner.try_read().map_err(|err| match err {
            TryLockError::Poisoned(_) => LockError::Poisoned,
            TryLockError::WouldBlock => LockError::Timeout {
                waited: Duration::ZERO,
            },
        })
    }

    /// Write guard without blocking.
    pub fn try_write(&self) -> Result<RwLockWriteGuard<'_, T>, LockError> {
        self.inner.try_write().map_err(|err| match err {
            TryLockError::Poisoned(_) => LockError::Poisoned,
            TryLockError::WouldBlock => LockError::Timeout {
                waited: Duration::ZERO,
            },
        })
    }

    /// Poll for a read guard until `timeout` elapses.
    pub fn read_timeout(&self, timeout: Duration) -> Result<RwLockReadGuard<'_, T>, LockError> {
        let start = Instant::now();
        loop {
            match self.inner.try_read() {
                Ok(guard) => return Ok(guard),
                Err(TryLockError::Poisoned(_)) => return Err(LockError::Poisoned),
                Err(TryLockError::WouldBlock) => {}
            }

            if start.elapsed() >= timeout {
                return Err(LockError::Timeout {
                    waited: start.elapsed(),
                });
            }

            thread::sleep(Duration::from_millis(10));
        }
    }

    /// Poll for the write guard until `timeout` elapses.
    pub fn write_timeout(&self, timeout: Duration) -> Result<RwLockWriteGuard<'_, T>, LockError> {
        let start = Instant::now();
        loop {
            match self.inner.try_write() {
                Ok(guard) => return Ok(guard),
                Err(TryLockError::Poisoned(_)) => return Err(LockError::Poisoned),
                Err(TryLockError::WouldBlock) => {}
            }

            if start.elapsed() >= timeout {
                return Err(LockError::Timeout {
                    waited: start.elapsed(),
                });
            }

            thread::sleep(Duration::from_millis(10));
        }
    }

    /// Take the tree back if this is the last handle.
    pub fn into_inner(self) -> Result<T, Self> {
        match Arc::try_unwrap(self.inner) {
            Ok(lock) => lock.into_inner().map_err(|poisoned| Self::new(poisoned.into_inner())),
            Err(inner) => Err(Self { inner }),
        }
    }
}
