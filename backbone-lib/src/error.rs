//! The error hierarchy for everything that can go wrong setting up or tearing
//! down the shared-memory/semaphore machinery.

use thiserror::Error;

/// Failures surfaced by [`crate::smrm`], [`crate::sync`] and [`crate::state`].
///
/// Only the resource-creation variants are fatal to Master; client misbehavior
/// and peer departure are handled inline by the dispatch loop and never reach
/// here (see `master`'s dispatch module).
#[derive(Debug, Error)]
pub enum GameError {
    /// A POSIX call failed during setup. `errno` is whatever `errno(3)` held
    /// right after the call.
    #[error("{context}: {syscall} failed (errno {errno})")]
    ResourceCreation {
        syscall: &'static str,
        errno: i32,
        context: String,
    },

    /// `shm_open` with `O_CREAT | O_EXCL` found a name already in use.
    #[error("shared memory object {0} already exists")]
    AlreadyExistsInUse(String),

    /// `ftruncate` or `mmap` failed due to insufficient space.
    #[error("insufficient space sizing shared memory object {0}")]
    OutOfSpace(String),

    /// A syscall failed with `EACCES`/`EPERM`.
    #[error("permission denied accessing {0}")]
    Permission(String),

    /// `shm_open` without `O_CREAT` found no such object.
    #[error("shared memory object {0} not found")]
    NotFound(String),

    /// An opened region's actual size did not match the caller's expectation.
    #[error("size mismatch opening {name}: expected {expected}, found {found}")]
    SizeMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
}

impl GameError {
    /// Builds a [`GameError::ResourceCreation`] from the current `errno`,
    /// classifying well-known codes into their dedicated variant first.
    pub fn from_errno(syscall: &'static str, context: impl Into<String>, name: &str) -> GameError {
        let errno = unsafe { *libc::__errno_location() };
        let context = context.into();
        match errno {
            libc::EEXIST => GameError::AlreadyExistsInUse(name.to_string()),
            libc::ENOSPC => GameError::OutOfSpace(name.to_string()),
            libc::EACCES | libc::EPERM => GameError::Permission(name.to_string()),
            libc::ENOENT => GameError::NotFound(name.to_string()),
            _ => GameError::ResourceCreation {
                syscall,
                errno,
                context,
            },
        }
    }
}
