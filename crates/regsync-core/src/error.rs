//! # Error Types
//!
//! General error handling for register synchronization.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.
//!
//! Note that most kernel failures never reach the caller as an `Err`: the
//! fetch/store engine downgrades them to a `tracing` warning and records the
//! failure in its [`SyncReport`](crate::engine::SyncReport). The variants here
//! are what the kernel and directory traits return internally, plus the few
//! conditions that *are* reported to the caller (unknown thread, bad index).

use thiserror::Error;

use crate::types::{RegisterIndex, StateClass, ThreadId};

/// Main error type for register synchronization
///
/// ## Error Categories
///
/// 1. **Request errors**: ThreadNotFound, InvalidRegister, InvalidArgument
/// 2. **Layout errors**: InvalidLayout, BlockSize
/// 3. **Kernel errors**: KernelCallFailed, Mach (GNU Hurd only)
/// 4. **I/O errors**: Io (raw blocks loaded from files)
#[derive(Error, Debug)]
pub enum RegSyncError
{
    /// The thread id could not be resolved to a live thread handle
    ///
    /// This happens when the thread exited, or when it was never part of the
    /// traced task. The directory is refreshed before resolution, so a thread
    /// created since the last refresh is still found.
    #[error("No such thread: {0}")]
    ThreadNotFound(ThreadId),

    /// A register index outside the architecture's index space
    #[error("Invalid register index {index} (architecture has {count} registers)")]
    InvalidRegister
    {
        /// The offending index
        index: RegisterIndex,
        /// Number of registers the architecture defines
        count: usize,
    },

    /// An architecture descriptor violates the layout invariants
    ///
    /// Examples:
    /// - Two general registers overlap inside the raw block
    /// - A register extends past the end of the block
    /// - Descriptor indices are not dense from zero
    #[error("Invalid register layout: {0}")]
    InvalidLayout(String),

    /// Invalid argument passed to a synchronization function
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The kernel returned a raw block whose size does not match the layout
    #[error("Unexpected {class} state size: expected {expected} bytes, got {actual}")]
    BlockSize
    {
        /// State class of the block
        class: StateClass,
        /// Size required by the architecture descriptor
        expected: usize,
        /// Size actually received
        actual: usize,
    },

    /// A kernel thread-control call failed
    ///
    /// This can happen if:
    /// - The thread has exited
    /// - The thread port is no longer valid
    /// - The kernel refused to halt the thread
    #[error("Kernel call failed: {operation}: {details}")]
    KernelCallFailed
    {
        /// Description of the operation that failed
        operation: String,
        /// Thread the operation was issued against, if known
        thread: Option<ThreadId>,
        /// Additional error details
        details: String,
    },

    /// GNU Mach kernel error
    ///
    /// This wraps errors returned by `thread_get_state`, `thread_set_state`,
    /// `thread_abort` and friends.
    #[cfg(target_os = "hurd")]
    #[error("Mach API error: {0}")]
    Mach(#[from] crate::platform::mach::error::MachError),

    /// I/O error (for raw blocks loaded from files, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for `Result<T, RegSyncError>`
///
/// ```rust
/// use regsync_core::error::Result;
/// fn foo() -> Result<()>
/// {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, RegSyncError>;
