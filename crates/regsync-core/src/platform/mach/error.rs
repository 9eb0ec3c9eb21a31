//! # GNU Mach Errors
//!
//! Mach RPCs return `kern_return_t` codes. This module converts those codes
//! into a Rust error type with descriptive messages.

use thiserror::Error;

use super::ffi;

/// Mach kernel API error
///
/// ## References
///
/// - [GNU Mach Reference Manual: Return Codes](https://www.gnu.org/software/hurd/gnumach-doc/Inter-Process-Communication.html)
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachError
{
    /// `KERN_PROTECTION_FAILURE`: the caller may not operate on this thread
    #[error("KERN_PROTECTION_FAILURE: Permission denied")]
    ProtectionFailure,

    /// `KERN_INVALID_ARGUMENT`: bad flavor, short state buffer or bad thread
    #[error("KERN_INVALID_ARGUMENT: Invalid thread or state flavor")]
    InvalidArgument,

    /// `KERN_FAILURE`: generic failure, e.g. aborting a thread that is not suspended
    #[error("KERN_FAILURE: Operation failed")]
    Failure,

    /// `MACH_SEND_INVALID_DEST`: the thread port is dead
    #[error("MACH_SEND_INVALID_DEST: Thread no longer exists")]
    ThreadGone,

    /// Unknown Mach error code
    ///
    /// The integer value is preserved so you can look it up.
    #[error("Unknown Mach error: {0:#x}")]
    Unknown(i32),
}

impl From<ffi::kern_return_t> for MachError
{
    fn from(code: ffi::kern_return_t) -> Self
    {
        match code {
            ffi::KERN_PROTECTION_FAILURE => MachError::ProtectionFailure,
            ffi::KERN_INVALID_ARGUMENT => MachError::InvalidArgument,
            ffi::KERN_FAILURE => MachError::Failure,
            ffi::MACH_SEND_INVALID_DEST => MachError::ThreadGone,
            _ => MachError::Unknown(code),
        }
    }
}

/// Convert a return code into a `Result`
pub(crate) fn check(code: ffi::kern_return_t) -> Result<(), MachError>
{
    if code == ffi::KERN_SUCCESS {
        Ok(())
    } else {
        Err(MachError::from(code))
    }
}
