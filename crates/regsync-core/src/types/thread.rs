//! Thread identifiers.

use std::fmt;

/// Debugger-visible thread identifier
///
/// This is the id external debugger logic uses to name a thread. It is
/// resolved to a [`ThreadPort`] through a
/// [`ThreadDirectory`](crate::thread::ThreadDirectory).
///
/// ## Example
///
/// ```rust
/// use regsync_core::types::ThreadId;
///
/// let thread = ThreadId::from(7);
/// assert_eq!(thread.raw(), 7);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(pub u64);

impl ThreadId
{
    /// Get the raw `u64` representation of the thread identifier
    pub fn raw(&self) -> u64
    {
        self.0
    }
}

impl From<u64> for ThreadId
{
    fn from(value: u64) -> Self
    {
        Self(value)
    }
}

impl fmt::Display for ThreadId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "thread {}", self.0)
    }
}

/// Kernel thread-control handle
///
/// On GNU Mach this is the thread's send right (`thread_t`, a `mach_port_t`).
/// The in-memory kernel uses it as a plain key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadPort(pub u32);

impl ThreadPort
{
    /// Get the raw port name
    pub fn raw(&self) -> u32
    {
        self.0
    }
}

impl From<u32> for ThreadPort
{
    fn from(value: u32) -> Self
    {
        Self(value)
    }
}

impl fmt::Display for ThreadPort
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "port {}", self.0)
    }
}
