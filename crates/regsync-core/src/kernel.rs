//! # Kernel Thread-Control Interface
//!
//! The narrow set of kernel operations the engine needs. Each platform
//! implements this trait using its native APIs:
//!
//! - **GNU Mach**: `thread_get_state()`, `thread_set_state()`, `thread_abort()`
//!   (see [`crate::platform::mach`], Hurd only)
//! - **In-memory**: [`crate::platform::memory::MemoryKernel`], a software
//!   kernel used for tests and demonstrations

use crate::block::RawBlock;
use crate::error::Result;
use crate::types::{StateClass, ThreadPort};

/// Kernel-side access to a traced thread's register state
pub trait ThreadControl
{
    /// Read the raw block of `class` from `thread`
    ///
    /// Does not halt the thread. If the thread is running, the result is a
    /// best-effort observation that may be stale by the time it returns.
    fn get_state(&mut self, thread: ThreadPort, class: StateClass) -> Result<RawBlock>;

    /// Replace the raw block of `class` in `thread`
    fn set_state(&mut self, thread: ThreadPort, class: StateClass, block: &RawBlock) -> Result<()>;

    /// Stop `thread` so that its register state is stable and writable
    ///
    /// May block until the kernel acknowledges. Any in-flight system call is
    /// aborted, which can itself change register values.
    fn force_halt(&mut self, thread: ThreadPort) -> Result<()>;
}

impl<K: ThreadControl + ?Sized> ThreadControl for &mut K
{
    fn get_state(&mut self, thread: ThreadPort, class: StateClass) -> Result<RawBlock>
    {
        (**self).get_state(thread, class)
    }

    fn set_state(&mut self, thread: ThreadPort, class: StateClass, block: &RawBlock) -> Result<()>
    {
        (**self).set_state(thread, class, block)
    }

    fn force_halt(&mut self, thread: ThreadPort) -> Result<()>
    {
        (**self).force_halt(thread)
    }
}
