//! Floating-point register class.
//!
//! The floating-point block is never cached: fetch reads and decodes it,
//! store reads it again, patches the fields whose pseudo-registers are valid
//! and writes it back, so fields the cache does not model survive.

use tracing::debug;

use super::{ClassSync, SyncContext, SyncReport};
use crate::error::Result;
use crate::fpu;
use crate::kernel::ThreadControl;
use crate::thread::TracedThread;
use crate::types::{RegisterRequest, StateClass};

/// x87 stack slots and control pseudo-registers, via the FPU codec
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FloatingPointRegisterClass;

impl ClassSync for FloatingPointRegisterClass
{
    const STATE: StateClass = StateClass::FloatingPoint;

    fn fetch<K>(&self, ctx: &mut SyncContext<'_, K>, thread: &mut TracedThread, _request: RegisterRequest) -> Result<()>
    where
        K: ThreadControl + ?Sized,
    {
        let layout = ctx.arch.float();
        debug!(thread = %thread.id(), "fetching floating-point registers");

        let block = ctx
            .kernel
            .get_state(thread.port(), StateClass::FloatingPoint)?
            .checked(StateClass::FloatingPoint, layout.block_size)?;

        if !fpu::is_initialized(layout, &block) {
            debug!(thread = %thread.id(), "floating-point state not initialized");
        }

        for (index, value) in fpu::decode(layout, &block) {
            thread.cache.supply(index, value.as_deref());
        }

        Ok(())
    }

    fn store<K>(
        &self,
        ctx: &mut SyncContext<'_, K>,
        thread: &mut TracedThread,
        _request: RegisterRequest,
        _report: &mut SyncReport,
    ) -> Result<()>
    where
        K: ThreadControl + ?Sized,
    {
        let layout = ctx.arch.float();
        let port = thread.port();
        debug!(thread = %thread.id(), "storing floating-point registers");

        let mut block = ctx
            .kernel
            .get_state(port, StateClass::FloatingPoint)?
            .checked(StateClass::FloatingPoint, layout.block_size)?;

        let cache = &thread.cache;
        let valid = |index| cache.is_valid(index);
        fpu::encode(layout, cache, Some(&valid), &mut block);

        ctx.kernel.set_state(port, StateClass::FloatingPoint, &block)
    }
}
