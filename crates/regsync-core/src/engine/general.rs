//! General-register class.

use tracing::{debug, warn};

use super::{ClassSync, DriftWarning, SyncContext, SyncReport};
use crate::block::RawBlock;
use crate::cache::RegisterCache;
use crate::error::Result;
use crate::kernel::ThreadControl;
use crate::layout::ArchDescriptor;
use crate::thread::TracedThread;
use crate::types::{RegisterRequest, StateClass, ThreadId};

/// Integer and segment registers, stored at fixed offsets of the general block
///
/// ## Store and Drift Reconciliation
///
/// 1. Remember whether the thread held a snapshot taken while it was running
///    (`old`): only then is there a window in which it could have executed
///    after we looked at it.
/// 2. Halt the thread and read its state again (`new`).
/// 3. For each register the cache copied from the kernel, compare `old` and
///    `new`. A difference means the thread changed it:
///    - warn, naming the register;
///    - if this store does not write it, adopt the kernel's value in the cache;
///    - if it does, warn again and write the caller's value anyway.
/// 4. Write the requested registers into `new` and commit it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeneralRegisterClass;

impl ClassSync for GeneralRegisterClass
{
    const STATE: StateClass = StateClass::General;

    fn fetch<K>(&self, ctx: &mut SyncContext<'_, K>, thread: &mut TracedThread, request: RegisterRequest) -> Result<()>
    where
        K: ThreadControl + ?Sized,
    {
        let arch = ctx.arch;
        let port = thread.port();
        let block = thread
            .snapshot
            .acquire(&mut *ctx.kernel, port, arch.general_block_size(), false)?;

        match request {
            RegisterRequest::All => {
                debug!(thread = %thread.id(), "fetching all registers");
                for desc in arch.general() {
                    thread.cache.supply(desc.index, Some(block.field(desc)));
                    thread.cache.mark_fetched(desc.index);
                }
            }
            RegisterRequest::Single(index) => {
                let desc = arch.descriptor(index);
                debug!(thread = %thread.id(), register = desc.name, "fetching register");
                thread.cache.supply(index, Some(block.field(desc)));
                thread.cache.mark_fetched(index);
            }
        }

        Ok(())
    }

    fn store<K>(
        &self,
        ctx: &mut SyncContext<'_, K>,
        thread: &mut TracedThread,
        request: RegisterRequest,
        report: &mut SyncReport,
    ) -> Result<()>
    where
        K: ThreadControl + ?Sized,
    {
        let arch = ctx.arch;
        let id = thread.id();
        let port = thread.port();

        if let RegisterRequest::Single(index) = request {
            assert!(
                thread.cache.is_valid(index),
                "storing register {} of {id} without a valid cached value",
                arch.register_name(index)
            );
        }

        let old = if thread.snapshot.is_halted() {
            None
        } else {
            thread.snapshot.general().cloned()
        };

        let mut block = thread
            .snapshot
            .acquire(&mut *ctx.kernel, port, arch.general_block_size(), true)?;

        if let Some(old) = old {
            reconcile(arch, id, &old, &block, &mut thread.cache, request, report);
        }

        match request {
            RegisterRequest::All => {
                debug!(thread = %id, "storing all registers");
                for desc in arch.general() {
                    let (value, valid) = thread.cache.read(desc.index);
                    if valid {
                        block.set_field(desc, value);
                    }
                }
            }
            RegisterRequest::Single(index) => {
                let desc = arch.descriptor(index);
                debug!(thread = %id, register = desc.name, "storing register");
                block.set_field(desc, thread.cache.read(index).0);
            }
        }

        ctx.kernel.set_state(port, StateClass::General, &block)?;
        thread.snapshot.replace(block);
        Ok(())
    }
}

/// Compare the pre-halt snapshot with the post-halt state for every fetched register
fn reconcile(
    arch: &ArchDescriptor,
    thread: ThreadId,
    old: &RawBlock,
    new: &RawBlock,
    cache: &mut RegisterCache,
    request: RegisterRequest,
    report: &mut SyncReport,
)
{
    for desc in arch.general() {
        if !cache.is_fetched(desc.index) || old.field(desc) == new.field(desc) {
            continue;
        }

        warn!(%thread, register = desc.name, "register {} changed after the thread was halted", desc.name);

        let overwritten = match request {
            RegisterRequest::All => cache.is_valid(desc.index),
            RegisterRequest::Single(index) => index == desc.index,
        };
        if overwritten {
            warn!(%thread, register = desc.name, "... also writing this register, the thread's change may be lost");
        } else {
            cache.supply(desc.index, Some(new.field(desc)));
        }

        report.drift.push(DriftWarning {
            register: desc.index,
            name: desc.name,
            overwritten,
        });
    }
}
