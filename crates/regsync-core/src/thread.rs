//! # Traced Threads
//!
//! Per-thread state owned by this layer, and the directory that resolves
//! debugger thread ids to it.
//!
//! A [`TracedThread`] is the thread-control handle the engine operates on. It
//! owns the thread's [`RegisterCache`] and its [`ThreadSnapshot`], so no
//! register state is global.
//!
//! ## Snapshot State Machine
//!
//! ```text
//! running ──fetch──▶ running(snapshot)      observed without halting
//!    │                     │
//!    └──────store──────────┴──▶ halting ──▶ halted(snapshot)
//!                                              │
//!                 resumed() ◀──────────────────┘
//! ```
//!
//! A snapshot taken while running is discarded when the thread is halted,
//! because the thread may have executed in between. That is the window the
//! engine's drift check covers.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::block::RawBlock;
use crate::cache::RegisterCache;
use crate::error::Result;
use crate::kernel::ThreadControl;
use crate::layout::ArchDescriptor;
use crate::types::{StateClass, ThreadId, ThreadPort};

/// Last general-register block read from (or written to) a thread
#[derive(Debug, Clone, Default)]
pub struct ThreadSnapshot
{
    general: Option<RawBlock>,
    halted: bool,
}

impl ThreadSnapshot
{
    /// Whether a general-register block is held
    pub fn is_valid(&self) -> bool
    {
        self.general.is_some()
    }

    /// Whether this layer halted the thread and it has not resumed since
    pub fn is_halted(&self) -> bool
    {
        self.halted
    }

    /// Whether the thread is halted and its post-halt block is held
    pub fn holds_halted_state(&self) -> bool
    {
        self.halted && self.general.is_some()
    }

    /// The held general-register block, if any
    pub fn general(&self) -> Option<&RawBlock>
    {
        self.general.as_ref()
    }

    /// The thread ran: the snapshot no longer describes it
    pub fn resumed(&mut self)
    {
        self.general = None;
        self.halted = false;
    }

    /// Replace the held block after a successful write to the kernel
    pub(crate) fn replace(&mut self, block: RawBlock)
    {
        self.general = Some(block);
    }

    /// Obtain the thread's general-register block
    ///
    /// With `will_modify`, the thread is halted first; a snapshot taken before
    /// that halt is discarded and the block is read fresh. Otherwise the held
    /// snapshot is returned if there is one.
    pub(crate) fn acquire<K>(
        &mut self,
        kernel: &mut K,
        port: ThreadPort,
        block_size: usize,
        will_modify: bool,
    ) -> Result<RawBlock>
    where
        K: ThreadControl + ?Sized,
    {
        if will_modify && !self.halted {
            kernel.force_halt(port)?;
            self.halted = true;
            self.general = None;
        }

        if let Some(block) = &self.general {
            return Ok(block.clone());
        }

        let block = kernel
            .get_state(port, StateClass::General)?
            .checked(StateClass::General, block_size)?;
        self.general = Some(block.clone());
        Ok(block)
    }
}

/// A traced thread as seen by the synchronization layer
#[derive(Debug, Clone)]
pub struct TracedThread
{
    id: ThreadId,
    port: ThreadPort,
    pub(crate) cache: RegisterCache,
    pub(crate) snapshot: ThreadSnapshot,
}

impl TracedThread
{
    /// Create a handle with an empty cache sized for `arch`
    pub fn new(id: ThreadId, port: ThreadPort, arch: &ArchDescriptor) -> Self
    {
        Self {
            id,
            port,
            cache: RegisterCache::for_arch(arch),
            snapshot: ThreadSnapshot::default(),
        }
    }

    /// Debugger thread id
    pub fn id(&self) -> ThreadId
    {
        self.id
    }

    /// Kernel thread-control handle
    pub fn port(&self) -> ThreadPort
    {
        self.port
    }

    /// The thread's register cache
    pub fn cache(&self) -> &RegisterCache
    {
        &self.cache
    }

    /// The thread's register cache (mutable)
    pub fn cache_mut(&mut self) -> &mut RegisterCache
    {
        &mut self.cache
    }

    /// The thread's snapshot state
    pub fn snapshot(&self) -> &ThreadSnapshot
    {
        &self.snapshot
    }

    /// Notify that the thread resumed execution
    ///
    /// Drops the snapshot and every cached value, so the next fetch reads
    /// fresh state and the next store goes through reconciliation again.
    pub fn resumed(&mut self)
    {
        debug!(thread = %self.id, "thread resumed, dropping register state");
        self.snapshot.resumed();
        self.cache.invalidate_all();
    }
}

/// Resolves debugger thread ids to thread handles
pub trait ThreadDirectory
{
    /// Pick up threads created (and drop threads destroyed) since the last call
    fn refresh_known_threads(&mut self) -> Result<()>;

    /// Handle for `id`, if the thread is known
    fn resolve(&mut self, id: ThreadId) -> Option<&mut TracedThread>;
}

/// Enumerates the live threads of the traced task
pub trait ThreadSource
{
    /// Current `(id, port)` pairs
    fn enumerate(&mut self) -> Result<Vec<(ThreadId, ThreadPort)>>;
}

/// Default [`ThreadDirectory`]: a table refreshed from a [`ThreadSource`]
///
/// Refreshing keeps the cache and snapshot of threads that are still alive,
/// adds fresh handles for new threads and drops the rest.
#[derive(Debug)]
pub struct ThreadTable<S>
{
    arch: Arc<ArchDescriptor>,
    source: S,
    threads: BTreeMap<ThreadId, TracedThread>,
}

impl<S: ThreadSource> ThreadTable<S>
{
    /// Create an empty table; call `refresh_known_threads` to populate it
    pub fn new(arch: Arc<ArchDescriptor>, source: S) -> Self
    {
        Self {
            arch,
            source,
            threads: BTreeMap::new(),
        }
    }

    /// Number of known threads
    pub fn len(&self) -> usize
    {
        self.threads.len()
    }

    /// Whether no threads are known
    pub fn is_empty(&self) -> bool
    {
        self.threads.is_empty()
    }

    /// Known thread ids in ascending order
    pub fn ids(&self) -> impl Iterator<Item = ThreadId> + '_
    {
        self.threads.keys().copied()
    }

    /// Handle for `id` without refreshing
    pub fn get(&self, id: ThreadId) -> Option<&TracedThread>
    {
        self.threads.get(&id)
    }

    /// The underlying thread source
    pub fn source_mut(&mut self) -> &mut S
    {
        &mut self.source
    }
}

impl<S: ThreadSource> ThreadDirectory for ThreadTable<S>
{
    fn refresh_known_threads(&mut self) -> Result<()>
    {
        let live = self.source.enumerate()?;

        self.threads
            .retain(|id, thread| live.iter().any(|&(live_id, port)| live_id == *id && port == thread.port()));

        for (id, port) in live {
            if !self.threads.contains_key(&id) {
                debug!(thread = %id, %port, "new thread");
                self.threads.insert(id, TracedThread::new(id, port, &self.arch));
            }
        }

        Ok(())
    }

    fn resolve(&mut self, id: ThreadId) -> Option<&mut TracedThread>
    {
        self.threads.get_mut(&id)
    }
}
