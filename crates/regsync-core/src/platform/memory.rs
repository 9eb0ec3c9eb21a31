//! # In-Memory Kernel
//!
//! A software implementation of [`ThreadControl`] and [`ThreadSource`].
//!
//! Each simulated thread has a "true" general block and floating-point block.
//! The handle is cheap to clone and all clones share the same state, so a
//! test can give one clone to the engine, another to a
//! [`ThreadTable`](crate::thread::ThreadTable), and keep a third to play the
//! traced thread:
//!
//! - [`write_register`](MemoryKernel::write_register) changes a register now,
//!   as if the thread executed while nobody was looking;
//! - [`run_before_halt`](MemoryKernel::run_before_halt) queues a change that
//!   lands when the thread is next halted, modelling a thread that keeps
//!   running until `force_halt` stops it;
//! - [`fail_next`](MemoryKernel::fail_next) makes the next matching kernel call
//!   fail.
//!
//! State lives in an `Rc<RefCell<_>>`, so the handle is not `Send`.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::sync::Arc;

use tracing::debug;

use crate::block::RawBlock;
use crate::error::{RegSyncError, Result};
use crate::kernel::ThreadControl;
use crate::layout::ArchDescriptor;
use crate::thread::ThreadSource;
use crate::types::{RegisterBytes, RegisterIndex, StateClass, ThreadId, ThreadPort};

/// Default x87 control word after `fninit`
pub const FNINIT_CONTROL_WORD: u16 = 0x037f;

/// Kernel operations, for failure injection and call counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelOp
{
    /// `get_state` of a class
    GetState(StateClass),
    /// `set_state` of a class
    SetState(StateClass),
    /// `force_halt`
    ForceHalt,
}

#[derive(Debug)]
struct SimThread
{
    id: ThreadId,
    general: RawBlock,
    float: RawBlock,
    halted: bool,
    before_halt: Vec<(RegisterIndex, RegisterBytes)>,
}

#[derive(Debug)]
struct KernelState
{
    arch: Arc<ArchDescriptor>,
    threads: BTreeMap<ThreadPort, SimThread>,
    failures: Vec<KernelOp>,
    calls: HashMap<KernelOp, usize>,
}

/// Shared handle to an in-memory kernel
#[derive(Debug, Clone)]
pub struct MemoryKernel
{
    state: Rc<RefCell<KernelState>>,
}

impl MemoryKernel
{
    /// Create a kernel with no threads
    pub fn new(arch: Arc<ArchDescriptor>) -> Self
    {
        Self {
            state: Rc::new(RefCell::new(KernelState {
                arch,
                threads: BTreeMap::new(),
                failures: Vec::new(),
                calls: HashMap::new(),
            })),
        }
    }

    /// Create a running thread with zeroed registers and freshly initialized FPU state
    pub fn spawn(&self, id: ThreadId, port: ThreadPort)
    {
        let mut state = self.state.borrow_mut();
        let float_layout = *state.arch.float();
        let mut float = RawBlock::zeroed(float_layout.block_size);
        float.write_u32(float_layout.initialized_offset, 1);
        float.write_u16(float_layout.env_offset, FNINIT_CONTROL_WORD);

        let thread = SimThread {
            id,
            general: RawBlock::zeroed(state.arch.general_block_size()),
            float,
            halted: false,
            before_halt: Vec::new(),
        };
        state.threads.insert(port, thread);
    }

    /// Destroy a thread
    pub fn kill(&self, port: ThreadPort)
    {
        self.state.borrow_mut().threads.remove(&port);
    }

    /// Let a halted thread run again
    pub fn resume(&self, port: ThreadPort)
    {
        if let Some(thread) = self.state.borrow_mut().threads.get_mut(&port) {
            thread.halted = false;
        }
    }

    /// Whether the thread is halted
    pub fn is_halted(&self, port: ThreadPort) -> bool
    {
        self.state
            .borrow()
            .threads
            .get(&port)
            .is_some_and(|thread| thread.halted)
    }

    /// Change a general register of the thread immediately
    ///
    /// ## Panics
    ///
    /// Panics if the thread does not exist or `index` is not a general register.
    pub fn write_register(&self, port: ThreadPort, index: RegisterIndex, value: &[u8])
    {
        let mut state = self.state.borrow_mut();
        let desc = *state.arch.descriptor(index);
        thread_mut(&mut state.threads, port).general.set_field(&desc, value);
    }

    /// Current true value of a general register
    ///
    /// ## Panics
    ///
    /// Panics if the thread does not exist or `index` is not a general register.
    pub fn read_register(&self, port: ThreadPort, index: RegisterIndex) -> RegisterBytes
    {
        let state = self.state.borrow();
        let desc = state.arch.descriptor(index);
        let thread = state.threads.get(&port).expect("no such simulated thread");
        RegisterBytes::from_slice(thread.general.field(desc))
    }

    /// Queue a change the thread makes before it is next halted
    pub fn run_before_halt(&self, port: ThreadPort, index: RegisterIndex, value: &[u8])
    {
        let mut state = self.state.borrow_mut();
        thread_mut(&mut state.threads, port)
            .before_halt
            .push((index, RegisterBytes::from_slice(value)));
    }

    /// Copy of the thread's true raw block of `class`
    pub fn block(&self, port: ThreadPort, class: StateClass) -> Option<RawBlock>
    {
        let state = self.state.borrow();
        state.threads.get(&port).map(|thread| match class {
            StateClass::General => thread.general.clone(),
            StateClass::FloatingPoint => thread.float.clone(),
        })
    }

    /// Replace the thread's true raw block of `class`
    pub fn set_block(&self, port: ThreadPort, class: StateClass, block: RawBlock)
    {
        let mut state = self.state.borrow_mut();
        let thread = thread_mut(&mut state.threads, port);
        match class {
            StateClass::General => thread.general = block,
            StateClass::FloatingPoint => thread.float = block,
        }
    }

    /// Make the next call of `op` fail
    pub fn fail_next(&self, op: KernelOp)
    {
        self.state.borrow_mut().failures.push(op);
    }

    /// How many times `op` has been called
    pub fn calls(&self, op: KernelOp) -> usize
    {
        self.state
            .borrow()
            .calls
            .get(&op)
            .copied()
            .unwrap_or(0)
    }

    /// Count the call and consume a pending failure for it, if any
    fn enter(&self, op: KernelOp, port: ThreadPort) -> Result<()>
    {
        let mut state = self.state.borrow_mut();
        *state.calls.entry(op).or_default() += 1;

        if let Some(position) = state.failures.iter().position(|pending| *pending == op) {
            state.failures.remove(position);
            return Err(RegSyncError::KernelCallFailed {
                operation: format!("{op:?}"),
                thread: state.threads.get(&port).map(|thread| thread.id),
                details: "injected failure".to_string(),
            });
        }

        if !state.threads.contains_key(&port) {
            return Err(RegSyncError::KernelCallFailed {
                operation: format!("{op:?}"),
                thread: None,
                details: format!("{port} is not a thread"),
            });
        }

        Ok(())
    }
}

fn thread_mut(threads: &mut BTreeMap<ThreadPort, SimThread>, port: ThreadPort) -> &mut SimThread
{
    threads.get_mut(&port).expect("no such simulated thread")
}

impl ThreadControl for MemoryKernel
{
    fn get_state(&mut self, thread: ThreadPort, class: StateClass) -> Result<RawBlock>
    {
        self.enter(KernelOp::GetState(class), thread)?;
        self.block(thread, class).ok_or_else(|| RegSyncError::InvalidArgument(format!("{thread} vanished")))
    }

    fn set_state(&mut self, thread: ThreadPort, class: StateClass, block: &RawBlock) -> Result<()>
    {
        self.enter(KernelOp::SetState(class), thread)?;
        self.set_block(thread, class, block.clone());
        Ok(())
    }

    fn force_halt(&mut self, thread: ThreadPort) -> Result<()>
    {
        self.enter(KernelOp::ForceHalt, thread)?;

        let mut state = self.state.borrow_mut();
        let state = &mut *state;
        let sim = thread_mut(&mut state.threads, thread);
        if sim.halted {
            return Ok(());
        }

        for (index, value) in sim.before_halt.drain(..) {
            let desc = state.arch.descriptor(index);
            sim.general.set_field(desc, &value);
        }
        sim.halted = true;
        debug!(%thread, "halted simulated thread");
        Ok(())
    }
}

impl ThreadSource for MemoryKernel
{
    fn enumerate(&mut self) -> Result<Vec<(ThreadId, ThreadPort)>>
    {
        Ok(self
            .state
            .borrow()
            .threads
            .iter()
            .map(|(&port, thread)| (thread.id, port))
            .collect())
    }
}
