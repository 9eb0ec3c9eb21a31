//! Thread-state access and thread enumeration through GNU Mach RPCs.

use std::collections::BTreeMap;
use std::mem;

use tracing::{debug, warn};

use super::error::{check, MachError};
use super::ffi;
use crate::block::RawBlock;
use crate::error::{RegSyncError, Result};
use crate::kernel::ThreadControl;
use crate::thread::ThreadSource;
use crate::types::{StateClass, ThreadId, ThreadPort};

const WORD: usize = mem::size_of::<ffi::natural_t>();

fn flavor(class: StateClass) -> (ffi::thread_state_flavor_t, ffi::mach_msg_type_number_t)
{
    match class {
        StateClass::General => (ffi::I386_THREAD_STATE, ffi::I386_THREAD_STATE_COUNT),
        StateClass::FloatingPoint => (ffi::I386_FLOAT_STATE, ffi::I386_FLOAT_STATE_COUNT),
    }
}

fn kernel_error(operation: &str, thread: ThreadPort, err: MachError) -> RegSyncError
{
    RegSyncError::KernelCallFailed {
        operation: format!("{operation} on {thread}"),
        thread: None,
        details: err.to_string(),
    }
}

/// [`ThreadControl`] over GNU Mach thread ports
///
/// Remembers which threads it suspended, so the debugger's resume logic can
/// balance the suspend count with [`take_suspended`](Self::take_suspended).
#[derive(Debug, Default)]
pub struct MachThreadControl
{
    suspended: Vec<ThreadPort>,
}

impl MachThreadControl
{
    /// Create a backend
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Threads suspended by `force_halt` since the last call
    pub fn take_suspended(&mut self) -> Vec<ThreadPort>
    {
        mem::take(&mut self.suspended)
    }
}

impl ThreadControl for MachThreadControl
{
    fn get_state(&mut self, thread: ThreadPort, class: StateClass) -> Result<RawBlock>
    {
        let (flavor, capacity) = flavor(class);
        let mut words: Vec<ffi::natural_t> = vec![0; capacity as usize];
        let mut count = capacity;

        let kr = unsafe { ffi::thread_get_state(thread.raw(), flavor, words.as_mut_ptr(), &mut count) };
        check(kr).map_err(|err| kernel_error("thread_get_state", thread, err))?;

        words.truncate(count as usize);
        let bytes = words.iter().flat_map(|word| word.to_le_bytes()).collect();
        Ok(RawBlock::new(bytes))
    }

    fn set_state(&mut self, thread: ThreadPort, class: StateClass, block: &RawBlock) -> Result<()>
    {
        let (flavor, capacity) = flavor(class);
        if block.len() != capacity as usize * WORD {
            return Err(RegSyncError::BlockSize {
                class,
                expected: capacity as usize * WORD,
                actual: block.len(),
            });
        }

        let words: Vec<ffi::natural_t> = block
            .as_bytes()
            .chunks_exact(WORD)
            .map(|chunk| ffi::natural_t::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        let kr = unsafe { ffi::thread_set_state(thread.raw(), flavor, words.as_ptr(), capacity) };
        check(kr).map_err(|err| kernel_error("thread_set_state", thread, err))
    }

    fn force_halt(&mut self, thread: ThreadPort) -> Result<()>
    {
        let kr = unsafe { ffi::thread_suspend(thread.raw()) };
        check(kr).map_err(|err| kernel_error("thread_suspend", thread, err))?;
        self.suspended.push(thread);
        warn!(%thread, "stopped thread");

        let kr = unsafe { ffi::thread_abort(thread.raw()) };
        check(kr).map_err(|err| kernel_error("thread_abort", thread, err))?;
        debug!(%thread, "aborted thread");
        Ok(())
    }
}

/// [`ThreadSource`] enumerating a task's threads with `task_threads()`
///
/// Thread ids are assigned in discovery order starting at 1 and stay stable
/// for as long as the thread port is alive.
#[derive(Debug)]
pub struct MachThreadSource
{
    task: ffi::mach_port_t,
    ids: BTreeMap<ThreadPort, ThreadId>,
    next_id: u64,
}

impl MachThreadSource
{
    /// Enumerate the threads of `task` (a send right to the traced task)
    pub fn new(task: ffi::mach_port_t) -> Self
    {
        Self {
            task,
            ids: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl ThreadSource for MachThreadSource
{
    fn enumerate(&mut self) -> Result<Vec<(ThreadId, ThreadPort)>>
    {
        let mut threads: *mut ffi::mach_port_t = std::ptr::null_mut();
        let mut count: ffi::mach_msg_type_number_t = 0;

        let kr = unsafe { ffi::task_threads(self.task, &mut threads, &mut count) };
        check(kr)?;

        let ports: Vec<ThreadPort> = if threads.is_null() || count == 0 {
            Vec::new()
        } else {
            let slice = unsafe { std::slice::from_raw_parts(threads, count as usize) };
            let ports = slice.iter().copied().map(ThreadPort).collect();
            unsafe {
                let size = (count as usize).saturating_mul(mem::size_of::<ffi::mach_port_t>());
                let _ = ffi::vm_deallocate(ffi::mach_task_self(), threads as ffi::vm_address_t, size);
            }
            ports
        };

        // task_threads hands out a fresh user reference for every port; keep one.
        self.ids.retain(|port, _| ports.contains(port));
        let mut live = Vec::with_capacity(ports.len());
        for port in ports {
            if let Some(&id) = self.ids.get(&port) {
                unsafe {
                    let _ = ffi::mach_port_deallocate(ffi::mach_task_self(), port.raw());
                }
                live.push((id, port));
            } else {
                let id = ThreadId(self.next_id);
                self.next_id += 1;
                self.ids.insert(port, id);
                live.push((id, port));
            }
        }

        Ok(live)
    }
}
