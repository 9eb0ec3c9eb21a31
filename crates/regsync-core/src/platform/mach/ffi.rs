//! # GNU Mach FFI Declarations
//!
//! `extern "C"` declarations for the Mach RPCs this backend uses. On GNU/Hurd
//! they are exported by glibc's `libmachuser` stubs, linked into every
//! program.
//!
//! ## Safety Notes
//!
//! All functions in this module are `unsafe`: they take raw pointers sized by
//! the caller and talk to the kernel directly. They are wrapped in safe
//! abstractions in [`super::control`].
//!
//! ## References
//!
//! - [GNU Mach Reference Manual: Thread Execution](https://www.gnu.org/software/hurd/gnumach-doc/Thread-Execution.html)
//! - [GNU Mach Reference Manual: Thread Special Ports](https://www.gnu.org/software/hurd/gnumach-doc/Thread-Interface.html)

// Allow doc comments in extern blocks - they're useful for developers even if rustdoc doesn't generate docs
#![allow(unused_doc_comments)]
#![allow(non_camel_case_types)]

use libc::{c_int, c_uint};

/// Mach port name
pub type mach_port_t = c_uint;
/// Kernel return code
pub type kern_return_t = c_int;
/// Machine word used for thread-state arrays
pub type natural_t = c_uint;
/// Element count of a message array
pub type mach_msg_type_number_t = natural_t;
/// Thread-state flavor selector
pub type thread_state_flavor_t = c_int;
/// Address in a task's address space
pub type vm_address_t = usize;
/// Size in a task's address space
pub type vm_size_t = usize;

/// Success
pub const KERN_SUCCESS: kern_return_t = 0;
/// Invalid address
pub const KERN_INVALID_ADDRESS: kern_return_t = 1;
/// Operation not permitted
pub const KERN_PROTECTION_FAILURE: kern_return_t = 2;
/// Invalid argument (unknown flavor, short buffer, ...)
pub const KERN_INVALID_ARGUMENT: kern_return_t = 4;
/// Generic failure
pub const KERN_FAILURE: kern_return_t = 5;
/// The destination port of an RPC is dead (the thread is gone)
pub const MACH_SEND_INVALID_DEST: kern_return_t = 0x1000_0003;

/// `i386_THREAD_STATE` flavor
pub const I386_THREAD_STATE: thread_state_flavor_t = 1;
/// `i386_FLOAT_STATE` flavor
pub const I386_FLOAT_STATE: thread_state_flavor_t = 2;
/// Words in `struct i386_thread_state`
pub const I386_THREAD_STATE_COUNT: mach_msg_type_number_t = 17;
/// Words in `struct i386_float_state`
pub const I386_FLOAT_STATE_COUNT: mach_msg_type_number_t = 30;

extern "C" {
    /// Port of the calling task
    pub fn mach_task_self() -> mach_port_t;

    /// Release a send right
    pub fn mach_port_deallocate(task: mach_port_t, name: mach_port_t) -> kern_return_t;

    /// Enumerate the threads of `target_task`
    ///
    /// `act_list` is allocated out-of-line in the caller's address space and
    /// must be released with `vm_deallocate`.
    pub fn task_threads(
        target_task: mach_port_t,
        act_list: *mut *mut mach_port_t,
        act_count: *mut mach_msg_type_number_t,
    ) -> kern_return_t;

    /// Read the state of `flavor` from `target_thread`
    ///
    /// `count` is the capacity of `old_state` in words on input and the
    /// number of words written on output.
    pub fn thread_get_state(
        target_thread: mach_port_t,
        flavor: thread_state_flavor_t,
        old_state: *mut natural_t,
        count: *mut mach_msg_type_number_t,
    ) -> kern_return_t;

    /// Replace the state of `flavor` in `target_thread`
    pub fn thread_set_state(
        target_thread: mach_port_t,
        flavor: thread_state_flavor_t,
        new_state: *const natural_t,
        count: mach_msg_type_number_t,
    ) -> kern_return_t;

    /// Increment the thread's suspend count
    pub fn thread_suspend(target_thread: mach_port_t) -> kern_return_t;

    /// Abort any kernel operation the (suspended) thread is blocked in
    ///
    /// After this returns the thread's user state is final and may be
    /// modified; an interrupted system call will restart or fail.
    pub fn thread_abort(target_thread: mach_port_t) -> kern_return_t;

    /// Free memory in `target_task`
    pub fn vm_deallocate(target_task: mach_port_t, address: vm_address_t, size: vm_size_t) -> kern_return_t;
}
