//! # GNU Mach Backend
//!
//! [`ThreadControl`](crate::kernel::ThreadControl) and
//! [`ThreadSource`](crate::thread::ThreadSource) for i386 GNU/Hurd, on top of
//! GNU Mach thread RPCs.
//!
//! Unlike `ptrace`, Mach exposes a traced thread through a send right to its
//! thread port. Register state is read and written as flat word arrays
//! ("flavors"); halting a thread is a suspend followed by `thread_abort()`,
//! which pulls it out of any system call so its user state is final.
//!
//! ## Key Mach APIs Used
//!
//! - `task_threads()`: Enumerate threads in the traced task
//! - `thread_get_state()` / `thread_set_state()`: `i386_THREAD_STATE`, `i386_FLOAT_STATE`
//! - `thread_suspend()` + `thread_abort()`: Forced halt

#![allow(unsafe_code)] // Required for Mach RPCs

pub mod control;
pub mod error;
pub mod ffi;

pub use control::{MachThreadControl, MachThreadSource};
pub use error::MachError;
