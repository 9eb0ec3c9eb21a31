//! # Architecture Descriptors
//!
//! Concrete [`ArchDescriptor`](crate::layout::ArchDescriptor)s for supported
//! targets. Each is built once, on first use, and shared for the lifetime of
//! the process.
//!
//! - **i386 GNU/Mach**: `i386_thread_state` + `i386_float_state`

pub mod i386;
