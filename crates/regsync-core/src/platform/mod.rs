//! # Platform Implementations
//!
//! Implementations of the kernel thread-control interface.
//!
//! - **memory**: In-process kernel with simulated threads, available on every
//!   platform. Used by the test suite and the CLI's drift demonstration.
//! - **mach**: GNU Mach RPCs for i386 GNU/Hurd
//!   - See: [GNU Mach Reference Manual](https://www.gnu.org/software/hurd/gnumach-doc/)

pub mod memory;

#[cfg(target_os = "hurd")]
pub mod mach;
