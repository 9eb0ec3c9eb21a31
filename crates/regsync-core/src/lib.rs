//! # regsync-core
//!
//! Register-state synchronization between a traced thread's kernel state and
//! a debugger's per-register cache.
//!
//! This crate provides:
//! - A data-driven register layout ([`layout`], [`arch`])
//! - A codec for the x87 floating-point environment block ([`fpu`])
//! - A per-thread register cache and snapshot state ([`cache`], [`thread`])
//! - A fetch/store engine that detects registers the thread changed between
//!   an earlier observation and a forced halt ([`engine`])
//!
//! ## Platform Support
//!
//! - **GNU/Hurd (i386)**: Uses Mach RPCs (`thread_get_state`, `thread_abort`, etc.)
//! - **Everywhere**: An in-memory kernel for tests and demonstrations
//!
//! ## Example
//!
//! ```rust
//! use regsync_core::arch::i386::{self, regnum};
//! use regsync_core::platform::memory::MemoryKernel;
//! use regsync_core::types::{RegisterRequest, ThreadId, ThreadPort};
//! use regsync_core::{RegisterEngine, ThreadTable};
//!
//! let arch = i386::gnu();
//! let kernel = MemoryKernel::new(arch.clone());
//! kernel.spawn(ThreadId(1), ThreadPort(100));
//!
//! let mut threads = ThreadTable::new(arch.clone(), kernel.clone());
//! let mut engine = RegisterEngine::new(arch, kernel);
//!
//! let report = engine.fetch_registers(&mut threads, ThreadId(1), RegisterRequest::Single(regnum::EIP))?;
//! assert!(report.is_complete());
//! # Ok::<(), regsync_core::RegSyncError>(())
//! ```

pub mod arch;
pub mod block;
pub mod cache;
pub mod engine;
pub mod error;
pub mod fpu;
pub mod kernel;
pub mod layout;
pub mod platform;
pub mod thread;
pub mod types;

pub use block::RawBlock;
pub use cache::RegisterCache;
pub use engine::{ClassOutcome, DriftWarning, RegisterEngine, SyncReport};
// Re-export commonly used types
pub use error::{RegSyncError, Result};
pub use kernel::ThreadControl;
pub use layout::{ArchDescriptor, RegisterDescriptor};
pub use thread::{ThreadDirectory, ThreadSource, ThreadTable, TracedThread};
