//! # Types
//!
//! Small, platform-agnostic types used throughout the synchronization layer.
//!
//! These types abstract away kernel-specific details, allowing the engine to
//! work with concepts like "thread" and "register index" without knowing
//! whether the backing kernel is GNU Mach or an in-memory test double.

pub mod registers;
pub mod thread;

// Re-export all public types
pub use registers::{RegisterBytes, RegisterIndex, RegisterRequest, StateClass};
pub use thread::{ThreadId, ThreadPort};
