//! Register identifiers and requests.

use std::fmt;

use smallvec::SmallVec;

/// Bytes of a single register value.
///
/// Every register this layer handles fits in 16 bytes (the widest is a
/// 10-byte x87 stack slot), so values stay inline.
pub type RegisterBytes = SmallVec<[u8; 16]>;

/// Logical register index
///
/// Indices are dense from zero: general registers first, then the
/// floating-point pseudo-registers. The meaning of each index is defined by
/// the [`ArchDescriptor`](crate::layout::ArchDescriptor) in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegisterIndex(pub usize);

impl RegisterIndex
{
    /// Get the raw index
    pub const fn get(self) -> usize
    {
        self.0
    }
}

impl From<usize> for RegisterIndex
{
    fn from(value: usize) -> Self
    {
        Self(value)
    }
}

impl fmt::Display for RegisterIndex
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.0)
    }
}

/// What a fetch or store operation covers
///
/// ## Example
///
/// ```rust
/// use regsync_core::types::{RegisterIndex, RegisterRequest};
///
/// let one = RegisterRequest::Single(RegisterIndex(0));
/// assert!(one.covers(RegisterIndex(0)));
/// assert!(!one.covers(RegisterIndex(1)));
/// assert!(RegisterRequest::All.covers(RegisterIndex(31)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterRequest
{
    /// Every general and floating-point register
    All,
    /// A single logical register
    Single(RegisterIndex),
}

impl RegisterRequest
{
    /// Whether `index` is part of this request
    pub fn covers(self, index: RegisterIndex) -> bool
    {
        match self {
            RegisterRequest::All => true,
            RegisterRequest::Single(single) => single == index,
        }
    }
}

impl From<RegisterIndex> for RegisterRequest
{
    fn from(index: RegisterIndex) -> Self
    {
        RegisterRequest::Single(index)
    }
}

/// Kernel thread-state class ("flavor" in Mach terms)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateClass
{
    /// Integer/segment register block
    General,
    /// Floating-point environment block
    FloatingPoint,
}

impl fmt::Display for StateClass
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            StateClass::General => f.write_str("general"),
            StateClass::FloatingPoint => f.write_str("floating-point"),
        }
    }
}
