//! # Raw Register Blocks
//!
//! Opaque byte blobs exchanged with the kernel thread-control interface.
//!
//! The layout of a block is fixed by the target ABI. This layer never
//! reinterprets a block as a whole: it only reads and writes named fields,
//! either through a [`RegisterDescriptor`] or at an explicit offset, and every
//! other byte passes through unmodified.
//!
//! All multi-byte accessors are little-endian, matching i386.

use crate::error::{RegSyncError, Result};
use crate::layout::RegisterDescriptor;
use crate::types::StateClass;

/// Owned raw thread-state block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock
{
    bytes: Vec<u8>,
}

impl RawBlock
{
    /// Wrap bytes received from the kernel
    pub fn new(bytes: Vec<u8>) -> Self
    {
        Self { bytes }
    }

    /// Create an all-zero block of `len` bytes
    pub fn zeroed(len: usize) -> Self
    {
        Self { bytes: vec![0; len] }
    }

    /// Size of the block in bytes
    pub fn len(&self) -> usize
    {
        self.bytes.len()
    }

    /// Whether the block is empty
    pub fn is_empty(&self) -> bool
    {
        self.bytes.is_empty()
    }

    /// The whole block
    pub fn as_bytes(&self) -> &[u8]
    {
        &self.bytes
    }

    /// Consume the block, returning its bytes
    pub fn into_bytes(self) -> Vec<u8>
    {
        self.bytes
    }

    /// Check that a block received from the kernel has the size the layout expects
    ///
    /// ## Errors
    ///
    /// Returns `BlockSize` on mismatch.
    pub fn checked(self, class: StateClass, expected: usize) -> Result<Self>
    {
        if self.bytes.len() == expected {
            Ok(self)
        } else {
            Err(RegSyncError::BlockSize {
                class,
                expected,
                actual: self.bytes.len(),
            })
        }
    }

    /// Bytes of the register described by `desc`
    ///
    /// ## Panics
    ///
    /// Panics if the descriptor does not fit the block. Descriptors are
    /// validated against the block size when the architecture is built, so
    /// this only fires if a block of the wrong size slipped past the engine.
    pub fn field(&self, desc: &RegisterDescriptor) -> &[u8]
    {
        self.slice(desc.offset, desc.width)
    }

    /// Overwrite the register described by `desc`
    ///
    /// `value` must be exactly `desc.width` bytes.
    pub fn set_field(&mut self, desc: &RegisterDescriptor, value: &[u8])
    {
        assert_eq!(
            value.len(),
            desc.width,
            "register {} is {} bytes wide, got {}",
            desc.name,
            desc.width,
            value.len()
        );
        self.bytes[desc.offset..desc.offset + desc.width].copy_from_slice(value);
    }

    /// `len` bytes at `offset`
    pub fn slice(&self, offset: usize, len: usize) -> &[u8]
    {
        &self.bytes[offset..offset + len]
    }

    /// Overwrite `value.len()` bytes at `offset`
    pub fn write_slice(&mut self, offset: usize, value: &[u8])
    {
        self.bytes[offset..offset + value.len()].copy_from_slice(value);
    }

    /// Read a little-endian `u16` at `offset`
    pub fn read_u16(&self, offset: usize) -> u16
    {
        u16::from_le_bytes([self.bytes[offset], self.bytes[offset + 1]])
    }

    /// Write a little-endian `u16` at `offset`
    pub fn write_u16(&mut self, offset: usize, value: u16)
    {
        self.write_slice(offset, &value.to_le_bytes());
    }

    /// Read a little-endian `u32` at `offset`
    pub fn read_u32(&self, offset: usize) -> u32
    {
        let mut word = [0; 4];
        word.copy_from_slice(self.slice(offset, 4));
        u32::from_le_bytes(word)
    }

    /// Write a little-endian `u32` at `offset`
    pub fn write_u32(&mut self, offset: usize, value: u32)
    {
        self.write_slice(offset, &value.to_le_bytes());
    }
}

impl From<Vec<u8>> for RawBlock
{
    fn from(bytes: Vec<u8>) -> Self
    {
        Self::new(bytes)
    }
}

impl AsRef<[u8]> for RawBlock
{
    fn as_ref(&self) -> &[u8]
    {
        &self.bytes
    }
}
