//! # Register Cache
//!
//! Per-thread, debugger-side copy of register values.
//!
//! Each logical index has an entry sized from the architecture, a `valid`
//! flag (the bytes mean something) and a `fetched` flag (the bytes were
//! copied from the kernel's general-register block, which makes them subject
//! to drift checks on the next store).

use crate::error::{RegSyncError, Result};
use crate::layout::ArchDescriptor;
use crate::types::{RegisterBytes, RegisterIndex};

#[derive(Debug, Clone)]
struct CacheEntry
{
    bytes: RegisterBytes,
    valid: bool,
    fetched: bool,
}

/// Mapping from register index to last-known bytes plus validity
#[derive(Debug, Clone)]
pub struct RegisterCache
{
    entries: Vec<CacheEntry>,
}

impl RegisterCache
{
    /// Create an empty cache covering `arch`'s full index space
    pub fn for_arch(arch: &ArchDescriptor) -> Self
    {
        let entries = arch
            .indices()
            .map(|index| CacheEntry {
                bytes: RegisterBytes::from_elem(0, arch.register_width(index)),
                valid: false,
                fetched: false,
            })
            .collect();
        Self { entries }
    }

    /// Number of entries (the architecture's register count)
    pub fn len(&self) -> usize
    {
        self.entries.len()
    }

    /// Whether the cache has no entries
    pub fn is_empty(&self) -> bool
    {
        self.entries.is_empty()
    }

    /// Record a value obtained from the kernel
    ///
    /// `None` means the kernel has no value for this register: the entry
    /// becomes invalid and its bytes are zeroed, never left stale.
    ///
    /// ## Panics
    ///
    /// Panics on an out-of-range index or a value of the wrong width.
    pub fn supply(&mut self, index: RegisterIndex, value: Option<&[u8]>)
    {
        let entry = self.entry_mut(index);
        match value {
            Some(bytes) => {
                assert_eq!(
                    bytes.len(),
                    entry.bytes.len(),
                    "register {index} is {} bytes wide",
                    entry.bytes.len()
                );
                entry.bytes.copy_from_slice(bytes);
                entry.valid = true;
            }
            None => {
                entry.bytes.iter_mut().for_each(|byte| *byte = 0);
                entry.valid = false;
            }
        }
    }

    /// Cached bytes and validity of `index`
    pub fn read(&self, index: RegisterIndex) -> (&[u8], bool)
    {
        let entry = self.entry(index);
        (&entry.bytes, entry.valid)
    }

    /// Set a register from the debugger side (e.g. the user assigned it)
    ///
    /// The entry becomes valid and will be written by the next store.
    ///
    /// ## Errors
    ///
    /// - `InvalidRegister`: index out of range
    /// - `InvalidArgument`: value width does not match the register
    pub fn set(&mut self, index: RegisterIndex, value: &[u8]) -> Result<()>
    {
        let count = self.entries.len();
        let entry = self
            .entries
            .get_mut(index.0)
            .ok_or(RegSyncError::InvalidRegister { index, count })?;
        if value.len() != entry.bytes.len() {
            return Err(RegSyncError::InvalidArgument(format!(
                "register {index} is {} bytes wide, got {}",
                entry.bytes.len(),
                value.len()
            )));
        }
        entry.bytes.copy_from_slice(value);
        entry.valid = true;
        Ok(())
    }

    /// Mark `index` as copied from the kernel's general block
    pub fn mark_fetched(&mut self, index: RegisterIndex)
    {
        self.entry_mut(index).fetched = true;
    }

    /// Whether `index` holds a meaningful value
    pub fn is_valid(&self, index: RegisterIndex) -> bool
    {
        self.entry(index).valid
    }

    /// Whether `index` was copied from the kernel's general block
    pub fn is_fetched(&self, index: RegisterIndex) -> bool
    {
        self.entry(index).fetched
    }

    /// Forget every value, e.g. after the thread ran
    pub fn invalidate_all(&mut self)
    {
        for entry in &mut self.entries {
            entry.valid = false;
            entry.fetched = false;
        }
    }

    fn entry(&self, index: RegisterIndex) -> &CacheEntry
    {
        assert!(index.0 < self.entries.len(), "register {index} out of range");
        &self.entries[index.0]
    }

    fn entry_mut(&mut self, index: RegisterIndex) -> &mut CacheEntry
    {
        assert!(index.0 < self.entries.len(), "register {index} out of range");
        &mut self.entries[index.0]
    }
}
