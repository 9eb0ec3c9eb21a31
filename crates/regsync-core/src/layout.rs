//! # Register Layout
//!
//! Data-driven description of a target architecture's register blocks.
//!
//! An [`ArchDescriptor`] maps every logical register index to where its bytes
//! live: general registers to a byte range inside the raw general-register
//! block, floating-point pseudo-registers to a [`FloatRegister`] handled by the
//! codec in [`crate::fpu`]. Descriptors are built once per architecture (see
//! [`crate::arch`]) and injected into the engine, so nothing here depends on
//! compile-time ABI constants.
//!
//! ## Index Space
//!
//! ```text
//! 0 .. G          general registers, one RegisterDescriptor each
//! G .. G + 8      st0 .. st7 (80-bit stack slots)
//! G + 8 .. G + 16 fctrl fstat ftag fiseg fioff foseg fooff fop
//! ```

use crate::error::{RegSyncError, Result};
use crate::fpu::ENV387_SIZE;
use crate::types::{RegisterIndex, StateClass};

/// Location of one general register inside the raw general-register block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterDescriptor
{
    /// Logical register index
    pub index: RegisterIndex,
    /// Debugger-visible register name
    pub name: &'static str,
    /// Byte offset inside the raw block
    pub offset: usize,
    /// Width in bytes
    pub width: usize,
}

impl RegisterDescriptor
{
    /// Create a descriptor
    pub const fn new(index: usize, name: &'static str, offset: usize, width: usize) -> Self
    {
        Self {
            index: RegisterIndex(index),
            name,
            offset,
            width,
        }
    }

    /// Byte range covered by this register
    pub fn range(&self) -> std::ops::Range<usize>
    {
        self.offset..self.offset + self.width
    }
}

/// Floating-point pseudo-registers, in index order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatRegister
{
    /// x87 stack slot `st(n)`, 80 bits
    St(u8),
    /// Control word
    Control,
    /// Status word
    Status,
    /// Tag word
    Tag,
    /// Code segment of the last FPU instruction (low 16 bits)
    CodeSegment,
    /// Offset of the last FPU instruction
    InstructionOffset,
    /// Segment of the last memory operand
    OperandSegment,
    /// Offset of the last memory operand
    OperandOffset,
    /// Last executed opcode (low 11 bits)
    Opcode,
}

impl FloatRegister
{
    /// Number of floating-point pseudo-registers
    pub const COUNT: usize = 16;

    /// Width of the x87 stack slots in bytes
    pub const ST_WIDTH: usize = 10;

    /// Width of the control pseudo-registers in bytes
    pub const CONTROL_WIDTH: usize = 4;

    /// Pseudo-register at `offset` from the first floating-point index
    pub const fn from_offset(offset: usize) -> Option<Self>
    {
        Some(match offset {
            0..=7 => FloatRegister::St(offset as u8),
            8 => FloatRegister::Control,
            9 => FloatRegister::Status,
            10 => FloatRegister::Tag,
            11 => FloatRegister::CodeSegment,
            12 => FloatRegister::InstructionOffset,
            13 => FloatRegister::OperandSegment,
            14 => FloatRegister::OperandOffset,
            15 => FloatRegister::Opcode,
            _ => return None,
        })
    }

    /// Offset of this pseudo-register from the first floating-point index
    pub const fn offset(self) -> usize
    {
        match self {
            FloatRegister::St(n) => n as usize,
            FloatRegister::Control => 8,
            FloatRegister::Status => 9,
            FloatRegister::Tag => 10,
            FloatRegister::CodeSegment => 11,
            FloatRegister::InstructionOffset => 12,
            FloatRegister::OperandSegment => 13,
            FloatRegister::OperandOffset => 14,
            FloatRegister::Opcode => 15,
        }
    }

    /// Width of the cached value in bytes
    pub const fn width(self) -> usize
    {
        match self {
            FloatRegister::St(_) => Self::ST_WIDTH,
            _ => Self::CONTROL_WIDTH,
        }
    }

    /// Debugger-visible name
    pub const fn name(self) -> &'static str
    {
        match self {
            FloatRegister::St(0) => "st0",
            FloatRegister::St(1) => "st1",
            FloatRegister::St(2) => "st2",
            FloatRegister::St(3) => "st3",
            FloatRegister::St(4) => "st4",
            FloatRegister::St(5) => "st5",
            FloatRegister::St(6) => "st6",
            FloatRegister::St(_) => "st7",
            FloatRegister::Control => "fctrl",
            FloatRegister::Status => "fstat",
            FloatRegister::Tag => "ftag",
            FloatRegister::CodeSegment => "fiseg",
            FloatRegister::InstructionOffset => "fioff",
            FloatRegister::OperandSegment => "foseg",
            FloatRegister::OperandOffset => "fooff",
            FloatRegister::Opcode => "fop",
        }
    }

    /// All pseudo-registers in index order
    pub fn all() -> impl Iterator<Item = FloatRegister>
    {
        (0..Self::COUNT).filter_map(Self::from_offset)
    }
}

/// Geometry of the raw floating-point block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloatLayout
{
    /// Total block size in bytes
    pub block_size: usize,
    /// Offset of the kernel-supplied 32-bit "initialized" flag
    pub initialized_offset: usize,
    /// Offset of the 387 environment (`hw_state`) inside the block
    pub env_offset: usize,
    /// Logical index of `st0`; the other pseudo-registers follow in order
    pub first_index: RegisterIndex,
}

impl FloatLayout
{
    /// Logical index of a pseudo-register
    pub fn index_of(&self, reg: FloatRegister) -> RegisterIndex
    {
        RegisterIndex(self.first_index.0 + reg.offset())
    }

    /// Pseudo-register at a logical index, if the index is in the floating-point range
    pub fn register_at(&self, index: RegisterIndex) -> Option<FloatRegister>
    {
        index
            .0
            .checked_sub(self.first_index.0)
            .and_then(FloatRegister::from_offset)
    }

    /// Whether `index` belongs to the floating-point class
    pub fn contains(&self, index: RegisterIndex) -> bool
    {
        self.register_at(index).is_some()
    }
}

/// Complete register description of one target architecture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchDescriptor
{
    name: &'static str,
    general: Vec<RegisterDescriptor>,
    general_block_size: usize,
    float: FloatLayout,
}

impl ArchDescriptor
{
    /// Build and validate an architecture descriptor
    ///
    /// ## Invariants
    ///
    /// - `general` is non-empty and `general[i].index == i`
    /// - every general register has a non-zero width and lies inside the block
    /// - no two general registers overlap
    /// - floating-point indices start right after the general registers
    /// - the initialized flag and the 387 environment fit the float block
    ///
    /// ## Errors
    ///
    /// Returns `InvalidLayout` describing the first violated invariant.
    pub fn new(
        name: &'static str,
        general: Vec<RegisterDescriptor>,
        general_block_size: usize,
        float: FloatLayout,
    ) -> Result<Self>
    {
        if general.is_empty() {
            return Err(RegSyncError::InvalidLayout(format!("{name}: no general registers")));
        }

        for (position, desc) in general.iter().enumerate() {
            if desc.index.0 != position {
                return Err(RegSyncError::InvalidLayout(format!(
                    "{name}: register {} has index {}, expected {position}",
                    desc.name, desc.index
                )));
            }
            if desc.width == 0 || desc.offset + desc.width > general_block_size {
                return Err(RegSyncError::InvalidLayout(format!(
                    "{name}: register {} ({}..{}) does not fit a {general_block_size}-byte block",
                    desc.name,
                    desc.offset,
                    desc.offset + desc.width
                )));
            }
        }

        let mut by_offset: Vec<&RegisterDescriptor> = general.iter().collect();
        by_offset.sort_by_key(|desc| desc.offset);
        for pair in by_offset.windows(2) {
            if pair[0].offset + pair[0].width > pair[1].offset {
                return Err(RegSyncError::InvalidLayout(format!(
                    "{name}: registers {} and {} overlap",
                    pair[0].name, pair[1].name
                )));
            }
        }

        if float.first_index.0 != general.len() {
            return Err(RegSyncError::InvalidLayout(format!(
                "{name}: floating-point registers start at {}, expected {}",
                float.first_index,
                general.len()
            )));
        }
        if float.initialized_offset + 4 > float.block_size || float.env_offset + ENV387_SIZE > float.block_size {
            return Err(RegSyncError::InvalidLayout(format!(
                "{name}: floating-point block of {} bytes cannot hold the 387 environment",
                float.block_size
            )));
        }

        Ok(Self {
            name,
            general,
            general_block_size,
            float,
        })
    }

    /// Architecture name
    pub fn name(&self) -> &'static str
    {
        self.name
    }

    /// General-register descriptors in index order
    pub fn general(&self) -> &[RegisterDescriptor]
    {
        &self.general
    }

    /// Number of general registers
    pub fn general_count(&self) -> usize
    {
        self.general.len()
    }

    /// Size of the raw general-register block
    pub fn general_block_size(&self) -> usize
    {
        self.general_block_size
    }

    /// Floating-point block geometry and pseudo-register map
    pub fn float(&self) -> &FloatLayout
    {
        &self.float
    }

    /// Size of the whole logical index space
    pub fn register_count(&self) -> usize
    {
        self.general.len() + FloatRegister::COUNT
    }

    /// Descriptor of a general register
    ///
    /// ## Panics
    ///
    /// Panics if `index` is not a general register. Callers dispatch on
    /// [`class_of`](Self::class_of) first; anything else is a programming error.
    pub fn descriptor(&self, index: RegisterIndex) -> &RegisterDescriptor
    {
        assert!(
            index.0 < self.general.len(),
            "{}: register {index} is not a general register",
            self.name
        );
        &self.general[index.0]
    }

    /// Which state class holds `index`, or `None` if it is out of range
    pub fn class_of(&self, index: RegisterIndex) -> Option<StateClass>
    {
        if index.0 < self.general.len() {
            Some(StateClass::General)
        } else if self.float.contains(index) {
            Some(StateClass::FloatingPoint)
        } else {
            None
        }
    }

    /// Width of the cached value for `index`
    ///
    /// ## Panics
    ///
    /// Panics if `index` is out of range.
    pub fn register_width(&self, index: RegisterIndex) -> usize
    {
        match self.float.register_at(index) {
            Some(reg) => reg.width(),
            None => self.descriptor(index).width,
        }
    }

    /// Debugger-visible name of `index`
    ///
    /// ## Panics
    ///
    /// Panics if `index` is out of range.
    pub fn register_name(&self, index: RegisterIndex) -> &'static str
    {
        match self.float.register_at(index) {
            Some(reg) => reg.name(),
            None => self.descriptor(index).name,
        }
    }

    /// Iterate over every logical index
    pub fn indices(&self) -> impl Iterator<Item = RegisterIndex>
    {
        (0..self.register_count()).map(RegisterIndex)
    }

    /// Iterate over the floating-point indices
    pub fn float_indices(&self) -> impl Iterator<Item = RegisterIndex> + '_
    {
        FloatRegister::all().map(|reg| self.float.index_of(reg))
    }
}
