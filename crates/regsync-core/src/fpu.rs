//! # Floating-Point State Codec
//!
//! Stateless conversion between a raw floating-point block and the x87
//! pseudo-registers of the register cache.
//!
//! The block carries the 387 environment as saved by `fnsave`:
//!
//! ```text
//! env offset   field          pseudo-register
//!      0       control  u16   fctrl
//!      4       status   u16   fstat
//!      8       tag      u16   ftag
//!     12       eip      u32   fioff
//!     16       code_seg u16   fiseg  (low 16 bits)
//!     18       opcode   u16   fop    (low 11 bits)
//!     20       operand  u32   fooff
//!     24       oper_seg u16   foseg
//!     28       regs[8][10]    st0 .. st7
//! ```
//!
//! Control pseudo-registers are cached as 4-byte little-endian values,
//! zero-extended from the raw field.
//!
//! A block whose `initialized` flag is clear has no floating-point state at
//! all; decoding it yields "no value" for every pseudo-register rather than
//! zeros.

use smallvec::SmallVec;

use crate::block::RawBlock;
use crate::cache::RegisterCache;
use crate::layout::{FloatLayout, FloatRegister};
use crate::types::{RegisterBytes, RegisterIndex};

/// Size of the 387 environment plus register stack (`hw_state`)
pub const ENV387_SIZE: usize = 108;

/// Mask applied to the code-segment field
pub const CODE_SEGMENT_MASK: u32 = 0xffff;

/// Mask applied to the opcode field (11 significant bits)
pub const OPCODE_MASK: u32 = (1 << 11) - 1;

const CONTROL: usize = 0;
const STATUS: usize = 4;
const TAG: usize = 8;
const INSTRUCTION_OFFSET: usize = 12;
const CODE_SEGMENT: usize = 16;
const OPCODE: usize = 18;
const OPERAND_OFFSET: usize = 20;
const OPERAND_SEGMENT: usize = 24;
const STACK: usize = 28;

/// Offset of the raw field backing `reg`, relative to the 387 environment
pub const fn env_field_offset(reg: FloatRegister) -> usize
{
    match reg {
        FloatRegister::St(n) => STACK + n as usize * FloatRegister::ST_WIDTH,
        FloatRegister::Control => CONTROL,
        FloatRegister::Status => STATUS,
        FloatRegister::Tag => TAG,
        FloatRegister::InstructionOffset => INSTRUCTION_OFFSET,
        FloatRegister::CodeSegment => CODE_SEGMENT,
        FloatRegister::Opcode => OPCODE,
        FloatRegister::OperandOffset => OPERAND_OFFSET,
        FloatRegister::OperandSegment => OPERAND_SEGMENT,
    }
}

/// Result of [`decode`]: one entry per pseudo-register, `None` meaning "no value"
pub type DecodedFpu = SmallVec<[(RegisterIndex, Option<RegisterBytes>); FloatRegister::COUNT]>;

/// Source of pseudo-register values for [`encode`]
pub trait FpuValues
{
    /// Cached bytes of `index`
    fn value(&self, index: RegisterIndex) -> &[u8];
}

impl FpuValues for RegisterCache
{
    fn value(&self, index: RegisterIndex) -> &[u8]
    {
        self.read(index).0
    }
}

/// Whether the kernel reports initialized floating-point state
pub fn is_initialized(layout: &FloatLayout, block: &RawBlock) -> bool
{
    block.read_u32(layout.initialized_offset) != 0
}

/// Decode every floating-point pseudo-register from `block`
pub fn decode(layout: &FloatLayout, block: &RawBlock) -> DecodedFpu
{
    let initialized = is_initialized(layout, block);
    FloatRegister::all()
        .map(|reg| {
            let value = initialized.then(|| decode_register(layout.env_offset, block, reg));
            (layout.index_of(reg), value)
        })
        .collect()
}

fn decode_register(env: usize, block: &RawBlock, reg: FloatRegister) -> RegisterBytes
{
    let word = match reg {
        FloatRegister::St(_) => {
            return RegisterBytes::from_slice(block.slice(env + env_field_offset(reg), FloatRegister::ST_WIDTH));
        }
        FloatRegister::Control => u32::from(block.read_u16(env + CONTROL)),
        FloatRegister::Status => u32::from(block.read_u16(env + STATUS)),
        FloatRegister::Tag => u32::from(block.read_u16(env + TAG)),
        FloatRegister::InstructionOffset => block.read_u32(env + INSTRUCTION_OFFSET),
        FloatRegister::OperandOffset => block.read_u32(env + OPERAND_OFFSET),
        FloatRegister::OperandSegment => u32::from(block.read_u16(env + OPERAND_SEGMENT)),
        FloatRegister::CodeSegment => u32::from(block.read_u16(env + CODE_SEGMENT)) & CODE_SEGMENT_MASK,
        FloatRegister::Opcode => u32::from(block.read_u16(env + OPCODE)) & OPCODE_MASK,
    };
    RegisterBytes::from_slice(&word.to_le_bytes())
}

/// Write pseudo-register values back into `block`
///
/// Only pseudo-registers accepted by `mask` are written; `None` writes all
/// of them. Bytes of the block that no written field covers are left as they
/// were, and the kernel's `initialized` flag is never touched.
///
/// The code-segment field receives `value & 0xffff`. The opcode field keeps
/// its bits above bit 10 and receives `value & 0x7ff` below, so that decoding
/// the result gives back the masked value.
pub fn encode<V>(layout: &FloatLayout, values: &V, mask: Option<&dyn Fn(RegisterIndex) -> bool>, block: &mut RawBlock)
where
    V: FpuValues + ?Sized,
{
    let env = layout.env_offset;
    for reg in FloatRegister::all() {
        let index = layout.index_of(reg);
        if !mask.map_or(true, |valid| valid(index)) {
            continue;
        }

        let value = values.value(index);
        let word = le_word(value);
        match reg {
            FloatRegister::St(_) => block.write_slice(env + env_field_offset(reg), &value[..FloatRegister::ST_WIDTH]),
            FloatRegister::Control => block.write_u16(env + CONTROL, word as u16),
            FloatRegister::Status => block.write_u16(env + STATUS, word as u16),
            FloatRegister::Tag => block.write_u16(env + TAG, word as u16),
            FloatRegister::InstructionOffset => block.write_u32(env + INSTRUCTION_OFFSET, word),
            FloatRegister::OperandOffset => block.write_u32(env + OPERAND_OFFSET, word),
            FloatRegister::OperandSegment => block.write_u16(env + OPERAND_SEGMENT, word as u16),
            FloatRegister::CodeSegment => block.write_u16(env + CODE_SEGMENT, (word & CODE_SEGMENT_MASK) as u16),
            FloatRegister::Opcode => {
                let kept = u32::from(block.read_u16(env + OPCODE)) & !OPCODE_MASK;
                block.write_u16(env + OPCODE, (kept | (word & OPCODE_MASK)) as u16);
            }
        }
    }
}

/// Little-endian word from up to four cached bytes
fn le_word(value: &[u8]) -> u32
{
    let mut word = [0; 4];
    let len = value.len().min(4);
    word[..len].copy_from_slice(&value[..len]);
    u32::from_le_bytes(word)
}
