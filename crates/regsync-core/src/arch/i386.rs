//! # i386 on GNU Mach
//!
//! Register layout for 32-bit x86 threads as exposed by GNU Mach's
//! `thread_get_state()`.
//!
//! ## General State (`i386_THREAD_STATE`, 17 words)
//!
//! ```text
//! offset  0  gs      16  edi     32  ebx     48  eip     64  ss
//!         4  fs      20  esi     36  edx     52  cs
//!         8  es      24  ebp     40  ecx     56  efl
//!        12  ds      28  esp     44  eax     60  uesp
//! ```
//!
//! The debugger's `esp` is the user stack pointer `uesp`; the kernel-side
//! `esp` slot at offset 28 is not exposed.
//!
//! ## Float State (`i386_FLOAT_STATE`, 30 words)
//!
//! ```text
//! offset  0  fpkind       (u32)
//!         4  initialized  (u32)
//!         8  hw_state     (108 bytes, 387 environment + 8 stack slots)
//!       116  exc_status   (u32)
//! ```

use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::layout::{ArchDescriptor, FloatLayout, RegisterDescriptor};
use crate::types::RegisterIndex;

/// Size of `struct i386_thread_state`
pub const THREAD_STATE_SIZE: usize = 17 * 4;

/// Size of `struct i386_float_state`
pub const FLOAT_STATE_SIZE: usize = 30 * 4;

/// Number of general registers the debugger exposes
pub const NUM_GREGS: usize = 16;

const GENERAL: [RegisterDescriptor; NUM_GREGS] = [
    RegisterDescriptor::new(0, "eax", 44, 4),
    RegisterDescriptor::new(1, "ecx", 40, 4),
    RegisterDescriptor::new(2, "edx", 36, 4),
    RegisterDescriptor::new(3, "ebx", 32, 4),
    RegisterDescriptor::new(4, "esp", 60, 4),
    RegisterDescriptor::new(5, "ebp", 24, 4),
    RegisterDescriptor::new(6, "esi", 20, 4),
    RegisterDescriptor::new(7, "edi", 16, 4),
    RegisterDescriptor::new(8, "eip", 48, 4),
    RegisterDescriptor::new(9, "eflags", 56, 4),
    RegisterDescriptor::new(10, "cs", 52, 4),
    RegisterDescriptor::new(11, "ss", 64, 4),
    RegisterDescriptor::new(12, "ds", 12, 4),
    RegisterDescriptor::new(13, "es", 8, 4),
    RegisterDescriptor::new(14, "fs", 4, 4),
    RegisterDescriptor::new(15, "gs", 0, 4),
];

const FLOAT: FloatLayout = FloatLayout {
    block_size: FLOAT_STATE_SIZE,
    initialized_offset: 4,
    env_offset: 8,
    first_index: RegisterIndex(NUM_GREGS),
};

static GNU: Lazy<Arc<ArchDescriptor>> = Lazy::new(|| {
    Arc::new(
        ArchDescriptor::new("i386-gnu", GENERAL.to_vec(), THREAD_STATE_SIZE, FLOAT)
            .expect("i386-gnu register layout is self-consistent"),
    )
});

/// The shared i386 GNU/Mach descriptor
///
/// ```rust
/// use regsync_core::arch::i386;
/// use regsync_core::types::RegisterIndex;
///
/// let arch = i386::gnu();
/// assert_eq!(arch.register_count(), 32);
/// assert_eq!(arch.register_name(RegisterIndex(0)), "eax");
/// assert_eq!(arch.register_name(RegisterIndex(31)), "fop");
/// ```
pub fn gnu() -> Arc<ArchDescriptor>
{
    Arc::clone(&GNU)
}

/// Well-known register indices
pub mod regnum
{
    use crate::types::RegisterIndex;

    /// `eax`
    pub const EAX: RegisterIndex = RegisterIndex(0);
    /// `ecx`
    pub const ECX: RegisterIndex = RegisterIndex(1);
    /// `edx`
    pub const EDX: RegisterIndex = RegisterIndex(2);
    /// `ebx`
    pub const EBX: RegisterIndex = RegisterIndex(3);
    /// `esp` (user stack pointer)
    pub const ESP: RegisterIndex = RegisterIndex(4);
    /// `ebp`
    pub const EBP: RegisterIndex = RegisterIndex(5);
    /// `esi`
    pub const ESI: RegisterIndex = RegisterIndex(6);
    /// `edi`
    pub const EDI: RegisterIndex = RegisterIndex(7);
    /// `eip`
    pub const EIP: RegisterIndex = RegisterIndex(8);
    /// `eflags`
    pub const EFLAGS: RegisterIndex = RegisterIndex(9);
    /// `cs`
    pub const CS: RegisterIndex = RegisterIndex(10);
    /// `ss`
    pub const SS: RegisterIndex = RegisterIndex(11);
    /// `ds`
    pub const DS: RegisterIndex = RegisterIndex(12);
    /// `es`
    pub const ES: RegisterIndex = RegisterIndex(13);
    /// `fs`
    pub const FS: RegisterIndex = RegisterIndex(14);
    /// `gs`
    pub const GS: RegisterIndex = RegisterIndex(15);
    /// `st0`
    pub const ST0: RegisterIndex = RegisterIndex(16);
    /// `st7`
    pub const ST7: RegisterIndex = RegisterIndex(23);
    /// FPU control word
    pub const FCTRL: RegisterIndex = RegisterIndex(24);
    /// FPU status word
    pub const FSTAT: RegisterIndex = RegisterIndex(25);
    /// FPU tag word
    pub const FTAG: RegisterIndex = RegisterIndex(26);
    /// FPU instruction code segment
    pub const FISEG: RegisterIndex = RegisterIndex(27);
    /// FPU instruction offset
    pub const FIOFF: RegisterIndex = RegisterIndex(28);
    /// FPU operand segment
    pub const FOSEG: RegisterIndex = RegisterIndex(29);
    /// FPU operand offset
    pub const FOOFF: RegisterIndex = RegisterIndex(30);
    /// FPU last opcode
    pub const FOP: RegisterIndex = RegisterIndex(31);
}
