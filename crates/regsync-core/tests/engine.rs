//! Tests for the register fetch/store engine against the in-memory kernel

use std::sync::Arc;

use regsync_core::arch::i386::{self, regnum};
use regsync_core::layout::ArchDescriptor;
use regsync_core::platform::memory::{KernelOp, MemoryKernel};
use regsync_core::types::{RegisterIndex, RegisterRequest, StateClass, ThreadId, ThreadPort};
use regsync_core::{ClassOutcome, DriftWarning, RawBlock, RegisterEngine, TracedThread};

const ID: ThreadId = ThreadId(1);
const PORT: ThreadPort = ThreadPort(100);

struct Fixture
{
    arch: Arc<ArchDescriptor>,
    kernel: MemoryKernel,
    engine: RegisterEngine<MemoryKernel>,
    thread: TracedThread,
}

/// One running thread with distinct general registers and live FPU state
fn setup() -> Fixture
{
    let arch = i386::gnu();
    let kernel = MemoryKernel::new(arch.clone());
    kernel.spawn(ID, PORT);

    for desc in arch.general() {
        let value = 0x1000_0000_u32 + desc.index.get() as u32 * 0x11;
        kernel.write_register(PORT, desc.index, &value.to_le_bytes());
    }

    let mut float = kernel.block(PORT, StateClass::FloatingPoint).unwrap();
    float.write_u32(0, 0xfeed_0001); // fpkind
    float.write_u16(12, 0x3800); // status
    float.write_u16(26, 0xf9d9); // opcode with high bits set
    float.write_slice(36, &[0x11; 10]); // st0
    float.write_u32(116, 0xfeed_0002); // exc_status
    kernel.set_block(PORT, StateClass::FloatingPoint, float);

    let engine = RegisterEngine::new(arch.clone(), kernel.clone());
    let thread = TracedThread::new(ID, PORT, &arch);

    Fixture {
        arch,
        kernel,
        engine,
        thread,
    }
}

fn word(value: u32) -> [u8; 4]
{
    value.to_le_bytes()
}

fn cached(thread: &TracedThread, index: RegisterIndex) -> Option<u32>
{
    let (bytes, valid) = thread.cache().read(index);
    valid.then(|| u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn kernel_word(kernel: &MemoryKernel, index: RegisterIndex) -> u32
{
    let bytes = kernel.read_register(PORT, index);
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[test]
fn test_fetch_all_fills_cache()
{
    let mut f = setup();
    let report = f.engine.fetch(&mut f.thread, RegisterRequest::All);

    assert!(report.is_complete());
    assert_eq!(report.general, ClassOutcome::Synced);
    assert_eq!(report.floating_point, ClassOutcome::Synced);
    assert_eq!(cached(&f.thread, regnum::EAX), Some(0x1000_0000));
    assert_eq!(cached(&f.thread, regnum::EIP), Some(0x1000_0088));
    assert_eq!(cached(&f.thread, regnum::FSTAT), Some(0x3800));
    assert_eq!(cached(&f.thread, regnum::FOP), Some(0x01d9));
    assert!(f.thread.cache().is_fetched(regnum::ESP));
    assert!(!f.thread.cache().is_fetched(regnum::ST0));

    // A fetch never halts the thread
    assert!(!f.kernel.is_halted(PORT));
    assert_eq!(f.kernel.calls(KernelOp::ForceHalt), 0);
}

#[test]
fn test_fetch_single_float_register_skips_general_block()
{
    let mut f = setup();
    let report = f.engine.fetch(&mut f.thread, RegisterRequest::Single(regnum::FCTRL));

    assert_eq!(report.general, ClassOutcome::NotRequested);
    assert_eq!(report.floating_point, ClassOutcome::Synced);
    assert_eq!(f.kernel.calls(KernelOp::GetState(StateClass::General)), 0);
    assert_eq!(cached(&f.thread, regnum::FCTRL), Some(0x037f));
}

#[test]
fn test_fetch_all_then_store_all_is_byte_identical()
{
    let mut f = setup();
    let general = f.kernel.block(PORT, StateClass::General).unwrap();
    let float = f.kernel.block(PORT, StateClass::FloatingPoint).unwrap();

    f.engine.fetch(&mut f.thread, RegisterRequest::All);
    let report = f.engine.store(&mut f.thread, RegisterRequest::All);

    assert!(report.is_complete());
    assert!(report.drift.is_empty());
    assert_eq!(report.warning_count(), 0);
    assert_eq!(f.kernel.block(PORT, StateClass::General).unwrap(), general);
    assert_eq!(f.kernel.block(PORT, StateClass::FloatingPoint).unwrap(), float);
    assert!(f.kernel.is_halted(PORT));
}

#[test]
fn test_uninitialized_fpu_is_unavailable_and_left_alone()
{
    let mut f = setup();
    let mut float = f.kernel.block(PORT, StateClass::FloatingPoint).unwrap();
    float.write_u32(f.arch.float().initialized_offset, 0);
    f.kernel.set_block(PORT, StateClass::FloatingPoint, float.clone());

    let report = f.engine.fetch(&mut f.thread, RegisterRequest::All);
    assert!(report.is_complete());
    for index in f.arch.float_indices() {
        let (bytes, valid) = f.thread.cache().read(index);
        assert!(!valid);
        assert!(bytes.iter().all(|&byte| byte == 0));
    }

    f.engine.store(&mut f.thread, RegisterRequest::All);
    assert_eq!(f.kernel.block(PORT, StateClass::FloatingPoint).unwrap(), float);
}

#[test]
fn test_store_adopts_register_changed_before_halt()
{
    let mut f = setup();
    f.engine.fetch(&mut f.thread, RegisterRequest::All);
    let eip = cached(&f.thread, regnum::EIP).unwrap();

    // The thread keeps running until the store halts it
    f.kernel.run_before_halt(PORT, regnum::EIP, &word(eip + 0x10));
    f.thread.cache_mut().set(regnum::EAX, &word(42)).unwrap();

    let report = f.engine.store(&mut f.thread, RegisterRequest::Single(regnum::EAX));

    assert!(report.is_complete());
    assert_eq!(
        report.drift.as_slice(),
        &[DriftWarning {
            register: regnum::EIP,
            name: "eip",
            overwritten: false,
        }]
    );
    assert_eq!(report.warning_count(), 1);
    assert_eq!(cached(&f.thread, regnum::EIP), Some(eip + 0x10));
    assert_eq!(kernel_word(&f.kernel, regnum::EIP), eip + 0x10);
    assert_eq!(kernel_word(&f.kernel, regnum::EAX), 42);
}

#[test]
fn test_store_overwrites_drifted_register_it_writes()
{
    let mut f = setup();
    f.engine.fetch(&mut f.thread, RegisterRequest::All);

    f.kernel.run_before_halt(PORT, regnum::EAX, &word(7));
    f.thread.cache_mut().set(regnum::EAX, &word(99)).unwrap();

    let report = f.engine.store(&mut f.thread, RegisterRequest::Single(regnum::EAX));

    assert_eq!(report.drift.len(), 1);
    assert!(report.drift[0].overwritten);
    assert_eq!(report.drift[0].register, regnum::EAX);
    assert_eq!(report.warning_count(), 2);
    assert_eq!(kernel_word(&f.kernel, regnum::EAX), 99);
    assert_eq!(cached(&f.thread, regnum::EAX), Some(99));
}

#[test]
fn test_store_all_overwrites_every_drifted_valid_register()
{
    let mut f = setup();
    f.engine.fetch(&mut f.thread, RegisterRequest::All);
    let eip = cached(&f.thread, regnum::EIP).unwrap();

    f.kernel.run_before_halt(PORT, regnum::EIP, &word(0xdead_beef));
    let report = f.engine.store(&mut f.thread, RegisterRequest::All);

    assert_eq!(report.drift.len(), 1);
    assert!(report.drift[0].overwritten);
    assert_eq!(kernel_word(&f.kernel, regnum::EIP), eip);
}

#[test]
fn test_store_without_prior_fetch_has_nothing_to_reconcile()
{
    let mut f = setup();
    f.kernel.run_before_halt(PORT, regnum::EIP, &word(0x0804_8000));
    f.thread.cache_mut().set(regnum::EBX, &word(5)).unwrap();

    let report = f.engine.store(&mut f.thread, RegisterRequest::Single(regnum::EBX));

    assert!(report.drift.is_empty());
    assert_eq!(kernel_word(&f.kernel, regnum::EBX), 5);
    assert_eq!(kernel_word(&f.kernel, regnum::EIP), 0x0804_8000);
}

#[test]
fn test_second_store_reuses_halted_snapshot()
{
    let mut f = setup();
    f.engine.fetch(&mut f.thread, RegisterRequest::All);
    f.thread.cache_mut().set(regnum::EAX, &word(1)).unwrap();
    f.engine.store(&mut f.thread, RegisterRequest::Single(regnum::EAX));

    f.thread.cache_mut().set(regnum::ECX, &word(2)).unwrap();
    let report = f.engine.store(&mut f.thread, RegisterRequest::Single(regnum::ECX));

    assert!(report.drift.is_empty());
    assert_eq!(f.kernel.calls(KernelOp::ForceHalt), 1);
    assert_eq!(f.kernel.calls(KernelOp::GetState(StateClass::General)), 2);
    assert_eq!(kernel_word(&f.kernel, regnum::EAX), 1);
    assert_eq!(kernel_word(&f.kernel, regnum::ECX), 2);
}

#[test]
#[should_panic(expected = "without a valid cached value")]
fn test_store_of_invalid_general_register_panics()
{
    let mut f = setup();
    f.engine.store(&mut f.thread, RegisterRequest::Single(regnum::EDX));
}

#[test]
#[should_panic(expected = "out of range")]
fn test_fetch_of_out_of_range_index_panics()
{
    let mut f = setup();
    f.engine.fetch(&mut f.thread, RegisterRequest::Single(RegisterIndex(32)));
}

#[test]
fn test_failed_general_read_leaves_cache_untouched()
{
    let mut f = setup();
    f.kernel.fail_next(KernelOp::GetState(StateClass::General));

    let report = f.engine.fetch(&mut f.thread, RegisterRequest::All);

    assert!(!report.is_complete());
    assert!(report.general.is_failed());
    assert_eq!(report.floating_point, ClassOutcome::Synced);
    assert_eq!(report.warning_count(), 1);
    assert_eq!(cached(&f.thread, regnum::EAX), None);
    assert_eq!(cached(&f.thread, regnum::FCTRL), Some(0x037f));
    assert!(!f.thread.snapshot().is_valid());
}

#[test]
fn test_failed_halt_writes_nothing()
{
    let mut f = setup();
    let general = f.kernel.block(PORT, StateClass::General).unwrap();
    f.engine.fetch(&mut f.thread, RegisterRequest::All);
    f.thread.cache_mut().set(regnum::EAX, &word(3)).unwrap();
    f.kernel.fail_next(KernelOp::ForceHalt);

    let report = f.engine.store(&mut f.thread, RegisterRequest::Single(regnum::EAX));

    assert!(report.general.is_failed());
    assert_eq!(f.kernel.block(PORT, StateClass::General).unwrap(), general);
    assert!(!f.thread.snapshot().is_halted());
}

#[test]
fn test_failed_halt_on_store_all_skips_float_class()
{
    let mut f = setup();
    let float = f.kernel.block(PORT, StateClass::FloatingPoint).unwrap();
    f.engine.fetch(&mut f.thread, RegisterRequest::All);
    f.thread.cache_mut().set(regnum::FCTRL, &word(0x027f)).unwrap();
    f.kernel.fail_next(KernelOp::ForceHalt);

    let report = f.engine.store(&mut f.thread, RegisterRequest::All);

    assert!(report.general.is_failed());
    assert_eq!(report.floating_point, ClassOutcome::Skipped);
    assert_eq!(report.warning_count(), 1);
    assert_eq!(f.kernel.calls(KernelOp::GetState(StateClass::FloatingPoint)), 1);
    assert_eq!(f.kernel.calls(KernelOp::SetState(StateClass::FloatingPoint)), 0);
    assert_eq!(f.kernel.block(PORT, StateClass::FloatingPoint).unwrap(), float);
    assert!(!f.kernel.is_halted(PORT));
}

#[test]
fn test_failed_general_write_still_stores_float()
{
    let mut f = setup();
    f.engine.fetch(&mut f.thread, RegisterRequest::All);
    f.thread.cache_mut().set(regnum::FCTRL, &word(0x027f)).unwrap();
    f.kernel.fail_next(KernelOp::SetState(StateClass::General));

    let report = f.engine.store(&mut f.thread, RegisterRequest::All);

    assert!(report.general.is_failed());
    assert_eq!(report.floating_point, ClassOutcome::Synced);
    assert_eq!(f.kernel.block(PORT, StateClass::FloatingPoint).unwrap().read_u16(8), 0x027f);
}

#[test]
fn test_store_all_with_empty_cache_leaves_state_unchanged()
{
    let mut f = setup();
    let general = f.kernel.block(PORT, StateClass::General).unwrap();
    let float = f.kernel.block(PORT, StateClass::FloatingPoint).unwrap();

    let report = f.engine.store(&mut f.thread, RegisterRequest::All);

    assert!(report.is_complete());
    assert!(report.drift.is_empty());
    assert_eq!(f.kernel.calls(KernelOp::SetState(StateClass::General)), 1);
    assert_eq!(f.kernel.block(PORT, StateClass::General).unwrap(), general);
    assert_eq!(f.kernel.block(PORT, StateClass::FloatingPoint).unwrap(), float);
}

#[test]
fn test_failed_float_write_does_not_affect_general_store()
{
    let mut f = setup();
    f.engine.fetch(&mut f.thread, RegisterRequest::All);
    f.thread.cache_mut().set(regnum::ESI, &word(0x5151)).unwrap();
    f.kernel.fail_next(KernelOp::SetState(StateClass::FloatingPoint));

    let report = f.engine.store(&mut f.thread, RegisterRequest::All);

    assert_eq!(report.general, ClassOutcome::Synced);
    assert!(report.floating_point.is_failed());
    assert_eq!(kernel_word(&f.kernel, regnum::ESI), 0x5151);
}

#[test]
fn test_fetch_reuses_snapshot_until_resumed()
{
    let mut f = setup();
    f.engine.fetch(&mut f.thread, RegisterRequest::Single(regnum::EIP));
    let before = cached(&f.thread, regnum::EIP);

    f.kernel.write_register(PORT, regnum::EIP, &word(0x0804_9000));
    f.engine.fetch(&mut f.thread, RegisterRequest::Single(regnum::EIP));
    assert_eq!(cached(&f.thread, regnum::EIP), before);

    f.thread.resumed();
    assert!(!f.thread.snapshot().is_valid());
    assert_eq!(cached(&f.thread, regnum::EIP), None);

    f.engine.fetch(&mut f.thread, RegisterRequest::Single(regnum::EIP));
    assert_eq!(cached(&f.thread, regnum::EIP), Some(0x0804_9000));
}

#[test]
fn test_float_store_is_read_modify_write()
{
    let mut f = setup();
    f.engine.fetch(&mut f.thread, RegisterRequest::All);

    // Fields the cache does not model change underneath
    let mut float = f.kernel.block(PORT, StateClass::FloatingPoint).unwrap();
    float.write_u32(116, 0x0bad_cafe);
    f.kernel.set_block(PORT, StateClass::FloatingPoint, float);

    f.thread.cache_mut().set(regnum::FCTRL, &word(0x027f)).unwrap();
    let report = f.engine.store(&mut f.thread, RegisterRequest::Single(regnum::FCTRL));

    assert_eq!(report.general, ClassOutcome::NotRequested);
    assert_eq!(report.floating_point, ClassOutcome::Synced);
    let float = f.kernel.block(PORT, StateClass::FloatingPoint).unwrap();
    assert_eq!(float.read_u16(8), 0x027f);
    assert_eq!(float.read_u32(116), 0x0bad_cafe);
    assert_eq!(float.read_u32(0), 0xfeed_0001);
    assert_eq!(float.read_u16(26), 0xf9d9);
}

#[test]
fn test_wrong_block_size_is_a_class_failure()
{
    let mut f = setup();
    f.kernel
        .set_block(PORT, StateClass::FloatingPoint, RawBlock::zeroed(64));

    let report = f.engine.fetch(&mut f.thread, RegisterRequest::All);

    assert_eq!(report.general, ClassOutcome::Synced);
    match &report.floating_point {
        ClassOutcome::Failed(reason) => assert!(reason.contains("expected 120 bytes, got 64")),
        other => panic!("expected failure, got {other:?}"),
    }
}
