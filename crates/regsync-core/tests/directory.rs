//! Tests for thread resolution through the engine's directory entry points

use regsync_core::arch::i386::{self, regnum};
use regsync_core::platform::memory::{KernelOp, MemoryKernel};
use regsync_core::types::{RegisterIndex, RegisterRequest, StateClass, ThreadId, ThreadPort};
use regsync_core::{RegSyncError, RegisterEngine, ThreadDirectory, ThreadTable};

fn setup() -> (MemoryKernel, ThreadTable<MemoryKernel>, RegisterEngine<MemoryKernel>)
{
    let arch = i386::gnu();
    let kernel = MemoryKernel::new(arch.clone());
    let threads = ThreadTable::new(arch.clone(), kernel.clone());
    let engine = RegisterEngine::new(arch, kernel.clone());
    (kernel, threads, engine)
}

#[test]
fn test_unknown_thread_is_an_error()
{
    let (_kernel, mut threads, mut engine) = setup();

    let err = engine
        .fetch_registers(&mut threads, ThreadId(9), RegisterRequest::All)
        .unwrap_err();
    assert!(matches!(err, RegSyncError::ThreadNotFound(ThreadId(9))));
}

#[test]
fn test_out_of_range_index_is_rejected_before_any_kernel_call()
{
    let (kernel, mut threads, mut engine) = setup();
    kernel.spawn(ThreadId(1), ThreadPort(100));

    let err = engine
        .store_registers(&mut threads, ThreadId(1), RegisterRequest::Single(RegisterIndex(99)))
        .unwrap_err();

    assert!(matches!(err, RegSyncError::InvalidRegister { count: 32, .. }));
    assert_eq!(kernel.calls(KernelOp::ForceHalt), 0);
    assert_eq!(kernel.calls(KernelOp::GetState(StateClass::General)), 0);
}

#[test]
fn test_new_threads_are_picked_up()
{
    let (kernel, mut threads, mut engine) = setup();
    assert!(threads.is_empty());

    kernel.spawn(ThreadId(1), ThreadPort(100));
    let report = engine
        .fetch_registers(&mut threads, ThreadId(1), RegisterRequest::Single(regnum::EIP))
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(threads.len(), 1);
    assert!(threads.get(ThreadId(1)).unwrap().cache().is_valid(regnum::EIP));
}

#[test]
fn test_refresh_keeps_state_of_live_threads()
{
    let (kernel, mut threads, mut engine) = setup();
    kernel.spawn(ThreadId(1), ThreadPort(100));
    engine
        .fetch_registers(&mut threads, ThreadId(1), RegisterRequest::All)
        .unwrap();

    kernel.spawn(ThreadId(2), ThreadPort(101));
    engine
        .fetch_registers(&mut threads, ThreadId(2), RegisterRequest::All)
        .unwrap();

    assert_eq!(threads.ids().collect::<Vec<_>>(), vec![ThreadId(1), ThreadId(2)]);
    let first = threads.get(ThreadId(1)).unwrap();
    assert!(first.cache().is_valid(regnum::EAX));
    assert!(first.snapshot().is_valid());
}

#[test]
fn test_exited_threads_are_dropped()
{
    let (kernel, mut threads, mut engine) = setup();
    kernel.spawn(ThreadId(1), ThreadPort(100));
    engine
        .fetch_registers(&mut threads, ThreadId(1), RegisterRequest::All)
        .unwrap();

    kernel.kill(ThreadPort(100));
    let err = engine
        .fetch_registers(&mut threads, ThreadId(1), RegisterRequest::All)
        .unwrap_err();

    assert!(matches!(err, RegSyncError::ThreadNotFound(_)));
    assert!(threads.is_empty());
}

#[test]
fn test_reused_id_on_new_port_gets_fresh_handle()
{
    let (kernel, mut threads, mut engine) = setup();
    kernel.spawn(ThreadId(1), ThreadPort(100));
    engine
        .fetch_registers(&mut threads, ThreadId(1), RegisterRequest::All)
        .unwrap();

    kernel.kill(ThreadPort(100));
    kernel.spawn(ThreadId(1), ThreadPort(200));
    threads.refresh_known_threads().unwrap();

    let thread = threads.get(ThreadId(1)).unwrap();
    assert_eq!(thread.port(), ThreadPort(200));
    assert!(!thread.cache().is_valid(regnum::EAX));
    assert!(!thread.snapshot().is_valid());
}

#[test]
fn test_store_through_directory_reaches_kernel()
{
    let (kernel, mut threads, mut engine) = setup();
    kernel.spawn(ThreadId(1), ThreadPort(100));
    threads.refresh_known_threads().unwrap();

    threads
        .resolve(ThreadId(1))
        .unwrap()
        .cache_mut()
        .set(regnum::EBP, &0xbfff_fff0_u32.to_le_bytes())
        .unwrap();
    let report = engine
        .store_registers(&mut threads, ThreadId(1), RegisterRequest::Single(regnum::EBP))
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(
        kernel.read_register(ThreadPort(100), regnum::EBP).as_slice(),
        &0xbfff_fff0_u32.to_le_bytes()
    );
    assert!(kernel.is_halted(ThreadPort(100)));
}
