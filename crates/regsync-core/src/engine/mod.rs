//! # Register Fetch/Store Engine
//!
//! Moves register values between a traced thread's kernel state and its
//! [`RegisterCache`](crate::cache::RegisterCache).
//!
//! Requests are split by [`RegisterClass`]: general registers are copied
//! byte-for-byte at their layout offsets, floating-point pseudo-registers go
//! through the codec in [`crate::fpu`]. The two classes succeed or fail
//! independently.
//!
//! ## Failure Model
//!
//! Kernel failures are not errors of the request. They are logged with
//! `tracing::warn!`, recorded in the returned [`SyncReport`], and leave the
//! affected class's cache entries as they were. Only the directory-level
//! entry points ([`RegisterEngine::fetch_registers`],
//! [`RegisterEngine::store_registers`]) return `Err`, for an unknown thread or
//! a register index outside the architecture.
//!
//! ## Drift
//!
//! A general-register store halts the thread and re-reads its state. If the
//! thread had been observed while running, registers it changed in the
//! meantime are detected by comparing the two blocks; see
//! [`GeneralRegisterClass`] for the rules. The kernel offers no atomic
//! read-modify-write, so this is detection and warning only.

mod float;
mod general;

use std::sync::Arc;

use smallvec::{smallvec, SmallVec};
use tracing::warn;

pub use self::float::FloatingPointRegisterClass;
pub use self::general::GeneralRegisterClass;
use crate::error::{RegSyncError, Result};
use crate::kernel::ThreadControl;
use crate::layout::ArchDescriptor;
use crate::thread::{ThreadDirectory, TracedThread};
use crate::types::{RegisterIndex, RegisterRequest, StateClass, ThreadId};

/// How one register class fared in a fetch or store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ClassOutcome
{
    /// The request did not cover this class
    #[default]
    NotRequested,
    /// Cache and kernel state were synchronized
    Synced,
    /// A kernel call failed; the cache was left untouched
    Failed(String),
    /// Not attempted: the store was aborted because the thread could not be halted
    Skipped,
}

impl ClassOutcome
{
    /// Whether this outcome is a failure
    pub fn is_failed(&self) -> bool
    {
        matches!(self, ClassOutcome::Failed(_))
    }
}

/// A general register the thread changed between an earlier fetch and a store's halt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriftWarning
{
    /// Register that changed
    pub register: RegisterIndex,
    /// Its name
    pub name: &'static str,
    /// The store wrote the caller's value over the thread's change
    pub overwritten: bool,
}

/// What a fetch or store did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport
{
    /// General-register class outcome
    pub general: ClassOutcome,
    /// Floating-point class outcome
    pub floating_point: ClassOutcome,
    /// Registers found to have drifted (stores only)
    pub drift: SmallVec<[DriftWarning; 4]>,
}

impl SyncReport
{
    /// Outcome for `class`
    pub fn outcome(&self, class: StateClass) -> &ClassOutcome
    {
        match class {
            StateClass::General => &self.general,
            StateClass::FloatingPoint => &self.floating_point,
        }
    }

    fn set_outcome(&mut self, class: StateClass, outcome: ClassOutcome)
    {
        match class {
            StateClass::General => self.general = outcome,
            StateClass::FloatingPoint => self.floating_point = outcome,
        }
    }

    /// Whether no requested class failed
    pub fn is_complete(&self) -> bool
    {
        !self.general.is_failed() && !self.floating_point.is_failed()
    }

    /// Number of warnings emitted
    ///
    /// One per failed class, one per drifted register, and a second one for
    /// each drifted register the store overwrote.
    pub fn warning_count(&self) -> usize
    {
        let failures = usize::from(self.general.is_failed()) + usize::from(self.floating_point.is_failed());
        let clobbered = self.drift.iter().filter(|drift| drift.overwritten).count();
        failures + self.drift.len() + clobbered
    }
}

/// Borrowed state a register class works with during one request
pub struct SyncContext<'a, K: ?Sized>
{
    /// Architecture layout
    pub arch: &'a ArchDescriptor,
    /// Kernel interface
    pub kernel: &'a mut K,
}

/// Fetch and store for one class of registers
pub trait ClassSync
{
    /// State class this implementation handles
    const STATE: StateClass;

    /// Copy kernel state covered by `request` into the thread's cache
    fn fetch<K>(&self, ctx: &mut SyncContext<'_, K>, thread: &mut TracedThread, request: RegisterRequest) -> Result<()>
    where
        K: ThreadControl + ?Sized;

    /// Write cached values covered by `request` into kernel state
    fn store<K>(
        &self,
        ctx: &mut SyncContext<'_, K>,
        thread: &mut TracedThread,
        request: RegisterRequest,
        report: &mut SyncReport,
    ) -> Result<()>
    where
        K: ThreadControl + ?Sized;
}

/// Register class a request is dispatched to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterClass
{
    /// Integer and segment registers
    General(GeneralRegisterClass),
    /// x87 stack and control pseudo-registers
    FloatingPoint(FloatingPointRegisterClass),
}

impl RegisterClass
{
    /// Class for a kernel state class
    pub fn of(state: StateClass) -> Self
    {
        match state {
            StateClass::General => RegisterClass::General(GeneralRegisterClass),
            StateClass::FloatingPoint => RegisterClass::FloatingPoint(FloatingPointRegisterClass),
        }
    }

    /// Classes touched by `request`, general first
    ///
    /// ## Panics
    ///
    /// Panics if a single index lies outside `arch`.
    pub fn for_request(arch: &ArchDescriptor, request: RegisterRequest) -> SmallVec<[RegisterClass; 2]>
    {
        match request {
            RegisterRequest::All => smallvec![
                Self::of(StateClass::General),
                Self::of(StateClass::FloatingPoint)
            ],
            RegisterRequest::Single(index) => match arch.class_of(index) {
                Some(state) => smallvec![Self::of(state)],
                None => panic!("{}: register {index} out of range", arch.name()),
            },
        }
    }

    /// Kernel state class
    pub fn state(self) -> StateClass
    {
        match self {
            RegisterClass::General(_) => GeneralRegisterClass::STATE,
            RegisterClass::FloatingPoint(_) => FloatingPointRegisterClass::STATE,
        }
    }

    fn fetch<K>(self, ctx: &mut SyncContext<'_, K>, thread: &mut TracedThread, request: RegisterRequest) -> Result<()>
    where
        K: ThreadControl + ?Sized,
    {
        match self {
            RegisterClass::General(class) => class.fetch(ctx, thread, request),
            RegisterClass::FloatingPoint(class) => class.fetch(ctx, thread, request),
        }
    }

    fn store<K>(
        self,
        ctx: &mut SyncContext<'_, K>,
        thread: &mut TracedThread,
        request: RegisterRequest,
        report: &mut SyncReport,
    ) -> Result<()>
    where
        K: ThreadControl + ?Sized,
    {
        match self {
            RegisterClass::General(class) => class.store(ctx, thread, request, report),
            RegisterClass::FloatingPoint(class) => class.store(ctx, thread, request, report),
        }
    }
}

/// Register fetch/store engine for one architecture and kernel
///
/// ## Example
///
/// ```rust
/// use regsync_core::arch::i386::{self, regnum};
/// use regsync_core::platform::memory::MemoryKernel;
/// use regsync_core::types::{RegisterRequest, ThreadId, ThreadPort};
/// use regsync_core::{RegisterEngine, TracedThread};
///
/// let arch = i386::gnu();
/// let kernel = MemoryKernel::new(arch.clone());
/// kernel.spawn(ThreadId(1), ThreadPort(100));
///
/// let mut engine = RegisterEngine::new(arch.clone(), kernel);
/// let mut thread = TracedThread::new(ThreadId(1), ThreadPort(100), &arch);
///
/// let report = engine.fetch(&mut thread, RegisterRequest::All);
/// assert!(report.is_complete());
/// assert!(thread.cache().is_valid(regnum::EAX));
/// ```
#[derive(Debug)]
pub struct RegisterEngine<K>
{
    arch: Arc<ArchDescriptor>,
    kernel: K,
}

impl<K: ThreadControl> RegisterEngine<K>
{
    /// Create an engine for `arch` on top of `kernel`
    pub fn new(arch: Arc<ArchDescriptor>, kernel: K) -> Self
    {
        Self { arch, kernel }
    }

    /// Architecture layout
    pub fn arch(&self) -> &ArchDescriptor
    {
        &self.arch
    }

    /// Kernel interface
    pub fn kernel(&self) -> &K
    {
        &self.kernel
    }

    /// Kernel interface (mutable)
    pub fn kernel_mut(&mut self) -> &mut K
    {
        &mut self.kernel
    }

    /// Consume the engine, returning the kernel
    pub fn into_kernel(self) -> K
    {
        self.kernel
    }

    /// Fetch `request` from `thread`'s kernel state into its cache
    ///
    /// General registers come from the thread's snapshot if it holds one,
    /// otherwise from a fresh read that does not halt the thread. Each copied
    /// general register is marked valid and fetched. Floating-point
    /// pseudo-registers are always read fresh and decoded; "no value" clears
    /// the entry's validity.
    ///
    /// ## Panics
    ///
    /// Panics if a single index lies outside the architecture.
    pub fn fetch(&mut self, thread: &mut TracedThread, request: RegisterRequest) -> SyncReport
    {
        let mut report = SyncReport::default();
        let mut ctx = SyncContext {
            arch: &self.arch,
            kernel: &mut self.kernel,
        };

        for class in RegisterClass::for_request(ctx.arch, request) {
            let result = class.fetch(&mut ctx, thread, request);
            record(&mut report, thread.id(), class.state(), "fetch", result);
        }

        report
    }

    /// Store `request` from `thread`'s cache into its kernel state
    ///
    /// Halts the thread, reconciles registers that drifted since an earlier
    /// fetch, then writes: every valid general register for
    /// [`RegisterRequest::All`], exactly the named one otherwise. The
    /// floating-point block is read, patched with the valid pseudo-registers
    /// and written back.
    ///
    /// If the halt (or the read after it) fails, nothing is written: the
    /// floating-point class of a [`RegisterRequest::All`] store is
    /// [`ClassOutcome::Skipped`]. A failed general write does not stop it.
    ///
    /// ## Panics
    ///
    /// - A single index lies outside the architecture
    /// - A single general register is stored while its cache entry is not
    ///   valid (storing undefined data is never permitted)
    pub fn store(&mut self, thread: &mut TracedThread, request: RegisterRequest) -> SyncReport
    {
        let mut report = SyncReport::default();
        let mut ctx = SyncContext {
            arch: &self.arch,
            kernel: &mut self.kernel,
        };

        for class in RegisterClass::for_request(ctx.arch, request) {
            if report.general.is_failed() && !thread.snapshot.holds_halted_state() {
                report.set_outcome(class.state(), ClassOutcome::Skipped);
                continue;
            }
            let result = class.store(&mut ctx, thread, request, &mut report);
            record(&mut report, thread.id(), class.state(), "store", result);
        }

        report
    }

    /// Refresh `directory`, resolve `id` and fetch
    ///
    /// ## Errors
    ///
    /// - `InvalidRegister`: a single index outside the architecture
    /// - `ThreadNotFound`: `id` is not a live thread
    /// - whatever the directory's refresh returns
    pub fn fetch_registers<D>(&mut self, directory: &mut D, id: ThreadId, request: RegisterRequest) -> Result<SyncReport>
    where
        D: ThreadDirectory + ?Sized,
    {
        let thread = self.resolve(directory, id, request)?;
        Ok(self.fetch(thread, request))
    }

    /// Refresh `directory`, resolve `id` and store
    ///
    /// ## Errors
    ///
    /// Same as [`fetch_registers`](Self::fetch_registers).
    pub fn store_registers<D>(&mut self, directory: &mut D, id: ThreadId, request: RegisterRequest) -> Result<SyncReport>
    where
        D: ThreadDirectory + ?Sized,
    {
        let thread = self.resolve(directory, id, request)?;
        Ok(self.store(thread, request))
    }

    fn resolve<'d, D>(&self, directory: &'d mut D, id: ThreadId, request: RegisterRequest) -> Result<&'d mut TracedThread>
    where
        D: ThreadDirectory + ?Sized,
    {
        if let RegisterRequest::Single(index) = request {
            if self.arch.class_of(index).is_none() {
                return Err(RegSyncError::InvalidRegister {
                    index,
                    count: self.arch.register_count(),
                });
            }
        }

        directory.refresh_known_threads()?;
        directory.resolve(id).ok_or(RegSyncError::ThreadNotFound(id))
    }
}

fn record(report: &mut SyncReport, thread: ThreadId, class: StateClass, operation: &str, result: Result<()>)
{
    let outcome = match result {
        Ok(()) => ClassOutcome::Synced,
        Err(err) => {
            warn!(%thread, %class, error = %err, "couldn't {operation} {class} registers");
            ClassOutcome::Failed(err.to_string())
        }
    };
    report.set_outcome(class, outcome);
}
