use std::fmt::Write as _;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use regsync_core::arch::i386::{self, regnum};
use regsync_core::fpu;
use regsync_core::layout::ArchDescriptor;
use regsync_core::platform::memory::MemoryKernel;
use regsync_core::types::{RegisterRequest, StateClass, ThreadId, ThreadPort};
use regsync_core::{ClassOutcome, RawBlock, RegisterEngine, Result as SyncResult, SyncReport, ThreadDirectory, ThreadTable};
use regsync_utils::{info, init_logging_with_config, LogFormat, LogLevel, LoggingConfig};

/// Inspect register layouts and raw thread-state blocks.
#[derive(Parser, Debug)]
#[command(name = "regsync")]
#[command(version)]
#[command(about = "Inspect register layouts and raw thread-state blocks", long_about = None)]
struct Cli
{
    /// Target architecture
    #[arg(long, value_enum, default_value_t = Arch::I386Gnu, global = true)]
    arch: Arch,

    /// Log level (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Log format: pretty or json (overrides REGSYNC_LOG_FORMAT)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Arch
{
    /// i386 GNU/Hurd thread state
    I386Gnu,
}

impl Arch
{
    fn descriptor(self) -> Arc<ArchDescriptor>
    {
        match self {
            Arch::I386Gnu => i386::gnu(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Print the register layout table
    Layout,
    /// Decode a raw floating-point state block read from a file
    DecodeFpu
    {
        /// File holding exactly one floating-point block
        file: PathBuf,
    },
    /// Run a store against a simulated thread that moves before it is halted
    DriftDemo,
}

fn main()
{
    let cli = Cli::parse();

    if let Err(e) = init_logging_with_config(&logging_config(&cli)) {
        eprintln!("Failed to initialize logging: {e}");
        process::exit(1);
    }

    if let Err(e) = run_command(&cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn logging_config(cli: &Cli) -> LoggingConfig
{
    let mut config = LoggingConfig::from_env().unwrap_or_default();
    config.level = cli.log_level.or(config.level);
    if let Some(format) = cli.log_format {
        config.format = format;
    }
    if let Some(file) = &cli.log_file {
        config.file = Some(file.clone());
        config.console = false;
    }
    config
}

fn run_command(cli: &Cli) -> Result<(), Box<dyn std::error::Error>>
{
    let arch = cli.arch.descriptor();

    match &cli.command {
        Commands::Layout => print_layout(&arch),
        Commands::DecodeFpu { file } => {
            let bytes = std::fs::read(file)?;
            let block = RawBlock::new(bytes).checked(StateClass::FloatingPoint, arch.float().block_size)?;
            print_fpu(&arch, &block);
        }
        Commands::DriftDemo => {
            let report = drift_demo(&arch)?;
            print_report(&report);
        }
    }

    Ok(())
}

fn print_layout(arch: &ArchDescriptor)
{
    println!("Architecture: {}", arch.name());
    println!(
        "General block: {} bytes, floating-point block: {} bytes",
        arch.general_block_size(),
        arch.float().block_size
    );
    println!();
    println!("{:>5}  {:<8}  {:<14}  {:>6}  {:>5}", "index", "name", "class", "offset", "width");

    for desc in arch.general() {
        println!(
            "{:>5}  {:<8}  {:<14}  {:>6}  {:>5}",
            desc.index.get(),
            desc.name,
            StateClass::General.to_string(),
            desc.offset,
            desc.width
        );
    }

    let float = arch.float();
    for index in arch.float_indices() {
        let Some(reg) = float.register_at(index) else {
            continue;
        };
        println!(
            "{:>5}  {:<8}  {:<14}  {:>6}  {:>5}",
            index.get(),
            reg.name(),
            StateClass::FloatingPoint.to_string(),
            float.env_offset + fpu::env_field_offset(reg),
            reg.width()
        );
    }
}

fn print_fpu(arch: &ArchDescriptor, block: &RawBlock)
{
    let layout = arch.float();
    if !fpu::is_initialized(layout, block) {
        println!("FPU state is not initialized; every register is unavailable");
    }

    for (index, value) in fpu::decode(layout, block) {
        let name = arch.register_name(index);
        match value {
            Some(bytes) => println!("{name:<8} {}", hex(&bytes)),
            None => println!("{name:<8} <unavailable>"),
        }
    }
}

/// Register value bytes as a little-endian hex number
fn hex(bytes: &[u8]) -> String
{
    let mut out = String::from("0x");
    for byte in bytes.iter().rev() {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Fetch everything, let the thread change EIP before the halt, then store EAX
fn drift_demo(arch: &Arc<ArchDescriptor>) -> SyncResult<SyncReport>
{
    let thread = ThreadId(1);
    let port = ThreadPort(100);

    let kernel = MemoryKernel::new(arch.clone());
    kernel.spawn(thread, port);
    kernel.write_register(port, regnum::EIP, &0x0804_8000_u32.to_le_bytes());

    let mut threads = ThreadTable::new(arch.clone(), kernel.clone());
    let mut engine = RegisterEngine::new(arch.clone(), kernel.clone());

    info!(%thread, "fetching all registers while the thread runs");
    engine.fetch_registers(&mut threads, thread, RegisterRequest::All)?;

    kernel.run_before_halt(port, regnum::EIP, &0x0804_8010_u32.to_le_bytes());

    if let Some(traced) = threads.resolve(thread) {
        traced.cache_mut().set(regnum::EAX, &42_u32.to_le_bytes())?;
    }

    info!(%thread, "storing EAX");
    let report = engine.store_registers(&mut threads, thread, RegisterRequest::Single(regnum::EAX))?;

    println!("eax in kernel: {}", hex(&kernel.read_register(port, regnum::EAX)));
    println!("eip in kernel: {}", hex(&kernel.read_register(port, regnum::EIP)));
    if let Some(traced) = threads.resolve(thread) {
        let (eip, valid) = traced.cache().read(regnum::EIP);
        println!("eip in cache:  {} (valid: {valid})", hex(eip));
    }

    Ok(report)
}

fn print_report(report: &SyncReport)
{
    for class in [StateClass::General, StateClass::FloatingPoint] {
        let outcome = match report.outcome(class) {
            ClassOutcome::NotRequested => "not requested".to_string(),
            ClassOutcome::Synced => "synced".to_string(),
            ClassOutcome::Skipped => "skipped, thread not halted".to_string(),
            ClassOutcome::Failed(reason) => format!("failed: {reason}"),
        };
        println!("{class}: {outcome}");
    }

    for drift in &report.drift {
        let note = if drift.overwritten { ", overwritten by the store" } else { "" };
        println!("drift: {} ({}){note}", drift.name, drift.register);
    }
    println!("warnings: {}", report.warning_count());
}
