//! Build script for regsync-core
//!
//! This script checks system requirements before compilation:
//! - Minimum Rust version (Edition 2021 = Rust 1.56.0+)
//! - Target support for the Mach backend
//!
//! ## Requirements
//!
//! - **Rust**: Edition 2021 (Rust 1.56.0 or newer)
//! - **GNU/Hurd**: i386, for the Mach thread-control backend
//! - **Other targets**: only the in-memory kernel is built

fn main()
{
    println!("cargo:rerun-if-changed=build.rs");

    // Check minimum Rust version
    // Edition 2021 requires Rust 1.56.0
    if let Ok(rustc_version) = rustc_version::version() {
        let min_rust_version = rustc_version::Version::new(1, 56, 0);

        if rustc_version < min_rust_version {
            panic!(
                "regsync-core requires Rust {} or newer (Edition 2021), found {}",
                min_rust_version, rustc_version
            );
        }
    } else {
        // If we can't get version (e.g., in some build environments), just warn
        println!("cargo:warning=could not verify Rust version");
    }

    check_target();
}

fn check_target()
{
    // Cargo sets these for the target, not the host
    let os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    let arch = std::env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();

    if os != "hurd" {
        return;
    }

    if arch != "x86" {
        println!("cargo:warning=the Mach backend only describes i386 thread state, target is {arch}");
    }
}
