//! # Kernel Boot Contract
//!
//! Everything the early boot path builds from the `kernel_info` constants,
//! in a form that can be checked on the host before it runs on hardware:
//!
//! * [`gdt`]: the four-entry bootstrap GDT with typed selectors,
//! * [`paging`]: the identity and higher-half mappings early paging installs,
//! * [`linker`]: the linker script generated by `build.rs`,
//! * [`contract`]: one call that checks all of the above against each other.
//!
//! ```rust
//! let contract = kernel_boot::contract::check_boot_contract(0x4_0000).unwrap();
//! assert_eq!(contract.cs_kernel32, 0x08);
//! assert_eq!(contract.cs_kernel, 0x10);
//! assert_eq!(contract.entry.as_u64(), 0xffff_ffff_8010_0000);
//! ```
//!
//! ## Features
//!
//! * `qemu` (default): log output reaches QEMU's debug console.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod contract;
pub mod gdt;
pub mod linker;
pub mod paging;
pub mod privilege;

pub use contract::{BootContract, BootContractError, check_boot_contract, trace_boot_contract};

use kernel_qemu::QemuLogger;
use log::{LevelFilter, SetLoggerError};

/// Route `log` output to the QEMU debug console.
///
/// # Errors
/// If a logger is already installed.
pub fn init_logging(level: LevelFilter) -> Result<(), SetLoggerError> {
    QemuLogger::init(level)
}
