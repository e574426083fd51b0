//! # Bootstrap Address and Segment Contract
//!
//! The single source of truth for the values a bare-metal x86-64 boot sequence
//! must agree on before any diagnostics exist:
//!
//! | Constant | Value | Consumed by |
//! |----------|-------|-------------|
//! | [`CS_KERNEL32`](segments::CS_KERNEL32) | `0x08` | protected-mode stub, GDT builder |
//! | [`CS_KERNEL`](segments::CS_KERNEL) | `0x10` | long-mode far jump, GDT builder |
//! | [`KERNEL_LMA_BASE`](memory::KERNEL_LMA_BASE) | `0x0010_0000` | loader, linker script, identity map |
//! | [`KERNEL_VMA_BASE`](memory::KERNEL_VMA_BASE) | `0xffff_ffff_8000_0000` | linker script, higher-half map |
//! | [`KERNEL_LOCATION`](memory::KERNEL_LOCATION) | VMA + LMA | linker entry symbol, jump target |
//!
//! A wrong value here does not produce an error message; it produces a
//! triple fault, or worse, silently executes the wrong bytes. Every invariant
//! is therefore checked twice:
//!
//! * at compile time, by `const _: () = assert!(..)` blocks next to the
//!   constants, and
//! * on demand, by [`verify`] and [`linker::LinkerLayout::check`], which the
//!   kernel build script and the tests run against the generated linker script.
//!
//! ## Modules
//!
//! * [`segments`]: selector values and decoding helpers.
//! * [`memory`]: load/execution addresses and higher-half translation.
//! * [`linker`]: rendering and reading back the linker script.
//! * [`contract`]: runtime verification and the [`ContractError`] type.
//!
//! ## Build Script Integration
//! ```rust
//! // In build.rs
//! use kernel_info::linker::LinkerLayout;
//!
//! let mut script = String::new();
//! LinkerLayout::from_contract().write_script(&mut script).unwrap();
//! // std::fs::write(out_dir.join("kernel.ld"), script)?;
//! ```
//!
//! ## Boot Code Integration
//! ```rust
//! use kernel_info::{memory, segments};
//!
//! // far jump target for the switch into long mode
//! let (cs, rip) = (segments::code64_selector(), memory::entry_address());
//! assert_eq!(cs, 0x10);
//! assert_eq!(rip.as_u64(), 0xffff_ffff_8010_0000);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod contract;
pub mod linker;
pub mod memory;
pub mod segments;

pub use contract::{Contract, ContractError, verify};
