//! The linker script rendered by `build.rs` from `kernel_info::linker`.

use kernel_info::linker::{LinkerLayout, LinkerScriptError};

/// Text of the generated `kernel.ld`.
pub const KERNEL_LD: &str = include_str!(concat!(env!("OUT_DIR"), "/kernel.ld"));

/// Location of the generated `kernel.ld`, for the image's link step (`-T`).
pub const KERNEL_LD_PATH: &str = concat!(env!("OUT_DIR"), "/kernel.ld");

/// Read the contract symbols back from [`KERNEL_LD`].
///
/// # Errors
/// Only if the build script rendered a script without the symbols.
pub fn generated_layout() -> Result<LinkerLayout, LinkerScriptError> {
    LinkerLayout::parse(KERNEL_LD)
}
