//! # QEMU Debug Console Output
//!
//! Early-boot diagnostics for kernels running under QEMU. During the first
//! instructions after the long-mode switch there is no console driver, no
//! allocator and no interrupt handling; the only output path that works is a
//! single `out` instruction to QEMU's debug console port.
//!
//! ```text
//! log::info!(..) ──▶ QemuLogger ──▶ DebugConsole (fmt::Write) ──▶ out 0x402 ──▶ -debugcon
//! qemu_trace!(..) ───────────────────────┘
//! ```
//!
//! Run QEMU with `-debugcon stdio` (or `-debugcon file:boot.log`) to see it.
//!
//! ## Features
//!
//! * `enabled` (default): port writes are compiled in.
//! * without `enabled`: every write is a no-op, so release images can keep
//!   their `log` calls without touching I/O ports.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod logger;

pub use logger::{QemuLogger, format_record};

/// I/O port QEMU's `-debugcon` device listens on.
pub const QEMU_DEBUG_PORT: u16 = 0x402;

#[doc(hidden)]
pub mod qemu_fmt {
    use core::fmt::{self, Write};

    /// `core::fmt::Write` sink for the debug console port.
    pub struct DebugConsole;

    impl DebugConsole {
        /// Write one byte to the debug port.
        #[inline]
        #[allow(clippy::unused_self)]
        pub fn put(&mut self, byte: u8) {
            #[cfg(all(feature = "enabled", target_arch = "x86_64"))]
            // SAFETY: port 0x402 is QEMU's debug console; the write touches no
            // memory and has no side effect besides emitting one byte.
            unsafe {
                core::arch::asm!(
                    "out dx, al",
                    in("dx") super::QEMU_DEBUG_PORT,
                    in("al") byte,
                    options(nomem, nostack, preserves_flags)
                );
            }
            #[cfg(not(all(feature = "enabled", target_arch = "x86_64")))]
            let _ = byte;
        }
    }

    impl Write for DebugConsole {
        #[inline]
        fn write_str(&mut self, s: &str) -> fmt::Result {
            for b in s.bytes() {
                self.put(b);
            }
            Ok(())
        }
    }

    /// Best-effort formatted write; errors are dropped.
    #[inline]
    pub fn qemu_write(args: fmt::Arguments) {
        let _ = DebugConsole.write_fmt(args);
    }
}

/// Write `format!`-style output straight to the debug console, bypassing `log`.
#[macro_export]
macro_rules! qemu_trace {
    ($($arg:tt)*) => {{
        $crate::qemu_fmt::qemu_write(core::format_args!($($arg)*));
    }};
}
