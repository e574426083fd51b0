//! # Virtual and Physical Memory Address Types
//!
//! Strongly typed wrappers for raw 64-bit addresses used by the boot-time
//! address contract, the linker-script generator and the boot mapping planner.
//!
//! ## Overview
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`MemoryAddress`] | A raw 64-bit address, either physical or virtual. |
//! | [`VirtualAddress`] | An address that is translated by the page tables. |
//! | [`PhysicalAddress`] | An address on the physical bus (RAM or MMIO). |
//!
//! The wrappers are zero-cost `#[repr(transparent)]` newtypes; their only job
//! is to keep the load address (LMA) and the execution address (VMA) of the
//! kernel image from being mixed up at compile time.
//!
//! ## Page Sizes
//!
//! Three standard x86-64 page sizes are supported via marker types that
//! implement [`PageSize`]:
//!
//! - [`Size4K`]: 4 KiB pages (base granularity)
//! - [`Size2M`]: 2 MiB large pages
//! - [`Size1G`]: 1 GiB huge pages
//!
//! ## Canonical Addresses
//!
//! x86-64 implements [`VIRTUAL_ADDRESS_BITS`] bits of virtual address. Every
//! bit above bit 47 must be a copy of bit 47, otherwise the CPU raises `#GP`
//! on access. [`is_canonical`] checks this, [`canonicalize`] enforces it.
//!
//! ```text
//! 0x0000_0000_0000_0000 ┌──────────────────────┐
//!                       │   lower half (user)  │
//! 0x0000_7FFF_FFFF_FFFF ├──────────────────────┤
//!                       │  non-canonical hole  │
//! 0xFFFF_8000_0000_0000 ├──────────────────────┤
//!                       │  higher half (kernel)│
//! 0xFFFF_FFFF_FFFF_FFFF └──────────────────────┘
//! ```
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let va = VirtualAddress::new(0xFFFF_FFFF_8010_0000);
//! assert!(va.is_canonical());
//! assert!(va.is_aligned::<Size4K>());
//! assert_eq!(va.align_down::<Size2M>().as_u64(), 0xFFFF_FFFF_8000_0000);
//!
//! let pa = PhysicalAddress::new(0x0010_0042);
//! assert_eq!(pa.offset::<Size4K>(), 0x42);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

mod memory_address;
mod page_size;
mod physical_address;
mod virtual_address;

pub use memory_address::MemoryAddress;
pub use page_size::{PageSize, Size1G, Size2M, Size4K};
pub use physical_address::PhysicalAddress;
pub use virtual_address::VirtualAddress;

/// Number of implemented virtual address bits (4-level paging).
pub const VIRTUAL_ADDRESS_BITS: u32 = 48;

/// Number of upper bits that must replicate bit `VIRTUAL_ADDRESS_BITS - 1`.
const SIGN_EXTENSION_BITS: u32 = u64::BITS - VIRTUAL_ADDRESS_BITS;

/// First address of the canonical higher half.
pub const HIGHER_HALF_START: u64 = 0xFFFF_8000_0000_0000;

/// Last address of the canonical lower half.
pub const LOWER_HALF_END: u64 = 0x0000_7FFF_FFFF_FFFF;

/// Sign-extend bit 47 into bits 48..=63.
///
/// ```rust
/// # use kernel_memory_addresses::canonicalize;
/// assert_eq!(canonicalize(0x0000_FFFF_8000_0000), 0xFFFF_FFFF_8000_0000);
/// assert_eq!(canonicalize(0xABCD_0000_1234_5678), 0x0000_0000_1234_5678);
/// ```
#[inline]
#[must_use]
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
pub const fn canonicalize(addr: u64) -> u64 {
    (((addr << SIGN_EXTENSION_BITS) as i64) >> SIGN_EXTENSION_BITS) as u64
}

/// Whether `addr` is a canonical x86-64 virtual address.
#[inline]
#[must_use]
pub const fn is_canonical(addr: u64) -> bool {
    canonicalize(addr) == addr
}

/// Whether `addr` lies in the canonical higher half.
#[inline]
#[must_use]
pub const fn is_higher_half(addr: u64) -> bool {
    addr >= HIGHER_HALF_START
}

/// Whether `value` is a multiple of the page size `S`.
#[inline]
#[must_use]
pub const fn is_aligned<S: PageSize>(value: u64) -> bool {
    value & (S::SIZE - 1) == 0
}

/// Round `value` up to the next multiple of `S`, or `None` on overflow.
#[inline]
#[must_use]
pub const fn checked_align_up<S: PageSize>(value: u64) -> Option<u64> {
    match value.checked_add(S::SIZE - 1) {
        Some(v) => Some(v & !(S::SIZE - 1)),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_boundaries() {
        assert!(is_canonical(0));
        assert!(is_canonical(LOWER_HALF_END));
        assert!(!is_canonical(LOWER_HALF_END + 1));
        assert!(!is_canonical(0x0000_8000_0000_0000));
        assert!(!is_canonical(0xFFFF_7FFF_FFFF_FFFF));
        assert!(is_canonical(HIGHER_HALF_START));
        assert!(is_canonical(u64::MAX));
    }

    #[test]
    fn higher_half_kernel_window_is_canonical() {
        assert!(is_canonical(0xFFFF_FFFF_8000_0000));
        assert!(is_higher_half(0xFFFF_FFFF_8000_0000));
        assert!(!is_higher_half(0x0010_0000));
    }

    #[test]
    fn canonicalize_is_idempotent() {
        for raw in [
            0u64,
            0x1234,
            0x0000_8000_0000_0000,
            0x0000_FFFF_8000_0000,
            0xDEAD_BEEF_CAFE_F00D,
        ] {
            let c = canonicalize(raw);
            assert!(is_canonical(c));
            assert_eq!(canonicalize(c), c);
        }
    }

    #[test]
    fn alignment_helpers() {
        assert!(is_aligned::<Size4K>(0x0010_0000));
        assert!(!is_aligned::<Size2M>(0x0010_0000));
        assert!(is_aligned::<Size2M>(0x0020_0000));
        assert_eq!(checked_align_up::<Size2M>(0x0010_0001), Some(0x0020_0000));
        assert_eq!(checked_align_up::<Size4K>(0x1000), Some(0x1000));
        assert_eq!(checked_align_up::<Size4K>(u64::MAX), None);
    }
}
