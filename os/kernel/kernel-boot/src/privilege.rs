//! # Privilege Levels
//!
//! The bootstrap GDT only ever runs at ring 0, but the two-bit privilege
//! fields still have to be encoded correctly: a code descriptor with the
//! wrong DPL faults on the far jump into long mode, and a selector with a
//! non-zero RPL faults on the first data segment load.
//!
//! | Type | Stored in | Meaning |
//! |------|-----------|---------|
//! | [`Ring`] | the running `CS` | current privilege level (`CPL`) |
//! | [`Rpl`] | bits 0–1 of a selector | requested privilege level |
//! | [`Dpl`] | bits 45–46 of a descriptor | descriptor privilege level |
//!
//! ```rust
//! use kernel_boot::privilege::{Dpl, Ring, Rpl};
//!
//! // the boot stub loads DS with a ring 0 selector at CPL 0
//! assert!(Dpl::Ring0.permits_data_load(Ring::Ring0, Rpl::Ring0));
//! assert!(!Dpl::Ring0.permits_data_load(Ring::Ring0, Rpl::Ring3));
//! ```

use core::fmt;

/// RPL mask in a 16-bit selector.
pub const RPL_MASK: u16 = 0b11;

/// Kernel RPL used by every bootstrap selector.
pub const KERNEL_RPL: Rpl = Rpl::Ring0;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug)]
#[repr(u8)]
pub enum Ring {
    Ring0 = 0,
    Ring1 = 1,
    Ring2 = 2,
    Ring3 = 3,
}

impl Ring {
    #[inline]
    #[must_use]
    pub const fn from_bits(v: u8) -> Self {
        match v & 0b11 {
            0 => Self::Ring0,
            1 => Self::Ring1,
            2 => Self::Ring2,
            _ => Self::Ring3,
        }
    }

    #[inline]
    #[must_use]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Ring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ring {}", self.into_bits())
    }
}

/// Requested Privilege Level, the low two bits of a selector.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[repr(u8)]
pub enum Rpl {
    Ring0 = 0,
    Ring1 = 1,
    Ring2 = 2,
    Ring3 = 3,
}

impl Rpl {
    #[inline]
    #[must_use]
    pub const fn to_ring(self) -> Ring {
        Ring::from_bits(self as u8)
    }

    /// Encode as the low two bits of a selector.
    #[inline]
    #[must_use]
    pub const fn into_bits(self) -> u16 {
        self as u16
    }

    /// Decode from the low two bits.
    #[inline]
    #[must_use]
    pub const fn from_bits(value_low2: u16) -> Self {
        match value_low2 & RPL_MASK {
            0 => Self::Ring0,
            1 => Self::Ring1,
            2 => Self::Ring2,
            _ => Self::Ring3,
        }
    }

    /// Extract the RPL from a raw selector value.
    #[inline]
    #[must_use]
    pub const fn from_selector(selector: u16) -> Self {
        Self::from_bits(selector)
    }

    /// `max(CPL, RPL)`, the level that takes part in data segment checks.
    #[inline]
    #[must_use]
    pub const fn effective_with(self, cpl: Ring) -> Ring {
        if cpl.into_bits() >= self as u8 {
            cpl
        } else {
            self.to_ring()
        }
    }
}

/// Descriptor Privilege Level, bits 45–46 of a segment descriptor.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[repr(u8)]
pub enum Dpl {
    Ring0 = 0,
    Ring1 = 1,
    Ring2 = 2,
    Ring3 = 3,
}

impl Dpl {
    #[inline]
    #[must_use]
    pub const fn to_ring(self) -> Ring {
        Ring::from_bits(self as u8)
    }

    #[inline]
    #[must_use]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }

    #[inline]
    #[must_use]
    pub const fn from_bits(v: u8) -> Self {
        match v & 0b11 {
            0 => Self::Ring0,
            1 => Self::Ring1,
            2 => Self::Ring2,
            _ => Self::Ring3,
        }
    }

    /// Data segment: allowed iff `max(CPL, RPL) ≤ DPL`.
    #[inline]
    #[must_use]
    pub const fn permits_data_load(self, cpl: Ring, rpl: Rpl) -> bool {
        rpl.effective_with(cpl).into_bits() <= self as u8
    }

    /// Non-conforming code: `CPL == DPL`.
    #[inline]
    #[must_use]
    pub const fn permits_nonconforming_code(self, cpl: Ring) -> bool {
        self as u8 == cpl.into_bits()
    }
}

impl From<Dpl> for Ring {
    #[inline]
    fn from(dpl: Dpl) -> Self {
        dpl.to_ring()
    }
}

impl From<Rpl> for Ring {
    #[inline]
    fn from(rpl: Rpl) -> Self {
        rpl.to_ring()
    }
}
