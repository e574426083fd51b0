//! # Contract Verification
//!
//! The constants in [`memory`](crate::memory) and [`segments`](crate::segments)
//! are already pinned by compile-time assertions. [`Contract::verify`] repeats
//! those checks on a *value*, so a build script or a test can validate a
//! candidate layout (for instance one read back from a linker script) and get
//! a readable error instead of a triple fault.

use crate::memory::{
    IDENTITY_LOW_BYTES, KERNEL_LMA_BASE, KERNEL_LOCATION, KERNEL_VMA_BASE, PAGE_SIZE,
};
use crate::segments::{
    BOOT_GDT_ENTRIES, CS_KERNEL, CS_KERNEL32, DS_KERNEL, SELECTOR_RPL_MASK, SELECTOR_TI_BIT,
    selector_index,
};
use kernel_memory_addresses::{is_canonical, is_higher_half};

/// A complete set of boot contract values.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Contract {
    pub cs_kernel32: u16,
    pub cs_kernel: u16,
    pub ds_kernel: u16,
    pub lma_base: u64,
    pub vma_base: u64,
    pub location: u64,
}

/// A violated boot contract invariant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
    #[error("selector {selector:#06x} is the null selector")]
    SelectorIsNull { selector: u16 },
    #[error("selector {selector:#06x} carries RPL {rpl}, kernel selectors must use RPL 0")]
    SelectorHasRpl { selector: u16, rpl: u8 },
    #[error("selector {selector:#06x} points into the LDT")]
    SelectorUsesLdt { selector: u16 },
    #[error("selector {selector:#06x} is used for more than one segment")]
    SelectorCollision { selector: u16 },
    #[error("selector {selector:#06x} is outside the {entries}-entry bootstrap GDT")]
    SelectorOutOfTable { selector: u16, entries: usize },
    #[error("{what} {address:#018x} is not a canonical virtual address")]
    NotCanonical { what: &'static str, address: u64 },
    #[error("{what} {address:#018x} is below the canonical higher half")]
    NotHigherHalf { what: &'static str, address: u64 },
    #[error("{what} {address:#x} is not aligned to the 4 KiB page size")]
    NotPageAligned { what: &'static str, address: u64 },
    #[error("entry location {found:#018x} does not equal VMA base + LMA base ({expected:#018x})")]
    EntryMismatch { expected: u64, found: u64 },
    #[error("VMA base {vma:#018x} + LMA base {lma:#x} overflows the address space")]
    LocationOverflow { vma: u64, lma: u64 },
    #[error("LMA base {lma:#x} is outside the {window:#x}-byte identity window")]
    IdentityWindowTooSmall { lma: u64, window: u64 },
    #[error("linker symbol {symbol} is {found:#018x}, contract says {expected:#018x}")]
    LinkerSymbolMismatch {
        symbol: &'static str,
        expected: u64,
        found: u64,
    },
}

impl Contract {
    /// The values compiled into this kernel.
    pub const CURRENT: Self = Self {
        cs_kernel32: CS_KERNEL32,
        cs_kernel: CS_KERNEL,
        ds_kernel: DS_KERNEL,
        lma_base: KERNEL_LMA_BASE,
        vma_base: KERNEL_VMA_BASE,
        location: KERNEL_LOCATION,
    };

    /// Check every invariant of the boot contract.
    ///
    /// # Errors
    /// Returns the first violated invariant; checks run selectors first, then
    /// bases, then the derived entry location.
    pub fn verify(&self) -> Result<(), ContractError> {
        let selectors = [self.cs_kernel32, self.cs_kernel, self.ds_kernel];
        for (i, &selector) in selectors.iter().enumerate() {
            check_selector(selector)?;
            if selectors[..i].contains(&selector) {
                return Err(ContractError::SelectorCollision { selector });
            }
        }

        if self.lma_base % PAGE_SIZE != 0 {
            return Err(ContractError::NotPageAligned {
                what: "LMA base",
                address: self.lma_base,
            });
        }
        if self.lma_base >= IDENTITY_LOW_BYTES {
            return Err(ContractError::IdentityWindowTooSmall {
                lma: self.lma_base,
                window: IDENTITY_LOW_BYTES,
            });
        }
        if self.vma_base % PAGE_SIZE != 0 {
            return Err(ContractError::NotPageAligned {
                what: "VMA base",
                address: self.vma_base,
            });
        }
        if !is_canonical(self.vma_base) {
            return Err(ContractError::NotCanonical {
                what: "VMA base",
                address: self.vma_base,
            });
        }
        if !is_higher_half(self.vma_base) {
            return Err(ContractError::NotHigherHalf {
                what: "VMA base",
                address: self.vma_base,
            });
        }

        let expected = self
            .vma_base
            .checked_add(self.lma_base)
            .ok_or(ContractError::LocationOverflow {
                vma: self.vma_base,
                lma: self.lma_base,
            })?;
        if self.location != expected {
            return Err(ContractError::EntryMismatch {
                expected,
                found: self.location,
            });
        }
        if !is_canonical(self.location) {
            return Err(ContractError::NotCanonical {
                what: "entry location",
                address: self.location,
            });
        }

        Ok(())
    }
}

impl Default for Contract {
    fn default() -> Self {
        Self::CURRENT
    }
}

fn check_selector(selector: u16) -> Result<(), ContractError> {
    let rpl = selector & SELECTOR_RPL_MASK;
    if rpl != 0 {
        #[allow(clippy::cast_possible_truncation)]
        return Err(ContractError::SelectorHasRpl {
            selector,
            rpl: rpl as u8,
        });
    }
    if selector & SELECTOR_TI_BIT != 0 {
        return Err(ContractError::SelectorUsesLdt { selector });
    }
    if selector == 0 {
        return Err(ContractError::SelectorIsNull { selector });
    }
    if usize::from(selector_index(selector)) >= BOOT_GDT_ENTRIES {
        return Err(ContractError::SelectorOutOfTable {
            selector,
            entries: BOOT_GDT_ENTRIES,
        });
    }
    Ok(())
}

/// Verify the compiled-in contract.
///
/// # Errors
/// See [`Contract::verify`]. With the shipped constants this cannot fail;
/// the compile-time assertions would have rejected the build first.
pub fn verify() -> Result<(), ContractError> {
    Contract::CURRENT.verify()
}
