//! # Bootstrap Global Descriptor Table
//!
//! The table the boot stub loads before it enables long mode. It has to be
//! valid in *both* modes: the 32-bit stub runs from entry 1, and the far jump
//! into long mode lands on entry 2.
//!
//! Index | Selector | Meaning
//! ------|----------|--------
//! 0     | 0x00     | Null
//! 1     | 0x08     | Kernel code, 32-bit ([`BOOT_CS32_SEL`], `CS_KERNEL32`)
//! 2     | 0x10     | Kernel code, 64-bit ([`BOOT_CS64_SEL`], `CS_KERNEL`)
//! 3     | 0x18     | Kernel data, flat ([`BOOT_DS_SEL`])
//!
//! The selector numbers are owned by `kernel_info::segments`; this module
//! only builds descriptors for them and refuses to compile if the two
//! disagree. [`BootGdt::verify`] re-checks a built table entry by entry,
//! which catches a hand-edited or byte-patched image as well.
//!
//! Loading the table (`lgdt`, the far jump) happens in the assembly stub.
//! This module provides the bytes and the pointer it loads.

pub mod descriptors;
pub mod selectors;

use crate::gdt::descriptors::{Desc64, DescriptorKind};
use crate::gdt::selectors::{Code32Sel, CodeSel, DataSel, SegmentSelector, SelectorKind};
use crate::privilege::{Dpl, KERNEL_RPL, Ring};
use kernel_info::segments::{
    self, BOOT_GDT_ENTRIES, CS_KERNEL, CS_KERNEL32, DESCRIPTOR_SIZE, DS_KERNEL,
};
use kernel_memory_addresses::VirtualAddress;

pub const BOOT_CS32_SEL: SegmentSelector<Code32Sel> =
    SegmentSelector::<Code32Sel>::new(segments::CS_KERNEL32_INDEX, KERNEL_RPL);
pub const BOOT_CS64_SEL: SegmentSelector<CodeSel> =
    SegmentSelector::<CodeSel>::new(segments::CS_KERNEL_INDEX, KERNEL_RPL);
pub const BOOT_DS_SEL: SegmentSelector<DataSel> =
    SegmentSelector::<DataSel>::new(segments::DS_KERNEL_INDEX, KERNEL_RPL);

/// Size of the bootstrap table in bytes.
pub const BOOT_GDT_BYTES: usize = BOOT_GDT_ENTRIES * DESCRIPTOR_SIZE as usize;

const _: () = {
    assert!(BOOT_CS32_SEL.encode() == CS_KERNEL32);
    assert!(BOOT_CS64_SEL.encode() == CS_KERNEL);
    assert!(BOOT_DS_SEL.encode() == DS_KERNEL);
    assert!(size_of::<BootGdt>() == BOOT_GDT_BYTES);
    assert!(BOOT_GDT_BYTES - 1 <= u16::MAX as usize);
};

/// The typed selectors of the bootstrap table.
#[derive(Copy, Clone, Debug)]
pub struct Selectors {
    pub code32: SegmentSelector<Code32Sel>,
    pub code64: SegmentSelector<CodeSel>,
    pub data: SegmentSelector<DataSel>,
}

impl Selectors {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            code32: BOOT_CS32_SEL,
            code64: BOOT_CS64_SEL,
            data: BOOT_DS_SEL,
        }
    }
}

impl Default for Selectors {
    fn default() -> Self {
        Self::new()
    }
}

/// A descriptor that does not match the slot its selector names.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GdtLayoutError {
    #[error("selector {selector:#06x} is outside the bootstrap GDT")]
    OutOfTable { selector: u16 },
    #[error("selector {selector:#06x} must name a {expected}, the table holds a {found}")]
    WrongKind {
        selector: u16,
        expected: DescriptorKind,
        found: DescriptorKind,
    },
    #[error("selector {selector:#06x} names a descriptor with DPL {dpl}, kernel segments need DPL 0")]
    WrongDpl { selector: u16, dpl: u8 },
    #[error("selector {selector:#06x} names a descriptor that is not present")]
    NotPresent { selector: u16 },
    #[error("selector {selector:#06x} names a read-only data segment, SS needs a writable one")]
    NotWritable { selector: u16 },
}

/// Pointer operand of `lgdt`.
///
/// In protected mode the CPU reads a 6-byte operand (32-bit base), in long
/// mode a 10-byte one.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct GdtPointer {
    /// Table size in bytes **minus one**.
    pub limit: u16,
    /// Linear address of the table.
    pub base: VirtualAddress,
}

impl GdtPointer {
    /// The 10-byte long-mode operand.
    #[must_use]
    pub const fn to_bytes(self) -> [u8; 10] {
        let limit = self.limit.to_le_bytes();
        let base = self.base.as_u64().to_le_bytes();
        [
            limit[0], limit[1], base[0], base[1], base[2], base[3], base[4], base[5], base[6],
            base[7],
        ]
    }

    /// The 6-byte protected-mode operand, if the base is below 4 GiB.
    #[must_use]
    pub fn to_bytes32(self) -> Option<[u8; 6]> {
        let base = u32::try_from(self.base.as_u64()).ok()?.to_le_bytes();
        let limit = self.limit.to_le_bytes();
        Some([limit[0], limit[1], base[0], base[1], base[2], base[3]])
    }
}

/// The bootstrap GDT.
#[repr(C, align(16))]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BootGdt {
    entries: [Desc64; BOOT_GDT_ENTRIES],
}

impl Default for BootGdt {
    fn default() -> Self {
        Self::new()
    }
}

impl BootGdt {
    /// Build the table for the selectors in `kernel_info::segments`.
    #[must_use]
    pub const fn new() -> Self {
        let mut entries = [Desc64::NULL; BOOT_GDT_ENTRIES];
        entries[BOOT_CS32_SEL.index() as usize] = Desc64::from_code32_dpl(Dpl::Ring0);
        entries[BOOT_CS64_SEL.index() as usize] = Desc64::from_code64_dpl(Dpl::Ring0);
        entries[BOOT_DS_SEL.index() as usize] = Desc64::from_data_dpl(Dpl::Ring0);
        Self { entries }
    }

    /// Wrap already-encoded entries, e.g. read back from a boot image.
    #[must_use]
    pub const fn from_raw(raw: [u64; BOOT_GDT_ENTRIES]) -> Self {
        let mut entries = [Desc64::NULL; BOOT_GDT_ENTRIES];
        let mut i = 0;
        while i < BOOT_GDT_ENTRIES {
            entries[i] = Desc64::from_u64(raw[i]);
            i += 1;
        }
        Self { entries }
    }

    #[must_use]
    pub fn entry(&self, index: usize) -> Option<Desc64> {
        self.entries.get(index).copied()
    }

    /// Classify the entry a raw selector points at.
    #[must_use]
    pub fn kind_at(&self, selector: u16) -> Option<DescriptorKind> {
        self.entry(usize::from(segments::selector_index(selector)))
            .map(Desc64::kind)
    }

    /// The table as it is laid out in memory.
    #[must_use]
    pub fn as_bytes(&self) -> [u8; BOOT_GDT_BYTES] {
        let mut out = [0u8; BOOT_GDT_BYTES];
        for (chunk, desc) in out
            .chunks_exact_mut(usize::from(DESCRIPTOR_SIZE))
            .zip(self.entries.iter())
        {
            chunk.copy_from_slice(&desc.to_u64().to_le_bytes());
        }
        out
    }

    /// The `lgdt` operand for this table placed at `base`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::unused_self)]
    pub const fn pointer(&self, base: VirtualAddress) -> GdtPointer {
        GdtPointer {
            limit: (BOOT_GDT_BYTES - 1) as u16,
            base,
        }
    }

    /// Check that every boot selector names a present ring 0 descriptor of
    /// the right kind, and that entry 0 is null.
    ///
    /// # Errors
    /// The first mismatching selector, in the order null, 32-bit code,
    /// 64-bit code, data.
    pub fn verify(&self) -> Result<(), GdtLayoutError> {
        let null = self.entries[0].kind();
        if null != DescriptorKind::Null {
            return Err(GdtLayoutError::WrongKind {
                selector: 0,
                expected: DescriptorKind::Null,
                found: null,
            });
        }

        self.check::<Code32Sel>(BOOT_CS32_SEL, DescriptorKind::Code32)?;
        self.check::<CodeSel>(BOOT_CS64_SEL, DescriptorKind::Code64)?;
        self.check::<DataSel>(BOOT_DS_SEL, DescriptorKind::Data)
    }

    fn check<K: SelectorKind>(
        &self,
        sel: SegmentSelector<K>,
        expected: DescriptorKind,
    ) -> Result<(), GdtLayoutError> {
        let selector = sel.encode();
        let desc = self
            .entry(usize::from(sel.index()))
            .ok_or(GdtLayoutError::OutOfTable { selector })?;

        let found = desc.kind();
        if found != expected {
            return Err(GdtLayoutError::WrongKind {
                selector,
                expected,
                found,
            });
        }
        if !desc.is_present() {
            return Err(GdtLayoutError::NotPresent { selector });
        }
        if expected == DescriptorKind::Data && !desc.is_writable_data() {
            return Err(GdtLayoutError::NotWritable { selector });
        }

        let dpl = desc.dpl();
        let loadable = match expected {
            DescriptorKind::Data => dpl.permits_data_load(Ring::Ring0, sel.rpl()),
            _ => dpl.permits_nonconforming_code(Ring::Ring0),
        };
        if !loadable || dpl != Dpl::Ring0 {
            return Err(GdtLayoutError::WrongDpl {
                selector,
                dpl: dpl.into_bits(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_sit_where_the_selectors_point() {
        let gdt = BootGdt::new();
        assert_eq!(gdt.kind_at(0), Some(DescriptorKind::Null));
        assert_eq!(gdt.kind_at(CS_KERNEL32), Some(DescriptorKind::Code32));
        assert_eq!(gdt.kind_at(CS_KERNEL), Some(DescriptorKind::Code64));
        assert_eq!(gdt.kind_at(DS_KERNEL), Some(DescriptorKind::Data));
        assert_eq!(gdt.kind_at(0x20), None);
        assert_eq!(gdt.verify(), Ok(()));
    }

    #[test]
    fn swapped_code_segments_are_rejected() {
        let good = BootGdt::new();
        let mut raw = [0u64; BOOT_GDT_ENTRIES];
        for (i, slot) in raw.iter_mut().enumerate() {
            *slot = good.entry(i).map_or(0, Desc64::to_u64);
        }
        raw.swap(1, 2);

        assert_eq!(
            BootGdt::from_raw(raw).verify(),
            Err(GdtLayoutError::WrongKind {
                selector: CS_KERNEL32,
                expected: DescriptorKind::Code32,
                found: DescriptorKind::Code64,
            })
        );
    }

    #[test]
    fn user_dpl_and_missing_present_bit_are_rejected() {
        let mut raw = [
            0,
            Desc64::from_code32_dpl(Dpl::Ring0).to_u64(),
            Desc64::from_code64_dpl(Dpl::Ring3).to_u64(),
            Desc64::from_data_dpl(Dpl::Ring0).to_u64(),
        ];
        assert_eq!(
            BootGdt::from_raw(raw).verify(),
            Err(GdtLayoutError::WrongDpl {
                selector: CS_KERNEL,
                dpl: 3
            })
        );

        raw[2] = Desc64::from_code64_dpl(Dpl::Ring0).to_u64() & !(1 << 47);
        assert_eq!(
            BootGdt::from_raw(raw).verify(),
            Err(GdtLayoutError::NotPresent {
                selector: CS_KERNEL
            })
        );
    }

    #[test]
    fn read_only_data_segment_is_rejected() {
        let raw = [
            0,
            Desc64::from_code32_dpl(Dpl::Ring0).to_u64(),
            Desc64::from_code64_dpl(Dpl::Ring0).to_u64(),
            0x00CF_9000_0000_FFFF,
        ];
        assert_eq!(
            BootGdt::from_raw(raw).verify(),
            Err(GdtLayoutError::NotWritable {
                selector: DS_KERNEL
            })
        );
    }

    #[test]
    fn bytes_and_pointer_layout() {
        let gdt = BootGdt::new();
        let bytes = gdt.as_bytes();
        assert_eq!(&bytes[..8], &[0; 8]);
        assert_eq!(&bytes[8..16], &0x00CF_9A00_0000_FFFF_u64.to_le_bytes());
        assert_eq!(&bytes[16..24], &0x0020_9A00_0000_0000_u64.to_le_bytes());

        let ptr = gdt.pointer(VirtualAddress::new(0x0010_1000));
        assert_eq!(ptr.limit, 31);
        assert_eq!(ptr.to_bytes32(), Some([31, 0, 0x00, 0x10, 0x10, 0x00]));
        assert_eq!(&ptr.to_bytes()[..4], &[31, 0, 0x00, 0x10]);

        let high = gdt.pointer(VirtualAddress::new(0xffff_ffff_8010_1000));
        assert_eq!(high.to_bytes32(), None);
        assert_eq!(&high.to_bytes()[2..], &0xffff_ffff_8010_1000_u64.to_le_bytes());
    }

    #[test]
    fn selectors_struct_matches_constants() {
        let sel = Selectors::default();
        assert_eq!(u16::from(sel.code32), CS_KERNEL32);
        assert_eq!(u16::from(sel.code64), CS_KERNEL);
        assert_eq!(u16::from(sel.data), DS_KERNEL);
    }
}
