//! # Code and data descriptor encodings
//!
//! The bootstrap GDT has to serve two CPU modes. The 32-bit stub runs under
//! `CS_KERNEL32` with a flat 4 GiB code segment, then far-jumps through
//! `CS_KERNEL` into a 64-bit code segment. Base and limit still matter for the
//! 32-bit descriptors; in long mode the CPU ignores them and only looks at:
//!
//! - **Type** (code vs data, readable/writable),
//! - **S** (code/data vs system),
//! - **DPL**, **P**,
//! - **L** and **DB** (`L=1, DB=0` for 64-bit code, `L=0, DB=1` for 32-bit code).
//!
//! [`DescriptorKind`] is the inverse: it classifies an encoded entry so a
//! table can be checked after it has been built.

use crate::privilege::Dpl;
use bitfield_struct::bitfield;
use core::fmt;

/// Type nibble of an execute/read code segment.
pub const TYPE_CODE_EXEC_READ: u8 = 0b1010;

/// Type nibble of a read/write data segment.
pub const TYPE_DATA_READ_WRITE: u8 = 0b0010;

/// Executable bit inside the type nibble.
const TYPE_EXECUTABLE: u8 = 0b1000;

/// Writable bit inside the type nibble of a data segment.
const TYPE_WRITABLE: u8 = 0b0010;

/// Bit layout shared by code and data segment descriptors.
#[bitfield(u64)]
#[derive(Eq, PartialEq)]
pub struct SegmentDescBits {
    pub limit_lo: u16, // [15:0]
    pub base_lo: u16,  // [31:16]
    pub base_mid: u8,  // [39:32]
    #[bits(4)]
    pub typ: u8, // [43:40]
    pub s: bool,       // [44]     = 1 (code/data)
    #[bits(2)]
    pub dpl: u8, // [46:45]
    pub p: bool,       // [47]
    #[bits(4)]
    pub limit_hi: u8, // [51:48]
    pub avl: bool,     // [52]
    pub l: bool,       // [53]     64-bit code
    pub db: bool,      // [54]     32-bit default operand size
    pub g: bool,       // [55]     4 KiB limit granularity
    pub base_hi: u8,   // [63:56]
}

/// What an encoded descriptor describes.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum DescriptorKind {
    /// The all-zero entry.
    Null,
    /// 32-bit protected-mode code (`L=0`, `DB=1`).
    Code32,
    /// 64-bit long-mode code (`L=1`, `DB=0`).
    Code64,
    /// Data or stack segment.
    Data,
    /// System descriptors, 16-bit code and the reserved `L=1, DB=1` encoding.
    Other,
}

impl fmt::Display for DescriptorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Null => "null descriptor",
            Self::Code32 => "32-bit code segment",
            Self::Code64 => "64-bit code segment",
            Self::Data => "data segment",
            Self::Other => "non code/data descriptor",
        })
    }
}

/// A single 8-byte GDT entry.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Desc64(SegmentDescBits);

impl Desc64 {
    /// The mandatory null descriptor at index 0.
    pub const NULL: Self = Self(SegmentDescBits::new());

    /// Flat 4 GiB segment skeleton: base 0, limit `0xFFFFF` pages, present.
    const fn flat(typ: u8, dpl: Dpl) -> SegmentDescBits {
        SegmentDescBits::new()
            .with_limit_lo(0xFFFF)
            .with_typ(typ)
            .with_s(true)
            .with_dpl(dpl.into_bits())
            .with_p(true)
            .with_limit_hi(0xF)
            .with_g(true)
    }

    /// Build a **32-bit code** descriptor (execute+read, `L=0`, `DB=1`, flat).
    #[must_use]
    pub const fn from_code32_dpl(dpl: Dpl) -> Self {
        Self(Self::flat(TYPE_CODE_EXEC_READ, dpl).with_db(true))
    }

    /// Build a **64-bit code** descriptor (execute+read, `L=1`, `DB=0`).
    ///
    /// Base and limit are left zero; long mode ignores them.
    #[must_use]
    pub const fn from_code64_dpl(dpl: Dpl) -> Self {
        Self(
            SegmentDescBits::new()
                .with_typ(TYPE_CODE_EXEC_READ)
                .with_s(true)
                .with_dpl(dpl.into_bits())
                .with_p(true)
                .with_l(true)
                .with_db(false),
        )
    }

    /// Build a **data/stack** descriptor (read/write, flat, `DB=1`).
    ///
    /// The 32-bit stub loads `DS`/`SS` from this entry before paging is on,
    /// so it keeps a full 4 GiB limit.
    #[must_use]
    pub const fn from_data_dpl(dpl: Dpl) -> Self {
        Self(Self::flat(TYPE_DATA_READ_WRITE, dpl).with_db(true))
    }

    #[inline]
    #[must_use]
    pub const fn from_u64(raw: u64) -> Self {
        Self(SegmentDescBits::from_bits(raw))
    }

    /// Raw 64-bit encoding.
    #[inline]
    #[must_use]
    pub const fn to_u64(self) -> u64 {
        self.0.into_bits()
    }

    #[inline]
    #[must_use]
    pub const fn bits(self) -> SegmentDescBits {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn dpl(self) -> Dpl {
        Dpl::from_bits(self.0.dpl())
    }

    #[inline]
    #[must_use]
    pub const fn is_present(self) -> bool {
        self.0.p()
    }

    /// Whether a data segment allows writes, as `SS` requires.
    #[inline]
    #[must_use]
    pub const fn is_writable_data(self) -> bool {
        self.0.s() && self.0.typ() & TYPE_EXECUTABLE == 0 && self.0.typ() & TYPE_WRITABLE != 0
    }

    /// Classify the encoded entry.
    #[must_use]
    pub const fn kind(self) -> DescriptorKind {
        let bits = self.0;
        if bits.into_bits() == 0 {
            return DescriptorKind::Null;
        }
        if !bits.s() {
            return DescriptorKind::Other;
        }
        if bits.typ() & TYPE_EXECUTABLE == 0 {
            return DescriptorKind::Data;
        }
        match (bits.l(), bits.db()) {
            (true, false) => DescriptorKind::Code64,
            (false, true) => DescriptorKind::Code32,
            _ => DescriptorKind::Other,
        }
    }
}

impl fmt::Debug for Desc64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Desc64({:#018x}, {:?})", self.to_u64(), self.kind())
    }
}

const _: () = {
    assert!(size_of::<SegmentDescBits>() == 8);
    assert!(size_of::<Desc64>() == 8);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodings_match_the_usual_flat_values() {
        assert_eq!(
            Desc64::from_code32_dpl(Dpl::Ring0).to_u64(),
            0x00CF_9A00_0000_FFFF
        );
        assert_eq!(
            Desc64::from_code64_dpl(Dpl::Ring0).to_u64(),
            0x0020_9A00_0000_0000
        );
        assert_eq!(
            Desc64::from_data_dpl(Dpl::Ring0).to_u64(),
            0x00CF_9200_0000_FFFF
        );
        assert_eq!(Desc64::NULL.to_u64(), 0);
    }

    #[test]
    fn kind_classifies_built_descriptors() {
        assert_eq!(Desc64::NULL.kind(), DescriptorKind::Null);
        assert_eq!(
            Desc64::from_code32_dpl(Dpl::Ring0).kind(),
            DescriptorKind::Code32
        );
        assert_eq!(
            Desc64::from_code64_dpl(Dpl::Ring0).kind(),
            DescriptorKind::Code64
        );
        assert_eq!(
            Desc64::from_data_dpl(Dpl::Ring3).kind(),
            DescriptorKind::Data
        );
    }

    #[test]
    fn kind_rejects_reserved_and_system_encodings() {
        // L=1 and DB=1 together is reserved
        let both = Desc64::from_u64(0x0060_9A00_0000_0000);
        assert_eq!(both.kind(), DescriptorKind::Other);

        // 16-bit code: L=0, DB=0
        let real_mode = Desc64::from_u64(0x0000_9A00_0000_FFFF);
        assert_eq!(real_mode.kind(), DescriptorKind::Other);

        // available 64-bit TSS, S=0
        let tss = Desc64::from_u64(0x0000_8900_0000_0067);
        assert_eq!(tss.kind(), DescriptorKind::Other);
    }

    #[test]
    fn read_only_data_is_still_data_but_not_writable() {
        let read_only = Desc64::from_u64(0x00CF_9000_0000_FFFF);
        assert_eq!(read_only.kind(), DescriptorKind::Data);
        assert!(!read_only.is_writable_data());
        assert!(Desc64::from_data_dpl(Dpl::Ring0).is_writable_data());
        assert!(!Desc64::from_code32_dpl(Dpl::Ring0).is_writable_data());
    }

    #[test]
    fn dpl_and_present_bits_decode() {
        let user = Desc64::from_code64_dpl(Dpl::Ring3);
        assert_eq!(user.dpl(), Dpl::Ring3);
        assert!(user.is_present());
        assert!(!Desc64::NULL.is_present());
    }
}
