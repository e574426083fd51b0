//! # Typed segment selectors
//!
//! ```text
//!  15            3 2  1  0
//! +----------------+--+----+
//! |   Index[12:0]  |TI| RPL|
//! +----------------+--+----+  (TI=0 → GDT, TI=1 → LDT; RPL=0..3)
//! ```
//!
//! The boot path loads three selectors and loading any of them into the
//! wrong register is fatal: `CS_KERNEL32` must only ever reach `CS` before the
//! long-mode switch, `CS_KERNEL` only in the far jump afterwards, and the data
//! selector never belongs in `CS` at all. The marker types below make those
//! mix-ups a type error.

use crate::privilege::Rpl;
use bitfield_struct::bitfield;
use core::fmt;
use core::marker::PhantomData;

/// Which descriptor table a selector addresses.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[repr(u8)]
pub enum Table {
    /// Global Descriptor Table
    Gdt = 0,
    /// Local Descriptor Table
    Ldt = 1,
}

impl Table {
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        if bits == 0 { Self::Gdt } else { Self::Ldt }
    }

    #[inline]
    #[must_use]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }
}

/// Raw 16-bit selector encoding (index/TI/RPL).
#[bitfield(u16)]
#[derive(Eq, PartialEq)]
pub struct SegmentSelectorRaw {
    /// Requested Privilege Level (bits 0..1).
    #[bits(2)]
    pub rpl: Rpl,
    /// Table Indicator (bit 2).
    #[bits(1)]
    pub ti: Table,
    /// Descriptor index (bits 3..15).
    #[bits(13)]
    pub index: u16,
}

impl SegmentSelectorRaw {
    /// Create a raw selector (no semantic checks).
    #[inline]
    #[must_use]
    pub const fn new_with(index: u16, table: Table, rpl: Rpl) -> Self {
        Self::new().with_index(index).with_ti(table).with_rpl(rpl)
    }
}

/// Marker trait for typed selectors.
pub trait SelectorKind: Copy {
    /// Register class, used in diagnostics.
    const NAME: &'static str;
}

/// Protected-mode code selector, only valid in `CS` before the long-mode jump.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Code32Sel {}

/// Long-mode code selector.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum CodeSel {}

/// Data/stack (DS/ES/SS) selector.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum DataSel {}

impl SelectorKind for Code32Sel {
    const NAME: &'static str = "code32";
}
impl SelectorKind for CodeSel {
    const NAME: &'static str = "code64";
}
impl SelectorKind for DataSel {
    const NAME: &'static str = "data";
}

/// Strongly-typed GDT selector.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct SegmentSelector<K: SelectorKind>(SegmentSelectorRaw, PhantomData<K>);

impl<K: SelectorKind> SegmentSelector<K> {
    /// Create a GDT selector from an entry index and RPL.
    #[inline]
    #[must_use]
    pub const fn new(index: u16, rpl: Rpl) -> Self {
        Self(
            SegmentSelectorRaw::new_with(index, Table::Gdt, rpl),
            PhantomData,
        )
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> SegmentSelectorRaw {
        self.0
    }

    /// Encode as the `u16` the CPU loads.
    #[inline]
    #[must_use]
    pub const fn encode(self) -> u16 {
        self.0.into_bits()
    }

    #[inline]
    #[must_use]
    pub const fn index(self) -> u16 {
        self.0.index()
    }

    #[inline]
    #[must_use]
    pub const fn rpl(self) -> Rpl {
        self.0.rpl()
    }
}

impl<K: SelectorKind> fmt::Debug for SegmentSelector<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:#06x})", K::NAME, self.encode())
    }
}

impl<K: SelectorKind> From<SegmentSelector<K>> for u16 {
    fn from(sel: SegmentSelector<K>) -> Self {
        sel.encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_places_index_ti_and_rpl() {
        let sel = SegmentSelector::<CodeSel>::new(2, Rpl::Ring0);
        assert_eq!(sel.encode(), 0x10);
        assert_eq!(sel.index(), 2);
        assert_eq!(sel.raw().ti(), Table::Gdt);

        let user = SegmentSelector::<DataSel>::new(4, Rpl::Ring3);
        assert_eq!(user.encode(), 0x23);
        assert_eq!(user.rpl(), Rpl::Ring3);

        let ldt = SegmentSelectorRaw::new_with(1, Table::Ldt, Rpl::Ring0);
        assert_eq!(ldt.into_bits(), 0x0c);
    }

    #[test]
    fn debug_names_the_register_class() {
        let sel = SegmentSelector::<Code32Sel>::new(1, Rpl::Ring0);
        assert_eq!(format!("{sel:?}"), "code32(0x0008)");
    }
}
