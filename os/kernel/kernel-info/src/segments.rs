//! # Bootstrap Segment Selectors
//!
//! Selector values the boot code loads while switching into long mode. They
//! fix the *order* of the bootstrap GDT; whoever builds that table must place
//! a descriptor of the matching kind at `selector >> 3`.
//!
//! ```text
//!  15            3 2  1  0
//! +----------------+--+----+
//! |   Index[12:0]  |TI| RPL|
//! +----------------+--+----+
//! ```
//!
//! Index | Selector | Descriptor                          | Loaded
//! ------|----------|-------------------------------------|-------------------------------
//! 0     | 0x00     | Null                                | never
//! 1     | 0x08     | 32-bit code, DPL=0 ([`CS_KERNEL32`]) | protected mode, before `EFER.LME`
//! 2     | 0x10     | 64-bit code, DPL=0 ([`CS_KERNEL`])   | by the far jump that enters long mode
//! 3     | 0x18     | Data/stack, DPL=0 ([`DS_KERNEL`])    | DS/ES/SS after the far jump

/// Bit position of the descriptor index inside a selector.
pub const SELECTOR_INDEX_SHIFT: u16 = 3;

/// Requested Privilege Level bits.
pub const SELECTOR_RPL_MASK: u16 = 0b11;

/// Table Indicator bit (0 = GDT, 1 = LDT).
pub const SELECTOR_TI_BIT: u16 = 0b100;

/// Size of one legacy descriptor in bytes.
pub const DESCRIPTOR_SIZE: u16 = 8;

/// Protected-mode (compatibility) kernel code segment.
pub const CS_KERNEL32: u16 = 0x08;

/// Long-mode kernel code segment. Loaded only through the far jump or far
/// return that completes the switch into 64-bit mode.
pub const CS_KERNEL: u16 = 0x10;

/// Kernel data/stack segment for DS/ES/SS.
pub const DS_KERNEL: u16 = 0x18;

pub const CS_KERNEL32_INDEX: u16 = CS_KERNEL32 >> SELECTOR_INDEX_SHIFT;
pub const CS_KERNEL_INDEX: u16 = CS_KERNEL >> SELECTOR_INDEX_SHIFT;
pub const DS_KERNEL_INDEX: u16 = DS_KERNEL >> SELECTOR_INDEX_SHIFT;

/// Number of 8-byte slots in the bootstrap GDT (null included).
pub const BOOT_GDT_ENTRIES: usize = 4;

/// Selector that must be loaded into CS before long mode is enabled.
#[inline]
#[must_use]
pub const fn code32_selector() -> u16 {
    CS_KERNEL32
}

/// Selector the long-mode far jump must load into CS.
#[inline]
#[must_use]
pub const fn code64_selector() -> u16 {
    CS_KERNEL
}

/// Descriptor index a selector refers to.
#[inline]
#[must_use]
pub const fn selector_index(selector: u16) -> u16 {
    selector >> SELECTOR_INDEX_SHIFT
}

/// Requested privilege level carried in a selector.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn selector_rpl(selector: u16) -> u8 {
    (selector & SELECTOR_RPL_MASK) as u8
}

/// Whether a selector addresses the LDT instead of the GDT.
#[inline]
#[must_use]
pub const fn selector_uses_ldt(selector: u16) -> bool {
    selector & SELECTOR_TI_BIT != 0
}

/// Byte offset of a selector's descriptor inside its table.
#[inline]
#[must_use]
pub const fn descriptor_offset(selector: u16) -> u16 {
    selector & !(SELECTOR_RPL_MASK | SELECTOR_TI_BIT)
}

/// The selectors of the contract, in table order.
pub const BOOT_SELECTORS: [u16; 3] = [CS_KERNEL32, CS_KERNEL, DS_KERNEL];

#[allow(clippy::cast_possible_truncation)]
const _: () = {
    assert!(CS_KERNEL32 != 0 && CS_KERNEL != 0 && DS_KERNEL != 0);
    assert!(CS_KERNEL32 != CS_KERNEL);
    assert!(CS_KERNEL32 % DESCRIPTOR_SIZE == 0);
    assert!(CS_KERNEL % DESCRIPTOR_SIZE == 0);
    assert!(DS_KERNEL % DESCRIPTOR_SIZE == 0);

    assert!(CS_KERNEL32_INDEX == 1);
    assert!(CS_KERNEL_INDEX == 2);
    assert!(DS_KERNEL_INDEX == 3);
    assert!((DS_KERNEL_INDEX as usize) < BOOT_GDT_ENTRIES);
};
