use crate::{MemoryAddress, PageSize};
use core::fmt;

/// Virtual memory address.
///
/// A thin wrapper around [`MemoryAddress`] that denotes **virtual** addresses.
/// Construction does not validate canonicality; call
/// [`is_canonical`](Self::is_canonical) or use [`new_canonical`](Self::new_canonical)
/// where the value comes from arithmetic rather than from a constant.
///
/// ### Invariants
/// - No invariant beyond “this is intended to be a virtual address”.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let va = VirtualAddress::new(0xFFFF_FFFF_8000_1234);
/// assert!(va.is_canonical());
/// assert_eq!(va.offset::<Size4K>(), 0x234);
/// assert_eq!(VirtualAddress::new_canonical(0x0000_8000_0000_0000), None);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualAddress(MemoryAddress);

impl VirtualAddress {
    #[inline]
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(MemoryAddress::new(v))
    }

    /// Like [`new`](Self::new), but rejects non-canonical values.
    #[inline]
    #[must_use]
    pub const fn new_canonical(v: u64) -> Option<Self> {
        if crate::is_canonical(v) {
            Some(Self::new(v))
        } else {
            None
        }
    }

    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self::new(0)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0.as_u64()
    }

    #[inline]
    #[must_use]
    pub const fn as_addr(self) -> MemoryAddress {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn is_canonical(self) -> bool {
        crate::is_canonical(self.as_u64())
    }

    #[inline]
    #[must_use]
    pub const fn is_higher_half(self) -> bool {
        crate::is_higher_half(self.as_u64())
    }

    #[inline]
    #[must_use]
    pub const fn align_down<S: PageSize>(self) -> Self {
        Self(self.0.align_down::<S>())
    }

    #[inline]
    #[must_use]
    pub const fn offset<S: PageSize>(self) -> u64 {
        self.0.offset::<S>()
    }

    #[inline]
    #[must_use]
    pub const fn is_aligned<S: PageSize>(self) -> bool {
        self.0.is_aligned::<S>()
    }

    /// Checked add that also rejects results in the non-canonical hole.
    #[inline]
    #[must_use]
    pub const fn checked_add(self, rhs: u64) -> Option<Self> {
        match self.0.checked_add(rhs) {
            Some(a) => Self::new_canonical(a.as_u64()),
            None => None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn checked_sub(self, rhs: u64) -> Option<Self> {
        match self.0.checked_sub(rhs) {
            Some(a) => Self::new_canonical(a.as_u64()),
            None => None,
        }
    }
}

impl fmt::Debug for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VA(0x{:016X})", self.as_u64())
    }
}

impl fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.as_u64())
    }
}

impl From<u64> for VirtualAddress {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}
