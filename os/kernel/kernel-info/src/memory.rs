//! # Memory Layout
//!
//! Physical load address (LMA) and virtual execution address (VMA) of the
//! kernel image. The linker script generated by the kernel's `build.rs`, the
//! early page tables and the jump into the higher half all read these values;
//! none of them may carry its own copy.
//!
//! ```text
//!  physical                               virtual
//!  0x0000_0000 ┌────────────┐             ┌────────────┐ KERNEL_VMA_BASE
//!              │ low memory │             │            │ 0xffff_ffff_8000_0000
//!  0x0010_0000 ├────────────┤ ─── +VMA ──▶├────────────┤ KERNEL_LOCATION
//!  LMA_BASE    │   kernel   │             │   kernel   │ 0xffff_ffff_8010_0000
//!              │   image    │             │   image    │
//!              └────────────┘             └────────────┘
//! ```

use kernel_memory_addresses::{
    PageSize, PhysicalAddress, Size1G, Size2M, Size4K, VirtualAddress, is_aligned, is_canonical,
    is_higher_half,
};

/// Where the loader places the kernel bytes in *physical* memory (LMA).
///
/// 1 MiB keeps the image clear of the BIOS data area, VGA memory and
/// option ROMs.
///
/// # Kernel Build
/// This is emitted into the linker script by the kernel's `build.rs`.
pub const KERNEL_LMA_BASE: u64 = 0x0010_0000;

/// Base of the canonical higher half the kernel executes in (VMA).
///
/// The top 2 GiB of the address space; code linked here can use the
/// `kernel` code model (sign-extended 32-bit displacements).
///
/// # Kernel Build
/// This is emitted into the linker script by the kernel's `build.rs`.
pub const KERNEL_VMA_BASE: u64 = 0xffff_ffff_8000_0000;

/// Virtual address of the kernel entry point after relocation.
///
/// Only correct because the image is linked at `KERNEL_VMA_BASE` plus its
/// physical offset. Never choose this independently of the two bases.
pub const KERNEL_LOCATION: u64 = KERNEL_VMA_BASE + KERNEL_LMA_BASE;

/// Page granule both bases must be aligned to.
pub const PAGE_SIZE: u64 = Size4K::SIZE;

/// Leaf size used by the boot page tables.
pub const LARGE_PAGE_SIZE: u64 = Size2M::SIZE;

/// Low identity window kept mapped so the paging switch code keeps
/// executing right after the `CR3` reload.
pub const IDENTITY_LOW_BYTES: u64 = LARGE_PAGE_SIZE;

/// Largest image that fits behind `KERNEL_LOCATION` without leaving the
/// 1 GiB slot that starts at `KERNEL_VMA_BASE`.
pub const KERNEL_IMAGE_MAX: u64 = Size1G::SIZE - KERNEL_LMA_BASE;

/// Resolve the physical load address of the kernel image.
#[inline]
#[must_use]
pub const fn physical_load_address() -> PhysicalAddress {
    PhysicalAddress::new(KERNEL_LMA_BASE)
}

/// Resolve the virtual base the higher-half mapping starts at.
#[inline]
#[must_use]
pub const fn virtual_execution_base() -> VirtualAddress {
    VirtualAddress::new(KERNEL_VMA_BASE)
}

/// Resolve the address execution must reach after leaving the identity map.
#[inline]
#[must_use]
pub const fn entry_address() -> VirtualAddress {
    VirtualAddress::new(KERNEL_LOCATION)
}

/// Higher-half alias of a physical address, `None` if it overflows or lands
/// outside canonical space.
///
/// ```rust
/// # use kernel_info::memory::*;
/// assert_eq!(virt_of_phys(physical_load_address()), Some(entry_address()));
/// ```
#[inline]
#[must_use]
pub const fn virt_of_phys(pa: PhysicalAddress) -> Option<VirtualAddress> {
    virtual_execution_base().checked_add(pa.as_u64())
}

/// Physical address behind a higher-half kernel address.
///
/// ```rust
/// # use kernel_info::memory::*;
/// assert_eq!(phys_of_virt(entry_address()), Some(physical_load_address()));
/// ```
#[inline]
#[must_use]
pub const fn phys_of_virt(va: VirtualAddress) -> Option<PhysicalAddress> {
    match va.as_u64().checked_sub(KERNEL_VMA_BASE) {
        Some(pa) => Some(PhysicalAddress::new(pa)),
        None => None,
    }
}

const _: () = {
    assert!(KERNEL_VMA_BASE.checked_add(KERNEL_LMA_BASE).is_some());
    assert!(KERNEL_LOCATION == 0xffff_ffff_8010_0000);

    assert!(is_aligned::<Size4K>(KERNEL_LMA_BASE));
    assert!(is_aligned::<Size2M>(KERNEL_VMA_BASE));

    assert!(is_canonical(KERNEL_VMA_BASE));
    assert!(is_canonical(KERNEL_LOCATION));
    assert!(is_higher_half(KERNEL_VMA_BASE));

    assert!(KERNEL_LMA_BASE < IDENTITY_LOW_BYTES);
    assert!(IDENTITY_LOW_BYTES.is_multiple_of(LARGE_PAGE_SIZE));
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_is_sum_of_bases() {
        assert_eq!(
            KERNEL_VMA_BASE.checked_add(KERNEL_LMA_BASE),
            Some(KERNEL_LOCATION)
        );
        assert_eq!(KERNEL_LOCATION, 0xffff_ffff_8010_0000);
    }

    #[test]
    fn bases_are_page_aligned() {
        assert_eq!(KERNEL_LMA_BASE % PAGE_SIZE, 0);
        assert_eq!(KERNEL_VMA_BASE % PAGE_SIZE, 0);
    }

    #[test]
    fn vma_base_is_canonical_higher_half() {
        assert!(virtual_execution_base().is_canonical());
        assert!(virtual_execution_base().is_higher_half());
        assert!(entry_address().is_canonical());
    }

    #[test]
    fn virt_phys_translation_roundtrips_inside_image() {
        let pa = PhysicalAddress::new(KERNEL_LMA_BASE + 0x1234);
        let va = virt_of_phys(pa).unwrap();
        assert_eq!(va.as_u64(), KERNEL_LOCATION + 0x1234);
        assert_eq!(phys_of_virt(va), Some(pa));
    }

    #[test]
    fn phys_of_virt_rejects_lower_half() {
        assert_eq!(phys_of_virt(VirtualAddress::new(KERNEL_LMA_BASE)), None);
    }

    #[test]
    fn virt_of_phys_rejects_wraparound() {
        assert_eq!(virt_of_phys(PhysicalAddress::new(0x8000_0000)), None);
    }
}
