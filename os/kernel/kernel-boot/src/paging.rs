//! # Boot mapping plan
//!
//! Which mappings the early page tables must contain at the moment the CPU
//! jumps from the identity-mapped stub to `KERNEL_LOCATION`:
//!
//! ```text
//!  virtual                          physical
//!  [0, 2 MiB)                  ──▶  [0, 2 MiB)            identity (stub keeps running)
//!  [VMA + 0, VMA + len)        ──▶  [0, len)              higher half (kernel image)
//! ```
//!
//! Both windows are built from 2 MiB leaves. The higher-half window starts
//! at the large page that holds `KERNEL_LMA_BASE` and is extended until it
//! covers the whole image, so it always contains the entry address.
//!
//! This module only *plans*; writing the tables is up to the caller.

use kernel_info::memory::{
    IDENTITY_LOW_BYTES, KERNEL_IMAGE_MAX, LARGE_PAGE_SIZE, entry_address, physical_load_address,
    virt_of_phys,
};
use kernel_memory_addresses::{PhysicalAddress, Size2M, VirtualAddress, checked_align_up};

/// Entries per paging structure.
const ENTRIES: u64 = 512;

/// Indices of a virtual address into the four paging levels.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TableIndices {
    pub pml4: u16,
    pub pdpt: u16,
    pub pd: u16,
    pub pt: u16,
}

impl TableIndices {
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn of(va: VirtualAddress) -> Self {
        let v = va.as_u64();
        Self {
            pml4: ((v >> 39) % ENTRIES) as u16,
            pdpt: ((v >> 30) % ENTRIES) as u16,
            pd: ((v >> 21) % ENTRIES) as u16,
            pt: ((v >> 12) % ENTRIES) as u16,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RegionKind {
    /// Virtual equals physical.
    Identity,
    /// Kernel image alias at `KERNEL_VMA_BASE + phys`.
    HigherHalf,
}

/// One contiguous run of 2 MiB mappings.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MappingRegion {
    pub virt: VirtualAddress,
    pub phys: PhysicalAddress,
    pub len: u64,
    pub kind: RegionKind,
}

impl MappingRegion {
    #[must_use]
    pub const fn contains(&self, va: VirtualAddress) -> bool {
        match va.as_u64().checked_sub(self.virt.as_u64()) {
            Some(off) => off < self.len,
            None => false,
        }
    }

    #[must_use]
    pub const fn translate(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        if !self.contains(va) {
            return None;
        }
        self.phys.checked_add(va.as_u64() - self.virt.as_u64())
    }

    /// The 2 MiB leaves of this region.
    pub fn large_pages(self) -> impl Iterator<Item = (VirtualAddress, PhysicalAddress)> {
        let (virt, phys) = (self.virt.as_u64(), self.phys.as_u64());
        (0..self.len / LARGE_PAGE_SIZE).map(move |i| {
            let off = i * LARGE_PAGE_SIZE;
            (VirtualAddress::new(virt + off), PhysicalAddress::new(phys + off))
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("kernel image is empty")]
    EmptyImage,
    #[error("kernel image of {size:#x} bytes exceeds the {max:#x}-byte higher-half slot")]
    ImageTooLarge { size: u64, max: u64 },
    #[error("kernel image end overflows the address space")]
    AddressOverflow,
}

/// The two windows early paging must install.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BootMappingPlan {
    identity: MappingRegion,
    higher_half: MappingRegion,
    image_size: u64,
}

impl BootMappingPlan {
    /// Plan the mappings for a kernel image of `image_size` bytes loaded at
    /// `KERNEL_LMA_BASE`.
    ///
    /// # Errors
    /// [`PlanError::EmptyImage`] for a zero size, [`PlanError::ImageTooLarge`]
    /// if the image would leave the 1 GiB slot at `KERNEL_VMA_BASE`.
    pub fn for_image(image_size: u64) -> Result<Self, PlanError> {
        if image_size == 0 {
            return Err(PlanError::EmptyImage);
        }
        if image_size > KERNEL_IMAGE_MAX {
            return Err(PlanError::ImageTooLarge {
                size: image_size,
                max: KERNEL_IMAGE_MAX,
            });
        }

        let load = physical_load_address();
        let phys_start = load.align_down::<Size2M>();
        let phys_end = load
            .as_u64()
            .checked_add(image_size)
            .and_then(checked_align_up::<Size2M>)
            .ok_or(PlanError::AddressOverflow)?;
        let virt_start = virt_of_phys(phys_start).ok_or(PlanError::AddressOverflow)?;

        let higher_half = MappingRegion {
            virt: virt_start,
            phys: phys_start,
            len: phys_end - phys_start.as_u64(),
            kind: RegionKind::HigherHalf,
        };
        virt_start
            .checked_add(higher_half.len - 1)
            .ok_or(PlanError::AddressOverflow)?;

        let identity = MappingRegion {
            virt: VirtualAddress::zero(),
            phys: PhysicalAddress::zero(),
            len: IDENTITY_LOW_BYTES,
            kind: RegionKind::Identity,
        };

        Ok(Self {
            identity,
            higher_half,
            image_size,
        })
    }

    #[must_use]
    pub const fn identity(&self) -> &MappingRegion {
        &self.identity
    }

    #[must_use]
    pub const fn higher_half(&self) -> &MappingRegion {
        &self.higher_half
    }

    #[must_use]
    pub const fn image_size(&self) -> u64 {
        self.image_size
    }

    #[must_use]
    pub const fn regions(&self) -> [MappingRegion; 2] {
        [self.identity, self.higher_half]
    }

    /// Resolve `va` through the planned mappings.
    #[must_use]
    pub fn translate(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        self.regions().iter().find_map(|r| r.translate(va))
    }

    /// Whether the kernel entry point resolves to its load address.
    #[must_use]
    pub fn maps_entry(&self) -> bool {
        self.translate(entry_address()) == Some(physical_load_address())
    }

    /// Every 2 MiB leaf of the plan, identity window first.
    pub fn large_pages(
        &self,
    ) -> impl Iterator<Item = (RegionKind, VirtualAddress, PhysicalAddress)> {
        self.regions()
            .into_iter()
            .flat_map(|r| r.large_pages().map(move |(va, pa)| (r.kind, va, pa)))
    }

    #[must_use]
    pub const fn large_page_count(&self) -> u64 {
        (self.identity.len + self.higher_half.len) / LARGE_PAGE_SIZE
    }
}
