use kernel_boot::gdt::descriptors::DescriptorKind;
use kernel_boot::gdt::{BOOT_GDT_BYTES, BootGdt};
use kernel_boot::linker::{KERNEL_LD, generated_layout};
use kernel_boot::paging::{BootMappingPlan, RegionKind};
use kernel_boot::{BootContractError, check_boot_contract};
use kernel_info::memory::{KERNEL_IMAGE_MAX, entry_address, physical_load_address};
use kernel_info::segments::{CS_KERNEL, CS_KERNEL32};

#[test]
fn gdt_slots_follow_the_selectors() {
    let gdt = BootGdt::new();
    assert_eq!(gdt.entry(1).map(|d| d.kind()), Some(DescriptorKind::Code32));
    assert_eq!(gdt.entry(2).map(|d| d.kind()), Some(DescriptorKind::Code64));
    assert_eq!(gdt.kind_at(CS_KERNEL32), Some(DescriptorKind::Code32));
    assert_eq!(gdt.kind_at(CS_KERNEL), Some(DescriptorKind::Code64));
    assert_eq!(gdt.as_bytes().len(), BOOT_GDT_BYTES);
}

#[test]
fn generated_script_agrees_with_the_plan() {
    let layout = generated_layout().unwrap();
    let plan = BootMappingPlan::for_image(0x8_0000).unwrap();
    assert_eq!(
        plan.translate(layout.entry.into()),
        Some(physical_load_address())
    );
    assert!(KERNEL_LD.contains(". = KERNEL_LOCATION;"));
}

#[test]
fn every_higher_half_leaf_is_an_alias_of_its_frame() {
    let plan = BootMappingPlan::for_image(5 * 1024 * 1024).unwrap();
    for (kind, va, pa) in plan.large_pages() {
        match kind {
            RegionKind::Identity => assert_eq!(va.as_u64(), pa.as_u64()),
            RegionKind::HigherHalf => {
                assert_eq!(kernel_info::memory::phys_of_virt(va), Some(pa));
            }
        }
    }
}

#[test]
fn checker_reports_oversized_images() {
    let err = check_boot_contract(KERNEL_IMAGE_MAX + 4096).unwrap_err();
    assert!(matches!(err, BootContractError::Plan(_)));
    assert!(check_boot_contract(KERNEL_IMAGE_MAX).is_ok());
    assert_eq!(
        check_boot_contract(1).map(|c| c.entry),
        Ok(entry_address())
    );
}
