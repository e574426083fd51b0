use kernel_info::linker::{LinkerLayout, SYM_VMA_BASE};
use kernel_info::memory::{
    KERNEL_LMA_BASE, KERNEL_LOCATION, KERNEL_VMA_BASE, PAGE_SIZE, entry_address,
    physical_load_address, virt_of_phys,
};
use kernel_info::segments::{CS_KERNEL, CS_KERNEL32, code32_selector, code64_selector};
use kernel_info::{Contract, ContractError};
use kernel_memory_addresses::is_canonical;

#[test]
fn location_is_vma_plus_lma() {
    assert_eq!(
        KERNEL_VMA_BASE.checked_add(KERNEL_LMA_BASE),
        Some(KERNEL_LOCATION)
    );
    assert_eq!(KERNEL_LOCATION, 0xffff_ffff_8010_0000);
    assert_eq!(virt_of_phys(physical_load_address()), Some(entry_address()));
}

#[test]
fn bases_are_page_aligned_and_canonical() {
    assert!(is_canonical(KERNEL_VMA_BASE));
    assert!(is_canonical(KERNEL_LOCATION));
    assert_eq!(KERNEL_VMA_BASE % PAGE_SIZE, 0);
    assert_eq!(KERNEL_LMA_BASE % PAGE_SIZE, 0);
}

#[test]
fn code_selectors_are_distinct_gdt_slots() {
    assert_eq!(code32_selector(), 0x08);
    assert_eq!(code64_selector(), 0x10);
    assert_ne!(CS_KERNEL32, CS_KERNEL);
    for sel in [CS_KERNEL32, CS_KERNEL] {
        assert_ne!(sel, 0);
        assert_eq!(sel % 8, 0);
    }
}

#[test]
fn vma_changed_in_the_script_only_is_rejected() {
    let mut script = String::new();
    LinkerLayout::from_contract()
        .write_script(&mut script)
        .unwrap();
    let edited = script.replace(
        "KERNEL_VMA_BASE = 0xffffffff80000000;",
        "KERNEL_VMA_BASE = 0xffffffffc0000000;",
    );
    assert_ne!(script, edited);

    let layout = LinkerLayout::parse(&edited).unwrap();
    assert_eq!(
        layout.check(),
        Err(ContractError::LinkerSymbolMismatch {
            symbol: SYM_VMA_BASE,
            expected: KERNEL_VMA_BASE,
            found: 0xffff_ffff_c000_0000,
        })
    );
}

#[test]
fn vma_changed_consistently_still_needs_canonical_space() {
    let moved = Contract {
        vma_base: 0xffff_ffff_c000_0000,
        location: 0xffff_ffff_c010_0000,
        ..Contract::CURRENT
    };
    assert_eq!(moved.verify(), Ok(()));

    let lower_half = Contract {
        vma_base: 0x0000_8000_0000_0000,
        location: 0x0000_8000_0010_0000,
        ..Contract::CURRENT
    };
    assert!(matches!(
        lower_half.verify(),
        Err(ContractError::NotCanonical { .. })
    ));
}
