//! # Boot contract check
//!
//! One call that proves, before the boot stub is trusted, that every
//! consumer of the contract agrees with `kernel_info`:
//!
//! 1. the constants themselves ([`kernel_info::verify`]),
//! 2. the generated linker script ([`crate::linker`]),
//! 3. the bootstrap GDT ([`BootGdt::verify`]),
//! 4. the mapping plan, which must translate the entry point back to the
//!    load address.

use crate::gdt::{BootGdt, GdtLayoutError};
use crate::linker::generated_layout;
use crate::paging::{BootMappingPlan, PlanError, TableIndices};
use core::fmt;
use kernel_info::ContractError;
use kernel_info::linker::{LinkerLayout, LinkerScriptError};
use kernel_info::memory::{entry_address, physical_load_address};
use kernel_info::segments::{CS_KERNEL, CS_KERNEL32, DS_KERNEL};
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use log::{debug, error, info};

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BootContractError {
    #[error(transparent)]
    Contract(#[from] ContractError),
    #[error(transparent)]
    LinkerScript(#[from] LinkerScriptError),
    #[error(transparent)]
    Gdt(#[from] GdtLayoutError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error("entry {entry} is not mapped to load address {load}")]
    EntryNotMapped {
        entry: VirtualAddress,
        load: PhysicalAddress,
    },
}

/// Snapshot of a verified boot contract.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BootContract {
    pub cs_kernel32: u16,
    pub cs_kernel: u16,
    pub ds_kernel: u16,
    pub load: PhysicalAddress,
    pub entry: VirtualAddress,
    pub linker: LinkerLayout,
    pub gdt: BootGdt,
    pub plan: BootMappingPlan,
}

/// Verify the whole boot contract for an image of `image_size` bytes.
///
/// # Errors
/// The first failing stage; it is also logged at `error` level.
pub fn check_boot_contract(image_size: u64) -> Result<BootContract, BootContractError> {
    let result = run_checks(image_size);
    match &result {
        Ok(contract) => info!("Boot contract verified: {contract}"),
        Err(e) => error!("Boot contract violated: {e}"),
    }
    result
}

fn run_checks(image_size: u64) -> Result<BootContract, BootContractError> {
    debug!("Checking contract constants ...");
    kernel_info::verify()?;

    debug!("Checking generated linker script ...");
    let linker = generated_layout()?;
    linker.check()?;

    debug!("Checking bootstrap GDT ...");
    let gdt = BootGdt::new();
    gdt.verify()?;

    debug!("Planning boot mappings for a {image_size:#x}-byte image ...");
    let plan = BootMappingPlan::for_image(image_size)?;
    let (entry, load) = (entry_address(), physical_load_address());
    if plan.translate(entry) != Some(load) {
        return Err(BootContractError::EntryNotMapped { entry, load });
    }

    Ok(BootContract {
        cs_kernel32: CS_KERNEL32,
        cs_kernel: CS_KERNEL,
        ds_kernel: DS_KERNEL,
        load,
        entry,
        linker,
        gdt,
        plan,
    })
}

impl fmt::Display for BootContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CS32={:#06x} CS64={:#06x} DS={:#06x} LMA={} entry={}",
            self.cs_kernel32, self.cs_kernel, self.ds_kernel, self.load, self.entry
        )
    }
}

/// Log the full contract, including the page table slots of the entry.
pub fn trace_boot_contract(contract: &BootContract) {
    let hh = contract.plan.higher_half();
    let idx = TableIndices::of(contract.entry);
    info!(
        concat!(
            "Boot contract:\n",
            "  selectors = CS32 {cs32:#06x}, CS64 {cs64:#06x}, DS {ds:#06x}\n",
            "  linker    = LMA {lma:#x}, VMA {vma:#018x}, entry {entry:#018x}\n",
            "  identity  = [0, {id_len:#x})\n",
            "  high half = {hh_virt} -> {hh_phys}, len = {hh_len:#x}\n",
            "  entry     = PML4[{pml4}] PDPT[{pdpt}] PD[{pd}] PT[{pt}]"
        ),
        cs32 = contract.cs_kernel32,
        cs64 = contract.cs_kernel,
        ds = contract.ds_kernel,
        lma = contract.linker.lma_base,
        vma = contract.linker.vma_base,
        entry = contract.linker.entry,
        id_len = contract.plan.identity().len,
        hh_virt = hh.virt,
        hh_phys = hh.phys,
        hh_len = hh.len,
        pml4 = idx.pml4,
        pdpt = idx.pdpt,
        pd = idx.pd,
        pt = idx.pt,
    );
}
