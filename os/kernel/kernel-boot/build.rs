use kernel_info::linker::LinkerLayout;
use kernel_info::memory;
use std::{env, fs, path::PathBuf};

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let ld = out_dir.join("kernel.ld");

    // Sanity checks (fail fast during build)
    let vma_base = memory::KERNEL_VMA_BASE;
    let lma_base = memory::KERNEL_LMA_BASE;
    assert_eq!(
        vma_base & (memory::LARGE_PAGE_SIZE - 1),
        0,
        "KERNEL_VMA_BASE must be 2 MiB aligned (got {vma_base:#x})"
    );
    assert_eq!(
        lma_base & (memory::PAGE_SIZE - 1),
        0,
        "KERNEL_LMA_BASE must be 4 KiB aligned (got {lma_base:#x})"
    );
    if let Err(e) = kernel_info::verify() {
        panic!("boot contract violated: {e}");
    }

    // Render the linker script from the contract
    let layout = LinkerLayout::from_contract();
    let mut script = String::new();
    layout.write_script(&mut script).unwrap();
    fs::write(&ld, script).unwrap();

    println!("cargo:rerun-if-changed=build.rs");
}
