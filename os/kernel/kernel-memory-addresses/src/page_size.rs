use core::fmt;
use core::hash::Hash;

mod sealed {
    pub trait Sealed {}
}

/// Marker trait for supported page sizes.
pub trait PageSize:
    sealed::Sealed + Clone + Copy + Eq + Ord + Hash + fmt::Display + fmt::Debug
{
    /// Page size in bytes (power of two).
    const SIZE: u64;
    /// log2(SIZE), i.e., number of low bits used for the offset.
    const SHIFT: u32;
    /// Short human-readable name, e.g. `"2M"`.
    const NAME: &'static str;
}

macro_rules! page_size {
    ($(#[$meta:meta])* $name:ident, $shift:expr, $label:literal) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
        pub struct $name;

        impl sealed::Sealed for $name {}

        impl PageSize for $name {
            const SIZE: u64 = 1 << $shift;
            const SHIFT: u32 = $shift;
            const NAME: &'static str = $label;
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(Self::NAME)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(self, f)
            }
        }
    };
}

page_size!(
    /// 4 KiB page (4096 bytes).
    Size4K, 12, "4K"
);
page_size!(
    /// 2 MiB page (`2_097_152` bytes).
    Size2M, 21, "2M"
);
page_size!(
    /// 1 GiB page (`1_073_741_824` bytes).
    Size1G, 30, "1G"
);

const _: () = {
    assert!(Size4K::SIZE == 4096);
    assert!(Size2M::SIZE == 2 * 1024 * 1024);
    assert!(Size1G::SIZE == 1024 * 1024 * 1024);
};
