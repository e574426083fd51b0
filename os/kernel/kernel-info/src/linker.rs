//! # Linker Script Contract
//!
//! The kernel's `build.rs` renders its linker script from [`LinkerLayout::from_contract`],
//! so the load and execution addresses exist in exactly one place. The script
//! declares the three contract symbols, links `.text` at `KERNEL_LOCATION`,
//! sets each section's load address to `ADDR(section) - KERNEL_VMA_BASE` and
//! asserts that the entry symbol lands on `KERNEL_LOCATION`.
//!
//! [`LinkerLayout::parse`] reads the symbol assignments back from script text
//! so tests can prove the generated (or a hand-edited) script still agrees
//! with the constants.
//!
//! ```rust
//! # use kernel_info::linker::LinkerLayout;
//! let mut script = String::new();
//! LinkerLayout::from_contract().write_script(&mut script).unwrap();
//!
//! let parsed = LinkerLayout::parse(&script).unwrap();
//! assert_eq!(parsed, LinkerLayout::from_contract());
//! assert!(parsed.check().is_ok());
//! ```

use crate::contract::{Contract, ContractError};
use crate::memory::{KERNEL_LMA_BASE, KERNEL_LOCATION, KERNEL_VMA_BASE};
use core::fmt::{self, Write};

/// Symbol name of the physical load base in the linker script.
pub const SYM_LMA_BASE: &str = "KERNEL_LMA_BASE";
/// Symbol name of the higher-half base in the linker script.
pub const SYM_VMA_BASE: &str = "KERNEL_VMA_BASE";
/// Symbol name of the relocated entry address in the linker script.
pub const SYM_LOCATION: &str = "KERNEL_LOCATION";
/// Entry symbol the boot stub jumps to.
pub const ENTRY_SYMBOL: &str = "_start";

/// Output sections, in link order. `.text.boot` is kept first so
/// [`ENTRY_SYMBOL`] sits at the very start of the image.
const SECTIONS: [(&str, &str); 4] = [
    (".text", "KEEP(*(.text.boot)) *(.text .text.*)"),
    (".rodata", "*(.rodata .rodata.*)"),
    (".data", "*(.data .data.*)"),
    (".bss", "*(.bss.boot) *(.bss .bss.* COMMON)"),
];

/// Addresses a linker script assigns to the contract symbols.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct LinkerLayout {
    pub lma_base: u64,
    pub vma_base: u64,
    pub entry: u64,
}

/// Failure to read the contract symbols from linker script text.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkerScriptError {
    #[error("linker script does not assign {symbol}")]
    MissingSymbol { symbol: &'static str },
    #[error("linker script assigns {symbol} more than once")]
    DuplicateSymbol { symbol: &'static str },
    #[error("linker script assigns {symbol} a value that is not a plain integer literal")]
    InvalidNumber { symbol: &'static str },
    #[error("linker script modifies {symbol} with something other than a plain `=`")]
    UnsupportedAssignment { symbol: &'static str },
}

impl LinkerLayout {
    /// The layout dictated by the compiled-in contract.
    #[must_use]
    pub const fn from_contract() -> Self {
        Self {
            lma_base: KERNEL_LMA_BASE,
            vma_base: KERNEL_VMA_BASE,
            entry: KERNEL_LOCATION,
        }
    }

    /// The layout as a full contract value, with the compiled-in selectors.
    #[must_use]
    pub const fn to_contract(self) -> Contract {
        Contract {
            lma_base: self.lma_base,
            vma_base: self.vma_base,
            location: self.entry,
            ..Contract::CURRENT
        }
    }

    /// Render a GNU ld script for this layout.
    ///
    /// # Errors
    /// Propagates errors of the underlying writer.
    pub fn write_script<W: Write>(&self, w: &mut W) -> fmt::Result {
        writeln!(w, "/* Generated from kernel-info; edit the constants, not this file. */")?;
        writeln!(w, "OUTPUT_FORMAT(elf64-x86-64)")?;
        writeln!(w, "OUTPUT_ARCH(i386:x86-64)")?;
        writeln!(w, "ENTRY({ENTRY_SYMBOL})")?;
        writeln!(w)?;
        writeln!(w, "{SYM_LMA_BASE} = {:#x};", self.lma_base)?;
        writeln!(w, "{SYM_VMA_BASE} = {:#x};", self.vma_base)?;
        writeln!(w, "{SYM_LOCATION} = {:#x};", self.entry)?;
        writeln!(w)?;
        writeln!(w, "SECTIONS")?;
        writeln!(w, "{{")?;
        writeln!(w, "    . = {SYM_LOCATION};")?;
        writeln!(w, "    __kernel_start = .;")?;
        for (name, inputs) in SECTIONS {
            writeln!(w)?;
            writeln!(
                w,
                "    {name} : AT(ADDR({name}) - {SYM_VMA_BASE}) ALIGN(4K)"
            )?;
            writeln!(w, "    {{")?;
            writeln!(w, "        {inputs}")?;
            writeln!(w, "    }}")?;
        }
        writeln!(w)?;
        writeln!(w, "    __kernel_end = .;")?;
        writeln!(w, "    __kernel_phys_end = __kernel_end - {SYM_VMA_BASE};")?;
        writeln!(w)?;
        writeln!(w, "    /DISCARD/ : {{ *(.eh_frame*) *(.comment) *(.note*) }}")?;
        writeln!(w, "}}")?;
        writeln!(w)?;
        writeln!(
            w,
            "ASSERT({ENTRY_SYMBOL} == {SYM_LOCATION}, \"entry symbol is not at {SYM_LOCATION}\")"
        )?;
        writeln!(
            w,
            "ASSERT({SYM_LOCATION} == {SYM_VMA_BASE} + {SYM_LMA_BASE}, \"{SYM_LOCATION} is not VMA base + LMA base\")"
        )
    }

    /// Read the contract symbol assignments from linker script text.
    ///
    /// Statements end at `;` or at a line break; only top-level
    /// `SYMBOL = <integer>` statements are read. Integers are decimal or
    /// `0x`-prefixed hex. Comments must not split an assignment.
    ///
    /// # Errors
    /// - [`LinkerScriptError::MissingSymbol`] if a symbol is never assigned,
    /// - [`LinkerScriptError::DuplicateSymbol`] if one is assigned twice,
    /// - [`LinkerScriptError::InvalidNumber`] if the value is an expression,
    /// - [`LinkerScriptError::UnsupportedAssignment`] if a symbol is assigned
    ///   any other way (`+=`, `PROVIDE(..)`, ...).
    pub fn parse(script: &str) -> Result<Self, LinkerScriptError> {
        let mut lma = None;
        let mut vma = None;
        let mut entry = None;

        for code in code_segments(script) {
            for statement in code.split([';', '\n']) {
                let statement = statement
                    .rsplit(['{', '}'])
                    .next()
                    .unwrap_or(statement)
                    .trim();
                let Some((lhs, rhs)) = statement.split_once('=') else {
                    continue;
                };
                if rhs.starts_with('=') {
                    // `==` inside an ASSERT
                    continue;
                }
                let symbol = match assignment_target(lhs) {
                    Target::Plain(symbol) => symbol,
                    Target::Other(Some(symbol)) => {
                        return Err(LinkerScriptError::UnsupportedAssignment { symbol });
                    }
                    Target::Other(None) | Target::Comparison => continue,
                };
                let slot = match symbol {
                    SYM_LMA_BASE => &mut lma,
                    SYM_VMA_BASE => &mut vma,
                    _ => &mut entry,
                };
                if slot.is_some() {
                    return Err(LinkerScriptError::DuplicateSymbol { symbol });
                }
                let value =
                    parse_int(rhs.trim()).ok_or(LinkerScriptError::InvalidNumber { symbol })?;
                *slot = Some(value);
            }
        }

        Ok(Self {
            lma_base: lma.ok_or(LinkerScriptError::MissingSymbol {
                symbol: SYM_LMA_BASE,
            })?,
            vma_base: vma.ok_or(LinkerScriptError::MissingSymbol {
                symbol: SYM_VMA_BASE,
            })?,
            entry: entry.ok_or(LinkerScriptError::MissingSymbol {
                symbol: SYM_LOCATION,
            })?,
        })
    }

    /// Check that this layout matches the compiled-in contract.
    ///
    /// # Errors
    /// [`ContractError::LinkerSymbolMismatch`] naming the first symbol that
    /// differs, or any error of [`Contract::verify`] for the layout itself.
    pub fn check(&self) -> Result<(), ContractError> {
        let expected = Self::from_contract();
        let pairs = [
            (SYM_LMA_BASE, expected.lma_base, self.lma_base),
            (SYM_VMA_BASE, expected.vma_base, self.vma_base),
            (SYM_LOCATION, expected.entry, self.entry),
        ];
        for (symbol, expected, found) in pairs {
            if expected != found {
                return Err(ContractError::LinkerSymbolMismatch {
                    symbol,
                    expected,
                    found,
                });
            }
        }
        self.to_contract().verify()
    }
}

impl Default for LinkerLayout {
    fn default() -> Self {
        Self::from_contract()
    }
}

/// Iterate over the parts of `script` outside `/* ... */` comments.
fn code_segments(script: &str) -> impl Iterator<Item = &str> {
    let mut parts = script.split("/*");
    let head = parts.next();
    head.into_iter()
        .chain(parts.filter_map(|part| part.split_once("*/").map(|(_, code)| code)))
}

/// What the text left of the first `=` in a statement assigns to.
enum Target {
    /// `SYMBOL = ...` for one of the contract symbols.
    Plain(&'static str),
    /// `!=`, `<=`, `>=`: not an assignment.
    Comparison,
    /// Any other assignment, with the contract symbol it touches, if any.
    Other(Option<&'static str>),
}

fn assignment_target(lhs: &str) -> Target {
    let lhs = lhs.trim();
    let compound = lhs.ends_with("<<")
        || lhs.ends_with(">>")
        || lhs.ends_with(['+', '-', '*', '/', '&', '|']);
    if !compound && lhs.ends_with(['!', '<', '>']) {
        return Target::Comparison;
    }

    if let Some(symbol) = contract_symbol(lhs) {
        return Target::Plain(symbol);
    }
    Target::Other(
        lhs.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .find_map(contract_symbol),
    )
}

fn contract_symbol(name: &str) -> Option<&'static str> {
    [SYM_LMA_BASE, SYM_VMA_BASE, SYM_LOCATION]
        .into_iter()
        .find(|&sym| sym == name)
}

fn parse_int(text: &str) -> Option<u64> {
    if let Some(hex) = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16).ok()
    } else {
        text.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(layout: LinkerLayout) -> String {
        let mut s = String::new();
        layout.write_script(&mut s).unwrap();
        s
    }

    #[test]
    fn rendered_script_declares_contract_symbols() {
        let script = render(LinkerLayout::from_contract());
        assert!(script.contains("KERNEL_LMA_BASE = 0x100000;"));
        assert!(script.contains("KERNEL_VMA_BASE = 0xffffffff80000000;"));
        assert!(script.contains("KERNEL_LOCATION = 0xffffffff80100000;"));
        assert!(script.contains(". = KERNEL_LOCATION;"));
        assert!(script.contains(".text : AT(ADDR(.text) - KERNEL_VMA_BASE)"));
        assert!(script.contains("ASSERT(_start == KERNEL_LOCATION"));
    }

    #[test]
    fn rendered_script_reads_back() {
        let parsed = LinkerLayout::parse(&render(LinkerLayout::from_contract())).unwrap();
        assert_eq!(parsed, LinkerLayout::from_contract());
        assert_eq!(parsed.check(), Ok(()));
    }

    #[test]
    fn vma_changed_only_in_script_is_caught() {
        let drifted = LinkerLayout {
            vma_base: 0xffff_ffff_c000_0000,
            entry: 0xffff_ffff_c010_0000,
            ..LinkerLayout::from_contract()
        };
        let parsed = LinkerLayout::parse(&render(drifted)).unwrap();
        assert_eq!(
            parsed.check(),
            Err(ContractError::LinkerSymbolMismatch {
                symbol: SYM_VMA_BASE,
                expected: KERNEL_VMA_BASE,
                found: 0xffff_ffff_c000_0000,
            })
        );
    }

    #[test]
    fn parse_ignores_comments_and_decimal_values() {
        let script = "\
            /* KERNEL_LMA_BASE = 0x999; */\n\
            KERNEL_LMA_BASE = 1048576;\n\
            KERNEL_VMA_BASE = 0XFFFFFFFF80000000; /* upper 2 GiB */\n\
            KERNEL_LOCATION = 0xffffffff80100000;\n";
        let parsed = LinkerLayout::parse(script).unwrap();
        assert_eq!(parsed, LinkerLayout::from_contract());
    }

    #[test]
    fn parse_reports_missing_duplicate_and_expressions() {
        assert_eq!(
            LinkerLayout::parse("KERNEL_LMA_BASE = 0x100000; KERNEL_VMA_BASE = 0x0;"),
            Err(LinkerScriptError::MissingSymbol {
                symbol: SYM_LOCATION
            })
        );
        assert_eq!(
            LinkerLayout::parse("KERNEL_LMA_BASE = 0x100000; KERNEL_LMA_BASE = 0x200000;"),
            Err(LinkerScriptError::DuplicateSymbol {
                symbol: SYM_LMA_BASE
            })
        );
        assert_eq!(
            LinkerLayout::parse("KERNEL_LOCATION = KERNEL_VMA_BASE + KERNEL_LMA_BASE;"),
            Err(LinkerScriptError::InvalidNumber {
                symbol: SYM_LOCATION
            })
        );
    }

    #[test]
    fn parse_reads_the_exact_rendered_script() {
        // header lines without `;` must not leak into the first assignment
        let script = render(LinkerLayout::from_contract());
        assert!(script.contains("ENTRY(_start)\n"));
        let parsed = LinkerLayout::parse(&script).unwrap();
        assert_eq!(parsed, LinkerLayout::from_contract());

        // on one line the header is part of the statement and is refused
        let single = "ENTRY(_start) KERNEL_LMA_BASE = 0x100000;";
        assert_eq!(
            LinkerLayout::parse(single),
            Err(LinkerScriptError::UnsupportedAssignment {
                symbol: SYM_LMA_BASE
            })
        );
    }

    #[test]
    fn compound_and_provided_assignments_are_rejected() {
        let script = render(LinkerLayout::from_contract());
        let moved = script.replace(
            "KERNEL_VMA_BASE = 0xffffffff80000000;",
            "KERNEL_VMA_BASE = 0xffffffff80000000; KERNEL_VMA_BASE += 0x40000000;",
        );
        assert_ne!(moved, script);
        assert_eq!(
            LinkerLayout::parse(&moved),
            Err(LinkerScriptError::UnsupportedAssignment {
                symbol: SYM_VMA_BASE
            })
        );

        let provided = script.replace(
            "KERNEL_LOCATION = 0xffffffff80100000;",
            "PROVIDE(KERNEL_LOCATION = 0xffffffff80100000);",
        );
        assert_eq!(
            LinkerLayout::parse(&provided),
            Err(LinkerScriptError::UnsupportedAssignment {
                symbol: SYM_LOCATION
            })
        );

        let shifted = "KERNEL_LMA_BASE <<= 1;";
        assert_eq!(
            LinkerLayout::parse(shifted),
            Err(LinkerScriptError::UnsupportedAssignment {
                symbol: SYM_LMA_BASE
            })
        );
    }

    #[test]
    fn comparisons_and_unrelated_symbols_are_ignored() {
        let script = "\
            KERNEL_LMA_BASE = 0x100000;\n\
            KERNEL_VMA_BASE = 0xffffffff80000000;\n\
            KERNEL_LOCATION = 0xffffffff80100000;\n\
            MY_KERNEL_VMA_BASE_COPY = 0x1;\n\
            ASSERT(KERNEL_LMA_BASE <= 0x200000, \"low\")\n\
            ASSERT(KERNEL_VMA_BASE != 0, \"zero\")\n";
        assert_eq!(
            LinkerLayout::parse(script),
            Ok(LinkerLayout::from_contract())
        );
    }

    #[test]
    fn section_location_counter_is_not_a_symbol() {
        let script = "SECTIONS { . = 0x1234; }";
        assert_eq!(
            LinkerLayout::parse(script),
            Err(LinkerScriptError::MissingSymbol {
                symbol: SYM_LMA_BASE
            })
        );
    }
}
