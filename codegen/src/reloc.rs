//! External relocation records handed to the linker.
//!
//! Only the Mach-O relocation flavors this backend produces are modeled:
//! pc-relative branches to external symbols and pc-relative loads through
//! the global offset table. The numeric relocation types come from the
//! `object` crate's Mach-O definitions.

use basalt_assembler_x64::CodeOffset;
use object::macho;

/// The symbol a relocation refers to.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum RelocTarget {
    /// An external function, by symbol-table index.
    Extern(u32),
    /// A global-offset-table entry, by index.
    GotEntry(u32),
}

/// A Mach-O relocation against the emitted code.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct MachReloc {
    /// Byte offset of the relocated field in the code buffer.
    pub offset: CodeOffset,
    /// What the field refers to.
    pub target: RelocTarget,
    /// The Mach-O relocation type (`object::macho::X86_64_RELOC_*`).
    pub r_type: u32,
    /// True for pc-relative fields.
    pub pcrel: bool,
    /// log2 of the field width in bytes; all fields here are 4 bytes.
    pub length: u8,
    /// Constant to add to the symbol value.
    pub addend: i64,
}

impl MachReloc {
    /// A `X86_64_RELOC_BRANCH` record for a rel32 call to an external
    /// function.
    pub fn branch(offset: CodeOffset, extern_fn: u32) -> Self {
        Self {
            offset,
            target: RelocTarget::Extern(extern_fn),
            r_type: macho::X86_64_RELOC_BRANCH as u32,
            pcrel: true,
            length: 2,
            addend: 0,
        }
    }

    /// A `X86_64_RELOC_GOT` record for a rel32 GOT-entry load.
    pub fn got(offset: CodeOffset, got_entry: u32) -> Self {
        Self {
            offset,
            target: RelocTarget::GotEntry(got_entry),
            r_type: macho::X86_64_RELOC_GOT as u32,
            pcrel: true,
            length: 2,
            addend: 0,
        }
    }
}
