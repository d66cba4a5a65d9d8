//! Pure register operands; see [`Gpr`].

use std::fmt;

/// A single x64 register encoding can access a different number of bits.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Size {
    /// An 8-bit access.
    Byte,
    /// A 16-bit access.
    Word,
    /// A 32-bit access.
    Doubleword,
    /// A 64-bit access.
    Quadword,
}

impl Size {
    /// The access width in bits.
    pub fn bits(self) -> u32 {
        match self {
            Size::Byte => 8,
            Size::Word => 16,
            Size::Doubleword => 32,
            Size::Quadword => 64,
        }
    }
}

/// A general purpose x64 register (e.g., `rax`) at a particular access
/// size.
///
/// The four legacy high-byte registers (`ah`, `ch`, `dh`, `bh`) share the
/// hardware encodings 4–7 with `spl`/`bpl`/`sil`/`dil` and are told apart
/// by [`Gpr::is_high_byte`]; they can never be encoded in an instruction
/// that carries a REX prefix.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Gpr {
    enc: u8,
    size: Size,
    high_byte: bool,
}

impl Gpr {
    /// Create a register from its hardware encoding.
    ///
    /// # Panics
    ///
    /// Panics if `enc` is not a valid x64 register encoding.
    pub const fn new(enc: u8, size: Size) -> Self {
        assert!(enc < 16, "invalid register encoding");
        Self {
            enc,
            size,
            high_byte: false,
        }
    }

    /// Create one of the legacy high-byte registers (`ah`, `ch`, `dh`,
    /// `bh`).
    ///
    /// # Panics
    ///
    /// Panics if `enc` is not in 4..=7, the encodings these registers
    /// occupy.
    pub const fn new_high_byte(enc: u8) -> Self {
        assert!(enc >= 4 && enc < 8, "invalid high-byte register encoding");
        Self {
            enc,
            size: Size::Byte,
            high_byte: true,
        }
    }

    /// The register's hardware encoding; e.g., `0` for `rax`.
    pub fn enc(self) -> u8 {
        self.enc
    }

    /// The low three bits of the encoding, as placed in ModR/M, SIB, or an
    /// opcode-embedded register field.
    pub fn low3(self) -> u8 {
        self.enc & 7
    }

    /// True for `r8`..`r15`, which need a REX extension bit to name.
    pub fn is_extended(self) -> bool {
        self.enc >= 8
    }

    /// The access size.
    pub fn size(self) -> Size {
        self.size
    }

    /// The access width in bits.
    pub fn bits(self) -> u32 {
        self.size.bits()
    }

    /// True for `ah`, `ch`, `dh`, `bh`.
    pub fn is_high_byte(self) -> bool {
        self.high_byte
    }

    /// The same register at byte width.
    pub fn to8(self) -> Self {
        Self::new(self.enc, Size::Byte)
    }

    /// The same register at word width.
    pub fn to16(self) -> Self {
        Self::new(self.enc, Size::Word)
    }

    /// The same register at doubleword width.
    pub fn to32(self) -> Self {
        Self::new(self.enc, Size::Doubleword)
    }

    /// The same register at quadword width.
    pub fn to64(self) -> Self {
        Self::new(self.enc, Size::Quadword)
    }

    /// The DWARF register number for this register.
    ///
    /// DWARF's x86-64 numbering swaps `rdx`/`rcx` and `rsi`/`rdi`/`rbp`/
    /// `rsp` relative to the hardware encoding.
    pub fn dwarf_num(self) -> u8 {
        match self.enc {
            0 => 0,  // rax
            1 => 2,  // rcx
            2 => 1,  // rdx
            3 => 3,  // rbx
            4 => 7,  // rsp
            5 => 6,  // rbp
            6 => 4,  // rsi
            7 => 5,  // rdi
            n => n,  // r8..r15 match
        }
    }

    /// The register name at its access size.
    pub fn name(self) -> &'static str {
        if self.high_byte {
            return match self.enc {
                4 => "ah",
                5 => "ch",
                6 => "dh",
                _ => "bh",
            };
        }
        use Size::{Byte, Doubleword, Quadword, Word};
        match self.enc {
            0 => match self.size {
                Byte => "al",
                Word => "ax",
                Doubleword => "eax",
                Quadword => "rax",
            },
            1 => match self.size {
                Byte => "cl",
                Word => "cx",
                Doubleword => "ecx",
                Quadword => "rcx",
            },
            2 => match self.size {
                Byte => "dl",
                Word => "dx",
                Doubleword => "edx",
                Quadword => "rdx",
            },
            3 => match self.size {
                Byte => "bl",
                Word => "bx",
                Doubleword => "ebx",
                Quadword => "rbx",
            },
            4 => match self.size {
                Byte => "spl",
                Word => "sp",
                Doubleword => "esp",
                Quadword => "rsp",
            },
            5 => match self.size {
                Byte => "bpl",
                Word => "bp",
                Doubleword => "ebp",
                Quadword => "rbp",
            },
            6 => match self.size {
                Byte => "sil",
                Word => "si",
                Doubleword => "esi",
                Quadword => "rsi",
            },
            7 => match self.size {
                Byte => "dil",
                Word => "di",
                Doubleword => "edi",
                Quadword => "rdi",
            },
            8 => match self.size {
                Byte => "r8b",
                Word => "r8w",
                Doubleword => "r8d",
                Quadword => "r8",
            },
            9 => match self.size {
                Byte => "r9b",
                Word => "r9w",
                Doubleword => "r9d",
                Quadword => "r9",
            },
            10 => match self.size {
                Byte => "r10b",
                Word => "r10w",
                Doubleword => "r10d",
                Quadword => "r10",
            },
            11 => match self.size {
                Byte => "r11b",
                Word => "r11w",
                Doubleword => "r11d",
                Quadword => "r11",
            },
            12 => match self.size {
                Byte => "r12b",
                Word => "r12w",
                Doubleword => "r12d",
                Quadword => "r12",
            },
            13 => match self.size {
                Byte => "r13b",
                Word => "r13w",
                Doubleword => "r13d",
                Quadword => "r13",
            },
            14 => match self.size {
                Byte => "r14b",
                Word => "r14w",
                Doubleword => "r14d",
                Quadword => "r14",
            },
            _ => match self.size {
                Byte => "r15b",
                Word => "r15w",
                Doubleword => "r15d",
                Quadword => "r15",
            },
        }
    }
}

impl fmt::Display for Gpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Named registers.
///
/// The 64-bit forms are given as constants; narrower accesses are reached
/// with [`Gpr::to8`]/[`Gpr::to16`]/[`Gpr::to32`].
pub mod gpr {
    use super::{Gpr, Size};

    pub const RAX: Gpr = Gpr::new(0, Size::Quadword);
    pub const RCX: Gpr = Gpr::new(1, Size::Quadword);
    pub const RDX: Gpr = Gpr::new(2, Size::Quadword);
    pub const RBX: Gpr = Gpr::new(3, Size::Quadword);
    pub const RSP: Gpr = Gpr::new(4, Size::Quadword);
    pub const RBP: Gpr = Gpr::new(5, Size::Quadword);
    pub const RSI: Gpr = Gpr::new(6, Size::Quadword);
    pub const RDI: Gpr = Gpr::new(7, Size::Quadword);
    pub const R8: Gpr = Gpr::new(8, Size::Quadword);
    pub const R9: Gpr = Gpr::new(9, Size::Quadword);
    pub const R10: Gpr = Gpr::new(10, Size::Quadword);
    pub const R11: Gpr = Gpr::new(11, Size::Quadword);
    pub const R12: Gpr = Gpr::new(12, Size::Quadword);
    pub const R13: Gpr = Gpr::new(13, Size::Quadword);
    pub const R14: Gpr = Gpr::new(14, Size::Quadword);
    pub const R15: Gpr = Gpr::new(15, Size::Quadword);

    pub const AH: Gpr = Gpr::new_high_byte(4);
    pub const CH: Gpr = Gpr::new_high_byte(5);
    pub const DH: Gpr = Gpr::new_high_byte(6);
    pub const BH: Gpr = Gpr::new_high_byte(7);
}
