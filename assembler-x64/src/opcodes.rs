//! Opcode selection tables.
//!
//! Two total functions map a mnemonic to its encoding bytes: [`opcode`]
//! selects the opcode for a `(mnemonic, form, byte-operand)` triple and
//! [`modrm_ext`] yields the ModR/M opcode-extension digit for the forms
//! that use one. Both return `None` for pairings the assembler does not
//! support; hitting one of those at an encoding site is a structural bug,
//! not a runtime condition.

use std::fmt;

use crate::api::CodeSink;

/// The instruction mnemonics this assembler lowers.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Mnemonic {
    Adc,
    Add,
    Sub,
    Xor,
    And,
    Or,
    Sbb,
    Cmp,
    Mov,
    Lea,
    Imul,
    Push,
    Pop,
    Test,
    Brk,
    Nop,
    Syscall,
    RetNear,
    RetFar,
    JmpNear,
    CallNear,
    // Conditional jumps, in condition-code order (tttn 0x0..=0xF).
    Jo,
    Jno,
    Jb,
    Jae,
    Je,
    Jne,
    Jbe,
    Ja,
    Js,
    Jns,
    Jp,
    Jnp,
    Jl,
    Jge,
    Jle,
    Jg,
    // Conditional byte sets, same condition order.
    Seto,
    Setno,
    Setb,
    Setae,
    Sete,
    Setne,
    Setbe,
    Seta,
    Sets,
    Setns,
    Setp,
    Setnp,
    Setl,
    Setge,
    Setle,
    Setg,
}

impl Mnemonic {
    /// The 4-bit condition code (the SDM's `tttn` field) for the
    /// conditional-jump and set-byte families.
    pub fn cc(self) -> Option<u8> {
        use Mnemonic::*;
        Some(match self {
            Jo | Seto => 0x0,
            Jno | Setno => 0x1,
            Jb | Setb => 0x2,
            Jae | Setae => 0x3,
            Je | Sete => 0x4,
            Jne | Setne => 0x5,
            Jbe | Setbe => 0x6,
            Ja | Seta => 0x7,
            Js | Sets => 0x8,
            Jns | Setns => 0x9,
            Jp | Setp => 0xA,
            Jnp | Setnp => 0xB,
            Jl | Setl => 0xC,
            Jge | Setge => 0xD,
            Jle | Setle => 0xE,
            Jg | Setg => 0xF,
            _ => return None,
        })
    }

    /// True for the conditional set-byte family.
    pub fn is_set_byte(self) -> bool {
        use Mnemonic::*;
        matches!(
            self,
            Seto | Setno
                | Setb
                | Setae
                | Sete
                | Setne
                | Setbe
                | Seta
                | Sets
                | Setns
                | Setp
                | Setnp
                | Setl
                | Setge
                | Setle
                | Setg
        )
    }

    /// The assembly-syntax name.
    pub fn name(self) -> &'static str {
        use Mnemonic::*;
        match self {
            Adc => "adc",
            Add => "add",
            Sub => "sub",
            Xor => "xor",
            And => "and",
            Or => "or",
            Sbb => "sbb",
            Cmp => "cmp",
            Mov => "mov",
            Lea => "lea",
            Imul => "imul",
            Push => "push",
            Pop => "pop",
            Test => "test",
            Brk => "int3",
            Nop => "nop",
            Syscall => "syscall",
            RetNear | RetFar => "ret",
            JmpNear => "jmp",
            CallNear => "call",
            Jo => "jo",
            Jno => "jno",
            Jb => "jb",
            Jae => "jae",
            Je => "je",
            Jne => "jne",
            Jbe => "jbe",
            Ja => "ja",
            Js => "js",
            Jns => "jns",
            Jp => "jp",
            Jnp => "jnp",
            Jl => "jl",
            Jge => "jge",
            Jle => "jle",
            Jg => "jg",
            Seto => "seto",
            Setno => "setno",
            Setb => "setb",
            Setae => "setae",
            Sete => "sete",
            Setne => "setne",
            Setbe => "setbe",
            Seta => "seta",
            Sets => "sets",
            Setns => "setns",
            Setp => "setp",
            Setnp => "setnp",
            Setl => "setl",
            Setge => "setge",
            Setle => "setle",
            Setg => "setg",
        }
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operand-encoding forms, as labeled in the Intel SDM instruction tables.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Form {
    /// No operands.
    Zo,
    /// An immediate.
    I,
    /// A relative displacement.
    D,
    /// A register embedded in the opcode byte.
    O,
    /// A single r/m operand.
    M,
    /// r/m destination, immediate source.
    Mi,
    /// r/m destination, register source.
    Mr,
    /// Register destination, r/m source.
    Rm,
    /// Opcode-embedded register destination, immediate source.
    Oi,
    /// Accumulator destination, memory-offset source.
    Fd,
    /// Memory-offset destination, accumulator source.
    Td,
    /// Register destination, r/m source, immediate.
    Rmi,
}

/// One- or two-byte opcodes; the two-byte form is on the `0x0F` escape
/// page.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Opcode {
    One(u8),
    Two(u8, u8),
}

impl Opcode {
    /// Emit the opcode bytes.
    pub fn emit(self, sink: &mut impl CodeSink) {
        match self {
            Opcode::One(b) => sink.put1(b),
            Opcode::Two(b1, b2) => {
                sink.put1(b1);
                sink.put1(b2);
            }
        }
    }

    /// Emit the opcode bytes with a register's low three bits folded into
    /// the final byte (the O and OI forms).
    pub fn emit_with_reg(self, sink: &mut impl CodeSink, low3: u8) {
        debug_assert!(low3 < 8);
        match self {
            Opcode::One(b) => sink.put1(b | low3),
            Opcode::Two(b1, b2) => {
                sink.put1(b1);
                sink.put1(b2 | low3);
            }
        }
    }
}

/// The opcode for a `(mnemonic, form)` pairing; `is_byte` selects the
/// byte-operand variant where one exists.
pub fn opcode(mnemonic: Mnemonic, form: Form, is_byte: bool) -> Option<Opcode> {
    use Mnemonic::*;
    use Opcode::{One, Two};

    if let Some(cc) = mnemonic.cc() {
        return match (form, mnemonic.is_set_byte(), is_byte) {
            // Jcc rel32 / rel8.
            (Form::D, false, false) => Some(Two(0x0F, 0x80 + cc)),
            (Form::D, false, true) => Some(One(0x70 + cc)),
            // SETcc r/m8.
            (Form::M, true, true) => Some(Two(0x0F, 0x90 + cc)),
            _ => None,
        };
    }

    Some(match (mnemonic, form, is_byte) {
        // No-operand instructions.
        (RetNear, Form::Zo, false) => One(0xC3),
        (RetFar, Form::Zo, false) => One(0xCB),
        (Brk, Form::Zo, false) => One(0xCC),
        (Nop, Form::Zo, false) => One(0x90),
        (Syscall, Form::Zo, false) => Two(0x0F, 0x05),

        // Immediate-only forms; `ret` takes its stack-adjustment word.
        (RetNear, Form::I, false) => One(0xC2),
        (RetFar, Form::I, false) => One(0xCA),
        (Push, Form::I, true) => One(0x6A),
        (Push, Form::I, false) => One(0x68),
        (Test, Form::I, true) => One(0xA8),
        (Test, Form::I, false) => One(0xA9),

        // Relative branches.
        (JmpNear, Form::D, false) => One(0xE9),
        (CallNear, Form::D, false) => One(0xE8),

        // Opcode-embedded register.
        (Push, Form::O, false) => One(0x50),
        (Pop, Form::O, false) => One(0x58),

        // Single r/m operand.
        (JmpNear | CallNear | Push, Form::M, false) => One(0xFF),
        (Pop, Form::M, false) => One(0x8F),

        // r/m with immediate.
        (Adc | Add | Sub | Xor | And | Or | Sbb | Cmp, Form::Mi, true) => One(0x80),
        (Adc | Add | Sub | Xor | And | Or | Sbb | Cmp, Form::Mi, false) => One(0x81),
        (Mov, Form::Mi, true) => One(0xC6),
        (Mov, Form::Mi, false) => One(0xC7),
        (Test, Form::Mi, true) => One(0xF6),
        (Test, Form::Mi, false) => One(0xF7),

        // r/m destination, register source.
        (Adc, Form::Mr, true) => One(0x10),
        (Adc, Form::Mr, false) => One(0x11),
        (Add, Form::Mr, true) => One(0x00),
        (Add, Form::Mr, false) => One(0x01),
        (Sub, Form::Mr, true) => One(0x28),
        (Sub, Form::Mr, false) => One(0x29),
        (Xor, Form::Mr, true) => One(0x30),
        (Xor, Form::Mr, false) => One(0x31),
        (And, Form::Mr, true) => One(0x20),
        (And, Form::Mr, false) => One(0x21),
        (Or, Form::Mr, true) => One(0x08),
        (Or, Form::Mr, false) => One(0x09),
        (Sbb, Form::Mr, true) => One(0x18),
        (Sbb, Form::Mr, false) => One(0x19),
        (Cmp, Form::Mr, true) => One(0x38),
        (Cmp, Form::Mr, false) => One(0x39),
        (Mov, Form::Mr, true) => One(0x88),
        (Mov, Form::Mr, false) => One(0x89),
        (Test, Form::Mr, true) => One(0x84),
        (Test, Form::Mr, false) => One(0x85),

        // Register destination, r/m source: the MR opcodes plus 2.
        (Adc, Form::Rm, true) => One(0x12),
        (Adc, Form::Rm, false) => One(0x13),
        (Add, Form::Rm, true) => One(0x02),
        (Add, Form::Rm, false) => One(0x03),
        (Sub, Form::Rm, true) => One(0x2A),
        (Sub, Form::Rm, false) => One(0x2B),
        (Xor, Form::Rm, true) => One(0x32),
        (Xor, Form::Rm, false) => One(0x33),
        (And, Form::Rm, true) => One(0x22),
        (And, Form::Rm, false) => One(0x23),
        (Or, Form::Rm, true) => One(0x0A),
        (Or, Form::Rm, false) => One(0x0B),
        (Sbb, Form::Rm, true) => One(0x1A),
        (Sbb, Form::Rm, false) => One(0x1B),
        (Cmp, Form::Rm, true) => One(0x3A),
        (Cmp, Form::Rm, false) => One(0x3B),
        (Mov, Form::Rm, true) => One(0x8A),
        (Mov, Form::Rm, false) => One(0x8B),
        (Lea, Form::Rm, false) => One(0x8D),
        (Imul, Form::Rm, false) => Two(0x0F, 0xAF),

        // Opcode-embedded register with immediate.
        (Mov, Form::Oi, true) => One(0xB0),
        (Mov, Form::Oi, false) => One(0xB8),

        // Accumulator/memory-offset moves.
        (Mov, Form::Fd, true) => One(0xA0),
        (Mov, Form::Fd, false) => One(0xA1),
        (Mov, Form::Td, true) => One(0xA2),
        (Mov, Form::Td, false) => One(0xA3),

        // Three-operand immediate multiply.
        (Imul, Form::Rmi, true) => One(0x6B),
        (Imul, Form::Rmi, false) => One(0x69),

        _ => return None,
    })
}

/// The ModR/M opcode-extension digit for the forms that encode the
/// operation in ModR/M.reg.
pub fn modrm_ext(mnemonic: Mnemonic) -> Option<u8> {
    use Mnemonic::*;
    if mnemonic.is_set_byte() {
        return Some(0);
    }
    Some(match mnemonic {
        Add => 0,
        Or => 1,
        Adc => 2,
        Sbb => 3,
        And => 4,
        Sub => 5,
        Xor => 6,
        Cmp => 7,
        Mov => 0,
        Test => 0,
        JmpNear => 4,
        CallNear => 2,
        Push => 6,
        Pop => 0,
        _ => return None,
    })
}

/// Report an unsupported mnemonic/form pairing.
#[cold]
pub(crate) fn bad_encoding(mnemonic: Mnemonic, form: Form) -> ! {
    panic!("no {form:?} encoding for {mnemonic}")
}

/// Report a mnemonic with no ModR/M opcode extension.
#[cold]
pub(crate) fn bad_modrm_ext(mnemonic: Mnemonic) -> ! {
    panic!("no ModR/M opcode extension for {mnemonic}")
}
