//! Memory operands to instructions.

use std::fmt;

use crate::api::CodeSink;
use crate::reg::{Gpr, Size};
use crate::rex::{encode_modrm, encode_sib, Disp, RexFlags};

/// The width of a memory access.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PtrSize {
    Byte,
    Word,
    Dword,
    Qword,
}

impl PtrSize {
    /// The access width in bits.
    pub fn bits(self) -> u32 {
        match self {
            PtrSize::Byte => 8,
            PtrSize::Word => 16,
            PtrSize::Dword => 32,
            PtrSize::Qword => 64,
        }
    }

    /// The pointer size matching a register access size.
    pub fn of(size: Size) -> Self {
        match size {
            Size::Byte => PtrSize::Byte,
            Size::Word => PtrSize::Word,
            Size::Doubleword => PtrSize::Dword,
            Size::Quadword => PtrSize::Qword,
        }
    }
}

/// The scaling factor for the index register in certain [`Amode`]s.
#[derive(Copy, Clone, Debug)]
pub enum Scale {
    One,
    Two,
    Four,
    Eight,
}

impl Scale {
    /// Create a new [`Scale`] from its hardware encoding.
    ///
    /// # Panics
    ///
    /// Panics if `enc` is not a valid encoding for a scale (0-3).
    #[must_use]
    pub fn new(enc: u8) -> Self {
        match enc {
            0b00 => Scale::One,
            0b01 => Scale::Two,
            0b10 => Scale::Four,
            0b11 => Scale::Eight,
            _ => panic!("invalid scale encoding: {enc}"),
        }
    }

    /// Return the hardware encoding of this [`Scale`].
    pub fn enc(self) -> u8 {
        match self {
            Scale::One => 0b00,
            Scale::Two => 0b01,
            Scale::Four => 0b10,
            Scale::Eight => 0b11,
        }
    }

    /// Return how much this [`Scale`] shifts the value in the index
    /// register of the SIB byte; useful for pretty-printing.
    fn shift(self) -> u8 {
        1 << self.enc()
    }
}

/// x64 memory addressing modes.
///
/// A present base or index register must be 64-bit wide; 32-bit address
/// size (the 0x67 prefix) is not supported.
#[derive(Copy, Clone, Debug)]
pub enum Amode {
    /// `[base + simm32]`
    ImmReg {
        base: Gpr,
        simm32: i32,
        size: PtrSize,
    },
    /// `[base + scale*index + simm32]`
    ImmRegRegShift {
        base: Gpr,
        index: Gpr,
        scale: Scale,
        simm32: i32,
        size: PtrSize,
    },
    /// `[simm32]` — absolute, encoded with an index-less SIB byte.
    Offset { simm32: i32, size: PtrSize },
    /// `[rip + simm32]`
    RipRelative { simm32: i32, size: PtrSize },
}

impl Amode {
    /// `[base + simm32]`.
    ///
    /// # Panics
    ///
    /// Panics if `base` is not a 64-bit register.
    pub fn imm_reg(base: Gpr, simm32: i32, size: PtrSize) -> Self {
        assert!(
            base.size() == Size::Quadword,
            "memory base must be a 64-bit register, got {base}"
        );
        Amode::ImmReg { base, simm32, size }
    }

    /// `[base + scale*index + simm32]`.
    ///
    /// # Panics
    ///
    /// Panics if `base` or `index` is not a 64-bit register, or if `index`
    /// is `rsp` (whose SIB encoding means "no index"; `r12` is fine).
    pub fn imm_reg_reg_shift(base: Gpr, index: Gpr, scale: Scale, simm32: i32, size: PtrSize) -> Self {
        assert!(
            base.size() == Size::Quadword && index.size() == Size::Quadword,
            "memory base and index must be 64-bit registers"
        );
        assert!(index.enc() != 4, "rsp cannot be an index register");
        Amode::ImmRegRegShift {
            base,
            index,
            scale,
            simm32,
            size,
        }
    }

    /// `[simm32]`, absolute.
    pub fn offset(simm32: i32, size: PtrSize) -> Self {
        Amode::Offset { simm32, size }
    }

    /// `[rip + simm32]`.
    pub fn rip(simm32: i32, size: PtrSize) -> Self {
        Amode::RipRelative { simm32, size }
    }

    /// The width of the access.
    pub fn size(&self) -> PtrSize {
        match *self {
            Amode::ImmReg { size, .. }
            | Amode::ImmRegRegShift { size, .. }
            | Amode::Offset { size, .. }
            | Amode::RipRelative { size, .. } => size,
        }
    }

    /// The base register, if any.
    pub fn base(&self) -> Option<Gpr> {
        match *self {
            Amode::ImmReg { base, .. } | Amode::ImmRegRegShift { base, .. } => Some(base),
            Amode::Offset { .. } | Amode::RipRelative { .. } => None,
        }
    }

    /// True when any referenced register needs a REX extension bit.
    pub fn has_extended_reg(&self) -> bool {
        match *self {
            Amode::ImmReg { base, .. } => base.is_extended(),
            Amode::ImmRegRegShift { base, index, .. } => {
                base.is_extended() || index.is_extended()
            }
            Amode::Offset { .. } | Amode::RipRelative { .. } => false,
        }
    }

    /// Emit the REX prefix appropriate for this operand, with `enc_g` in
    /// the ModR/M.reg position.
    pub fn emit_rex_prefix(&self, rex: RexFlags, enc_g: u8, sink: &mut impl CodeSink) {
        match *self {
            Amode::ImmReg { base, .. } => {
                rex.emit_two_op(sink, enc_g, base.enc());
            }
            Amode::ImmRegRegShift { base, index, .. } => {
                rex.emit_three_op(sink, enc_g, index.enc(), base.enc());
            }
            // note REX.B = 0.
            Amode::Offset { .. } | Amode::RipRelative { .. } => {
                rex.emit_two_op(sink, enc_g, 0);
            }
        }
    }
}

impl fmt::Display for Amode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Amode::ImmReg { base, simm32, .. } => write!(f, "[{base} + {simm32:#x}]"),
            Amode::ImmRegRegShift {
                base,
                index,
                scale,
                simm32,
                ..
            } => write!(f, "[{base} + {}*{index} + {simm32:#x}]", scale.shift()),
            Amode::Offset { simm32, .. } => write!(f, "[{simm32:#x}]"),
            Amode::RipRelative { simm32, .. } => write!(f, "[rip + {simm32:#x}]"),
        }
    }
}

/// A general-purpose register or memory operand.
#[derive(Copy, Clone, Debug)]
pub enum GprMem {
    Gpr(Gpr),
    Mem(Amode),
}

impl GprMem {
    /// The operand width in bits: the register's access size or the
    /// memory operand's pointer size.
    pub fn bits(&self) -> u32 {
        match self {
            GprMem::Gpr(reg) => reg.bits(),
            GprMem::Mem(mem) => mem.size().bits(),
        }
    }
}

impl fmt::Display for GprMem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GprMem::Gpr(reg) => write!(f, "{reg}"),
            GprMem::Mem(mem) => write!(f, "{mem}"),
        }
    }
}

/// Emit the ModRM/SIB/displacement sequence for a memory operand, with
/// `enc_g` in the ModR/M.reg position.
pub fn emit_modrm_sib_disp(sink: &mut impl CodeSink, enc_g: u8, mem: &Amode) {
    match *mem {
        Amode::ImmReg { base, simm32, .. } => {
            let enc_e = base.enc();
            let mut disp = Disp::new(simm32);

            // Most base registers allow for a single ModRM byte plus an
            // optional immediate. If rsp is the base register, however,
            // then a SIB byte must be used.
            if enc_e & 7 == 4 {
                // Displacement from rsp (or r12) is encoded with a SIB
                // byte where the index and base are both 0b100. This
                // special encoding means the index register isn't used.
                sink.put1(encode_modrm(disp.m0d(), enc_g & 7, 0b100));
                sink.put1(encode_sib(0b00, 0b100, 0b100));
                disp.emit(sink);
            } else {
                // If the base register is rbp (or r13) and there's no
                // offset then force a 1-byte zero offset: mod=00 with
                // rm=101 is reserved for RIP-relative addressing.
                if enc_e & 7 == 5 {
                    disp.force_disp8();
                }
                sink.put1(encode_modrm(disp.m0d(), enc_g & 7, enc_e & 7));
                disp.emit(sink);
            }
        }

        Amode::ImmRegRegShift {
            base,
            index,
            scale,
            simm32,
            ..
        } => {
            let enc_base = base.enc();
            let enc_index = index.enc();

            // The SIB byte requires an explicit displacement with rbp/r13
            // bases, as above.
            let mut disp = Disp::new(simm32);
            if enc_base & 7 == 5 {
                disp.force_disp8();
            }

            sink.put1(encode_modrm(disp.m0d(), enc_g & 7, 0b100));
            sink.put1(encode_sib(scale.enc(), enc_index & 7, enc_base & 7));
            disp.emit(sink);
        }

        Amode::Offset { simm32, .. } => {
            // Absolute addressing: mod=00 rm=100 with an index-less,
            // base-less SIB and a 32-bit displacement.
            sink.put1(encode_modrm(0b00, enc_g & 7, 0b100));
            sink.put1(encode_sib(0b00, 0b100, 0b101));
            sink.put4(simm32 as u32);
        }

        Amode::RipRelative { simm32, .. } => {
            // RIP-relative is mod=00, rm=101.
            sink.put1(encode_modrm(0b00, enc_g & 7, 0b101));
            sink.put4(simm32 as u32);
        }
    }
}
