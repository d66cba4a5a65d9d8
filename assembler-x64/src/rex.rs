//! Encoding logic for REX-prefixed instructions.

use crate::api::CodeSink;
use crate::reg::{Gpr, Size};

/// Encode the ModR/M byte.
#[inline]
pub fn encode_modrm(m0d: u8, enc_reg_g: u8, rm_e: u8) -> u8 {
    debug_assert!(m0d < 4);
    debug_assert!(enc_reg_g < 8);
    debug_assert!(rm_e < 8);
    ((m0d & 3) << 6) | ((enc_reg_g & 7) << 3) | (rm_e & 7)
}

/// Encode the SIB byte (scale-index-base).
#[inline]
pub fn encode_sib(scale: u8, enc_index: u8, enc_base: u8) -> u8 {
    debug_assert!(scale < 4);
    debug_assert!(enc_index < 8);
    debug_assert!(enc_base < 8);
    ((scale & 3) << 6) | ((enc_index & 7) << 3) | (enc_base & 7)
}

/// A small bit field to record a REX prefix specification:
/// - bit 0 set to 1 indicates REX.W must be 0 (cleared).
/// - bit 1 set to 1 indicates the REX prefix must always be emitted.
///
/// The byte itself is only written when a bit is set or when a referenced
/// register requires the prefix's presence.
#[repr(transparent)]
#[derive(Clone, Copy)]
pub struct RexFlags(u8);

impl RexFlags {
    /// By default, set the W field, and don't always emit.
    #[inline]
    #[must_use]
    pub fn set_w() -> Self {
        Self(0)
    }

    /// Creates a new REX prefix for which the REX.W bit will be cleared.
    #[inline]
    #[must_use]
    pub fn clear_w() -> Self {
        Self(1)
    }

    /// A prefix with W chosen by operand size.
    #[inline]
    #[must_use]
    pub fn from_size(size: Size) -> Self {
        if size == Size::Quadword {
            Self::set_w()
        } else {
            Self::clear_w()
        }
    }

    /// True if 64-bit operands are used.
    #[inline]
    #[must_use]
    pub fn must_clear_w(self) -> bool {
        (self.0 & 1) != 0
    }

    /// Require that the REX prefix is emitted.
    #[inline]
    pub fn always_emit(&mut self) -> &mut Self {
        self.0 |= 2;
        self
    }

    /// True if the REX prefix must always be emitted.
    #[inline]
    #[must_use]
    pub fn must_always_emit(self) -> bool {
        (self.0 & 2) != 0
    }

    /// Force emission of the REX byte if `reg` is `spl`, `bpl`, `sil`, or
    /// `dil`: without the prefix those encodings name `ah`/`ch`/`dh`/`bh`
    /// instead.
    pub fn always_emit_if_8bit_needed(&mut self, reg: Gpr) {
        if reg.size() == Size::Byte && !reg.is_high_byte() && (4..=7).contains(&reg.enc()) {
            self.always_emit();
        }
    }

    /// Emit a unary instruction's prefix.
    ///
    /// Register operand coded in opcode byte or ModR/M.rm; REX.R and REX.X
    /// unused; REX.B == 1 accesses r8-r15.
    #[inline]
    pub fn emit_one_op(self, sink: &mut impl CodeSink, enc_e: u8) {
        let w = if self.must_clear_w() { 0 } else { 1 };
        let r = 0;
        let x = 0;
        let b = (enc_e >> 3) & 1;
        let rex = 0x40 | (w << 3) | (r << 2) | (x << 1) | b;
        if rex != 0x40 || self.must_always_emit() {
            sink.put1(rex);
        }
    }

    /// Emit a binary instruction's prefix.
    #[inline]
    pub fn emit_two_op(self, sink: &mut impl CodeSink, enc_g: u8, enc_e: u8) {
        let w = if self.must_clear_w() { 0 } else { 1 };
        let r = (enc_g >> 3) & 1;
        let x = 0;
        let b = (enc_e >> 3) & 1;
        let rex = 0x40 | (w << 3) | (r << 2) | (x << 1) | b;
        if rex != 0x40 || self.must_always_emit() {
            sink.put1(rex);
        }
    }

    /// Emit a ternary (SIB-addressed) instruction's prefix.
    #[inline]
    pub fn emit_three_op(self, sink: &mut impl CodeSink, enc_g: u8, enc_index: u8, enc_base: u8) {
        let w = if self.must_clear_w() { 0 } else { 1 };
        let r = (enc_g >> 3) & 1;
        let x = (enc_index >> 3) & 1;
        let b = (enc_base >> 3) & 1;
        let rex = 0x40 | (w << 3) | (r << 2) | (x << 1) | b;
        if rex != 0x40 || self.must_always_emit() {
            sink.put1(rex);
        }
    }
}

/// Classifies how a memory displacement is encoded alongside the ModRM/SIB
/// bytes.
#[derive(Copy, Clone)]
pub enum Disp {
    None,
    Disp8(i8),
    Disp32(i32),
}

impl Disp {
    /// Classify the 32-bit displacement `val`.
    pub fn new(val: i32) -> Disp {
        if val == 0 {
            return Disp::None;
        }
        match i8::try_from(val) {
            Ok(val) => Disp::Disp8(val),
            Err(_) => Disp::Disp32(val),
        }
    }

    /// Forces `Disp::None` to become `Disp::Disp8(0)`, used for the base
    /// registers whose zero-displacement ModR/M encoding is reserved
    /// (`rbp`/`r13`).
    pub fn force_disp8(&mut self) {
        if let Disp::None = self {
            *self = Disp::Disp8(0);
        }
    }

    /// Returns the two "mod" bits present at the upper bits of the mod/rm
    /// byte.
    pub fn m0d(self) -> u8 {
        match self {
            Disp::None => 0b00,
            Disp::Disp8(_) => 0b01,
            Disp::Disp32(_) => 0b10,
        }
    }

    /// Emit the displacement into the code sink.
    pub fn emit(self, sink: &mut impl CodeSink) {
        match self {
            Disp::None => {}
            Disp::Disp8(n) => sink.put1(n as u8),
            Disp::Disp32(n) => sink.put4(n as u32),
        }
    }
}
