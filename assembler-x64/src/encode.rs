//! One lowering function per operand-encoding form.
//!
//! Each function validates the operand-shape contract of its form and
//! emits a complete legal instruction: optional `0x66` operand-size
//! prefix, optional REX prefix, opcode, ModR/M, SIB, displacement, and
//! immediate, in that order. The only runtime failures are the
//! [`Error`](crate::Error) variants; an unsupported mnemonic/form pairing
//! panics through the opcode tables.

use crate::api::{CodeBuffer, CodeSink};
use crate::mem::{emit_modrm_sib_disp, GprMem, PtrSize};
use crate::opcodes::{self, bad_encoding, bad_modrm_ext, Form, Mnemonic, Opcode};
use crate::reg::{Gpr, Size};
use crate::rex::{encode_modrm, RexFlags};
use crate::Error;

/// Worst-case length of a single encoded instruction.
const MAX_INST_LEN: usize = 16;

fn opcode_for(mnemonic: Mnemonic, form: Form, is_byte: bool) -> Opcode {
    opcodes::opcode(mnemonic, form, is_byte).unwrap_or_else(|| bad_encoding(mnemonic, form))
}

fn ext_for(mnemonic: Mnemonic) -> u8 {
    opcodes::modrm_ext(mnemonic).unwrap_or_else(|| bad_modrm_ext(mnemonic))
}

/// The natural width of an immediate, in bits.
fn imm_bits(imm: i32) -> u32 {
    if i8::try_from(imm).is_ok() {
        8
    } else if i16::try_from(imm).is_ok() {
        16
    } else {
        32
    }
}

/// `ah`/`ch`/`dh`/`bh` cannot be encoded alongside a REX prefix.
fn check_rex_compatible(reg: Gpr, rex: RexFlags, partner_extended: bool) {
    if reg.is_high_byte() {
        assert!(
            !rex.must_always_emit() && !partner_extended,
            "{reg} cannot be encoded with a REX prefix"
        );
    }
}

/// ZO: no operands.
pub fn zo(buf: &mut CodeBuffer, mnemonic: Mnemonic) -> Result<(), Error> {
    buf.reserve(MAX_INST_LEN)?;
    opcode_for(mnemonic, Form::Zo, false).emit(buf);
    Ok(())
}

/// I: `OP imm`.
///
/// `ret` immediates are always 16-bit; otherwise the immediate is emitted
/// at its natural width (8, 16 with an operand-size prefix, or 32).
pub fn i(buf: &mut CodeBuffer, mnemonic: Mnemonic, imm: i32) -> Result<(), Error> {
    buf.reserve(MAX_INST_LEN)?;
    if let Mnemonic::RetNear | Mnemonic::RetFar = mnemonic {
        opcode_for(mnemonic, Form::I, false).emit(buf);
        buf.put2(imm as u16);
        return Ok(());
    }
    let bits = imm_bits(imm);
    if bits == 16 {
        buf.put1(0x66);
    }
    opcode_for(mnemonic, Form::I, bits == 8).emit(buf);
    match bits {
        8 => buf.put1(imm as u8),
        16 => buf.put2(imm as u16),
        _ => buf.put4(imm as u32),
    }
    Ok(())
}

/// I, accumulator variant: `OP {al,ax,eax,rax}, imm`, with the operand
/// width chosen by the caller rather than the immediate's natural size.
pub fn i_acc(buf: &mut CodeBuffer, mnemonic: Mnemonic, size: Size, imm: i32) -> Result<(), Error> {
    buf.reserve(MAX_INST_LEN)?;
    if size == Size::Word {
        buf.put1(0x66);
    }
    let rex = RexFlags::from_size(size);
    rex.emit_two_op(buf, 0, 0);
    opcode_for(mnemonic, Form::I, size == Size::Byte).emit(buf);
    match size {
        Size::Byte => buf.put1(imm as u8),
        Size::Word => buf.put2(imm as u16),
        Size::Doubleword | Size::Quadword => buf.put4(imm as u32),
    }
    Ok(())
}

/// D: `OP rel32`.
///
/// Branch emitters pass a zero displacement and register a relocation to
/// be patched once the target offset is known.
pub fn d(buf: &mut CodeBuffer, mnemonic: Mnemonic, rel: i32) -> Result<(), Error> {
    buf.reserve(MAX_INST_LEN)?;
    opcode_for(mnemonic, Form::D, false).emit(buf);
    buf.put4(rel as u32);
    Ok(())
}

/// O: `OP reg`, register embedded in the opcode byte.
///
/// Only the 16- and 64-bit widths exist for `push`/`pop`; the operation
/// is naturally 64-bit, so REX.W is never set.
pub fn o(buf: &mut CodeBuffer, mnemonic: Mnemonic, reg: Gpr) -> Result<(), Error> {
    if !matches!(reg.size(), Size::Word | Size::Quadword) {
        return Err(Error::OperandSizeMismatch);
    }
    buf.reserve(MAX_INST_LEN)?;
    if reg.size() == Size::Word {
        buf.put1(0x66);
    }
    let rex = RexFlags::clear_w();
    rex.emit_one_op(buf, reg.enc());
    opcode_for(mnemonic, Form::O, false).emit_with_reg(buf, reg.low3());
    Ok(())
}

/// M: `OP r/m`.
///
/// Register operands must be 16- or 64-bit, except for the set-byte
/// family which requires 8-bit. Memory operands must be word- or
/// qword-sized. The mnemonics here are naturally 64-bit (or byte-sized),
/// so REX.W is never set.
pub fn m(buf: &mut CodeBuffer, mnemonic: Mnemonic, rm: &GprMem) -> Result<(), Error> {
    buf.reserve(MAX_INST_LEN)?;
    let ext = ext_for(mnemonic);
    match rm {
        GprMem::Gpr(reg) => {
            if mnemonic.is_set_byte() {
                if reg.size() != Size::Byte {
                    return Err(Error::OperandSizeMismatch);
                }
            } else if !matches!(reg.size(), Size::Word | Size::Quadword) {
                return Err(Error::OperandSizeMismatch);
            }
            if reg.size() == Size::Word {
                buf.put1(0x66);
            }
            let mut rex = RexFlags::clear_w();
            rex.always_emit_if_8bit_needed(*reg);
            rex.emit_two_op(buf, ext, reg.enc());
            opcode_for(mnemonic, Form::M, mnemonic.is_set_byte()).emit(buf);
            buf.put1(encode_modrm(0b11, ext, reg.low3()));
        }
        GprMem::Mem(mem) => {
            if !matches!(mem.size(), PtrSize::Word | PtrSize::Qword) {
                return Err(Error::OperandSizeMismatch);
            }
            if mem.size() == PtrSize::Word {
                buf.put1(0x66);
            }
            let rex = RexFlags::clear_w();
            mem.emit_rex_prefix(rex, ext, buf);
            opcode_for(mnemonic, Form::M, false).emit(buf);
            emit_modrm_sib_disp(buf, ext, mem);
        }
    }
    Ok(())
}

/// MI: `OP r/m, imm`.
///
/// The immediate is emitted at the operand width, capped at 32 bits: the
/// qword forms take a sign-extended 32-bit immediate.
pub fn mi(buf: &mut CodeBuffer, mnemonic: Mnemonic, rm: &GprMem, imm: i32) -> Result<(), Error> {
    buf.reserve(MAX_INST_LEN)?;
    let ext = ext_for(mnemonic);
    let op_bits = rm.bits();
    let opc = opcode_for(mnemonic, Form::Mi, op_bits == 8);
    if op_bits == 16 {
        buf.put1(0x66);
    }
    match rm {
        GprMem::Gpr(reg) => {
            let mut rex = RexFlags::from_size(reg.size());
            rex.always_emit_if_8bit_needed(*reg);
            rex.emit_two_op(buf, ext, reg.enc());
            opc.emit(buf);
            buf.put1(encode_modrm(0b11, ext, reg.low3()));
        }
        GprMem::Mem(mem) => {
            let rex = if mem.size() == PtrSize::Qword {
                RexFlags::set_w()
            } else {
                RexFlags::clear_w()
            };
            mem.emit_rex_prefix(rex, ext, buf);
            opc.emit(buf);
            emit_modrm_sib_disp(buf, ext, mem);
        }
    }
    match op_bits {
        8 => buf.put1(imm as u8),
        16 => buf.put2(imm as u16),
        _ => buf.put4(imm as u32),
    }
    Ok(())
}

/// MR: `OP r/m, reg`.
pub fn mr(buf: &mut CodeBuffer, mnemonic: Mnemonic, rm: &GprMem, reg: Gpr) -> Result<(), Error> {
    if rm.bits() != reg.bits() {
        return Err(Error::OperandSizeMismatch);
    }
    emit_reg_rm(buf, mnemonic, Form::Mr, reg, rm)
}

/// RM: `OP reg, r/m`.
pub fn rm(buf: &mut CodeBuffer, mnemonic: Mnemonic, reg: Gpr, rm: &GprMem) -> Result<(), Error> {
    if rm.bits() != reg.bits() {
        return Err(Error::OperandSizeMismatch);
    }
    emit_reg_rm(buf, mnemonic, Form::Rm, reg, rm)
}

/// Shared emission for the MR/RM forms, which differ only in opcode.
fn emit_reg_rm(
    buf: &mut CodeBuffer,
    mnemonic: Mnemonic,
    form: Form,
    reg: Gpr,
    rm: &GprMem,
) -> Result<(), Error> {
    buf.reserve(MAX_INST_LEN)?;
    let opc = opcode_for(mnemonic, form, reg.size() == Size::Byte);
    if reg.size() == Size::Word {
        buf.put1(0x66);
    }
    let mut rex = RexFlags::from_size(reg.size());
    rex.always_emit_if_8bit_needed(reg);
    match rm {
        GprMem::Gpr(rm_reg) => {
            rex.always_emit_if_8bit_needed(*rm_reg);
            check_rex_compatible(reg, rex, rm_reg.is_extended());
            check_rex_compatible(*rm_reg, rex, reg.is_extended());
            rex.emit_two_op(buf, reg.enc(), rm_reg.enc());
            opc.emit(buf);
            buf.put1(encode_modrm(0b11, reg.low3(), rm_reg.low3()));
        }
        GprMem::Mem(mem) => {
            check_rex_compatible(reg, rex, mem.has_extended_reg());
            mem.emit_rex_prefix(rex, reg.enc(), buf);
            opc.emit(buf);
            emit_modrm_sib_disp(buf, reg.enc(), mem);
        }
    }
    Ok(())
}

/// True when `imm` is representable at `bits` width, signed or unsigned.
fn imm_fits(imm: u64, bits: u32) -> bool {
    if bits == 64 {
        return true;
    }
    let unsigned_ok = imm >> bits == 0;
    let min = -(1i64 << (bits - 1));
    let max = 1i64 << (bits - 1);
    let signed_ok = (imm as i64) >= min && (imm as i64) < max;
    unsigned_ok || signed_ok
}

/// OI: `OP reg, imm`, register embedded in the opcode byte.
///
/// The immediate width equals the register width; the 64-bit form writes
/// a full 8-byte immediate.
pub fn oi(buf: &mut CodeBuffer, mnemonic: Mnemonic, reg: Gpr, imm: u64) -> Result<(), Error> {
    if !imm_fits(imm, reg.bits()) {
        return Err(Error::OperandSizeMismatch);
    }
    buf.reserve(MAX_INST_LEN)?;
    if reg.size() == Size::Word {
        buf.put1(0x66);
    }
    let mut rex = RexFlags::from_size(reg.size());
    rex.always_emit_if_8bit_needed(reg);
    rex.emit_one_op(buf, reg.enc());
    opcode_for(mnemonic, Form::Oi, reg.size() == Size::Byte).emit_with_reg(buf, reg.low3());
    match reg.size() {
        Size::Byte => buf.put1(imm as u8),
        Size::Word => buf.put2(imm as u16),
        Size::Doubleword => buf.put4(imm as u32),
        Size::Quadword => buf.put8(imm),
    }
    Ok(())
}

/// FD: `OP reg, moffs` — the accumulator loaded from an absolute 64-bit
/// memory offset.
pub fn fd(buf: &mut CodeBuffer, mnemonic: Mnemonic, reg: Gpr, moffs: u64) -> Result<(), Error> {
    emit_moffs(buf, mnemonic, Form::Fd, reg, moffs)
}

/// TD: `OP moffs, reg` — the accumulator stored to an absolute 64-bit
/// memory offset.
pub fn td(buf: &mut CodeBuffer, mnemonic: Mnemonic, moffs: u64, reg: Gpr) -> Result<(), Error> {
    emit_moffs(buf, mnemonic, Form::Td, reg, moffs)
}

fn emit_moffs(
    buf: &mut CodeBuffer,
    mnemonic: Mnemonic,
    form: Form,
    reg: Gpr,
    moffs: u64,
) -> Result<(), Error> {
    if reg.low3() != 0 || reg.is_high_byte() {
        return Err(Error::RaxOperandExpected);
    }
    // There is no ModR/M byte to carry a REX.B extension, so r8 cannot
    // stand in for the accumulator here.
    debug_assert!(!reg.is_extended(), "moffs forms take the accumulator only");
    buf.reserve(MAX_INST_LEN)?;
    if reg.size() == Size::Word {
        buf.put1(0x66);
    }
    let rex = RexFlags::from_size(reg.size());
    rex.emit_two_op(buf, 0, 0);
    opcode_for(mnemonic, form, reg.size() == Size::Byte).emit(buf);
    buf.put8(moffs);
    Ok(())
}

/// RMI: `OP reg, r/m, imm`.
///
/// No byte variant exists: the register must be at least 16 bits wide and
/// the memory operand must not be byte-sized. The immediate follows the
/// operand width, capped at 32 bits.
pub fn rmi(
    buf: &mut CodeBuffer,
    mnemonic: Mnemonic,
    reg: Gpr,
    rm: &GprMem,
    imm: i32,
) -> Result<(), Error> {
    if reg.bits() < 16 {
        return Err(Error::OperandSizeMismatch);
    }
    if let GprMem::Mem(mem) = rm {
        if mem.size() == PtrSize::Byte {
            return Err(Error::OperandSizeMismatch);
        }
    }
    buf.reserve(MAX_INST_LEN)?;
    let opc = opcode_for(mnemonic, Form::Rmi, false);
    if reg.size() == Size::Word {
        buf.put1(0x66);
    }
    let rex = RexFlags::from_size(reg.size());
    match rm {
        GprMem::Gpr(rm_reg) => {
            rex.emit_two_op(buf, reg.enc(), rm_reg.enc());
            opc.emit(buf);
            buf.put1(encode_modrm(0b11, reg.low3(), rm_reg.low3()));
        }
        GprMem::Mem(mem) => {
            mem.emit_rex_prefix(rex, reg.enc(), buf);
            opc.emit(buf);
            emit_modrm_sib_disp(buf, reg.enc(), mem);
        }
    }
    if reg.size() == Size::Word {
        buf.put2(imm as u16);
    } else {
        buf.put4(imm as u32);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpr::*;
    use crate::{Amode, GprMem, Mnemonic::*, PtrSize, Scale};
    use pretty_assertions::assert_eq;

    fn hex(buf: &CodeBuffer) -> String {
        buf.as_slice().iter().map(|b| format!("{b:02X}")).collect()
    }

    fn check(expected: &str, f: impl FnOnce(&mut CodeBuffer) -> Result<(), Error>) {
        let mut buf = CodeBuffer::new();
        f(&mut buf).unwrap();
        assert_eq!(expected, hex(&buf));
    }

    fn check_err(expected: Error, f: impl FnOnce(&mut CodeBuffer) -> Result<(), Error>) {
        let mut buf = CodeBuffer::new();
        assert_eq!(expected, f(&mut buf).unwrap_err());
    }

    #[test]
    fn zo_instructions() {
        check("C3", |b| zo(b, RetNear));
        check("CB", |b| zo(b, RetFar));
        check("CC", |b| zo(b, Brk));
        check("90", |b| zo(b, Nop));
        check("0F05", |b| zo(b, Syscall));
    }

    #[test]
    fn i_natural_immediate_widths() {
        check("6A10", |b| i(b, Push, 0x10));
        check("66680010", |b| i(b, Push, 0x1000));
        check("6845230100", |b| i(b, Push, 0x12345));
        check("6AF6", |b| i(b, Push, -10));
    }

    #[test]
    fn i_ret_is_always_imm16() {
        check("C21000", |b| i(b, RetNear, 0x10));
        check("CA0000", |b| i(b, RetFar, 0));
    }

    #[test]
    fn i_accumulator_forms() {
        check("A87F", |b| i_acc(b, Test, Size::Byte, 0x7F));
        check("66A91000", |b| i_acc(b, Test, Size::Word, 0x10));
        check("A910000000", |b| i_acc(b, Test, Size::Doubleword, 0x10));
        check("48A910000000", |b| i_acc(b, Test, Size::Quadword, 0x10));
    }

    #[test]
    fn d_branch_placeholders() {
        check("E900000000", |b| d(b, JmpNear, 0));
        check("E800000000", |b| d(b, CallNear, 0));
        check("0F8400000000", |b| d(b, Je, 0));
        check("0F8F00000000", |b| d(b, Jg, 0));
    }

    #[test]
    fn o_push_pop_registers() {
        check("50", |b| o(b, Push, RAX));
        check("55", |b| o(b, Push, RBP));
        check("664154", |b| o(b, Push, R12.to16()));
        check("415C", |b| o(b, Pop, R12));
        check("5D", |b| o(b, Pop, RBP));
        check_err(Error::OperandSizeMismatch, |b| o(b, Push, RAX.to32()));
        check_err(Error::OperandSizeMismatch, |b| o(b, Pop, RAX.to8()));
    }

    #[test]
    fn m_register_operands() {
        // seta r11b
        check("410F97C3", |b| m(b, Seta, &GprMem::Gpr(R11.to8())));
        check("0F92C0", |b| m(b, Setb, &GprMem::Gpr(RAX.to8())));
        // setcc on spl needs a bare REX to avoid naming ah.
        check("400F97C4", |b| m(b, Seta, &GprMem::Gpr(RSP.to8())));
        check("FFE0", |b| m(b, JmpNear, &GprMem::Gpr(RAX)));
        check("41FFD3", |b| m(b, CallNear, &GprMem::Gpr(R11)));
        check_err(Error::OperandSizeMismatch, |b| {
            m(b, Seta, &GprMem::Gpr(RAX.to32()))
        });
        check_err(Error::OperandSizeMismatch, |b| {
            m(b, JmpNear, &GprMem::Gpr(RAX.to32()))
        });
    }

    #[test]
    fn m_memory_operands() {
        // jmp qword ptr [r12 + 0x1000]
        check("41FFA42400100000", |b| {
            m(
                b,
                JmpNear,
                &GprMem::Mem(Amode::imm_reg(R12, 0x1000, PtrSize::Qword)),
            )
        });
        check("FF30", |b| {
            m(b, Push, &GprMem::Mem(Amode::imm_reg(RAX, 0, PtrSize::Qword)))
        });
        check("FF7500", |b| {
            m(b, Push, &GprMem::Mem(Amode::imm_reg(RBP, 0, PtrSize::Qword)))
        });
        check("8F00", |b| {
            m(b, Pop, &GprMem::Mem(Amode::imm_reg(RAX, 0, PtrSize::Qword)))
        });
        // jmp qword ptr [0x1000]: absolute, index-less SIB.
        check("FF242500100000", |b| {
            m(
                b,
                JmpNear,
                &GprMem::Mem(Amode::offset(0x1000, PtrSize::Qword)),
            )
        });
        check_err(Error::OperandSizeMismatch, |b| {
            m(b, JmpNear, &GprMem::Mem(Amode::imm_reg(RAX, 0, PtrSize::Dword)))
        });
    }

    #[test]
    fn mi_register_destinations() {
        // mov rax, 0x10
        check("48C7C010000000", |b| mi(b, Mov, &GprMem::Gpr(RAX), 0x10));
        check("80C310", |b| mi(b, Add, &GprMem::Gpr(RBX.to8()), 0x10));
        check("6681F81000", |b| mi(b, Cmp, &GprMem::Gpr(RAX.to16()), 0x10));
        check("81F310000000", |b| mi(b, Xor, &GprMem::Gpr(RBX.to32()), 0x10));
        // High-byte destination: no REX.
        check("80C410", |b| mi(b, Add, &GprMem::Gpr(AH), 0x10));
        check("F7C310000000", |b| mi(b, Test, &GprMem::Gpr(RBX.to32()), 0x10));
    }

    #[test]
    fn mi_memory_destinations() {
        // mov dword ptr [r11 + 0], 0x10
        check("41C70310000000", |b| {
            mi(
                b,
                Mov,
                &GprMem::Mem(Amode::imm_reg(R11, 0, PtrSize::Dword)),
                0x10,
            )
        });
        // sub dword ptr [r11 + 0x10000000], 0x10
        check("4181AB0000001010000000", |b| {
            mi(
                b,
                Sub,
                &GprMem::Mem(Amode::imm_reg(R11, 0x1000_0000, PtrSize::Dword)),
                0x10,
            )
        });
        // mov dword ptr [rip + 0x10], 0x10
        check("C7051000000010000000", |b| {
            mi(b, Mov, &GprMem::Mem(Amode::rip(0x10, PtrSize::Dword)), 0x10)
        });
        // ... and the qword form carries REX.W.
        check("48C7051000000010000000", |b| {
            mi(b, Mov, &GprMem::Mem(Amode::rip(0x10, PtrSize::Qword)), 0x10)
        });
        check("C640017F", |b| {
            mi(
                b,
                Mov,
                &GprMem::Mem(Amode::imm_reg(RAX, 1, PtrSize::Byte)),
                0x7F,
            )
        });
    }

    #[test]
    fn mi_addressing_boundaries() {
        // rsp/r12 bases force a SIB byte even with no displacement.
        check("C7042401000000", |b| {
            mi(b, Mov, &GprMem::Mem(Amode::imm_reg(RSP, 0, PtrSize::Dword)), 1)
        });
        check("41C7042401000000", |b| {
            mi(b, Mov, &GprMem::Mem(Amode::imm_reg(R12, 0, PtrSize::Dword)), 1)
        });
        // rbp/r13 bases force a zero disp8.
        check("C7450001000000", |b| {
            mi(b, Mov, &GprMem::Mem(Amode::imm_reg(RBP, 0, PtrSize::Dword)), 1)
        });
        check("41C7450001000000", |b| {
            mi(b, Mov, &GprMem::Mem(Amode::imm_reg(R13, 0, PtrSize::Dword)), 1)
        });
        // Absent base: SIB(0, none, none) + disp32.
        check("C704251000000001000000", |b| {
            mi(b, Mov, &GprMem::Mem(Amode::offset(0x10, PtrSize::Dword)), 1)
        });
        // Scaled index.
        check("C7048801000000", |b| {
            mi(
                b,
                Mov,
                &GprMem::Mem(Amode::imm_reg_reg_shift(
                    RAX,
                    RCX,
                    Scale::Four,
                    0,
                    PtrSize::Dword,
                )),
                1,
            )
        });
        // r12 may be an index register, unlike rsp.
        check("42C704A001000000", |b| {
            mi(
                b,
                Mov,
                &GprMem::Mem(Amode::imm_reg_reg_shift(
                    RAX,
                    R12,
                    Scale::Four,
                    0,
                    PtrSize::Dword,
                )),
                1,
            )
        });
    }

    #[test]
    fn mr_forms() {
        // mov qword ptr [r11], rax
        check("498903", |b| {
            mr(
                b,
                Mov,
                &GprMem::Mem(Amode::imm_reg(R11, 0, PtrSize::Qword)),
                RAX,
            )
        });
        check("4801CB", |b| mr(b, Add, &GprMem::Gpr(RBX), RCX));
        // mov ah, bl: byte partners without REX.
        check("88DC", |b| mr(b, Mov, &GprMem::Gpr(AH), RBX.to8()));
        check("668918", |b| {
            mr(
                b,
                Mov,
                &GprMem::Mem(Amode::imm_reg(RAX, 0, PtrSize::Word)),
                RBX.to16(),
            )
        });
        check("8418", |b| mr(b, Test, &GprMem::Mem(Amode::imm_reg(RAX, 0, PtrSize::Byte)), RBX.to8()));
        check_err(Error::OperandSizeMismatch, |b| {
            mr(b, Mov, &GprMem::Gpr(RBX), RCX.to32())
        });
    }

    #[test]
    fn rm_forms() {
        check("488BD9", |b| rm(b, Mov, RBX, &GprMem::Gpr(RCX)));
        // lea rax, [rip + 0x10]
        check("488D0510000000", |b| {
            rm(b, Lea, RAX, &GprMem::Mem(Amode::rip(0x10, PtrSize::Qword)))
        });
        // The byte-width `or` uses opcode 0x0A.
        check("0A5D00", |b| {
            rm(
                b,
                Or,
                RBX.to8(),
                &GprMem::Mem(Amode::imm_reg(RBP, 0, PtrSize::Byte)),
            )
        });
        check("440300", |b| {
            rm(
                b,
                Add,
                R8.to32(),
                &GprMem::Mem(Amode::imm_reg(RAX, 0, PtrSize::Dword)),
            )
        });
        // imul's RM form lives on the 0x0F page.
        check("480FAFC3", |b| rm(b, Imul, RAX, &GprMem::Gpr(RBX)));
    }

    #[test]
    #[should_panic(expected = "cannot be encoded with a REX prefix")]
    fn high_byte_with_extended_partner_is_structural() {
        let mut buf = CodeBuffer::new();
        let _ = mr(&mut buf, Mov, &GprMem::Gpr(AH), R9.to8());
    }

    #[test]
    #[should_panic(expected = "memory base must be a 64-bit register")]
    fn non_64bit_base_is_structural() {
        let _ = Amode::imm_reg(RAX.to32(), 0, PtrSize::Dword);
    }

    #[test]
    fn oi_forms() {
        // movabs rax, 0x1000000000000000
        check("48B80000000000000010", |b| {
            oi(b, Mov, RAX, 0x1000_0000_0000_0000)
        });
        check("49B91122334455667788", |b| {
            oi(b, Mov, R9, 0x8877_6655_4433_2211)
        });
        check("B37F", |b| oi(b, Mov, RBX.to8(), 0x7F));
        check("66B93412", |b| oi(b, Mov, RCX.to16(), 0x1234));
        check("BB78563412", |b| oi(b, Mov, RBX.to32(), 0x1234_5678));
        check_err(Error::OperandSizeMismatch, |b| {
            oi(b, Mov, RBX.to8(), 0x1234)
        });
    }

    #[test]
    fn fd_td_moffs_forms() {
        check("48A18877665544332211", |b| {
            fd(b, Mov, RAX, 0x1122_3344_5566_7788)
        });
        check("A08877665544332211", |b| {
            fd(b, Mov, RAX.to8(), 0x1122_3344_5566_7788)
        });
        check("A38877665544332211", |b| {
            td(b, Mov, 0x1122_3344_5566_7788, RAX.to32())
        });
        check("66A38877665544332211", |b| {
            td(b, Mov, 0x1122_3344_5566_7788, RAX.to16())
        });
        check_err(Error::RaxOperandExpected, |b| fd(b, Mov, RBX, 0));
        check_err(Error::RaxOperandExpected, |b| td(b, Mov, 0, AH));
    }

    #[test]
    fn rmi_forms() {
        // imul rax, qword ptr [rbp - 8], 0x10
        check("486945F810000000", |b| {
            rmi(
                b,
                Imul,
                RAX,
                &GprMem::Mem(Amode::imm_reg(RBP, -8, PtrSize::Qword)),
                0x10,
            )
        });
        check("6669D91000", |b| {
            rmi(b, Imul, RBX.to16(), &GprMem::Gpr(RCX.to16()), 0x10)
        });
        check_err(Error::OperandSizeMismatch, |b| {
            rmi(b, Imul, RAX.to8(), &GprMem::Gpr(RCX.to8()), 1)
        });
        check_err(Error::OperandSizeMismatch, |b| {
            rmi(
                b,
                Imul,
                RAX,
                &GprMem::Mem(Amode::imm_reg(RBP, 0, PtrSize::Byte)),
                1,
            )
        });
    }
}
