//! Binary machine code emission: MIR dispatch, branch relocation, and
//! back-patching.
//!
//! [`Emit`] walks the MIR in program order, records each instruction's
//! start offset, and lowers it through the encoding-form functions of
//! `basalt-assembler-x64`. Forward branches are emitted with a 32-bit
//! displacement placeholder and patched once every offset is known.

use basalt_assembler_x64::{
    encode, gpr, Amode, CodeBuffer, CodeOffset, Gpr, GprMem, Mnemonic, PtrSize, Scale, Size,
};
use cranelift_entity::PrimaryMap;
use log::{debug, trace};
use object::BinaryFormat;
use smallvec::SmallVec;

use crate::debug::DebugOutput;
use crate::mir::{ArgLoc, InstData, Mir, MirInst, Ops, Tag};
use crate::reloc::MachReloc;
use crate::result::{CodegenError, CodegenResult};

/// The callee-preserved registers of the System V x86-64 ABI, in the
/// order the register-list push/pop instructions walk them.
pub const CALLEE_PRESERVED_REGS: [Gpr; 5] = [gpr::RBX, gpr::R12, gpr::R13, gpr::R14, gpr::R15];

/// A pending rel32 branch fixup.
///
/// Once every instruction offset is known, the 4 bytes at `patch_offset`
/// receive `offset_of(target) - (source + length)`.
struct BranchReloc {
    source: CodeOffset,
    target: MirInst,
    patch_offset: CodeOffset,
    length: u8,
}

/// Session state for lowering one function's MIR to machine code.
///
/// The session owns the code buffer, the instruction-offset map, and the
/// branch-relocation list; the MIR is borrowed read-only, and the debug
/// and external-relocation sinks are borrowed mutably for its duration.
pub struct Emit<'a> {
    mir: &'a Mir,
    buf: CodeBuffer,
    offsets: PrimaryMap<MirInst, CodeOffset>,
    branch_relocs: SmallVec<[BranchReloc; 8]>,
    debug: DebugOutput<'a>,
    format: BinaryFormat,
    relocs: &'a mut Vec<MachReloc>,
    args: &'a [ArgLoc],
    prev_line: u32,
    prev_column: u32,
    prev_pc: CodeOffset,
}

/// Lower `mir` to machine code.
///
/// External relocations are pushed to `relocs`; `args` supplies the
/// runtime locations referenced by argument debug info.
pub fn emit(
    mir: &Mir,
    debug: DebugOutput<'_>,
    format: BinaryFormat,
    relocs: &mut Vec<MachReloc>,
    args: &[ArgLoc],
) -> CodegenResult<Vec<u8>> {
    Emit::new(mir, debug, format, relocs, args).run()
}

impl<'a> Emit<'a> {
    /// Set up a session over `mir`.
    pub fn new(
        mir: &'a Mir,
        debug: DebugOutput<'a>,
        format: BinaryFormat,
        relocs: &'a mut Vec<MachReloc>,
        args: &'a [ArgLoc],
    ) -> Self {
        Emit {
            mir,
            buf: CodeBuffer::new(),
            offsets: PrimaryMap::new(),
            branch_relocs: SmallVec::new(),
            debug,
            format,
            relocs,
            args,
            // The DWARF line-number state machine starts its line
            // register at 1.
            prev_line: 1,
            prev_column: 0,
            prev_pc: 0,
        }
    }

    /// Emit every instruction, resolve branch relocations, and hand the
    /// finished code to the caller.
    pub fn run(mut self) -> CodegenResult<Vec<u8>> {
        for inst in self.mir.insts() {
            let offset = self.buf.cur_offset();
            let key = self.offsets.push(offset);
            debug_assert_eq!(key, inst);
            self.emit_inst(inst)?;
        }
        self.apply_branch_relocs()?;
        debug!(
            "emitted {} instructions into {} bytes",
            self.mir.len(),
            self.buf.cur_offset()
        );
        Ok(self.buf.finish())
    }

    fn emit_inst(&mut self, inst: MirInst) -> CodegenResult<()> {
        let tag = self.mir.tag(inst);
        let ops = self.mir.ops(inst);
        trace!(
            "lowering {inst} at {:#x}: {tag:?} flags={:#04b}",
            self.buf.cur_offset(),
            ops.flags
        );
        use Tag::*;
        match tag {
            Adc | Add | Sub | Xor | And | Or | Sbb | Cmp | Mov => {
                self.emit_bin_op(inst, tag, ops)
            }
            AdcMemImm | AddMemImm | SubMemImm | XorMemImm | AndMemImm | OrMemImm | SbbMemImm
            | CmpMemImm | MovMemImm => self.emit_mem_imm(inst, tag, ops),
            AdcScaleSrc | AddScaleSrc | SubScaleSrc | XorScaleSrc | AndScaleSrc | OrScaleSrc
            | SbbScaleSrc | CmpScaleSrc | MovScaleSrc => self.emit_scale_src(inst, tag, ops),
            AdcScaleDst | AddScaleDst | SubScaleDst | XorScaleDst | AndScaleDst | OrScaleDst
            | SbbScaleDst | CmpScaleDst | MovScaleDst => self.emit_scale_dst(inst, tag, ops),
            AdcScaleImm | AddScaleImm | SubScaleImm | XorScaleImm | AndScaleImm | OrScaleImm
            | SbbScaleImm | CmpScaleImm | MovScaleImm => self.emit_scale_imm(inst, tag, ops),
            Movabs => self.emit_movabs(inst, tag, ops),
            Lea => self.emit_lea(inst, tag, ops),
            ImulComplex => self.emit_imul_complex(inst, tag, ops),
            Push | Pop => self.emit_push_pop(inst, tag, ops),
            PushCalleePreservedRegs | PopCalleePreservedRegs => self.emit_reg_list(inst, tag),
            Jmp | Call => self.emit_jmp_call(inst, tag, ops),
            CondJmpGreaterLess | CondJmpAboveBelow | CondJmpEqNe => {
                self.emit_cond_jmp(inst, tag, ops)
            }
            CondSetByteGreaterLess | CondSetByteAboveBelow | CondSetByteEqNe => {
                self.emit_cond_set_byte(tag, ops)
            }
            Test => self.emit_test(inst, tag, ops),
            Ret => self.emit_ret(inst, tag, ops),
            Brk => {
                encode::zo(&mut self.buf, Mnemonic::Brk)
                    .map_err(|e| CodegenError::from_asm(tag, e))
            }
            Nop => {
                encode::zo(&mut self.buf, Mnemonic::Nop)
                    .map_err(|e| CodegenError::from_asm(tag, e))
            }
            Syscall => encode::zo(&mut self.buf, Mnemonic::Syscall)
                .map_err(|e| CodegenError::from_asm(tag, e)),
            DbgLine => {
                let payload = self.data_payload(inst, tag)?;
                let lc = self.mir.dbg_line_column_at(payload);
                self.advance_pc_and_line(lc.line, lc.column);
                Ok(())
            }
            DbgPrologueEnd => {
                self.debug.set_prologue_end();
                let (line, column) = (self.prev_line, self.prev_column);
                self.advance_pc_and_line(line, column);
                Ok(())
            }
            DbgEpilogueBegin => {
                self.debug.set_epilogue_begin();
                let (line, column) = (self.prev_line, self.prev_column);
                self.advance_pc_and_line(line, column);
                Ok(())
            }
            ArgDbgInfo => self.emit_arg_dbg_info(inst, tag),
            CallExtern => self.emit_call_extern(inst, tag),
        }
    }

    /// The base binary operations: register/register, register/immediate,
    /// and register/memory shapes chosen by the flags.
    fn emit_bin_op(&mut self, inst: MirInst, tag: Tag, ops: Ops) -> CodegenResult<()> {
        let mnemonic = bin_op_mnemonic(tag);
        let reg1 = require_reg1(tag, ops)?;
        let res = match ops.flags {
            0b00 => match ops.reg2 {
                None => {
                    let imm = self.data_imm(inst, tag)?;
                    encode::mi(&mut self.buf, mnemonic, &GprMem::Gpr(reg1), imm)
                }
                Some(reg2) => encode::rm(&mut self.buf, mnemonic, reg1, &GprMem::Gpr(reg2)),
            },
            0b01 => {
                let base = require_reg2(tag, ops)?;
                let disp = self.data_imm(inst, tag)?;
                let mem = Amode::imm_reg(base, disp, PtrSize::of(reg1.size()));
                encode::rm(&mut self.buf, mnemonic, reg1, &GprMem::Mem(mem))
            }
            0b10 => {
                let src = require_reg2(tag, ops)?;
                let disp = self.data_imm(inst, tag)?;
                let mem = Amode::imm_reg(reg1, disp, PtrSize::of(src.size()));
                encode::mr(&mut self.buf, mnemonic, &GprMem::Mem(mem), src)
            }
            _ => return Err(unused_flags(tag, ops.flags)),
        };
        res.map_err(|e| CodegenError::from_asm(tag, e))
    }

    /// `OP ptr [base + off], imm`, with the pointer size in the flags. A
    /// missing base register addresses relative to RIP.
    fn emit_mem_imm(&mut self, inst: MirInst, tag: Tag, ops: Ops) -> CodegenResult<()> {
        let mnemonic = bin_op_mnemonic(tag);
        let payload = self.data_payload(inst, tag)?;
        let pair = self.mir.imm_pair_at(payload);
        let size = ptr_size_from_flags(ops.flags);
        let mem = match ops.reg1 {
            Some(base) => Amode::imm_reg(base, pair.dest_off, size),
            None => Amode::rip(pair.dest_off, size),
        };
        encode::mi(&mut self.buf, mnemonic, &GprMem::Mem(mem), pair.operand)
            .map_err(|e| CodegenError::from_asm(tag, e))
    }

    /// `OP reg1, [reg2 + scale*rcx + off]`.
    fn emit_scale_src(&mut self, inst: MirInst, tag: Tag, ops: Ops) -> CodegenResult<()> {
        let mnemonic = bin_op_mnemonic(tag);
        let reg1 = require_reg1(tag, ops)?;
        let base = require_reg2(tag, ops)?;
        let disp = self.data_imm(inst, tag)?;
        let mem = Amode::imm_reg_reg_shift(
            base,
            gpr::RCX,
            Scale::new(ops.flags),
            disp,
            PtrSize::of(reg1.size()),
        );
        encode::rm(&mut self.buf, mnemonic, reg1, &GprMem::Mem(mem))
            .map_err(|e| CodegenError::from_asm(tag, e))
    }

    /// `OP [reg1 + scale*rax + off], reg2`.
    fn emit_scale_dst(&mut self, inst: MirInst, tag: Tag, ops: Ops) -> CodegenResult<()> {
        let mnemonic = bin_op_mnemonic(tag);
        let base = require_reg1(tag, ops)?;
        let src = require_reg2(tag, ops)?;
        let disp = self.data_imm(inst, tag)?;
        let mem = Amode::imm_reg_reg_shift(
            base,
            gpr::RAX,
            Scale::new(ops.flags),
            disp,
            PtrSize::of(src.size()),
        );
        encode::mr(&mut self.buf, mnemonic, &GprMem::Mem(mem), src)
            .map_err(|e| CodegenError::from_asm(tag, e))
    }

    /// `OP dword ptr [reg1 + scale*rax + off], imm`.
    fn emit_scale_imm(&mut self, inst: MirInst, tag: Tag, ops: Ops) -> CodegenResult<()> {
        let mnemonic = bin_op_mnemonic(tag);
        let base = require_reg1(tag, ops)?;
        let payload = self.data_payload(inst, tag)?;
        let pair = self.mir.imm_pair_at(payload);
        let mem = Amode::imm_reg_reg_shift(
            base,
            gpr::RAX,
            Scale::new(ops.flags),
            pair.dest_off,
            PtrSize::Dword,
        );
        encode::mi(&mut self.buf, mnemonic, &GprMem::Mem(mem), pair.operand)
            .map_err(|e| CodegenError::from_asm(tag, e))
    }

    /// `mov reg, imm64` and the accumulator/memory-offset moves.
    fn emit_movabs(&mut self, inst: MirInst, tag: Tag, ops: Ops) -> CodegenResult<()> {
        let res = if ops.flags == 0b00 {
            let reg = require_reg1(tag, ops)?;
            let imm = if reg.size() == Size::Quadword {
                let payload = self.data_payload(inst, tag)?;
                self.mir.imm64_at(payload)
            } else {
                self.data_imm(inst, tag)? as i64 as u64
            };
            encode::oi(&mut self.buf, Mnemonic::Mov, reg, imm)
        } else {
            let payload = self.data_payload(inst, tag)?;
            let moffs = self.mir.imm64_at(payload);
            match ops.reg1 {
                None => encode::td(&mut self.buf, Mnemonic::Mov, moffs, gpr::RAX),
                Some(reg) => encode::fd(&mut self.buf, Mnemonic::Mov, reg, moffs),
            }
        };
        res.map_err(|e| CodegenError::from_asm(tag, e))
    }

    fn emit_lea(&mut self, inst: MirInst, tag: Tag, ops: Ops) -> CodegenResult<()> {
        let reg = require_reg1(tag, ops)?;
        match ops.flags {
            0b00 => {
                let base = require_reg2(tag, ops)?;
                let disp = self.data_imm(inst, tag)?;
                let mem = Amode::imm_reg(base, disp, PtrSize::of(reg.size()));
                encode::rm(&mut self.buf, Mnemonic::Lea, reg, &GprMem::Mem(mem))
                    .map_err(|e| CodegenError::from_asm(tag, e))
            }
            // RIP-relative with a known byte offset: emit with a zero
            // displacement, then rewrite the last 4 bytes relative to the
            // end of the instruction.
            0b01 => {
                let payload = self.data_payload(inst, tag)?;
                let imm = self.mir.imm64_at(payload) as i64;
                let start = self.buf.cur_offset();
                let mem = Amode::rip(0, PtrSize::of(reg.size()));
                encode::rm(&mut self.buf, Mnemonic::Lea, reg, &GprMem::Mem(mem))
                    .map_err(|e| CodegenError::from_asm(tag, e))?;
                let end = self.buf.cur_offset();
                let disp = i32::try_from(imm - i64::from(end - start))
                    .map_err(|_| CodegenError::Overflow)?;
                self.buf.patch_i32_le(end - 4, disp);
                Ok(())
            }
            // RIP-relative through the GOT: leave the displacement for
            // the linker.
            0b10 => {
                if self.format != BinaryFormat::MachO {
                    return Err(CodegenError::IselFail(format!(
                        "{tag:?}: GOT relocations are only supported for Mach-O, not {:?}",
                        self.format
                    )));
                }
                let got_entry = self.data_got_entry(inst, tag)?;
                let mem = Amode::rip(0, PtrSize::of(reg.size()));
                encode::rm(&mut self.buf, Mnemonic::Lea, reg, &GprMem::Mem(mem))
                    .map_err(|e| CodegenError::from_asm(tag, e))?;
                self.relocs
                    .push(MachReloc::got(self.buf.cur_offset() - 4, got_entry));
                Ok(())
            }
            _ => Err(unused_flags(tag, ops.flags)),
        }
    }

    fn emit_imul_complex(&mut self, inst: MirInst, tag: Tag, ops: Ops) -> CodegenResult<()> {
        let reg1 = require_reg1(tag, ops)?;
        let res = match ops.flags {
            0b00 => {
                let reg2 = require_reg2(tag, ops)?;
                encode::rm(&mut self.buf, Mnemonic::Imul, reg1, &GprMem::Gpr(reg2))
            }
            0b10 => {
                let base = require_reg2(tag, ops)?;
                let payload = self.data_payload(inst, tag)?;
                let pair = self.mir.imm_pair_at(payload);
                let mem = Amode::imm_reg(base, pair.dest_off, PtrSize::of(reg1.size()));
                encode::rmi(
                    &mut self.buf,
                    Mnemonic::Imul,
                    reg1,
                    &GprMem::Mem(mem),
                    pair.operand,
                )
            }
            _ => {
                return Err(CodegenError::IselFail(format!(
                    "{tag:?}: unimplemented operand flags {:#04b}",
                    ops.flags
                )))
            }
        };
        res.map_err(|e| CodegenError::from_asm(tag, e))
    }

    fn emit_push_pop(&mut self, inst: MirInst, tag: Tag, ops: Ops) -> CodegenResult<()> {
        let mnemonic = if tag == Tag::Push {
            Mnemonic::Push
        } else {
            Mnemonic::Pop
        };
        let res = match ops.flags {
            0b00 => {
                let reg = require_reg1(tag, ops)?;
                encode::o(&mut self.buf, mnemonic, reg)
            }
            0b01 => {
                let base = require_reg1(tag, ops)?;
                let disp = self.data_imm(inst, tag)?;
                let mem = Amode::imm_reg(base, disp, PtrSize::Qword);
                encode::m(&mut self.buf, mnemonic, &GprMem::Mem(mem))
            }
            0b10 if tag == Tag::Push => {
                let imm = self.data_imm(inst, tag)?;
                encode::i(&mut self.buf, Mnemonic::Push, imm)
            }
            _ => return Err(unused_flags(tag, ops.flags)),
        };
        res.map_err(|e| CodegenError::from_asm(tag, e))
    }

    /// Push or pop the masked subset of [`CALLEE_PRESERVED_REGS`]; pops
    /// walk the list in reverse so the sequences pair up.
    fn emit_reg_list(&mut self, inst: MirInst, tag: Tag) -> CodegenResult<()> {
        let mask = self.data_reg_mask(inst, tag)?;
        let push = tag == Tag::PushCalleePreservedRegs;
        let mnemonic = if push { Mnemonic::Push } else { Mnemonic::Pop };
        let mut order: SmallVec<[Gpr; 8]> = SmallVec::new();
        for (i, &reg) in CALLEE_PRESERVED_REGS.iter().enumerate() {
            if mask & (1 << i) != 0 {
                order.push(reg);
            }
        }
        if !push {
            order.reverse();
        }
        for reg in order {
            encode::o(&mut self.buf, mnemonic, reg)
                .map_err(|e| CodegenError::from_asm(tag, e))?;
        }
        Ok(())
    }

    fn emit_jmp_call(&mut self, inst: MirInst, tag: Tag, ops: Ops) -> CodegenResult<()> {
        let mnemonic = if tag == Tag::Jmp {
            Mnemonic::JmpNear
        } else {
            Mnemonic::CallNear
        };
        match ops.flags {
            0b00 => {
                let target = self.data_inst(inst, tag)?;
                self.emit_branch_with_reloc(tag, mnemonic, target)
            }
            0b01 => {
                let res = match ops.reg1 {
                    None => {
                        let addr = self.data_imm(inst, tag)?;
                        let mem = Amode::offset(addr, PtrSize::Qword);
                        encode::m(&mut self.buf, mnemonic, &GprMem::Mem(mem))
                    }
                    Some(reg) => encode::m(&mut self.buf, mnemonic, &GprMem::Gpr(reg)),
                };
                res.map_err(|e| CodegenError::from_asm(tag, e))
            }
            _ => Err(unused_flags(tag, ops.flags)),
        }
    }

    fn emit_cond_jmp(&mut self, inst: MirInst, tag: Tag, ops: Ops) -> CodegenResult<()> {
        let mnemonic = cond_mnemonic(tag, ops.flags)?;
        let target = self.data_inst(inst, tag)?;
        self.emit_branch_with_reloc(tag, mnemonic, target)
    }

    /// Emit a rel32 branch with a zero placeholder and queue its fixup.
    fn emit_branch_with_reloc(
        &mut self,
        tag: Tag,
        mnemonic: Mnemonic,
        target: MirInst,
    ) -> CodegenResult<()> {
        let source = self.buf.cur_offset();
        encode::d(&mut self.buf, mnemonic, 0).map_err(|e| CodegenError::from_asm(tag, e))?;
        let end = self.buf.cur_offset();
        self.branch_relocs.push(BranchReloc {
            source,
            target,
            patch_offset: end - 4,
            length: (end - source) as u8,
        });
        Ok(())
    }

    fn emit_cond_set_byte(&mut self, tag: Tag, ops: Ops) -> CodegenResult<()> {
        let mnemonic = cond_mnemonic(tag, ops.flags)?;
        let reg = require_reg1(tag, ops)?;
        // The set-byte family always writes a byte register.
        let reg = if reg.size() == Size::Byte { reg } else { reg.to8() };
        encode::m(&mut self.buf, mnemonic, &GprMem::Gpr(reg))
            .map_err(|e| CodegenError::from_asm(tag, e))
    }

    fn emit_test(&mut self, inst: MirInst, tag: Tag, ops: Ops) -> CodegenResult<()> {
        if ops.flags != 0b00 {
            return Err(unused_flags(tag, ops.flags));
        }
        let reg1 = require_reg1(tag, ops)?;
        let res = match ops.reg2 {
            Some(reg2) => encode::mr(&mut self.buf, Mnemonic::Test, &GprMem::Gpr(reg1), reg2),
            None => {
                let imm = self.data_imm(inst, tag)?;
                if reg1.low3() == 0 && !reg1.is_extended() && !reg1.is_high_byte() {
                    // The accumulator has a shorter encoding.
                    encode::i_acc(&mut self.buf, Mnemonic::Test, reg1.size(), imm)
                } else {
                    encode::mi(&mut self.buf, Mnemonic::Test, &GprMem::Gpr(reg1), imm)
                }
            }
        };
        res.map_err(|e| CodegenError::from_asm(tag, e))
    }

    fn emit_ret(&mut self, inst: MirInst, tag: Tag, ops: Ops) -> CodegenResult<()> {
        let res = match ops.flags {
            0b00 => encode::zo(&mut self.buf, Mnemonic::RetNear),
            0b01 => {
                let imm = self.data_imm(inst, tag)?;
                encode::i(&mut self.buf, Mnemonic::RetNear, imm)
            }
            0b10 => encode::zo(&mut self.buf, Mnemonic::RetFar),
            0b11 => {
                let imm = self.data_imm(inst, tag)?;
                encode::i(&mut self.buf, Mnemonic::RetFar, imm)
            }
            _ => return Err(unused_flags(tag, ops.flags)),
        };
        res.map_err(|e| CodegenError::from_asm(tag, e))
    }

    fn emit_arg_dbg_info(&mut self, inst: MirInst, tag: Tag) -> CodegenResult<()> {
        let payload = self.data_payload(inst, tag)?;
        let rec = self.mir.arg_dbg_info_at(payload);
        let loc = self
            .args
            .get(rec.arg_index as usize)
            .copied()
            .ok_or_else(|| {
                CodegenError::IselFail(format!(
                    "{tag:?}: argument index {} out of range",
                    rec.arg_index
                ))
            })?;
        self.debug.add_arg(loc, rec.type_ref);
        Ok(())
    }

    fn emit_call_extern(&mut self, inst: MirInst, tag: Tag) -> CodegenResult<()> {
        if self.format != BinaryFormat::MachO {
            return Err(CodegenError::IselFail(format!(
                "{tag:?}: external-call relocations are only supported for Mach-O, not {:?}",
                self.format
            )));
        }
        let extern_fn = self.data_extern_fn(inst, tag)?;
        encode::d(&mut self.buf, Mnemonic::CallNear, 0)
            .map_err(|e| CodegenError::from_asm(tag, e))?;
        self.relocs
            .push(MachReloc::branch(self.buf.cur_offset() - 4, extern_fn));
        Ok(())
    }

    /// Advance the debug-line state machine to the current code offset.
    fn advance_pc_and_line(&mut self, line: u32, column: u32) {
        let cur = self.buf.cur_offset();
        let delta_line = i64::from(line) - i64::from(self.prev_line);
        let delta_pc = u64::from(cur - self.prev_pc);
        self.debug.advance_pc_and_line(line, delta_line, delta_pc);
        self.prev_line = line;
        self.prev_column = column;
        self.prev_pc = cur;
    }

    fn apply_branch_relocs(&mut self) -> CodegenResult<()> {
        for reloc in &self.branch_relocs {
            let Some(&target_offset) = self.offsets.get(reloc.target) else {
                return Err(CodegenError::IselFail(format!(
                    "branch to missing instruction {}",
                    reloc.target
                )));
            };
            let disp = i64::from(target_offset) - (i64::from(reloc.source) + i64::from(reloc.length));
            let disp = i32::try_from(disp).map_err(|_| CodegenError::Overflow)?;
            trace!(
                "patching branch at {:#x}: {} -> {disp:#x}",
                reloc.patch_offset,
                reloc.target
            );
            self.buf.patch_i32_le(reloc.patch_offset, disp);
        }
        Ok(())
    }

    fn data_imm(&self, inst: MirInst, tag: Tag) -> CodegenResult<i32> {
        match self.mir.data(inst) {
            InstData::Imm(v) => Ok(v),
            other => Err(bad_data(tag, "an immediate", other)),
        }
    }

    fn data_inst(&self, inst: MirInst, tag: Tag) -> CodegenResult<MirInst> {
        match self.mir.data(inst) {
            InstData::Inst(target) => Ok(target),
            other => Err(bad_data(tag, "a branch target", other)),
        }
    }

    fn data_payload(&self, inst: MirInst, tag: Tag) -> CodegenResult<u32> {
        match self.mir.data(inst) {
            InstData::Payload(p) => Ok(p),
            other => Err(bad_data(tag, "an extra-array payload", other)),
        }
    }

    fn data_extern_fn(&self, inst: MirInst, tag: Tag) -> CodegenResult<u32> {
        match self.mir.data(inst) {
            InstData::ExternFn(i) => Ok(i),
            other => Err(bad_data(tag, "an external function index", other)),
        }
    }

    fn data_got_entry(&self, inst: MirInst, tag: Tag) -> CodegenResult<u32> {
        match self.mir.data(inst) {
            InstData::GotEntry(i) => Ok(i),
            other => Err(bad_data(tag, "a GOT entry index", other)),
        }
    }

    fn data_reg_mask(&self, inst: MirInst, tag: Tag) -> CodegenResult<u64> {
        match self.mir.data(inst) {
            InstData::RegMask(m) => Ok(m),
            other => Err(bad_data(tag, "a register mask", other)),
        }
    }
}

/// The assembler mnemonic shared by a binary operation's five tag shapes.
fn bin_op_mnemonic(tag: Tag) -> Mnemonic {
    use Tag::*;
    match tag {
        Adc | AdcMemImm | AdcScaleSrc | AdcScaleDst | AdcScaleImm => Mnemonic::Adc,
        Add | AddMemImm | AddScaleSrc | AddScaleDst | AddScaleImm => Mnemonic::Add,
        Sub | SubMemImm | SubScaleSrc | SubScaleDst | SubScaleImm => Mnemonic::Sub,
        Xor | XorMemImm | XorScaleSrc | XorScaleDst | XorScaleImm => Mnemonic::Xor,
        And | AndMemImm | AndScaleSrc | AndScaleDst | AndScaleImm => Mnemonic::And,
        Or | OrMemImm | OrScaleSrc | OrScaleDst | OrScaleImm => Mnemonic::Or,
        Sbb | SbbMemImm | SbbScaleSrc | SbbScaleDst | SbbScaleImm => Mnemonic::Sbb,
        Cmp | CmpMemImm | CmpScaleSrc | CmpScaleDst | CmpScaleImm => Mnemonic::Cmp,
        Mov | MovMemImm | MovScaleSrc | MovScaleDst | MovScaleImm => Mnemonic::Mov,
        _ => unreachable!("not a binary-operation tag: {tag:?}"),
    }
}

/// The conditional mnemonic selected by a family tag and its 2-bit
/// discriminator.
fn cond_mnemonic(tag: Tag, flags: u8) -> CodegenResult<Mnemonic> {
    use Mnemonic::*;
    Ok(match (tag, flags) {
        (Tag::CondJmpGreaterLess, 0b00) => Jge,
        (Tag::CondJmpGreaterLess, 0b01) => Jg,
        (Tag::CondJmpGreaterLess, 0b10) => Jl,
        (Tag::CondJmpGreaterLess, 0b11) => Jle,
        (Tag::CondJmpAboveBelow, 0b00) => Jae,
        (Tag::CondJmpAboveBelow, 0b01) => Ja,
        (Tag::CondJmpAboveBelow, 0b10) => Jb,
        (Tag::CondJmpAboveBelow, 0b11) => Jbe,
        (Tag::CondJmpEqNe, 0b00) => Jne,
        (Tag::CondJmpEqNe, 0b01) => Je,
        (Tag::CondSetByteGreaterLess, 0b00) => Setge,
        (Tag::CondSetByteGreaterLess, 0b01) => Setg,
        (Tag::CondSetByteGreaterLess, 0b10) => Setl,
        (Tag::CondSetByteGreaterLess, 0b11) => Setle,
        (Tag::CondSetByteAboveBelow, 0b00) => Setae,
        (Tag::CondSetByteAboveBelow, 0b01) => Seta,
        (Tag::CondSetByteAboveBelow, 0b10) => Setb,
        (Tag::CondSetByteAboveBelow, 0b11) => Setbe,
        (Tag::CondSetByteEqNe, 0b00) => Setne,
        (Tag::CondSetByteEqNe, 0b01) => Sete,
        _ => return Err(unused_flags(tag, flags)),
    })
}

fn require_reg1(tag: Tag, ops: Ops) -> CodegenResult<Gpr> {
    ops.reg1.ok_or_else(|| {
        CodegenError::IselFail(format!("{tag:?}: missing first register operand"))
    })
}

fn require_reg2(tag: Tag, ops: Ops) -> CodegenResult<Gpr> {
    ops.reg2.ok_or_else(|| {
        CodegenError::IselFail(format!("{tag:?}: missing second register operand"))
    })
}

fn ptr_size_from_flags(flags: u8) -> PtrSize {
    match flags & 0b11 {
        0b00 => PtrSize::Byte,
        0b01 => PtrSize::Word,
        0b10 => PtrSize::Dword,
        _ => PtrSize::Qword,
    }
}

fn unused_flags(tag: Tag, flags: u8) -> CodegenError {
    CodegenError::IselFail(format!("{tag:?}: unused operand flags {flags:#04b}"))
}

fn bad_data(tag: Tag, wanted: &str, got: InstData) -> CodegenError {
    CodegenError::IselFail(format!("{tag:?}: expected {wanted}, found {got:?}"))
}
