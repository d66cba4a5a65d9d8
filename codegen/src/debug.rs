//! Debug-line and argument debug-info sinks.
//!
//! Emission drives one of three sinks: a DWARF line-program writer, a
//! Plan9 line-table writer, or a discard sink. Each borrows the output
//! buffers its consumer owns; the PC/line delta state machine itself
//! lives with the emission session, which calls in here with the deltas
//! already computed.

use basalt_assembler_x64::Gpr;
use gimli::constants::{
    DW_LNS_advance_line, DW_LNS_advance_pc, DW_LNS_copy, DW_LNS_set_epilogue_begin,
    DW_LNS_set_prologue_end, DW_OP_breg6, DW_OP_reg0,
};
use gimli::leb128;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::mir::ArgLoc;

/// The abbreviation code for a formal-parameter debug-info entry, agreed
/// with the debug-info consumer's abbreviation table.
pub const ABBREV_PARAMETER: u8 = 0x05;

/// Pending type relocations: abstract type reference → offsets of 4-byte
/// placeholders in the debug-info buffer.
pub type PendingTypeRelocs = FxHashMap<u32, SmallVec<[u32; 4]>>;

/// DWARF output buffers, owned by the debug-info consumer.
#[derive(Debug)]
pub struct DwarfOutput<'a> {
    pub dbg_line: &'a mut Vec<u8>,
    pub dbg_info: &'a mut Vec<u8>,
    pub type_relocs: &'a mut PendingTypeRelocs,
}

/// Plan9 output buffers, owned by the debug-info consumer.
#[derive(Debug)]
pub struct Plan9Output<'a> {
    pub dbg_line: &'a mut Vec<u8>,
    /// First source line covered by the function; set on the first PC
    /// advance.
    pub start_line: &'a mut Option<u32>,
    /// Last source line seen.
    pub end_line: &'a mut u32,
    /// Index of the most recent PC-advancing opcode in `dbg_line`.
    pub pcop_change_index: &'a mut Option<u32>,
    /// The target's PC quantum.
    pub pc_quanta: u8,
}

/// Where debug output goes for one emission session.
#[derive(Debug, Default)]
pub enum DebugOutput<'a> {
    Dwarf(DwarfOutput<'a>),
    Plan9(Plan9Output<'a>),
    /// Discard all debug output.
    #[default]
    None,
}

impl DebugOutput<'_> {
    /// Record that the machine code advanced to `line` (now at absolute
    /// source line `line`, with the given deltas from the previous row).
    pub fn advance_pc_and_line(&mut self, line: u32, delta_line: i64, delta_pc: u64) {
        match self {
            DebugOutput::Dwarf(out) => {
                out.dbg_line.push(DW_LNS_advance_pc.0);
                leb128::write::unsigned(out.dbg_line, delta_pc)
                    .expect("writing to a Vec cannot fail");
                if delta_line != 0 {
                    out.dbg_line.push(DW_LNS_advance_line.0);
                    leb128::write::signed(out.dbg_line, delta_line)
                        .expect("writing to a Vec cannot fail");
                }
                out.dbg_line.push(DW_LNS_copy.0);
            }
            DebugOutput::Plan9(out) => {
                if delta_pc == 0 {
                    return;
                }
                if out.start_line.is_none() {
                    *out.start_line = Some(line);
                }
                *out.end_line = line;
                let quanta = i64::from(out.pc_quanta);
                let d_pc = delta_pc as i64 - quanta;
                let op = u8::try_from(d_pc / quanta + 128 - quanta)
                    .expect("PC delta exceeds a single Plan9 opcode");
                out.dbg_line.push(op);
                *out.pcop_change_index = Some(out.dbg_line.len() as u32 - 1);
            }
            DebugOutput::None => {}
        }
    }

    /// Mark the end of the function prologue at the current row.
    pub fn set_prologue_end(&mut self) {
        if let DebugOutput::Dwarf(out) = self {
            out.dbg_line.push(DW_LNS_set_prologue_end.0);
        }
    }

    /// Mark the beginning of the function epilogue at the current row.
    pub fn set_epilogue_begin(&mut self) {
        if let DebugOutput::Dwarf(out) = self {
            out.dbg_line.push(DW_LNS_set_epilogue_begin.0);
        }
    }

    /// Describe one function argument's runtime location, keying a
    /// pending type relocation on `type_ref`.
    pub fn add_arg(&mut self, loc: ArgLoc, type_ref: u32) {
        let DebugOutput::Dwarf(out) = self else {
            return;
        };
        out.dbg_info.push(ABBREV_PARAMETER);
        match loc {
            ArgLoc::Gpr(reg) => {
                // A one-byte exprloc: DW_OP_reg<N>.
                out.dbg_info.push(1);
                out.dbg_info.push(reg_location_op(reg));
            }
            ArgLoc::Stack(off) => {
                // Frame-base relative: DW_OP_breg6 <sleb offset>.
                let mut expr = vec![DW_OP_breg6.0];
                leb128::write::signed(&mut expr, i64::from(off))
                    .expect("writing to a Vec cannot fail");
                out.dbg_info.push(expr.len() as u8);
                out.dbg_info.extend_from_slice(&expr);
            }
        }
        // A 4-byte placeholder the consumer patches once the type's
        // debug-info entry has an offset.
        let offset = out.dbg_info.len() as u32;
        out.type_relocs.entry(type_ref).or_default().push(offset);
        out.dbg_info.extend_from_slice(&[0; 4]);
    }
}

/// The `DW_OP_reg<N>` opcode naming `reg` in DWARF's register numbering.
fn reg_location_op(reg: Gpr) -> u8 {
    DW_OP_reg0.0 + reg.dwarf_num()
}
