//! Check emitted bytes against a known-good disassembler.
//!
//! Every encoding must decode as exactly one instruction, consume every
//! emitted byte, and carry the mnemonic the lowerer was asked for.

use basalt_assembler_x64::{encode, gpr::*, Amode, CodeBuffer, Error, GprMem, Mnemonic, PtrSize};
use capstone::arch::x86;
use capstone::arch::{BuildsCapstone, BuildsCapstoneSyntax};
use capstone::Capstone;

fn disassembler() -> Capstone {
    Capstone::new()
        .x86()
        .mode(x86::ArchMode::Mode64)
        .syntax(x86::ArchSyntax::Intel)
        .build()
        .expect("failed to create Capstone object")
}

fn pretty_print_hexadecimal(hex: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(hex.len() * 2);
    for b in hex {
        write!(&mut s, "{b:02X}").unwrap();
    }
    s
}

/// Encode one instruction and check it against capstone.
fn roundtrip(expected_mnemonic: &str, f: impl FnOnce(&mut CodeBuffer) -> Result<(), Error>) {
    let mut buf = CodeBuffer::new();
    f(&mut buf).expect("encoding must succeed");
    let assembled = buf.finish();

    let cs = disassembler();
    let insts = cs.disasm_all(&assembled, 0x0).expect("failed to disassemble");
    assert_eq!(
        insts.len(),
        1,
        "not a single instruction: {}",
        pretty_print_hexadecimal(&assembled)
    );

    let inst = insts.first().expect("at least one instruction");
    assert_eq!(
        assembled.len(),
        inst.len(),
        "extra bytes not disassembled: {}",
        pretty_print_hexadecimal(&assembled)
    );
    assert_eq!(
        Some(expected_mnemonic),
        inst.mnemonic(),
        "wrong mnemonic for {}",
        pretty_print_hexadecimal(&assembled)
    );
}

#[test]
fn zero_operand_instructions() {
    roundtrip("ret", |b| encode::zo(b, Mnemonic::RetNear));
    roundtrip("retf", |b| encode::zo(b, Mnemonic::RetFar));
    roundtrip("int3", |b| encode::zo(b, Mnemonic::Brk));
    roundtrip("nop", |b| encode::zo(b, Mnemonic::Nop));
    roundtrip("syscall", |b| encode::zo(b, Mnemonic::Syscall));
}

#[test]
fn register_immediate_moves() {
    roundtrip("mov", |b| encode::mi(b, Mnemonic::Mov, &GprMem::Gpr(RAX), 0x10));
    roundtrip("movabs", |b| encode::oi(b, Mnemonic::Mov, RAX, 0x1000_0000_0000_0000));
    roundtrip("mov", |b| encode::oi(b, Mnemonic::Mov, RBX.to32(), 0x1234_5678));
}

#[test]
fn memory_destination_arithmetic() {
    roundtrip("mov", |b| {
        encode::mi(
            b,
            Mnemonic::Mov,
            &GprMem::Mem(Amode::imm_reg(R11, 0, PtrSize::Dword)),
            0x10,
        )
    });
    roundtrip("sub", |b| {
        encode::mi(
            b,
            Mnemonic::Sub,
            &GprMem::Mem(Amode::imm_reg(R11, 0x1000_0000, PtrSize::Dword)),
            0x10,
        )
    });
    roundtrip("add", |b| {
        encode::mr(
            b,
            Mnemonic::Add,
            &GprMem::Mem(Amode::imm_reg(RSP, 0, PtrSize::Qword)),
            RBX,
        )
    });
    roundtrip("or", |b| {
        encode::rm(
            b,
            Mnemonic::Or,
            RBX.to8(),
            &GprMem::Mem(Amode::imm_reg(RBP, 0, PtrSize::Byte)),
        )
    });
}

#[test]
fn control_flow() {
    roundtrip("jmp", |b| encode::d(b, Mnemonic::JmpNear, 0));
    roundtrip("call", |b| encode::d(b, Mnemonic::CallNear, 0));
    roundtrip("je", |b| encode::d(b, Mnemonic::Je, 0));
    roundtrip("jmp", |b| {
        encode::m(
            b,
            Mnemonic::JmpNear,
            &GprMem::Mem(Amode::imm_reg(R12, 0x1000, PtrSize::Qword)),
        )
    });
    roundtrip("call", |b| encode::m(b, Mnemonic::CallNear, &GprMem::Gpr(R11)));
}

#[test]
fn stack_and_flag_operations() {
    roundtrip("push", |b| encode::o(b, Mnemonic::Push, R12.to16()));
    roundtrip("push", |b| encode::o(b, Mnemonic::Push, RBP));
    roundtrip("pop", |b| encode::o(b, Mnemonic::Pop, R12));
    roundtrip("push", |b| encode::i(b, Mnemonic::Push, 0x10));
    roundtrip("seta", |b| encode::m(b, Mnemonic::Seta, &GprMem::Gpr(R11.to8())));
    roundtrip("setge", |b| encode::m(b, Mnemonic::Setge, &GprMem::Gpr(AH)));
    roundtrip("test", |b| encode::mi(b, Mnemonic::Test, &GprMem::Gpr(RBX), 0x10));
    roundtrip("test", |b| {
        encode::i_acc(b, Mnemonic::Test, basalt_assembler_x64::Size::Quadword, 0x10)
    });
}

#[test]
fn address_generation() {
    roundtrip("lea", |b| {
        encode::rm(
            b,
            Mnemonic::Lea,
            RAX,
            &GprMem::Mem(Amode::rip(0x10, PtrSize::Qword)),
        )
    });
    roundtrip("imul", |b| {
        encode::rmi(
            b,
            Mnemonic::Imul,
            RAX,
            &GprMem::Mem(Amode::imm_reg(RBP, -8, PtrSize::Qword)),
            0x10,
        )
    });
}
