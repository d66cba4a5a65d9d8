//! A Basalt-specific x64 assembler.
//!
//! This crate knows how to turn instruction mnemonics with typed operands
//! into legal x86-64 byte sequences: REX prefixing, opcode selection,
//! ModR/M and SIB construction, displacement and immediate sizing. Each
//! operand-encoding form from the Intel SDM (`ZO`, `I`, `D`, `O`, `M`,
//! `MI`, `MR`, `RM`, `OI`, `FD`, `TD`, `RMI`) has one lowering function in
//! the [`encode`] module which validates its operand-shape contract and
//! drives a [`CodeSink`].
//!
//! ```
//! use basalt_assembler_x64::{encode, gpr, CodeBuffer, GprMem, Mnemonic};
//!
//! // mov rax, 0x10
//! let mut buf = CodeBuffer::new();
//! encode::mi(&mut buf, Mnemonic::Mov, &GprMem::Gpr(gpr::RAX), 0x10).unwrap();
//! assert_eq!(buf.as_slice(), &[0x48, 0xC7, 0xC0, 0x10, 0x00, 0x00, 0x00]);
//! ```

mod api;
pub mod encode;
mod mem;
mod opcodes;
mod reg;
mod rex;

pub use api::{CodeBuffer, CodeOffset, CodeSink};
pub use mem::{Amode, GprMem, PtrSize, Scale};
pub use opcodes::{modrm_ext, opcode, Form, Mnemonic, Opcode};
pub use reg::{gpr, Gpr, Size};
pub use rex::RexFlags;

/// The runtime-returned failures of the encoding layer.
///
/// Everything else that can go wrong here — an opcode-table miss, an
/// unused operand combination — is a structural bug in the caller and
/// panics instead.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Operand widths do not match the selected encoding form.
    #[error("operand size mismatch")]
    OperandSizeMismatch,
    /// The FD/TD forms address memory through the accumulator only.
    #[error("expected an accumulator (rax-family) register operand")]
    RaxOperandExpected,
    /// The code buffer could not grow.
    #[error("out of memory while growing the code buffer")]
    OutOfMemory,
    /// A displacement does not fit in 32 bits.
    #[error("displacement does not fit in 32 bits")]
    Overflow,
}
