//! Result and error types for code generation.

use basalt_assembler_x64 as asm;

/// A fatal code-generation error.
///
/// The session aborts at the first error; nothing is retried. Selection
/// failures indicate a bug in the MIR producer or in the opcode tables,
/// while the resource variants are propagated verbatim from the encoding
/// layer.
#[derive(Debug, thiserror::Error)]
pub enum CodegenError {
    /// Instruction selection failed; the message names the offending tag.
    #[error("instruction selection failed: {0}")]
    IselFail(String),
    /// The code buffer could not grow.
    #[error("out of memory while growing the code buffer")]
    OutOfMemory,
    /// A branch displacement does not fit in 32 bits.
    #[error("branch displacement does not fit in 32 bits")]
    Overflow,
}

/// A convenient alias for code-generation results.
pub type CodegenResult<T> = Result<T, CodegenError>;

impl CodegenError {
    /// Wrap an encoding-layer error, keeping the offending tag's name in
    /// the message for the selection failures.
    pub(crate) fn from_asm(tag: crate::mir::Tag, err: asm::Error) -> Self {
        match err {
            asm::Error::OutOfMemory => CodegenError::OutOfMemory,
            asm::Error::Overflow => CodegenError::Overflow,
            err => CodegenError::IselFail(format!("{tag:?}: {err}")),
        }
    }
}
