//! Machine-code emission from Basalt's machine IR (MIR) for x86-64.
//!
//! The MIR is a columnar table of tagged instructions produced by the
//! register-allocated lowering upstream of this crate. [`emit`] walks it
//! in program order, selects an operand-encoding form for each
//! instruction, and drives the `basalt-assembler-x64` encoders to produce
//! a flat code buffer, together with:
//!
//! - branch relocations, resolved in-place once every instruction offset
//!   is known;
//! - external (Mach-O) relocation records for calls to external symbols
//!   and GOT-relative address loads, pushed to the linker's list;
//! - DWARF or Plan9 debug-line streams, and argument debug info, written
//!   through a borrowed [`debug::DebugOutput`] sink.

pub mod debug;
pub mod emit;
pub mod mir;
pub mod reloc;
pub mod result;


pub use emit::{emit, Emit};
pub use result::{CodegenError, CodegenResult};

/// The object format the linker will write; re-exported for callers
/// assembling an [`emit`] invocation.
pub use object::BinaryFormat;
