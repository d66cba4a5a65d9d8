//! Byte-emission interfaces: the [`CodeSink`] seam and the owned
//! [`CodeBuffer`] behind it.

use crate::Error;

/// Offset in bytes from the beginning of the function.
///
/// The assembler can run as a cross compiler, so we don't want a type like
/// `usize` which depends on the *host* platform, not the *target* platform.
pub type CodeOffset = u32;

/// Describe how an instruction is emitted into a code buffer.
pub trait CodeSink {
    /// Add 1 byte to the code section.
    fn put1(&mut self, _: u8);

    /// Add 2 bytes to the code section.
    fn put2(&mut self, _: u16);

    /// Add 4 bytes to the code section.
    fn put4(&mut self, _: u32);

    /// Add 8 bytes to the code section.
    fn put8(&mut self, _: u64);

    /// Return the byte offset of the current location in the code buffer.
    fn current_offset(&self) -> CodeOffset;
}

/// Provide a convenient implementation for testing.
impl CodeSink for Vec<u8> {
    fn put1(&mut self, v: u8) {
        self.push(v);
    }

    fn put2(&mut self, v: u16) {
        self.extend_from_slice(&v.to_le_bytes());
    }

    fn put4(&mut self, v: u32) {
        self.extend_from_slice(&v.to_le_bytes());
    }

    fn put8(&mut self, v: u64) {
        self.extend_from_slice(&v.to_le_bytes());
    }

    fn current_offset(&self) -> CodeOffset {
        self.len().try_into().unwrap()
    }
}

/// A growable machine-code buffer.
///
/// Lowering functions call [`CodeBuffer::reserve`] once with a worst-case
/// instruction length and then emit through the infallible [`CodeSink`]
/// methods; allocation failure is surfaced as [`Error::OutOfMemory`]
/// rather than aborting.
#[derive(Default, Debug)]
pub struct CodeBuffer {
    data: Vec<u8>,
}

impl CodeBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure at least `additional` bytes of unused capacity.
    pub fn reserve(&mut self, additional: usize) -> Result<(), Error> {
        self.data
            .try_reserve(additional)
            .map_err(|_| Error::OutOfMemory)
    }

    /// Current length in bytes.
    pub fn cur_offset(&self) -> CodeOffset {
        self.data.len().try_into().unwrap()
    }

    /// The bytes emitted so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Overwrite the 4 bytes at `offset` with `value`, little-endian.
    ///
    /// # Panics
    ///
    /// Panics if `offset + 4` is out of bounds; back-patch sites are always
    /// inside already-emitted instructions.
    pub fn patch_i32_le(&mut self, offset: CodeOffset, value: i32) {
        let offset = offset as usize;
        self.data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Read back 4 little-endian bytes at `offset`.
    pub fn read_i32_le(&self, offset: CodeOffset) -> i32 {
        let offset = offset as usize;
        i32::from_le_bytes(self.data[offset..offset + 4].try_into().unwrap())
    }

    /// Consume the buffer, handing the finished code to the caller.
    pub fn finish(self) -> Vec<u8> {
        self.data
    }
}

impl CodeSink for CodeBuffer {
    fn put1(&mut self, v: u8) {
        self.data.push(v);
    }

    fn put2(&mut self, v: u16) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    fn put4(&mut self, v: u32) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    fn put8(&mut self, v: u64) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    fn current_offset(&self) -> CodeOffset {
        self.cur_offset()
    }
}
