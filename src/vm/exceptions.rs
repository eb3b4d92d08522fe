//! The VM's exception-handler wire format.
//!
//! Each record is exactly [`RECORD_SIZE`] bytes, little-endian where
//! multi-byte:
//!
//! ```text
//! u8  vm_handler_type   // 0=Exception, 1=Finally, 2=Filter (4=Fault reserved)
//! i32 catch_type_token
//! u32 try_start
//! u32 handler_start
//! u32 try_length
//! u32 filter_start      // meaningful only for Filter
//! ```

use crate::{crypto::CipherStream, file::parser::Parser, Error, Result};

/// Serialized size of one handler record.
pub const RECORD_SIZE: usize = 21;

/// Handler kinds the VM serializes.
///
/// Kind 4 (fault) appears reserved in the VM's own tables but is never
/// emitted by identified builds; it is rejected as
/// [`Error::UnsupportedHandlerKind`] like every other unknown value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmHandlerKind {
    /// Typed catch clause.
    Exception = 0,
    /// Finally clause.
    Finally = 1,
    /// Filter clause.
    Filter = 2,
}

impl VmHandlerKind {
    /// Decode the kind byte.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedHandlerKind`] for every byte outside
    /// `0..=2`, including the reserved fault kind 4.
    pub fn from_byte(byte: u8) -> Result<VmHandlerKind> {
        match byte {
            0 => Ok(VmHandlerKind::Exception),
            1 => Ok(VmHandlerKind::Finally),
            2 => Ok(VmHandlerKind::Filter),
            other => Err(Error::UnsupportedHandlerKind(other)),
        }
    }
}

/// One exception-handler record as serialized in the bytecode stream.
///
/// Positions are byte offsets relative to the start of the owning method's
/// instruction section; the translator converts them to instruction indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmExceptionHandler {
    /// The handling clause kind.
    pub kind: VmHandlerKind,
    /// Resolver id of the caught type; meaningful only for
    /// [`VmHandlerKind::Exception`].
    pub catch_token: i32,
    /// Byte offset of the try region.
    pub try_start: u32,
    /// Byte offset of the handler region.
    pub handler_start: u32,
    /// Byte length of the try region.
    pub try_length: u32,
    /// Byte offset of the filter block; meaningful only for
    /// [`VmHandlerKind::Filter`].
    pub filter_start: u32,
}

impl VmExceptionHandler {
    /// Parse one record from a byte slice.
    ///
    /// # Errors
    /// Returns [`Error::OutOfBounds`] on truncated input and
    /// [`Error::UnsupportedHandlerKind`] on unknown kind bytes.
    pub fn parse(data: &[u8]) -> Result<VmExceptionHandler> {
        let mut parser = Parser::new(data);
        let kind = VmHandlerKind::from_byte(parser.read_le::<u8>()?)?;
        Ok(VmExceptionHandler {
            kind,
            catch_token: parser.read_le::<i32>()?,
            try_start: parser.read_le::<u32>()?,
            handler_start: parser.read_le::<u32>()?,
            try_length: parser.read_le::<u32>()?,
            filter_start: parser.read_le::<u32>()?,
        })
    }

    /// Read one record from the cipher stream.
    ///
    /// # Errors
    /// Returns [`Error::OutOfBounds`] if the stream ends inside the record
    /// and [`Error::UnsupportedHandlerKind`] on unknown kind bytes.
    pub fn read(stream: &mut CipherStream) -> Result<VmExceptionHandler> {
        let mut record = [0u8; RECORD_SIZE];
        stream.read_exact(&mut record)?;
        VmExceptionHandler::parse(&record)
    }

    /// Serialize this record into its 21-byte wire form.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut record = [0u8; RECORD_SIZE];
        record[0] = self.kind as u8;
        record[1..5].copy_from_slice(&self.catch_token.to_le_bytes());
        record[5..9].copy_from_slice(&self.try_start.to_le_bytes());
        record[9..13].copy_from_slice(&self.handler_start.to_le_bytes());
        record[13..17].copy_from_slice(&self.try_length.to_le_bytes());
        record[17..21].copy_from_slice(&self.filter_start.to_le_bytes());
        record
    }
}
