//! The VM-side model: discovered opcodes, their operand layouts, the
//! finalized opcode table, and the dispatcher/exception wire formats.
//!
//! # Key Types
//! - [`opcode::VmOpcode`] - one discovered virtual instruction
//! - [`table::OpcodeTable`] - finalized `virtual_code -> VmOpcode` mapping
//! - [`exceptions::VmExceptionHandler`] - 21-byte handler wire record
//!
//! # Main Functions
//! - [`dispatcher::discover_opcodes`] - scan the VM ctor for registrations

pub mod dispatcher;
pub mod exceptions;
pub mod opcode;
pub mod table;

pub use dispatcher::discover_opcodes;
pub use exceptions::{VmExceptionHandler, VmHandlerKind, RECORD_SIZE};
pub use opcode::{ResolvedOpcode, SpecialOpcode, VirtualOperandType, VmOpcode};
pub use table::OpcodeTable;
