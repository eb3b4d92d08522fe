//! CIL instruction processing: the opcode set, the instruction model, and the
//! instruction-section codec.
//!
//! # Key Types
//! - [`CilOpCode`] - one ECMA-335 opcode as a `(prefix, code)` pair
//! - [`Instruction`] / [`Operand`] - decoded instruction representation
//! - [`ops`] - named constants for the whole opcode set
//!
//! # Main Functions
//! - [`decode_instructions`] - section bytes to instructions
//! - [`patch_branch_targets`] - byte-offset operands to instruction indices
//! - [`encode_instructions`] - instructions back to section bytes

pub mod decoder;
pub mod encoder;
pub mod instruction;
pub mod opcode;

pub use decoder::{decode_instruction, decode_instructions, patch_branch_targets};
pub use encoder::encode_instructions;
pub use instruction::{Instruction, Operand};
pub use opcode::{ops, CilFlow, CilOpCode, CilOperandKind, OpDescriptor};
