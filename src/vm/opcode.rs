//! Virtual opcode records and the operand-type mapping.

use crate::{cil::CilOpCode, metadata::token::Token, Error, Result};

/// Virtual opcodes with no single CIL equivalent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialOpcode {
    /// Invoke another virtualized method by metadata-token operand.
    EazCall,
}

impl SpecialOpcode {
    /// The numeric id of this special opcode.
    #[must_use]
    pub const fn id(self) -> u32 {
        match self {
            SpecialOpcode::EazCall => 0x8000_0000,
        }
    }

    /// Resolve a numeric id back to the special opcode it names.
    #[must_use]
    pub fn from_id(id: u32) -> Option<SpecialOpcode> {
        match id {
            0x8000_0000 => Some(SpecialOpcode::EazCall),
            _ => None,
        }
    }
}

/// Operand layouts of virtual instructions.
///
/// These mirror the CIL operand classes the VM serializes, but the numeric
/// codes are the VM's own; see [`VirtualOperandType::from_code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VirtualOperandType {
    /// `u32` byte offset into the instruction section
    InlineBrTarget,
    /// `u32` count plus that many `u32` byte offsets
    InlineSwitch,
    /// `i32` immediate
    InlineI,
    /// `u32` resolver id for a type/member/string reference
    InlineTok,
    /// `u8` immediate
    ShortInlineI,
    /// `i64` immediate
    InlineI8,
    /// `f64` immediate
    InlineR,
    /// No operand bytes
    InlineNone,
    /// `u8` local/argument slot
    ShortInlineVar,
}

impl VirtualOperandType {
    /// Map a VM operand-type code to its layout, as observed in the
    /// identified builds:
    ///
    /// | code      | layout          |
    /// |-----------|-----------------|
    /// | 0, 12     | `InlineTok`     |
    /// | 1         | `InlineBrTarget`|
    /// | 3         | `InlineSwitch`  |
    /// | 4, 5, 11  | `ShortInlineI`  |
    /// | 6         | `InlineI8`      |
    /// | 7         | `InlineI`       |
    /// | 8         | `InlineR`       |
    /// | 9         | `ShortInlineVar`|
    /// | 10        | `InlineNone`    |
    ///
    /// # Errors
    /// Any other code returns [`Error::UnknownOperandType`], which is fatal
    /// for the method using the opcode, not for the pipeline.
    pub fn from_code(code: u8) -> Result<VirtualOperandType> {
        match code {
            0 | 12 => Ok(VirtualOperandType::InlineTok),
            1 => Ok(VirtualOperandType::InlineBrTarget),
            3 => Ok(VirtualOperandType::InlineSwitch),
            4 | 5 | 11 => Ok(VirtualOperandType::ShortInlineI),
            6 => Ok(VirtualOperandType::InlineI8),
            7 => Ok(VirtualOperandType::InlineI),
            8 => Ok(VirtualOperandType::InlineR),
            9 => Ok(VirtualOperandType::ShortInlineVar),
            10 => Ok(VirtualOperandType::InlineNone),
            other => Err(Error::UnknownOperandType(other)),
        }
    }
}

/// What a virtual opcode was identified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolvedOpcode {
    /// A concrete CIL opcode.
    Cil(CilOpCode),
    /// A special action with no single CIL equivalent.
    Special(SpecialOpcode),
    /// No catalog pattern matched the handler.
    Unidentified,
}

/// One virtual instruction discovered in the dispatcher.
///
/// Allocated during dispatcher discovery, mutated only by the handler
/// matcher, immutable afterwards.
#[derive(Debug, Clone)]
pub struct VmOpcode {
    /// The numeric id the VM dispatcher uses for this instruction.
    pub virtual_code: u32,
    /// The field holding this opcode's instruction descriptor.
    pub instruction_field: Token,
    /// The handler method whose IL body implements this opcode.
    pub handler: Token,
    /// Raw operand-type code; interpreted via
    /// [`VirtualOperandType::from_code`] at translation time.
    pub operand_code: u8,
    /// Identification result.
    pub resolved: ResolvedOpcode,
}

impl VmOpcode {
    /// True once a catalog pattern has identified this opcode.
    #[must_use]
    pub fn identified(&self) -> bool {
        !matches!(self.resolved, ResolvedOpcode::Unidentified)
    }
}
