//! Decoded CIL instruction representation.

use crate::{
    cil::opcode::{CilOpCode, CilOperandKind},
    metadata::token::Token,
};

/// A decoded instruction operand.
///
/// Branch operands exist in two states: freshly decoded bodies carry
/// *byte offsets* (into the owning instruction section), patched bodies carry
/// *instruction indices*. [`super::patch_branch_targets`] converts from the
/// former to the latter; the encoder expects the latter.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand
    None,
    /// 32-bit integer immediate (also used for `ldc.i4.s`)
    Int32(i32),
    /// 64-bit integer immediate
    Int64(i64),
    /// 32-bit float immediate
    Float32(f32),
    /// 64-bit float immediate
    Float64(f64),
    /// Branch target (byte offset before patching, instruction index after)
    Target(u32),
    /// Switch table of branch targets (same two states as [`Operand::Target`])
    Switch(Vec<u32>),
    /// Metadata token reference
    Token(Token),
    /// Inline string literal (`ldstr`); the external writer re-interns it
    String(String),
    /// Local or argument slot index
    Var(u16),
}

/// One decoded CIL instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Byte offset of this instruction within its section.
    pub offset: u32,
    /// The opcode.
    pub op: CilOpCode,
    /// The decoded operand.
    pub operand: Operand,
}

impl Instruction {
    /// Create an instruction at offset 0; builders fix offsets up when
    /// assembling sequences.
    #[must_use]
    pub fn new(op: CilOpCode, operand: Operand) -> Self {
        Instruction {
            offset: 0,
            op,
            operand,
        }
    }

    /// Create an operand-less instruction at offset 0.
    #[must_use]
    pub fn simple(op: CilOpCode) -> Self {
        Instruction::new(op, Operand::None)
    }

    /// Encoded size in bytes, opcode plus operand.
    ///
    /// For `switch` the size depends on the table length, which is why the
    /// operand (not just the opcode) is needed.
    #[must_use]
    pub fn size(&self) -> usize {
        let operand_size = match self.op.operand_kind() {
            CilOperandKind::None => 0,
            CilOperandKind::ShortInlineI
            | CilOperandKind::ShortInlineVar
            | CilOperandKind::ShortInlineBrTarget => 1,
            CilOperandKind::InlineVar => 2,
            CilOperandKind::ShortInlineR
            | CilOperandKind::InlineI
            | CilOperandKind::InlineBrTarget
            | CilOperandKind::InlineTok
            | CilOperandKind::InlineString => 4,
            CilOperandKind::InlineI8 | CilOperandKind::InlineR => 8,
            CilOperandKind::InlineSwitch => match &self.operand {
                Operand::Switch(targets) => 4 + targets.len() * 4,
                _ => 4,
            },
        };
        self.op.size() + operand_size
    }

    /// The constant a load-constant-int32 form pushes, across all encodings
    /// (`ldc.i4`, `ldc.i4.s`, `ldc.i4.m1`, `ldc.i4.0` .. `ldc.i4.8`).
    ///
    /// `None` for every other instruction.
    #[must_use]
    pub fn ldc_i4_value(&self) -> Option<i32> {
        if !self.op.is_ldc_i4() {
            return None;
        }
        match (self.op.code(), &self.operand) {
            (0x15, _) => Some(-1),
            (code @ 0x16..=0x1E, _) => Some(i32::from(code) - 0x16),
            (_, Operand::Int32(value)) => Some(*value),
            _ => None,
        }
    }

    /// All branch targets of this instruction, in operand order.
    ///
    /// Empty for non-branching instructions.
    #[must_use]
    pub fn branch_targets(&self) -> Vec<u32> {
        match &self.operand {
            Operand::Target(t) if self.op.is_branch() => vec![*t],
            Operand::Switch(targets) => targets.clone(),
            _ => Vec::new(),
        }
    }
}
