//! CIL instruction-section encoding.
//!
//! The inverse of the decoder: takes instructions whose branch operands are
//! *instruction indices* and produces section bytes with relative
//! displacements. String literals are re-interned through a caller-supplied
//! sink since user-string tokens belong to the external assembly writer.

use crate::{
    cil::{
        instruction::{Instruction, Operand},
        opcode::CilOperandKind,
    },
    metadata::token::Token,
    Result,
};

/// Encode an instruction section.
///
/// `intern_string` maps each `ldstr` literal to the user-string token the
/// external writer assigns.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] when an operand does not fit its
/// opcode's encoding (wrong variant, out-of-range short immediate or
/// displacement, branch index out of bounds).
pub fn encode_instructions(
    instructions: &[Instruction],
    mut intern_string: impl FnMut(&str) -> Token,
) -> Result<Vec<u8>> {
    // First pass: lay out byte offsets so displacements can be computed.
    let mut offsets = Vec::with_capacity(instructions.len() + 1);
    let mut position = 0u32;
    for instruction in instructions {
        offsets.push(position);
        #[allow(clippy::cast_possible_truncation)]
        {
            position += instruction.size() as u32;
        }
    }
    offsets.push(position);

    let offset_of = |index: u32, at: u32| -> Result<i64> {
        offsets
            .get(index as usize)
            .map(|o| i64::from(*o))
            .ok_or_else(|| {
                malformed_error!("Branch at offset {at} references instruction index {index}")
            })
    };

    let mut bytes = Vec::with_capacity(position as usize);
    for (index, instruction) in instructions.iter().enumerate() {
        let at = offsets[index];
        if instruction.op.prefix() != 0 {
            bytes.push(instruction.op.prefix());
        }
        bytes.push(instruction.op.code());

        #[allow(clippy::cast_possible_truncation)]
        let next = i64::from(at) + instruction.size() as i64;

        match (instruction.op.operand_kind(), &instruction.operand) {
            (CilOperandKind::None, Operand::None) => {}
            (CilOperandKind::ShortInlineI, Operand::Int32(value)) => {
                let value = i8::try_from(*value).map_err(|_| {
                    malformed_error!("Immediate {value} at offset {at} does not fit i8")
                })?;
                bytes.extend_from_slice(&value.to_le_bytes());
            }
            (CilOperandKind::ShortInlineVar, Operand::Var(slot)) => {
                let slot = u8::try_from(*slot).map_err(|_| {
                    malformed_error!("Variable slot {slot} at offset {at} does not fit u8")
                })?;
                bytes.push(slot);
            }
            (CilOperandKind::InlineVar, Operand::Var(slot)) => {
                bytes.extend_from_slice(&slot.to_le_bytes());
            }
            (CilOperandKind::ShortInlineR, Operand::Float32(value)) => {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
            (CilOperandKind::InlineI, Operand::Int32(value)) => {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
            (CilOperandKind::InlineI8, Operand::Int64(value)) => {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
            (CilOperandKind::InlineR, Operand::Float64(value)) => {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
            (CilOperandKind::ShortInlineBrTarget, Operand::Target(target)) => {
                let displacement = offset_of(*target, at)? - next;
                let displacement = i8::try_from(displacement).map_err(|_| {
                    malformed_error!("Short branch at offset {at} cannot reach {displacement}")
                })?;
                bytes.extend_from_slice(&displacement.to_le_bytes());
            }
            (CilOperandKind::InlineBrTarget, Operand::Target(target)) => {
                let displacement = offset_of(*target, at)? - next;
                let displacement = i32::try_from(displacement)
                    .map_err(|_| malformed_error!("Branch displacement overflow at offset {at}"))?;
                bytes.extend_from_slice(&displacement.to_le_bytes());
            }
            (CilOperandKind::InlineTok, Operand::Token(token)) => {
                bytes.extend_from_slice(&token.value().to_le_bytes());
            }
            (CilOperandKind::InlineString, Operand::String(literal)) => {
                bytes.extend_from_slice(&intern_string(literal).value().to_le_bytes());
            }
            (CilOperandKind::InlineString, Operand::Token(token)) => {
                bytes.extend_from_slice(&token.value().to_le_bytes());
            }
            (CilOperandKind::InlineSwitch, Operand::Switch(targets)) => {
                #[allow(clippy::cast_possible_truncation)]
                bytes.extend_from_slice(&(targets.len() as u32).to_le_bytes());
                for target in targets {
                    let displacement = offset_of(*target, at)? - next;
                    let displacement = i32::try_from(displacement).map_err(|_| {
                        malformed_error!("Switch displacement overflow at offset {at}")
                    })?;
                    bytes.extend_from_slice(&displacement.to_le_bytes());
                }
            }
            (kind, operand) => {
                return Err(malformed_error!(
                    "Operand {operand:?} does not fit encoding {kind:?} of '{}' at offset {at}",
                    instruction.op
                ));
            }
        }
    }

    Ok(bytes)
}
