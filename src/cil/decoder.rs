//! CIL instruction-section decoding.
//!
//! [`decode_instructions`] turns raw IL bytes into [`Instruction`] values
//! whose branch operands are absolute *byte offsets* within the section.
//! [`patch_branch_targets`] rewrites those into instruction indices, which is
//! the form the rest of the pipeline (and the encoder) works with. The split
//! exists because the VM translator produces instructions by a different
//! route but shares the patching step and its alignment checks.

use rustc_hash::FxHashMap;

use crate::{
    cil::{
        instruction::{Instruction, Operand},
        opcode::{CilOpCode, CilOperandKind},
    },
    file::parser::Parser,
    metadata::token::Token,
    Error, Result,
};

/// Decode a whole instruction section.
///
/// Branch operands come out as absolute byte offsets; run
/// [`patch_branch_targets`] before using them as instruction references.
///
/// # Errors
/// Returns [`Error::Malformed`] on unassigned opcode bytes and
/// [`Error::OutOfBounds`] on truncated operands.
pub fn decode_instructions(data: &[u8]) -> Result<Vec<Instruction>> {
    let mut parser = Parser::new(data);
    let mut instructions = Vec::new();

    while parser.has_more_data() {
        instructions.push(decode_instruction(&mut parser)?);
    }

    Ok(instructions)
}

/// Decode a single instruction at the parser's current position.
///
/// # Errors
/// Returns [`Error::Malformed`] on unassigned opcode bytes and
/// [`Error::OutOfBounds`] on truncated operands.
pub fn decode_instruction(parser: &mut Parser<'_>) -> Result<Instruction> {
    #[allow(clippy::cast_possible_truncation)]
    let offset = parser.pos() as u32;

    let first = parser.read_le::<u8>()?;
    let op = if first == 0xFE {
        CilOpCode::wide(parser.read_le::<u8>()?)
    } else {
        CilOpCode::single(first)
    };

    let Some(descriptor) = op.descriptor() else {
        return Err(malformed_error!(
            "Unassigned opcode byte 0x{first:02x} at offset {offset}"
        ));
    };

    let operand = match descriptor.operand {
        CilOperandKind::None => Operand::None,
        CilOperandKind::ShortInlineI => Operand::Int32(i32::from(parser.read_le::<i8>()?)),
        CilOperandKind::ShortInlineVar => Operand::Var(u16::from(parser.read_le::<u8>()?)),
        CilOperandKind::InlineVar => Operand::Var(parser.read_le::<u16>()?),
        CilOperandKind::ShortInlineR => Operand::Float32(parser.read_le::<f32>()?),
        CilOperandKind::InlineI => Operand::Int32(parser.read_le::<i32>()?),
        CilOperandKind::InlineI8 => Operand::Int64(parser.read_le::<i64>()?),
        CilOperandKind::InlineR => Operand::Float64(parser.read_le::<f64>()?),
        CilOperandKind::ShortInlineBrTarget => {
            let displacement = i64::from(parser.read_le::<i8>()?);
            Operand::Target(absolute_target(parser.pos(), displacement, offset)?)
        }
        CilOperandKind::InlineBrTarget => {
            let displacement = i64::from(parser.read_le::<i32>()?);
            Operand::Target(absolute_target(parser.pos(), displacement, offset)?)
        }
        CilOperandKind::InlineTok | CilOperandKind::InlineString => {
            Operand::Token(Token::new(parser.read_le::<u32>()?))
        }
        CilOperandKind::InlineSwitch => {
            let count = parser.read_le::<u32>()? as usize;
            let mut displacements = Vec::with_capacity(count);
            for _ in 0..count {
                displacements.push(i64::from(parser.read_le::<i32>()?));
            }
            let base = parser.pos();
            let mut targets = Vec::with_capacity(count);
            for displacement in displacements {
                targets.push(absolute_target(base, displacement, offset)?);
            }
            Operand::Switch(targets)
        }
    };

    Ok(Instruction {
        offset,
        op,
        operand,
    })
}

fn absolute_target(next: usize, displacement: i64, at: u32) -> Result<u32> {
    let target = next as i64 + displacement;
    u32::try_from(target)
        .map_err(|_| malformed_error!("Branch at offset {at} targets negative offset {target}"))
}

/// Rewrite branch operands from byte offsets into instruction indices.
///
/// Every target must land exactly on an instruction boundary.
///
/// # Errors
/// Returns [`Error::BranchMisaligned`] for any target that falls between
/// instructions or past the end of the section.
pub fn patch_branch_targets(instructions: &mut [Instruction]) -> Result<()> {
    let mut index_of: FxHashMap<u32, u32> = FxHashMap::default();
    for (index, instruction) in instructions.iter().enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        index_of.insert(instruction.offset, index as u32);
    }

    let lookup = |offset: u32| -> Result<u32> {
        index_of
            .get(&offset)
            .copied()
            .ok_or(Error::BranchMisaligned(offset))
    };

    for instruction in instructions.iter_mut() {
        if !instruction.op.is_branch() {
            continue;
        }
        match &mut instruction.operand {
            Operand::Target(target) => *target = lookup(*target)?,
            Operand::Switch(targets) => {
                for target in targets.iter_mut() {
                    *target = lookup(*target)?;
                }
            }
            _ => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cil::opcode::ops;

    #[test]
    fn test_decode_simple_sequence() {
        // nop; ldc.i4.s 7; ret
        let data = [0x00, 0x1F, 0x07, 0x2A];
        let instructions = decode_instructions(&data).unwrap();
        assert_eq!(instructions.len(), 3);
        assert_eq!(instructions[0].op, ops::NOP);
        assert_eq!(instructions[1].op, ops::LDC_I4_S);
        assert_eq!(instructions[1].operand, Operand::Int32(7));
        assert_eq!(instructions[2].op, ops::RET);
        assert_eq!(instructions[2].offset, 3);
    }

    #[test]
    fn test_decode_two_byte_opcode() {
        // ceq; ret
        let data = [0xFE, 0x01, 0x2A];
        let instructions = decode_instructions(&data).unwrap();
        assert_eq!(instructions[0].op, ops::CEQ);
        assert_eq!(instructions[1].offset, 2);
    }

    #[test]
    fn test_decode_branch_becomes_absolute() {
        // br.s +1 (skips the nop); nop; ret
        let data = [0x2B, 0x01, 0x00, 0x2A];
        let instructions = decode_instructions(&data).unwrap();
        assert_eq!(instructions[0].operand, Operand::Target(3));
    }

    #[test]
    fn test_decode_backward_branch() {
        // nop; br.s -3 (back to the nop)
        let data = [0x00, 0x2B, 0xFD];
        let instructions = decode_instructions(&data).unwrap();
        assert_eq!(instructions[1].operand, Operand::Target(0));
    }

    #[test]
    fn test_decode_unknown_opcode() {
        let data = [0x24];
        assert!(decode_instructions(&data).is_err());
    }

    #[test]
    fn test_decode_truncated_operand() {
        let data = [0x20, 0x01, 0x02]; // ldc.i4 with only 3 operand bytes
        assert!(decode_instructions(&data).is_err());
    }

    #[test]
    fn test_patch_branch_targets() {
        // br.s over a nop onto ret
        let data = [0x2B, 0x01, 0x00, 0x2A];
        let mut instructions = decode_instructions(&data).unwrap();
        patch_branch_targets(&mut instructions).unwrap();
        assert_eq!(instructions[0].operand, Operand::Target(2));
    }

    #[test]
    fn test_patch_rejects_misaligned_target() {
        // br.s into the middle of the ldc.i4 operand
        let data = [0x2B, 0x02, 0x20, 0xAA, 0xBB, 0xCC, 0xDD, 0x2A];
        let mut instructions = decode_instructions(&data).unwrap();
        let err = patch_branch_targets(&mut instructions).unwrap_err();
        assert!(matches!(err, Error::BranchMisaligned(4)));
    }

    #[test]
    fn test_decode_switch() {
        // switch [+1, +2] with base after operand (offset 13); then 3 nops
        let mut data = vec![0x45, 0x02, 0, 0, 0];
        data.extend_from_slice(&1i32.to_le_bytes());
        data.extend_from_slice(&2i32.to_le_bytes());
        data.extend_from_slice(&[0x00, 0x00, 0x00]);
        let mut instructions = decode_instructions(&data).unwrap();
        assert_eq!(instructions[0].operand, Operand::Switch(vec![14, 15]));
        patch_branch_targets(&mut instructions).unwrap();
        assert_eq!(instructions[0].operand, Operand::Switch(vec![2, 3]));
    }
}
