//! Translation of virtualized method bodies back into CIL.
//!
//! A virtualized method lives in the cipher stream at the position its
//! dispatcher stub encodes. The serialized form is:
//!
//! ```text
//! u8  flags                  // bit0 = init locals
//! u16 max_stack
//! u16 local_count
//! u32 resolver id * local_count   // local variable types
//! u32 code_size
//! ... code_size bytes of instructions ...
//! u32 handler_count
//! ... 21-byte exception handler records ...
//! ```
//!
//! Each instruction is a `u8` virtual code resolved through the
//! [`OpcodeTable`], followed by operand bytes laid out per the opcode's
//! operand-type code. Branch offsets are byte positions relative to the
//! start of the instruction section; after decoding they are patched into
//! instruction indices, and every target must land on an instruction
//! boundary.

pub mod report;
pub mod resolver;

pub use report::TranslationReport;
pub use resolver::{ResolvedEntry, TokenResolver};

use rustc_hash::FxHashMap;

use crate::{
    cil::{ops, patch_branch_targets, CilOperandKind, Instruction, Operand},
    crypto::{CipherStream, SeekOrigin},
    metadata::method::{ExceptionHandler, ExceptionHandlerFlags, MethodBody},
    vm::{
        exceptions::{VmExceptionHandler, VmHandlerKind},
        opcode::{ResolvedOpcode, SpecialOpcode, VirtualOperandType},
        OpcodeTable,
    },
    Error, Result,
};

/// Translates one virtualized body at a time; stateless across methods, so a
/// single instance serves a whole worklist (or one per worker under fan-out).
pub struct MethodTranslator<'m> {
    table: &'m OpcodeTable,
    resolver: &'m TokenResolver<'m>,
}

/// Operand bytes as read off the wire, before resolver lookups.
enum RawOperand {
    None,
    Int8(i8),
    Var(u8),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    BrTarget(u32),
    Switch(Vec<u32>),
    Tok(u32),
}

impl<'m> MethodTranslator<'m> {
    /// A translator over the finalized table and resolver.
    #[must_use]
    pub fn new(table: &'m OpcodeTable, resolver: &'m TokenResolver<'m>) -> Self {
        MethodTranslator { table, resolver }
    }

    /// Translate the method whose body starts at `position`.
    ///
    /// # Errors
    /// Per-method failures (`Unidentified`, `UnknownOperandType`,
    /// `BranchMisaligned`, `UnsupportedHandlerKind`, malformed wire data)
    /// surface here; the caller records them and moves on.
    pub fn translate(&self, stream: &mut CipherStream, position: u64) -> Result<MethodBody> {
        #[allow(clippy::cast_possible_wrap)]
        stream.seek(position as i64, SeekOrigin::Begin);

        let flags = stream.read_le::<u8>()?;
        let max_stack = stream.read_le::<u16>()?;
        let local_count = stream.read_le::<u16>()?;

        let mut locals = Vec::with_capacity(usize::from(local_count));
        for _ in 0..local_count {
            let id = stream.read_le::<u32>()?;
            locals.push(self.resolver.resolve_type(id)?);
        }

        let code_size = stream.read_le::<u32>()?;
        let mut instructions = self.decode_instructions(stream, code_size)?;
        let handlers = self.read_exception_table(stream, &instructions, code_size)?;

        patch_branch_targets(&mut instructions)?;

        Ok(MethodBody {
            max_stack,
            init_locals: flags & 1 != 0,
            locals,
            instructions,
            handlers,
        })
    }

    fn decode_instructions(
        &self,
        stream: &mut CipherStream,
        code_size: u32,
    ) -> Result<Vec<Instruction>> {
        let mut instructions = Vec::new();
        let mut consumed = 0u32;

        while consumed < code_size {
            let offset = consumed;
            let virtual_code = u32::from(stream.read_le::<u8>()?);
            consumed += 1;

            let vm_op = self.table.get(virtual_code);
            if self.table.contains(virtual_code) && !vm_op.identified() {
                return Err(Error::Unidentified(virtual_code));
            }

            let operand_type = VirtualOperandType::from_code(vm_op.operand_code)?;
            let (raw, width) = read_operand(stream, operand_type)?;
            consumed = consumed
                .checked_add(width)
                .ok_or_else(|| malformed_error!("Instruction section length overflow"))?;

            let mut instruction = match vm_op.resolved {
                ResolvedOpcode::Cil(op) => Instruction {
                    offset,
                    op,
                    operand: self.lower_operand(raw)?,
                },
                ResolvedOpcode::Special(SpecialOpcode::EazCall) => {
                    self.lower_eazcall(offset, raw)?
                }
                // Unidentified opcodes were rejected above; the sentinel for
                // unknown stream bytes is an identified nop.
                ResolvedOpcode::Unidentified => unreachable!("rejected before operand decode"),
            };

            // Float constants travel as 8-byte wire values regardless of the
            // target width; narrow for opcodes that encode f32.
            if instruction.op.operand_kind() == CilOperandKind::ShortInlineR {
                if let Operand::Float64(value) = instruction.operand {
                    #[allow(clippy::cast_possible_truncation)]
                    {
                        instruction.operand = Operand::Float32(value as f32);
                    }
                }
            }
            instructions.push(instruction);
        }

        if consumed != code_size {
            return Err(malformed_error!(
                "Instruction section consumed {consumed} of {code_size} declared bytes"
            ));
        }

        Ok(instructions)
    }

    /// `EazCall` lowers to an ordinary invocation of the resolved target,
    /// `callvirt` when the target dispatches through the vtable.
    fn lower_eazcall(&self, offset: u32, raw: RawOperand) -> Result<Instruction> {
        let RawOperand::Tok(id) = raw else {
            return Err(malformed_error!(
                "Virtualized call at offset {offset} carries a non-token operand"
            ));
        };
        let (target, is_virtual) = self.resolver.resolve_method(id)?;

        Ok(Instruction {
            offset,
            op: if is_virtual { ops::CALLVIRT } else { ops::CALL },
            operand: Operand::Token(target),
        })
    }

    fn lower_operand(&self, raw: RawOperand) -> Result<Operand> {
        Ok(match raw {
            RawOperand::None => Operand::None,
            RawOperand::Int8(value) => Operand::Int32(i32::from(value)),
            RawOperand::Var(slot) => Operand::Var(u16::from(slot)),
            RawOperand::Int32(value) => Operand::Int32(value),
            RawOperand::Int64(value) => Operand::Int64(value),
            RawOperand::Float64(value) => Operand::Float64(value),
            RawOperand::BrTarget(target) => Operand::Target(target),
            RawOperand::Switch(targets) => Operand::Switch(targets),
            RawOperand::Tok(id) => match self.resolver.resolve(id)? {
                ResolvedEntry::Type(token)
                | ResolvedEntry::Field(token) => Operand::Token(token),
                ResolvedEntry::Method { token, .. } => Operand::Token(token),
                ResolvedEntry::String(literal) => Operand::String(literal),
            },
        })
    }

    fn read_exception_table(
        &self,
        stream: &mut CipherStream,
        instructions: &[Instruction],
        code_size: u32,
    ) -> Result<Vec<ExceptionHandler>> {
        let count = stream.read_le::<u32>()?;
        if count == 0 {
            return Ok(Vec::new());
        }

        // Capacity grows with successful reads; a malformed count fails at
        // the first short read instead of a giant allocation.
        let mut records = Vec::new();
        for _ in 0..count {
            records.push(VmExceptionHandler::read(stream)?);
        }

        let index_of = offset_index(instructions, code_size);
        let lookup = |offset: u32| -> Result<u32> {
            index_of
                .get(&offset)
                .copied()
                .ok_or(Error::BranchMisaligned(offset))
        };

        // The wire format carries no handler length; a handler region runs
        // to the next region start (any handler or filter start) or the end
        // of the body.
        let mut region_starts: Vec<u32> = Vec::new();
        for record in &records {
            region_starts.push(lookup(record.handler_start)?);
            if record.kind == VmHandlerKind::Filter {
                region_starts.push(lookup(record.filter_start)?);
            }
        }
        region_starts.sort_unstable();

        #[allow(clippy::cast_possible_truncation)]
        let body_end = instructions.len() as u32;
        let region_end = |start: u32| -> u32 {
            region_starts
                .iter()
                .copied()
                .find(|&s| s > start)
                .unwrap_or(body_end)
        };

        let mut handlers = Vec::with_capacity(records.len());
        for record in records {
            let try_start = lookup(record.try_start)?;
            let try_end = lookup(
                record
                    .try_start
                    .checked_add(record.try_length)
                    .ok_or(Error::BranchMisaligned(u32::MAX))?,
            )?;
            let handler_start = lookup(record.handler_start)?;

            let (flags, catch_type, filter_start) = match record.kind {
                VmHandlerKind::Exception => {
                    let catch_type = if record.catch_token == 0 {
                        None
                    } else {
                        #[allow(clippy::cast_sign_loss)]
                        Some(self.resolver.resolve_type(record.catch_token as u32)?)
                    };
                    (ExceptionHandlerFlags::EXCEPTION, catch_type, None)
                }
                VmHandlerKind::Finally => (ExceptionHandlerFlags::FINALLY, None, None),
                VmHandlerKind::Filter => (
                    ExceptionHandlerFlags::FILTER,
                    None,
                    Some(lookup(record.filter_start)?),
                ),
            };

            handlers.push(ExceptionHandler {
                flags,
                try_start,
                try_end,
                handler_start,
                handler_end: region_end(handler_start),
                catch_type,
                filter_start,
            });
        }

        Ok(handlers)
    }
}

fn offset_index(instructions: &[Instruction], code_size: u32) -> FxHashMap<u32, u32> {
    let mut index_of = FxHashMap::default();
    for (index, instruction) in instructions.iter().enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        index_of.insert(instruction.offset, index as u32);
    }
    #[allow(clippy::cast_possible_truncation)]
    index_of.insert(code_size, instructions.len() as u32);
    index_of
}

fn read_operand(
    stream: &mut CipherStream,
    operand_type: VirtualOperandType,
) -> Result<(RawOperand, u32)> {
    Ok(match operand_type {
        VirtualOperandType::InlineNone => (RawOperand::None, 0),
        VirtualOperandType::ShortInlineI => (RawOperand::Int8(stream.read_le::<i8>()?), 1),
        VirtualOperandType::ShortInlineVar => (RawOperand::Var(stream.read_le::<u8>()?), 1),
        VirtualOperandType::InlineI => (RawOperand::Int32(stream.read_le::<i32>()?), 4),
        VirtualOperandType::InlineI8 => (RawOperand::Int64(stream.read_le::<i64>()?), 8),
        VirtualOperandType::InlineR => (RawOperand::Float64(stream.read_le::<f64>()?), 8),
        VirtualOperandType::InlineBrTarget => (RawOperand::BrTarget(stream.read_le::<u32>()?), 4),
        VirtualOperandType::InlineTok => (RawOperand::Tok(stream.read_le::<u32>()?), 4),
        VirtualOperandType::InlineSwitch => {
            let count = stream.read_le::<u32>()?;
            let mut targets = Vec::new();
            for _ in 0..count {
                targets.push(stream.read_le::<u32>()?);
            }
            let width = 4 + count
                .checked_mul(4)
                .ok_or_else(|| malformed_error!("Switch table length overflow"))?;
            (RawOperand::Switch(targets), width)
        }
    })
}
