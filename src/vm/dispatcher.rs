//! Dispatcher discovery: building the raw [`VmOpcode`] list from the VM
//! type's constructor.
//!
//! Each protected build permutes opcode numbering, so the numeric codes are
//! never assumed; they are read out of the constructor, which registers one
//! instruction descriptor per opcode as
//!
//! ```text
//! ldc.i4  <virtual_code>
//! ldc.i4  <operand_type>
//! ldftn   <handler method>
//! newobj  <delegate ctor>
//! stfld   <descriptor field>
//! ```
//!
//! with the constants in any of their short encodings.

use rustc_hash::FxHashSet;

use crate::{
    cil::{ops, Instruction, Operand},
    metadata::{module::Module, token::Token},
    vm::opcode::{ResolvedOpcode, VmOpcode},
    Error, Result,
};

/// Scan the VM type's constructors for opcode registrations.
///
/// Every hit becomes an unidentified [`VmOpcode`]; the handler matcher fills
/// in the resolution afterwards. The first registration of a virtual code
/// wins; re-registrations are logged and dropped.
///
/// # Errors
/// Returns [`Error::DispatcherNotFound`] when the VM type has no constructor
/// with a body or the scan yields no registrations.
pub fn discover_opcodes(module: &Module, vm_type: Token) -> Result<Vec<VmOpcode>> {
    let mut opcodes = Vec::new();
    let mut seen = FxHashSet::default();
    let mut scanned_ctor = false;

    for ctor in module.methods_of(vm_type).filter(|m| m.is_ctor()) {
        let Some(body) = ctor.body.as_ref() else {
            continue;
        };
        scanned_ctor = true;

        let instructions = &body.instructions;
        for window_start in 0..instructions.len().saturating_sub(4) {
            let window = &instructions[window_start..window_start + 5];
            let Some(registration) = match_registration(window) else {
                continue;
            };

            if !seen.insert(registration.virtual_code) {
                log::warn!(
                    "dispatcher re-registers virtual code 0x{:02x} in {}, keeping first",
                    registration.virtual_code,
                    ctor.token
                );
                continue;
            }
            opcodes.push(registration);
        }
    }

    if !scanned_ctor || opcodes.is_empty() {
        return Err(Error::DispatcherNotFound);
    }

    log::debug!(
        "dispatcher scan of {} found {} virtual opcodes",
        module.type_full_name(vm_type).unwrap_or_default(),
        opcodes.len()
    );

    Ok(opcodes)
}

fn match_registration(window: &[Instruction]) -> Option<VmOpcode> {
    let virtual_code = window[0].ldc_i4_value()?;
    let operand_code = window[1].ldc_i4_value()?;

    if window[2].op != ops::LDFTN || window[3].op != ops::NEWOBJ || window[4].op != ops::STFLD {
        return None;
    }

    let Operand::Token(handler) = window[2].operand.clone() else {
        return None;
    };
    let Operand::Token(instruction_field) = window[4].operand.clone() else {
        return None;
    };

    // Negative codes or operand types mean the window is something else
    // entirely (arithmetic on constants, say), not a registration.
    let virtual_code = u32::try_from(virtual_code).ok()?;
    let operand_code = u8::try_from(operand_code).ok()?;

    Some(VmOpcode {
        virtual_code,
        instruction_field,
        handler,
        operand_code,
        resolved: ResolvedOpcode::Unidentified,
    })
}
