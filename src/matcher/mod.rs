//! The handler matcher: fingerprints each VM handler body against the
//! pattern catalog and assigns resolutions to the discovered opcodes.
//!
//! # Matching
//!
//! A pattern accepts a handler in two steps. First the *shape* check walks
//! the prototype against a window of the body: `nop` prototype slots match
//! anything, exact opcode equality matches, and the interchange policy lets
//! constant/local families substitute for one another. Entire-body patterns
//! anchor the window at the first instruction; windowed patterns scan. Then
//! the *verifier* runs domain checks (operand full names, token type names,
//! sub-pattern matches on callee bodies). Only verifier success accepts the
//! match; a shape hit with a verifier miss rejects the pattern and moves on
//! to the next candidate.
//!
//! # Selection
//!
//! Patterns are tried in catalog order and never consumed: one parameterized
//! pattern can identify several opcodes (the `ldelem.*` family shares a
//! shape and differs only in the element-type check). Handlers nothing
//! matches stay unidentified, which fails only the methods that use them.
//! Handlers a *second* pattern would also accept with a different target are
//! reported as ambiguous; the first accepted pattern stays authoritative.

pub mod catalog;
pub mod pattern;

pub use pattern::{Interchange, OpcodePattern, PatternTarget, Verifier};

use crate::{
    cil::{ops, CilFlow, Instruction, Operand},
    metadata::module::Module,
    vm::opcode::VmOpcode,
    Error,
};

/// Matches handler bodies against the pattern catalog.
pub struct HandlerMatcher<'m> {
    module: &'m Module,
    catalog: &'static [OpcodePattern],
}

impl<'m> HandlerMatcher<'m> {
    /// A matcher over the built-in catalog.
    #[must_use]
    pub fn new(module: &'m Module) -> Self {
        HandlerMatcher {
            module,
            catalog: catalog::CATALOG,
        }
    }

    /// A matcher over a custom catalog (tests, experiments with new builds).
    #[must_use]
    pub fn with_catalog(module: &'m Module, catalog: &'static [OpcodePattern]) -> Self {
        HandlerMatcher { module, catalog }
    }

    /// Run identification over every discovered opcode, in place.
    ///
    /// Returns how many opcodes were identified. Unidentified opcodes are not
    /// an error here; translation rejects only the methods that use them.
    /// After every accepted match the remaining candidates are scanned once
    /// more: a second accepting pattern with a different target is reported
    /// as [`Error::PatternAmbiguous`] (the first match is kept either way).
    pub fn identify_all(&self, opcodes: &mut [VmOpcode]) -> usize {
        let mut identified = 0;

        for opcode in opcodes.iter_mut() {
            let Some(body) = self.module.method_body(opcode.handler) else {
                log::warn!(
                    "handler {} of virtual opcode 0x{:02x} has no body",
                    opcode.handler,
                    opcode.virtual_code
                );
                continue;
            };

            let mut candidates = self.catalog.iter();
            while let Some(pattern) = candidates.next() {
                if self.find_match(pattern, &body.instructions).is_none() {
                    continue;
                }

                opcode.resolved = pattern.target.resolved();
                identified += 1;
                log::debug!(
                    "virtual opcode 0x{:02x} identified as {}",
                    opcode.virtual_code,
                    pattern.name
                );

                // One more pass over the remaining candidates: a second
                // accepting pattern with a different target makes the
                // handler ambiguous. The first match stays authoritative.
                if let Some(rival) = candidates
                    .filter(|p| p.target.resolved() != opcode.resolved)
                    .find(|p| self.find_match(p, &body.instructions).is_some())
                {
                    let ambiguity = Error::PatternAmbiguous(opcode.virtual_code);
                    log::warn!(
                        "{ambiguity}: kept '{}', '{}' also accepts",
                        pattern.name,
                        rival.name
                    );
                }
                break;
            }
        }

        identified
    }

    /// Try one pattern against one body; returns the accepted match index.
    ///
    /// Entire-body patterns only consider index 0. Windowed patterns scan for
    /// the first *shape* hit, whose verifier then decides acceptance.
    #[must_use]
    pub fn find_match(&self, pattern: &OpcodePattern, body: &[Instruction]) -> Option<usize> {
        let start = self.find_shape(pattern, body)?;

        if self.verify(&pattern.verifier, body, start) {
            Some(start)
        } else {
            // Shape fit but semantics did not; informational only.
            log::trace!("verifier mismatch for pattern {}", pattern.name);
            None
        }
    }

    fn find_shape(&self, pattern: &OpcodePattern, body: &[Instruction]) -> Option<usize> {
        let prototype = pattern.prototype;
        if prototype.len() > body.len() {
            return None;
        }

        if pattern.match_entire_body {
            return shape_matches(prototype, pattern.interchange, body, 0).then_some(0);
        }

        (0..=body.len() - prototype.len())
            .find(|&start| shape_matches(prototype, pattern.interchange, body, start))
    }

    fn verify(&self, verifier: &Verifier, body: &[Instruction], start: usize) -> bool {
        match verifier {
            Verifier::None => true,
            Verifier::CalleeFullName { slot, full_name } => {
                let Some(Operand::Token(token)) = operand_at(body, start + slot) else {
                    return false;
                };
                self.module.member_full_name(token).as_deref() == Some(*full_name)
            }
            Verifier::TokenTypeName { slot, full_name } => {
                let Some(Operand::Token(token)) = operand_at(body, start + slot) else {
                    return false;
                };
                self.module.type_full_name(token).as_deref() == Some(*full_name)
            }
            Verifier::SubPattern {
                slot,
                prototype,
                interchange,
            } => {
                let Some(instruction) = body.get(start + slot) else {
                    return false;
                };
                if instruction.op.flow() != CilFlow::Call {
                    return false;
                }
                let Operand::Token(callee) = &instruction.operand else {
                    return false;
                };
                let Some(callee_body) = self.module.method_body(*callee) else {
                    return false;
                };
                prototype.len() <= callee_body.instructions.len()
                    && shape_matches(prototype, *interchange, &callee_body.instructions, 0)
            }
            Verifier::All(checks) => checks.iter().all(|check| self.verify(check, body, start)),
        }
    }
}

fn operand_at(body: &[Instruction], index: usize) -> Option<Operand> {
    body.get(index).map(|i| i.operand.clone())
}

/// The shape predicate: prototype against `body[start..]`.
fn shape_matches(
    prototype: &[crate::cil::CilOpCode],
    interchange: Interchange,
    body: &[Instruction],
    start: usize,
) -> bool {
    if start + prototype.len() > body.len() {
        return false;
    }

    for (slot, &expected) in prototype.iter().enumerate() {
        if expected == ops::NOP {
            continue; // wildcard
        }

        let actual = body[start + slot].op;
        if actual == expected {
            continue;
        }

        if actual.is_ldc_i4() && expected.is_ldc_i4() && interchange.contains(Interchange::LDC_I4) {
            continue;
        }
        // Load-local forms substitute unconditionally.
        if actual.is_ldloc() && expected.is_ldloc() {
            continue;
        }
        if actual.is_stloc() && expected.is_stloc() && interchange.contains(Interchange::STLOC) {
            continue;
        }

        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::{
            method::{MethodBody, MethodDef, MethodFlags},
            module::TypeDef,
            token::Token,
        },
        vm::opcode::ResolvedOpcode,
    };

    fn body_of(instructions: Vec<Instruction>) -> Vec<Instruction> {
        instructions
    }

    fn empty_module() -> Module {
        Module::new("test.exe")
    }

    const SHAPE: &[crate::cil::CilOpCode] = &[ops::LDARG_0, ops::CALLVIRT, ops::STLOC_0, ops::RET];

    fn pattern(entire: bool, interchange: Interchange) -> OpcodePattern {
        OpcodePattern {
            name: "test",
            prototype: SHAPE,
            match_entire_body: entire,
            interchange,
            target: PatternTarget::Cil(ops::POP),
            verifier: Verifier::None,
        }
    }

    fn call(token: u32) -> Instruction {
        Instruction::new(ops::CALLVIRT, Operand::Token(Token::new(token)))
    }

    #[test]
    fn test_entire_anchors_at_start() {
        let module = empty_module();
        let matcher = HandlerMatcher::with_catalog(&module, &[]);

        let body = body_of(vec![
            Instruction::simple(ops::LDARG_0),
            call(0x0600_0001),
            Instruction::simple(ops::STLOC_0),
            Instruction::simple(ops::RET),
        ]);
        assert_eq!(
            matcher.find_match(&pattern(true, Interchange::empty()), &body),
            Some(0)
        );

        // Same shape shifted by one no longer matches an anchored pattern,
        // but a windowed one finds it.
        let mut shifted = vec![Instruction::simple(ops::NOP)];
        shifted.extend(body.clone());
        assert_eq!(
            matcher.find_match(&pattern(true, Interchange::empty()), &shifted),
            None
        );
        assert_eq!(
            matcher.find_match(&pattern(false, Interchange::empty()), &shifted),
            Some(1)
        );
    }

    #[test]
    fn test_wildcard_slots() {
        let module = empty_module();
        let matcher = HandlerMatcher::with_catalog(&module, &[]);
        let wildcard = OpcodePattern {
            name: "wild",
            prototype: &[ops::LDARG_0, ops::NOP, ops::RET],
            match_entire_body: true,
            interchange: Interchange::empty(),
            target: PatternTarget::Cil(ops::POP),
            verifier: Verifier::None,
        };

        let body = body_of(vec![
            Instruction::simple(ops::LDARG_0),
            Instruction::simple(ops::DUP),
            Instruction::simple(ops::RET),
        ]);
        assert_eq!(matcher.find_match(&wildcard, &body), Some(0));
    }

    #[test]
    fn test_stloc_interchange_is_gated() {
        let module = empty_module();
        let matcher = HandlerMatcher::with_catalog(&module, &[]);

        let body = body_of(vec![
            Instruction::simple(ops::LDARG_0),
            call(0x0600_0001),
            Instruction::simple(ops::STLOC_2),
            Instruction::simple(ops::RET),
        ]);

        assert_eq!(
            matcher.find_match(&pattern(true, Interchange::empty()), &body),
            None
        );
        assert_eq!(
            matcher.find_match(&pattern(true, Interchange::STLOC), &body),
            Some(0)
        );
    }

    #[test]
    fn test_ldc_i4_interchange_is_gated() {
        let module = empty_module();
        let matcher = HandlerMatcher::with_catalog(&module, &[]);
        let ldc_pattern = |interchange| OpcodePattern {
            name: "ldc",
            prototype: &[ops::LDC_I4, ops::RET],
            match_entire_body: true,
            interchange,
            target: PatternTarget::Cil(ops::POP),
            verifier: Verifier::None,
        };

        let body = body_of(vec![
            Instruction::simple(ops::LDC_I4_3),
            Instruction::simple(ops::RET),
        ]);

        // Without the bit no accepted match may substitute ldc.i4.* for
        // ldc.i4.
        assert_eq!(matcher.find_match(&ldc_pattern(Interchange::empty()), &body), None);
        assert_eq!(
            matcher.find_match(&ldc_pattern(Interchange::LDC_I4), &body),
            Some(0)
        );
    }

    #[test]
    fn test_ldloc_always_interchanges() {
        let module = empty_module();
        let matcher = HandlerMatcher::with_catalog(&module, &[]);
        let ldloc_pattern = OpcodePattern {
            name: "ldloc",
            prototype: &[ops::LDLOC_0, ops::RET],
            match_entire_body: true,
            interchange: Interchange::empty(),
            target: PatternTarget::Cil(ops::POP),
            verifier: Verifier::None,
        };

        let body = body_of(vec![
            Instruction::simple(ops::LDLOC_3),
            Instruction::simple(ops::RET),
        ]);
        assert_eq!(matcher.find_match(&ldloc_pattern, &body), Some(0));
    }

    #[test]
    fn test_callee_full_name_verifier() {
        let mut module = empty_module();
        module.add_type(TypeDef {
            token: Token::new(0x0100_0001),
            namespace: "System".into(),
            name: "Array".into(),
            enclosing: None,
        });
        module.add_method(MethodDef {
            token: Token::new(0x0A00_0001),
            name: "get_Length".into(),
            declaring_type: Token::new(0x0100_0001),
            return_type: Token::new(0x0100_0001),
            flags: MethodFlags::PUBLIC,
            body: None,
        });

        let matcher = HandlerMatcher::with_catalog(&module, &[]);
        let verified = OpcodePattern {
            name: "len",
            prototype: &[ops::LDARG_0, ops::CALLVIRT, ops::RET],
            match_entire_body: true,
            interchange: Interchange::empty(),
            target: PatternTarget::Cil(ops::LDLEN),
            verifier: Verifier::CalleeFullName {
                slot: 1,
                full_name: "System.Array::get_Length",
            },
        };

        let good = body_of(vec![
            Instruction::simple(ops::LDARG_0),
            call(0x0A00_0001),
            Instruction::simple(ops::RET),
        ]);
        assert_eq!(matcher.find_match(&verified, &good), Some(0));

        // Unknown callee token: shape fits, verifier rejects.
        let bad = body_of(vec![
            Instruction::simple(ops::LDARG_0),
            call(0x0A00_0099),
            Instruction::simple(ops::RET),
        ]);
        assert_eq!(matcher.find_match(&verified, &bad), None);
    }

    #[test]
    fn test_sub_pattern_verifier_recurses_into_callee() {
        let mut module = empty_module();
        let helper = Token::new(0x0600_0002);
        let mut helper_body = MethodBody::new(2);
        helper_body.instructions = vec![
            Instruction::simple(ops::LDARG_0),
            Instruction::simple(ops::RET),
        ];
        module.add_type(TypeDef {
            token: Token::new(0x0200_0001),
            namespace: String::new(),
            name: "VM".into(),
            enclosing: None,
        });
        module.add_method(MethodDef {
            token: helper,
            name: "Inner".into(),
            declaring_type: Token::new(0x0200_0001),
            return_type: Token::new(0x0200_0001),
            flags: MethodFlags::empty(),
            body: Some(helper_body),
        });

        let matcher = HandlerMatcher::with_catalog(&module, &[]);
        let outer = OpcodePattern {
            name: "outer",
            prototype: &[ops::LDARG_0, ops::CALLVIRT, ops::RET],
            match_entire_body: true,
            interchange: Interchange::empty(),
            target: PatternTarget::Cil(ops::LDLEN),
            verifier: Verifier::SubPattern {
                slot: 1,
                prototype: &[ops::LDARG_0, ops::RET],
                interchange: Interchange::empty(),
            },
        };

        let body = body_of(vec![
            Instruction::simple(ops::LDARG_0),
            Instruction::new(ops::CALLVIRT, Operand::Token(helper)),
            Instruction::simple(ops::RET),
        ]);
        assert_eq!(matcher.find_match(&outer, &body), Some(0));

        // A callee whose body does not match the inner shape is rejected.
        let other = body_of(vec![
            Instruction::simple(ops::LDARG_0),
            Instruction::new(ops::CALLVIRT, Operand::Token(Token::new(0x0600_0099))),
            Instruction::simple(ops::RET),
        ]);
        assert_eq!(matcher.find_match(&outer, &other), None);
    }

    #[test]
    fn test_ambiguous_patterns_keep_first_match() {
        let mut module = empty_module();
        module.add_type(TypeDef {
            token: Token::new(0x0200_0001),
            namespace: String::new(),
            name: "VM".into(),
            enclosing: None,
        });
        let handler = Token::new(0x0600_0004);
        let mut handler_body = MethodBody::new(2);
        handler_body.instructions = vec![
            Instruction::simple(ops::LDARG_0),
            call(0x0600_0099),
            Instruction::simple(ops::STLOC_0),
            Instruction::simple(ops::RET),
        ];
        module.add_method(MethodDef {
            token: handler,
            name: "h2".into(),
            declaring_type: Token::new(0x0200_0001),
            return_type: Token::new(0x0200_0001),
            flags: MethodFlags::empty(),
            body: Some(handler_body),
        });

        // Both entries accept the body but disagree on the target; the
        // ambiguity is reported and the first entry wins.
        static AMBIGUOUS_CATALOG: &[OpcodePattern] = &[
            OpcodePattern {
                name: "pop",
                prototype: &[ops::LDARG_0, ops::CALLVIRT, ops::STLOC_0, ops::RET],
                match_entire_body: true,
                interchange: Interchange::empty(),
                target: PatternTarget::Cil(ops::POP),
                verifier: Verifier::None,
            },
            OpcodePattern {
                name: "dup-ish",
                prototype: &[ops::CALLVIRT, ops::STLOC_0],
                match_entire_body: false,
                interchange: Interchange::empty(),
                target: PatternTarget::Cil(ops::DUP),
                verifier: Verifier::None,
            },
        ];

        let matcher = HandlerMatcher::with_catalog(&module, AMBIGUOUS_CATALOG);
        let mut opcodes = vec![VmOpcode {
            virtual_code: 9,
            instruction_field: Token::new(0x0400_0001),
            handler,
            operand_code: 10,
            resolved: ResolvedOpcode::Unidentified,
        }];

        assert_eq!(matcher.identify_all(&mut opcodes), 1);
        assert_eq!(opcodes[0].resolved, ResolvedOpcode::Cil(ops::POP));
    }

    #[test]
    fn test_identify_all_is_deterministic() {
        let mut module = empty_module();
        module.add_type(TypeDef {
            token: Token::new(0x0200_0001),
            namespace: String::new(),
            name: "VM".into(),
            enclosing: None,
        });
        let handler = Token::new(0x0600_0003);
        let mut handler_body = MethodBody::new(2);
        handler_body.instructions = vec![
            Instruction::simple(ops::LDARG_0),
            call(0x0600_0099),
            Instruction::simple(ops::STLOC_1),
            Instruction::simple(ops::RET),
        ];
        module.add_method(MethodDef {
            token: handler,
            name: "h1".into(),
            declaring_type: Token::new(0x0200_0001),
            return_type: Token::new(0x0200_0001),
            flags: MethodFlags::empty(),
            body: Some(handler_body),
        });

        static TEST_CATALOG: &[OpcodePattern] = &[OpcodePattern {
            name: "pop",
            prototype: &[ops::LDARG_0, ops::CALLVIRT, ops::STLOC_0, ops::RET],
            match_entire_body: true,
            interchange: Interchange::STLOC,
            target: PatternTarget::Cil(ops::POP),
            verifier: Verifier::None,
        }];

        let matcher = HandlerMatcher::with_catalog(&module, TEST_CATALOG);
        let make_opcodes = || {
            vec![VmOpcode {
                virtual_code: 1,
                instruction_field: Token::new(0x0400_0001),
                handler,
                operand_code: 10,
                resolved: ResolvedOpcode::Unidentified,
            }]
        };

        let mut first = make_opcodes();
        let mut second = make_opcodes();
        assert_eq!(matcher.identify_all(&mut first), 1);
        assert_eq!(matcher.identify_all(&mut second), 1);
        assert_eq!(first[0].resolved, second[0].resolved);
        assert_eq!(first[0].resolved, ResolvedOpcode::Cil(ops::POP));
    }
}
