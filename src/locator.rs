//! Discovery of the VM's embedded resource, key material and declaring type.
//!
//! The entry point into a protected binary is its *stream getter*: the one
//! public static method returning `System.IO.Stream` that opens the encrypted
//! resource and wires up the decrypting reader. Its body is shape-matched
//! like any opcode handler; distinguished instruction slots of the match then
//! yield the resource name, the RVA-backed session key, and the two helper
//! calls (modulus string method and initializer) that follow the prefix.

use crate::{
    cil::{ops, Operand},
    crypto::{key::FALLBACK_MODULUS, VmKey},
    matcher::{
        pattern::{Interchange, OpcodePattern, PatternTarget, Verifier},
        HandlerMatcher,
    },
    metadata::{method::MethodDef, module::Module, token::Token},
    Error, Result,
};

/// Shape of the stream getter's prologue: open the manifest resource, stash
/// it, load the key field, stash it.
///
/// Slot 1 (`ldstr`) is the resource name, slot 4 (`ldsfld`) the key field.
static GET_VM_STREAM: OpcodePattern = OpcodePattern {
    name: "get-vm-stream",
    prototype: &[
        ops::CALL,
        ops::LDSTR,
        ops::CALLVIRT,
        ops::STLOC_0,
        ops::LDSFLD,
        ops::STLOC_1,
    ],
    match_entire_body: false,
    interchange: Interchange::STLOC,
    // Discovery only; the target is never assigned to an opcode.
    target: PatternTarget::Cil(ops::NOP),
    verifier: Verifier::None,
};

const RESOURCE_NAME_SLOT: usize = 1;
const KEY_FIELD_SLOT: usize = 4;

const INITIALIZE_ARRAY: &str = "System.Runtime.CompilerServices.RuntimeHelpers::InitializeArray";
const STREAM_SENTINEL: &str = "System.IO.Stream";
const VOID: &str = "System.Void";

/// Everything discovery yields: the derived key plus the tokens later stages
/// anchor on.
#[derive(Debug, Clone)]
pub struct VmDiscovery {
    /// Derived decryption key.
    pub key: VmKey,
    /// The VM's declaring type (the dispatcher host).
    pub vm_type: Token,
    /// Manifest name of the encrypted resource.
    pub resource_name: String,
    /// The stream getter method.
    pub getter: Token,
    /// The method whose `ldstr` carries the Base64 modulus.
    pub modulus_method: Token,
    /// The initializer call following the modulus-string method, when the
    /// scan reached one.
    pub initializer: Option<Token>,
}

/// Run discovery over the module arena.
///
/// # Errors
/// - [`Error::ResourceNotFound`] when no candidate matches the getter shape
///   or the named resource is absent
/// - [`Error::KeyUnavailable`] when the key field has no RVA data
/// - [`Error::ModulusMissing`] when no modulus-string method is reachable
/// - [`Error::DispatcherNotFound`] when the VM type cannot be derived
pub fn locate(module: &Module) -> Result<VmDiscovery> {
    let matcher = HandlerMatcher::new(module);

    let (getter, prefix) = find_stream_getter(module, &matcher)?;
    let Some(body) = getter.body.as_ref() else {
        return Err(malformed_error!("Stream getter {} lost its body", getter.token));
    };

    let resource_name = match &body.instructions[prefix + RESOURCE_NAME_SLOT].operand {
        Operand::String(name) => name.clone(),
        other => {
            return Err(malformed_error!(
                "Stream getter resource slot holds {other:?} instead of a string"
            ))
        }
    };
    if module.resource(&resource_name).is_none() {
        return Err(Error::ResourceNotFound(resource_name));
    }

    let session_key = read_session_key(module, &body.instructions[prefix + KEY_FIELD_SLOT].operand)?;

    let (modulus_method, initializer) = scan_helper_calls(module, body, prefix + GET_VM_STREAM.prototype.len())?;
    let modulus_string = read_modulus_string(module, modulus_method);
    let key = VmKey::derive(session_key, &modulus_string)?;

    let vm_type = derive_vm_type(module, getter, modulus_method)?;

    log::info!(
        "VM resource '{resource_name}' keyed with {}-byte session key, VM type {}",
        key.session_key.len(),
        module.type_full_name(vm_type).unwrap_or_default()
    );

    Ok(VmDiscovery {
        key,
        vm_type,
        resource_name,
        getter: getter.token,
        modulus_method,
        initializer,
    })
}

fn find_stream_getter<'m>(
    module: &'m Module,
    matcher: &HandlerMatcher<'m>,
) -> Result<(&'m MethodDef, usize)> {
    for method in module.methods() {
        if !method.is_static() || !method.is_public() {
            continue;
        }
        if module.type_full_name(method.return_type).as_deref() != Some(STREAM_SENTINEL) {
            continue;
        }
        let Some(body) = method.body.as_ref() else {
            continue;
        };
        if let Some(start) = matcher.find_match(&GET_VM_STREAM, &body.instructions) {
            return Ok((method, start));
        }
    }

    Err(Error::ResourceNotFound(
        "no public static Stream method matches the getter shape".to_string(),
    ))
}

fn read_session_key(module: &Module, operand: &Operand) -> Result<Vec<u8>> {
    let Operand::Token(field_token) = operand else {
        return Err(malformed_error!(
            "Stream getter key slot holds {operand:?} instead of a field token"
        ));
    };

    let Some(field) = module.field(*field_token) else {
        return Err(Error::KeyUnavailable(*field_token));
    };
    field
        .rva_data
        .clone()
        .ok_or(Error::KeyUnavailable(*field_token))
}

/// Scan the instructions after the matched prefix for the two helper calls.
///
/// The first `call` whose target is not the runtime's `InitializeArray`
/// helper is the modulus-string method; the next `call` after it is the
/// initializer, and the scan stops on that first assignment. Later call
/// sites are deliberately never considered, matching the behavior this
/// recovery was reverse-engineered from.
fn scan_helper_calls(
    module: &Module,
    body: &crate::metadata::method::MethodBody,
    from: usize,
) -> Result<(Token, Option<Token>)> {
    let mut modulus_method = None;
    let mut initializer = None;

    for instruction in body.instructions.iter().skip(from) {
        if instruction.op != ops::CALL {
            continue;
        }
        let Operand::Token(target) = &instruction.operand else {
            continue;
        };

        if modulus_method.is_none() {
            let is_init_array =
                module.member_full_name(*target).as_deref() == Some(INITIALIZE_ARRAY);
            if !is_init_array {
                modulus_method = Some(*target);
            }
        } else {
            initializer = Some(*target);
            break;
        }
    }

    modulus_method
        .map(|m| (m, initializer))
        .ok_or(Error::ModulusMissing)
}

/// First `ldstr` of the modulus-string method, or the build-specific
/// fallback when string protection has removed it.
fn read_modulus_string(module: &Module, modulus_method: Token) -> String {
    let Some(body) = module.method_body(modulus_method) else {
        return FALLBACK_MODULUS.to_string();
    };

    for instruction in &body.instructions {
        if instruction.op == ops::LDSTR {
            if let Operand::String(literal) = &instruction.operand {
                return literal.clone();
            }
        }
    }

    log::warn!("modulus-string method has no ldstr, using the build fallback");
    FALLBACK_MODULUS.to_string()
}

/// The VM type is reached through a sibling of the getter: any method of the
/// same declaring type, distinct from the getter and the modulus-string
/// method, with a non-void return type. The type declaring that return type
/// is the VM type (the return type itself when it is not nested).
fn derive_vm_type(module: &Module, getter: &MethodDef, modulus_method: Token) -> Result<Token> {
    for sibling in module.methods_of(getter.declaring_type) {
        if sibling.token == getter.token || sibling.token == modulus_method {
            continue;
        }
        let Some(return_type) = module.type_def(sibling.return_type) else {
            continue;
        };
        if module.type_full_name(return_type.token).as_deref() == Some(VOID) {
            continue;
        }

        return Ok(return_type.enclosing.unwrap_or(return_type.token));
    }

    Err(Error::DispatcherNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cil::Instruction,
        metadata::{
            method::{MethodBody, MethodFlags},
            module::{FieldDef, TypeDef},
        },
    };

    const T_STREAM: Token = Token::new(0x0100_0001);
    const T_VOID: Token = Token::new(0x0100_0002);
    const T_HOST: Token = Token::new(0x0200_0001);
    const T_VM: Token = Token::new(0x0200_0002);
    const T_VM_NESTED: Token = Token::new(0x0200_0003);
    const F_KEY: Token = Token::new(0x0400_0001);
    const M_GETTER: Token = Token::new(0x0600_0001);
    const M_MODULUS: Token = Token::new(0x0600_0002);
    const M_INIT: Token = Token::new(0x0600_0003);
    const M_SIBLING: Token = Token::new(0x0600_0004);
    const M_INIT_ARRAY: Token = Token::new(0x0A00_0001);

    fn getter_instructions() -> Vec<Instruction> {
        vec![
            Instruction::new(ops::CALL, Operand::Token(Token::new(0x0A00_0010))),
            Instruction::new(ops::LDSTR, Operand::String("vmres".into())),
            Instruction::new(ops::CALLVIRT, Operand::Token(Token::new(0x0A00_0011))),
            Instruction::simple(ops::STLOC_0),
            Instruction::new(ops::LDSFLD, Operand::Token(F_KEY)),
            Instruction::simple(ops::STLOC_1),
            Instruction::new(ops::CALL, Operand::Token(M_INIT_ARRAY)),
            Instruction::new(ops::CALL, Operand::Token(M_MODULUS)),
            Instruction::new(ops::CALL, Operand::Token(M_INIT)),
            Instruction::simple(ops::RET),
        ]
    }

    fn modulus_instructions(with_ldstr: bool) -> Vec<Instruction> {
        let mut instructions = Vec::new();
        if with_ldstr {
            instructions.push(Instruction::new(ops::LDSTR, Operand::String("AAAA".into())));
        }
        instructions.push(Instruction::simple(ops::RET));
        instructions
    }

    fn build_module(with_ldstr: bool, with_rva: bool) -> Module {
        build_module_opts(with_ldstr, with_rva, true)
    }

    fn build_module_opts(with_ldstr: bool, with_rva: bool, with_resource: bool) -> Module {
        let mut module = Module::new("protected.exe");
        for (token, ns, name, enclosing) in [
            (T_STREAM, "System.IO", "Stream", None),
            (T_VOID, "System", "Void", None),
            (T_HOST, "", "c9Zw", None),
            (T_VM, "", "a8Kq", None),
            (T_VM_NESTED, "", "x0", Some(T_VM)),
        ] {
            module.add_type(TypeDef {
                token,
                namespace: ns.to_string(),
                name: name.to_string(),
                enclosing,
            });
        }
        module.add_type(TypeDef {
            token: Token::new(0x0100_0003),
            namespace: "System.Runtime.CompilerServices".into(),
            name: "RuntimeHelpers".into(),
            enclosing: None,
        });
        module.add_method(MethodDef {
            token: M_INIT_ARRAY,
            name: "InitializeArray".into(),
            declaring_type: Token::new(0x0100_0003),
            return_type: T_VOID,
            flags: MethodFlags::STATIC | MethodFlags::PUBLIC,
            body: None,
        });

        module.add_field(FieldDef {
            token: F_KEY,
            name: "k".into(),
            declaring_type: T_HOST,
            rva_data: with_rva.then(|| vec![0xAB, 0xCD]),
        });

        let mut getter_body = MethodBody::new(4);
        getter_body.instructions = getter_instructions();
        module.add_method(MethodDef {
            token: M_GETTER,
            name: "g".into(),
            declaring_type: T_HOST,
            return_type: T_STREAM,
            flags: MethodFlags::STATIC | MethodFlags::PUBLIC,
            body: Some(getter_body),
        });

        let mut modulus_body = MethodBody::new(1);
        modulus_body.instructions = modulus_instructions(with_ldstr);
        module.add_method(MethodDef {
            token: M_MODULUS,
            name: "m".into(),
            declaring_type: T_HOST,
            return_type: T_STREAM,
            flags: MethodFlags::STATIC,
            body: Some(modulus_body),
        });

        module.add_method(MethodDef {
            token: M_INIT,
            name: "i".into(),
            declaring_type: T_HOST,
            return_type: T_VOID,
            flags: MethodFlags::STATIC,
            body: None,
        });

        // The sibling whose nested return type reveals the VM type.
        let mut sibling_body = MethodBody::new(1);
        sibling_body.instructions = vec![Instruction::simple(ops::RET)];
        module.add_method(MethodDef {
            token: M_SIBLING,
            name: "s".into(),
            declaring_type: T_HOST,
            return_type: T_VM_NESTED,
            flags: MethodFlags::STATIC,
            body: Some(sibling_body),
        });

        if with_resource {
            module.add_resource("vmres", vec![0u8; 0]);
        }
        module
    }

    #[test]
    fn test_locate_happy_path() {
        let module = build_module(true, true);
        let discovery = locate(&module).unwrap();

        assert_eq!(discovery.resource_name, "vmres");
        assert_eq!(discovery.getter, M_GETTER);
        assert_eq!(discovery.modulus_method, M_MODULUS);
        assert_eq!(discovery.initializer, Some(M_INIT));
        assert_eq!(discovery.vm_type, T_VM);
        assert_eq!(discovery.key.session_key, vec![0xAB, 0xCD]);
    }

    #[test]
    fn test_initialize_array_call_is_skipped() {
        // The first call after the prefix targets InitializeArray and must
        // not become the modulus method.
        let module = build_module(true, true);
        let discovery = locate(&module).unwrap();
        assert_ne!(discovery.modulus_method, M_INIT_ARRAY);
    }

    #[test]
    fn test_missing_resource() {
        let module = build_module_opts(true, true, false);
        assert!(matches!(
            locate(&module),
            Err(Error::ResourceNotFound(name)) if name == "vmres"
        ));
    }

    #[test]
    fn test_missing_rva_data_is_key_unavailable() {
        let module = build_module(true, false);
        assert!(matches!(locate(&module), Err(Error::KeyUnavailable(t)) if t == F_KEY));
    }

    #[test]
    fn test_fallback_modulus_when_no_ldstr() {
        let module = build_module(false, true);
        let discovery = locate(&module).unwrap();
        let expected = VmKey::derive(vec![0xAB, 0xCD], FALLBACK_MODULUS).unwrap();
        assert_eq!(discovery.key, expected);
    }

    #[test]
    fn test_no_getter_shape() {
        let mut module = Module::new("protected.exe");
        module.add_type(TypeDef {
            token: T_STREAM,
            namespace: "System.IO".into(),
            name: "Stream".into(),
            enclosing: None,
        });
        assert!(matches!(locate(&module), Err(Error::ResourceNotFound(_))));
    }
}
