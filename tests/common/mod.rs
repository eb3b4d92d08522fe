//! Shared fixtures: a synthetic protected module arena and a real RSA
//! key/ciphertext builder for exercising the pipeline end to end.

// Each integration suite uses a different slice of these helpers.
#![allow(dead_code)]

use eazdevirt::{
    cil::{ops, Instruction, Operand},
    crypto::VmKey,
    metadata::{
        method::{MethodBody, MethodDef, MethodFlags},
        module::{FieldDef, Module, TypeDef},
        token::Token,
    },
};
use num_bigint::BigUint;

/// Famous primes (the 1,000,000th and the 100,000,000th); their product is a
/// 7-byte modulus, so cipher blocks carry 6 payload bytes.
pub const P: u64 = 15_485_863;
pub const Q: u64 = 2_038_074_743;

/// RSA material with the private exponent the tests encrypt with.
pub struct TestRsa {
    pub n: BigUint,
    pub d: BigUint,
    pub session_key: Vec<u8>,
    pub modulus_string: String,
}

impl TestRsa {
    /// Split the modulus bytes into a 2-byte session key and a Base64
    /// remainder, the way the protector stores them.
    pub fn generate() -> TestRsa {
        let n = BigUint::from(P) * BigUint::from(Q);
        let n_bytes = n.to_bytes_be();
        assert_eq!(n_bytes.len(), 7, "expected a 7-byte modulus");

        let phi = (P as u128 - 1) * (Q as u128 - 1);
        let d = modinv(65_537, phi);

        let session_key = n_bytes[..2].to_vec();
        let modulus_string = base64_encode(&n_bytes[2..]);

        TestRsa {
            n,
            d: BigUint::from(d),
            session_key,
            modulus_string,
        }
    }

    /// The key exactly as the pipeline will derive it.
    pub fn vm_key(&self) -> VmKey {
        VmKey::derive(self.session_key.clone(), &self.modulus_string).unwrap()
    }

    /// Encrypt plaintext into the block layout the cipher stream expects:
    /// each 7-byte block is `payload_len || payload || padding`, raised to
    /// the private exponent so the stream's public exponent recovers it.
    pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        let block_size = 7usize;
        let capacity = block_size - 1;
        let mut ciphertext = Vec::new();

        for chunk in plaintext.chunks(capacity) {
            let mut block = vec![chunk.len() as u8];
            block.extend_from_slice(chunk);
            block.resize(block_size, 0);

            let m = BigUint::from_bytes_be(&block);
            assert!(m < self.n, "plaintext block exceeds modulus");
            let c = m.modpow(&self.d, &self.n);
            let raw = c.to_bytes_be();
            assert!(raw.len() <= block_size);

            ciphertext.resize(ciphertext.len() + (block_size - raw.len()), 0);
            ciphertext.extend_from_slice(&raw);
        }

        ciphertext
    }
}

fn modinv(a: u128, modulus: u128) -> u128 {
    let (mut old_r, mut r) = (a as i128, modulus as i128);
    let (mut old_s, mut s) = (1i128, 0i128);
    while r != 0 {
        let q = old_r / r;
        (old_r, r) = (r, old_r - q * r);
        (old_s, s) = (s, old_s - q * s);
    }
    assert_eq!(old_r, 1, "not coprime");
    old_s.rem_euclid(modulus as i128) as u128
}

pub fn base64_encode(data: &[u8]) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut out = String::new();
    for chunk in data.chunks(3) {
        let n = (u32::from(chunk[0]) << 16)
            | (u32::from(chunk.get(1).copied().unwrap_or(0)) << 8)
            | u32::from(chunk.get(2).copied().unwrap_or(0));
        out.push(char::from(ALPHABET[(n >> 18 & 0x3F) as usize]));
        out.push(char::from(ALPHABET[(n >> 12 & 0x3F) as usize]));
        out.push(if chunk.len() > 1 {
            char::from(ALPHABET[(n >> 6 & 0x3F) as usize])
        } else {
            '='
        });
        out.push(if chunk.len() > 2 {
            char::from(ALPHABET[(n & 0x3F) as usize])
        } else {
            '='
        });
    }
    out
}

/// Resolver-stream record builders (mirroring the resolver wire format).
pub mod wire {
    pub fn push_string(out: &mut Vec<u8>, value: &str) {
        out.extend_from_slice(&u16::try_from(value.len()).unwrap().to_le_bytes());
        out.extend_from_slice(value.as_bytes());
    }

    pub fn type_record(qualified: &str) -> Vec<u8> {
        let mut out = vec![0u8];
        push_string(&mut out, qualified);
        out
    }

    pub fn method_record(declaring: &str, name: &str, is_virtual: bool) -> Vec<u8> {
        let mut out = vec![1u8];
        push_string(&mut out, declaring);
        push_string(&mut out, name);
        out.push(u8::from(is_virtual));
        out
    }

    pub fn string_record(literal: &str) -> Vec<u8> {
        let mut out = vec![3u8];
        push_string(&mut out, literal);
        out
    }
}

// Fixed token layout for the synthetic arena.
pub const T_STREAM: Token = Token::new(0x0100_0001);
pub const T_VOID: Token = Token::new(0x0100_0002);
pub const T_STRING: Token = Token::new(0x0100_0003);
pub const T_INT32: Token = Token::new(0x0100_0004);
pub const T_INT64: Token = Token::new(0x0100_0005);
pub const T_ARRAY: Token = Token::new(0x0100_0006);
pub const T_CONVERT: Token = Token::new(0x0100_0007);
pub const T_RUNTIME_HELPERS: Token = Token::new(0x0100_0008);
pub const T_EXCEPTION: Token = Token::new(0x0100_0009);
pub const T_OBJECT: Token = Token::new(0x0100_000A);

pub const M_GET_LENGTH: Token = Token::new(0x0A00_0001);
pub const M_GET_TYPE_FROM_HANDLE: Token = Token::new(0x0A00_0002);
pub const M_TO_INT32: Token = Token::new(0x0A00_0003);
pub const M_INITIALIZE_ARRAY: Token = Token::new(0x0A00_0004);
pub const M_GET_LONG_LENGTH: Token = Token::new(0x0A00_0005);

pub const T_TYPE: Token = Token::new(0x0100_000B);

/// Seed the BCL references every fixture needs.
pub fn seed_bcl(module: &mut Module) {
    for (token, ns, name) in [
        (T_STREAM, "System.IO", "Stream"),
        (T_VOID, "System", "Void"),
        (T_STRING, "System", "String"),
        (T_INT32, "System", "Int32"),
        (T_INT64, "System", "Int64"),
        (T_ARRAY, "System", "Array"),
        (T_CONVERT, "System", "Convert"),
        (T_RUNTIME_HELPERS, "System.Runtime.CompilerServices", "RuntimeHelpers"),
        (T_EXCEPTION, "System", "Exception"),
        (T_OBJECT, "System", "Object"),
        (T_TYPE, "System", "Type"),
    ] {
        module.add_type(TypeDef {
            token,
            namespace: ns.to_string(),
            name: name.to_string(),
            enclosing: None,
        });
    }

    for (token, declaring, name) in [
        (M_GET_LENGTH, T_ARRAY, "get_Length"),
        (M_GET_LONG_LENGTH, T_ARRAY, "get_LongLength"),
        (M_GET_TYPE_FROM_HANDLE, T_TYPE, "GetTypeFromHandle"),
        (M_TO_INT32, T_CONVERT, "ToInt32"),
        (M_INITIALIZE_ARRAY, T_RUNTIME_HELPERS, "InitializeArray"),
    ] {
        module.add_method(MethodDef {
            token,
            name: name.to_string(),
            declaring_type: declaring,
            return_type: T_VOID,
            flags: MethodFlags::STATIC | MethodFlags::PUBLIC,
            body: None,
        });
    }
}

/// Add an external (bodyless) method entry.
pub fn add_extern(module: &mut Module, token: Token, declaring: Token, name: &str) {
    module.add_method(MethodDef {
        token,
        name: name.to_string(),
        declaring_type: declaring,
        return_type: T_VOID,
        flags: MethodFlags::PUBLIC,
        body: None,
    });
}

/// Add a method with a body built from the given instructions.
pub fn add_method_with_body(
    module: &mut Module,
    token: Token,
    declaring: Token,
    name: &str,
    return_type: Token,
    flags: MethodFlags,
    instructions: Vec<Instruction>,
) {
    let mut body = MethodBody::new(8);
    body.instructions = instructions;
    module.add_method(MethodDef {
        token,
        name: name.to_string(),
        declaring_type: declaring,
        return_type,
        flags,
        body: Some(body),
    });
}

/// Add an RVA-backed field.
pub fn add_rva_field(module: &mut Module, token: Token, declaring: Token, data: Vec<u8>) {
    module.add_field(FieldDef {
        token,
        name: "keyData".to_string(),
        declaring_type: declaring,
        rva_data: Some(data),
    });
}

/// Shorthand for `Instruction` construction in fixture bodies.
pub fn i(op: eazdevirt::cil::CilOpCode) -> Instruction {
    Instruction::simple(op)
}

pub fn i_tok(op: eazdevirt::cil::CilOpCode, token: Token) -> Instruction {
    Instruction::new(op, Operand::Token(token))
}

pub fn i_str(op: eazdevirt::cil::CilOpCode, value: &str) -> Instruction {
    Instruction::new(op, Operand::String(value.to_string()))
}

pub fn i_i4(value: i32) -> Instruction {
    Instruction::new(ops::LDC_I4, Operand::Int32(value))
}
