//! The token resolver: the sister channel mapping operand ids back to arena
//! tokens and string literals.
//!
//! Operand tokens in the bytecode stream are not metadata tokens; they are
//! positions into a second encrypted stream holding self-describing records:
//!
//! ```text
//! u8 kind            // 0=type, 1=method, 2=field, 3=string
//! // kind 0: u16-length-prefixed UTF-8 assembly-qualified type name
//! // kind 1: declaring type name, member name (both prefixed), u8 flags
//! //         (bit0 = virtual)
//! // kind 2: declaring type name, member name (both prefixed)
//! // kind 3: u16-length-prefixed UTF-8 literal
//! ```
//!
//! Names resolve against the module arena through [`TypeName`] parsing.
//! The resolver stream is shared by every translation worker; each `seek`
//! plus the reads that follow it form one transaction under a single lock,
//! and resolved entries are cached so repeated operands touch the stream
//! once.

use std::sync::Mutex;

use dashmap::DashMap;

use crate::{
    crypto::{CipherStream, SeekOrigin},
    metadata::{module::Module, token::Token, typename::TypeName},
    Error, Result,
};

/// A resolved operand reference.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedEntry {
    /// A type reference.
    Type(Token),
    /// A method reference, with the virtual-dispatch bit the `EazCall`
    /// lowering needs.
    Method {
        /// Arena token of the method.
        token: Token,
        /// Whether invocation must go through the vtable.
        is_virtual: bool,
    },
    /// A field reference.
    Field(Token),
    /// A string literal.
    String(String),
}

/// Shared resolver over the sister cipher stream.
pub struct TokenResolver<'m> {
    module: &'m Module,
    stream: Mutex<CipherStream>,
    cache: DashMap<u32, ResolvedEntry>,
}

impl<'m> TokenResolver<'m> {
    /// Wrap the resolver stream. The cursor is owned exclusively from here
    /// on; callers hand over their fork.
    #[must_use]
    pub fn new(module: &'m Module, stream: CipherStream) -> Self {
        TokenResolver {
            module,
            stream: Mutex::new(stream),
            cache: DashMap::new(),
        }
    }

    /// Resolve an operand id.
    ///
    /// # Errors
    /// Returns [`Error::OutOfBounds`] for ids past the stream,
    /// [`Error::Malformed`] for unparseable records or names the arena does
    /// not know, and [`Error::LockError`] if the stream lock is poisoned.
    pub fn resolve(&self, id: u32) -> Result<ResolvedEntry> {
        if let Some(hit) = self.cache.get(&id) {
            return Ok(hit.clone());
        }

        let record = self.read_record(id)?;
        let entry = self.resolve_record(id, record)?;
        self.cache.insert(id, entry.clone());
        Ok(entry)
    }

    /// Resolve an id that must name a type.
    ///
    /// # Errors
    /// As [`resolve`](Self::resolve), plus [`Error::Malformed`] when the
    /// record is not a type.
    pub fn resolve_type(&self, id: u32) -> Result<Token> {
        match self.resolve(id)? {
            ResolvedEntry::Type(token) => Ok(token),
            other => Err(malformed_error!("Resolver id {id} is {other:?}, expected a type")),
        }
    }

    /// Resolve an id that must name a method.
    ///
    /// # Errors
    /// As [`resolve`](Self::resolve), plus [`Error::Malformed`] when the
    /// record is not a method.
    pub fn resolve_method(&self, id: u32) -> Result<(Token, bool)> {
        match self.resolve(id)? {
            ResolvedEntry::Method { token, is_virtual } => Ok((token, is_virtual)),
            other => Err(malformed_error!(
                "Resolver id {id} is {other:?}, expected a method"
            )),
        }
    }

    /// One `seek + read` transaction against the shared stream.
    fn read_record(&self, id: u32) -> Result<RawRecord> {
        let mut stream = self.stream.lock().map_err(|_| Error::LockError)?;

        let target = i64::from(id);
        if stream.seek(target, SeekOrigin::Begin) != u64::from(id) {
            return Err(Error::OutOfBounds);
        }

        let kind = stream.read_le::<u8>()?;
        match kind {
            0 => Ok(RawRecord::Type(read_string(&mut stream)?)),
            1 => Ok(RawRecord::Method {
                declaring: read_string(&mut stream)?,
                name: read_string(&mut stream)?,
                flags: stream.read_le::<u8>()?,
            }),
            2 => Ok(RawRecord::Field {
                declaring: read_string(&mut stream)?,
                name: read_string(&mut stream)?,
            }),
            3 => Ok(RawRecord::String(read_string(&mut stream)?)),
            other => Err(malformed_error!(
                "Resolver record at {id} has unknown kind {other}"
            )),
        }
    }

    fn resolve_record(&self, id: u32, record: RawRecord) -> Result<ResolvedEntry> {
        match record {
            RawRecord::Type(qualified) => {
                let parsed = TypeName::parse(&qualified)?;
                self.module
                    .type_by_full_name(parsed.element_name())
                    .map(ResolvedEntry::Type)
                    .ok_or_else(|| {
                        malformed_error!("Resolver id {id} names unknown type '{qualified}'")
                    })
            }
            RawRecord::Method {
                declaring,
                name,
                flags,
            } => {
                let parsed = TypeName::parse(&declaring)?;
                self.module
                    .method_by_name(parsed.element_name(), &name)
                    .map(|method| ResolvedEntry::Method {
                        token: method.token,
                        is_virtual: flags & 1 != 0,
                    })
                    .ok_or_else(|| {
                        malformed_error!("Resolver id {id} names unknown method {declaring}::{name}")
                    })
            }
            RawRecord::Field { declaring, name } => {
                let parsed = TypeName::parse(&declaring)?;
                self.module
                    .field_by_name(parsed.element_name(), &name)
                    .map(|field| ResolvedEntry::Field(field.token))
                    .ok_or_else(|| {
                        malformed_error!("Resolver id {id} names unknown field {declaring}::{name}")
                    })
            }
            RawRecord::String(literal) => Ok(ResolvedEntry::String(literal)),
        }
    }
}

enum RawRecord {
    Type(String),
    Method {
        declaring: String,
        name: String,
        flags: u8,
    },
    Field {
        declaring: String,
        name: String,
    },
    String(String),
}

fn read_string(stream: &mut CipherStream) -> Result<String> {
    let length = usize::from(stream.read_le::<u16>()?);
    let mut bytes = vec![0u8; length];
    stream.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|_| malformed_error!("Resolver string is not valid UTF-8"))
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        crypto::VmKey,
        metadata::{
            method::{MethodDef, MethodFlags},
            module::TypeDef,
        },
    };
    use num_bigint::BigUint;
    use num_traits::One;

    /// Identity-exponent stream over pre-built plaintext, block capacity 8.
    fn stream_over(plaintext: &[u8]) -> CipherStream {
        let key = VmKey {
            modulus: BigUint::from_bytes_be(&[0xFF; 9]),
            exponent: BigUint::one(),
            session_key: Vec::new(),
        };
        let mut ciphertext = Vec::new();
        for chunk in plaintext.chunks(8) {
            #[allow(clippy::cast_possible_truncation)]
            ciphertext.push(chunk.len() as u8);
            ciphertext.extend_from_slice(chunk);
            ciphertext.resize(ciphertext.len() + (8 - chunk.len()), 0);
        }
        CipherStream::new(ciphertext, &key).unwrap()
    }

    fn arena() -> Module {
        let mut module = Module::new("test.exe");
        module.add_type(TypeDef {
            token: Token::new(0x0100_0001),
            namespace: "System".into(),
            name: "Int32".into(),
            enclosing: None,
        });
        module.add_type(TypeDef {
            token: Token::new(0x0200_0001),
            namespace: "Ns".into(),
            name: "Widget".into(),
            enclosing: None,
        });
        module.add_method(MethodDef {
            token: Token::new(0x0600_0001),
            name: "Spin".into(),
            declaring_type: Token::new(0x0200_0001),
            return_type: Token::new(0x0100_0001),
            flags: MethodFlags::PUBLIC | MethodFlags::VIRTUAL,
            body: None,
        });
        module
    }

    #[test]
    fn test_resolve_type_by_qualified_name() {
        let module = arena();
        let record = wire::type_record("System.Int32, mscorlib, Version=4.0.0.0");
        let resolver = TokenResolver::new(&module, stream_over(&record));

        assert_eq!(
            resolver.resolve(0).unwrap(),
            ResolvedEntry::Type(Token::new(0x0100_0001))
        );
        assert_eq!(resolver.resolve_type(0).unwrap(), Token::new(0x0100_0001));
    }

    #[test]
    fn test_resolve_method_with_virtual_flag() {
        let module = arena();
        let record = wire::method_record("Ns.Widget", "Spin", true);
        let resolver = TokenResolver::new(&module, stream_over(&record));

        assert_eq!(
            resolver.resolve_method(0).unwrap(),
            (Token::new(0x0600_0001), true)
        );
    }

    #[test]
    fn test_resolve_string_literal() {
        let module = arena();
        let record = wire::string_record("hello vm");
        let resolver = TokenResolver::new(&module, stream_over(&record));

        assert_eq!(
            resolver.resolve(0).unwrap(),
            ResolvedEntry::String("hello vm".into())
        );
    }

    #[test]
    fn test_records_at_nonzero_positions() {
        let module = arena();
        let mut plaintext = wire::string_record("first");
        let second_at = plaintext.len() as u32;
        plaintext.extend(wire::type_record("Ns.Widget"));
        let resolver = TokenResolver::new(&module, stream_over(&plaintext));

        assert_eq!(
            resolver.resolve(second_at).unwrap(),
            ResolvedEntry::Type(Token::new(0x0200_0001))
        );
        // Cache hit path returns the identical entry.
        assert_eq!(
            resolver.resolve(second_at).unwrap(),
            ResolvedEntry::Type(Token::new(0x0200_0001))
        );
    }

    #[test]
    fn test_unknown_name_is_malformed() {
        let module = arena();
        let record = wire::type_record("Ns.Missing");
        let resolver = TokenResolver::new(&module, stream_over(&record));
        assert!(matches!(resolver.resolve(0), Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_kind_mismatch() {
        let module = arena();
        let record = wire::string_record("text");
        let resolver = TokenResolver::new(&module, stream_over(&record));
        assert!(resolver.resolve_type(0).is_err());
        assert!(resolver.resolve_method(0).is_err());
    }

    #[test]
    fn test_id_past_stream_is_out_of_bounds() {
        let module = arena();
        let record = wire::string_record("x");
        let resolver = TokenResolver::new(&module, stream_over(&record));
        assert!(matches!(resolver.resolve(10_000), Err(Error::OutOfBounds)));
    }

    #[test]
    fn test_unknown_kind_is_malformed() {
        let module = arena();
        let resolver = TokenResolver::new(&module, stream_over(&[9, 0, 0]));
        assert!(matches!(resolver.resolve(0), Err(Error::Malformed { .. })));
    }
}
