//! Key derivation and resource decryption.
//!
//! # Key Types
//! - [`key::VmKey`] - per-build `(modulus, exponent, session_key)` triple
//! - [`stream::CipherStream`] - seekable plaintext cursor over the resource
//!
//! The Base64 decoder matches the .NET `Convert.FromBase64String` dialect the
//! protector uses to embed the modulus string.

pub mod base64;
pub mod key;
pub mod stream;

pub use base64::base64_decode;
pub use key::{VmKey, FALLBACK_MODULUS, PUBLIC_EXPONENT};
pub use stream::{CipherStream, SeekOrigin};
