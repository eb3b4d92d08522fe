//! The metadata layer: tokens, type names, and the module arena.
//!
//! # Key Types
//! - [`token::Token`] - 32-bit metadata token, the arena address type
//! - [`typename::TypeName`] - parsed assembly-qualified type names
//! - [`module::Module`] - the arena the external assembly reader populates
//! - [`method::MethodDef`] / [`method::MethodBody`] - method model

pub mod method;
pub mod module;
pub mod token;
pub mod typename;
