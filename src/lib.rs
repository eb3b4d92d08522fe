// Copyright 2025-2026 The eazdevirt authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![deny(missing_docs)]

//! # eazdevirt
//!
//! A devirtualizer for the virtual machine Eazfuscator.NET embeds into
//! protected assemblies. The protector replaces method bodies with stubs
//! dispatching into a per-build interpreter whose bytecode lives in an
//! encrypted embedded resource; this crate identifies the interpreter,
//! recovers its per-build opcode numbering, decrypts the bytecode and
//! rewrites each virtualized method back into standard CIL.
//!
//! # Architecture
//!
//! The pipeline is a dependency chain of read-only stages over a module
//! arena the external assembly reader populates:
//!
//! - **Locator** ([`locator`]): finds the stream getter, the encrypted
//!   resource, the RVA-backed session key and the Base64 modulus string,
//!   and derives the VM's declaring type.
//! - **Cipher layer** ([`crypto`]): RSA-like block decryption behind a
//!   seekable, fork-able plaintext cursor with a shared block cache.
//! - **Dispatcher discovery** ([`vm`]): scans the VM constructor for opcode
//!   registrations, yielding the raw virtual-opcode records.
//! - **Handler matcher** ([`matcher`]): fingerprints each handler's IL body
//!   against a static pattern catalog to recover what every virtual opcode
//!   means.
//! - **Translator** ([`translator`]): reads each virtualized body from the
//!   cipher stream, resolves operand tokens through the sister resolver
//!   channel, patches branch targets and emits a standard method body.
//!
//! Every protected build permutes opcode numbering, handler shapes, field
//! layouts and keys; nothing here hardcodes per-build facts.
//!
//! # Usage
//!
//! ```rust,no_run
//! use eazdevirt::{Devirtualizer, metadata::module::Module};
//!
//! # fn load_module() -> Module { Module::new("demo") }
//! let module: Module = load_module(); // populated by the assembly reader
//! let outcome = Devirtualizer::new(&module).run()?;
//! for (token, body) in &outcome.bodies {
//!     println!("{token}: {} instructions", body.instructions.len());
//! }
//! eprintln!("{}", outcome.report.render());
//! # Ok::<(), eazdevirt::Error>(())
//! ```
//!
//! # Error handling
//!
//! Discovery failures ([`Error::ResourceNotFound`], [`Error::KeyUnavailable`],
//! [`Error::ModulusMissing`], [`Error::DispatcherNotFound`]) are fatal and
//! abort the run. Translation failures are per-method: the offending method
//! is recorded in the [`translator::TranslationReport`] and the remaining
//! worklist completes.

#[macro_use]
pub(crate) mod error;

pub mod cil;
pub mod crypto;
pub mod file;
pub mod locator;
pub mod matcher;
pub mod metadata;
pub mod pipeline;
pub mod prelude;
pub mod translator;
pub mod vm;

pub use error::Error;
pub use pipeline::{DevirtOptions, DevirtOutcome, Devirtualizer};

/// Convenience alias for `Result<T, eazdevirt::Error>`.
pub type Result<T> = std::result::Result<T, Error>;
