//! Convenient re-exports of the types most integrations touch.
//!
//! ```rust,no_run
//! use eazdevirt::prelude::*;
//!
//! let module = Module::new("demo");
//! let result = Devirtualizer::new(&module).run();
//! # let _ = result;
//! ```

pub use crate::{
    cil::{ops, CilOpCode, Instruction, Operand},
    crypto::{CipherStream, SeekOrigin, VmKey},
    locator::VmDiscovery,
    matcher::{HandlerMatcher, OpcodePattern},
    metadata::{
        method::{MethodBody, MethodDef},
        module::Module,
        token::Token,
    },
    pipeline::{DevirtOptions, DevirtOutcome, Devirtualizer},
    translator::{MethodTranslator, TokenResolver, TranslationReport},
    vm::{OpcodeTable, ResolvedOpcode, SpecialOpcode, VmOpcode},
    Error, Result,
};
