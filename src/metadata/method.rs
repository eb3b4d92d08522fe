//! Method and method-body representation.
//!
//! A [`MethodDef`] is one arena entry: identity, signature-level flags and an
//! optional decoded body. External members (BCL references like
//! `System.Array::get_Length`) are ordinary entries without a body. The
//! translator produces fresh [`MethodBody`] values for virtualized methods;
//! the assembly writer consumes them.

use bitflags::bitflags;

use crate::{cil::Instruction, metadata::token::Token};

bitflags! {
    /// Signature-level method attributes the pipeline cares about.
    ///
    /// This is deliberately a small projection of the ECMA-335 flag word: the
    /// locator filters on visibility and staticness, the translator on
    /// virtualness when lowering `EazCall` into `call`/`callvirt`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MethodFlags: u16 {
        /// The method has no `this` parameter.
        const STATIC = 0x0001;

        /// The method is visible outside its assembly.
        const PUBLIC = 0x0002;

        /// The method dispatches through the vtable.
        const VIRTUAL = 0x0004;
    }
}

bitflags! {
    /// Exception handler flags defining the type of handling clause.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ExceptionHandlerFlags: u16 {
        /// A typed exception clause; `catch_type` names the caught type.
        const EXCEPTION = 0x0000;

        /// An exception filter clause; filter code runs before the handler.
        const FILTER = 0x0001;

        /// A finally clause, executed on every exit from the try region.
        const FINALLY = 0x0002;

        /// A fault clause, executed only on exceptional exit.
        const FAULT = 0x0004;
    }
}

/// One protected region of a translated method body.
///
/// All positions are *instruction indices* into the owning body, not byte
/// offsets; the body encoder converts back to byte offsets when serializing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// The kind of handling clause.
    pub flags: ExceptionHandlerFlags,
    /// First instruction of the try region.
    pub try_start: u32,
    /// One past the last instruction of the try region.
    pub try_end: u32,
    /// First instruction of the handler region.
    pub handler_start: u32,
    /// One past the last instruction of the handler region.
    pub handler_end: u32,
    /// Caught exception type; only for [`ExceptionHandlerFlags::EXCEPTION`].
    pub catch_type: Option<Token>,
    /// First instruction of the filter block; only for
    /// [`ExceptionHandlerFlags::FILTER`].
    pub filter_start: Option<u32>,
}

/// A decoded (or freshly translated) method body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodBody {
    /// Maximum evaluation stack depth.
    pub max_stack: u16,
    /// Whether locals are zero-initialized on entry.
    pub init_locals: bool,
    /// Local variable types, in slot order.
    pub locals: Vec<Token>,
    /// The instruction sequence.
    pub instructions: Vec<Instruction>,
    /// Protected regions, outermost last (CIL clause order).
    pub handlers: Vec<ExceptionHandler>,
}

impl MethodBody {
    /// Create an empty body with the given stack depth.
    #[must_use]
    pub fn new(max_stack: u16) -> Self {
        MethodBody {
            max_stack,
            init_locals: true,
            locals: Vec::new(),
            instructions: Vec::new(),
            handlers: Vec::new(),
        }
    }
}

/// One method entry in the module arena.
///
/// External member references carry no body; everything else about them
/// (name, declaring type, flags) reads the same way as for definitions, which
/// keeps the matcher's verifier logic uniform.
#[derive(Debug, Clone)]
pub struct MethodDef {
    /// The arena address of this method.
    pub token: Token,
    /// Simple name (`"get_Length"`, `".ctor"`, ...).
    pub name: String,
    /// Arena address of the declaring type.
    pub declaring_type: Token,
    /// Arena address of the return type.
    pub return_type: Token,
    /// Signature-level attributes.
    pub flags: MethodFlags,
    /// The decoded body, when this is a definition with IL.
    pub body: Option<MethodBody>,
}

impl MethodDef {
    /// True when the method has no `this` parameter.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(MethodFlags::STATIC)
    }

    /// True when the method is publicly visible.
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.flags.contains(MethodFlags::PUBLIC)
    }

    /// True when the method dispatches through the vtable.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.flags.contains(MethodFlags::VIRTUAL)
    }

    /// True for instance and static constructors.
    #[must_use]
    pub fn is_ctor(&self) -> bool {
        self.name == ".ctor" || self.name == ".cctor"
    }
}
