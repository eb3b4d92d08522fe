//! Handler pattern model: a prototype shape plus a semantic verifier.
//!
//! Patterns are pure values; the whole catalog is a `static` table of them.
//! Prototypes are opcode sequences with `nop` acting as a wildcard slot.
//! Verifiers are a closed set of checks expressed as data (a tagged variant),
//! so adding a pattern never needs runtime type registration.

use bitflags::bitflags;

use crate::{
    cil::CilOpCode,
    vm::opcode::{ResolvedOpcode, SpecialOpcode},
};

bitflags! {
    /// Which opcode families may substitute for each other during shape
    /// matching.
    ///
    /// Load-local forms are interchangeable regardless of the `LDLOC` bit;
    /// the bit is carried for parity with the constant and store families
    /// (see the matcher for the exact rule).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Interchange: u8 {
        /// `ldc.i4.*` forms may stand in for each other.
        const LDC_I4 = 0b0000_0001;
        /// `ldloc*` forms may stand in for each other.
        const LDLOC = 0b0000_0010;
        /// `stloc*` forms may stand in for each other.
        const STLOC = 0b0000_0100;
    }
}

/// What an accepted pattern identifies the handler as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternTarget {
    /// A concrete CIL opcode.
    Cil(CilOpCode),
    /// A special action such as the virtualized-call opcode.
    Special(SpecialOpcode),
}

impl PatternTarget {
    /// The resolution this target assigns to a matched opcode.
    #[must_use]
    pub fn resolved(&self) -> ResolvedOpcode {
        match self {
            PatternTarget::Cil(op) => ResolvedOpcode::Cil(*op),
            PatternTarget::Special(special) => ResolvedOpcode::Special(*special),
        }
    }
}

/// Semantic check run after a prototype shape matches.
///
/// `slot` is relative to the start of the shape match within the handler
/// body. Sub-pattern checks recurse into the body of the method *called* at
/// the slot; recursion terminates because sub-prototypes are plain shapes
/// that cannot themselves demand further sub-patterns.
#[derive(Debug, Clone, Copy)]
pub enum Verifier {
    /// Accept unconditionally.
    None,
    /// The member called (or constructed) at `slot` has this full name.
    CalleeFullName {
        /// Prototype-relative instruction index.
        slot: usize,
        /// Expected `Declaring.Type::Member` name.
        full_name: &'static str,
    },
    /// The type token at `slot` names this type.
    TokenTypeName {
        /// Prototype-relative instruction index.
        slot: usize,
        /// Expected full type name.
        full_name: &'static str,
    },
    /// The method called at `slot` has a body matching this whole shape.
    SubPattern {
        /// Prototype-relative instruction index of the call.
        slot: usize,
        /// Shape the callee body must match from its first instruction.
        prototype: &'static [CilOpCode],
        /// Interchange policy for the sub-shape.
        interchange: Interchange,
    },
    /// Every listed check must pass.
    All(&'static [Verifier]),
}

/// One catalog entry: shape, interchange policy, verifier and target.
#[derive(Debug, Clone, Copy)]
pub struct OpcodePattern {
    /// Name for logs and diagnostics.
    pub name: &'static str,
    /// Ordered opcode shape; `nop` slots match anything.
    pub prototype: &'static [CilOpCode],
    /// When set, the shape must fit at the start of the handler body; when
    /// clear, any window of the body may match.
    pub match_entire_body: bool,
    /// Which families may substitute during shape comparison.
    pub interchange: Interchange,
    /// What a match identifies the handler as.
    pub target: PatternTarget,
    /// Semantic acceptance check.
    pub verifier: Verifier,
}
