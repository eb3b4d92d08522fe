//! The CIL opcode set (ECMA-335, single- and two-byte encodings).
//!
//! A [`CilOpCode`] is the `(prefix, code)` byte pair identifying one
//! instruction. Two-byte opcodes share the `0xFE` prefix. Every opcode has a
//! [`OpDescriptor`] giving its mnemonic, operand encoding and control-flow
//! class; unassigned byte values have none.
//!
//! Named constants for the whole set live in [`ops`], which is what the
//! pattern catalog and the tests spell prototypes with.

use std::fmt;

/// Operand encoding classes of CIL instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CilOperandKind {
    /// No operand bytes
    None,
    /// `i8` immediate
    ShortInlineI,
    /// `u8` local/argument index
    ShortInlineVar,
    /// `i8` branch displacement
    ShortInlineBrTarget,
    /// `f32` immediate
    ShortInlineR,
    /// `i32` immediate
    InlineI,
    /// `i64` immediate
    InlineI8,
    /// `f64` immediate
    InlineR,
    /// `u16` local/argument index
    InlineVar,
    /// `i32` branch displacement
    InlineBrTarget,
    /// `u32` metadata token
    InlineTok,
    /// `u32` user-string token
    InlineString,
    /// `u32` count followed by that many `i32` displacements
    InlineSwitch,
}

/// Control-flow classes of CIL instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CilFlow {
    /// Execution continues with the next instruction
    Next,
    /// Unconditional transfer (includes `leave`)
    Branch,
    /// Conditional transfer (includes `switch`)
    CondBranch,
    /// Method invocation
    Call,
    /// Method or handler exit (`ret`, `endfinally`, `endfilter`)
    Return,
    /// Exception raise (`throw`, `rethrow`)
    Throw,
    /// Debugger break
    Break,
    /// Instruction prefix, modifies the following instruction
    Prefix,
}

/// Static description of one opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpDescriptor {
    /// Human-readable mnemonic (`"ldc.i4.s"`, `"callvirt"`, ...)
    pub mnemonic: &'static str,
    /// Operand encoding class
    pub operand: CilOperandKind,
    /// Control-flow class
    pub flow: CilFlow,
}

/// One CIL opcode: a `(prefix, code)` byte pair.
///
/// `prefix` is `0` for single-byte opcodes and `0xFE` for the extended set.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CilOpCode {
    prefix: u8,
    code: u8,
}

impl CilOpCode {
    /// A single-byte opcode.
    #[must_use]
    pub const fn single(code: u8) -> Self {
        CilOpCode { prefix: 0, code }
    }

    /// A two-byte opcode from the `0xFE` extended set.
    #[must_use]
    pub const fn wide(code: u8) -> Self {
        CilOpCode { prefix: 0xFE, code }
    }

    /// The prefix byte, `0` for single-byte opcodes.
    #[must_use]
    pub const fn prefix(&self) -> u8 {
        self.prefix
    }

    /// The (second) opcode byte.
    #[must_use]
    pub const fn code(&self) -> u8 {
        self.code
    }

    /// Encoded size of the opcode itself, excluding operand bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        if self.prefix == 0 {
            1
        } else {
            2
        }
    }

    /// The static descriptor, or `None` for unassigned byte values.
    #[must_use]
    pub fn descriptor(&self) -> Option<&'static OpDescriptor> {
        macro_rules! d {
            ($m:literal, $operand:ident, $flow:ident) => {
                Some(&OpDescriptor {
                    mnemonic: $m,
                    operand: CilOperandKind::$operand,
                    flow: CilFlow::$flow,
                })
            };
        }

        match (self.prefix, self.code) {
            (0x00, 0x00) => d!("nop", None, Next),
            (0x00, 0x01) => d!("break", None, Break),
            (0x00, 0x02) => d!("ldarg.0", None, Next),
            (0x00, 0x03) => d!("ldarg.1", None, Next),
            (0x00, 0x04) => d!("ldarg.2", None, Next),
            (0x00, 0x05) => d!("ldarg.3", None, Next),
            (0x00, 0x06) => d!("ldloc.0", None, Next),
            (0x00, 0x07) => d!("ldloc.1", None, Next),
            (0x00, 0x08) => d!("ldloc.2", None, Next),
            (0x00, 0x09) => d!("ldloc.3", None, Next),
            (0x00, 0x0A) => d!("stloc.0", None, Next),
            (0x00, 0x0B) => d!("stloc.1", None, Next),
            (0x00, 0x0C) => d!("stloc.2", None, Next),
            (0x00, 0x0D) => d!("stloc.3", None, Next),
            (0x00, 0x0E) => d!("ldarg.s", ShortInlineVar, Next),
            (0x00, 0x0F) => d!("ldarga.s", ShortInlineVar, Next),
            (0x00, 0x10) => d!("starg.s", ShortInlineVar, Next),
            (0x00, 0x11) => d!("ldloc.s", ShortInlineVar, Next),
            (0x00, 0x12) => d!("ldloca.s", ShortInlineVar, Next),
            (0x00, 0x13) => d!("stloc.s", ShortInlineVar, Next),
            (0x00, 0x14) => d!("ldnull", None, Next),
            (0x00, 0x15) => d!("ldc.i4.m1", None, Next),
            (0x00, 0x16) => d!("ldc.i4.0", None, Next),
            (0x00, 0x17) => d!("ldc.i4.1", None, Next),
            (0x00, 0x18) => d!("ldc.i4.2", None, Next),
            (0x00, 0x19) => d!("ldc.i4.3", None, Next),
            (0x00, 0x1A) => d!("ldc.i4.4", None, Next),
            (0x00, 0x1B) => d!("ldc.i4.5", None, Next),
            (0x00, 0x1C) => d!("ldc.i4.6", None, Next),
            (0x00, 0x1D) => d!("ldc.i4.7", None, Next),
            (0x00, 0x1E) => d!("ldc.i4.8", None, Next),
            (0x00, 0x1F) => d!("ldc.i4.s", ShortInlineI, Next),
            (0x00, 0x20) => d!("ldc.i4", InlineI, Next),
            (0x00, 0x21) => d!("ldc.i8", InlineI8, Next),
            (0x00, 0x22) => d!("ldc.r4", ShortInlineR, Next),
            (0x00, 0x23) => d!("ldc.r8", InlineR, Next),
            (0x00, 0x25) => d!("dup", None, Next),
            (0x00, 0x26) => d!("pop", None, Next),
            (0x00, 0x27) => d!("jmp", InlineTok, Call),
            (0x00, 0x28) => d!("call", InlineTok, Call),
            (0x00, 0x29) => d!("calli", InlineTok, Call),
            (0x00, 0x2A) => d!("ret", None, Return),
            (0x00, 0x2B) => d!("br.s", ShortInlineBrTarget, Branch),
            (0x00, 0x2C) => d!("brfalse.s", ShortInlineBrTarget, CondBranch),
            (0x00, 0x2D) => d!("brtrue.s", ShortInlineBrTarget, CondBranch),
            (0x00, 0x2E) => d!("beq.s", ShortInlineBrTarget, CondBranch),
            (0x00, 0x2F) => d!("bge.s", ShortInlineBrTarget, CondBranch),
            (0x00, 0x30) => d!("bgt.s", ShortInlineBrTarget, CondBranch),
            (0x00, 0x31) => d!("ble.s", ShortInlineBrTarget, CondBranch),
            (0x00, 0x32) => d!("blt.s", ShortInlineBrTarget, CondBranch),
            (0x00, 0x33) => d!("bne.un.s", ShortInlineBrTarget, CondBranch),
            (0x00, 0x34) => d!("bge.un.s", ShortInlineBrTarget, CondBranch),
            (0x00, 0x35) => d!("bgt.un.s", ShortInlineBrTarget, CondBranch),
            (0x00, 0x36) => d!("ble.un.s", ShortInlineBrTarget, CondBranch),
            (0x00, 0x37) => d!("blt.un.s", ShortInlineBrTarget, CondBranch),
            (0x00, 0x38) => d!("br", InlineBrTarget, Branch),
            (0x00, 0x39) => d!("brfalse", InlineBrTarget, CondBranch),
            (0x00, 0x3A) => d!("brtrue", InlineBrTarget, CondBranch),
            (0x00, 0x3B) => d!("beq", InlineBrTarget, CondBranch),
            (0x00, 0x3C) => d!("bge", InlineBrTarget, CondBranch),
            (0x00, 0x3D) => d!("bgt", InlineBrTarget, CondBranch),
            (0x00, 0x3E) => d!("ble", InlineBrTarget, CondBranch),
            (0x00, 0x3F) => d!("blt", InlineBrTarget, CondBranch),
            (0x00, 0x40) => d!("bne.un", InlineBrTarget, CondBranch),
            (0x00, 0x41) => d!("bge.un", InlineBrTarget, CondBranch),
            (0x00, 0x42) => d!("bgt.un", InlineBrTarget, CondBranch),
            (0x00, 0x43) => d!("ble.un", InlineBrTarget, CondBranch),
            (0x00, 0x44) => d!("blt.un", InlineBrTarget, CondBranch),
            (0x00, 0x45) => d!("switch", InlineSwitch, CondBranch),
            (0x00, 0x46) => d!("ldind.i1", None, Next),
            (0x00, 0x47) => d!("ldind.u1", None, Next),
            (0x00, 0x48) => d!("ldind.i2", None, Next),
            (0x00, 0x49) => d!("ldind.u2", None, Next),
            (0x00, 0x4A) => d!("ldind.i4", None, Next),
            (0x00, 0x4B) => d!("ldind.u4", None, Next),
            (0x00, 0x4C) => d!("ldind.i8", None, Next),
            (0x00, 0x4D) => d!("ldind.i", None, Next),
            (0x00, 0x4E) => d!("ldind.r4", None, Next),
            (0x00, 0x4F) => d!("ldind.r8", None, Next),
            (0x00, 0x50) => d!("ldind.ref", None, Next),
            (0x00, 0x51) => d!("stind.ref", None, Next),
            (0x00, 0x52) => d!("stind.i1", None, Next),
            (0x00, 0x53) => d!("stind.i2", None, Next),
            (0x00, 0x54) => d!("stind.i4", None, Next),
            (0x00, 0x55) => d!("stind.i8", None, Next),
            (0x00, 0x56) => d!("stind.r4", None, Next),
            (0x00, 0x57) => d!("stind.r8", None, Next),
            (0x00, 0x58) => d!("add", None, Next),
            (0x00, 0x59) => d!("sub", None, Next),
            (0x00, 0x5A) => d!("mul", None, Next),
            (0x00, 0x5B) => d!("div", None, Next),
            (0x00, 0x5C) => d!("div.un", None, Next),
            (0x00, 0x5D) => d!("rem", None, Next),
            (0x00, 0x5E) => d!("rem.un", None, Next),
            (0x00, 0x5F) => d!("and", None, Next),
            (0x00, 0x60) => d!("or", None, Next),
            (0x00, 0x61) => d!("xor", None, Next),
            (0x00, 0x62) => d!("shl", None, Next),
            (0x00, 0x63) => d!("shr", None, Next),
            (0x00, 0x64) => d!("shr.un", None, Next),
            (0x00, 0x65) => d!("neg", None, Next),
            (0x00, 0x66) => d!("not", None, Next),
            (0x00, 0x67) => d!("conv.i1", None, Next),
            (0x00, 0x68) => d!("conv.i2", None, Next),
            (0x00, 0x69) => d!("conv.i4", None, Next),
            (0x00, 0x6A) => d!("conv.i8", None, Next),
            (0x00, 0x6B) => d!("conv.r4", None, Next),
            (0x00, 0x6C) => d!("conv.r8", None, Next),
            (0x00, 0x6D) => d!("conv.u4", None, Next),
            (0x00, 0x6E) => d!("conv.u8", None, Next),
            (0x00, 0x6F) => d!("callvirt", InlineTok, Call),
            (0x00, 0x70) => d!("cpobj", InlineTok, Next),
            (0x00, 0x71) => d!("ldobj", InlineTok, Next),
            (0x00, 0x72) => d!("ldstr", InlineString, Next),
            (0x00, 0x73) => d!("newobj", InlineTok, Call),
            (0x00, 0x74) => d!("castclass", InlineTok, Next),
            (0x00, 0x75) => d!("isinst", InlineTok, Next),
            (0x00, 0x76) => d!("conv.r.un", None, Next),
            (0x00, 0x79) => d!("unbox", InlineTok, Next),
            (0x00, 0x7A) => d!("throw", None, Throw),
            (0x00, 0x7B) => d!("ldfld", InlineTok, Next),
            (0x00, 0x7C) => d!("ldflda", InlineTok, Next),
            (0x00, 0x7D) => d!("stfld", InlineTok, Next),
            (0x00, 0x7E) => d!("ldsfld", InlineTok, Next),
            (0x00, 0x7F) => d!("ldsflda", InlineTok, Next),
            (0x00, 0x80) => d!("stsfld", InlineTok, Next),
            (0x00, 0x81) => d!("stobj", InlineTok, Next),
            (0x00, 0x82) => d!("conv.ovf.i1.un", None, Next),
            (0x00, 0x83) => d!("conv.ovf.i2.un", None, Next),
            (0x00, 0x84) => d!("conv.ovf.i4.un", None, Next),
            (0x00, 0x85) => d!("conv.ovf.i8.un", None, Next),
            (0x00, 0x86) => d!("conv.ovf.u1.un", None, Next),
            (0x00, 0x87) => d!("conv.ovf.u2.un", None, Next),
            (0x00, 0x88) => d!("conv.ovf.u4.un", None, Next),
            (0x00, 0x89) => d!("conv.ovf.u8.un", None, Next),
            (0x00, 0x8A) => d!("conv.ovf.i.un", None, Next),
            (0x00, 0x8B) => d!("conv.ovf.u.un", None, Next),
            (0x00, 0x8C) => d!("box", InlineTok, Next),
            (0x00, 0x8D) => d!("newarr", InlineTok, Next),
            (0x00, 0x8E) => d!("ldlen", None, Next),
            (0x00, 0x8F) => d!("ldelema", InlineTok, Next),
            (0x00, 0x90) => d!("ldelem.i1", None, Next),
            (0x00, 0x91) => d!("ldelem.u1", None, Next),
            (0x00, 0x92) => d!("ldelem.i2", None, Next),
            (0x00, 0x93) => d!("ldelem.u2", None, Next),
            (0x00, 0x94) => d!("ldelem.i4", None, Next),
            (0x00, 0x95) => d!("ldelem.u4", None, Next),
            (0x00, 0x96) => d!("ldelem.i8", None, Next),
            (0x00, 0x97) => d!("ldelem.i", None, Next),
            (0x00, 0x98) => d!("ldelem.r4", None, Next),
            (0x00, 0x99) => d!("ldelem.r8", None, Next),
            (0x00, 0x9A) => d!("ldelem.ref", None, Next),
            (0x00, 0x9B) => d!("stelem.i", None, Next),
            (0x00, 0x9C) => d!("stelem.i1", None, Next),
            (0x00, 0x9D) => d!("stelem.i2", None, Next),
            (0x00, 0x9E) => d!("stelem.i4", None, Next),
            (0x00, 0x9F) => d!("stelem.i8", None, Next),
            (0x00, 0xA0) => d!("stelem.r4", None, Next),
            (0x00, 0xA1) => d!("stelem.r8", None, Next),
            (0x00, 0xA2) => d!("stelem.ref", None, Next),
            (0x00, 0xA3) => d!("ldelem", InlineTok, Next),
            (0x00, 0xA4) => d!("stelem", InlineTok, Next),
            (0x00, 0xA5) => d!("unbox.any", InlineTok, Next),
            (0x00, 0xB3) => d!("conv.ovf.i1", None, Next),
            (0x00, 0xB4) => d!("conv.ovf.u1", None, Next),
            (0x00, 0xB5) => d!("conv.ovf.i2", None, Next),
            (0x00, 0xB6) => d!("conv.ovf.u2", None, Next),
            (0x00, 0xB7) => d!("conv.ovf.i4", None, Next),
            (0x00, 0xB8) => d!("conv.ovf.u4", None, Next),
            (0x00, 0xB9) => d!("conv.ovf.i8", None, Next),
            (0x00, 0xBA) => d!("conv.ovf.u8", None, Next),
            (0x00, 0xC2) => d!("refanyval", InlineTok, Next),
            (0x00, 0xC3) => d!("ckfinite", None, Next),
            (0x00, 0xC6) => d!("mkrefany", InlineTok, Next),
            (0x00, 0xD0) => d!("ldtoken", InlineTok, Next),
            (0x00, 0xD1) => d!("conv.u2", None, Next),
            (0x00, 0xD2) => d!("conv.u1", None, Next),
            (0x00, 0xD3) => d!("conv.i", None, Next),
            (0x00, 0xD4) => d!("conv.ovf.i", None, Next),
            (0x00, 0xD5) => d!("conv.ovf.u", None, Next),
            (0x00, 0xD6) => d!("add.ovf", None, Next),
            (0x00, 0xD7) => d!("add.ovf.un", None, Next),
            (0x00, 0xD8) => d!("mul.ovf", None, Next),
            (0x00, 0xD9) => d!("mul.ovf.un", None, Next),
            (0x00, 0xDA) => d!("sub.ovf", None, Next),
            (0x00, 0xDB) => d!("sub.ovf.un", None, Next),
            (0x00, 0xDC) => d!("endfinally", None, Return),
            (0x00, 0xDD) => d!("leave", InlineBrTarget, Branch),
            (0x00, 0xDE) => d!("leave.s", ShortInlineBrTarget, Branch),
            (0x00, 0xDF) => d!("stind.i", None, Next),
            (0x00, 0xE0) => d!("conv.u", None, Next),
            (0xFE, 0x00) => d!("arglist", None, Next),
            (0xFE, 0x01) => d!("ceq", None, Next),
            (0xFE, 0x02) => d!("cgt", None, Next),
            (0xFE, 0x03) => d!("cgt.un", None, Next),
            (0xFE, 0x04) => d!("clt", None, Next),
            (0xFE, 0x05) => d!("clt.un", None, Next),
            (0xFE, 0x06) => d!("ldftn", InlineTok, Next),
            (0xFE, 0x07) => d!("ldvirtftn", InlineTok, Next),
            (0xFE, 0x09) => d!("ldarg", InlineVar, Next),
            (0xFE, 0x0A) => d!("ldarga", InlineVar, Next),
            (0xFE, 0x0B) => d!("starg", InlineVar, Next),
            (0xFE, 0x0C) => d!("ldloc", InlineVar, Next),
            (0xFE, 0x0D) => d!("ldloca", InlineVar, Next),
            (0xFE, 0x0E) => d!("stloc", InlineVar, Next),
            (0xFE, 0x0F) => d!("localloc", None, Next),
            (0xFE, 0x11) => d!("endfilter", None, Return),
            (0xFE, 0x12) => d!("unaligned.", ShortInlineI, Prefix),
            (0xFE, 0x13) => d!("volatile.", None, Prefix),
            (0xFE, 0x14) => d!("tail.", None, Prefix),
            (0xFE, 0x15) => d!("initobj", InlineTok, Next),
            (0xFE, 0x16) => d!("constrained.", InlineTok, Prefix),
            (0xFE, 0x17) => d!("cpblk", None, Next),
            (0xFE, 0x18) => d!("initblk", None, Next),
            (0xFE, 0x19) => d!("no.", ShortInlineI, Prefix),
            (0xFE, 0x1A) => d!("rethrow", None, Throw),
            (0xFE, 0x1C) => d!("sizeof", InlineTok, Next),
            (0xFE, 0x1D) => d!("refanytype", None, Next),
            (0xFE, 0x1E) => d!("readonly.", None, Prefix),
            _ => None,
        }
    }

    /// The mnemonic, or `"??"` for unassigned byte values.
    #[must_use]
    pub fn mnemonic(&self) -> &'static str {
        self.descriptor().map_or("??", |d| d.mnemonic)
    }

    /// The operand encoding class, [`CilOperandKind::None`] when unassigned.
    #[must_use]
    pub fn operand_kind(&self) -> CilOperandKind {
        self.descriptor()
            .map_or(CilOperandKind::None, |d| d.operand)
    }

    /// The control-flow class, [`CilFlow::Next`] when unassigned.
    #[must_use]
    pub fn flow(&self) -> CilFlow {
        self.descriptor().map_or(CilFlow::Next, |d| d.flow)
    }

    /// True for every load-constant-int32 form
    /// (`ldc.i4`, `ldc.i4.s`, `ldc.i4.m1`, `ldc.i4.0` .. `ldc.i4.8`).
    #[must_use]
    pub const fn is_ldc_i4(&self) -> bool {
        self.prefix == 0 && self.code >= 0x15 && self.code <= 0x20
    }

    /// True for every load-local form (`ldloc`, `ldloc.s`, `ldloc.0` ..
    /// `ldloc.3`). Address-of forms (`ldloca*`) are not included.
    #[must_use]
    pub const fn is_ldloc(&self) -> bool {
        (self.prefix == 0 && ((self.code >= 0x06 && self.code <= 0x09) || self.code == 0x11))
            || (self.prefix == 0xFE && self.code == 0x0C)
    }

    /// True for every store-local form (`stloc`, `stloc.s`, `stloc.0` ..
    /// `stloc.3`).
    #[must_use]
    pub const fn is_stloc(&self) -> bool {
        (self.prefix == 0 && ((self.code >= 0x0A && self.code <= 0x0D) || self.code == 0x13))
            || (self.prefix == 0xFE && self.code == 0x0E)
    }

    /// True when the instruction carries a branch displacement operand.
    #[must_use]
    pub fn is_branch(&self) -> bool {
        matches!(
            self.operand_kind(),
            CilOperandKind::InlineBrTarget
                | CilOperandKind::ShortInlineBrTarget
                | CilOperandKind::InlineSwitch
        )
    }
}

impl fmt::Debug for CilOpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.prefix == 0 {
            write!(f, "CilOpCode({}, 0x{:02x})", self.mnemonic(), self.code)
        } else {
            write!(
                f,
                "CilOpCode({}, 0xfe 0x{:02x})",
                self.mnemonic(),
                self.code
            )
        }
    }
}

impl fmt::Display for CilOpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Named constants for the complete opcode set.
#[allow(missing_docs)]
pub mod ops {
    use super::CilOpCode;

    macro_rules! single {
        ($($name:ident = $code:literal;)+) => {
            $(pub const $name: CilOpCode = CilOpCode::single($code);)+
        };
    }

    macro_rules! wide {
        ($($name:ident = $code:literal;)+) => {
            $(pub const $name: CilOpCode = CilOpCode::wide($code);)+
        };
    }

    single! {
        NOP = 0x00;
        BREAK = 0x01;
        LDARG_0 = 0x02;
        LDARG_1 = 0x03;
        LDARG_2 = 0x04;
        LDARG_3 = 0x05;
        LDLOC_0 = 0x06;
        LDLOC_1 = 0x07;
        LDLOC_2 = 0x08;
        LDLOC_3 = 0x09;
        STLOC_0 = 0x0A;
        STLOC_1 = 0x0B;
        STLOC_2 = 0x0C;
        STLOC_3 = 0x0D;
        LDARG_S = 0x0E;
        LDARGA_S = 0x0F;
        STARG_S = 0x10;
        LDLOC_S = 0x11;
        LDLOCA_S = 0x12;
        STLOC_S = 0x13;
        LDNULL = 0x14;
        LDC_I4_M1 = 0x15;
        LDC_I4_0 = 0x16;
        LDC_I4_1 = 0x17;
        LDC_I4_2 = 0x18;
        LDC_I4_3 = 0x19;
        LDC_I4_4 = 0x1A;
        LDC_I4_5 = 0x1B;
        LDC_I4_6 = 0x1C;
        LDC_I4_7 = 0x1D;
        LDC_I4_8 = 0x1E;
        LDC_I4_S = 0x1F;
        LDC_I4 = 0x20;
        LDC_I8 = 0x21;
        LDC_R4 = 0x22;
        LDC_R8 = 0x23;
        DUP = 0x25;
        POP = 0x26;
        JMP = 0x27;
        CALL = 0x28;
        CALLI = 0x29;
        RET = 0x2A;
        BR_S = 0x2B;
        BRFALSE_S = 0x2C;
        BRTRUE_S = 0x2D;
        BEQ_S = 0x2E;
        BGE_S = 0x2F;
        BGT_S = 0x30;
        BLE_S = 0x31;
        BLT_S = 0x32;
        BNE_UN_S = 0x33;
        BGE_UN_S = 0x34;
        BGT_UN_S = 0x35;
        BLE_UN_S = 0x36;
        BLT_UN_S = 0x37;
        BR = 0x38;
        BRFALSE = 0x39;
        BRTRUE = 0x3A;
        BEQ = 0x3B;
        BGE = 0x3C;
        BGT = 0x3D;
        BLE = 0x3E;
        BLT = 0x3F;
        BNE_UN = 0x40;
        BGE_UN = 0x41;
        BGT_UN = 0x42;
        BLE_UN = 0x43;
        BLT_UN = 0x44;
        SWITCH = 0x45;
        LDIND_I1 = 0x46;
        LDIND_U1 = 0x47;
        LDIND_I2 = 0x48;
        LDIND_U2 = 0x49;
        LDIND_I4 = 0x4A;
        LDIND_U4 = 0x4B;
        LDIND_I8 = 0x4C;
        LDIND_I = 0x4D;
        LDIND_R4 = 0x4E;
        LDIND_R8 = 0x4F;
        LDIND_REF = 0x50;
        STIND_REF = 0x51;
        STIND_I1 = 0x52;
        STIND_I2 = 0x53;
        STIND_I4 = 0x54;
        STIND_I8 = 0x55;
        STIND_R4 = 0x56;
        STIND_R8 = 0x57;
        ADD = 0x58;
        SUB = 0x59;
        MUL = 0x5A;
        DIV = 0x5B;
        DIV_UN = 0x5C;
        REM = 0x5D;
        REM_UN = 0x5E;
        AND = 0x5F;
        OR = 0x60;
        XOR = 0x61;
        SHL = 0x62;
        SHR = 0x63;
        SHR_UN = 0x64;
        NEG = 0x65;
        NOT = 0x66;
        CONV_I1 = 0x67;
        CONV_I2 = 0x68;
        CONV_I4 = 0x69;
        CONV_I8 = 0x6A;
        CONV_R4 = 0x6B;
        CONV_R8 = 0x6C;
        CONV_U4 = 0x6D;
        CONV_U8 = 0x6E;
        CALLVIRT = 0x6F;
        CPOBJ = 0x70;
        LDOBJ = 0x71;
        LDSTR = 0x72;
        NEWOBJ = 0x73;
        CASTCLASS = 0x74;
        ISINST = 0x75;
        CONV_R_UN = 0x76;
        UNBOX = 0x79;
        THROW = 0x7A;
        LDFLD = 0x7B;
        LDFLDA = 0x7C;
        STFLD = 0x7D;
        LDSFLD = 0x7E;
        LDSFLDA = 0x7F;
        STSFLD = 0x80;
        STOBJ = 0x81;
        CONV_OVF_I1_UN = 0x82;
        CONV_OVF_I2_UN = 0x83;
        CONV_OVF_I4_UN = 0x84;
        CONV_OVF_I8_UN = 0x85;
        CONV_OVF_U1_UN = 0x86;
        CONV_OVF_U2_UN = 0x87;
        CONV_OVF_U4_UN = 0x88;
        CONV_OVF_U8_UN = 0x89;
        CONV_OVF_I_UN = 0x8A;
        CONV_OVF_U_UN = 0x8B;
        BOX = 0x8C;
        NEWARR = 0x8D;
        LDLEN = 0x8E;
        LDELEMA = 0x8F;
        LDELEM_I1 = 0x90;
        LDELEM_U1 = 0x91;
        LDELEM_I2 = 0x92;
        LDELEM_U2 = 0x93;
        LDELEM_I4 = 0x94;
        LDELEM_U4 = 0x95;
        LDELEM_I8 = 0x96;
        LDELEM_I = 0x97;
        LDELEM_R4 = 0x98;
        LDELEM_R8 = 0x99;
        LDELEM_REF = 0x9A;
        STELEM_I = 0x9B;
        STELEM_I1 = 0x9C;
        STELEM_I2 = 0x9D;
        STELEM_I4 = 0x9E;
        STELEM_I8 = 0x9F;
        STELEM_R4 = 0xA0;
        STELEM_R8 = 0xA1;
        STELEM_REF = 0xA2;
        LDELEM = 0xA3;
        STELEM = 0xA4;
        UNBOX_ANY = 0xA5;
        CONV_OVF_I1 = 0xB3;
        CONV_OVF_U1 = 0xB4;
        CONV_OVF_I2 = 0xB5;
        CONV_OVF_U2 = 0xB6;
        CONV_OVF_I4 = 0xB7;
        CONV_OVF_U4 = 0xB8;
        CONV_OVF_I8 = 0xB9;
        CONV_OVF_U8 = 0xBA;
        REFANYVAL = 0xC2;
        CKFINITE = 0xC3;
        MKREFANY = 0xC6;
        LDTOKEN = 0xD0;
        CONV_U2 = 0xD1;
        CONV_U1 = 0xD2;
        CONV_I = 0xD3;
        CONV_OVF_I = 0xD4;
        CONV_OVF_U = 0xD5;
        ADD_OVF = 0xD6;
        ADD_OVF_UN = 0xD7;
        MUL_OVF = 0xD8;
        MUL_OVF_UN = 0xD9;
        SUB_OVF = 0xDA;
        SUB_OVF_UN = 0xDB;
        ENDFINALLY = 0xDC;
        LEAVE = 0xDD;
        LEAVE_S = 0xDE;
        STIND_I = 0xDF;
        CONV_U = 0xE0;
    }

    wide! {
        ARGLIST = 0x00;
        CEQ = 0x01;
        CGT = 0x02;
        CGT_UN = 0x03;
        CLT = 0x04;
        CLT_UN = 0x05;
        LDFTN = 0x06;
        LDVIRTFTN = 0x07;
        LDARG = 0x09;
        LDARGA = 0x0A;
        STARG = 0x0B;
        LDLOC = 0x0C;
        LDLOCA = 0x0D;
        STLOC = 0x0E;
        LOCALLOC = 0x0F;
        ENDFILTER = 0x11;
        UNALIGNED = 0x12;
        VOLATILE = 0x13;
        TAIL = 0x14;
        INITOBJ = 0x15;
        CONSTRAINED = 0x16;
        CPBLK = 0x17;
        INITBLK = 0x18;
        NO = 0x19;
        RETHROW = 0x1A;
        SIZEOF = 0x1C;
        REFANYTYPE = 0x1D;
        READONLY = 0x1E;
    }
}
