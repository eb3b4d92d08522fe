//! The built-in pattern catalog.
//!
//! One entry per handler kind the protector's interpreter emits. The shapes
//! follow the interpreter's calling convention as observed across identified
//! builds:
//!
//! - `ldarg.0` is the VM instance; handlers pop operands with
//!   `callvirt VM::PopStack` and push results with `callvirt VM::PushStack`.
//! - `ldarg.1` is the current instruction's operand object.
//! - Computation happens on unwrapped values, so the distinguishing CIL
//!   opcode (`add`, `ceq`, `conv.i1`, ...) appears literally in the handler
//!   body. Families that share a body shape are told apart by their
//!   verifier: a BCL member name, the element type behind a `ldtoken`, or
//!   the shape of a called helper.
//!
//! Entry order matters: identification takes the first accepted pattern, so
//! anchored (entire-body) shapes come before the windowed special entries.
//! Patterns are never consumed; the parameterized families identify one
//! opcode per element type from a single shape.

use crate::{
    cil::ops::*,
    matcher::pattern::{Interchange, OpcodePattern, PatternTarget, Verifier},
    vm::opcode::SpecialOpcode,
};

/// Locals-only interchange: handlers differ between builds mainly in local
/// slot allocation.
const LOCALS: Interchange = Interchange::LDLOC.union(Interchange::STLOC);

/// Canonical body of the shared `ldelem` helper the `ldelem.*` handlers call:
/// pop index, pop array, `Array::GetValue`, push.
static LDELEM_INNER: &[crate::cil::CilOpCode] = &[
    LDARG_0, CALLVIRT, CALLVIRT, STLOC_0, LDARG_0, CALLVIRT, CASTCLASS, STLOC_1, LDARG_0, LDLOC_1,
    LDLOC_0, CALLVIRT, CALLVIRT, RET,
];

/// Canonical body of the shared `stelem` helper: pop value, pop index, pop
/// array, `Array::SetValue`.
static STELEM_INNER: &[crate::cil::CilOpCode] = &[
    LDARG_0, CALLVIRT, STLOC_0, LDARG_0, CALLVIRT, CALLVIRT, STLOC_1, LDARG_0, CALLVIRT, CASTCLASS,
    STLOC_2, LDLOC_2, LDLOC_0, LDLOC_1, CALLVIRT, RET,
];

/// Two-operand compute-and-push handlers: pop rhs, pop lhs, apply the
/// distinguishing opcode, wrap, push.
macro_rules! binary_op {
    ($name:literal, $op:expr) => {
        OpcodePattern {
            name: $name,
            prototype: &[
                LDARG_0, CALLVIRT, STLOC_0, LDARG_0, CALLVIRT, STLOC_1, LDARG_0, LDLOC_1, CALLVIRT,
                LDLOC_0, CALLVIRT, $op, NEWOBJ, CALLVIRT, RET,
            ],
            match_entire_body: true,
            interchange: LOCALS,
            target: PatternTarget::Cil($op),
            verifier: Verifier::None,
        }
    };
}

/// One-operand compute-and-push handlers (negation, conversions).
macro_rules! unary_op {
    ($name:literal, $op:expr) => {
        OpcodePattern {
            name: $name,
            prototype: &[
                LDARG_0, CALLVIRT, STLOC_0, LDARG_0, LDLOC_0, CALLVIRT, $op, NEWOBJ, CALLVIRT, RET,
            ],
            match_entire_body: true,
            interchange: LOCALS,
            target: PatternTarget::Cil($op),
            verifier: Verifier::None,
        }
    };
}

/// Compare-and-jump handlers: pop two, compare with `$cmp`, then either skip
/// the jump (`brfalse.s`) or skip it on success for the negated forms
/// (`brtrue.s`).
macro_rules! cond_branch {
    ($name:literal, $cmp:expr, $skip:expr => $target:expr) => {
        OpcodePattern {
            name: $name,
            prototype: &[
                LDARG_0, CALLVIRT, STLOC_0, LDARG_0, CALLVIRT, STLOC_1, LDLOC_1, CALLVIRT, LDLOC_0,
                CALLVIRT, $cmp, $skip, LDARG_0, LDARG_1, CALLVIRT, CALLVIRT, RET, RET,
            ],
            match_entire_body: true,
            interchange: LOCALS,
            target: PatternTarget::Cil($target),
            verifier: Verifier::None,
        }
    };
}

/// Operand-constant loaders share one shape; the `System.Convert` call names
/// the width.
macro_rules! ldc_op {
    ($name:literal, $convert:literal => $target:expr) => {
        OpcodePattern {
            name: $name,
            prototype: &[LDARG_0, LDARG_1, CALLVIRT, CALL, NEWOBJ, CALLVIRT, RET],
            match_entire_body: true,
            interchange: Interchange::empty(),
            target: PatternTarget::Cil($target),
            verifier: Verifier::CalleeFullName {
                slot: 3,
                full_name: $convert,
            },
        }
    };
}

/// The `ldelem.*` family: `ldtoken <element type>; GetTypeFromHandle;` then a
/// call into the shared helper whose body must match [`LDELEM_INNER`].
macro_rules! ldelem_op {
    ($name:literal, $element:literal => $target:expr) => {
        OpcodePattern {
            name: $name,
            prototype: &[LDARG_0, LDTOKEN, CALL, CALLVIRT, RET],
            match_entire_body: true,
            interchange: Interchange::empty(),
            target: PatternTarget::Cil($target),
            verifier: Verifier::All(&[
                Verifier::CalleeFullName {
                    slot: 2,
                    full_name: "System.Type::GetTypeFromHandle",
                },
                Verifier::TokenTypeName {
                    slot: 1,
                    full_name: $element,
                },
                Verifier::SubPattern {
                    slot: 3,
                    prototype: LDELEM_INNER,
                    interchange: LOCALS,
                },
            ]),
        }
    };
}

/// The `stelem.*` family: same outer shape as `ldelem.*`, told apart by the
/// called helper matching [`STELEM_INNER`] instead.
macro_rules! stelem_op {
    ($name:literal, $element:literal => $target:expr) => {
        OpcodePattern {
            name: $name,
            prototype: &[LDARG_0, LDTOKEN, CALL, CALLVIRT, RET],
            match_entire_body: true,
            interchange: Interchange::empty(),
            target: PatternTarget::Cil($target),
            verifier: Verifier::All(&[
                Verifier::CalleeFullName {
                    slot: 2,
                    full_name: "System.Type::GetTypeFromHandle",
                },
                Verifier::TokenTypeName {
                    slot: 1,
                    full_name: $element,
                },
                Verifier::SubPattern {
                    slot: 3,
                    prototype: STELEM_INNER,
                    interchange: LOCALS,
                },
            ]),
        }
    };
}

/// Load-indirect handlers: pop address, dereference, convert to the target
/// width through `System.Convert`, wrap, push.
macro_rules! ldind_op {
    ($name:literal, $convert:literal => $target:expr) => {
        OpcodePattern {
            name: $name,
            prototype: &[
                LDARG_0, CALLVIRT, STLOC_0, LDARG_0, LDLOC_0, CALLVIRT, CALLVIRT, CALL, NEWOBJ,
                CALLVIRT, RET,
            ],
            match_entire_body: true,
            interchange: LOCALS,
            target: PatternTarget::Cil($target),
            verifier: Verifier::CalleeFullName {
                slot: 7,
                full_name: $convert,
            },
        }
    };
}

/// Store-indirect handlers: pop value, pop address, narrow with the
/// distinguishing conversion, write through.
macro_rules! stind_op {
    ($name:literal, $conv:expr => $target:expr) => {
        OpcodePattern {
            name: $name,
            prototype: &[
                LDARG_0, CALLVIRT, STLOC_0, LDARG_0, CALLVIRT, STLOC_1, LDLOC_1, CALLVIRT, LDLOC_0,
                CALLVIRT, $conv, CALLVIRT, RET,
            ],
            match_entire_body: true,
            interchange: LOCALS,
            target: PatternTarget::Cil($target),
            verifier: Verifier::None,
        }
    };
}

/// The built-in catalog, tried in order.
pub static CATALOG: &[OpcodePattern] = &[
    // ── Arithmetic / logic / shifts ─────────────────────────────────────
    binary_op!("add", ADD),
    binary_op!("sub", SUB),
    binary_op!("mul", MUL),
    binary_op!("div", DIV),
    binary_op!("div.un", DIV_UN),
    binary_op!("rem", REM),
    binary_op!("rem.un", REM_UN),
    binary_op!("and", AND),
    binary_op!("or", OR),
    binary_op!("xor", XOR),
    binary_op!("shl", SHL),
    binary_op!("shr", SHR),
    binary_op!("shr.un", SHR_UN),
    binary_op!("add.ovf", ADD_OVF),
    binary_op!("add.ovf.un", ADD_OVF_UN),
    binary_op!("sub.ovf", SUB_OVF),
    binary_op!("sub.ovf.un", SUB_OVF_UN),
    binary_op!("mul.ovf", MUL_OVF),
    binary_op!("mul.ovf.un", MUL_OVF_UN),
    // ── Comparisons pushing a result ────────────────────────────────────
    binary_op!("ceq", CEQ),
    binary_op!("cgt", CGT),
    binary_op!("cgt.un", CGT_UN),
    binary_op!("clt", CLT),
    binary_op!("clt.un", CLT_UN),
    // ── Unary and conversions ───────────────────────────────────────────
    unary_op!("neg", NEG),
    unary_op!("not", NOT),
    unary_op!("conv.i1", CONV_I1),
    unary_op!("conv.i2", CONV_I2),
    unary_op!("conv.i4", CONV_I4),
    unary_op!("conv.i8", CONV_I8),
    unary_op!("conv.r4", CONV_R4),
    unary_op!("conv.r8", CONV_R8),
    unary_op!("conv.u1", CONV_U1),
    unary_op!("conv.u2", CONV_U2),
    unary_op!("conv.u4", CONV_U4),
    unary_op!("conv.u8", CONV_U8),
    unary_op!("conv.i", CONV_I),
    unary_op!("conv.u", CONV_U),
    unary_op!("conv.r.un", CONV_R_UN),
    unary_op!("conv.ovf.i1", CONV_OVF_I1),
    unary_op!("conv.ovf.i2", CONV_OVF_I2),
    unary_op!("conv.ovf.i4", CONV_OVF_I4),
    unary_op!("conv.ovf.i8", CONV_OVF_I8),
    unary_op!("conv.ovf.u1", CONV_OVF_U1),
    unary_op!("conv.ovf.u2", CONV_OVF_U2),
    unary_op!("conv.ovf.u4", CONV_OVF_U4),
    unary_op!("conv.ovf.u8", CONV_OVF_U8),
    unary_op!("conv.ovf.i", CONV_OVF_I),
    unary_op!("conv.ovf.u", CONV_OVF_U),
    unary_op!("conv.ovf.i1.un", CONV_OVF_I1_UN),
    unary_op!("conv.ovf.i2.un", CONV_OVF_I2_UN),
    unary_op!("conv.ovf.i4.un", CONV_OVF_I4_UN),
    unary_op!("conv.ovf.i8.un", CONV_OVF_I8_UN),
    unary_op!("conv.ovf.u1.un", CONV_OVF_U1_UN),
    unary_op!("conv.ovf.u2.un", CONV_OVF_U2_UN),
    unary_op!("conv.ovf.u4.un", CONV_OVF_U4_UN),
    unary_op!("conv.ovf.u8.un", CONV_OVF_U8_UN),
    unary_op!("conv.ovf.i.un", CONV_OVF_I_UN),
    unary_op!("conv.ovf.u.un", CONV_OVF_U_UN),
    unary_op!("ckfinite", CKFINITE),
    // ── Constants ───────────────────────────────────────────────────────
    ldc_op!("ldc.i4", "System.Convert::ToInt32" => LDC_I4),
    ldc_op!("ldc.i8", "System.Convert::ToInt64" => LDC_I8),
    ldc_op!("ldc.r4", "System.Convert::ToSingle" => LDC_R4),
    ldc_op!("ldc.r8", "System.Convert::ToDouble" => LDC_R8),
    OpcodePattern {
        name: "ldstr",
        prototype: &[LDARG_0, LDARG_1, CALLVIRT, CASTCLASS, NEWOBJ, CALLVIRT, RET],
        match_entire_body: true,
        interchange: Interchange::empty(),
        target: PatternTarget::Cil(LDSTR),
        verifier: Verifier::TokenTypeName {
            slot: 3,
            full_name: "System.String",
        },
    },
    OpcodePattern {
        name: "ldtoken",
        prototype: &[LDARG_0, LDARG_1, CALLVIRT, STLOC_0, LDARG_0, LDLOC_0, NEWOBJ, CALLVIRT, RET],
        match_entire_body: true,
        interchange: LOCALS,
        target: PatternTarget::Cil(LDTOKEN),
        verifier: Verifier::None,
    },
    OpcodePattern {
        name: "ldnull",
        prototype: &[LDARG_0, NEWOBJ, CALLVIRT, RET],
        match_entire_body: true,
        interchange: Interchange::empty(),
        target: PatternTarget::Cil(LDNULL),
        verifier: Verifier::None,
    },
    // ── Stack shuffling ─────────────────────────────────────────────────
    OpcodePattern {
        name: "dup",
        prototype: &[
            LDARG_0, CALLVIRT, STLOC_0, LDARG_0, LDLOC_0, CALLVIRT, LDARG_0, LDLOC_0, CALLVIRT, RET,
        ],
        match_entire_body: true,
        interchange: LOCALS,
        target: PatternTarget::Cil(DUP),
        verifier: Verifier::None,
    },
    OpcodePattern {
        name: "pop",
        prototype: &[LDARG_0, CALLVIRT, POP, RET],
        match_entire_body: true,
        interchange: Interchange::empty(),
        target: PatternTarget::Cil(POP),
        verifier: Verifier::None,
    },
    // ── Locals and arguments ────────────────────────────────────────────
    OpcodePattern {
        name: "ldloc",
        prototype: &[LDARG_0, LDARG_0, LDFLD, LDARG_1, CALLVIRT, LDELEM_REF, CALLVIRT, RET],
        match_entire_body: true,
        interchange: Interchange::empty(),
        target: PatternTarget::Cil(LDLOC),
        verifier: Verifier::None,
    },
    OpcodePattern {
        name: "stloc",
        prototype: &[LDARG_0, LDFLD, LDARG_1, CALLVIRT, LDARG_0, CALLVIRT, STELEM_REF, RET],
        match_entire_body: true,
        interchange: Interchange::empty(),
        target: PatternTarget::Cil(STLOC),
        verifier: Verifier::None,
    },
    OpcodePattern {
        name: "ldloca",
        prototype: &[LDARG_0, LDARG_0, LDFLD, LDARG_1, CALLVIRT, NEWOBJ, CALLVIRT, RET],
        match_entire_body: true,
        interchange: Interchange::empty(),
        target: PatternTarget::Cil(LDLOCA),
        verifier: Verifier::None,
    },
    OpcodePattern {
        name: "ldarg",
        prototype: &[LDARG_0, LDARG_0, LDFLD, LDARG_1, CALLVIRT, CALLVIRT, CALLVIRT, RET],
        match_entire_body: true,
        interchange: Interchange::empty(),
        target: PatternTarget::Cil(LDARG),
        verifier: Verifier::CalleeFullName {
            slot: 5,
            full_name: "System.Collections.Generic.List`1::get_Item",
        },
    },
    OpcodePattern {
        name: "ldarga",
        prototype: &[LDARG_0, LDARG_0, LDFLD, LDARG_1, CALLVIRT, CALLVIRT, NEWOBJ, CALLVIRT, RET],
        match_entire_body: true,
        interchange: Interchange::empty(),
        target: PatternTarget::Cil(LDARGA),
        verifier: Verifier::None,
    },
    OpcodePattern {
        name: "starg",
        prototype: &[LDARG_0, LDFLD, LDARG_1, CALLVIRT, LDARG_0, CALLVIRT, CALLVIRT, RET],
        match_entire_body: true,
        interchange: Interchange::empty(),
        target: PatternTarget::Cil(STARG),
        verifier: Verifier::None,
    },
    // ── Unconditional control flow ──────────────────────────────────────
    OpcodePattern {
        name: "br",
        prototype: &[LDARG_0, LDARG_1, CALLVIRT, CALLVIRT, RET],
        match_entire_body: true,
        interchange: Interchange::empty(),
        target: PatternTarget::Cil(BR),
        verifier: Verifier::None,
    },
    OpcodePattern {
        name: "leave",
        prototype: &[LDARG_0, CALLVIRT, LDARG_0, LDARG_1, CALLVIRT, CALLVIRT, RET],
        match_entire_body: true,
        interchange: Interchange::empty(),
        target: PatternTarget::Cil(LEAVE),
        verifier: Verifier::None,
    },
    OpcodePattern {
        name: "endfinally",
        prototype: &[LDARG_0, LDC_I4_0, STFLD, LDARG_0, CALLVIRT, RET],
        match_entire_body: true,
        interchange: Interchange::empty(),
        target: PatternTarget::Cil(ENDFINALLY),
        verifier: Verifier::None,
    },
    OpcodePattern {
        name: "ret",
        prototype: &[LDARG_0, LDC_I4_1, STFLD, RET],
        match_entire_body: true,
        interchange: Interchange::empty(),
        target: PatternTarget::Cil(RET),
        verifier: Verifier::None,
    },
    // ── Conditional control flow ────────────────────────────────────────
    OpcodePattern {
        name: "brtrue",
        prototype: &[
            LDARG_0, CALLVIRT, CALLVIRT, BRFALSE_S, LDARG_0, LDARG_1, CALLVIRT, CALLVIRT, RET, RET,
        ],
        match_entire_body: true,
        interchange: Interchange::empty(),
        target: PatternTarget::Cil(BRTRUE),
        verifier: Verifier::None,
    },
    OpcodePattern {
        name: "brfalse",
        prototype: &[
            LDARG_0, CALLVIRT, CALLVIRT, BRTRUE_S, LDARG_0, LDARG_1, CALLVIRT, CALLVIRT, RET, RET,
        ],
        match_entire_body: true,
        interchange: Interchange::empty(),
        target: PatternTarget::Cil(BRFALSE),
        verifier: Verifier::None,
    },
    cond_branch!("beq", CEQ, BRFALSE_S => BEQ),
    cond_branch!("bne.un", CEQ, BRTRUE_S => BNE_UN),
    cond_branch!("blt", CLT, BRFALSE_S => BLT),
    cond_branch!("bge", CLT, BRTRUE_S => BGE),
    cond_branch!("bgt", CGT, BRFALSE_S => BGT),
    cond_branch!("ble", CGT, BRTRUE_S => BLE),
    cond_branch!("blt.un", CLT_UN, BRFALSE_S => BLT_UN),
    cond_branch!("bge.un", CLT_UN, BRTRUE_S => BGE_UN),
    cond_branch!("bgt.un", CGT_UN, BRFALSE_S => BGT_UN),
    cond_branch!("ble.un", CGT_UN, BRTRUE_S => BLE_UN),
    OpcodePattern {
        name: "switch",
        prototype: &[
            LDARG_0, CALLVIRT, CALLVIRT, STLOC_0, LDARG_0, LDARG_1, CASTCLASS, CALLVIRT, LDLOC_0,
            CALLVIRT, RET,
        ],
        match_entire_body: true,
        interchange: LOCALS,
        target: PatternTarget::Cil(SWITCH),
        verifier: Verifier::None,
    },
    // ── Fields ──────────────────────────────────────────────────────────
    OpcodePattern {
        name: "ldfld",
        prototype: &[
            LDARG_0, CALLVIRT, STLOC_0, LDARG_0, LDARG_1, CALLVIRT, LDLOC_0, CALLVIRT, CALLVIRT,
            RET,
        ],
        match_entire_body: true,
        interchange: LOCALS,
        target: PatternTarget::Cil(LDFLD),
        verifier: Verifier::None,
    },
    OpcodePattern {
        name: "ldflda",
        prototype: &[
            LDARG_0, CALLVIRT, STLOC_0, LDARG_0, LDARG_1, CALLVIRT, LDLOC_0, NEWOBJ, CALLVIRT, RET,
        ],
        match_entire_body: true,
        interchange: LOCALS,
        target: PatternTarget::Cil(LDFLDA),
        verifier: Verifier::None,
    },
    OpcodePattern {
        name: "stfld",
        prototype: &[
            LDARG_0, CALLVIRT, STLOC_0, LDARG_0, CALLVIRT, STLOC_1, LDARG_0, LDARG_1, CALLVIRT,
            LDLOC_1, LDLOC_0, CALLVIRT, RET,
        ],
        match_entire_body: true,
        interchange: LOCALS,
        target: PatternTarget::Cil(STFLD),
        verifier: Verifier::None,
    },
    OpcodePattern {
        name: "ldsfld",
        prototype: &[LDARG_0, LDARG_1, CALLVIRT, CALLVIRT, NEWOBJ, CALLVIRT, RET],
        match_entire_body: true,
        interchange: Interchange::empty(),
        target: PatternTarget::Cil(LDSFLD),
        verifier: Verifier::None,
    },
    OpcodePattern {
        name: "ldsflda",
        prototype: &[LDARG_0, LDARG_1, CALLVIRT, CALLVIRT, NEWOBJ, NEWOBJ, CALLVIRT, RET],
        match_entire_body: true,
        interchange: Interchange::empty(),
        target: PatternTarget::Cil(LDSFLDA),
        verifier: Verifier::None,
    },
    OpcodePattern {
        name: "stsfld",
        prototype: &[LDARG_0, CALLVIRT, STLOC_0, LDARG_0, LDARG_1, CALLVIRT, LDLOC_0, CALLVIRT, RET],
        match_entire_body: true,
        interchange: LOCALS,
        target: PatternTarget::Cil(STSFLD),
        verifier: Verifier::None,
    },
    // ── Object model ────────────────────────────────────────────────────
    OpcodePattern {
        name: "call",
        prototype: &[LDARG_0, LDARG_1, CALLVIRT, STLOC_0, LDARG_0, LDLOC_0, LDC_I4_0, CALLVIRT, RET],
        match_entire_body: true,
        interchange: LOCALS,
        target: PatternTarget::Cil(CALL),
        verifier: Verifier::None,
    },
    OpcodePattern {
        name: "callvirt",
        prototype: &[LDARG_0, LDARG_1, CALLVIRT, STLOC_0, LDARG_0, LDLOC_0, LDC_I4_1, CALLVIRT, RET],
        match_entire_body: true,
        interchange: LOCALS,
        target: PatternTarget::Cil(CALLVIRT),
        verifier: Verifier::None,
    },
    OpcodePattern {
        name: "newobj",
        prototype: &[LDARG_0, LDARG_1, CALLVIRT, STLOC_0, LDARG_0, LDLOC_0, CALLVIRT, CALLVIRT, RET],
        match_entire_body: true,
        interchange: LOCALS,
        target: PatternTarget::Cil(NEWOBJ),
        verifier: Verifier::None,
    },
    OpcodePattern {
        name: "castclass",
        prototype: &[LDARG_0, CALLVIRT, LDARG_0, LDARG_1, CALLVIRT, CALLVIRT, CALLVIRT, RET],
        match_entire_body: true,
        interchange: Interchange::empty(),
        target: PatternTarget::Cil(CASTCLASS),
        verifier: Verifier::None,
    },
    OpcodePattern {
        name: "isinst",
        prototype: &[LDARG_0, CALLVIRT, LDARG_0, LDARG_1, CALLVIRT, CALLVIRT, NEWOBJ, CALLVIRT, RET],
        match_entire_body: true,
        interchange: Interchange::empty(),
        target: PatternTarget::Cil(ISINST),
        verifier: Verifier::None,
    },
    OpcodePattern {
        name: "box",
        prototype: &[LDARG_0, CALLVIRT, LDARG_0, LDARG_1, CALLVIRT, CALL, CALLVIRT, RET],
        match_entire_body: true,
        interchange: Interchange::empty(),
        target: PatternTarget::Cil(BOX),
        verifier: Verifier::None,
    },
    OpcodePattern {
        name: "unbox.any",
        prototype: &[LDARG_0, CALLVIRT, LDARG_0, LDARG_1, CALLVIRT, CALL, NEWOBJ, CALLVIRT, RET],
        match_entire_body: true,
        interchange: Interchange::empty(),
        target: PatternTarget::Cil(UNBOX_ANY),
        verifier: Verifier::None,
    },
    OpcodePattern {
        name: "newarr",
        prototype: &[LDARG_0, CALLVIRT, CALLVIRT, LDARG_0, LDARG_1, CALLVIRT, CALL, CALLVIRT, RET],
        match_entire_body: true,
        interchange: Interchange::empty(),
        target: PatternTarget::Cil(NEWARR),
        verifier: Verifier::CalleeFullName {
            slot: 6,
            full_name: "System.Array::CreateInstance",
        },
    },
    OpcodePattern {
        name: "ldlen",
        prototype: &[
            LDARG_0, CALLVIRT, CALLVIRT, CASTCLASS, STLOC_0, LDARG_0, LDLOC_0, CALLVIRT, NEWOBJ,
            CALLVIRT, RET,
        ],
        match_entire_body: true,
        interchange: LOCALS,
        target: PatternTarget::Cil(LDLEN),
        verifier: Verifier::CalleeFullName {
            slot: 7,
            full_name: "System.Array::get_Length",
        },
    },
    OpcodePattern {
        name: "throw",
        prototype: &[LDARG_0, CALLVIRT, CALLVIRT, CASTCLASS, THROW],
        match_entire_body: true,
        interchange: Interchange::empty(),
        target: PatternTarget::Cil(THROW),
        verifier: Verifier::TokenTypeName {
            slot: 3,
            full_name: "System.Exception",
        },
    },
    OpcodePattern {
        name: "rethrow",
        prototype: &[LDARG_0, LDFLD, THROW],
        match_entire_body: true,
        interchange: Interchange::empty(),
        target: PatternTarget::Cil(RETHROW),
        verifier: Verifier::None,
    },
    // ── Arrays by element type ──────────────────────────────────────────
    ldelem_op!("ldelem.i1", "System.SByte" => LDELEM_I1),
    ldelem_op!("ldelem.u1", "System.Byte" => LDELEM_U1),
    ldelem_op!("ldelem.i2", "System.Int16" => LDELEM_I2),
    ldelem_op!("ldelem.u2", "System.UInt16" => LDELEM_U2),
    ldelem_op!("ldelem.i4", "System.Int32" => LDELEM_I4),
    ldelem_op!("ldelem.u4", "System.UInt32" => LDELEM_U4),
    ldelem_op!("ldelem.i8", "System.Int64" => LDELEM_I8),
    ldelem_op!("ldelem.i", "System.IntPtr" => LDELEM_I),
    ldelem_op!("ldelem.r4", "System.Single" => LDELEM_R4),
    ldelem_op!("ldelem.r8", "System.Double" => LDELEM_R8),
    ldelem_op!("ldelem.ref", "System.Object" => LDELEM_REF),
    stelem_op!("stelem.i", "System.IntPtr" => STELEM_I),
    stelem_op!("stelem.i1", "System.SByte" => STELEM_I1),
    stelem_op!("stelem.i2", "System.Int16" => STELEM_I2),
    stelem_op!("stelem.i4", "System.Int32" => STELEM_I4),
    stelem_op!("stelem.i8", "System.Int64" => STELEM_I8),
    stelem_op!("stelem.r4", "System.Single" => STELEM_R4),
    stelem_op!("stelem.r8", "System.Double" => STELEM_R8),
    stelem_op!("stelem.ref", "System.Object" => STELEM_REF),
    OpcodePattern {
        name: "ldelema",
        prototype: &[LDARG_0, LDTOKEN, CALL, NEWOBJ, CALLVIRT, RET],
        match_entire_body: true,
        interchange: Interchange::empty(),
        target: PatternTarget::Cil(LDELEMA),
        verifier: Verifier::CalleeFullName {
            slot: 2,
            full_name: "System.Type::GetTypeFromHandle",
        },
    },
    // ── Indirect loads and stores ───────────────────────────────────────
    ldind_op!("ldind.i1", "System.Convert::ToSByte" => LDIND_I1),
    ldind_op!("ldind.u1", "System.Convert::ToByte" => LDIND_U1),
    ldind_op!("ldind.i2", "System.Convert::ToInt16" => LDIND_I2),
    ldind_op!("ldind.u2", "System.Convert::ToUInt16" => LDIND_U2),
    ldind_op!("ldind.i4", "System.Convert::ToInt32" => LDIND_I4),
    ldind_op!("ldind.u4", "System.Convert::ToUInt32" => LDIND_U4),
    ldind_op!("ldind.i8", "System.Convert::ToInt64" => LDIND_I8),
    ldind_op!("ldind.r4", "System.Convert::ToSingle" => LDIND_R4),
    ldind_op!("ldind.r8", "System.Convert::ToDouble" => LDIND_R8),
    OpcodePattern {
        name: "ldind.ref",
        prototype: &[
            LDARG_0, CALLVIRT, STLOC_0, LDARG_0, LDLOC_0, CALLVIRT, CALLVIRT, NEWOBJ, CALLVIRT, RET,
        ],
        match_entire_body: true,
        interchange: LOCALS,
        target: PatternTarget::Cil(LDIND_REF),
        verifier: Verifier::None,
    },
    stind_op!("stind.i1", CONV_I1 => STIND_I1),
    stind_op!("stind.i2", CONV_I2 => STIND_I2),
    stind_op!("stind.i4", CONV_I4 => STIND_I4),
    stind_op!("stind.i8", CONV_I8 => STIND_I8),
    stind_op!("stind.r4", CONV_R4 => STIND_R4),
    stind_op!("stind.r8", CONV_R8 => STIND_R8),
    stind_op!("stind.i", CONV_I => STIND_I),
    OpcodePattern {
        name: "stind.ref",
        prototype: &[
            LDARG_0, CALLVIRT, STLOC_0, LDARG_0, CALLVIRT, STLOC_1, LDLOC_1, CALLVIRT, LDLOC_0,
            CALLVIRT, CALLVIRT, RET,
        ],
        match_entire_body: true,
        interchange: LOCALS,
        target: PatternTarget::Cil(STIND_REF),
        verifier: Verifier::None,
    },
    // ── Specials (windowed; kept last so anchored shapes win first) ─────
    OpcodePattern {
        name: "eazcall",
        prototype: &[LDARG_0, LDARG_1, CALLVIRT, STLOC_0, LDARG_0, LDLOC_0, CALLVIRT, RET],
        match_entire_body: false,
        interchange: LOCALS,
        target: PatternTarget::Special(SpecialOpcode::EazCall),
        verifier: Verifier::None,
    },
];
