//! The per-binary table mapping virtual codes to identified opcodes.

use rustc_hash::FxHashMap;

use crate::{
    cil::ops,
    metadata::token::Token,
    vm::opcode::{ResolvedOpcode, SpecialOpcode, VmOpcode},
};

/// The finalized `virtual_code -> VmOpcode` mapping plus a reverse index by
/// identification target.
///
/// Built once per protected binary, after matching; read-only from then on,
/// which is what lets translation fan out across workers without locks.
pub struct OpcodeTable {
    by_code: FxHashMap<u32, VmOpcode>,
    by_target: FxHashMap<ResolvedOpcode, Vec<u32>>,
    order: Vec<u32>,
    sentinel: VmOpcode,
}

impl OpcodeTable {
    /// Build the table from the matched opcode records.
    ///
    /// Virtual codes are unique by construction of the dispatcher scan; if a
    /// duplicate slips through, the first registration wins and the rest are
    /// logged and dropped.
    #[must_use]
    pub fn build(opcodes: Vec<VmOpcode>) -> OpcodeTable {
        let mut by_code = FxHashMap::default();
        let mut by_target: FxHashMap<ResolvedOpcode, Vec<u32>> = FxHashMap::default();
        let mut order = Vec::with_capacity(opcodes.len());

        for opcode in opcodes {
            let code = opcode.virtual_code;
            if by_code.contains_key(&code) {
                log::warn!("duplicate virtual code 0x{code:02x}, keeping first registration");
                continue;
            }
            by_target.entry(opcode.resolved).or_default().push(code);
            order.push(code);
            by_code.insert(code, opcode);
        }

        OpcodeTable {
            by_code,
            by_target,
            order,
            sentinel: VmOpcode {
                virtual_code: u32::MAX,
                instruction_field: Token::new(0),
                handler: Token::new(0),
                // InlineNone, so tolerant disassembly consumes no operand.
                operand_code: 10,
                resolved: ResolvedOpcode::Cil(ops::NOP),
            },
        }
    }

    /// Look up a virtual code.
    ///
    /// Absent codes return the canonical `nop` sentinel, which keeps
    /// disassembly tolerant of stream bytes the dispatcher never registered.
    #[must_use]
    pub fn get(&self, virtual_code: u32) -> &VmOpcode {
        self.by_code.get(&virtual_code).unwrap_or(&self.sentinel)
    }

    /// True when `virtual_code` was registered by the dispatcher.
    #[must_use]
    pub fn contains(&self, virtual_code: u32) -> bool {
        self.by_code.contains_key(&virtual_code)
    }

    /// Number of registered virtual opcodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    /// True when no opcode was registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }

    /// Number of opcodes a pattern identified.
    #[must_use]
    pub fn identified_count(&self) -> usize {
        self.by_code.values().filter(|o| o.identified()).count()
    }

    /// Every virtual code that resolved to `target`.
    #[must_use]
    pub fn codes_for(&self, target: ResolvedOpcode) -> &[u32] {
        self.by_target.get(&target).map_or(&[], Vec::as_slice)
    }

    /// True when any opcode resolved to the given special action. Used during
    /// call-graph reconstruction to decide whether translated bodies can
    /// reference further virtualized methods.
    #[must_use]
    pub fn has_special(&self, special: SpecialOpcode) -> bool {
        !self.codes_for(ResolvedOpcode::Special(special)).is_empty()
    }

    /// Registered opcodes in dispatcher registration order.
    pub fn iter(&self) -> impl Iterator<Item = &VmOpcode> {
        self.order.iter().filter_map(|code| self.by_code.get(code))
    }
}
