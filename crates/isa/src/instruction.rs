use std::collections::BTreeSet;
use std::fmt;

use gbdec_expr::Expr;
use gbdec_rom::Address;

/// Where an assignment in an instruction's effect stores its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Register(String),
    Memory(Expr),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Effect {
    pub target: Target,
    pub value: Expr,
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Target::Register(name) => write!(f, "{name} := {}", self.value),
            Target::Memory(addr) => write!(f, "[{addr}] := {}", self.value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JumpTarget {
    Direct(Address),
    Computed(Expr),
}

/// Control-flow classification of one decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Next,
    Jump {
        condition: Option<Expr>,
        target: JumpTarget,
    },
    Call {
        condition: Option<Expr>,
        target: JumpTarget,
    },
    Return {
        condition: Option<Expr>,
    },
    /// Dispatch through a table of 16-bit targets starting at `table`.
    Switch {
        table: Address,
    },
    /// Undefined opcode byte.
    Invalid,
}

/// Register and memory footprint of an instruction, filled in from its
/// opcode's effect template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Footprint {
    pub reads: BTreeSet<String>,
    pub writes: BTreeSet<String>,
    pub loads: Vec<Expr>,
    pub effects: Vec<Effect>,
    pub side_effects: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    address: Address,
    length: usize,
    mnemonic: String,
    cycles: u32,
    operands: Vec<Expr>,
    footprint: Footprint,
    flow: Flow,
}

impl Instruction {
    pub fn new(
        address: Address,
        length: usize,
        mnemonic: &str,
        cycles: u32,
        operands: Vec<Expr>,
        footprint: Footprint,
    ) -> Self {
        let flow = classify(mnemonic, &operands, address);
        Self {
            address,
            length,
            mnemonic: mnemonic.to_string(),
            cycles,
            operands,
            footprint,
            flow,
        }
    }

    /// One-byte placeholder for a byte no opcode matches.
    pub fn invalid(address: Address, opcode: u8) -> Self {
        Self {
            address,
            length: 1,
            mnemonic: "DB".to_string(),
            cycles: 0,
            operands: vec![Expr::byte(opcode)],
            footprint: Footprint::default(),
            flow: Flow::Invalid,
        }
    }

    /// Turns a call into a table dispatch whose entries start right after it.
    pub fn into_switch(self) -> Self {
        let table = self.next_address();
        Self {
            mnemonic: "SWITCH".to_string(),
            flow: Flow::Switch { table },
            ..self
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn next_address(&self) -> Address {
        self.address.offset(self.length as i32)
    }

    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    pub fn operands(&self) -> &[Expr] {
        &self.operands
    }

    pub fn reads(&self) -> &BTreeSet<String> {
        &self.footprint.reads
    }

    pub fn writes(&self) -> &BTreeSet<String> {
        &self.footprint.writes
    }

    pub fn effects(&self) -> &[Effect] {
        &self.footprint.effects
    }

    pub fn has_side_effects(&self) -> bool {
        self.footprint.side_effects
    }

    pub fn flow(&self) -> &Flow {
        &self.flow
    }

    pub fn has_fallthrough(&self) -> bool {
        match &self.flow {
            Flow::Next | Flow::Call { .. } => true,
            Flow::Jump { condition, .. } | Flow::Return { condition } => condition.is_some(),
            Flow::Switch { .. } | Flow::Invalid => false,
        }
    }

    /// Direct jump targets.
    pub fn jumps(&self) -> Vec<Address> {
        match &self.flow {
            Flow::Jump {
                target: JumpTarget::Direct(target),
                ..
            } => vec![*target],
            _ => Vec::new(),
        }
    }

    /// The resolved target of a direct jump or call.
    pub fn direct_target(&self) -> Option<Address> {
        match &self.flow {
            Flow::Jump {
                target: JumpTarget::Direct(target),
                ..
            }
            | Flow::Call {
                target: JumpTarget::Direct(target),
                ..
            } => Some(*target),
            _ => None,
        }
    }

    /// Direct call targets.
    pub fn calls(&self) -> Vec<Address> {
        match &self.flow {
            Flow::Call {
                target: JumpTarget::Direct(target),
                ..
            } => vec![*target],
            _ => Vec::new(),
        }
    }

    pub fn is_return(&self) -> bool {
        matches!(self.flow, Flow::Return { .. })
    }

    pub fn is_switch(&self) -> bool {
        matches!(self.flow, Flow::Switch { .. })
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self.flow, Flow::Invalid)
    }

    pub fn condition(&self) -> Option<&Expr> {
        match &self.flow {
            Flow::Jump { condition, .. }
            | Flow::Call { condition, .. }
            | Flow::Return { condition } => condition.as_ref(),
            _ => None,
        }
    }

    /// Jumps and returns that are always taken.
    pub fn is_unconditional(&self) -> bool {
        matches!(
            self.flow,
            Flow::Jump {
                condition: None,
                ..
            } | Flow::Return { condition: None }
        )
    }

    /// Address expressions of every byte this instruction loads.
    pub fn memory_reads(&self) -> &[Expr] {
        &self.footprint.loads
    }

    /// Address expressions of every byte this instruction stores.
    pub fn memory_writes(&self) -> Vec<&Expr> {
        self.footprint
            .effects
            .iter()
            .filter_map(|effect| match &effect.target {
                Target::Memory(addr) => Some(addr),
                Target::Register(_) => None,
            })
            .collect()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.mnemonic)?;
        if let Flow::Switch { table } = &self.flow {
            return write!(f, " {table}");
        }
        for (index, operand) in self.operands.iter().enumerate() {
            let separator = if index == 0 { " " } else { ", " };
            match self.direct_target() {
                Some(target) if operand.as_const() == Some(target.virtual_address()) => {
                    write!(f, "{separator}{target}")?
                }
                _ => write!(f, "{separator}{operand}")?,
            }
        }
        Ok(())
    }
}

fn classify(mnemonic: &str, operands: &[Expr], address: Address) -> Flow {
    match (mnemonic, operands) {
        ("JP" | "JR", [target]) => Flow::Jump {
            condition: None,
            target: resolve(target, address),
        },
        ("JP" | "JR", [condition, target]) => Flow::Jump {
            condition: Some(condition.clone()),
            target: resolve(target, address),
        },
        ("CALL" | "RST", [target]) => Flow::Call {
            condition: None,
            target: resolve(target, address),
        },
        ("CALL", [condition, target]) => Flow::Call {
            condition: Some(condition.clone()),
            target: resolve(target, address),
        },
        ("RET", [condition]) => Flow::Return {
            condition: Some(condition.clone()),
        },
        ("RET" | "RETI", _) => Flow::Return { condition: None },
        _ => Flow::Next,
    }
}

fn resolve(target: &Expr, current: Address) -> JumpTarget {
    match target.as_const() {
        Some(virtual_address) => {
            JumpTarget::Direct(Address::from_virtual_and_current(virtual_address, current))
        }
        None => JumpTarget::Computed(target.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(virtual_address: u16) -> Address {
        Address::from_virtual(virtual_address)
    }

    fn instr(mnemonic: &str, operands: Vec<Expr>) -> Instruction {
        Instruction::new(at(0x150), 3, mnemonic, 4, operands, Footprint::default())
    }

    #[test]
    fn unconditional_jump_has_no_fallthrough() {
        let jump = instr("JP", vec![Expr::word(0x200)]);
        assert!(!jump.has_fallthrough());
        assert!(jump.is_unconditional());
        assert_eq!(jump.jumps(), vec![at(0x200)]);
    }

    #[test]
    fn conditional_jump_falls_through() {
        let jump = instr("JR", vec![Expr::reg("FZ"), Expr::word(0x140)]);
        assert!(jump.has_fallthrough());
        assert!(!jump.is_unconditional());
        assert_eq!(jump.condition(), Some(&Expr::reg("FZ")));
    }

    #[test]
    fn computed_jump_has_no_targets() {
        let jump = instr("JP", vec![Expr::reg("HL")]);
        assert!(jump.jumps().is_empty());
        assert!(!jump.has_fallthrough());
    }

    #[test]
    fn calls_and_returns() {
        let call = instr("CALL", vec![Expr::word(0x2000)]);
        assert!(call.has_fallthrough());
        assert_eq!(call.calls(), vec![at(0x2000)]);

        let ret = instr("RET", vec![]);
        assert!(ret.is_return());
        assert!(!ret.has_fallthrough());

        let ret_nz = instr("RET", vec![Expr::not(Expr::reg("FZ"))]);
        assert!(ret_nz.has_fallthrough());

        let reti = instr("RETI", vec![]);
        assert!(reti.is_unconditional());
    }

    #[test]
    fn window_targets_inherit_the_current_bank() {
        let current = Address::from_virtual_and_bank(0x4100, 3).expect("address");
        let jump = Instruction::new(
            current,
            3,
            "JP",
            4,
            vec![Expr::word(0x4800)],
            Footprint::default(),
        );
        assert_eq!(jump.jumps()[0].bank(), Some(3));
        assert_eq!(jump.to_string(), "JP 0003:4800");
    }

    #[test]
    fn switch_table_starts_after_the_call() {
        let switch = instr("RST", vec![Expr::word(0)]).into_switch();
        assert!(switch.is_switch());
        assert!(!switch.has_fallthrough());
        assert_eq!(switch.flow(), &Flow::Switch { table: at(0x153) });
    }

    #[test]
    fn invalid_opcode_is_one_byte_dead_end() {
        let bad = Instruction::invalid(at(0x100), 0xD3);
        assert_eq!(bad.length(), 1);
        assert!(bad.is_invalid());
        assert!(!bad.has_fallthrough());
        assert_eq!(bad.to_string(), "DB 0xD3");
    }
}
