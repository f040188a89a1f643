use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use gbdec_isa::{DecodeError, Flow, Instruction};
use gbdec_rom::Address;
use thiserror::Error;
use tracing::{debug, info_span, warn};

use crate::project::{ProjectContext, procedure_limit};
use crate::render::{Renderer, render_instruction};

/// Jump-table entries at or below this virtual address are taken for data.
pub const MIN_JUMPTABLE_TARGET: u16 = 0x4A;

/// Confidence problems found while exploring a procedure. They are logged and
/// recorded, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisWarning {
    UnknownOpcode {
        address: Address,
    },
    OwnershipConflict {
        address: Address,
    },
    /// Expansion of `table` stopped at a manual cap (`target` is `None`) or at
    /// an implausible target.
    SuspiciousJumpTable {
        table: Address,
        target: Option<Address>,
    },
}

impl fmt::Display for AnalysisWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownOpcode { address } => write!(f, "bad opcode at {address}"),
            Self::OwnershipConflict { address } => {
                write!(f, "byte {address} is claimed twice")
            }
            Self::SuspiciousJumpTable {
                table,
                target: None,
            } => write!(f, "jump table {table} reached its manual limit"),
            Self::SuspiciousJumpTable {
                table,
                target: Some(target),
            } => write!(f, "jump table {table} has implausible target {target}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("decoding at {address} ran past the ROM image")]
    RangeOverrun {
        address: Address,
        #[source]
        source: DecodeError,
    },
    /// The entry byte is owned elsewhere or lies outside the window.
    #[error("procedure at {address} owns no bytes")]
    EmptyRange { address: Address },
    #[error("failed to decode {address}")]
    Decode {
        address: Address,
        #[source]
        source: DecodeError,
    },
}

impl AnalysisError {
    pub(crate) fn from_decode(address: Address, source: DecodeError) -> Self {
        match source {
            DecodeError::Rom(_) => Self::RangeOverrun { address, source },
            source => Self::Decode { address, source },
        }
    }
}

/// Exploration session for one procedure. Consumed by [`run`](Self::run),
/// which drains both work queues and trims the window once at the end.
#[derive(Debug)]
pub struct ProcedureRangeAnalysis {
    range: ProcedureRange,
    claimed: BTreeSet<Address>,
    queue: BTreeSet<Address>,
    jumptable_queue: BTreeSet<Address>,
}

/// The frozen outcome of a range analysis.
#[derive(Debug, Clone)]
pub struct ProcedureRange {
    start: Address,
    limit: Address,
    instructions: BTreeMap<Address, Arc<Instruction>>,
    owned: BTreeSet<Address>,
    labels: BTreeSet<Address>,
    block_starts: BTreeSet<Address>,
    jumptable_sizes: BTreeMap<Address, usize>,
    suspicious_switch: bool,
    suspicious_instr: bool,
    ownership_warning: bool,
    warnings: Vec<AnalysisWarning>,
}

impl ProcedureRangeAnalysis {
    pub fn new(start: Address, limit: Address) -> Self {
        Self {
            range: ProcedureRange {
                start,
                limit,
                instructions: BTreeMap::new(),
                owned: BTreeSet::new(),
                labels: BTreeSet::new(),
                block_starts: BTreeSet::from([start]),
                jumptable_sizes: BTreeMap::new(),
                suspicious_switch: false,
                suspicious_instr: false,
                ownership_warning: false,
                warnings: Vec::new(),
            },
            claimed: BTreeSet::new(),
            queue: BTreeSet::from([start]),
            jumptable_queue: BTreeSet::new(),
        }
    }

    /// Marks bytes as owned by other procedures. They are never taken.
    pub fn with_claimed(mut self, claimed: impl IntoIterator<Item = Address>) -> Self {
        self.claimed.extend(claimed);
        self
    }

    pub fn run(mut self, ctx: &dyn ProjectContext) -> Result<ProcedureRange, AnalysisError> {
        let _span = info_span!("range", start = %self.range.start).entered();
        loop {
            if let Some(addr) = self.queue.pop_first() {
                self.visit(ctx, addr)?;
            } else if let Some(table) = self.jumptable_queue.pop_first() {
                self.expand_jumptable(ctx, table)?;
            } else {
                break;
            }
        }
        self.trim();
        if self.range.owned.is_empty() {
            return Err(AnalysisError::EmptyRange {
                address: self.range.start,
            });
        }
        Ok(self.range)
    }

    fn is_local(&self, addr: Address) -> bool {
        self.range.start <= addr && addr < self.range.limit
    }

    fn is_available(&self, addr: Address) -> bool {
        self.is_local(addr) && !self.range.owned.contains(&addr) && !self.claimed.contains(&addr)
    }

    fn warn(&mut self, warning: AnalysisWarning) {
        warn!(start = %self.range.start, "{warning}");
        match warning {
            AnalysisWarning::UnknownOpcode { .. } => self.range.suspicious_instr = true,
            AnalysisWarning::OwnershipConflict { .. } => self.range.ownership_warning = true,
            AnalysisWarning::SuspiciousJumpTable { .. } => self.range.suspicious_switch = true,
        }
        self.range.warnings.push(warning);
    }

    fn visit(&mut self, ctx: &dyn ProjectContext, addr: Address) -> Result<(), AnalysisError> {
        if self.range.instructions.contains_key(&addr) || !self.is_local(addr) {
            return Ok(());
        }
        let instr = ctx
            .decode_and_cache(addr)
            .map_err(|source| AnalysisError::from_decode(addr, source))?;
        self.range.instructions.insert(addr, Arc::clone(&instr));
        self.claim(addr, instr.length());

        if instr.is_invalid() {
            self.warn(AnalysisWarning::UnknownOpcode { address: addr });
        }
        if let Flow::Switch { table } = instr.flow() {
            self.jumptable_queue.insert(*table);
            return Ok(());
        }

        let jumps = instr.jumps();
        if instr.has_fallthrough() {
            let next = instr.next_address();
            self.queue.insert(next);
            if instr.is_return() || !jumps.is_empty() {
                self.range.block_starts.insert(next);
            }
        }
        for target in jumps {
            self.queue.insert(target);
            self.range.labels.insert(target);
            self.range.block_starts.insert(target);
        }
        for target in instr.calls() {
            if target != self.range.start {
                self.shrink_limit(target);
            }
        }
        Ok(())
    }

    /// Takes `len` bytes from `addr`. Bytes already owned are skipped and a
    /// byte outside the window stops the claim, both with a warning.
    fn claim(&mut self, addr: Address, len: usize) {
        for index in 0..len {
            let byte = addr.offset(index as i32);
            if !self.is_local(byte) {
                self.warn(AnalysisWarning::OwnershipConflict { address: byte });
                return;
            }
            if self.is_available(byte) {
                self.range.owned.insert(byte);
            } else {
                self.warn(AnalysisWarning::OwnershipConflict { address: byte });
            }
        }
    }

    fn shrink_limit(&mut self, target: Address) {
        if self.range.start < target && target < self.range.limit {
            debug!(from = %self.range.limit, to = %target, "call shrinks window");
            self.range.limit = target;
        }
    }

    fn expand_jumptable(
        &mut self,
        ctx: &dyn ProjectContext,
        table: Address,
    ) -> Result<(), AnalysisError> {
        let size = *self.range.jumptable_sizes.entry(table).or_insert(0);
        if ctx.manual_jumptable_limit(table).is_some_and(|cap| size >= cap) {
            self.warn(AnalysisWarning::SuspiciousJumpTable {
                table,
                target: None,
            });
            return Ok(());
        }

        let slot = table.offset(2 * size as i32);
        if !self.is_available(slot) {
            return Ok(());
        }
        let raw = ctx
            .rom()
            .word(slot)
            .map_err(|source| AnalysisError::from_decode(slot, source.into()))?;
        let target = Address::from_virtual_and_current(raw, self.range.start);
        if !target.in_physical_mem() || target.virtual_address() <= MIN_JUMPTABLE_TARGET {
            self.warn(AnalysisWarning::SuspiciousJumpTable {
                table,
                target: Some(target),
            });
            return Ok(());
        }

        self.range.jumptable_sizes.insert(table, size + 1);
        self.claim(slot, 2);
        self.jumptable_queue.insert(table);
        self.queue.insert(target);
        self.range.labels.insert(target);
        self.range.block_starts.insert(target);
        Ok(())
    }

    /// Cuts the window at the first byte nobody owns and drops everything
    /// recorded past it.
    fn trim(&mut self) {
        let range = &mut self.range;
        let mut gap = range.start;
        while gap < range.limit && range.owned.contains(&gap) {
            gap = gap.offset(1);
        }
        range.limit = gap;

        let window = range.start..gap;
        range.instructions.retain(|addr, _| window.contains(addr));
        range.owned.retain(|addr| window.contains(addr));
        range.labels.retain(|addr| window.contains(addr));
        range.block_starts.retain(|addr| window.contains(addr));
        range.jumptable_sizes.retain(|addr, _| window.contains(addr));
    }
}

impl ProcedureRange {
    pub fn start(&self) -> Address {
        self.start
    }

    /// First address past the procedure.
    pub fn limit(&self) -> Address {
        self.limit
    }

    /// Addresses of the decoded instructions, in order.
    pub fn visited(&self) -> impl Iterator<Item = Address> + '_ {
        self.instructions.keys().copied()
    }

    pub fn instructions(&self) -> impl Iterator<Item = &Arc<Instruction>> {
        self.instructions.values()
    }

    pub fn owned(&self) -> &BTreeSet<Address> {
        &self.owned
    }

    pub fn labels(&self) -> &BTreeSet<Address> {
        &self.labels
    }

    pub fn block_starts(&self) -> &BTreeSet<Address> {
        &self.block_starts
    }

    pub fn jumptable_sizes(&self) -> &BTreeMap<Address, usize> {
        &self.jumptable_sizes
    }

    pub fn jumptable_size(&self, table: Address) -> usize {
        self.jumptable_sizes.get(&table).copied().unwrap_or(0)
    }

    pub fn suspicious_switch(&self) -> bool {
        self.suspicious_switch
    }

    pub fn has_suspicious_instr(&self) -> bool {
        self.suspicious_instr
    }

    pub fn ownership_warning(&self) -> bool {
        self.ownership_warning
    }

    pub fn warnings(&self) -> &[AnalysisWarning] {
        &self.warnings
    }

    pub fn length(&self) -> usize {
        distance(self.start, self.limit)
    }

    /// Labels and instructions in address order.
    pub fn render<R: Renderer>(&self, renderer: &mut R) {
        for (addr, instr) in &self.instructions {
            if self.labels.contains(addr) {
                renderer.label(*addr);
            }
            render_instruction(renderer, instr);
        }
    }
}

/// Byte distance between two addresses of one procedure.
pub(crate) fn distance(from: Address, to: Address) -> usize {
    match (from.physical(), to.physical()) {
        (Some(from), Some(to)) => to.saturating_sub(from) as usize,
        _ => usize::from(to.virtual_address().saturating_sub(from.virtual_address())),
    }
}

/// Runs a range analysis bounded by [`procedure_limit`].
pub fn analyze_procedure(
    ctx: &dyn ProjectContext,
    addr: Address,
) -> Result<ProcedureRange, AnalysisError> {
    ProcedureRangeAnalysis::new(addr, procedure_limit(ctx, addr)).run(ctx)
}

#[cfg(test)]
mod tests;
