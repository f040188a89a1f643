use std::collections::BTreeSet;
use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, unbounded};
use gbdec_expr::Expr;
use gbdec_rom::Address;
use tracing::{info, warn};

use crate::graph::ProcedureGraph;
use crate::project::{Project, ProjectContext, procedure_limit};
use crate::range::{
    AnalysisError, AnalysisWarning, ProcedureRange, ProcedureRangeAnalysis, analyze_procedure,
};

/// What a full analysis found out about one procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureReport {
    pub address: Address,
    pub length: usize,
    pub calls: BTreeSet<Address>,
    pub tail_calls: BTreeSet<Address>,
    pub memory_reads: BTreeSet<Address>,
    pub memory_writes: BTreeSet<Address>,
    pub has_switch: bool,
    pub suspicious_switch: bool,
    pub has_suspicious_instr: bool,
    pub ownership_warning: bool,
    pub warnings: Vec<AnalysisWarning>,
}

impl ProcedureReport {
    pub fn analyze(ctx: &dyn ProjectContext, addr: Address) -> Result<Self, AnalysisError> {
        let range = analyze_procedure(ctx, addr)?;
        Self::from_range(ctx, &range)
    }

    pub fn from_range(
        ctx: &dyn ProjectContext,
        range: &ProcedureRange,
    ) -> Result<Self, AnalysisError> {
        let addr = range.start();
        let graph = ProcedureGraph::build(ctx, range)?;

        let mut report = Self {
            address: addr,
            length: range.length(),
            calls: BTreeSet::new(),
            tail_calls: graph
                .vertices()
                .map(|id| graph.block(id))
                .filter(|block| block.is_tail_call())
                .map(|block| block.start())
                .collect(),
            memory_reads: BTreeSet::new(),
            memory_writes: BTreeSet::new(),
            has_switch: false,
            suspicious_switch: range.suspicious_switch(),
            has_suspicious_instr: range.has_suspicious_instr(),
            ownership_warning: range.ownership_warning(),
            warnings: range.warnings().to_vec(),
        };
        for instr in range.instructions() {
            report.has_switch |= instr.is_switch();
            report.calls.extend(instr.calls());
            report
                .memory_reads
                .extend(constant_addresses(instr.memory_reads(), addr));
            report
                .memory_writes
                .extend(constant_addresses(instr.memory_writes(), addr));
        }
        Ok(report)
    }
}

fn constant_addresses<'a>(
    addrs: impl IntoIterator<Item = &'a Expr>,
    current: Address,
) -> impl Iterator<Item = Address> {
    addrs
        .into_iter()
        .filter_map(Expr::as_const)
        .map(move |value| Address::from_virtual_and_current(value, current))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepStatus {
    Analyzing(Address),
    Finished,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
    pub status: SweepStatus,
}

#[derive(Debug, Default)]
pub struct SweepOutcome {
    pub reports: Vec<ProcedureReport>,
    pub failures: Vec<(Address, AnalysisError)>,
    pub cancelled: bool,
}

pub struct SweepHandle {
    progress: Receiver<Progress>,
    worker: JoinHandle<SweepOutcome>,
}

impl SweepHandle {
    pub fn progress(&self) -> &Receiver<Progress> {
        &self.progress
    }

    /// Waits for the worker and returns everything it produced.
    pub fn join(self) -> SweepOutcome {
        self.worker
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
    }
}

/// Reports on `addresses` from a worker thread. `cancel` is checked before
/// each procedure; a failing procedure is recorded and the sweep moves on.
/// Bytes owned by an earlier procedure are never taken by a later one.
pub fn spawn_sweep(
    project: Arc<Project>,
    addresses: Vec<Address>,
    cancel: Arc<AtomicBool>,
) -> SweepHandle {
    let (sender, progress) = unbounded();
    let worker = thread::spawn(move || sweep(&*project, &addresses, &cancel, &sender));
    SweepHandle { progress, worker }
}

fn sweep(
    ctx: &dyn ProjectContext,
    addresses: &[Address],
    cancel: &AtomicBool,
    sender: &Sender<Progress>,
) -> SweepOutcome {
    let total = addresses.len();
    let entries: BTreeSet<Address> = addresses.iter().copied().collect();
    let mut claimed: BTreeSet<Address> = BTreeSet::new();
    let mut outcome = SweepOutcome::default();
    // The receiver may be gone; the sweep still runs to completion.
    let report = |done, status| {
        let _ = sender.send(Progress {
            done,
            total,
            status,
        });
    };

    for (done, &addr) in addresses.iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            info!(done, total, "sweep cancelled");
            outcome.cancelled = true;
            report(done, SweepStatus::Cancelled);
            return outcome;
        }
        report(done, SweepStatus::Analyzing(addr));
        let limit = sweep_limit(ctx, &entries, addr);
        let taken = claimed.range(addr..).take_while(|byte| **byte < limit).copied();
        let analyzed = ProcedureRangeAnalysis::new(addr, limit)
            .with_claimed(taken)
            .run(ctx)
            .and_then(|range| {
                claimed.extend(range.owned().iter().copied());
                ProcedureReport::from_range(ctx, &range)
            });
        match analyzed {
            Ok(procedure) => outcome.reports.push(procedure),
            Err(err) => {
                warn!(address = %addr, "{err}");
                outcome.failures.push((addr, err));
            }
        }
    }
    report(total, SweepStatus::Finished);
    outcome
}

/// Like [`procedure_limit`], but other entries of the same sweep also end
/// the window.
fn sweep_limit(ctx: &dyn ProjectContext, entries: &BTreeSet<Address>, addr: Address) -> Address {
    let limit = procedure_limit(ctx, addr);
    entries
        .range((Bound::Excluded(addr), Bound::Unbounded))
        .next()
        .copied()
        .filter(|next| *next < limit)
        .unwrap_or(limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use crate::testing::project_with;

    fn at(virtual_address: u16) -> Address {
        Address::from_virtual(virtual_address)
    }

    fn sample_project() -> Arc<Project> {
        let mut config = default_config();
        config.procedures = vec![at(0x150), at(0x160)];
        Arc::new(project_with(
            &[
                // CALL 0160; LD [C000], A; LD A, [FF44]; JP 0200
                (0x150, &[0xCD, 0x60, 0x01, 0xEA, 0x00, 0xC0, 0xF0, 0x44, 0xC3, 0x00, 0x02]),
                (0x160, &[0x00, 0xD3]),
                (0x7FFF, &[0x01]),
            ],
            config,
        ))
    }

    #[test]
    fn report_collects_references() {
        let project = sample_project();
        let report = ProcedureReport::analyze(&*project, at(0x150)).expect("report");

        assert_eq!(report.length, 11);
        assert_eq!(report.calls, BTreeSet::from([at(0x160)]));
        assert_eq!(report.tail_calls, BTreeSet::from([at(0x200)]));
        assert_eq!(report.memory_writes, BTreeSet::from([at(0xC000)]));
        assert_eq!(report.memory_reads, BTreeSet::from([at(0xFF44)]));
        assert!(!report.has_switch);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn sweep_reports_failures_and_continues() {
        let project = sample_project();
        let addresses = vec![at(0x150), Address::from_physical(0x7FFF), at(0x160)];
        let handle = spawn_sweep(project, addresses, Arc::new(AtomicBool::new(false)));
        let outcome = handle.join();

        assert!(!outcome.cancelled);
        assert_eq!(outcome.reports.len(), 2);
        assert!(outcome.reports[1].has_suspicious_instr);
        assert_eq!(outcome.failures.len(), 1);
        assert!(matches!(
            outcome.failures[0].1,
            AnalysisError::RangeOverrun { .. }
        ));
    }

    #[test]
    fn overlap_with_an_earlier_procedure_is_flagged() {
        // NOP; LD A, 5; RET, with a second entry inside the LD
        let project = Arc::new(project_with(
            &[(0x150, &[0x00, 0x3E, 0x05, 0xC9])],
            default_config(),
        ));
        let handle = spawn_sweep(
            project,
            vec![at(0x152), at(0x150)],
            Arc::new(AtomicBool::new(false)),
        );
        let outcome = handle.join();

        assert!(outcome.failures.is_empty());
        let [inner, outer] = outcome.reports.as_slice() else {
            panic!("expected two reports, got {:?}", outcome.reports);
        };
        assert_eq!(inner.length, 2);
        assert!(!inner.ownership_warning);
        assert_eq!(outer.length, 2);
        assert!(outer.ownership_warning);
        assert_eq!(
            outer.warnings,
            vec![AnalysisWarning::OwnershipConflict { address: at(0x152) }]
        );
    }

    #[test]
    fn repeated_entry_finds_its_bytes_taken() {
        let project = Arc::new(project_with(&[(0x150, &[0x00, 0xC9])], default_config()));
        let handle = spawn_sweep(
            project,
            vec![at(0x150), at(0x150)],
            Arc::new(AtomicBool::new(false)),
        );
        let outcome = handle.join();

        assert_eq!(outcome.reports.len(), 1);
        assert_eq!(outcome.failures.len(), 1);
        assert!(matches!(
            outcome.failures[0],
            (addr, AnalysisError::EmptyRange { address }) if addr == at(0x150) && address == addr
        ));
    }

    #[test]
    fn progress_ends_with_finished() {
        let project = sample_project();
        let handle = spawn_sweep(
            project,
            vec![at(0x150), at(0x160)],
            Arc::new(AtomicBool::new(false)),
        );
        let progress: Vec<Progress> = handle.progress().iter().collect();
        handle.join();

        assert_eq!(progress.len(), 3);
        assert_eq!(progress[0].status, SweepStatus::Analyzing(at(0x150)));
        assert_eq!(
            progress[2],
            Progress {
                done: 2,
                total: 2,
                status: SweepStatus::Finished,
            }
        );
    }

    #[test]
    fn cancelled_sweep_stops_before_the_next_procedure() {
        let project = sample_project();
        let handle = spawn_sweep(
            project,
            vec![at(0x150), at(0x160)],
            Arc::new(AtomicBool::new(true)),
        );
        let progress: Vec<Progress> = handle.progress().iter().collect();
        let outcome = handle.join();

        assert!(outcome.cancelled);
        assert!(outcome.reports.is_empty());
        assert_eq!(progress.last().map(|p| p.status), Some(SweepStatus::Cancelled));
    }
}
