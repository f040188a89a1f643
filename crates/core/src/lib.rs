pub mod batch;
pub mod config;
pub mod graph;
pub mod project;
pub mod range;
pub mod render;
pub mod symbols;

#[cfg(test)]
mod testing;

pub use batch::{
    ProcedureReport, Progress, SweepHandle, SweepOutcome, SweepStatus, spawn_sweep,
};
pub use config::{ProjectConfig, default_config, load_config};
pub use graph::{Block, ProcedureGraph, Successor, load_graph};
pub use project::{Project, ProjectContext, procedure_limit};
pub use range::{
    AnalysisError, AnalysisWarning, MIN_JUMPTABLE_TARGET, ProcedureRange, ProcedureRangeAnalysis,
    analyze_procedure,
};
pub use render::{Renderer, Scope, render_instruction};
pub use symbols::default_symbol;
