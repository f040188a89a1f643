use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::Context;
use clap::{Parser, Subcommand};
use gbdec_core::{
    Project, ProcedureReport, ProjectContext, SweepStatus, analyze_procedure, default_config,
    load_config, load_graph, render_instruction, spawn_sweep,
};
use gbdec_fmt::{TextRenderer, format_graph, format_range};
use gbdec_isa::Dispatcher;
use gbdec_rom::{Address, ByteSource, Rom};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "gbdec",
    version,
    about = "Flow-recovering disassembler for Game Boy ROM images",
    long_about = None,
    after_help = "Addresses are written BANK:OFFSET, e.g. 0000:0150 or 0003:4A00.\n\nExamples:\n  gbdec decode game.gb 0000:0100 -n 8\n  gbdec graph game.gb 0000:0150 -c game.gbdec.ron\n  gbdec sweep game.gb 0000:0150 0001:4000"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Decode instructions linearly from an address.
    Decode(DecodeArgs),
    /// List the instructions that belong to one procedure.
    Range(ProcedureArgs),
    /// Show the basic blocks and edges of one procedure.
    Graph(ProcedureArgs),
    /// Analyze many procedures and print one summary line each.
    Sweep(SweepArgs),
}

#[derive(Debug, Parser)]
struct DecodeArgs {
    /// ROM image.
    #[arg(value_name = "ROM")]
    rom: PathBuf,
    /// First address to decode.
    #[arg(value_name = "ADDR")]
    addr: Address,
    /// Number of instructions.
    #[arg(short = 'n', long = "count", default_value_t = 16)]
    count: usize,
}

#[derive(Debug, Parser)]
struct ProcedureArgs {
    /// ROM image.
    #[arg(value_name = "ROM")]
    rom: PathBuf,
    /// Procedure entry point.
    #[arg(value_name = "ADDR")]
    addr: Address,
    /// Project config file in RON format.
    #[arg(short = 'c', long = "config", value_name = "CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct SweepArgs {
    /// ROM image.
    #[arg(value_name = "ROM")]
    rom: PathBuf,
    /// Procedures to analyze; defaults to the config's procedure list.
    #[arg(value_name = "ADDR")]
    addrs: Vec<Address>,
    /// Project config file in RON format.
    #[arg(short = 'c', long = "config", value_name = "CONFIG")]
    config: Option<PathBuf>,
}

fn main() {
    init_logging();
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Decode(args) => decode_command(args),
        Commands::Range(args) => range_command(args),
        Commands::Graph(args) => graph_command(args),
        Commands::Sweep(args) => sweep_command(args),
    }
}

fn open_project(rom_path: &Path, config_path: Option<&Path>) -> anyhow::Result<Project> {
    let rom = Rom::load(rom_path)?;
    let config = match config_path {
        Some(path) => load_config(path)?,
        None => default_config(),
    };
    let dispatcher = Dispatcher::sm83().context("built-in opcode catalog is malformed")?;
    Ok(Project::new(rom, dispatcher, config))
}

fn decode_command(args: DecodeArgs) -> anyhow::Result<()> {
    let project = open_project(&args.rom, None)?;
    let mut text = TextRenderer::new();
    let mut addr = args.addr;
    for _ in 0..args.count {
        if !project.rom().contains(addr) {
            break;
        }
        let instr = project
            .decode_and_cache(addr)
            .with_context(|| format!("failed to decode {addr}"))?;
        render_instruction(&mut text, &instr);
        addr = instr.next_address();
    }
    print!("{}", text.finish());
    Ok(())
}

fn range_command(args: ProcedureArgs) -> anyhow::Result<()> {
    let project = open_project(&args.rom, args.config.as_deref())?;
    let range = analyze_procedure(&project, args.addr)
        .with_context(|| format!("failed to analyze procedure {}", args.addr))?;
    print!("{}", format_range(&range));
    Ok(())
}

fn graph_command(args: ProcedureArgs) -> anyhow::Result<()> {
    let project = open_project(&args.rom, args.config.as_deref())?;
    let graph = load_graph(&project, args.addr)
        .with_context(|| format!("failed to analyze procedure {}", args.addr))?;
    print!("{}", format_graph(&graph));
    Ok(())
}

fn sweep_command(args: SweepArgs) -> anyhow::Result<()> {
    let project = Arc::new(open_project(&args.rom, args.config.as_deref())?);
    let addrs = if args.addrs.is_empty() {
        project.procedures().collect()
    } else {
        args.addrs
    };
    if addrs.is_empty() {
        anyhow::bail!("no procedures to sweep: pass addresses or list them in a config");
    }

    info!(procedures = addrs.len(), "starting sweep");
    let handle = spawn_sweep(project, addrs, Arc::new(AtomicBool::new(false)));
    for progress in handle.progress().iter() {
        if let SweepStatus::Analyzing(addr) = progress.status {
            eprintln!("[{}/{}] {addr}", progress.done + 1, progress.total);
        }
    }
    let outcome = handle.join();

    for report in &outcome.reports {
        println!("{}", summary_line(report));
    }
    for (addr, err) in outcome.failures {
        eprintln!("{addr} failed: {:#}", anyhow::Error::from(err));
    }
    Ok(())
}

fn summary_line(report: &ProcedureReport) -> String {
    let flags: Vec<&str> = [
        (report.has_switch, "switch"),
        (report.suspicious_switch, "suspicious-switch"),
        (report.has_suspicious_instr, "bad-opcode"),
        (report.ownership_warning, "overlap"),
    ]
    .into_iter()
    .filter_map(|(set, name)| set.then_some(name))
    .collect();

    let mut line = format!(
        "{} len={} calls={} tail_calls={} reads={} writes={}",
        report.address,
        report.length,
        report.calls.len(),
        report.tail_calls.len(),
        report.memory_reads.len(),
        report.memory_writes.len(),
    );
    if !flags.is_empty() {
        line.push_str(" flags=");
        line.push_str(&flags.join(","));
    }
    line
}
