// Desktop tooling binary: unwrap/expect/panic acceptable outside the engine.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use cabc_replay::{replay, verify, DetectorKind, FrameReport, GainKind, Trace};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cabc-replay")]
#[command(about = "Replay recorded CABC histogram traces", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a trace and print the decision for every frame
    Run {
        /// Trace file (JSON)
        trace: PathBuf,
        /// Scene-change detector
        #[arg(long, value_enum, default_value_t = DetectorKind::Diff)]
        detector: DetectorKind,
        /// Gain compensator
        #[arg(long, value_enum, default_value_t = GainKind::Inverse)]
        gain: GainKind,
        /// Emit one JSON object per frame instead of text
        #[arg(long)]
        json: bool,
    },
    /// Replay a trace and check it against its recorded expectations
    Verify {
        /// Trace file (JSON)
        trace: PathBuf,
        /// Scene-change detector
        #[arg(long, value_enum, default_value_t = DetectorKind::Diff)]
        detector: DetectorKind,
        /// Gain compensator
        #[arg(long, value_enum, default_value_t = GainKind::Inverse)]
        gain: GainKind,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            trace,
            detector,
            gain,
            json,
        } => run(&trace, detector, gain, json),
        Commands::Verify {
            trace,
            detector,
            gain,
        } => check(&trace, detector, gain),
    }
}

fn run(path: &std::path::Path, detector: DetectorKind, gain: GainKind, json: bool) -> Result<()> {
    let trace = Trace::load(path)?;
    let reports = replay(&trace, detector, gain)
        .with_context(|| format!("replaying {}", path.display()))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for report in &reports {
        if json {
            serde_json::to_writer(&mut out, report)?;
            writeln!(out)?;
        } else {
            writeln!(out, "{}", text_line(report))?;
        }
    }
    Ok(())
}

fn check(path: &std::path::Path, detector: DetectorKind, gain: GainKind) -> Result<()> {
    let trace = Trace::load(path)?;
    let expected = trace.expectation_count();
    if expected == 0 {
        bail!("{} records no expectations", path.display());
    }
    let reports = replay(&trace, detector, gain)
        .with_context(|| format!("replaying {}", path.display()))?;

    if let Some(mismatch) = verify(&trace, &reports) {
        bail!("{mismatch}");
    }
    println!("ok: {expected} of {} frames checked", reports.len());
    Ok(())
}

fn text_line(report: &FrameReport) -> String {
    let o = &report.output;
    format!(
        "{:>5} {:<5} target={:>4} backlight={:>4} gain={:>4} scene={}",
        report.index,
        o.path.as_str(),
        o.target,
        o.backlight,
        o.gain,
        if o.scene_change { "yes" } else { "no" },
    )
}
