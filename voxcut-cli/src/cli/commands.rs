//! Argument model, command execution and report rendering.

use std::io::{self, Write};
use std::num::NonZeroUsize;
use std::time::Instant;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use voxcut_core::{
    Connectivity, ExecutionMode, LabelVolume, SegmentationError, Segmenter, SegmenterBuilder,
    VoxelSpacing, hardware_threads,
};
use voxcut_providers_phantom::{PhantomBuilder, PhantomError, PhantomSource, dice};

/// Top-level CLI options parsed by [`clap`].
#[derive(Debug, Parser, Clone)]
#[command(
    name = "voxcut",
    about = "Segment synthetic phantom volumes with seeded min-cut."
)]
pub struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported commands.
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Separate one sphere from the seeded background with a single min-cut.
    Binary {
        /// Seed label treated as foreground.
        #[arg(long, default_value_t = 1)]
        foreground: i64,
        /// Volume, solver and output options.
        #[command(flatten)]
        args: CommandArgs,
    },
    /// Label two spheres and the background by alpha-expansion.
    Multi {
        /// Volume, solver and output options.
        #[command(flatten)]
        args: CommandArgs,
    },
}

/// Options shared by every command.
#[derive(Debug, Args, Clone)]
pub struct CommandArgs {
    /// Phantom description.
    #[command(flatten)]
    pub volume: VolumeArgs,
    /// Segmenter configuration.
    #[command(flatten)]
    pub solver: SolverArgs,
    /// Report format written to stdout.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Synthetic phantom parameters.
#[derive(Debug, Args, Clone)]
pub struct VolumeArgs {
    /// Grid extents as `DxXDyXDz`, for example `32x32x32`.
    #[arg(long, default_value = "32x32x32", value_parser = parse_dims)]
    pub dims: [usize; 3],
    /// Physical voxel size as `sx,sy,sz`.
    #[arg(long, default_value = "1,1,1", value_parser = parse_spacing)]
    pub spacing: [f64; 3],
    /// Sphere radius in voxels.
    #[arg(long, default_value_t = 6.0)]
    pub radius: f64,
    /// Bandwidth of the Gaussian intensity affinity.
    #[arg(long, default_value_t = 0.1)]
    pub sigma: f64,
    /// Amplitude of the uniform intensity noise.
    #[arg(long, default_value_t = 0.05)]
    pub noise: f64,
    /// Seed of the noise generator.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

/// Segmenter parameters.
#[derive(Debug, Args, Clone)]
pub struct SolverArgs {
    /// Neighbourhood size, `6` or `26`.
    #[arg(long, default_value_t = 6, value_parser = clap::value_parser!(u8))]
    pub connectivity: u8,
    /// Scheduling of graph construction.
    #[arg(long, value_enum, default_value_t = ExecutionChoice::Auto)]
    pub execution: ExecutionChoice,
    /// Worker count for blocked execution; defaults to the hardware threads.
    #[arg(long)]
    pub threads: Option<NonZeroUsize>,
    /// Grid rows per blocked work unit.
    #[arg(long = "block-rows")]
    pub block_rows: Option<NonZeroUsize>,
    /// Capacity tying seeds to their terminal.
    #[arg(long = "terminal-capacity", default_value_t = voxcut_core::DEFAULT_TERMINAL_CAPACITY)]
    pub terminal_capacity: f64,
    /// Use physical distances instead of diagonal-normalised ones.
    #[arg(long = "raw-distances")]
    pub raw_distances: bool,
    /// Upper bound on alpha-expansion passes.
    #[arg(long = "max-cycles")]
    pub max_cycles: Option<usize>,
}

/// Execution mode names accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExecutionChoice {
    /// Let the segmenter decide.
    Auto,
    /// Build on the calling thread.
    Serial,
    /// Build on a dedicated worker pool.
    Blocked,
}

/// Report formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One `key: value` line per field.
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Errors surfaced while executing CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// The phantom description was unusable.
    #[error(transparent)]
    Phantom(#[from] PhantomError),
    /// Configuration or segmentation failed.
    #[error(transparent)]
    Core(#[from] SegmentationError),
}

/// Voxel count and agreement with ground truth for one output label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelReport {
    /// Output label.
    pub label: i64,
    /// Voxels assigned the label.
    pub voxels: usize,
    /// Dice overlap with the phantom's ground truth.
    pub dice: f64,
}

/// Outcome of one command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentationReport {
    /// `binary` or `multi`.
    pub mode: &'static str,
    /// Grid extents.
    pub dims: [usize; 3],
    /// Voxels carrying a seed.
    pub seeded_voxels: usize,
    /// Neighbourhood size.
    pub connectivity: u8,
    /// Per-label summary, foreground first for binary runs.
    pub labels: Vec<LabelReport>,
    /// Max-flow value of a binary run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_flow: Option<f64>,
    /// Final energy of a multi-label run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy: Option<f64>,
    /// Expansion passes of a multi-label run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycles: Option<usize>,
    /// Wall-clock time of the segmentation call.
    pub elapsed_ms: f64,
}

fn parse_dims(raw: &str) -> Result<[usize; 3], String> {
    let parts = raw
        .split(['x', 'X'])
        .map(|part| part.trim().parse::<usize>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| format!("invalid extent in `{raw}`: {err}"))?;
    match parts.as_slice() {
        &[x, y, z] => Ok([x, y, z]),
        _ => Err(format!("expected three extents like 32x32x32, got `{raw}`")),
    }
}

fn parse_spacing(raw: &str) -> Result<[f64; 3], String> {
    let parts = raw
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| format!("invalid spacing in `{raw}`: {err}"))?;
    match parts.as_slice() {
        &[x, y, z] => Ok([x, y, z]),
        _ => Err(format!("expected three spacings like 1,1,2.5, got `{raw}`")),
    }
}

impl SolverArgs {
    fn execution_mode(&self) -> ExecutionMode {
        match self.execution {
            ExecutionChoice::Auto => ExecutionMode::Auto,
            ExecutionChoice::Serial => ExecutionMode::Serial,
            ExecutionChoice::Blocked => ExecutionMode::Blocked {
                threads: self.threads.unwrap_or_else(hardware_threads),
                block_rows: self.block_rows,
            },
        }
    }

    fn segmenter(&self, spacing: [f64; 3]) -> Result<Segmenter, SegmentationError> {
        let [x, y, z] = spacing;
        SegmenterBuilder::new()
            .with_connectivity(Connectivity::try_from(self.connectivity)?)
            .with_spacing(VoxelSpacing::new(x, y, z)?)
            .with_normalized_distances(!self.raw_distances)
            .with_terminal_capacity(self.terminal_capacity)
            .with_execution(self.execution_mode())
            .with_max_cycles(self.max_cycles)
            .build()
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1e3
}

/// Executes the command represented by `cli`.
///
/// # Errors
/// Returns [`CliError`] when the phantom or the segmenter configuration is
/// invalid, or when segmentation fails.
///
/// # Examples
/// ```
/// use clap::Parser;
/// use voxcut_cli::cli::{Cli, run_cli};
///
/// let cli = Cli::parse_from(["voxcut", "binary", "--dims", "10x10x10", "--radius", "3"]);
/// let report = run_cli(&cli)?;
/// assert_eq!(report.mode, "binary");
/// assert!(report.labels[0].dice > 0.9);
/// # Ok::<(), voxcut_cli::cli::CliError>(())
/// ```
pub fn run_cli(cli: &Cli) -> Result<SegmentationReport, CliError> {
    match &cli.command {
        Command::Binary { foreground, args } => run_binary(*foreground, args),
        Command::Multi { args } => run_multi(args),
    }
}

fn phantom_builder(volume: &VolumeArgs, base: PhantomBuilder) -> PhantomBuilder {
    base.with_noise(volume.noise).with_rng_seed(volume.seed)
}

fn run_binary(foreground: i64, args: &CommandArgs) -> Result<SegmentationReport, CliError> {
    let segmenter = args.solver.segmenter(args.volume.spacing)?;
    let phantom = phantom_builder(
        &args.volume,
        PhantomBuilder::centred_sphere(args.volume.dims, args.volume.radius),
    )
    .build()?;
    let volume = PhantomSource::new(phantom, args.volume.sigma)?;
    info!(
        dims = %volume.dims(),
        seeded = volume.phantom().seeded_voxels(),
        "phantom ready"
    );

    let started = Instant::now();
    let mut labels = LabelVolume::new(volume.dims());
    let summary = segmenter.segment_binary(volume.dims(), &volume, foreground, &mut labels)?;
    let elapsed = elapsed_ms(started);

    let truth = volume.phantom().truth();
    Ok(SegmentationReport {
        mode: "binary",
        dims: args.volume.dims,
        seeded_voxels: volume.phantom().seeded_voxels(),
        connectivity: args.solver.connectivity,
        labels: vec![
            LabelReport {
                label: foreground,
                voxels: summary.foreground_voxels(),
                dice: dice(labels.as_slice(), truth, foreground),
            },
            LabelReport {
                label: 0,
                voxels: summary.background_voxels(),
                dice: background_dice(labels.as_slice(), truth, foreground),
            },
        ],
        max_flow: Some(summary.max_flow()),
        energy: None,
        cycles: None,
        elapsed_ms: elapsed,
    })
}

/// Dice of the `0` output against every truth label other than `foreground`.
fn background_dice(labels: &[i64], truth: &[i64], foreground: i64) -> f64 {
    let collapsed: Vec<i64> = truth
        .iter()
        .map(|&label| if label == foreground { label } else { 0 })
        .collect();
    dice(labels, &collapsed, 0)
}

fn run_multi(args: &CommandArgs) -> Result<SegmentationReport, CliError> {
    let segmenter = args.solver.segmenter(args.volume.spacing)?;
    let phantom = phantom_builder(
        &args.volume,
        PhantomBuilder::sphere_pair(args.volume.dims, args.volume.radius),
    )
    .build()?;
    let volume = PhantomSource::new(phantom, args.volume.sigma)?;
    info!(
        dims = %volume.dims(),
        seeded = volume.phantom().seeded_voxels(),
        "phantom ready"
    );

    let started = Instant::now();
    let mut labels = LabelVolume::new(volume.dims());
    let summary = segmenter.segment_multilabel(volume.dims(), &volume, &mut labels)?;
    let elapsed = elapsed_ms(started);

    let truth = volume.phantom().truth();
    let mut reports: Vec<LabelReport> = summary
        .label_voxels()
        .iter()
        .map(|&(label, voxels)| LabelReport {
            label,
            voxels,
            dice: dice(labels.as_slice(), truth, label),
        })
        .collect();
    reports.sort_by_key(|report| report.label);
    Ok(SegmentationReport {
        mode: "multi",
        dims: args.volume.dims,
        seeded_voxels: volume.phantom().seeded_voxels(),
        connectivity: args.solver.connectivity,
        labels: reports,
        max_flow: None,
        energy: Some(summary.energy()),
        cycles: Some(summary.cycles()),
        elapsed_ms: elapsed,
    })
}

/// Writes `report` to `writer` in the requested format.
///
/// # Errors
/// Returns [`io::Error`] if writing or JSON encoding fails.
///
/// # Examples
/// ```
/// use voxcut_cli::cli::{LabelReport, OutputFormat, SegmentationReport, render_report};
///
/// let report = SegmentationReport {
///     mode: "binary",
///     dims: [4, 4, 4],
///     seeded_voxels: 10,
///     connectivity: 6,
///     labels: vec![LabelReport { label: 1, voxels: 8, dice: 1.0 }],
///     max_flow: Some(2.5),
///     energy: None,
///     cycles: None,
///     elapsed_ms: 0.5,
/// };
/// let mut buffer = Vec::new();
/// render_report(&report, OutputFormat::Text, &mut buffer)?;
/// let text = String::from_utf8(buffer).expect("report is UTF-8");
/// assert!(text.starts_with("mode: binary\n"));
/// assert!(text.contains("label 1: 8 voxels, dice 1.0000\n"));
/// # Ok::<(), std::io::Error>(())
/// ```
pub fn render_report(
    report: &SegmentationReport,
    format: OutputFormat,
    mut writer: impl Write,
) -> io::Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, report)?;
            writeln!(writer)
        }
        OutputFormat::Text => render_text(report, writer),
    }
}

fn render_text(report: &SegmentationReport, mut writer: impl Write) -> io::Result<()> {
    let [x, y, z] = report.dims;
    writeln!(writer, "mode: {}", report.mode)?;
    writeln!(writer, "dims: {x}x{y}x{z}")?;
    writeln!(writer, "seeded voxels: {}", report.seeded_voxels)?;
    writeln!(writer, "connectivity: {}", report.connectivity)?;
    for label in &report.labels {
        writeln!(
            writer,
            "label {}: {} voxels, dice {:.4}",
            label.label, label.voxels, label.dice
        )?;
    }
    if let Some(max_flow) = report.max_flow {
        writeln!(writer, "max flow: {max_flow:.6}")?;
    }
    if let Some(energy) = report.energy {
        writeln!(writer, "energy: {energy:.6}")?;
    }
    if let Some(cycles) = report.cycles {
        writeln!(writer, "cycles: {cycles}")?;
    }
    writeln!(writer, "elapsed: {:.3} ms", report.elapsed_ms)
}

impl Cli {
    /// Output format requested on the command line.
    #[must_use]
    pub const fn format(&self) -> OutputFormat {
        match &self.command {
            Command::Binary { args, .. } | Command::Multi { args } => args.format,
        }
    }
}
