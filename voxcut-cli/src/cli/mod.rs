//! Command-line interface for running segmentations on synthetic phantoms.
//!
//! `binary` separates one bright sphere from a seeded background; `multi`
//! labels two spheres and the background at once.

mod commands;

pub use commands::{
    Cli, CliError, Command, CommandArgs, ExecutionChoice, LabelReport, OutputFormat,
    SegmentationReport, SolverArgs, VolumeArgs, render_report, run_cli,
};
