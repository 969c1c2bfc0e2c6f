//! CLI interface module
//!
//! Provides command-line interface using clap derive macros.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

use crate::batch::BatchError;
use crate::bounds::{self, CropRect};
use crate::pipeline::{ErrorKind, PipelineError};

/// Exit codes for the CLI
///
/// These codes follow standard Unix conventions and provide
/// specific error categories for scripting and automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Run finished (individual items may still have failed)
    Success = 0,
    /// Unclassified error
    GeneralError = 1,
    /// Invalid arguments or settings
    InvalidArgs = 2,
    /// Input directory missing or holding no images
    InputNotFound = 3,
    /// Output location cannot be written
    OutputError = 4,
    /// Error while processing
    ProcessingError = 5,
    /// No content bounds found in the reference image
    DetectionFailed = 6,
    /// Operator declined the bounds at the verification prompt
    Aborted = 7,
}

impl ExitCode {
    /// Convert to process exit code
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Get human-readable description
    pub fn description(self) -> &'static str {
        match self {
            ExitCode::Success => "Success",
            ExitCode::GeneralError => "General error",
            ExitCode::InvalidArgs => "Invalid arguments",
            ExitCode::InputNotFound => "Input directory not found or empty",
            ExitCode::OutputError => "Output error (permission denied, disk full, etc.)",
            ExitCode::ProcessingError => "Processing error",
            ExitCode::DetectionFailed => "Content bounds could not be detected",
            ExitCode::Aborted => "Aborted by user",
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.code()
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code.code() as u8)
    }
}

impl From<&PipelineError> for ExitCode {
    fn from(err: &PipelineError) -> Self {
        match err {
            PipelineError::Input(
                BatchError::InputNotFound(_)
                | BatchError::NotADirectory(_)
                | BatchError::EmptyBatch { .. },
            ) => ExitCode::InputNotFound,
            PipelineError::Input(BatchError::IoError(_)) => ExitCode::ProcessingError,
            _ => match err.kind() {
                ErrorKind::Configuration => ExitCode::InvalidArgs,
                ErrorKind::Detection => ExitCode::DetectionFailed,
                ErrorKind::Verification => ExitCode::GeneralError,
                ErrorKind::Output => ExitCode::OutputError,
            },
        }
    }
}

/// Crop a batch of screenshots to the content bounds of a reference page
#[derive(Parser, Debug)]
#[command(name = "pagecrop")]
#[command(version)]
#[command(about = "Crop a batch of page screenshots to their content bounds", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

impl Cli {
    /// Log filter directive selected by `-v`
    pub fn verbosity(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Detect bounds on a reference image, confirm them, and crop the batch
    Crop(CropArgs),
    /// Print the detected content bounds of one image
    Detect(DetectArgs),
    /// Combine a directory of images into one PDF
    Combine(CombineArgs),
    /// Show version, defaults and config file locations
    Info,
}

/// Arguments for the crop command
#[derive(clap::Args, Debug)]
pub struct CropArgs {
    /// Input directory [default: png]
    pub input: Option<PathBuf>,

    /// Output directory [default: output_cropped]
    pub output: Option<PathBuf>,

    /// Use these bounds instead of detecting them
    #[arg(long, num_args = 4, value_names = ["LEFT", "TOP", "RIGHT", "BOTTOM"])]
    pub bounds: Option<Vec<u32>>,

    /// Index of the reference image in the sorted batch [default: 0]
    #[arg(short, long)]
    pub reference: Option<usize>,

    /// Accept the bounds without prompting
    #[arg(short, long)]
    pub yes: bool,

    /// Do not open the preview in an image viewer
    #[arg(long)]
    pub no_preview: bool,

    /// Process at most N images
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    pub limit: Option<u64>,

    /// Also combine the cropped images into a PDF
    #[arg(long)]
    pub pdf: bool,

    /// Luminance threshold, 0-255 [default: 250]
    #[arg(long)]
    pub threshold: Option<u8>,

    /// Padding around detected content in pixels [default: 10]
    #[arg(long)]
    pub padding: Option<u32>,

    /// PDF resolution [default: 300]
    #[arg(long)]
    pub dpi: Option<u32>,

    /// Input file extension (repeatable) [default: png]
    #[arg(long = "ext", value_name = "EXT")]
    pub extensions: Vec<String>,

    /// Configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write a JSON report of the batch to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Show execution plan without processing
    #[arg(long)]
    pub dry_run: bool,
}

impl CropArgs {
    /// Parsed `--bounds`, if given
    pub fn override_rect(&self) -> bounds::Result<Option<CropRect>> {
        self.bounds
            .as_deref()
            .and_then(CropRect::from_slice)
            .transpose()
    }
}

/// Arguments for the detect command
#[derive(clap::Args, Debug)]
pub struct DetectArgs {
    /// Image to inspect
    pub image: PathBuf,

    /// Luminance threshold (0-255)
    #[arg(long, default_value_t = bounds::DEFAULT_THRESHOLD)]
    pub threshold: u8,

    /// Padding around detected content in pixels
    #[arg(long, default_value_t = bounds::DEFAULT_PADDING)]
    pub padding: u32,
}

/// Arguments for the combine command
#[derive(clap::Args, Debug)]
pub struct CombineArgs {
    /// Directory of images
    pub input: PathBuf,

    /// Output PDF file
    pub output: PathBuf,

    /// PDF resolution
    #[arg(long, default_value_t = crate::document::DEFAULT_DPI)]
    pub dpi: u32,

    /// Input file extension (repeatable) [default: png]
    #[arg(long = "ext", value_name = "EXT")]
    pub extensions: Vec<String>,
}

/// Create a styled progress bar for file processing
pub fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )
            .expect("Invalid progress bar template")
            .progress_chars("#>-"),
    );
    pb
}

/// Create a spinner for indeterminate progress
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("Invalid spinner template"),
    );
    pb.set_message(message.to_string());
    pb
}
