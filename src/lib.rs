//! pagecrop - crop batches of page screenshots to their content bounds
//!
//! Detects the content rectangle once on a reference image, lets an operator
//! confirm it, then applies the same rectangle to every image of a batch and
//! optionally combines the results into one PDF.
//!
//! # Features
//!
//! - **Bounds Detection** ([`bounds`]) - Row/column luminance scan for the content rectangle
//! - **Verification Gate** ([`gate`]) - Operator confirmation before the batch is touched
//! - **Batch Cropping** ([`batch`]) - Ordered, failure-isolated cropping of many images
//! - **Document Assembly** ([`document`]) - One PDF page per cropped image
//! - **Pipeline** ([`pipeline`]) - The whole workflow from one configuration value
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use pagecrop::{AutoAccept, CropPipeline, PipelineConfig, RunOutcome, SilentProgress};
//!
//! let config = PipelineConfig::default()
//!     .with_input_dir("screenshots")
//!     .with_output_dir("cropped")
//!     .with_document(true);
//!
//! match CropPipeline::new(config).run(&mut AutoAccept, &SilentProgress).unwrap() {
//!     RunOutcome::Completed(summary) => println!("{}", summary.report.summary()),
//!     RunOutcome::Aborted { .. } => println!("aborted"),
//! }
//! ```
//!
//! ## Using Builder Patterns
//!
//! ```rust
//! use pagecrop::{BoundsOptions, PdfAssemblerOptions};
//!
//! let bounds = BoundsOptions::builder()
//!     .threshold(240)
//!     .padding(0)
//!     .build();
//! assert_eq!(bounds.threshold, 240);
//!
//! let pdf = PdfAssemblerOptions::builder().dpi(150).build();
//! assert_eq!(pdf.dpi, 150);
//! ```
//!
//! # Architecture
//!
//! ```text
//! Input dir -> Batch -> reference image -> Bounds (detect | override)
//!                                              |
//!                                     Verification gate -> abort
//!                                              |
//!                                  BatchCropper -> cropped_<name>
//!                                              |
//!                                   PdfAssembler (optional)
//! ```

pub mod batch;
pub mod bounds;
pub mod cli;
pub mod config;
pub mod document;
pub mod gate;
pub mod pipeline;
pub mod util;

// Re-exports for convenience
pub use batch::{
    crop_image, Batch, BatchCropper, BatchError, BatchReport, BatchRun, DirectorySink,
    ImageSink, ItemError, ItemStatus, ProcessingResult, ProgressCallback, SilentProgress,
    DEFAULT_EXTENSIONS, DEFAULT_OUTPUT_PREFIX,
};
pub use bounds::{
    BoundsError, BoundsOptions, BoundsOptionsBuilder, ContentBoundsDetector, CropRect,
    DEFAULT_PADDING, DEFAULT_THRESHOLD,
};
pub use cli::{
    create_progress_bar, create_spinner, Cli, CombineArgs, Commands, CropArgs, DetectArgs,
    ExitCode,
};
pub use config::{CliOverrides, Config, ConfigError};
pub use document::{
    AssemblyError, CombineReport, PdfAssembler, PdfAssemblerOptions, PdfAssemblerOptionsBuilder,
};
pub use gate::{
    AutoAccept, GateDecision, GateError, PromptGate, VerificationGate, VerifyRequest,
    ViewerCommand,
};
pub use pipeline::{
    CropPipeline, DocumentOutcome, ErrorKind, PipelineConfig, PipelineError, Resolution,
    RunOutcome, RunSummary,
};
