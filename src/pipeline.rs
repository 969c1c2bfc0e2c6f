//! Pipeline processing module
//!
//! Wires the crop workflow together from one explicit [`PipelineConfig`],
//! keeping business logic out of the CLI.
//!
//! ## Processing Steps
//!
//! 1. Collect the batch from the input directory (sorted by file name)
//! 2. Load the reference image (skipped for manual bounds without verification)
//! 3. Take the override rectangle or detect content bounds
//! 4. Verification gate (optional; the operator may abort here)
//! 5. Apply the limit and crop every item with the accepted rectangle
//! 6. Assemble successful pages into a PDF (optional)

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

use crate::batch::{Batch, BatchCropper, BatchError, BatchReport, DirectorySink, ProgressCallback};
use crate::bounds::{BoundsError, BoundsOptions, ContentBoundsDetector, CropRect};
use crate::document::{AssemblyError, PdfAssembler, PdfAssemblerOptions};
use crate::gate::{GateDecision, GateError, VerificationGate, VerifyRequest};

/// Default input directory
pub const DEFAULT_INPUT_DIR: &str = "png";

/// Default output directory
pub const DEFAULT_OUTPUT_DIR: &str = "output_cropped";

/// Default file name of the combined document
pub const DEFAULT_DOCUMENT_NAME: &str = "all-cropped.pdf";

/// Broad failure category, used by the CLI to pick an exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input or settings, detected before any item is processed
    Configuration,
    /// Reference image has no detectable content
    Detection,
    /// The verification gate itself failed
    Verification,
    /// Output location cannot be used
    Output,
}

/// Pipeline processing error
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Input(#[from] BatchError),

    #[error("Invalid override bounds {0}: left must be less than right and top less than bottom")]
    InvalidOverride(CropRect),

    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    #[error("Reference index {index} is out of range for a batch of {len} images")]
    ReferenceOutOfRange { index: usize, len: usize },

    #[error("Failed to load reference image {path}: {reason}")]
    ReferenceImage { path: PathBuf, reason: String },

    #[error("Bounds {rect} lie outside the {width}x{height} reference image")]
    BoundsOutsideReference { rect: CropRect, width: u32, height: u32 },

    #[error("Could not detect content bounds in {path}: {source}")]
    Detection {
        path: PathBuf,
        #[source]
        source: BoundsError,
    },

    #[error("Verification failed: {0}")]
    Gate(#[from] GateError),

    #[error("Failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Input(_)
            | PipelineError::InvalidOverride(_)
            | PipelineError::InvalidSetting(_)
            | PipelineError::ReferenceOutOfRange { .. }
            | PipelineError::ReferenceImage { .. }
            | PipelineError::BoundsOutsideReference { .. } => ErrorKind::Configuration,
            PipelineError::Detection { .. } => ErrorKind::Detection,
            PipelineError::Gate(_) => ErrorKind::Verification,
            PipelineError::OutputDir { .. } => ErrorKind::Output,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineConfig {
    /// Directory holding the source images
    pub input_dir: PathBuf,
    /// Directory receiving cropped images (created if absent)
    pub output_dir: PathBuf,
    /// Luminance threshold for bounds detection
    pub threshold: u8,
    /// Padding around detected content
    pub padding: u32,
    /// Use these bounds instead of detecting them
    pub override_rect: Option<CropRect>,
    /// Batch index of the image used for detection and verification
    pub reference_index: usize,
    /// Route the rectangle through the verification gate
    pub verify: bool,
    /// Process at most this many images
    pub limit: Option<usize>,
    /// Also write a combined PDF
    pub assemble_document: bool,
    /// File name of the combined PDF inside `output_dir`
    pub document_name: String,
    /// Input file extensions (without dot)
    pub extensions: Vec<String>,
    /// Prefix for output file names
    pub output_prefix: String,
    /// DPI for the combined PDF
    pub dpi: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            threshold: crate::bounds::DEFAULT_THRESHOLD,
            padding: crate::bounds::DEFAULT_PADDING,
            override_rect: None,
            reference_index: 0,
            verify: true,
            limit: None,
            assemble_document: false,
            document_name: DEFAULT_DOCUMENT_NAME.to_string(),
            extensions: crate::batch::DEFAULT_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            output_prefix: crate::batch::DEFAULT_OUTPUT_PREFIX.to_string(),
            dpi: crate::document::DEFAULT_DPI,
        }
    }
}

impl PipelineConfig {
    pub fn with_input_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.input_dir = dir.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_padding(mut self, padding: u32) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_override_rect(mut self, rect: Option<CropRect>) -> Self {
        self.override_rect = rect;
        self
    }

    pub fn with_reference_index(mut self, index: usize) -> Self {
        self.reference_index = index;
        self
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_document(mut self, assemble: bool) -> Self {
        self.assemble_document = assemble;
        self
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_output_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.output_prefix = prefix.into();
        self
    }

    pub fn with_document_name(mut self, name: impl Into<String>) -> Self {
        self.document_name = name.into();
        self
    }

    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }

    pub fn bounds_options(&self) -> BoundsOptions {
        BoundsOptions::builder()
            .threshold(self.threshold)
            .padding(self.padding)
            .build()
    }

    pub fn assembler_options(&self) -> PdfAssemblerOptions {
        PdfAssemblerOptions::builder().dpi(self.dpi).build()
    }

    /// Path of the combined PDF
    pub fn document_path(&self) -> PathBuf {
        self.output_dir.join(&self.document_name)
    }

    /// Reject settings that can never produce a run
    pub fn validate(&self) -> Result<()> {
        if let Some(rect) = self.override_rect {
            if !rect.is_valid() {
                return Err(PipelineError::InvalidOverride(rect));
            }
        }
        if self.limit == Some(0) {
            return Err(PipelineError::InvalidSetting(
                "limit must be at least 1".to_string(),
            ));
        }
        if self.extensions.is_empty() {
            return Err(PipelineError::InvalidSetting(
                "at least one input extension is required".to_string(),
            ));
        }
        if self.dpi == 0 {
            return Err(PipelineError::InvalidSetting(
                "dpi must be at least 1".to_string(),
            ));
        }
        if self.assemble_document && self.document_name.trim().is_empty() {
            return Err(PipelineError::InvalidSetting(
                "document name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// What happened to the optional combined document
#[derive(Debug)]
pub enum DocumentOutcome {
    Written { path: PathBuf, pages: usize },
    /// Assembly failed; cropped files already on disk are unaffected
    Failed(AssemblyError),
}

/// Summary of a completed run
#[derive(Debug)]
pub struct RunSummary {
    pub rect: CropRect,
    pub reference: PathBuf,
    pub report: BatchReport,
    pub document: Option<DocumentOutcome>,
    pub elapsed: Duration,
}

/// Final state of a pipeline run
#[derive(Debug)]
pub enum RunOutcome {
    /// The operator declined the rectangle; no item was processed
    Aborted { rect: CropRect, reference: PathBuf },
    Completed(RunSummary),
}

/// Rectangle settled before the batch starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub rect: CropRect,
    pub reference: PathBuf,
    pub decision: GateDecision,
}

/// Crop pipeline
pub struct CropPipeline {
    config: PipelineConfig,
}

impl CropPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Collect the full, sorted batch (before any limit)
    pub fn discover(&self) -> Result<Batch> {
        Ok(Batch::from_dir(
            &self.config.input_dir,
            &self.config.extensions,
        )?)
    }

    /// Settle the rectangle from the reference image and, when enabled,
    /// ask the gate. The reference image is dropped before returning.
    ///
    /// Manual bounds without verification never decode the reference, so
    /// an unreadable first page fails as an item like any other.
    pub fn resolve(&self, batch: &Batch, gate: &mut dyn VerificationGate) -> Result<Resolution> {
        let index = self.config.reference_index;
        let reference = batch
            .get(index)
            .ok_or(PipelineError::ReferenceOutOfRange {
                index,
                len: batch.len(),
            })?
            .to_path_buf();

        if let (Some(rect), false) = (self.config.override_rect, self.config.verify) {
            info!(%rect, "Using manual bounds");
            return Ok(Resolution {
                rect,
                reference,
                decision: GateDecision::Accept,
            });
        }

        let image = image::open(&reference).map_err(|e| PipelineError::ReferenceImage {
            path: reference.clone(),
            reason: e.to_string(),
        })?;

        let rect = match self.config.override_rect {
            Some(rect) => {
                info!(%rect, "Using manual bounds");
                rect
            }
            None => {
                let rect = ContentBoundsDetector::detect(&image, &self.config.bounds_options())
                    .map_err(|source| PipelineError::Detection {
                        path: reference.clone(),
                        source,
                    })?;
                info!(%rect, reference = %reference.display(), "Detected bounds");
                rect
            }
        };

        let decision = if self.config.verify {
            let preview = rect
                .crop(&image)
                .ok_or(PipelineError::BoundsOutsideReference {
                    rect,
                    width: image.width(),
                    height: image.height(),
                })?;
            gate.verify(&VerifyRequest {
                preview: &preview,
                rect,
                reference: &reference,
            })?
        } else {
            GateDecision::Accept
        };

        Ok(Resolution {
            rect,
            reference,
            decision,
        })
    }

    /// Run the whole workflow
    pub fn run(
        &self,
        gate: &mut dyn VerificationGate,
        progress: &dyn ProgressCallback,
    ) -> Result<RunOutcome> {
        let start = Instant::now();
        self.config.validate()?;

        let mut batch = self.discover()?;
        let Resolution {
            rect,
            reference,
            decision,
        } = self.resolve(&batch, gate)?;

        if decision == GateDecision::Abort {
            info!(%rect, "Aborted by operator");
            return Ok(RunOutcome::Aborted { rect, reference });
        }

        if let Some(limit) = self.config.limit {
            if limit < batch.len() {
                info!(limit, total = batch.len(), "Limiting batch");
            }
            batch.truncate(limit);
        }

        let output_dir = &self.config.output_dir;
        std::fs::create_dir_all(output_dir).map_err(|source| PipelineError::OutputDir {
            path: output_dir.clone(),
            source,
        })?;

        let mut sink = DirectorySink::new(output_dir).with_prefix(&self.config.output_prefix);
        let run = BatchCropper::new(rect)
            .retain_pages(self.config.assemble_document)
            .run(&batch, &mut sink, progress);

        let document = self
            .config
            .assemble_document
            .then(|| self.assemble(&run.pages, &self.config.document_path()));

        Ok(RunOutcome::Completed(RunSummary {
            rect,
            reference,
            report: run.report,
            document,
            elapsed: start.elapsed(),
        }))
    }

    fn assemble(&self, pages: &[image::DynamicImage], path: &Path) -> DocumentOutcome {
        match PdfAssembler::new(self.config.assembler_options()).write(pages, path) {
            Ok(()) => DocumentOutcome::Written {
                path: path.to_path_buf(),
                pages: pages.len(),
            },
            Err(e) => {
                warn!(error = %e, "Document assembly failed");
                DocumentOutcome::Failed(e)
            }
        }
    }
}
