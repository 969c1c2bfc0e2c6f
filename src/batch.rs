//! Batch Cropping module
//!
//! Applies one fixed rectangle to every image of an ordered batch.
//!
//! Every item produces a [`ProcessingResult`]; a corrupt or unwritable file is
//! recorded as a failure for that item and the loop moves on, so the
//! [`BatchReport`] is built purely from the sequence of per-item results.

use crate::bounds::CropRect;
use crate::util::{display_name, has_extension};
use image::{DynamicImage, GenericImageView};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Extensions collected from an input directory by default
pub const DEFAULT_EXTENSIONS: &[&str] = &["png"];

/// Prefix added to every output file name by default
pub const DEFAULT_OUTPUT_PREFIX: &str = "cropped_";

/// Errors that prevent a batch from being built
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Input directory not found: {0}")]
    InputNotFound(PathBuf),

    #[error("Input path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("No images with extension [{extensions}] found in {dir}")]
    EmptyBatch { dir: PathBuf, extensions: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Failure of a single batch item. Recorded, never propagated.
#[derive(Debug, Clone, Error, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ItemError {
    #[error("failed to open image: {0}")]
    Open(String),

    #[error("bounds {rect} lie outside the {width}x{height} image")]
    EmptyCrop { rect: CropRect, width: u32, height: u32 },

    #[error("failed to write {path}: {reason}")]
    Write { path: PathBuf, reason: String },
}

/// Ordered, read-only sequence of input images
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    items: Vec<PathBuf>,
}

impl Batch {
    /// Build a batch from arbitrary paths, sorted by file name
    pub fn from_paths<I>(paths: I) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut items: Vec<PathBuf> = paths.into_iter().collect();
        items.sort_by(|a, b| a.file_name().cmp(&b.file_name()).then_with(|| a.cmp(b)));
        Self { items }
    }

    /// Collect regular files in `dir` whose extension is in `extensions`
    pub fn from_dir<S: AsRef<str>>(dir: &Path, extensions: &[S]) -> Result<Self, BatchError> {
        if !dir.exists() {
            return Err(BatchError::InputNotFound(dir.to_path_buf()));
        }
        if !dir.is_dir() {
            return Err(BatchError::NotADirectory(dir.to_path_buf()));
        }

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && has_extension(&path, extensions) {
                paths.push(path);
            }
        }

        if paths.is_empty() {
            return Err(BatchError::EmptyBatch {
                dir: dir.to_path_buf(),
                extensions: extensions
                    .iter()
                    .map(|e| e.as_ref())
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }

        let batch = Self::from_paths(paths);
        debug!(dir = %dir.display(), count = batch.len(), "Collected batch");
        Ok(batch)
    }

    /// Keep only the first `limit` items
    pub fn truncate(&mut self, limit: usize) {
        self.items.truncate(limit);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Path> {
        self.items.get(index).map(PathBuf::as_path)
    }

    pub fn items(&self) -> &[PathBuf] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathBuf> {
        self.items.iter()
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a PathBuf;
    type IntoIter = std::slice::Iter<'a, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Destination for cropped images
pub trait ImageSink {
    /// Persist the cropped version of `input`, returning where it went
    fn write(&mut self, input: &Path, image: &DynamicImage) -> Result<PathBuf, ItemError>;
}

/// Writes `<dir>/<prefix><input file name>`; the format follows the extension
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    prefix: String,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prefix: DEFAULT_OUTPUT_PREFIX.to_string(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Deterministic output path for `input`
    pub fn output_path_for(&self, input: &Path) -> PathBuf {
        self.dir
            .join(format!("{}{}", self.prefix, display_name(input)))
    }
}

impl ImageSink for DirectorySink {
    fn write(&mut self, input: &Path, image: &DynamicImage) -> Result<PathBuf, ItemError> {
        let path = self.output_path_for(input);

        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir).map_err(|e| ItemError::Write {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        }

        image.save(&path).map_err(|e| ItemError::Write {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        Ok(path)
    }
}

/// Outcome of one item
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemStatus {
    Succeeded { output: PathBuf, size: (u32, u32) },
    Failed { reason: ItemError },
}

/// Per-item result
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProcessingResult {
    /// Position in the batch (0-based)
    pub index: usize,
    pub input: PathBuf,
    #[serde(flatten)]
    pub status: ItemStatus,
}

impl ProcessingResult {
    pub fn is_success(&self) -> bool {
        matches!(self.status, ItemStatus::Succeeded { .. })
    }

    pub fn output(&self) -> Option<&Path> {
        match &self.status {
            ItemStatus::Succeeded { output, .. } => Some(output),
            ItemStatus::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ItemError> {
        match &self.status {
            ItemStatus::Succeeded { .. } => None,
            ItemStatus::Failed { reason } => Some(reason),
        }
    }

    /// Input file name for progress lines
    pub fn name(&self) -> String {
        display_name(&self.input)
    }
}

/// Aggregate of all per-item results, in batch order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub rect: CropRect,
    pub results: Vec<ProcessingResult>,
}

impl BatchReport {
    pub fn attempted(&self) -> usize {
        self.results.len()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.attempted() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ProcessingResult> {
        self.results.iter().filter(|r| !r.is_success())
    }

    /// One-line totals
    pub fn summary(&self) -> String {
        format!(
            "{} of {} images cropped successfully ({} failed)",
            self.succeeded(),
            self.attempted(),
            self.failed()
        )
    }

    /// Pretty JSON including totals
    pub fn to_json(&self) -> serde_json::Result<String> {
        #[derive(Serialize)]
        struct ReportJson<'a> {
            rect: &'a CropRect,
            attempted: usize,
            succeeded: usize,
            failed: usize,
            results: &'a [ProcessingResult],
        }

        serde_json::to_string_pretty(&ReportJson {
            rect: &self.rect,
            attempted: self.attempted(),
            succeeded: self.succeeded(),
            failed: self.failed(),
            results: &self.results,
        })
    }
}

/// Progress notifications for batch runs
pub trait ProgressCallback: Send + Sync {
    /// Called once before the first item
    fn on_batch_start(&self, _total: usize) {}
    /// Called after each item; `position` is 1-based
    fn on_item_complete(&self, _position: usize, _total: usize, _result: &ProcessingResult) {}
    /// Called once after the last item
    fn on_batch_complete(&self, _report: &BatchReport) {}
}

/// No-op progress callback (silent mode)
pub struct SilentProgress;

impl ProgressCallback for SilentProgress {}

/// Result of a batch run
#[derive(Debug)]
pub struct BatchRun {
    pub report: BatchReport,
    /// Cropped images of successful items in batch order; empty unless retained
    pub pages: Vec<DynamicImage>,
}

/// Applies one rectangle to every item of a batch, strictly in order
#[derive(Debug, Clone, Copy)]
pub struct BatchCropper {
    rect: CropRect,
    retain_pages: bool,
}

impl BatchCropper {
    pub fn new(rect: CropRect) -> Self {
        Self {
            rect,
            retain_pages: false,
        }
    }

    /// Keep cropped images in memory for document assembly.
    ///
    /// Peak memory then grows with the batch instead of staying at one image.
    pub fn retain_pages(mut self, retain: bool) -> Self {
        self.retain_pages = retain;
        self
    }

    pub fn rect(&self) -> CropRect {
        self.rect
    }

    /// Crop every item of `batch` and hand it to `sink`
    pub fn run(
        &self,
        batch: &Batch,
        sink: &mut dyn ImageSink,
        progress: &dyn ProgressCallback,
    ) -> BatchRun {
        let total = batch.len();
        info!(total, rect = %self.rect, "Cropping batch");
        progress.on_batch_start(total);

        let mut results = Vec::with_capacity(total);
        let mut pages = Vec::new();

        for (index, input) in batch.iter().enumerate() {
            let status = match self.process_item(input, sink) {
                Ok((output, cropped)) => {
                    let size = cropped.dimensions();
                    if self.retain_pages {
                        pages.push(cropped);
                    }
                    ItemStatus::Succeeded { output, size }
                }
                Err(reason) => {
                    warn!(input = %input.display(), error = %reason, "Item failed");
                    ItemStatus::Failed { reason }
                }
            };

            let result = ProcessingResult {
                index,
                input: input.clone(),
                status,
            };
            progress.on_item_complete(index + 1, total, &result);
            results.push(result);
        }

        let report = BatchReport {
            rect: self.rect,
            results,
        };
        info!(
            attempted = report.attempted(),
            succeeded = report.succeeded(),
            "Batch complete"
        );
        progress.on_batch_complete(&report);

        BatchRun { report, pages }
    }

    fn process_item(
        &self,
        input: &Path,
        sink: &mut dyn ImageSink,
    ) -> Result<(PathBuf, DynamicImage), ItemError> {
        let image = image::open(input).map_err(|e| ItemError::Open(e.to_string()))?;
        let cropped = crop_image(&image, &self.rect)?;
        drop(image);

        let output = sink.write(input, &cropped)?;
        debug!(input = %input.display(), output = %output.display(), "Cropped");
        Ok((output, cropped))
    }
}

/// Crop with `rect` clamped to the image; fails if nothing remains
pub fn crop_image(image: &DynamicImage, rect: &CropRect) -> Result<DynamicImage, ItemError> {
    rect.crop(image).ok_or(ItemError::EmptyCrop {
        rect: *rect,
        width: image.width(),
        height: image.height(),
    })
}
