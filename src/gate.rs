//! Verification Gate module
//!
//! The single blocking checkpoint between choosing a crop rectangle and
//! applying it to the whole batch. The operator sees the reference image
//! cropped with the candidate rectangle and either accepts or aborts.

use crate::bounds::CropRect;
use image::{DynamicImage, GenericImageView};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::{info, warn};

/// Verification gate error types
#[derive(Debug, Error)]
pub enum GateError {
    #[error("Failed to write preview {path}: {reason}")]
    PreviewWrite { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GateError>;

/// Operator decision at the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Proceed with the batch using the rectangle as shown
    Accept,
    /// Stop before any batch item is touched
    Abort,
}

impl GateDecision {
    /// Interpret one line of operator input.
    ///
    /// An empty line accepts; `q`, `quit`, `n`, `no` and `abort` abort.
    pub fn from_response(line: &str) -> Self {
        match line.trim().to_ascii_lowercase().as_str() {
            "q" | "quit" | "n" | "no" | "abort" => GateDecision::Abort,
            _ => GateDecision::Accept,
        }
    }

    pub fn is_accepted(self) -> bool {
        self == GateDecision::Accept
    }
}

/// What the operator is asked to confirm
#[derive(Debug, Clone, Copy)]
pub struct VerifyRequest<'a> {
    /// Reference image cropped with `rect`
    pub preview: &'a DynamicImage,
    /// Candidate rectangle
    pub rect: CropRect,
    /// Path of the reference image
    pub reference: &'a Path,
}

/// Human confirmation checkpoint
pub trait VerificationGate {
    /// Block until the operator accepts or aborts
    fn verify(&mut self, request: &VerifyRequest<'_>) -> Result<GateDecision>;
}

/// Gate for scripted runs where the rectangle is accepted up front
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoAccept;

impl VerificationGate for AutoAccept {
    fn verify(&mut self, request: &VerifyRequest<'_>) -> Result<GateDecision> {
        info!(rect = %request.rect, "Bounds accepted without verification");
        Ok(GateDecision::Accept)
    }
}

/// External program used to show the preview image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ViewerCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append an argument placed before the image path
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Platform image opener
    pub fn system_default() -> Self {
        if cfg!(target_os = "macos") {
            Self::new("open")
        } else if cfg!(target_os = "windows") {
            Self::new("cmd").arg("/C").arg("start").arg("")
        } else {
            Self::new("xdg-open")
        }
    }

    /// Start the viewer without waiting for it
    pub fn launch(&self, image_path: &Path) -> std::io::Result<()> {
        Command::new(&self.program)
            .args(&self.args)
            .arg(image_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(drop)
    }
}

/// Interactive gate: writes the preview, optionally opens it, and waits for
/// one line of input. There is no timeout.
pub struct PromptGate<R, W> {
    input: R,
    output: W,
    preview_path: PathBuf,
    viewer: Option<ViewerCommand>,
}

impl<R: BufRead, W: Write> PromptGate<R, W> {
    /// `preview_path` must carry an image extension the encoder knows (e.g. `.png`)
    pub fn new(input: R, output: W, preview_path: impl Into<PathBuf>) -> Self {
        Self {
            input,
            output,
            preview_path: preview_path.into(),
            viewer: None,
        }
    }

    /// Open the preview in `viewer` before prompting
    pub fn with_viewer(mut self, viewer: ViewerCommand) -> Self {
        self.viewer = Some(viewer);
        self
    }

    pub fn preview_path(&self) -> &Path {
        &self.preview_path
    }

    fn show_preview(&mut self, preview: &DynamicImage) -> Result<()> {
        preview
            .save(&self.preview_path)
            .map_err(|e| GateError::PreviewWrite {
                path: self.preview_path.clone(),
                reason: e.to_string(),
            })?;

        if let Some(viewer) = &self.viewer {
            if let Err(e) = viewer.launch(&self.preview_path) {
                warn!(
                    program = %viewer.program,
                    error = %e,
                    "Could not launch image viewer; open the preview manually"
                );
            }
        }

        Ok(())
    }
}

impl<R: BufRead, W: Write> VerificationGate for PromptGate<R, W> {
    fn verify(&mut self, request: &VerifyRequest<'_>) -> Result<GateDecision> {
        self.show_preview(request.preview)?;

        let (width, height) = request.preview.dimensions();
        writeln!(self.output, "Detected bounds: {}", request.rect)?;
        writeln!(self.output, "Input file: {}", request.reference.display())?;
        writeln!(
            self.output,
            "Preview ({}x{}): {}",
            width,
            height,
            self.preview_path.display()
        )?;
        write!(
            self.output,
            "Using these bounds for all images. Press Enter to continue or 'q' to abort: "
        )?;
        self.output.flush()?;

        let mut line = String::new();
        let decision = match self.input.read_line(&mut line)? {
            // Closed input never counts as consent
            0 => GateDecision::Abort,
            _ => GateDecision::from_response(&line),
        };

        info!(?decision, rect = %request.rect, "Operator responded at verification gate");
        Ok(decision)
    }
}
