//! Document Assembly module
//!
//! Builds one multi-page PDF from cropped page images, one image per page, in
//! the order given.
//!
//! # Example
//!
//! ```rust,no_run
//! use pagecrop::{PdfAssembler, PdfAssemblerOptions};
//!
//! let options = PdfAssemblerOptions::builder().dpi(200).title("Scanned book").build();
//! let pages = vec![image::open("cropped_001.png").unwrap()];
//! PdfAssembler::new(options)
//!     .write(&pages, std::path::Path::new("book.pdf"))
//!     .unwrap();
//! ```

use crate::batch::Batch;
use crate::util::display_name;
use image::DynamicImage;
use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, RawImageData,
    RawImageFormat, XObjectTransform,
};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default resolution used to turn pixels into page size
pub const DEFAULT_DPI: u32 = 300;

/// Default document title
pub const DEFAULT_TITLE: &str = "Cropped Pages";

/// Document assembly error types
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("No pages to assemble")]
    NoPages,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AssemblyError>;

/// PDF assembly options
#[derive(Debug, Clone, PartialEq)]
pub struct PdfAssemblerOptions {
    /// Pixels per inch; a page is as large as its image at this resolution
    pub dpi: u32,
    /// Title stored in the document metadata
    pub title: String,
}

impl Default for PdfAssemblerOptions {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            title: DEFAULT_TITLE.to_string(),
        }
    }
}

impl PdfAssemblerOptions {
    /// Create a new options builder
    pub fn builder() -> PdfAssemblerOptionsBuilder {
        PdfAssemblerOptionsBuilder::default()
    }
}

/// Builder for PdfAssemblerOptions
#[derive(Debug, Default)]
pub struct PdfAssemblerOptionsBuilder {
    options: PdfAssemblerOptions,
}

impl PdfAssemblerOptionsBuilder {
    /// Set DPI (at least 1)
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.options.dpi = dpi.max(1);
        self
    }

    /// Set title
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.options.title = title.into();
        self
    }

    /// Build the options
    pub fn build(self) -> PdfAssemblerOptions {
        self.options
    }
}

/// Result of assembling a directory of images
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombineReport {
    pub output: PathBuf,
    pub pages: usize,
    /// Files that could not be decoded, with the reason
    pub skipped: Vec<(PathBuf, String)>,
}

/// printpdf-based document assembler
#[derive(Debug, Clone, Default)]
pub struct PdfAssembler {
    options: PdfAssemblerOptions,
}

impl PdfAssembler {
    pub fn new(options: PdfAssemblerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PdfAssemblerOptions {
        &self.options
    }

    /// Serialize `pages` into a PDF, one page per image
    pub fn assemble(&self, pages: &[DynamicImage]) -> Result<Vec<u8>> {
        if pages.is_empty() {
            return Err(AssemblyError::NoPages);
        }

        let dpi = self.options.dpi.max(1) as f32;
        let mut doc = PdfDocument::new(&self.options.title);
        let mut pdf_pages = Vec::with_capacity(pages.len());

        for image in pages {
            let (width_px, height_px) = (image.width(), image.height());
            let raw = RawImage {
                pixels: RawImageData::U8(image.to_rgb8().into_raw()),
                width: width_px as usize,
                height: height_px as usize,
                data_format: RawImageFormat::RGB8,
                tag: Vec::new(),
            };
            let xobject_id = doc.add_image(&raw);

            let ops = vec![Op::UseXobject {
                id: xobject_id,
                transform: XObjectTransform {
                    translate_x: Some(Pt(0.0)),
                    translate_y: Some(Pt(0.0)),
                    rotate: None,
                    scale_x: Some(1.0),
                    scale_y: Some(1.0),
                    dpi: Some(dpi),
                },
            }];

            pdf_pages.push(PdfPage::new(
                pixels_to_mm(width_px, dpi),
                pixels_to_mm(height_px, dpi),
                ops,
            ));
        }

        doc.with_pages(pdf_pages);

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let bytes = doc.save(&PdfSaveOptions::default(), &mut warnings);
        if !warnings.is_empty() {
            debug!(count = warnings.len(), "PDF serialisation produced warnings");
        }

        Ok(bytes)
    }

    /// Assemble `pages` and write the document to `output`
    pub fn write(&self, pages: &[DynamicImage], output: &Path) -> Result<()> {
        let bytes = self.assemble(pages)?;
        std::fs::write(output, &bytes)?;
        info!(
            pages = pages.len(),
            bytes = bytes.len(),
            "Wrote PDF to {}",
            output.display()
        );
        Ok(())
    }

    /// Decode every image of `batch` in order and write them as one PDF.
    ///
    /// Files that fail to decode are skipped and listed in the report.
    pub fn combine(&self, batch: &Batch, output: &Path) -> Result<CombineReport> {
        let mut pages = Vec::with_capacity(batch.len());
        let mut skipped = Vec::new();

        for path in batch {
            match image::open(path) {
                Ok(image) => pages.push(image),
                Err(e) => {
                    warn!(file = %display_name(path), error = %e, "Skipping unreadable image");
                    skipped.push((path.clone(), e.to_string()));
                }
            }
        }

        self.write(&pages, output)?;

        Ok(CombineReport {
            output: output.to_path_buf(),
            pages: pages.len(),
            skipped,
        })
    }
}

/// Convert a pixel length to millimetres at `dpi`
fn pixels_to_mm(pixels: u32, dpi: f32) -> Mm {
    Mm(pixels as f32 / dpi * 25.4)
}
