//! pagecrop - crop batches of page screenshots to their content bounds
//!
//! CLI entry point

use clap::Parser;
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

use pagecrop::util::{display_name, format_duration, format_file_size, percentage};
use pagecrop::{
    create_progress_bar, create_spinner, AutoAccept, Batch, BatchReport, BoundsOptions, Cli,
    CliOverrides, CombineArgs, Commands, Config, ContentBoundsDetector, CropArgs, CropPipeline,
    DetectArgs, DocumentOutcome, ExitCode, PdfAssembler, PdfAssemblerOptions, PipelineConfig,
    ProcessingResult, ProgressCallback, PromptGate, RunOutcome, RunSummary, VerificationGate,
    ViewerCommand,
};

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbosity());

    let result = match &cli.command {
        Commands::Crop(args) => run_crop(args, cli.quiet),
        Commands::Detect(args) => run_detect(args),
        Commands::Combine(args) => run_combine(args, cli.quiet),
        Commands::Info => run_info(),
    };

    let code = match result {
        Ok(()) => ExitCode::Success,
        Err(failure) => {
            if let Some(message) = &failure.message {
                eprintln!("Error: {}", message);
            }
            failure.code
        }
    };
    code.into()
}

/// Log to stderr; `RUST_LOG` takes precedence over `-v`
fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// A failed command: exit code plus the message to print, if any
struct Failure {
    code: ExitCode,
    message: Option<String>,
}

impl Failure {
    fn new(code: ExitCode, message: impl std::fmt::Display) -> Self {
        Self {
            code,
            message: Some(message.to_string()),
        }
    }

    fn silent(code: ExitCode) -> Self {
        Self {
            code,
            message: None,
        }
    }
}

impl From<pagecrop::PipelineError> for Failure {
    fn from(err: pagecrop::PipelineError) -> Self {
        Self::new(ExitCode::from(&err), err)
    }
}

type CommandResult = Result<(), Failure>;

// ============ Progress Callback Implementation ============

/// Progress bar plus one line per item
struct CliProgress {
    quiet: bool,
    bar: OnceLock<ProgressBar>,
}

impl CliProgress {
    fn new(quiet: bool) -> Self {
        Self {
            quiet,
            bar: OnceLock::new(),
        }
    }
}

impl ProgressCallback for CliProgress {
    fn on_batch_start(&self, total: usize) {
        self.bar.get_or_init(|| {
            if self.quiet {
                ProgressBar::hidden()
            } else {
                create_progress_bar(total as u64)
            }
        });
    }

    fn on_item_complete(&self, position: usize, total: usize, result: &ProcessingResult) {
        let Some(bar) = self.bar.get() else {
            return;
        };
        if !self.quiet {
            let line = match result.error() {
                None => format!(
                    "[{}/{}] Successfully processed: {}",
                    position,
                    total,
                    result.name()
                ),
                Some(reason) => format!(
                    "[{}/{}] Error processing {}: {}",
                    position,
                    total,
                    result.name(),
                    reason
                ),
            };
            if bar.is_hidden() {
                println!("{}", line);
            } else {
                bar.println(line);
            }
        }
        bar.inc(1);
    }

    fn on_batch_complete(&self, _report: &BatchReport) {
        if let Some(bar) = self.bar.get() {
            bar.finish_and_clear();
        }
    }
}

// ============ Crop Command ============

/// Temporary preview image, removed once the command returns
struct PreviewFile(PathBuf);

impl PreviewFile {
    fn new() -> Self {
        Self(std::env::temp_dir().join(format!("pagecrop-preview-{}.png", std::process::id())))
    }

    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for PreviewFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.0) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::debug!(path = %self.0.display(), error = %e, "Could not remove preview");
            }
        }
    }
}

fn run_crop(args: &CropArgs, quiet: bool) -> CommandResult {
    let file_config = load_config(args.config.as_deref())?;
    let overrides = create_cli_overrides(args)?;
    let config = file_config.merge_with_cli(&overrides);
    let pipeline = CropPipeline::new(config);

    if args.dry_run {
        pipeline.config().validate()?;
        let batch = pipeline.discover()?;
        print_execution_plan(pipeline.config(), &batch);
        return Ok(());
    }

    let preview = PreviewFile::new();
    let mut gate: Box<dyn VerificationGate> = if pipeline.config().verify {
        let prompt = PromptGate::new(
            std::io::stdin().lock(),
            std::io::stdout(),
            preview.path().to_path_buf(),
        );
        if args.no_preview {
            Box::new(prompt)
        } else {
            Box::new(prompt.with_viewer(ViewerCommand::system_default()))
        }
    } else {
        Box::new(AutoAccept)
    };

    let progress = CliProgress::new(quiet);
    match pipeline.run(gate.as_mut(), &progress)? {
        RunOutcome::Aborted { .. } => {
            println!("Aborted by user.");
            Err(Failure::silent(ExitCode::Aborted))
        }
        RunOutcome::Completed(summary) => {
            if let Some(path) = &args.report {
                write_report(&summary.report, path)?;
            }
            print_summary(&summary, quiet);
            Ok(())
        }
    }
}

/// Failures and warnings go to stderr even when `quiet`
fn print_summary(summary: &RunSummary, quiet: bool) {
    if let Some(DocumentOutcome::Failed(e)) = &summary.document {
        eprintln!("Warning: combined PDF not written: {}", e);
    }
    if quiet {
        return;
    }

    let report = &summary.report;
    println!();
    println!("Bounds: {}", summary.rect);
    println!(
        "Processed {} of {} images ({:.1}%) in {}",
        report.succeeded(),
        report.attempted(),
        percentage(report.succeeded(), report.attempted()),
        format_duration(summary.elapsed)
    );
    for failed in report.failures() {
        if let Some(reason) = failed.error() {
            println!("  Failed: {} ({})", failed.name(), reason);
        }
    }

    if let Some(DocumentOutcome::Written { path, pages }) = &summary.document {
        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        println!(
            "Combined PDF created: {} ({} pages, {})",
            path.display(),
            pages,
            format_file_size(size)
        );
    }
}

fn write_report(report: &BatchReport, path: &Path) -> CommandResult {
    let json = report
        .to_json()
        .map_err(|e| Failure::new(ExitCode::GeneralError, e))?;
    std::fs::write(path, json).map_err(|e| {
        Failure::new(
            ExitCode::OutputError,
            format!("failed to write report {}: {}", path.display(), e),
        )
    })
}

// ============ Helper Functions ============

/// Explicit `--config` must exist; otherwise the search path is used
fn load_config(path: Option<&Path>) -> Result<Config, Failure> {
    match path {
        Some(path) => {
            Config::load_from_path(path).map_err(|e| Failure::new(ExitCode::InvalidArgs, e))
        }
        None => Config::load().map_err(|e| Failure::new(ExitCode::InvalidArgs, e)),
    }
}

/// Only options the user actually passed override the config file
fn create_cli_overrides(args: &CropArgs) -> Result<CliOverrides, Failure> {
    let override_rect = args
        .override_rect()
        .map_err(|e| Failure::new(ExitCode::InvalidArgs, e))?;

    Ok(CliOverrides {
        input_dir: args.input.clone(),
        output_dir: args.output.clone(),
        threshold: args.threshold,
        padding: args.padding,
        override_rect,
        reference_index: args.reference,
        verify: args.yes.then_some(false),
        limit: args.limit.map(|n| n as usize),
        assemble_document: args.pdf.then_some(true),
        extensions: (!args.extensions.is_empty()).then(|| args.extensions.clone()),
        dpi: args.dpi,
    })
}

/// Print execution plan for dry-run mode
fn print_execution_plan(config: &PipelineConfig, batch: &Batch) {
    let to_process = config.limit.map_or(batch.len(), |n| n.min(batch.len()));

    println!("=== Dry Run - Execution Plan ===");
    println!();
    println!("Input: {}", config.input_dir.display());
    println!("Output: {}", config.output_dir.display());
    println!("Extensions: {}", config.extensions.join(", "));
    println!("Images found: {}", batch.len());
    println!("Images to process: {}", to_process);
    println!();
    println!("Steps:");
    match config.override_rect {
        Some(rect) => println!("  1. Bounds: {} (manual)", rect),
        None => println!(
            "  1. Bounds: detect on image #{} (threshold {}, padding {})",
            config.reference_index, config.threshold, config.padding
        ),
    }
    match batch.get(config.reference_index) {
        Some(reference) => println!("     Reference: {}", display_name(reference)),
        None => println!(
            "     Reference: index {} is out of range ({} images)",
            config.reference_index,
            batch.len()
        ),
    }
    if config.verify {
        println!("  2. Verification: prompt before cropping");
    } else {
        println!("  2. Verification: SKIPPED");
    }
    println!("  3. Crop and write {}<name>", config.output_prefix);
    if config.assemble_document {
        println!(
            "  4. Combined PDF: {} ({} DPI)",
            config.document_path().display(),
            config.dpi
        );
    } else {
        println!("  4. Combined PDF: DISABLED");
    }
    println!();
    println!("Files:");
    for (i, file) in batch.iter().take(to_process).enumerate() {
        println!("  {}. {}", i + 1, display_name(file));
    }
}

// ============ Detect Command ============

fn run_detect(args: &DetectArgs) -> CommandResult {
    let options = BoundsOptions::builder()
        .threshold(args.threshold)
        .padding(args.padding)
        .build();

    let rect = ContentBoundsDetector::detect_path(&args.image, &options).map_err(|e| {
        let code = match e {
            pagecrop::BoundsError::ImageNotFound(_) => ExitCode::InputNotFound,
            pagecrop::BoundsError::NoContentDetected => ExitCode::DetectionFailed,
            _ => ExitCode::ProcessingError,
        };
        Failure::new(code, format!("{}: {}", args.image.display(), e))
    })?;

    println!("{}", rect);
    println!(
        "--bounds {} {} {} {}  ({}x{})",
        rect.left,
        rect.top,
        rect.right,
        rect.bottom,
        rect.width(),
        rect.height()
    );
    Ok(())
}

// ============ Combine Command ============

fn run_combine(args: &CombineArgs, quiet: bool) -> CommandResult {
    let extensions: Vec<String> = if args.extensions.is_empty() {
        pagecrop::DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
    } else {
        args.extensions.clone()
    };

    let batch = Batch::from_dir(&args.input, &extensions)
        .map_err(|e| Failure::new(ExitCode::InputNotFound, e))?;

    let spinner = if quiet {
        ProgressBar::hidden()
    } else {
        create_spinner(&format!("Combining {} images...", batch.len()))
    };

    let assembler = PdfAssembler::new(PdfAssemblerOptions::builder().dpi(args.dpi).build());
    let result = assembler.combine(&batch, &args.output);
    spinner.finish_and_clear();

    let report = result.map_err(|e| {
        let code = match e {
            pagecrop::AssemblyError::NoPages => ExitCode::ProcessingError,
            pagecrop::AssemblyError::IoError(_) => ExitCode::OutputError,
        };
        Failure::new(code, e)
    })?;

    for (path, reason) in &report.skipped {
        eprintln!("Skipped {}: {}", display_name(path), reason);
    }
    if !quiet {
        println!(
            "Combined PDF created: {} ({} pages)",
            report.output.display(),
            report.pages
        );
    }
    Ok(())
}

// ============ Info Command ============

fn run_info() -> CommandResult {
    let defaults = PipelineConfig::default();

    println!("pagecrop v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("System Information:");
    println!("  Platform: {}", std::env::consts::OS);
    println!("  Arch: {}", std::env::consts::ARCH);
    println!("  Image viewer: {}", ViewerCommand::system_default().program);
    println!();

    println!("Defaults:");
    println!("  Input directory: {}", defaults.input_dir.display());
    println!("  Output directory: {}", defaults.output_dir.display());
    println!("  Extensions: {}", defaults.extensions.join(", "));
    println!("  Threshold: {}", defaults.threshold);
    println!("  Padding: {}", defaults.padding);
    println!("  Output prefix: {}", defaults.output_prefix);
    println!("  PDF name: {}", defaults.document_name);
    println!("  PDF DPI: {}", defaults.dpi);
    println!();

    println!("Config Files (first found wins):");
    for path in Config::search_paths() {
        let status = if path.exists() { "found" } else { "not found" };
        println!("  {} ({})", path.display(), status);
    }

    Ok(())
}
