//! lnkcarve - Carve Windows Shortcut (.lnk) records out of raw data
//!
//! This tool scans disk images, memory dumps and other bulk data for embedded
//! shell link structures and writes one record per structure found.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, ValueEnum};
use lnkcarve_core::{
    ByteView, LnkRecord, MemorySink, RecordSink, ScanStrategy, ScanSummary, Scanner,
    ScannerConfig, SinkFormat, WriterSink, SMALLEST_LNK_FILE,
};
use memmap2::Mmap;
use rayon::prelude::*;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Carve Windows Shortcut (.lnk) records out of disk images and memory dumps
#[derive(Parser, Debug)]
#[command(name = "lnkcarve")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    input: InputMode,

    /// Output file for carved records (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format
    #[arg(long, value_enum, default_value = "feature")]
    format: OutputFormat,

    /// Bytes per page; each page is scanned independently
    #[arg(long, default_value = "16777216", value_parser = clap::value_parser!(u64).range(1..))]
    page_size: u64,

    /// Bytes after each page that decoding may read but that are not scanned
    #[arg(long, default_value = "1048576")]
    margin: u64,

    /// Maximum number of records to carve per page (0 = unlimited)
    #[arg(long, default_value = "0")]
    max_records: usize,

    /// Log every rejected candidate
    #[arg(long)]
    debug: bool,

    /// Number of worker threads (0 = one per core)
    #[arg(short, long, default_value = "0")]
    jobs: usize,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputMode {
    /// Path to a single image or dump to carve
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Path to a directory of images to carve
    #[arg(short, long)]
    directory: Option<PathBuf>,
}

/// Output format for carved records
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Tab-separated feature file
    Feature,
    /// One JSON object per line
    Jsonl,
}

impl From<OutputFormat> for SinkFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Feature => SinkFormat::FeatureFile,
            OutputFormat::Jsonl => SinkFormat::JsonLines,
        }
    }
}

/// A slice of the input scanned as one unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Page {
    /// Offset of the page in the file
    start: usize,
    /// Bytes whose offsets are scanned
    pagesize: usize,
    /// Bytes readable from `start`, including the margin
    len: usize,
}

/// Splits `total` bytes into pages of `page_size`, each extended by up to `margin` bytes.
///
/// The scanned region of a page runs [`SMALLEST_LNK_FILE`] bytes into its
/// margin where the margin allows, so candidates cover `start..start + page_size`
/// with no gap before the next page.
fn plan_pages(total: usize, page_size: usize, margin: usize) -> Vec<Page> {
    (0..total)
        .step_by(page_size.max(1))
        .map(|start| {
            let remaining = total - start;
            let len = page_size.saturating_add(margin).min(remaining);
            let pagesize = page_size.saturating_add(SMALLEST_LNK_FILE).min(len);
            Page {
                start,
                pagesize,
                len,
            }
        })
        .collect()
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    if cli.jobs > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.jobs)
            .build_global()
            .context("Failed to configure worker threads")?;
    }

    let out: Box<dyn Write + Send> = match &cli.output {
        Some(path) => Box::new(io::BufWriter::new(
            fs::File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?,
        )),
        None => Box::new(io::BufWriter::new(io::stdout())),
    };
    let sink = WriterSink::new(out, cli.format.into()).context("Failed to write output header")?;

    // Dispatch based on input mode
    let summary = if let Some(ref file) = cli.input.file {
        process_single_file(&cli, file, &sink)?
    } else if let Some(ref directory) = cli.input.directory {
        process_directory(&cli, directory, &sink)?
    } else {
        bail!("Either --file or --directory must be specified")
    };

    sink.flush().context("Failed to flush output")?;
    info!(
        "Summary: {} offsets tested, {} candidates, {} records, {} rejected",
        summary.candidate_offsets, summary.candidates, summary.records, summary.failures
    );

    Ok(())
}

/// Process a single image
fn process_single_file(cli: &Cli, file: &Path, sink: &dyn RecordSink) -> Result<ScanSummary> {
    if !file.exists() {
        bail!("Input file does not exist: {}", file.display());
    }
    if !file.is_file() {
        bail!("Input path is not a file: {}", file.display());
    }

    carve_file(cli, file, sink)
}

/// Process a directory of images recursively
fn process_directory<W: Write + Send>(
    cli: &Cli,
    directory: &Path,
    sink: &WriterSink<W>,
) -> Result<ScanSummary> {
    if !directory.exists() {
        bail!("Directory does not exist: {}", directory.display());
    }
    if !directory.is_dir() {
        bail!("Path is not a directory: {}", directory.display());
    }

    info!("Scanning directory: {}", directory.display());

    let mut total = ScanSummary::default();
    let mut files_processed = 0;

    for entry in WalkDir::new(directory)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        // Skip hidden files
        if path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('.'))
            .unwrap_or(false)
        {
            trace!("Skipping hidden file: {}", path.display());
            continue;
        }

        debug!("Processing: {}", path.display());
        sink.set_source(path.display().to_string())
            .context("Failed to write output")?;
        match carve_file(cli, path, sink) {
            Ok(summary) => total.merge(&summary),
            // Log error but continue with other files
            Err(e) => warn!("Error processing {}: {:#}", path.display(), e),
        }
        files_processed += 1;
    }

    info!("Processed {} files", files_processed);
    Ok(total)
}

/// Carve one file and write its records to `sink` in file order
fn carve_file(cli: &Cli, path: &Path, sink: &dyn RecordSink) -> Result<ScanSummary> {
    trace!("Mapping {}", path.display());
    let file = fs::File::open(path)
        .with_context(|| format!("Failed to open input file: {}", path.display()))?;
    let len = file
        .metadata()
        .with_context(|| format!("Failed to stat input file: {}", path.display()))?
        .len();
    if len == 0 {
        trace!("Skipping empty file: {}", path.display());
        return Ok(ScanSummary::default());
    }

    // SAFETY: the input is treated as read-only evidence for the duration of the scan.
    let map = unsafe { Mmap::map(&file) }
        .with_context(|| format!("Failed to map input file: {}", path.display()))?;
    trace!("Mapped {} bytes from {}", map.len(), path.display());

    let (summary, records) = carve_bytes(cli, &map)
        .with_context(|| format!("Failed to scan: {}", path.display()))?;

    for record in &records {
        sink.write(record).context("Failed to write record")?;
    }

    debug!("Carved {} record(s) from {}", records.len(), path.display());
    Ok(summary)
}

/// Scan all pages of `data` in parallel, returning records ordered by position
fn carve_bytes(cli: &Cli, data: &[u8]) -> Result<(ScanSummary, Vec<LnkRecord>)> {
    let page_size = usize::try_from(cli.page_size).context("Page size too large")?;
    let margin = usize::try_from(cli.margin).context("Margin too large")?;

    let config = ScannerConfig::new()
        .debug(cli.debug)
        .max_records(cli.max_records);
    let scanner = Scanner::with_config(config);

    let pages = plan_pages(data.len(), page_size, margin);
    let results: Vec<(ScanSummary, Vec<LnkRecord>)> = pages
        .par_iter()
        .map(|page| -> lnkcarve_core::Result<(ScanSummary, Vec<LnkRecord>)> {
            let view = ByteView::with_margin(
                &data[page.start..page.start + page.len],
                page.start as u64,
                page.pagesize,
            )?;
            let page_sink = MemorySink::new();
            let summary = scanner.scan(&view, &page_sink)?;
            Ok((summary, page_sink.into_records()))
        })
        .collect::<lnkcarve_core::Result<_>>()
        .context("Page scan failed")?;

    let mut total = ScanSummary::default();
    let mut records = Vec::new();
    for (summary, page_records) in results {
        total.merge(&summary);
        records.extend(page_records);
    }
    Ok((total, records))
}
