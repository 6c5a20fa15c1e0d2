//! idcapture CLI
//!
//! Runs the student ID capture pipeline on local files, without the HTTP
//! service. Handy for checking how a batch of card photos or OCR dumps will
//! be read before pointing clients at the server.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use core_pipeline::{
    CapturePipeline, CaptureResponse, IdExtractor, Roster, RosterUpdate, StandardImageDecoder,
    TesseractConfig, TesseractRecognizer,
};
use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

#[allow(dead_code)]
mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ncommit: ",
    env!("BUILT_GIT_COMMIT_HASH"),
    "\nbuilt: ",
    env!("BUILT_TIME_UTC"),
);

/// Extensions treated as card photos when scanning a directory
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff", "webp", "gif"];

#[derive(Parser)]
#[command(name = "idcapture")]
#[command(about = "Read name and student number from student ID cards", long_about = None)]
#[command(version, long_version = LONG_VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run OCR and extraction on a card photo or a directory of photos
    Scan {
        /// Input image file or directory
        #[arg(short, long)]
        input: PathBuf,

        /// Tesseract tessdata directory
        #[arg(long, env = "IDCAPTURE_TESSDATA")]
        tessdata_dir: Option<PathBuf>,

        /// Tesseract language code
        #[arg(long, env = "IDCAPTURE_LANG", default_value = "eng")]
        language: String,

        /// Additional words to strip before matching (comma separated)
        #[arg(long = "extra-keyword", value_delimiter = ',')]
        extra_keywords: Vec<String>,

        /// Write the binarized image (single file input only)
        #[arg(long)]
        save_preprocessed: Option<PathBuf>,

        /// Print the raw OCR text to stderr
        #[arg(long)]
        show_text: bool,

        /// Add identified students to this roster CSV (created if missing)
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Program recorded for students added to the roster
        #[arg(long, default_value = "", requires = "csv")]
        program: String,
    },

    /// Run only the name/number extraction on OCR text
    Extract {
        /// Text file; reads stdin when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Additional words to strip before matching (comma separated)
        #[arg(long = "extra-keyword", value_delimiter = ',')]
        extra_keywords: Vec<String>,
    },
}

/// One line of `scan` output
#[derive(Debug, Serialize)]
struct ScanRecord {
    file: PathBuf,
    #[serde(flatten)]
    result: CaptureResponse,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();
    tracing::debug!(
        rustc = built_info::RUSTC_VERSION,
        target = built_info::TARGET,
        "idcapture {}",
        built_info::PKG_VERSION
    );

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            input,
            tessdata_dir,
            language,
            extra_keywords,
            save_preprocessed,
            show_text,
            csv,
            program,
        } => {
            let extractor = IdExtractor::with_extra_keywords(&extra_keywords)
                .context("invalid extra keyword")?;
            let recognizer = TesseractRecognizer::new(TesseractConfig {
                tessdata_dir,
                language,
            });
            recognizer.check_available()?;
            let pipeline = CapturePipeline::new(Arc::new(StandardImageDecoder), Arc::new(recognizer))
                .with_extractor(extractor);

            let files = collect_images(&input)?;
            if save_preprocessed.is_some() && files.len() != 1 {
                anyhow::bail!("--save-preprocessed needs a single input image");
            }

            let mut roster = match &csv {
                Some(path) => Some(load_roster(path)?),
                None => None,
            };

            for file in files {
                let record = scan_file(&pipeline, &file, save_preprocessed.as_deref(), show_text)?;
                if let Some(roster) = roster.as_mut() {
                    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
                    add_to_roster(roster, &record, &program, &timestamp);
                }
                println!("{}", serde_json::to_string(&record)?);
            }

            if let (Some(path), Some(roster)) = (&csv, &roster) {
                save_roster(roster, path)?;
                tracing::info!("Wrote {} students to {}", roster.len(), path.display());
            }
            Ok(())
        }
        Commands::Extract {
            input,
            extra_keywords,
        } => {
            let extractor = IdExtractor::with_extra_keywords(&extra_keywords)
                .context("invalid extra keyword")?;
            let text = read_text(input.as_deref())?;
            let result = CaptureResponse::from(extractor.extract(&text));
            println!("{}", serde_json::to_string(&result)?);
            Ok(())
        }
    }
}

fn scan_file(
    pipeline: &CapturePipeline,
    file: &Path,
    save_preprocessed: Option<&Path>,
    show_text: bool,
) -> Result<ScanRecord> {
    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let trace = match pipeline.trace_bytes(&bytes) {
        Ok(trace) => trace,
        Err(err) if err.is_decode_failure() => {
            tracing::warn!("Skipping {}: {}", file.display(), err);
            return Ok(ScanRecord {
                file: file.to_path_buf(),
                result: CaptureResponse::undecodable(),
            });
        }
        Err(err) => return Err(err).with_context(|| format!("Failed to process {}", file.display())),
    };

    if let Some(path) = save_preprocessed {
        trace
            .binarized
            .save(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!("Wrote preprocessed image to {}", path.display());
    }
    if show_text {
        eprintln!("--- {} ---\n{}", file.display(), trace.text);
    }

    Ok(ScanRecord {
        file: file.to_path_buf(),
        result: CaptureResponse::from(trace.identity),
    })
}

/// Record an identified card; unidentified files leave the roster alone
fn add_to_roster(
    roster: &mut Roster,
    record: &ScanRecord,
    program: &str,
    timestamp: &str,
) -> Option<RosterUpdate> {
    let identity = record.result.identity()?;
    let update = roster.record(identity, program, timestamp);
    match update {
        RosterUpdate::Added => tracing::info!("Added {} to the roster", record.file.display()),
        RosterUpdate::Updated => tracing::info!(
            "Updated the roster entry for the student number read from {}",
            record.file.display()
        ),
        RosterUpdate::AlreadyExists => tracing::warn!(
            "{}: This record already exists in the list.",
            record.file.display()
        ),
    }
    Some(update)
}

/// An existing roster CSV, or an empty roster when the file is absent
fn load_roster(path: &Path) -> Result<Roster> {
    if !path.exists() {
        return Ok(Roster::new());
    }
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Roster::read_csv(file).with_context(|| format!("Failed to read roster {}", path.display()))
}

fn save_roster(roster: &Roster, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    roster
        .write_csv(file)
        .with_context(|| format!("Failed to write roster {}", path.display()))
}

/// A single file as-is, or every image under a directory in sorted order
fn collect_images(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        anyhow::bail!("{} is not a file or directory", input.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(input).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", input.display()))?;
        if entry.file_type().is_file() && has_image_extension(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn read_text(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read stdin")?;
            Ok(text)
        }
    }
}
