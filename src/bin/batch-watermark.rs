//! Batch Watermark CLI tool
//!
//! A command-line tool for watermarking images and PDFs in bulk and zipping
//! the results.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use glob::glob;
use std::path::{Path, PathBuf};
use std::process;

use batch_watermark::archive::write_archive;
use batch_watermark::batch::{Batch, BatchObserver, FileStatus};
use batch_watermark::files::{load_sources, output_name, FileKind};
use batch_watermark::font::resolve_font;
use batch_watermark::layout::{placement_instructions, PageSize, PDF_BASE_FONT_SIZE};
use batch_watermark::watermark::{
    opacity_from_percent, parse_hex_color, PlacementMode, WatermarkSpec, DEFAULT_OPACITY_PERCENT,
    DEFAULT_TEXT,
};

/// Batch Watermark - Stamp text onto images and PDFs, then zip them
#[derive(Parser)]
#[command(name = "batch-watermark")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Watermark every supported file in a folder
    batch-watermark run scans/ -o out --text \"CONFIDENTIAL\"

    # Tile a red watermark over photos
    batch-watermark run \"*.jpg\" --position tile --color \"#ff0000\" --opacity 50

    # Use a specific font for CJK text
    batch-watermark run report.pdf --text \"机密\" --font /path/to/NotoSansCJK.ttf

    # Preview the placements for an A4 page
    batch-watermark plan --width 595 --height 842 --position diagonal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watermark files and package them into a zip archive
    Run {
        /// Input files or directories (in order). Supports glob patterns like "*.pdf"
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Directory the archive is written to
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// Watermark text
        #[arg(long, default_value = DEFAULT_TEXT)]
        text: String,

        /// Text colour as #RRGGBB or #RGB
        #[arg(long, default_value = "#999999")]
        color: String,

        /// Opacity in percent (0-100)
        #[arg(long, default_value_t = DEFAULT_OPACITY_PERCENT)]
        opacity: u32,

        /// Placement: center, tile or diagonal
        #[arg(long, default_value = "center")]
        position: String,

        /// Font size for centered text (default: 48pt for PDFs, width/20 for images)
        #[arg(long)]
        font_size: Option<f32>,

        /// TrueType/OpenType font file (default: search well-known system fonts)
        #[arg(long)]
        font: Option<PathBuf>,

        /// Open the archive after creation
        #[arg(long)]
        open: bool,
    },

    /// Print the draw instructions for a page size
    Plan {
        /// Page or image width
        #[arg(long)]
        width: f32,

        /// Page or image height
        #[arg(long)]
        height: f32,

        /// Placement: center, tile or diagonal
        #[arg(long, default_value = "center")]
        position: String,

        /// Font size for centered text
        #[arg(long, default_value_t = PDF_BASE_FONT_SIZE)]
        font_size: f32,
    },

    /// Show information about an input file
    Info {
        /// File to inspect
        input: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            inputs, output_dir, text, color, opacity, position, font_size, font, open,
        } => {
            cmd_run(
                inputs, output_dir, text, color, opacity, position, font_size, font, open,
            )
        }
        Commands::Plan { width, height, position, font_size } => {
            cmd_plan(width, height, position, font_size)
        }
        Commands::Info { input } => cmd_info(input),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// Expand glob patterns in input paths.
///
/// Matches of one pattern are sorted; arguments keep their order.
fn expand_globs(patterns: Vec<String>) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    for pattern in patterns {
        // Existing paths are literal even if they contain glob characters
        let is_pattern = pattern.contains('*') || pattern.contains('?') || pattern.contains('[');
        if is_pattern && !Path::new(&pattern).exists() {
            let mut matched = Vec::new();
            let entries = glob(&pattern)
                .map_err(|e| batch_watermark::Error::InvalidGlob(format!("{}: {}", pattern, e)))?;
            for entry in entries {
                match entry {
                    Ok(path) => matched.push(path),
                    Err(e) => eprintln!("Warning: glob error for {}: {}", pattern, e),
                }
            }
            if matched.is_empty() {
                bail!("No files matched pattern: {}", pattern);
            }
            matched.sort();
            paths.extend(matched);
        } else {
            // Literal path
            paths.push(PathBuf::from(pattern));
        }
    }

    Ok(paths)
}

/// Open a file with the system default application
fn open_file(path: &Path) -> anyhow::Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open")
            .arg(path)
            .spawn()?;
    }
    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open")
            .arg(path)
            .spawn()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", "", &path.display().to_string()])
            .spawn()?;
    }
    Ok(())
}

/// Prints per-file status and progress lines to stderr
struct StderrObserver;

impl BatchObserver for StderrObserver {
    fn file_status(&mut self, _index: usize, name: &str, status: FileStatus) {
        match status {
            FileStatus::Pending => {}
            FileStatus::Processing => eprintln!("  {} ...", name),
            FileStatus::Success => eprintln!("  {}: done", name),
            FileStatus::Failed => eprintln!("  {}: FAILED", name),
        }
    }

    fn progress(&mut self, done: usize, total: usize) {
        let pct = if total == 0 { 100 } else { done * 100 / total };
        eprintln!("Progress: {} / {} ({}%)", done, total, pct);
    }
}

/// Watermark the inputs and write the archive
#[allow(clippy::too_many_arguments)]
fn cmd_run(
    inputs: Vec<String>,
    output_dir: PathBuf,
    text: String,
    color: String,
    opacity: u32,
    position: String,
    font_size: Option<f32>,
    font: Option<PathBuf>,
    open: bool,
) -> anyhow::Result<()> {
    let color = parse_hex_color(&color)?;
    let position: PlacementMode = position.parse()?;
    let spec = WatermarkSpec::new(&text, color, opacity_from_percent(opacity), position)
        .with_font_size(font_size);

    // Expand glob patterns
    let inputs = expand_globs(inputs)?;
    let sources = load_sources(&inputs)?;

    let font = resolve_font(font.as_deref(), &spec.text)?;
    match &font {
        Some(f) if !f.covers(&spec.text) => {
            eprintln!("Warning: font {} cannot draw \"{}\" (use --font)", f.name(), spec.text)
        }
        Some(f) if !f.is_truetype() => {
            eprintln!("Using font: {} (images only; PDFs need a TrueType font)", f.name())
        }
        Some(f) => eprintln!("Using font: {}", f.name()),
        None => eprintln!("Warning: no font found; images will fail (use --font)"),
    }

    eprintln!(
        "Watermarking {} files ({}, {}, {:.0}% opacity)...",
        sources.len(),
        spec.position,
        spec.color,
        spec.opacity * 100.0
    );

    let batch = Batch::new(spec, sources)?.with_font(font);
    let result = batch.run(&mut StderrObserver);

    eprintln!(
        "Processed {} files ({} failed)",
        result.outcomes.len(),
        result.failure_count()
    );
    for outcome in result.outcomes.iter().filter(|o| o.status == FileStatus::Failed) {
        if let Some(err) = &outcome.error {
            eprintln!("  {}: {}", outcome.name, err);
        }
    }
    for file in result.passthrough() {
        eprintln!("Note: {} was copied without a watermark", file.name);
    }

    let archive = write_archive(&result.files, &output_dir)
        .with_context(|| format!("writing archive to {}", output_dir.display()))?;
    eprintln!("Archive: {}", archive.display());

    if open {
        open_file(&archive)?;
    }

    Ok(())
}

/// Print the placements for one page size
fn cmd_plan(width: f32, height: f32, position: String, font_size: f32) -> anyhow::Result<()> {
    let position: PlacementMode = position.parse()?;
    let instructions = placement_instructions(PageSize::new(width, height), position, font_size);

    println!("Placement: {} ({} x {})", position, width, height);
    println!("Instructions: {}", instructions.len());
    for ins in &instructions {
        println!("  x={:.1} y={:.1} size={:.1}", ins.x, ins.y, ins.font_size);
    }

    Ok(())
}

/// Show information about an input file
fn cmd_info(input: PathBuf) -> anyhow::Result<()> {
    if !input.exists() {
        bail!("Input file not found: {}", input.display());
    }

    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let Some(kind) = FileKind::from_name(&name) else {
        bail!("Unsupported file type: {}", input.display());
    };

    println!("File: {}", input.display());
    println!("Type: {}", kind.media_type());
    println!("Output: {}", output_name(&name));

    match kind {
        FileKind::Pdf => {
            let metadata = batch_watermark::pdf::extract_metadata(&input)?;
            println!("Pages: {}", metadata.page_count);
            for (i, size) in metadata.page_sizes.iter().enumerate() {
                println!("  Page {}: {:.1} x {:.1} pt", i + 1, size.width, size.height);
            }
            if let Some(title) = metadata.title {
                println!("Title: {}", title);
            }
            if let Some(author) = metadata.author {
                println!("Author: {}", author);
            }
        }
        FileKind::Png | FileKind::Jpeg => {
            let bytes = std::fs::read(&input)?;
            let image = batch_watermark::raster::decode(&bytes)?;
            println!("Size: {} x {} px", image.width(), image.height());
        }
        FileKind::Docx | FileKind::Xlsx => {
            println!("Note: copied unchanged (no watermark)");
        }
    }

    Ok(())
}
