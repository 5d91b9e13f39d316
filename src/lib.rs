//! Batch Watermark Library
//!
//! Applies a text watermark to a batch of files and packages the results
//! into one zip archive. This library provides functionality to:
//! - Compute watermark placements (center, tile, diagonal)
//! - Draw the watermark onto PNG and JPEG images
//! - Stamp the watermark onto every page of a PDF
//! - Pass DOCX and XLSX files through unchanged
//! - Zip the processed files under `watermarked_<timestamp>.zip`
//!
//! # Example
//!
//! ```no_run
//! use batch_watermark::batch::{Batch, NoopObserver};
//! use batch_watermark::files::load_sources;
//! use batch_watermark::watermark::WatermarkSpec;
//! use batch_watermark::archive::write_archive;
//! use std::path::{Path, PathBuf};
//!
//! let sources = load_sources(&[PathBuf::from("report.pdf")]).expect("no files");
//! let batch = Batch::new(WatermarkSpec::default(), sources).expect("empty batch");
//! let result = batch.run(&mut NoopObserver);
//! write_archive(&result.files, Path::new(".")).expect("Failed to write archive");
//! ```

pub mod archive;
pub mod batch;
pub mod error;
pub mod files;
pub mod font;
pub mod layout;
pub mod pdf;
pub mod raster;
pub mod watermark;

// Re-export commonly used items
pub use batch::{Batch, BatchObserver, BatchResult, FileOutcome, FileStatus};
pub use error::{Error, Result};
pub use watermark::{Color, PlacementMode, WatermarkSpec};
