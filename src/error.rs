//! Error types for the batch watermark library

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the batch watermark library
#[derive(Error, Debug)]
pub enum Error {
    /// Nothing in the selection had a supported extension
    #[error("No supported files found (PDF, DOCX, XLSX, PNG, JPG)")]
    NoEligibleFiles,

    /// PDF processing error
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// Image decode/encode error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Zip packaging error
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Invalid glob pattern
    #[error("Invalid glob pattern: {0}")]
    InvalidGlob(String),

    /// Invalid PDF (no pages)
    #[error("PDF has no pages: {0}")]
    EmptyPdf(String),

    /// Extension not handled by any processor
    #[error("Unsupported file type: {0}")]
    UnsupportedFile(String),

    /// Colour string could not be parsed
    #[error("Invalid color: {0}")]
    InvalidColor(String),

    /// Unknown placement mode name
    #[error("Invalid placement mode: {0}")]
    InvalidPlacement(String),

    /// Font error
    #[error("Font error: {0}")]
    Font(String),

    /// General error
    #[error("{0}")]
    General(String),
}
