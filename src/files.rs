//! Source and output file descriptions, naming and eligibility rules

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Suffix inserted before the extension of every output file
pub const OUTPUT_SUFFIX: &str = "watermarked";

/// Kind of input, decided by the final extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Png,
    Jpeg,
    Docx,
    Xlsx,
}

impl FileKind {
    /// Classify a file name by its final extension (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(FileKind::Pdf),
            "png" => Some(FileKind::Png),
            "jpg" | "jpeg" => Some(FileKind::Jpeg),
            "docx" => Some(FileKind::Docx),
            "xlsx" => Some(FileKind::Xlsx),
            _ => None,
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            FileKind::Pdf => "application/pdf",
            FileKind::Png => "image/png",
            FileKind::Jpeg => "image/jpeg",
            FileKind::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            FileKind::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, FileKind::Png | FileKind::Jpeg)
    }

    /// Office documents are copied through without a watermark
    pub fn is_passthrough(&self) -> bool {
        matches!(self, FileKind::Docx | FileKind::Xlsx)
    }
}

/// A file selected by the user
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// File name without any directory part
    pub name: String,
    pub bytes: Vec<u8>,
    pub media_type: &'static str,
}

impl SourceFile {
    /// Build a source from in-memory bytes. Unknown extensions get
    /// `application/octet-stream`.
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let media_type = FileKind::from_name(&name)
            .map(|k| k.media_type())
            .unwrap_or("application/octet-stream");
        Self {
            name,
            bytes,
            media_type,
        }
    }

    /// Read a source from disk, keeping only the file name
    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::General(format!("Not a file: {}", path.display())))?;
        let bytes = fs::read(path)?;
        Ok(Self::new(name, bytes))
    }

    pub fn kind(&self) -> Option<FileKind> {
        FileKind::from_name(&self.name)
    }
}

/// Result of watermarking one source file
#[derive(Debug, Clone)]
pub struct ProcessedFile {
    /// Output name, see [`output_name`]
    pub name: String,
    pub bytes: Vec<u8>,
    pub media_type: &'static str,
    /// True when the bytes are an unmodified copy of the input
    pub passthrough: bool,
}

/// True if the name ends in one of the supported extensions
pub fn is_eligible(name: &str) -> bool {
    FileKind::from_name(name).is_some()
}

/// Insert `_watermarked` before the final extension.
///
/// `report.pdf` becomes `report_watermarked.pdf` and `a.b.png` becomes
/// `a.b_watermarked.png`. A name without a dot just gets the suffix appended.
pub fn output_name(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) => format!("{}_{}.{}", stem, OUTPUT_SUFFIX, ext),
        None => format!("{}_{}", name, OUTPUT_SUFFIX),
    }
}

/// Expand a list of selected paths into the files to consider, in order.
///
/// Directories are walked recursively with their entries sorted by path so
/// a folder selection is stable. Plain files are kept in argument order.
/// Nothing is filtered by extension here; see [`is_eligible`].
pub fn expand_selection(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .follow_links(false)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .collect();
            found.sort();
            files.extend(found);
        } else if path.exists() {
            files.push(path.clone());
        } else {
            return Err(Error::FileNotFound(path.clone()));
        }
    }

    Ok(files)
}

/// Read every eligible file from a selection.
///
/// Ineligible files are skipped silently. An empty eligible set is an
/// error; the batch must not start.
pub fn load_sources(paths: &[PathBuf]) -> Result<Vec<SourceFile>> {
    let candidates = expand_selection(paths)?;

    let mut sources = Vec::new();
    for path in candidates {
        let eligible = path
            .file_name()
            .map(|n| is_eligible(&n.to_string_lossy()))
            .unwrap_or(false);
        if !eligible {
            tracing::debug!(path = %path.display(), "skipping unsupported file");
            continue;
        }
        sources.push(SourceFile::read(&path)?);
    }

    if sources.is_empty() {
        return Err(Error::NoEligibleFiles);
    }

    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_output_name_simple() {
        assert_eq!(output_name("report.pdf"), "report_watermarked.pdf");
        assert_eq!(output_name("photo.JPG"), "photo_watermarked.JPG");
    }

    #[test]
    fn test_output_name_multiple_dots() {
        assert_eq!(output_name("a.b.png"), "a.b_watermarked.png");
        assert_eq!(output_name("archive.tar.gz"), "archive.tar_watermarked.gz");
    }

    #[test]
    fn test_output_name_edge_cases() {
        assert_eq!(output_name(".png"), "_watermarked.png");
        assert_eq!(output_name("README"), "README_watermarked");
    }

    #[test]
    fn test_file_kind_case_insensitive() {
        assert_eq!(FileKind::from_name("X.PDF"), Some(FileKind::Pdf));
        assert_eq!(FileKind::from_name("x.Jpeg"), Some(FileKind::Jpeg));
        assert_eq!(FileKind::from_name("x.jpg"), Some(FileKind::Jpeg));
        assert_eq!(FileKind::from_name("x.docx"), Some(FileKind::Docx));
        assert_eq!(FileKind::from_name("x.XLSX"), Some(FileKind::Xlsx));
        assert_eq!(FileKind::from_name("x.gif"), None);
        assert_eq!(FileKind::from_name("pdf"), None);
    }

    #[test]
    fn test_is_eligible() {
        assert!(is_eligible("scan.png"));
        assert!(!is_eligible("notes.txt"));
        assert!(!is_eligible("pdf.pdf.bak"));
    }

    #[test]
    fn test_media_types() {
        assert_eq!(SourceFile::new("a.png", vec![]).media_type, "image/png");
        assert_eq!(SourceFile::new("a.jpeg", vec![]).media_type, "image/jpeg");
        assert_eq!(SourceFile::new("a.bin", vec![]).media_type, "application/octet-stream");
    }

    #[test]
    fn test_load_sources_filters_and_orders() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.pdf"), b"%PDF").unwrap();
        fs::write(dir.path().join("a.png"), b"png").unwrap();
        fs::write(dir.path().join("notes.txt"), b"skip").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/c.DOCX"), b"doc").unwrap();

        let sources = load_sources(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<&str> = sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "b.pdf", "c.DOCX"]);
    }

    #[test]
    fn test_load_sources_keeps_argument_order() {
        let dir = TempDir::new().unwrap();
        let z = dir.path().join("z.pdf");
        let a = dir.path().join("a.pdf");
        fs::write(&z, b"z").unwrap();
        fs::write(&a, b"a").unwrap();

        let sources = load_sources(&[z, a]).unwrap();
        assert_eq!(sources[0].name, "z.pdf");
        assert_eq!(sources[1].name, "a.pdf");
    }

    #[test]
    fn test_load_sources_rejects_empty_selection() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let result = load_sources(&[dir.path().to_path_buf()]);
        assert!(matches!(result, Err(Error::NoEligibleFiles)));

        let result = load_sources(&[]);
        assert!(matches!(result, Err(Error::NoEligibleFiles)));
    }

    #[test]
    fn test_load_sources_missing_path() {
        let result = load_sources(&[PathBuf::from("does/not/exist.pdf")]);
        assert!(matches!(result, Err(Error::FileNotFound(_))));
    }
}
