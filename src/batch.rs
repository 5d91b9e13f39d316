//! Batch orchestration
//!
//! A [`Batch`] owns everything one run needs: the watermark settings, the
//! selected sources, the font and the placement policy. Files are processed
//! one at a time in selection order. A file that fails is reported through the
//! [`BatchObserver`] and the loop moves on to the next one.

use std::fmt;

use crate::error::{Error, Result};
use crate::files::{output_name, FileKind, ProcessedFile, SourceFile};
use crate::font::WatermarkFont;
use crate::layout::PlacementPolicy;
use crate::pdf;
use crate::raster;
use crate::watermark::WatermarkSpec;

/// Per-file processing state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Pending,
    Processing,
    Success,
    Failed,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Pending => "pending",
            FileStatus::Processing => "processing",
            FileStatus::Success => "success",
            FileStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final status of one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    /// Source file name
    pub name: String,
    pub status: FileStatus,
    /// Error message for failed files
    pub error: Option<String>,
}

/// Receives status changes while a batch runs
pub trait BatchObserver {
    /// Called with `Pending` for every file before work starts, then with
    /// `Processing` and a final `Success` or `Failed` per file
    fn file_status(&mut self, index: usize, name: &str, status: FileStatus);

    /// Called after each file with the number attempted so far
    fn progress(&mut self, done: usize, total: usize);
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl BatchObserver for NoopObserver {
    fn file_status(&mut self, _index: usize, _name: &str, _status: FileStatus) {}

    fn progress(&mut self, _done: usize, _total: usize) {}
}

/// Output of a finished batch
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    /// Successfully processed files, in selection order
    pub files: Vec<ProcessedFile>,
    /// One outcome per source, in selection order
    pub outcomes: Vec<FileOutcome>,
}

impl BatchResult {
    pub fn success_count(&self) -> usize {
        self.files.len()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == FileStatus::Failed)
            .count()
    }

    /// Processed files that were copied without a watermark
    pub fn passthrough(&self) -> impl Iterator<Item = &ProcessedFile> {
        self.files.iter().filter(|f| f.passthrough)
    }
}

/// Context for one batch run
#[derive(Debug)]
pub struct Batch {
    spec: WatermarkSpec,
    sources: Vec<SourceFile>,
    font: Option<WatermarkFont>,
    policy: PlacementPolicy,
}

impl Batch {
    /// Create a batch. An empty source list is rejected.
    pub fn new(spec: WatermarkSpec, sources: Vec<SourceFile>) -> Result<Self> {
        if sources.is_empty() {
            return Err(Error::NoEligibleFiles);
        }
        Ok(Self {
            spec,
            sources,
            font: None,
            policy: PlacementPolicy::default(),
        })
    }

    /// Font used for images and embedded into PDFs
    pub fn with_font(mut self, font: Option<WatermarkFont>) -> Self {
        self.font = font;
        self
    }

    pub fn with_policy(mut self, policy: PlacementPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn spec(&self) -> &WatermarkSpec {
        &self.spec
    }

    pub fn sources(&self) -> &[SourceFile] {
        &self.sources
    }

    pub fn font(&self) -> Option<&WatermarkFont> {
        self.font.as_ref()
    }

    /// Watermark a single source file
    pub fn process_file(&self, source: &SourceFile) -> Result<ProcessedFile> {
        process_file(source, &self.spec, self.font.as_ref(), &self.policy)
    }

    /// Process every source in order, reporting to `observer`
    pub fn run(&self, observer: &mut dyn BatchObserver) -> BatchResult {
        let total = self.sources.len();
        for (index, source) in self.sources.iter().enumerate() {
            observer.file_status(index, &source.name, FileStatus::Pending);
        }

        let mut result = BatchResult {
            files: Vec::with_capacity(total),
            outcomes: Vec::with_capacity(total),
        };

        for (index, source) in self.sources.iter().enumerate() {
            observer.file_status(index, &source.name, FileStatus::Processing);

            let outcome = match self.process_file(source) {
                Ok(processed) => {
                    tracing::debug!(name = %source.name, output = %processed.name, "file processed");
                    result.files.push(processed);
                    FileOutcome {
                        name: source.name.clone(),
                        status: FileStatus::Success,
                        error: None,
                    }
                }
                Err(e) => {
                    tracing::warn!(name = %source.name, error = %e, "failed to process file");
                    FileOutcome {
                        name: source.name.clone(),
                        status: FileStatus::Failed,
                        error: Some(e.to_string()),
                    }
                }
            };

            observer.file_status(index, &source.name, outcome.status);
            result.outcomes.push(outcome);
            observer.progress(index + 1, total);
        }

        tracing::info!(
            total,
            failed = result.failure_count(),
            "batch finished"
        );
        result
    }
}

/// Watermark one file according to its extension
pub fn process_file(
    source: &SourceFile,
    spec: &WatermarkSpec,
    font: Option<&WatermarkFont>,
    policy: &PlacementPolicy,
) -> Result<ProcessedFile> {
    let kind = source
        .kind()
        .ok_or_else(|| Error::UnsupportedFile(source.name.clone()))?;

    let (bytes, passthrough) = match kind {
        FileKind::Pdf => (pdf::watermark_pdf(&source.bytes, spec, font, policy)?, false),
        FileKind::Png | FileKind::Jpeg => (
            raster::watermark_image(&source.bytes, kind, spec, font, policy)?,
            false,
        ),
        FileKind::Docx | FileKind::Xlsx => (source.bytes.clone(), true),
    };

    Ok(ProcessedFile {
        name: output_name(&source.name),
        bytes,
        media_type: kind.media_type(),
        passthrough,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// Records every event in order
    #[derive(Default)]
    struct Recorder {
        events: Vec<(usize, String, FileStatus)>,
        progress: Vec<(usize, usize)>,
    }

    impl BatchObserver for Recorder {
        fn file_status(&mut self, index: usize, name: &str, status: FileStatus) {
            self.events.push((index, name.to_string(), status));
        }

        fn progress(&mut self, done: usize, total: usize) {
            self.progress.push((done, total));
        }
    }

    fn simple_pdf() -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "Contents" => Object::Reference(content_id),
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(612), Object::Integer(792)],
        });
        doc.objects.insert(pages_id, Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1_i64,
        }));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    fn ascii_spec() -> WatermarkSpec {
        WatermarkSpec {
            text: "DRAFT".to_string(),
            ..WatermarkSpec::default()
        }
    }

    #[test]
    fn test_empty_batch_rejected() {
        let result = Batch::new(WatermarkSpec::default(), vec![]);
        assert!(matches!(result, Err(Error::NoEligibleFiles)));
    }

    #[test]
    fn test_failure_is_isolated() {
        let sources = vec![
            SourceFile::new("a.pdf", simple_pdf()),
            SourceFile::new("b.png", b"not really a png".to_vec()),
            SourceFile::new("c.docx", b"PK docx bytes".to_vec()),
        ];
        let batch = Batch::new(ascii_spec(), sources).unwrap();
        let mut recorder = Recorder::default();
        let result = batch.run(&mut recorder);

        assert_eq!(result.files.len(), 2);
        assert_eq!(result.files[0].name, "a_watermarked.pdf");
        assert_eq!(result.files[1].name, "c_watermarked.docx");
        assert_eq!(result.failure_count(), 1);

        let statuses: Vec<FileStatus> = result.outcomes.iter().map(|o| o.status).collect();
        assert_eq!(
            statuses,
            vec![FileStatus::Success, FileStatus::Failed, FileStatus::Success]
        );
        assert!(result.outcomes[1].error.is_some());
    }

    #[test]
    fn test_observer_event_order() {
        let sources = vec![
            SourceFile::new("x.docx", b"one".to_vec()),
            SourceFile::new("y.xlsx", b"two".to_vec()),
        ];
        let batch = Batch::new(ascii_spec(), sources).unwrap();
        let mut recorder = Recorder::default();
        batch.run(&mut recorder);

        let expected = vec![
            (0, "x.docx".to_string(), FileStatus::Pending),
            (1, "y.xlsx".to_string(), FileStatus::Pending),
            (0, "x.docx".to_string(), FileStatus::Processing),
            (0, "x.docx".to_string(), FileStatus::Success),
            (1, "y.xlsx".to_string(), FileStatus::Processing),
            (1, "y.xlsx".to_string(), FileStatus::Success),
        ];
        assert_eq!(recorder.events, expected);
        assert_eq!(recorder.progress, vec![(1, 2), (2, 2)]);
    }

    #[test]
    fn test_passthrough_is_byte_identical() {
        let bytes = b"PK\x03\x04 spreadsheet".to_vec();
        let source = SourceFile::new("Book.XLSX", bytes.clone());
        let processed = process_file(
            &source,
            &ascii_spec(),
            None,
            &PlacementPolicy::default(),
        )
        .unwrap();

        assert_eq!(processed.bytes, bytes);
        assert!(processed.passthrough);
        assert_eq!(processed.name, "Book_watermarked.XLSX");
    }

    #[test]
    fn test_pdf_without_font_uses_helvetica() {
        let source = SourceFile::new("doc.pdf", simple_pdf());
        let processed =
            process_file(&source, &ascii_spec(), None, &PlacementPolicy::default()).unwrap();

        assert!(!processed.passthrough);
        assert_eq!(processed.media_type, "application/pdf");
        let doc = Document::load_mem(&processed.bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_unsupported_extension_fails() {
        let source = SourceFile::new("notes.txt", b"hi".to_vec());
        let result = process_file(&source, &ascii_spec(), None, &PlacementPolicy::default());
        assert!(matches!(result, Err(Error::UnsupportedFile(_))));
    }
}
