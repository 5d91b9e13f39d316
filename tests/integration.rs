//! Integration tests for the batch watermark library

use batch_watermark::archive::{build_archive, write_archive};
use batch_watermark::batch::{Batch, FileStatus, NoopObserver};
use batch_watermark::files::load_sources;
use batch_watermark::font::WatermarkFont;
use batch_watermark::pdf::count_pages;
use batch_watermark::watermark::{Color, PlacementMode, WatermarkSpec};
use batch_watermark::Error;
use lopdf::{dictionary, Document, Object, Stream};
use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::ZipArchive;

/// Write a PDF with `pages` empty Letter pages
fn write_pdf(path: &Path, pages: usize) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::new();
    for _ in 0..pages {
        let content_id = doc.add_object(Stream::new(dictionary! {}, b"BT ET".to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "Contents" => Object::Reference(content_id),
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(pages_id, Object::Dictionary(dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => pages as i64,
        "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(612), Object::Integer(792)],
    }));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));
    doc.save(path).expect("Failed to save test PDF");
}

/// Write a plain white PNG
fn write_png(path: &Path, width: u32, height: u32) {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([255, 255, 255, 255]));
    img.save(path).expect("Failed to save test PNG");
}

fn spec(text: &str, position: PlacementMode) -> WatermarkSpec {
    WatermarkSpec::new(text, Color::new(255, 0, 0), 0.5, position)
}

fn zip_entries(bytes: Vec<u8>) -> Vec<(String, Vec<u8>)> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).expect("Invalid zip");
    (0..archive.len())
        .map(|i| {
            let mut entry = archive.by_index(i).unwrap();
            let mut data = Vec::new();
            entry.read_to_end(&mut data).unwrap();
            (entry.name().to_string(), data)
        })
        .collect()
}

#[test]
fn test_batch_to_archive() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let dir = temp_dir.path();

    let pdf = dir.join("report.pdf");
    let docx = dir.join("notes.v2.docx");
    let broken = dir.join("broken.png");
    write_pdf(&pdf, 3);
    fs::write(&docx, b"PK\x03\x04 word document").unwrap();
    fs::write(&broken, b"this is not an image").unwrap();

    let sources = load_sources(&[pdf, broken, docx]).expect("Failed to load sources");
    let batch = Batch::new(spec("CONFIDENTIAL", PlacementMode::Diagonal), sources).unwrap();
    let result = batch.run(&mut NoopObserver);

    assert_eq!(result.outcomes.len(), 3);
    assert_eq!(result.outcomes[1].status, FileStatus::Failed);
    assert_eq!(result.failure_count(), 1);

    let out_dir = dir.join("out");
    let archive_path = write_archive(&result.files, &out_dir).expect("Failed to write archive");
    let entries = zip_entries(fs::read(&archive_path).unwrap());

    let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["report_watermarked.pdf", "notes.v2_watermarked.docx"]);
    assert_eq!(entries[1].1, b"PK\x03\x04 word document".to_vec());

    // Watermarked PDF keeps its pages
    let stamped = out_dir.join("stamped.pdf");
    fs::write(&stamped, &entries[0].1).unwrap();
    assert_eq!(count_pages(&stamped).unwrap(), 3);
}

#[test]
fn test_pdf_pages_get_watermark_stream() {
    let temp_dir = TempDir::new().unwrap();
    let pdf = temp_dir.path().join("two.pdf");
    write_pdf(&pdf, 2);

    let sources = load_sources(&[pdf]).unwrap();
    let batch = Batch::new(spec("DRAFT", PlacementMode::Tile), sources).unwrap();
    let result = batch.run(&mut NoopObserver);
    assert_eq!(result.failure_count(), 0);

    let doc = Document::load_mem(&result.files[0].bytes).expect("Output is not a PDF");
    for page_id in doc.get_pages().into_values() {
        let contents = doc.get_page_contents(page_id);
        assert!(contents.len() >= 3, "expected q, original and watermark streams");

        let content = doc.get_and_decode_page_content(page_id).unwrap();
        let text_ops = content
            .operations
            .iter()
            .filter(|op| op.operator == "Tj")
            .count();
        // 612 x 792: 4 columns of 6 rows, nothing in the original
        assert_eq!(text_ops, 24);
    }
}

#[test]
fn test_empty_selection_rejected() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("readme.txt"), b"hello").unwrap();
    fs::write(temp_dir.path().join("data.csv"), b"a,b").unwrap();

    let result = load_sources(&[temp_dir.path().to_path_buf()]);
    assert!(matches!(result, Err(Error::NoEligibleFiles)));
}

#[test]
fn test_directory_selection_order() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    fs::create_dir(dir.join("sub")).unwrap();
    fs::write(dir.join("b.xlsx"), b"b").unwrap();
    fs::write(dir.join("a.docx"), b"a").unwrap();
    fs::write(dir.join("sub").join("c.docx"), b"c").unwrap();
    fs::write(dir.join("skip.txt"), b"x").unwrap();

    let sources = load_sources(&[dir.to_path_buf()]).unwrap();
    let names: Vec<&str> = sources.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["a.docx", "b.xlsx", "c.docx"]);

    let batch = Batch::new(WatermarkSpec::default(), sources).unwrap();
    let result = batch.run(&mut NoopObserver);
    assert!(result.files.iter().all(|f| f.passthrough));

    let entries = zip_entries(build_archive(&result.files).unwrap());
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[2].0, "c_watermarked.docx");
}

#[test]
fn test_missing_input_reported() {
    let result = load_sources(&[PathBuf::from("definitely/not/here.pdf")]);
    assert!(matches!(result, Err(Error::FileNotFound(_))));
}

#[test]
fn test_image_watermark_with_system_font() {
    let Some(font) = WatermarkFont::discover("WM") else {
        eprintln!("Skipping image test: no system font found");
        return;
    };

    let temp_dir = TempDir::new().unwrap();
    let png = temp_dir.path().join("photo.png");
    write_png(&png, 400, 300);

    let sources = load_sources(&[png]).unwrap();
    let batch = Batch::new(spec("WM", PlacementMode::Center), sources)
        .unwrap()
        .with_font(Some(font));
    let result = batch.run(&mut NoopObserver);

    assert_eq!(result.failure_count(), 0);
    let out = &result.files[0];
    assert_eq!(out.name, "photo_watermarked.png");

    let decoded = image::load_from_memory(&out.bytes).unwrap().into_rgba8();
    assert_eq!(decoded.dimensions(), (400, 300));
    assert!(decoded.pixels().any(|p| p.0 != [255, 255, 255, 255]));
}

#[test]
fn test_image_without_font_fails_alone() {
    let temp_dir = TempDir::new().unwrap();
    let png = temp_dir.path().join("photo.png");
    let docx = temp_dir.path().join("doc.docx");
    write_png(&png, 50, 50);
    fs::write(&docx, b"doc").unwrap();

    let sources = load_sources(&[png, docx]).unwrap();
    let batch = Batch::new(WatermarkSpec::default(), sources).unwrap();
    let result = batch.run(&mut NoopObserver);

    assert_eq!(result.outcomes[0].status, FileStatus::Failed);
    assert_eq!(result.outcomes[1].status, FileStatus::Success);
    assert_eq!(result.files.len(), 1);
}
