//! PDF watermarking module

pub mod fonts;
pub mod metadata;
pub mod stamp;

// Re-export commonly used items
pub use metadata::{count_pages, extract_metadata, page_box, PageBox, PdfMetadata};
pub use stamp::{watermark_document, watermark_pdf};
