//! PDF page geometry and document metadata

use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::{Error, Result};
use crate::layout::PageSize;

/// Depth limit when walking /Parent chains, guards against cyclic page trees
const MAX_TREE_DEPTH: usize = 64;

/// A page's MediaBox in default user space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub llx: f32,
    pub lly: f32,
    pub urx: f32,
    pub ury: f32,
}

impl PageBox {
    /// Normalizes the corners so width and height are never negative
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            llx: x0.min(x1),
            lly: y0.min(y1),
            urx: x0.max(x1),
            ury: y0.max(y1),
        }
    }

    pub fn size(&self) -> PageSize {
        PageSize::new(self.urx - self.llx, self.ury - self.lly)
    }
}

/// Follow a reference to the object it names; direct objects pass through
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Result<&'a Object> {
    match obj {
        Object::Reference(id) => Ok(doc.get_object(*id)?),
        other => Ok(other),
    }
}

/// Look up `key` on a page, falling back to its ancestors (inheritable attributes)
pub(crate) fn inherited_attribute<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Result<Option<&'a Object>> {
    let mut node: &Dictionary = doc.get_object(page_id)?.as_dict()?;

    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return Ok(Some(resolve(doc, value)?));
        }
        match node.get(b"Parent") {
            Ok(parent) => node = resolve(doc, parent)?.as_dict()?,
            Err(_) => return Ok(None),
        }
    }

    Ok(None)
}

/// Effective MediaBox of a page; pages without one are treated as US Letter
pub fn page_box(doc: &Document, page_id: ObjectId) -> Result<PageBox> {
    let Some(media_box) = inherited_attribute(doc, page_id, b"MediaBox")? else {
        tracing::warn!(?page_id, "page has no MediaBox, assuming US Letter");
        let letter = PageSize::letter();
        return Ok(PageBox::new(0.0, 0.0, letter.width, letter.height));
    };

    let values = media_box
        .as_array()?
        .iter()
        .map(|v| Ok(resolve(doc, v)?.as_float()?))
        .collect::<Result<Vec<f32>>>()?;

    match values.as_slice() {
        [x0, y0, x1, y1] => Ok(PageBox::new(*x0, *y0, *x1, *y1)),
        _ => Err(Error::General(format!(
            "MediaBox should have 4 numbers, found {}",
            values.len()
        ))),
    }
}

/// Every page in order with its MediaBox
pub fn page_boxes(doc: &Document) -> Result<Vec<(ObjectId, PageBox)>> {
    doc.get_pages()
        .into_values()
        .map(|id| Ok((id, page_box(doc, id)?)))
        .collect()
}

/// PDF metadata
#[derive(Debug, Clone)]
pub struct PdfMetadata {
    /// Number of pages in the PDF
    pub page_count: usize,
    /// Size of each page, in order
    pub page_sizes: Vec<PageSize>,
    /// Document title (if present)
    pub title: Option<String>,
    /// Document author (if present)
    pub author: Option<String>,
}

/// Read an Info dictionary string entry as UTF-8, if it is one
fn info_string(doc: &Document, info: &Dictionary, key: &[u8]) -> Option<String> {
    let value = resolve(doc, info.get(key).ok()?).ok()?;
    let bytes = value.as_str().ok()?;
    String::from_utf8(bytes.to_vec()).ok()
}

/// Extract metadata from an already loaded document
pub fn document_metadata(doc: &Document) -> Result<PdfMetadata> {
    let boxes = page_boxes(doc)?;
    if boxes.is_empty() {
        return Err(Error::EmptyPdf("document".to_string()));
    }

    let info = doc
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|obj| resolve(doc, obj).ok())
        .and_then(|obj| obj.as_dict().ok());

    Ok(PdfMetadata {
        page_count: boxes.len(),
        page_sizes: boxes.iter().map(|(_, b)| b.size()).collect(),
        title: info.and_then(|d| info_string(doc, d, b"Title")),
        author: info.and_then(|d| info_string(doc, d, b"Author")),
    })
}

/// Extract metadata from a PDF file
pub fn extract_metadata(path: &Path) -> Result<PdfMetadata> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let doc = Document::load(path)?;
    document_metadata(&doc).map_err(|e| match e {
        Error::EmptyPdf(_) => Error::EmptyPdf(path.display().to_string()),
        other => other,
    })
}

/// Count the number of pages in a PDF file
pub fn count_pages(path: &Path) -> Result<usize> {
    Ok(extract_metadata(path)?.page_count)
}
