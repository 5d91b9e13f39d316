//! Direct watermark writing to PDF pages using lopdf
//!
//! Each page's existing content is wrapped in `q ... Q` so any transformation
//! it leaves behind is undone, then a content stream drawing the watermark
//! instructions is appended on top. Font and opacity resources are merged into
//! a page-local copy of the (possibly inherited) Resources dictionary.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::error::{Error, Result};
use crate::font::WatermarkFont;
use crate::layout::{DrawInstruction, PlacementPolicy, PDF_BASE_FONT_SIZE};
use crate::pdf::fonts::PdfFont;
use crate::pdf::metadata::{inherited_attribute, page_boxes, resolve, PageBox};
use crate::watermark::WatermarkSpec;

/// Watermark a PDF held in memory and return the saved bytes
pub fn watermark_pdf(
    bytes: &[u8],
    spec: &WatermarkSpec,
    font: Option<&WatermarkFont>,
    policy: &PlacementPolicy,
) -> Result<Vec<u8>> {
    let mut doc = Document::load_mem(bytes)?;
    let pages = watermark_document(&mut doc, spec, font, policy)?;
    tracing::debug!(pages, "watermarked PDF pages");

    doc.compress();
    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

/// Add the watermark to every page of a loaded document.
///
/// Returns the number of pages processed.
pub fn watermark_document(
    doc: &mut Document,
    spec: &WatermarkSpec,
    font: Option<&WatermarkFont>,
    policy: &PlacementPolicy,
) -> Result<usize> {
    // Collect page info first (to avoid borrow issues)
    let pages = page_boxes(doc)?;
    if pages.is_empty() {
        return Err(Error::EmptyPdf("document".to_string()));
    }

    let pdf_font = PdfFont::register(doc, &spec.text, font)?;
    let gs_id = add_opacity_state(doc, spec.opacity);
    let base_font_size = spec.font_size.unwrap_or(PDF_BASE_FONT_SIZE);

    for (page_id, page_box) in &pages {
        let instructions = policy.instructions(page_box.size(), spec.position, base_font_size);
        if instructions.is_empty() {
            continue;
        }

        let (font_name, gs_name) =
            add_watermark_resources_to_page(doc, *page_id, pdf_font.id(), gs_id)?;

        let content = generate_watermark_content(
            &instructions,
            page_box,
            spec,
            &pdf_font,
            &font_name,
            &gs_name,
        )?;

        let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        prepend_content_to_page(doc, *page_id, open_id)?;

        let mut closing = b"Q\n".to_vec();
        closing.extend_from_slice(content.as_bytes());
        let content_id = doc.add_object(Stream::new(Dictionary::new(), closing));
        append_content_to_page(doc, *page_id, content_id)?;
    }

    Ok(pages.len())
}

/// Shared graphics state carrying the fill and stroke opacity
fn add_opacity_state(doc: &mut Document, opacity: f32) -> ObjectId {
    let mut gs = Dictionary::new();
    gs.set("Type", Object::Name(b"ExtGState".to_vec()));
    gs.set("ca", Object::Real(opacity));
    gs.set("CA", Object::Real(opacity));
    doc.add_object(Object::Dictionary(gs))
}

/// Generate PDF content stream operators for one page's watermark
fn generate_watermark_content(
    instructions: &[DrawInstruction],
    page_box: &PageBox,
    spec: &WatermarkSpec,
    font: &PdfFont,
    font_name: &str,
    gs_name: &str,
) -> Result<String> {
    let mut content = String::new();
    let text = font.encode_text(&spec.text)?;
    let (r, g, b) = spec.color.to_unit_rgb();

    content.push_str("q\n");
    content.push_str(&format!("/{} gs\n", gs_name));
    content.push_str(&format!("{} {} {} rg\n", fmt_num(r), fmt_num(g), fmt_num(b)));

    for inst in instructions {
        // Center horizontally on x, vertically on y; MediaBox may not start at 0,0
        let width = font.text_width(&spec.text, inst.font_size);
        let x = page_box.llx + inst.x - width / 2.0;
        let y = page_box.lly + inst.y - font.middle_offset(inst.font_size);

        content.push_str("BT\n");
        content.push_str(&format!("/{} {} Tf\n", font_name, fmt_num(inst.font_size)));
        content.push_str(&format!("1 0 0 1 {} {} Tm\n", fmt_num(x), fmt_num(y)));
        content.push_str(&format!("{} Tj\n", text));
        content.push_str("ET\n");
    }

    content.push_str("Q\n");
    Ok(content)
}

/// Format a number for a content stream: at most 3 decimals, no trailing zeros
fn fmt_num(v: f32) -> String {
    let s = format!("{:.3}", v);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    match s {
        "" | "-" | "-0" => "0".to_string(),
        other => other.to_string(),
    }
}

/// Pick a resource name not already used in `dict`
fn unique_name(dict: &Dictionary, prefix: &str) -> String {
    let mut n = 1;
    loop {
        let candidate = format!("{}{}", prefix, n);
        if !dict.has(candidate.as_bytes()) {
            return candidate;
        }
        n += 1;
    }
}

/// Owned copy of a resource subdictionary, following references
fn owned_subdict(doc: &Document, resources: &Dictionary, key: &[u8]) -> Dictionary {
    resources
        .get(key)
        .ok()
        .and_then(|obj| resolve(doc, obj).ok())
        .and_then(|obj| obj.as_dict().ok())
        .cloned()
        .unwrap_or_default()
}

/// Add font and graphics-state references to a page's Resources.
///
/// Inherited resources are copied onto the page so nothing the page relied on
/// is lost. Returns the names chosen for the font and the graphics state.
fn add_watermark_resources_to_page(
    doc: &mut Document,
    page_id: ObjectId,
    font_id: ObjectId,
    gs_id: ObjectId,
) -> Result<(String, String)> {
    let mut resources = match inherited_attribute(doc, page_id, b"Resources")? {
        Some(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    };

    let mut fonts = owned_subdict(doc, &resources, b"Font");
    let font_name = unique_name(&fonts, "WmF");
    fonts.set(font_name.as_bytes().to_vec(), Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));

    let mut states = owned_subdict(doc, &resources, b"ExtGState");
    let gs_name = unique_name(&states, "WmGS");
    states.set(gs_name.as_bytes().to_vec(), Object::Reference(gs_id));
    resources.set("ExtGState", Object::Dictionary(states));

    // Set the Resources directly on the page (not as a reference)
    let page_dict = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page_dict.set("Resources", Object::Dictionary(resources));

    Ok((font_name, gs_name))
}

/// The page's content streams as a flat list of references.
///
/// `/Contents` may be a stream, an array of streams, or a reference to
/// either; an indirect array is spliced in so the result only names streams.
fn content_streams(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>> {
    let page_dict = doc.get_object(page_id)?.as_dict()?;

    let streams = match page_dict.get(b"Contents").ok() {
        Some(Object::Reference(content_id)) => match doc.get_object(*content_id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*content_id)],
        },
        Some(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    };

    Ok(streams)
}

/// Prepend a content stream to a page's Contents
fn prepend_content_to_page(doc: &mut Document, page_id: ObjectId, new_content_id: ObjectId) -> Result<()> {
    let mut content_array = content_streams(doc, page_id)?;
    content_array.insert(0, Object::Reference(new_content_id));

    let page_dict = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page_dict.set("Contents", Object::Array(content_array));
    Ok(())
}

/// Append a content stream to a page's Contents
///
/// Our content goes after the original so the watermark is drawn on top.
fn append_content_to_page(doc: &mut Document, page_id: ObjectId, new_content_id: ObjectId) -> Result<()> {
    let mut content_array = content_streams(doc, page_id)?;
    content_array.push(Object::Reference(new_content_id));

    let page_dict = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page_dict.set("Contents", Object::Array(content_array));
    Ok(())
}
