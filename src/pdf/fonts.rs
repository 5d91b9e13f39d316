//! Fonts for PDF watermark text
//!
//! Two options: the standard Helvetica-Bold Type1 font with WinAnsiEncoding
//! (nothing embedded, Latin-1 text only), or a TrueType font embedded as a
//! Type0/Identity-H composite font so any glyph it has can be shown.

use std::collections::BTreeMap;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::error::{Error, Result};
use crate::font::WatermarkFont;

/// Helvetica-Bold widths for characters 32..=126, in 1/1000 em
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // space ../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // 0 .. ?
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // @ .. O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // P .. _
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // ` .. o
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,      // p .. ~
];

/// Helvetica-Bold ascender and descender, in 1/1000 em
const HELVETICA_BOLD_ASCENT: f32 = 718.0;
const HELVETICA_BOLD_DESCENT: f32 = -207.0;

/// A font registered in a document, ready for `Tf`
pub enum PdfFont<'a> {
    Standard { id: ObjectId },
    Embedded { id: ObjectId, font: &'a WatermarkFont },
}

impl<'a> PdfFont<'a> {
    /// Add the best font for `text` to the document.
    ///
    /// An embeddable font that covers the text wins, then Helvetica-Bold if
    /// the text fits WinAnsi. Text that neither can draw is an error rather
    /// than a page of `.notdef` boxes.
    pub fn register(
        doc: &mut Document,
        text: &str,
        font: Option<&'a WatermarkFont>,
    ) -> Result<Self> {
        match font.filter(|f| f.is_truetype()) {
            Some(f) if f.covers(text) => return Ok(Self::embedded(doc, f, text)),
            _ if encode_win_ansi(text).is_ok() => {
                return Ok(PdfFont::Standard {
                    id: add_helvetica_bold(doc),
                })
            }
            _ => {}
        }

        let reason = match font {
            Some(f) if !f.is_truetype() => format!(
                "font {} cannot be embedded in PDFs (only single TrueType fonts can)",
                f.name()
            ),
            Some(f) => format!("font {} has no glyphs for some characters", f.name()),
            None => "no font available (use --font)".to_string(),
        };
        Err(Error::Font(format!("cannot draw '{}' on PDF pages: {}", text, reason)))
    }

    fn embedded(doc: &mut Document, font: &'a WatermarkFont, text: &str) -> Self {
        let id = embed_type0_font(doc, font, text);
        PdfFont::Embedded { id, font }
    }

    pub fn id(&self) -> ObjectId {
        match self {
            PdfFont::Standard { id } | PdfFont::Embedded { id, .. } => *id,
        }
    }

    /// Width of `text` at `font_size` points
    pub fn text_width(&self, text: &str, font_size: f32) -> f32 {
        let units: f32 = match self {
            PdfFont::Standard { .. } => text.chars().map(helvetica_bold_width).sum(),
            PdfFont::Embedded { font, .. } => text
                .chars()
                .map(|c| font.advance_1000(font.glyph_id(c)))
                .sum(),
        };
        units * font_size / 1000.0
    }

    /// Distance from the visual middle of a line down to its baseline
    pub fn middle_offset(&self, font_size: f32) -> f32 {
        let (ascent, descent) = match self {
            PdfFont::Standard { .. } => (HELVETICA_BOLD_ASCENT, HELVETICA_BOLD_DESCENT),
            PdfFont::Embedded { font, .. } => font.vertical_metrics_1000(),
        };
        (ascent + descent) / 2.0 * font_size / 1000.0
    }

    /// String operand for `Tj`
    pub fn encode_text(&self, text: &str) -> Result<String> {
        match self {
            PdfFont::Standard { .. } => Ok(format!("({})", escape_pdf_bytes(&encode_win_ansi(text)?))),
            PdfFont::Embedded { font, .. } => {
                let hex: String = text
                    .chars()
                    .map(|c| format!("{:04X}", font.glyph_id(c).0))
                    .collect();
                Ok(format!("<{}>", hex))
            }
        }
    }
}

fn helvetica_bold_width(c: char) -> f32 {
    let code = c as u32;
    if (32..=126).contains(&code) {
        HELVETICA_BOLD_WIDTHS[(code - 32) as usize] as f32
    } else {
        // Latin-1 letters average out close to the digit width
        556.0
    }
}

/// Map text to WinAnsi bytes. Only printable ASCII and Latin-1 are accepted.
pub fn encode_win_ansi(text: &str) -> Result<Vec<u8>> {
    text.chars()
        .map(|c| {
            let code = c as u32;
            if (32..=126).contains(&code) || (160..=255).contains(&code) {
                Ok(code as u8)
            } else {
                Err(Error::Font(format!(
                    "character '{}' cannot be encoded with the standard PDF font",
                    c
                )))
            }
        })
        .collect()
}

/// Escape special characters in a PDF literal string
fn escape_pdf_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            32..=126 => out.push(b as char),
            _ => out.push_str(&format!("\\{:03o}", b)),
        }
    }
    out
}

/// Use Helvetica-Bold (standard PDF font, nothing embedded)
fn add_helvetica_bold(doc: &mut Document) -> ObjectId {
    let mut font = Dictionary::new();
    font.set("Type", Object::Name(b"Font".to_vec()));
    font.set("Subtype", Object::Name(b"Type1".to_vec()));
    font.set("BaseFont", Object::Name(b"Helvetica-Bold".to_vec()));
    font.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
    doc.add_object(Object::Dictionary(font))
}

/// Embed a TrueType font as a Type0 font with Identity-H encoding.
///
/// Widths and the ToUnicode map only cover the glyphs `text` uses.
fn embed_type0_font(doc: &mut Document, font: &WatermarkFont, text: &str) -> ObjectId {
    let base_font = pdf_font_name(font.name());

    let mut font_stream_dict = Dictionary::new();
    font_stream_dict.set("Length1", Object::Integer(font.bytes().len() as i64));
    let font_stream_id = doc.add_object(Stream::new(font_stream_dict, font.bytes().to_vec()));

    let (ascent, descent) = font.vertical_metrics_1000();

    let mut font_descriptor = Dictionary::new();
    font_descriptor.set("Type", Object::Name(b"FontDescriptor".to_vec()));
    font_descriptor.set("FontName", Object::Name(base_font.clone().into_bytes()));
    font_descriptor.set("Flags", Object::Integer(32)); // Nonsymbolic
    font_descriptor.set("FontBBox", Object::Array(vec![
        Object::Integer(-200),
        Object::Integer(descent.round() as i64),
        Object::Integer(1200),
        Object::Integer(ascent.round() as i64),
    ]));
    font_descriptor.set("ItalicAngle", Object::Integer(0));
    font_descriptor.set("Ascent", Object::Integer(ascent.round() as i64));
    font_descriptor.set("Descent", Object::Integer(descent.round() as i64));
    font_descriptor.set("CapHeight", Object::Integer((ascent * 0.9).round() as i64));
    font_descriptor.set("StemV", Object::Integer(80));
    font_descriptor.set("FontFile2", Object::Reference(font_stream_id));
    let font_descriptor_id = doc.add_object(Object::Dictionary(font_descriptor));

    // gid -> (char, width) for every glyph the text uses
    let mut glyphs: BTreeMap<u16, (char, f32)> = BTreeMap::new();
    for c in text.chars() {
        let gid = font.glyph_id(c);
        glyphs.entry(gid.0).or_insert((c, font.advance_1000(gid)));
    }

    let mut widths = Vec::new();
    for (gid, (_, w)) in &glyphs {
        widths.push(Object::Integer(*gid as i64));
        widths.push(Object::Array(vec![Object::Integer(w.round() as i64)]));
    }

    let mut cid_font = Dictionary::new();
    cid_font.set("Type", Object::Name(b"Font".to_vec()));
    cid_font.set("Subtype", Object::Name(b"CIDFontType2".to_vec()));
    cid_font.set("BaseFont", Object::Name(base_font.clone().into_bytes()));
    cid_font.set("CIDSystemInfo", Object::Dictionary(Dictionary::from_iter(vec![
        ("Registry", Object::String(b"Adobe".to_vec(), StringFormat::Literal)),
        ("Ordering", Object::String(b"Identity".to_vec(), StringFormat::Literal)),
        ("Supplement", Object::Integer(0)),
    ])));
    cid_font.set("FontDescriptor", Object::Reference(font_descriptor_id));
    cid_font.set("DW", Object::Integer(1000));
    cid_font.set("W", Object::Array(widths));
    cid_font.set("CIDToGIDMap", Object::Name(b"Identity".to_vec()));
    let cid_font_id = doc.add_object(Object::Dictionary(cid_font));

    let to_unicode = to_unicode_cmap(glyphs.iter().map(|(gid, (c, _))| (*gid, *c)));
    let to_unicode_id = doc.add_object(Stream::new(Dictionary::new(), to_unicode.into_bytes()));

    let mut type0 = Dictionary::new();
    type0.set("Type", Object::Name(b"Font".to_vec()));
    type0.set("Subtype", Object::Name(b"Type0".to_vec()));
    type0.set("BaseFont", Object::Name(base_font.into_bytes()));
    type0.set("Encoding", Object::Name(b"Identity-H".to_vec()));
    type0.set("DescendantFonts", Object::Array(vec![Object::Reference(cid_font_id)]));
    type0.set("ToUnicode", Object::Reference(to_unicode_id));

    doc.add_object(Object::Dictionary(type0))
}

/// PDF names can't carry spaces or delimiters
fn pdf_font_name(name: &str) -> String {
    let cleaned: String = name.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '-').collect();
    if cleaned.is_empty() {
        "WatermarkFont".to_string()
    } else {
        cleaned
    }
}

/// Build a ToUnicode CMap mapping 2-byte glyph ids to the characters they show
fn to_unicode_cmap(entries: impl Iterator<Item = (u16, char)>) -> String {
    let entries: Vec<(u16, char)> = entries.collect();

    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo\n\
         << /Registry (Adobe)\n\
         /Ordering (UCS)\n\
         /Supplement 0\n\
         >> def\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n\
         <0000> <FFFF>\n\
         endcodespacerange\n",
    );

    // At most 100 entries per bfchar block
    for chunk in entries.chunks(100) {
        cmap.push_str(&format!("{} beginbfchar\n", chunk.len()));
        for (gid, c) in chunk {
            let mut buf = [0u16; 2];
            let utf16: String = c
                .encode_utf16(&mut buf)
                .iter()
                .map(|u| format!("{:04X}", u))
                .collect();
            cmap.push_str(&format!("<{:04X}> <{}>\n", gid, utf16));
        }
        cmap.push_str("endbfchar\n");
    }

    cmap.push_str(
        "endcmap\n\
         CMapName currentdict /CMap defineresource pop\n\
         end\n\
         end\n",
    );
    cmap
}
