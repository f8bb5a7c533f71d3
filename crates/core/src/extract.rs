use crate::config::HtmlSettings;
use crate::error::IngestError;
use crate::models::{ContentKind, ExtractedBlock, ExtractedDocument, RawContent};
use lopdf::{Document, Object};
use regex::Regex;
use scraper::{ElementRef, Html, Node};
use tracing::debug;

/// Turns fetched bytes into ordered text blocks, dispatching on the declared
/// content type. Unknown types fail with `UnsupportedContentType` and are
/// never retried.
pub fn extract(raw: &RawContent, rules: &HtmlSettings) -> Result<ExtractedDocument, IngestError> {
    let kind = ContentKind::from_content_type(&raw.content_type)
        .ok_or_else(|| IngestError::UnsupportedContentType(raw.content_type.clone()))?;

    match kind {
        ContentKind::Html => extract_html(raw, rules),
        ContentKind::Pdf => extract_pdf(raw),
    }
}

fn extract_html(raw: &RawContent, rules: &HtmlSettings) -> Result<ExtractedDocument, IngestError> {
    let markup = String::from_utf8_lossy(&raw.bytes);
    let document = Html::parse_document(&markup);

    let root = document
        .tree
        .root()
        .children()
        .find_map(ElementRef::wrap)
        .ok_or_else(|| {
            IngestError::Extraction(format!("no document root in markup from {}", raw.url))
        })?;

    let mut text = String::new();
    collect_text(root, rules, &mut text);
    let text = collapse_whitespace(&text)?;

    debug!(url = %raw.url, chars = text.len(), "html cleaned");

    if text.is_empty() {
        return Ok(ExtractedDocument::default());
    }

    Ok(ExtractedDocument {
        blocks: vec![ExtractedBlock {
            text,
            page: None,
            title: None,
            author: None,
        }],
    })
}

fn collect_text(element: ElementRef, rules: &HtmlSettings, out: &mut String) {
    if is_excluded(element, rules) {
        return;
    }
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            collect_text(child_element, rules, out);
        } else if let Node::Text(text) = child.value() {
            out.push_str(text);
        }
    }
}

fn is_excluded(element: ElementRef, rules: &HtmlSettings) -> bool {
    let name = element.value().name();
    if rules.strip_tags.iter().any(|tag| tag.eq_ignore_ascii_case(name)) {
        return true;
    }
    if let Some(classes) = rules.strip_classes.get(name) {
        return element
            .value()
            .classes()
            .any(|class| classes.iter().any(|excluded| excluded == class));
    }
    false
}

fn collapse_whitespace(text: &str) -> Result<String, IngestError> {
    let spaces = Regex::new(r"[ \t]+")?;
    let newlines = Regex::new(r"\n\s*\n+|\n[ \t]+")?;
    let collapsed = spaces.replace_all(text, " ");
    let collapsed = newlines.replace_all(&collapsed, "\n");
    Ok(collapsed.trim().to_string())
}

fn extract_pdf(raw: &RawContent) -> Result<ExtractedDocument, IngestError> {
    let document = Document::load_mem(&raw.bytes)
        .map_err(|error| IngestError::Extraction(format!("pdf parse error: {error}")))?;

    let title = info_text(&document, b"Title");
    let author = info_text(&document, b"Author");

    let mut blocks = Vec::new();
    for (page_number, _page_id) in document.get_pages() {
        let text = document
            .extract_text(&[page_number])
            .map_err(|error| IngestError::Extraction(format!("pdf text error: {error}")))?;

        if text.trim().is_empty() {
            continue;
        }

        blocks.push(ExtractedBlock {
            text: text.trim().to_string(),
            page: Some(page_number),
            title: title.clone(),
            author: author.clone(),
        });
    }

    if blocks.is_empty() {
        return Err(IngestError::Extraction(format!(
            "pdf had no extractable text: {}",
            raw.url
        )));
    }

    Ok(ExtractedDocument { blocks })
}

fn info_text(document: &Document, key: &[u8]) -> Option<String> {
    let info = document.trailer.get(b"Info").ok()?;
    let dict = match info {
        Object::Reference(id) => document.get_object(*id).ok()?.as_dict().ok()?,
        Object::Dictionary(dict) => dict,
        _ => return None,
    };
    match dict.get(key).ok()? {
        Object::String(bytes, _) => {
            let text = decode_pdf_string(bytes);
            let text = text.trim().to_string();
            (!text.is_empty()).then_some(text)
        }
        _ => None,
    }
}

/// Info strings are either PDFDocEncoding (byte-per-char) or UTF-16BE with a
/// leading BOM.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        String::from_utf8_lossy(bytes).to_string()
    }
}
