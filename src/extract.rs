//! Page-level text extraction for uploaded documents.
//!
//! Each supported format is reduced to a list of pages:
//!
//! | Format | Pages |
//! |--------|-------|
//! | PDF | one per PDF page (`pdf-extract`) |
//! | PPTX | one per slide, in slide-number order |
//! | DOCX | the whole body as a single page |
//! | text / markdown | the whole file as a single page |
//!
//! [`extract_documents`] concatenates every page that has text and skips
//! the rest. A document that cannot be parsed at all is an error; a page
//! that yields nothing is not.

use std::io::{Cursor, Read};

use crate::models::{
    Document, DocumentMetadata, ExtractedText, MIME_DOCX, MIME_MARKDOWN, MIME_PDF, MIME_PPTX,
    MIME_TEXT,
};

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("{document}: unsupported content-type: {content_type}")]
    UnsupportedContentType {
        document: String,
        content_type: String,
    },
    #[error("{document}: PDF extraction failed: {message}")]
    Pdf { document: String, message: String },
    #[error("{document}: OOXML extraction failed: {message}")]
    Ooxml { document: String, message: String },
}

/// Extract the text of a single document, one entry per page.
///
/// Pages are returned as produced by the underlying parser, including pages
/// with no text; filtering happens in [`extract_documents`].
pub fn extract_pages(doc: &Document) -> Result<Vec<String>, ExtractError> {
    match doc.content_type.as_str() {
        MIME_PDF => pdf_pages(doc),
        MIME_PPTX => pptx_pages(doc),
        MIME_DOCX => docx_pages(doc),
        MIME_TEXT | MIME_MARKDOWN => Ok(vec![String::from_utf8_lossy(&doc.bytes).into_owned()]),
        other => Err(ExtractError::UnsupportedContentType {
            document: doc.name.clone(),
            content_type: other.to_string(),
        }),
    }
}

/// Extract and concatenate the text of every document, in order.
///
/// Pages whose text is empty or whitespace-only are skipped and counted in
/// [`ExtractedText::pages_skipped`]. Kept pages are appended verbatim, so
/// the output length is the sum of the kept pages' lengths.
pub fn extract_documents(docs: &[Document]) -> Result<ExtractedText, ExtractError> {
    let mut text = String::new();
    let mut documents = Vec::with_capacity(docs.len());
    let mut pages_total = 0usize;
    let mut pages_skipped = 0usize;

    for doc in docs {
        let pages = extract_pages(doc)?;
        let (title, author) = properties(doc);

        let mut with_text = 0usize;
        for (page_no, page) in pages.iter().enumerate() {
            if page.trim().is_empty() {
                tracing::debug!(document = %doc.name, page = page_no + 1, "skipping page without text");
                pages_skipped += 1;
                continue;
            }
            text.push_str(page);
            with_text += 1;
        }
        pages_total += pages.len();

        documents.push(DocumentMetadata {
            name: doc.name.clone(),
            title: title.or_else(|| Some(doc.stem().to_string())),
            author,
            page_count: pages.len(),
            pages_with_text: with_text,
        });
    }

    Ok(ExtractedText {
        text,
        documents,
        pages_total,
        pages_skipped,
    })
}

fn pdf_pages(doc: &Document) -> Result<Vec<String>, ExtractError> {
    pdf_extract::extract_text_from_mem_by_pages(&doc.bytes).map_err(|e| ExtractError::Pdf {
        document: doc.name.clone(),
        message: e.to_string(),
    })
}

fn docx_pages(doc: &Document) -> Result<Vec<String>, ExtractError> {
    let mut archive = open_zip(doc)?;
    let xml = read_zip_entry_bounded(&mut archive, "word/document.xml")
        .map_err(|message| ooxml_error(doc, message))?;
    let body = collect_text_runs(&xml).map_err(|message| ooxml_error(doc, message))?;
    Ok(vec![body])
}

fn pptx_pages(doc: &Document) -> Result<Vec<String>, ExtractError> {
    let mut archive = open_zip(doc)?;
    let mut slides: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            let number = name
                .strip_prefix("ppt/slides/slide")?
                .strip_suffix(".xml")?
                .parse::<u32>()
                .ok()?;
            Some((number, name.to_string()))
        })
        .collect();
    slides.sort_by_key(|(number, _)| *number);

    let mut pages = Vec::with_capacity(slides.len());
    for (_, name) in slides {
        let xml = read_zip_entry_bounded(&mut archive, &name)
            .map_err(|message| ooxml_error(doc, message))?;
        pages.push(collect_text_runs(&xml).map_err(|message| ooxml_error(doc, message))?);
    }
    Ok(pages)
}

/// Title and author from OOXML core properties. PDFs and plain text have none.
fn properties(doc: &Document) -> (Option<String>, Option<String>) {
    if doc.content_type != MIME_DOCX && doc.content_type != MIME_PPTX {
        return (None, None);
    }
    let Ok(mut archive) = open_zip(doc) else {
        return (None, None);
    };
    match read_zip_entry_bounded(&mut archive, "docProps/core.xml") {
        Ok(xml) => core_properties(&xml),
        Err(_) => (None, None),
    }
}

fn core_properties(xml: &[u8]) -> (Option<String>, Option<String>) {
    use quick_xml::events::Event;

    let mut title = None;
    let mut author = None;
    let mut field: Option<&'static str> = None;
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                field = match e.local_name().as_ref() {
                    b"title" => Some("title"),
                    b"creator" => Some("creator"),
                    _ => None,
                };
            }
            Ok(Event::Text(te)) => {
                if let Some(f) = field {
                    let value = te.unescape().unwrap_or_default().trim().to_string();
                    if !value.is_empty() {
                        match f {
                            "title" => title = Some(value),
                            _ => author = Some(value),
                        }
                    }
                }
            }
            Ok(Event::End(_)) => field = None,
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    (title, author)
}

fn open_zip(doc: &Document) -> Result<zip::ZipArchive<Cursor<&[u8]>>, ExtractError> {
    zip::ZipArchive::new(Cursor::new(doc.bytes.as_slice()))
        .map_err(|e| ooxml_error(doc, e.to_string()))
}

fn ooxml_error(doc: &Document, message: String) -> ExtractError {
    ExtractError::Ooxml {
        document: doc.name.clone(),
        message,
    }
}

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<Vec<u8>, String> {
    let entry = archive.by_name(name).map_err(|e| format!("{}: {}", name, e))?;
    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(|e| e.to_string())?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, MAX_XML_ENTRY_BYTES
        ));
    }
    Ok(out)
}

/// Text of every `<*:t>` run, with a newline after each `<*:p>` paragraph.
///
/// Works for both WordprocessingML (`w:t`, `w:p`) and DrawingML (`a:t`,
/// `a:p`) since only local names are compared.
fn collect_text_runs(xml: &[u8]) -> Result<String, String> {
    use quick_xml::events::Event;

    let mut out = String::new();
    let mut in_run = false;
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_run = true,
            Ok(Event::Text(te)) if in_run => {
                let text = te.unescape().map_err(|e| e.to_string())?;
                out.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_run = false,
                b"p" if !out.is_empty() && !out.ends_with('\n') => out.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}
