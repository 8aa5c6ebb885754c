//! Text extraction for the accepted upload formats.

use std::io::Read;
use std::path::Path;

use flowmate_core::{Error, Result};
use tracing::{debug, warn};

/// Extensions accepted by the upload endpoint (lowercase, with dot).
pub const ALLOWED_EXTENSIONS: &[&str] = &[".pdf", ".docx", ".doc", ".txt"];

/// Cap on the decompressed size of `word/document.xml` (zip-bomb guard).
const MAX_DOCUMENT_XML_BYTES: u64 = 64 * 1024 * 1024;

/// Supported file types for text extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    PlainText,
    Pdf,
    Docx,
    /// Legacy Word. Only handled when the file is actually OOXML inside.
    Doc,
    Unknown,
}

impl FileType {
    /// Detect file type from an extension, with or without the leading dot.
    pub fn from_extension(ext: &str) -> Self {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "txt" => Self::PlainText,
            "pdf" => Self::Pdf,
            "docx" => Self::Docx,
            "doc" => Self::Doc,
            _ => Self::Unknown,
        }
    }

    /// Detect file type from a file name or path.
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }

    /// Whether uploads of this type are accepted.
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Extract text content from a file on disk.
pub fn extract_text(path: &Path) -> Result<String> {
    let file_type = FileType::from_path(path);
    if !file_type.is_supported() {
        return Err(Error::Validation(format!(
            "unsupported file type: {}",
            path.display()
        )));
    }
    let bytes = std::fs::read(path)?;
    debug!("Extracting {:?} text from {} ({} bytes)", file_type, path.display(), bytes.len());
    extract_text_from_bytes(&bytes, file_type)
}

/// Extract text content from raw file bytes.
pub fn extract_text_from_bytes(bytes: &[u8], file_type: FileType) -> Result<String> {
    match file_type {
        FileType::PlainText => Ok(decode_plain_text(bytes)),
        FileType::Pdf => extract_pdf(bytes),
        FileType::Docx => extract_docx(bytes),
        FileType::Doc => extract_docx(bytes).map_err(|e| {
            Error::Extract(format!(
                "legacy .doc files are only supported when saved in the DOCX format ({})",
                e
            ))
        }),
        FileType::Unknown => Err(Error::Validation("unsupported file type".into())),
    }
}

fn decode_plain_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(e) => {
            warn!("Text file is not valid UTF-8 ({}); decoding lossily", e);
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| Error::Extract(format!("PDF extraction failed: {}", e)))
}

fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| Error::Extract(format!("not a DOCX archive: {}", e)))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| Error::Extract("word/document.xml not found".into()))?;

    let mut xml = Vec::new();
    entry
        .take(MAX_DOCUMENT_XML_BYTES)
        .read_to_end(&mut xml)
        .map_err(|e| Error::Extract(e.to_string()))?;
    if xml.len() as u64 >= MAX_DOCUMENT_XML_BYTES {
        return Err(Error::Extract("word/document.xml exceeds size limit".into()));
    }

    paragraphs_from_document_xml(&xml)
}

/// Collect `w:t` runs, one output line per `w:p` paragraph.
fn paragraphs_from_document_xml(xml: &[u8]) -> Result<String> {
    use quick_xml::events::Event;

    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut out = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" | b"cr" => out.push('\n'),
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let text = t
                    .unescape()
                    .map_err(|e| Error::Extract(format!("DOCX XML: {}", e)))?;
                out.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Extract(format!("DOCX XML: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}
