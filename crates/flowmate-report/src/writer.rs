//! TXT and DOCX rendering.
//!
//! The DOCX writer emits the minimal WordprocessingML package (content types,
//! package relationships, main document) with direct paragraph formatting, so
//! no style part is needed.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use flowmate_core::{Error, Result};
use quick_xml::escape::escape;
use tracing::info;
use zip::write::SimpleFileOptions;

use crate::compose::{report_filename, ReportFormat};

pub const TXT_HEADER: &str = "=== AI Generated Report ===";
const DOCX_TITLE: &str = "1-Minute Speech";
const DOCX_SUBTITLE: &str = "Weekly meeting presentation";
/// Lines containing any of these are set in bold.
const EMPHASIS_WORDS: &[&str] = &["Conclusion", "conclusion", "Summary", "Key points", "Thank you"];

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

/// Render, write into `dir`, and return the generated filename and path.
pub fn write_report(
    format: ReportFormat,
    content: &str,
    dir: &Path,
) -> Result<(String, PathBuf)> {
    let filename = report_filename(format);
    let path = dir.join(&filename);
    let bytes = match format {
        ReportFormat::Txt => render_txt(content).into_bytes(),
        ReportFormat::Docx => render_docx(content, chrono::Local::now().date_naive())?,
    };
    std::fs::write(&path, bytes)?;
    info!("Report written: {} ({} chars)", filename, content.chars().count());
    Ok((filename, path))
}

pub fn render_txt(content: &str) -> String {
    format!("{}\n\n{}", TXT_HEADER, content)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Center,
    Right,
}

struct Paragraph {
    text: String,
    align: Align,
    bold: bool,
    /// Font size in half-points.
    size: Option<u32>,
}

impl Paragraph {
    fn body(text: &str) -> Self {
        Self {
            text: text.to_string(),
            align: Align::Left,
            bold: false,
            size: None,
        }
    }

    fn to_xml(&self) -> String {
        let jc = match self.align {
            Align::Left => "left",
            Align::Center => "center",
            Align::Right => "right",
        };
        let mut run_props = String::new();
        if self.bold {
            run_props.push_str("<w:b/>");
        }
        if let Some(size) = self.size {
            run_props.push_str(&format!("<w:sz w:val=\"{}\"/>", size));
        }
        let run = if self.text.is_empty() {
            String::new()
        } else {
            format!(
                "<w:r><w:rPr>{}</w:rPr><w:t xml:space=\"preserve\">{}</w:t></w:r>",
                run_props,
                escape(self.text.as_str())
            )
        };
        format!("<w:p><w:pPr><w:jc w:val=\"{}\"/></w:pPr>{}</w:p>", jc, run)
    }
}

/// Lay out the speech: title, subtitle, rule, body lines, dated footer.
fn layout(content: &str, date: NaiveDate) -> Vec<Paragraph> {
    let mut paragraphs = vec![
        Paragraph {
            text: DOCX_TITLE.into(),
            align: Align::Center,
            bold: true,
            size: Some(48),
        },
        Paragraph {
            text: DOCX_SUBTITLE.into(),
            align: Align::Center,
            bold: false,
            size: Some(22),
        },
        Paragraph {
            text: "_".repeat(50),
            align: Align::Center,
            bold: false,
            size: None,
        },
    ];

    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        if line.starts_with('#') {
            let level = line.chars().take_while(|c| *c == '#').count().min(2);
            paragraphs.push(Paragraph {
                text: line.trim_start_matches('#').trim().to_string(),
                align: Align::Left,
                bold: true,
                size: Some(if level == 1 { 32 } else { 28 }),
            });
        } else {
            let mut p = Paragraph::body(line);
            p.bold = EMPHASIS_WORDS.iter().any(|w| line.contains(w));
            paragraphs.push(p);
        }
    }

    paragraphs.push(Paragraph::body(""));
    paragraphs.push(Paragraph {
        text: format!("Date: {}", date.format("%B %-d, %Y")),
        align: Align::Right,
        bold: false,
        size: Some(18),
    });
    paragraphs
}

fn document_xml(paragraphs: &[Paragraph]) -> String {
    let body: String = paragraphs.iter().map(Paragraph::to_xml).collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
         <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
         <w:body>{}</w:body></w:document>",
        body
    )
}

/// DOCX bytes for a speech dated `date`.
pub fn render_docx(content: &str, date: NaiveDate) -> Result<Vec<u8>> {
    let xml = document_xml(&layout(content, date));

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut cursor);
        let options = SimpleFileOptions::default();
        for (name, part) in [
            ("[Content_Types].xml", CONTENT_TYPES_XML),
            ("_rels/.rels", RELS_XML),
            ("word/document.xml", xml.as_str()),
        ] {
            zip.start_file(name, options)
                .map_err(|e| Error::Internal(format!("DOCX write failed: {}", e)))?;
            zip.write_all(part.as_bytes())?;
        }
        zip.finish()
            .map_err(|e| Error::Internal(format!("DOCX write failed: {}", e)))?;
    }
    Ok(cursor.into_inner())
}
