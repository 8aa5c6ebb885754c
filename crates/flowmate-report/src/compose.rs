//! Report content selection and the templated fallback.

use std::fmt;
use std::str::FromStr;

use flowmate_core::Error;
use serde::Serialize;

/// Model output shorter than this (trimmed, in chars) is replaced by the fallback.
pub const MIN_REPORT_CHARS: usize = 50;
/// Retrieval query used when the report request itself matched nothing.
pub const FALLBACK_SEARCH_QUERY: &str = "document content summary";
/// Characters of retrieved context quoted in the fallback report.
const FALLBACK_CONTEXT_CHARS: usize = 200;

/// Output file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Docx,
    Txt,
}

impl ReportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Docx => "docx",
            ReportFormat::Txt => "txt",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ReportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "docx" => Ok(ReportFormat::Docx),
            "txt" => Ok(ReportFormat::Txt),
            other => Err(Error::Validation(format!(
                "unsupported report format '{}' (expected docx or txt)",
                other
            ))),
        }
    }
}

/// The text that goes into a report, and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportContent {
    pub text: String,
    pub used_fallback: bool,
}

/// Pick the model's text when it is usable, the fallback template otherwise.
pub fn choose_content(
    generated: Option<&str>,
    uploaded_file: Option<&str>,
    context: &str,
) -> ReportContent {
    match generated {
        Some(text) if text.trim().chars().count() >= MIN_REPORT_CHARS => ReportContent {
            text: text.to_string(),
            used_fallback: false,
        },
        _ => ReportContent {
            text: fallback_report(uploaded_file, context),
            used_fallback: true,
        },
    }
}

/// Templated speech built from the filename and the start of the context.
pub fn fallback_report(uploaded_file: Option<&str>, context: &str) -> String {
    let source = uploaded_file.unwrap_or("document");
    let excerpt: String = context.chars().take(FALLBACK_CONTEXT_CHARS).collect();
    let key_points = if excerpt.trim().is_empty() {
        "The document content is still being analysed.".to_string()
    } else {
        excerpt
    };

    format!(
        "Weekly Meeting One-Minute Speech\n\
         \n\
         Hello, everyone.\n\
         \n\
         Today I will speak based on the uploaded document '{source}'.\n\
         \n\
         Key points:\n\
         {key_points}\n\
         \n\
         In conclusion, we will set our next plans based on this content.\n\
         \n\
         Thank you."
    )
}

/// `one_minute_speech_<8 hex>.<ext>`
pub fn report_filename(format: ReportFormat) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("one_minute_speech_{}.{}", &id[..8], format.extension())
}
