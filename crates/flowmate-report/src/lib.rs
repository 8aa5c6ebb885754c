//! FlowMate Report: one-minute speech documents.
//!
//! `compose` decides what text goes into a report (model output or the
//! templated fallback); `writer` renders it to a downloadable file.

pub mod compose;
pub mod writer;

pub use compose::{
    choose_content, fallback_report, report_filename, ReportContent, ReportFormat,
    FALLBACK_SEARCH_QUERY, MIN_REPORT_CHARS,
};
pub use writer::{render_docx, render_txt, write_report, TXT_HEADER};
