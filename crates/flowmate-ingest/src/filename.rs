//! Upload filename policy: sanitising and collision-free placement.

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};

/// Reduce a client-supplied filename to a safe single path component.
///
/// Keeps Unicode letters and digits, `.`, `-` and `_`; whitespace becomes `_`.
/// Returns `None` when nothing usable is left.
pub fn sanitize_filename(name: &str) -> Option<String> {
    // Clients on Windows send backslash paths.
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let mut cleaned = String::with_capacity(base.len());
    for c in base.chars() {
        if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
            cleaned.push(c);
        } else if c.is_whitespace() {
            cleaned.push('_');
        }
    }

    let cleaned = cleaned.trim_start_matches(['.', '_']).trim_end_matches('.');
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// Lowercase extension with leading dot, or an empty string.
pub fn dotted_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

/// Claim the first free name for `filename` in `dir`, appending `_1`, `_2`, …
/// to the stem.
///
/// The file is created empty with `create_new`, so concurrent callers never
/// receive the same path.
pub fn claim_unique_path(dir: &Path, filename: &str) -> io::Result<PathBuf> {
    let path = Path::new(filename);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);
    let ext = path.extension().and_then(|e| e.to_str());

    let mut counter = 0usize;
    loop {
        let name = match (counter, ext) {
            (0, _) => filename.to_string(),
            (n, Some(ext)) => format!("{}_{}.{}", stem, n, ext),
            (n, None) => format!("{}_{}", stem, n),
        };
        let candidate = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => counter += 1,
            Err(e) => return Err(e),
        }
    }
}
