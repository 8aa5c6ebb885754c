//! Temporary index names: `temp-<session8>-<unix_secs>`.

use once_cell::sync::Lazy;
use regex::Regex;

pub const TEMP_INDEX_PREFIX: &str = "temp-";
/// Characters of the session hint kept in the name.
const HINT_LEN: usize = 8;

static TEMP_INDEX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^temp-.+-(\d+)$").unwrap());

/// Build an index name from a session hint and a creation time.
///
/// The hint is reduced to lowercase ASCII alphanumerics (index names allow
/// nothing else besides `-`); a random hint is used when none survives.
pub fn index_name(session_hint: Option<&str>, created_at_secs: i64) -> String {
    let hint: String = session_hint
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .take(HINT_LEN)
        .collect();

    let hint = if hint.is_empty() {
        uuid::Uuid::new_v4().simple().to_string()[..HINT_LEN].to_string()
    } else {
        hint
    };

    format!("{}{}-{}", TEMP_INDEX_PREFIX, hint, created_at_secs)
}

/// Creation timestamp embedded in a temporary index name.
pub fn created_at(name: &str) -> Option<i64> {
    TEMP_INDEX_RE
        .captures(name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Whether `name` is a temporary index older than `max_age_secs`.
pub fn is_expired(name: &str, now_secs: i64, max_age_secs: i64) -> bool {
    created_at(name)
        .map(|ts| now_secs - ts > max_age_secs)
        .unwrap_or(false)
}

/// Names from `names` that the cleanup sweep should delete.
pub fn expired<'a, I>(names: I, now_secs: i64, max_age_secs: i64) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    names
        .into_iter()
        .filter(|name| is_expired(name, now_secs, max_age_secs))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_name_from_session_id() {
        let name = index_name(Some("3F2A9C1E-77aa-4d0e-9e1b-000000000000"), 1_700_000_000);
        assert_eq!(name, "temp-3f2a9c1e-1700000000");
        assert_eq!(created_at(&name), Some(1_700_000_000));
    }

    #[test]
    fn test_index_name_random_hint() {
        let name = index_name(None, 42);
        assert!(name.starts_with("temp-"));
        assert!(name.ends_with("-42"));
        assert_eq!(name.len(), "temp-".len() + 8 + "-42".len());

        let from_symbols = index_name(Some("--__--"), 42);
        assert_eq!(from_symbols.len(), name.len());
    }

    #[test]
    fn test_created_at_rejects_foreign_names() {
        assert_eq!(created_at("production-index"), None);
        assert_eq!(created_at("temp-abc"), None);
        assert_eq!(created_at("temp-abc-notanumber"), None);
        assert_eq!(created_at("mytemp-abc-123"), None);
    }

    #[test]
    fn test_sweep_targets_only_old_temp_indexes() {
        let now = 1_700_010_000;
        let names = [
            "temp-aaaaaaaa-1700000000", // 10000s old
            "temp-bbbbbbbb-1700009000", // 1000s old
            "temp-cccccccc-1700006400", // exactly 3600s old: kept
            "temp-dddddddd-1700006399", // 3601s old
            "shared-docs",
            "temp-eeeeeeee-soon",
        ];
        let targets = expired(names.iter().copied(), now, 3600);
        assert_eq!(
            targets,
            vec!["temp-aaaaaaaa-1700000000", "temp-dddddddd-1700006399"]
        );
    }
}
