//! Backup file naming: `<prefix>_<timestamp>.<ext>`
//!
//! Timestamps are UTC RFC 3339 with microseconds, with `:` and `.` replaced by
//! `-` so they are valid file names on every platform and sort
//! lexicographically in creation order, e.g. `2026-10-17T09-41-07-123456Z`.

use chrono::{DateTime, Utc};

/// Length of a sanitized timestamp (`YYYY-MM-DDTHH-MM-SS-ffffffZ`)
const TIMESTAMP_LEN: usize = 27;

/// Render `at` as a filename-safe, sortable timestamp
pub fn sanitized_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.6fZ")
        .to_string()
        .replace([':', '.'], "-")
}

pub fn backup_file_name(prefix: &str, timestamp: &str, extension: &str) -> String {
    format!("{prefix}_{timestamp}.{extension}")
}

/// Extract the timestamp from a backup file name, `None` if the name does not
/// follow the convention for `prefix` and one of `extensions`.
pub fn parse_backup_name<'a>(prefix: &str, file_name: &'a str, extensions: &[&str]) -> Option<&'a str> {
    let rest = file_name.strip_prefix(prefix)?.strip_prefix('_')?;
    let (timestamp, ext) = rest.rsplit_once('.')?;
    if !extensions.contains(&ext) || !is_sanitized_timestamp(timestamp) {
        return None;
    }
    Some(timestamp)
}

fn is_sanitized_timestamp(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == TIMESTAMP_LEN
        && bytes[TIMESTAMP_LEN - 1] == b'Z'
        && bytes[..TIMESTAMP_LEN - 1]
            .iter()
            .enumerate()
            .all(|(i, b)| match i {
                10 => *b == b'T',
                _ => b.is_ascii_digit() || *b == b'-',
            })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_has_no_unsafe_chars() {
        let at = Utc.with_ymd_and_hms(2026, 10, 17, 9, 41, 7).unwrap();
        let ts = sanitized_timestamp(at);
        assert_eq!(ts, "2026-10-17T09-41-07-000000Z");
        assert!(!ts.contains(':') && !ts.contains('.'));
    }

    #[test]
    fn test_timestamps_sort_in_creation_order() {
        let a = Utc.with_ymd_and_hms(2026, 1, 9, 23, 59, 59).unwrap();
        let b = a + chrono::Duration::microseconds(1);
        let c = Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap();
        let mut names = vec![sanitized_timestamp(c), sanitized_timestamp(a), sanitized_timestamp(b)];
        names.sort();
        assert_eq!(names, vec![sanitized_timestamp(a), sanitized_timestamp(b), sanitized_timestamp(c)]);
    }

    #[test]
    fn test_parse_backup_name() {
        let exts = ["db", "sql"];
        assert_eq!(
            parse_backup_name("crm_backup", "crm_backup_2026-10-17T09-41-07-123456Z.db", &exts),
            Some("2026-10-17T09-41-07-123456Z")
        );
        assert!(parse_backup_name("crm_backup", "crm_backup_2026-10-17T09-41-07-123456Z.db.partial", &exts).is_none());
        assert!(parse_backup_name("crm_backup", "crm_backup_notes.db", &exts).is_none());
        assert!(parse_backup_name("crm_backup", "crm.db", &exts).is_none());
        assert!(parse_backup_name("crm_backup", "crm_backup_2026-10-17T09-41-07-123456Z.txt", &exts).is_none());
    }
}
