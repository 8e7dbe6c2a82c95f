//! Deterministic artifact naming for uploaded recordings.

use chrono::{DateTime, FixedOffset, Offset, Utc};

/// Characters that are unsafe in object keys and common filesystems.
const RESERVED_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '*'];

/// Placeholder used when the transcript sanitizes to nothing ("untitled").
pub const UNTITLED_PLACEHOLDER: &str = "未命名";

/// Placeholder used when the dialect sanitizes to nothing.
pub const UNKNOWN_DIALECT: &str = "unknown";

/// Timestamps are always rendered in UTC+8.
const NAMING_UTC_OFFSET_SECS: i32 = 8 * 3600;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Builds the base name `{timestamp}-{dialect}-{text}[--{transliteration}]`.
///
/// Only ASCII spaces are removed from the text preview. Two uploads in the
/// same second with the same dialect and text get the same name.
pub fn artifact_base_name(
    text: &str,
    dialect: &str,
    transliteration: &str,
    now: DateTime<Utc>,
) -> String {
    let preview = strip_reserved(text);
    let preview = if preview.is_empty() {
        UNTITLED_PLACEHOLDER.to_string()
    } else {
        preview
    };
    let preview = preview.replace(' ', "");

    let dialect = strip_reserved(dialect);
    let dialect = if dialect.is_empty() {
        UNKNOWN_DIALECT.to_string()
    } else {
        dialect
    };

    let transliteration = strip_reserved(transliteration);
    let timestamp = format_timestamp(now);

    if transliteration.is_empty() {
        format!("{}-{}-{}", timestamp, dialect, preview)
    } else {
        format!("{}-{}-{}--{}", timestamp, dialect, preview, transliteration)
    }
}

/// Formats `now` as `YYYYMMDD-HHMMSS` in UTC+8.
pub fn format_timestamp(now: DateTime<Utc>) -> String {
    let offset = FixedOffset::east_opt(NAMING_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix());
    now.with_timezone(&offset)
        .format("%Y%m%d-%H%M%S")
        .to_string()
}

fn strip_reserved(value: &str) -> String {
    value.chars().filter(|c| !RESERVED_CHARS.contains(c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        // 2024-03-01 17:05:09 UTC, i.e. 2024-03-02 01:05:09 in UTC+8
        Utc.with_ymd_and_hms(2024, 3, 1, 17, 5, 9).unwrap()
    }

    #[test]
    fn test_timestamp_uses_utc_plus_eight() {
        assert_eq!(format_timestamp(fixed_now()), "20240302-010509");
    }

    #[test]
    fn test_basic_name() {
        assert_eq!(
            artifact_base_name("hello world", "Min", "", fixed_now()),
            "20240302-010509-Min-helloworld"
        );
    }

    #[test]
    fn test_transliteration_suffix() {
        assert_eq!(
            artifact_base_name("食饭", "Hokkien", "chia̍h-pn̄g", fixed_now()),
            "20240302-010509-Hokkien-食饭--chia̍h-pn̄g"
        );
        // Sanitizes to empty, so no suffix
        assert_eq!(
            artifact_base_name("a", "b", "*|/", fixed_now()),
            "20240302-010509-b-a"
        );
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(
            artifact_base_name("<>:\"", "", "", fixed_now()),
            format!("20240302-010509-unknown-{}", UNTITLED_PLACEHOLDER)
        );
        assert_eq!(
            artifact_base_name("x", "/\\", "", fixed_now()),
            "20240302-010509-unknown-x"
        );
    }

    #[test]
    fn test_only_ascii_spaces_are_removed() {
        assert_eq!(
            artifact_base_name("a b\tc\u{3000}d", "Wu", "", fixed_now()),
            "20240302-010509-Wu-ab\tc\u{3000}d"
        );
        // Spaces survive in dialect and transliteration
        assert_eq!(
            artifact_base_name("t", "Min Nan", "a b", fixed_now()),
            "20240302-010509-Min Nan-t--a b"
        );
    }

    #[test]
    fn test_no_reserved_characters_survive() {
        let inputs = [
            ("a<b>c", "d:i/a", "t\\r|a*n"),
            ("\"quoted\"", "x|y", "**"),
            ("../../etc/passwd", "..\\..", "a:b"),
            ("", "", ""),
        ];
        for (text, dialect, translit) in inputs {
            let name = artifact_base_name(text, dialect, translit, fixed_now());
            assert!(
                !name.contains(RESERVED_CHARS),
                "reserved character in {:?}",
                name
            );
            let sanitized_translit = strip_reserved(translit);
            assert_eq!(
                name.contains("--"),
                !sanitized_translit.is_empty(),
                "unexpected suffix state in {:?}",
                name
            );
        }
    }

    #[test]
    fn test_system_clock_is_close_to_now() {
        let before = Utc::now();
        let now = SystemClock.now();
        assert!(now >= before);
    }
}
