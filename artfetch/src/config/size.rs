//! Human-readable byte sizes ("50MB", "2 GB", "512k").

use thiserror::Error;

const KB: usize = 1024;
const MB: usize = KB * 1024;
const GB: usize = MB * 1024;

/// Suffixes longest first, so "MB" wins over "B".
const UNITS: [(&str, usize); 7] = [
    ("GB", GB),
    ("MB", MB),
    ("KB", KB),
    ("G", GB),
    ("M", MB),
    ("K", KB),
    ("B", 1),
];

/// A size string that could not be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid size '{input}' - expected a byte count or a value like '512KB', '50MB', '2GB'")]
pub struct SizeParseError {
    input: String,
}

/// Parse a size string into bytes.
///
/// Accepts a bare integer (bytes) or an integer followed by one of
/// `B`, `K`/`KB`, `M`/`MB`, `G`/`GB` (binary multiples, any case,
/// optional space before the unit).
///
/// ```
/// use artfetch::config::parse_size;
///
/// assert_eq!(parse_size("4096").unwrap(), 4096);
/// assert_eq!(parse_size("50MB").unwrap(), 50 * 1024 * 1024);
/// assert_eq!(parse_size("2 gb").unwrap(), 2 * 1024 * 1024 * 1024);
/// ```
pub fn parse_size(s: &str) -> Result<usize, SizeParseError> {
    let invalid = || SizeParseError {
        input: s.to_string(),
    };

    let trimmed = s.trim();
    let upper = trimmed.to_ascii_uppercase();
    let (digits, multiplier) = UNITS
        .iter()
        .find_map(|(suffix, mult)| upper.strip_suffix(suffix).map(|rest| (rest, *mult)))
        .unwrap_or((upper.as_str(), 1));

    let digits = digits.trim_end();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    digits
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(invalid)
}

/// Format bytes with the largest unit that divides them exactly.
///
/// ```
/// use artfetch::config::format_size;
///
/// assert_eq!(format_size(50 * 1024 * 1024), "50MB");
/// assert_eq!(format_size(1536), "1536");
/// ```
pub fn format_size(bytes: usize) -> String {
    for (suffix, unit) in [("GB", GB), ("MB", MB), ("KB", KB)] {
        if bytes >= unit && bytes % unit == 0 {
            return format!("{}{}", bytes / unit, suffix);
        }
    }
    bytes.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_size("0").unwrap(), 0);
        assert_eq!(parse_size("100B").unwrap(), 100);
        assert_eq!(parse_size("1k").unwrap(), KB);
        assert_eq!(parse_size("64KB").unwrap(), 64 * KB);
        assert_eq!(parse_size("50M").unwrap(), 50 * MB);
        assert_eq!(parse_size("50mb").unwrap(), 50 * MB);
        assert_eq!(parse_size("3G").unwrap(), 3 * GB);
    }

    #[test]
    fn test_parse_whitespace() {
        assert_eq!(parse_size("  2GB ").unwrap(), 2 * GB);
        assert_eq!(parse_size("500 MB").unwrap(), 500 * MB);
    }

    #[test]
    fn test_parse_invalid() {
        for bad in ["", "MB", "abc", "-1GB", "1.5GB", "2TB", "1 0MB"] {
            assert!(parse_size(bad).is_err(), "{:?} should not parse", bad);
        }
    }

    #[test]
    fn test_parse_overflow() {
        assert!(parse_size(&format!("{}GB", usize::MAX)).is_err());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0");
        assert_eq!(format_size(KB), "1KB");
        assert_eq!(format_size(50 * MB), "50MB");
        assert_eq!(format_size(2 * GB), "2GB");
        assert_eq!(format_size(GB + KB), format!("{}KB", (GB + KB) / KB));
        assert_eq!(format_size(1000), "1000");
    }

    #[test]
    fn test_format_then_parse_preserves_bytes() {
        for bytes in [1, 1000, KB, 50 * MB, 3 * GB] {
            assert_eq!(parse_size(&format_size(bytes)).unwrap(), bytes);
        }
    }
}
