//! Human-readable message size parsing.
//!
//! Sizes are a decimal number optionally followed by a single binary
//! multiplier suffix:
//!
//! | Suffix | Multiplier |
//! |--------|------------|
//! | none   | 1          |
//! | `k`    | 2^10       |
//! | `m`    | 2^20       |
//! | `g`    | 2^30       |
//!
//! Suffixes are case-insensitive and the mantissa may be fractional
//! (`1.5m` is 1572864 bytes).

use crate::error::{Error, Result};

const KIB: f64 = (1u64 << 10) as f64;
const MIB: f64 = (1u64 << 20) as f64;
const GIB: f64 = (1u64 << 30) as f64;

/// Parse a size string such as `512`, `64k`, `1m` or `2G` into bytes.
///
/// The result is truncated towards zero after applying the multiplier.
pub fn parse_size(input: &str) -> Result<usize> {
    let invalid = |reason: String| Error::InvalidSize {
        input: input.to_string(),
        reason,
    };

    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (mantissa, suffix) = trimmed.split_at(split);

    if mantissa.is_empty() {
        return Err(invalid("missing numeric value".into()));
    }
    let value: f64 = mantissa
        .parse()
        .map_err(|_| invalid(format!("'{mantissa}' is not a number")))?;

    let mut chars = suffix.chars();
    let multiplier = match chars.next().map(|c| c.to_ascii_lowercase()) {
        None => 1.0,
        Some('k') => KIB,
        Some('m') => MIB,
        Some('g') => GIB,
        Some(other) => return Err(invalid(format!("unknown size suffix '{other}'"))),
    };
    if let Some(extra) = chars.next() {
        return Err(invalid(format!("unexpected trailing character '{extra}'")));
    }

    let bytes = value * multiplier;
    if !bytes.is_finite() || bytes > usize::MAX as f64 {
        return Err(invalid("size does not fit in memory".into()));
    }
    Ok(bytes as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_bytes() {
        assert_eq!(parse_size("1024").unwrap(), 1024);
        assert_eq!(parse_size("0").unwrap(), 0);
    }

    #[test]
    fn binary_suffixes() {
        assert_eq!(parse_size("4k").unwrap(), 4096);
        assert_eq!(parse_size("512K").unwrap(), 512 * 1024);
        assert_eq!(parse_size("1m").unwrap(), 1 << 20);
        assert_eq!(parse_size("2G").unwrap(), 2 << 30);
    }

    #[test]
    fn fractional_mantissa_truncates() {
        assert_eq!(parse_size("1.5m").unwrap(), 1_572_864);
        assert_eq!(parse_size("0.5k").unwrap(), 512);
        assert_eq!(parse_size("1.7").unwrap(), 1);
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert_eq!(parse_size(" 8k ").unwrap(), 8192);
    }

    #[test]
    fn unknown_suffix_is_rejected() {
        let err = parse_size("3t").unwrap_err();
        assert!(matches!(err, Error::InvalidSize { .. }));
        assert!(format!("{err}").contains("unknown size suffix 't'"), "got: {err}");
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        assert!(parse_size("1kb").is_err());
        assert!(parse_size("1m2").is_err());
    }

    #[test]
    fn missing_or_malformed_number_is_rejected() {
        assert!(parse_size("").is_err());
        assert!(parse_size("k").is_err());
        assert!(parse_size("-4k").is_err());
        assert!(parse_size("1.2.3m").is_err());
    }
}
