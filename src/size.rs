use {crate::SinkError, std::str::FromStr};

/// Defines size thresholds for rotating log files in various units.
///
/// When the live file reaches the specified size after a write, it is
/// archived and truncated. Units are binary:
///
/// * `Bytes` - Direct byte count (e.g., 1048576 bytes)
/// * `KB` - Kilobytes (1 KB = 1024 bytes)
/// * `MB` - Megabytes (1 MB = 1024 KB)
/// * `GB` - Gigabytes (1 GB = 1024 MB)
///
/// A `RotationSize` can also be parsed from the human readable form used in
/// configuration files:
///
/// ```
/// use filelog_rotator::RotationSize;
///
/// let size: RotationSize = "2M".parse().unwrap();
/// assert_eq!(size.bytes(), 2 * 1024 * 1024);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationSize {
    /// Raw byte count
    Bytes(u64),
    /// Kilobytes (1 KB = 1024 bytes)
    KB(u64),
    /// Megabytes (1 MB = 1024 KB = 1,048,576 bytes)
    MB(u64),
    /// Gigabytes (1 GB = 1024 MB = 1,073,741,824 bytes)
    GB(u64),
}

impl RotationSize {
    /// Get the threshold in bytes, saturating at `u64::MAX`.
    pub fn bytes(&self) -> u64 {
        match self {
            RotationSize::Bytes(b) => *b,
            RotationSize::KB(kb) => kb.saturating_mul(1024),
            RotationSize::MB(mb) => mb.saturating_mul(1024 * 1024),
            RotationSize::GB(gb) => gb.saturating_mul(1024 * 1024 * 1024),
        }
    }
}

impl FromStr for RotationSize {
    type Err = SinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (digits, unit) = split_size_spec(s)?;
        let value = parse_digits(s, digits)?;
        let size = match unit {
            None => RotationSize::Bytes(value),
            Some('k') => RotationSize::KB(value),
            Some('m') => RotationSize::MB(value),
            Some('g') => RotationSize::GB(value),
            Some(_) => return Err(SinkError::InvalidSizeSpec(s.to_string())),
        };
        // Reject specs that only fit after saturation.
        size.checked_bytes().ok_or_else(|| SinkError::InvalidSizeSpec(s.to_string()))?;
        Ok(size)
    }
}

impl RotationSize {
    fn checked_bytes(&self) -> Option<u64> {
        match self {
            RotationSize::Bytes(b) => Some(*b),
            RotationSize::KB(kb) => kb.checked_mul(1024),
            RotationSize::MB(mb) => mb.checked_mul(1024 * 1024),
            RotationSize::GB(gb) => gb.checked_mul(1024 * 1024 * 1024),
        }
    }
}

/// Parse a human readable size such as `"2M"`, `"500K"`, `"1g"` or `"10"`
/// into a byte count.
///
/// The suffix is case-insensitive and optional; without one the value is
/// taken as bytes. Leading and trailing whitespace is ignored.
///
/// # Errors
/// Returns [`SinkError::InvalidSizeSpec`] when the spec is empty, is not an
/// unsigned integer, carries an unknown suffix, or overflows `u64`.
pub fn parse_size(spec: &str) -> Result<u64, SinkError> {
    spec.parse::<RotationSize>().map(|size| size.bytes())
}

/// Split a spec into its digit part and an optional lowercased unit.
fn split_size_spec(spec: &str) -> Result<(&str, Option<char>), SinkError> {
    let trimmed = spec.trim();
    let last = trimmed
        .chars()
        .last()
        .ok_or_else(|| SinkError::InvalidSizeSpec(spec.to_string()))?;
    if last.is_ascii_digit() {
        return Ok((trimmed, None));
    }
    let digits = &trimmed[..trimmed.len() - last.len_utf8()];
    Ok((digits, Some(last.to_ascii_lowercase())))
}

fn parse_digits(spec: &str, digits: &str) -> Result<u64, SinkError> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SinkError::InvalidSizeSpec(spec.to_string()));
    }
    digits
        .parse::<u64>()
        .map_err(|_| SinkError::InvalidSizeSpec(spec.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_size("2M").unwrap(), 2 * 1024 * 1024);
        assert_eq!(parse_size("500K").unwrap(), 500 * 1024);
        assert_eq!(parse_size("1G").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(parse_size("10").unwrap(), 10);
        assert_eq!(parse_size("0").unwrap(), 0);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(parse_size("2m").unwrap(), parse_size("2M").unwrap());
        assert_eq!(parse_size("3k").unwrap(), 3 * 1024);
        assert_eq!(parse_size(" 4g ").unwrap(), 4 * 1024 * 1024 * 1024);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for spec in ["", "   ", "2X", "M", "-1", "+5", "1.5M", "2MB", "abc", "12 K", "１２"] {
            assert!(
                matches!(parse_size(spec), Err(SinkError::InvalidSizeSpec(_))),
                "expected '{spec}' to be rejected"
            );
        }
    }

    #[test]
    fn test_parse_rejects_overflow() {
        assert!(parse_size("18446744073709551615").is_ok());
        assert!(parse_size("18446744073709551616").is_err());
        assert!(parse_size("17179869184G").is_err());
    }

    #[test]
    fn test_rotation_size_from_str() {
        assert_eq!("256K".parse::<RotationSize>().unwrap(), RotationSize::KB(256));
        assert_eq!("7".parse::<RotationSize>().unwrap(), RotationSize::Bytes(7));
        assert_eq!(RotationSize::MB(100).bytes(), 100 * 1024 * 1024);
        assert_eq!(RotationSize::GB(2).bytes(), 2 * 1024 * 1024 * 1024);
    }
}
