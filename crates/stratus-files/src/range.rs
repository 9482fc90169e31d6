//! HTTP Range header parsing
//!
//! Supports the single-range forms of RFC 7233: `bytes=S-E`, `bytes=S-` and
//! `bytes=-N`. A malformed header is an invalid argument; a syntactically
//! valid range that misses the object is answered 416 via
//! [`CoreError::RangeNotSatisfiable`].

use stratus_core::domain::CoreError;

/// A resolved byte range against a concrete object size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSpec {
    /// First byte, inclusive
    pub start: u64,
    /// Last byte, inclusive
    pub end: u64,
    /// Total object size the range was resolved against
    pub total: u64,
}

impl RangeSpec {
    /// Full-object pseudo-range used when no Range header is present.
    pub fn whole(total: u64) -> Self {
        Self {
            start: 0,
            end: total.saturating_sub(1),
            total,
        }
    }

    pub fn length(&self) -> u64 {
        if self.total == 0 {
            0
        } else {
            self.end - self.start + 1
        }
    }
}

/// Parses a `Range` header value against `object_size`.
pub fn parse_range_header(header: &str, object_size: u64) -> Result<RangeSpec, CoreError> {
    let spec = header
        .trim()
        .strip_prefix("bytes=")
        .ok_or_else(|| CoreError::InvalidArgument(format!("unsupported range unit: {header:?}")))?;

    if spec.contains(',') {
        return Err(CoreError::InvalidArgument(
            "multi-range requests are not supported".to_string(),
        ));
    }

    let (start_str, end_str) = spec
        .split_once('-')
        .ok_or_else(|| CoreError::InvalidArgument(format!("malformed range: {header:?}")))?;
    let start_str = start_str.trim();
    let end_str = end_str.trim();

    if start_str.is_empty() && end_str.is_empty() {
        return Err(CoreError::InvalidArgument("empty range".to_string()));
    }

    let parse = |s: &str| -> Result<u64, CoreError> {
        s.parse()
            .map_err(|_| CoreError::InvalidArgument(format!("malformed range: {header:?}")))
    };

    let (start, end) = if start_str.is_empty() {
        // bytes=-N: the final N bytes, clamped to the start of the object
        let suffix = parse(end_str)?;
        if suffix == 0 {
            return Err(CoreError::RangeNotSatisfiable { total: object_size });
        }
        (
            object_size.saturating_sub(suffix),
            object_size.saturating_sub(1),
        )
    } else {
        let start = parse(start_str)?;
        let end = if end_str.is_empty() {
            object_size.saturating_sub(1)
        } else {
            parse(end_str)?
        };
        (start, end)
    };

    if object_size == 0 || start > end || end >= object_size {
        return Err(CoreError::RangeNotSatisfiable { total: object_size });
    }

    Ok(RangeSpec {
        start,
        end,
        total: object_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_range() {
        let spec = parse_range_header("bytes=500-999", 1_000_000).unwrap();
        assert_eq!(spec.start, 500);
        assert_eq!(spec.end, 999);
        assert_eq!(spec.length(), 500);
    }

    #[test]
    fn test_single_byte() {
        let spec = parse_range_header("bytes=0-0", 100).unwrap();
        assert_eq!(spec.length(), 1);
    }

    #[test]
    fn test_open_ended() {
        let spec = parse_range_header("bytes=10-", 100).unwrap();
        assert_eq!(spec.start, 10);
        assert_eq!(spec.end, 99);
    }

    #[test]
    fn test_suffix() {
        let spec = parse_range_header("bytes=-30", 100).unwrap();
        assert_eq!(spec.start, 70);
        assert_eq!(spec.end, 99);

        // suffix longer than the object clamps to the start
        let spec = parse_range_header("bytes=-500", 100).unwrap();
        assert_eq!(spec.start, 0);
        assert_eq!(spec.end, 99);
    }

    #[test]
    fn test_out_of_bounds_is_416() {
        assert!(matches!(
            parse_range_header("bytes=100-200", 100),
            Err(CoreError::RangeNotSatisfiable { total: 100 })
        ));
        assert!(matches!(
            parse_range_header("bytes=50-40", 100),
            Err(CoreError::RangeNotSatisfiable { .. })
        ));
        assert!(matches!(
            parse_range_header("bytes=0-", 0),
            Err(CoreError::RangeNotSatisfiable { total: 0 })
        ));
        assert!(matches!(
            parse_range_header("bytes=-0", 100),
            Err(CoreError::RangeNotSatisfiable { .. })
        ));
    }

    #[test]
    fn test_malformed_is_invalid_argument() {
        for header in ["items=0-1", "bytes=", "bytes=a-b", "bytes=1-2,5-9", "0-100"] {
            assert!(
                matches!(
                    parse_range_header(header, 100),
                    Err(CoreError::InvalidArgument(_))
                ),
                "header {header:?} should be invalid"
            );
        }
    }

    #[test]
    fn test_whole() {
        let spec = RangeSpec::whole(10);
        assert_eq!(spec.start, 0);
        assert_eq!(spec.end, 9);
        assert_eq!(spec.length(), 10);
        assert_eq!(RangeSpec::whole(0).length(), 0);
    }
}
