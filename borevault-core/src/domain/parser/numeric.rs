// borevault-core/src/domain/parser/numeric.rs
//
// Cell-level coercions shared by both dialects. Spreadsheet exports carry a
// small set of junk sentinels in numeric columns; all of them become None.
// Numeric 0 is a value, never a sentinel.

/// Sentinels that mean "no value" in numeric cells.
const NUMERIC_SENTINELS: [&str; 3] = ["-", "#VALUE!", "[object Object]"];

pub fn safe_number(value: Option<&str>) -> Option<f64> {
    let raw = value?.trim();
    if raw.is_empty() || NUMERIC_SENTINELS.contains(&raw) {
        return None;
    }
    raw.parse::<f64>().ok()
}

pub fn safe_int(value: Option<&str>) -> Option<i64> {
    safe_number(value).map(|n| n as i64)
}

/// Trim whitespace; empty-after-trim maps to None.
pub fn safe_string(value: Option<&str>) -> Option<String> {
    let trimmed = value?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn calculate_thickness(depth_from: f64, depth_to: f64) -> f64 {
    crate::domain::borelog::round_depth(depth_to - depth_from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels_become_none() {
        assert_eq!(safe_number(Some("-")), None);
        assert_eq!(safe_number(Some("#VALUE!")), None);
        assert_eq!(safe_number(Some("[object Object]")), None);
        assert_eq!(safe_number(Some("")), None);
        assert_eq!(safe_number(Some("   ")), None);
        assert_eq!(safe_number(None), None);
    }

    #[test]
    fn test_zero_is_a_value() {
        assert_eq!(safe_number(Some("0")), Some(0.0));
        assert_eq!(safe_int(Some("0")), Some(0));
    }

    #[test]
    fn test_plain_numbers() {
        assert_eq!(safe_number(Some(" 2.75 ")), Some(2.75));
        assert_eq!(safe_int(Some("12")), Some(12));
        assert_eq!(safe_int(Some("12.0")), Some(12));
        assert_eq!(safe_number(Some("12,5")), None);
    }

    #[test]
    fn test_safe_string_trims() {
        assert_eq!(safe_string(Some("  silty sand ")), Some("silty sand".into()));
        assert_eq!(safe_string(Some("   ")), None);
        assert_eq!(safe_string(None), None);
    }

    #[test]
    fn test_thickness_rounds_to_3_places() {
        assert_eq!(calculate_thickness(1.0, 2.3335), 1.334);
        assert_eq!(calculate_thickness(2.5, 4.0), 1.5);
    }
}
