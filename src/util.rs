// Parsing and formatting helpers.
//
// CSV cell cleanup lives here so the rest of the crate can work with typed
// `Option<f64>` scores and normalized code strings.
use num_format::{Locale, ToFormattedString};
use std::cmp::Ordering;

/// Parse a CSV cell into `f64`, forgiving the usual export noise.
///
/// - Trims whitespace.
/// - Rejects values that contain alphabetic characters.
/// - Strips thousands separators like `","` before parsing.
/// - Returns `None` for anything that cannot be safely parsed.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let s = s.replace(",", "");
    s.parse::<f64>().ok()
}

/// Normalize a categorical code cell.
///
/// Integral numbers written with a fractional part (`"1.0"`) collapse to
/// their integer spelling so `DT == 1` matches either export style. Other
/// codes (`"2NT"`, `"A1"`) are only trimmed. Blank cells become `None`.
pub fn normalize_code(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if s.contains('.') {
        if let Ok(v) = s.parse::<f64>() {
            if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
                return Some(format!("{}", v as i64));
            }
        }
    }
    Some(s.to_string())
}

/// Order for code values: numeric codes first, by value (`2` before `10`),
/// then the rest as text. Total even when a column mixes `"2"` and `"2NT"`.
pub fn compare_codes(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.total_cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// `compare_codes` applied element by element to multi-column keys.
pub fn compare_code_keys(a: &[String], b: &[String]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| compare_codes(x, y))
        .find(|o| *o != Ordering::Equal)
        .unwrap_or_else(|| a.len().cmp(&b.len()))
}

pub fn format_number(n: f64, decimals: usize) -> String {
    if !n.is_finite() {
        return "NaN".to_string();
    }
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    // num-format only groups integers, so the fraction is re-attached by hand.
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    }
    // "-0.00" reads badly in a table.
    if neg && res.chars().any(|c| c.is_ascii_digit() && c != '0') {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_opt(n: Option<f64>, decimals: usize) -> String {
    n.map(|v| format_number(v, decimals))
        .unwrap_or_else(|| "NaN".to_string())
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_f64_handles_noise() {
        assert_eq!(parse_f64_safe(Some(" 7.25 ")), Some(7.25));
        assert_eq!(parse_f64_safe(Some("1,250.5")), Some(1250.5));
        assert_eq!(parse_f64_safe(Some("")), None);
        assert_eq!(parse_f64_safe(Some("n/a")), None);
        assert_eq!(parse_f64_safe(None), None);
    }

    #[test]
    fn normalize_code_collapses_integral_floats() {
        assert_eq!(normalize_code("1.0").as_deref(), Some("1"));
        assert_eq!(normalize_code(" 2 ").as_deref(), Some("2"));
        assert_eq!(normalize_code("2NT").as_deref(), Some("2NT"));
        assert_eq!(normalize_code("1.5").as_deref(), Some("1.5"));
        assert_eq!(normalize_code("   "), None);
    }

    #[test]
    fn numeric_codes_order_by_value() {
        let mut codes = vec!["10", "2NT", "2", "1", "A1", "A"];
        codes.sort_by(|a, b| compare_codes(a, b));
        assert_eq!(codes, vec!["1", "2", "10", "2NT", "A", "A1"]);

        let k = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(
            compare_code_keys(&k(&["A", "2"]), &k(&["A", "10"])),
            Ordering::Less
        );
        assert_eq!(
            compare_code_keys(&k(&["B", "1"]), &k(&["A", "10"])),
            Ordering::Greater
        );
    }

    #[test]
    fn format_number_groups_and_rounds() {
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(-3.5, 1), "-3.5");
        assert_eq!(format_number(-0.001, 2), "0.00");
        assert_eq!(format_number(f64::NAN, 2), "NaN");
        assert_eq!(format_number(42.0, 0), "42");
        assert_eq!(format_opt(None, 2), "NaN");
    }

    #[test]
    fn format_int_groups() {
        assert_eq!(format_int(9855usize), "9,855");
    }
}
