// Utility helpers for parsing cells and basic statistics.
//
// Indicator tables come out of spreadsheets, so cell handling is forgiving
// here and the rest of the code can assume typed values.
use num_format::{Locale, ToFormattedString};
use std::cmp::Ordering;

/// Parse a spreadsheet cell into `f64`.
///
/// - Trims whitespace.
/// - Rejects values that contain alphabetic characters other than an exponent.
/// - Rejects `","`: in normalised values it is a decimal comma, not a
///   thousands separator, and guessing either way corrupts the number.
/// - Returns `None` for anything that cannot be safely parsed.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() || s.contains(',') {
        return None;
    }
    if s.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn average(v: &[f64]) -> f64 {
    // Arithmetic mean; 0 for an empty slice to avoid NaNs.
    if v.is_empty() {
        return 0.0;
    }
    let sum: f64 = v.iter().copied().sum();
    sum / v.len() as f64
}

pub fn median(mut v: Vec<f64>) -> f64 {
    // Takes the Vec by value so it can sort in place. Even counts average the
    // two middle values.
    if v.is_empty() {
        return 0.0;
    }
    v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = v.len() / 2;
    if v.len() % 2 == 1 {
        v[mid]
    } else {
        (v[mid - 1] + v[mid]) / 2.0
    }
}

/// Descending comparison for scores, NaN-tolerant.
pub fn descending(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

pub fn round_to(n: f64, decimals: i32) -> f64 {
    let p = 10f64.powi(decimals);
    (n * p).round() / p
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals with locale-aware thousands separators (`1,234.56`).
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        res.push('.');
        res.push_str(frac);
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
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
    fn parses_spreadsheet_cells() {
        assert_eq!(parse_f64_safe(Some(" 0.397905759 ")), Some(0.397905759));
        assert_eq!(parse_f64_safe(Some("1,2")), None);
        assert_eq!(parse_f64_safe(Some("1,060")), None);
        assert_eq!(parse_f64_safe(Some("1e-3")), Some(0.001));
        assert_eq!(parse_f64_safe(Some("n/a")), None);
        assert_eq!(parse_f64_safe(Some("")), None);
        assert_eq!(parse_f64_safe(None), None);
    }

    #[test]
    fn median_averages_even_counts() {
        assert_eq!(median(vec![3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(vec![4.0, 1.0, 2.0, 3.0]), 2.5);
        assert_eq!(median(Vec::new()), 0.0);
    }

    #[test]
    fn formats_with_separators() {
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(-0.5, 2), "-0.50");
        assert_eq!(format_number(0.0, 0), "0");
        assert_eq!(format_int(9855), "9,855");
    }
}
