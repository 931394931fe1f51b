// Utility helpers for parsing, period keys and basic statistics.
//
// This module centralizes the "dirty" sheet handling so the engine and
// reports can assume typed values.
use chrono::{Datelike, Months, NaiveDate, NaiveDateTime};
use num_format::{Locale, ToFormattedString};

/// Parse a string-like value into `f64` while being forgiving about
/// formatting issues that are common in spreadsheet exports.
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
    let s = s.replace(',', "");
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Normalize an arrival date cell to a `YYYY-MM` period.
///
/// Empty cells give `None`. Anything non-empty that is not a recognised date
/// is returned trimmed but otherwise untouched; it will sort first later on.
pub fn normalize_period(s: Option<&str>) -> Option<String> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    Some(parse_month(s).map_or_else(|| s.to_string(), format_month))
}

fn parse_month(s: &str) -> Option<NaiveDate> {
    const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"];
    const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M:%S"];

    for f in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, f) {
            return d.with_day(1);
        }
    }
    for f in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, f) {
            return dt.date().with_day(1);
        }
    }
    // Year-month only: `2024-03`, `2024/3`.
    let (y, m) = s.split_once(['-', '/'])?;
    let year: i32 = y.trim().parse().ok()?;
    let month: u32 = m.trim().parse().ok()?;
    if y.trim().len() != 4 {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, 1)
}

fn format_month(d: NaiveDate) -> String {
    format!("{:04}-{:02}", d.year(), d.month())
}

/// `true` for a strict `YYYY-MM` period with a real month.
pub fn is_valid_period(s: &str) -> bool {
    let s = s.trim();
    s.len() == 7
        && s.as_bytes()[4] == b'-'
        && NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d").is_ok()
}

/// Integer ordering key for a period: `2024-03` becomes `202403`.
///
/// Anything that is not a valid `YYYY-MM` period maps to 0 so it sorts before
/// every real period.
pub fn period_key(s: &str) -> u32 {
    if !is_valid_period(s) {
        return 0;
    }
    s.trim().replace('-', "").parse::<u32>().unwrap_or(0)
}

/// The calendar month before `period`, or `None` when `period` is not a
/// valid `YYYY-MM` string.
pub fn prev_month(period: &str) -> Option<String> {
    if !is_valid_period(period) {
        return None;
    }
    let d = NaiveDate::parse_from_str(&format!("{}-01", period.trim()), "%Y-%m-%d").ok()?;
    d.checked_sub_months(Months::new(1)).map(format_month)
}

pub fn average(v: &[f64]) -> f64 {
    // Standard arithmetic mean; returns 0 for an empty slice to avoid NaNs.
    if v.is_empty() {
        return 0.0;
    }
    let sum: f64 = v.iter().copied().sum();
    sum / v.len() as f64
}

/// Mean of the values that are present, or `None` if none are.
pub fn mean_present<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let (sum, n) = values
        .into_iter()
        .flatten()
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        None
    } else {
        Some(sum / n as f64)
    }
}

/// Relative change in percent. A zero baseline gives 0 when nothing changed
/// and 100 otherwise.
pub fn percent_change(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        return if current == 0.0 { 0.0 } else { 100.0 };
    }
    (current - previous) / previous * 100.0
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals plus locale thousands separators, e.g. `1,234,567.89`.
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    }
    // Avoid printing "-0.00" for values that round to zero.
    if n.is_sign_negative() && res.chars().any(|c| c.is_ascii_digit() && c != '0') {
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

/// Ratio in [0, 1] rendered as a percentage with two decimals.
pub fn format_percent(ratio: f64) -> String {
    format!("{}%", format_number(ratio * 100.0, 2))
}

/// Period-over-period delta as an arrow: `↑1.50`, `↓2`, or empty for no
/// change. `render` formats the magnitude.
pub fn format_delta<F>(delta: f64, render: F) -> String
where
    F: Fn(f64) -> String,
{
    if delta > 0.0 {
        format!("↑{}", render(delta))
    } else if delta < 0.0 {
        format!("↓{}", render(delta.abs()))
    } else {
        String::new()
    }
}
