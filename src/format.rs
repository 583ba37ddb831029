//! Display formatting for ledger cells. Every input has a defined output;
//! nothing here returns an error.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta};

use crate::model::CellValue;

pub const INVALID_DATE: &str = "Invalid Date";

const MS_PER_DAY: f64 = 86_400_000.0;

/// Date-only layouts accepted for textual dates, tried in order.
const DATE_FORMATS: &[&str] = &[
    "%d %b %Y",
    "%d %B %Y",
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d-%b-%Y",
    "%d-%b-%y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
    "%a %b %d %Y",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Day 0 of the spreadsheet serial calendar (1899-12-30).
fn serial_epoch() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1899, 12, 30).and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn date_from_serial(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() {
        return None;
    }
    let ms = (serial * MS_PER_DAY).round();
    if ms.abs() > i64::MAX as f64 {
        return None;
    }
    let delta = TimeDelta::try_milliseconds(ms as i64)?;
    serial_epoch()?.checked_add_signed(delta).map(|dt| dt.date())
}

fn date_from_text(text: &str) -> Option<NaiveDate> {
    // Numeric text is a serial that was stringified upstream.
    if let Ok(serial) = text.parse::<f64>() {
        return date_from_serial(serial);
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.date_naive()))
        .or_else(|| DateTime::parse_from_rfc2822(text).ok().map(|dt| dt.date_naive()))
}

fn display_date(date: NaiveDate) -> String {
    date.format("%d %b %Y").to_string()
}

/// Format a spreadsheet date cell as "DD Mon YYYY".
///
/// Numbers are day serials counted from 1899-12-30. Empty (falsy) cells give
/// an empty string; anything unparsable gives [`INVALID_DATE`].
pub fn format_date(raw: &CellValue) -> String {
    if !raw.is_truthy() {
        return String::new();
    }
    let parsed = match raw {
        CellValue::Number(serial) => date_from_serial(*serial),
        CellValue::Text(text) => {
            let text = text.trim();
            if text.is_empty() {
                return String::new();
            }
            date_from_text(text)
        }
        CellValue::Bool(_) | CellValue::Empty => None,
    };
    match parsed {
        Some(date) => display_date(date),
        None => {
            log::warn!("Unparsable date value {raw:?}");
            INVALID_DATE.to_string()
        }
    }
}

/// Format a textual date; convenience over [`format_date`].
pub fn format_date_text(raw: &str) -> String {
    format_date(&CellValue::Text(raw.to_string()))
}

/// Format an amount with two decimals and thousands separators.
///
/// Empty input passes through unchanged. Separators already present are
/// ignored when parsing, so formatting is stable under repetition.
/// Unparsable amounts degrade to an empty cell.
pub fn format_currency(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return raw.to_string();
    }
    let cleaned: String = trimmed.chars().filter(|c| *c != ',').collect();
    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() => group_thousands(value),
        _ => {
            log::warn!("Unparsable amount {raw:?}");
            String::new()
        }
    }
}

fn group_thousands(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3 + 4);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let negative = value < 0.0 && fixed != "0.00";
    format!("{}{grouped}.{frac_part}", if negative { "-" } else { "" })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_formats_to_calendar_date() {
        assert_eq!(format_date(&CellValue::Number(45356.0)), "05 Mar 2024");
        assert_eq!(format_date(&CellValue::Number(1.0)), "31 Dec 1899");
        // Time-of-day fractions do not move the date.
        assert_eq!(format_date(&CellValue::Number(45356.75)), "05 Mar 2024");
    }

    #[test]
    fn textual_dates_are_normalized() {
        assert_eq!(format_date_text("2024-03-05"), "05 Mar 2024");
        assert_eq!(format_date_text("Mar 5, 2024"), "05 Mar 2024");
        assert_eq!(format_date_text("03/05/2024"), "05 Mar 2024");
        assert_eq!(format_date_text("05 Mar 2024"), "05 Mar 2024");
        assert_eq!(format_date_text("2024-03-05T10:30:00"), "05 Mar 2024");
    }

    #[test]
    fn degenerate_dates_use_sentinels() {
        assert_eq!(format_date(&CellValue::Empty), "");
        assert_eq!(format_date_text(""), "");
        assert_eq!(format_date_text("   "), "");
        assert_eq!(format_date(&CellValue::Number(0.0)), "");
        assert_eq!(format_date_text("not a date"), INVALID_DATE);
        assert_eq!(format_date(&CellValue::Bool(true)), INVALID_DATE);
        assert_eq!(format_date(&CellValue::Number(f64::INFINITY)), INVALID_DATE);
        assert_eq!(format_date(&CellValue::Number(1e300)), INVALID_DATE);
    }

    #[test]
    fn currency_has_two_decimals_and_separators() {
        assert_eq!(format_currency("1000"), "1,000.00");
        assert_eq!(format_currency("1234567.891"), "1,234,567.89");
        assert_eq!(format_currency("0.5"), "0.50");
        assert_eq!(format_currency("-2500"), "-2,500.00");
        assert_eq!(format_currency("999"), "999.00");
        assert_eq!(format_currency("-0.001"), "0.00");
    }

    #[test]
    fn currency_passes_empty_and_degrades_garbage() {
        assert_eq!(format_currency(""), "");
        assert_eq!(format_currency("abc"), "");
        assert_eq!(format_currency("NaN"), "");
    }

    #[test]
    fn currency_formatting_is_stable() {
        for raw in ["1000", "1234567.5", "-42.1", "0", "98765.4321"] {
            let once = format_currency(raw);
            assert_eq!(format_currency(&once), once, "input {raw}");
        }
    }
}
