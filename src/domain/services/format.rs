use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const NL_MONTH_ABBR: [&str; 12] = [
    "jan", "feb", "mrt", "apr", "mei", "jun", "jul", "aug", "sep", "okt", "nov", "dec",
];

const NL_MONTH: [&str; 12] = [
    "januari",
    "februari",
    "maart",
    "april",
    "mei",
    "juni",
    "juli",
    "augustus",
    "september",
    "oktober",
    "november",
    "december",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhoneFormat {
    /// Digits only, national trunk `0` replaced by the country code.
    #[default]
    International,
    /// Trust the sheet, only undo float rendering (`31612345678.0`).
    AsIs,
    /// Trimmed value with a leading `+`.
    PlusPrefix,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueFormat {
    #[default]
    Text,
    /// `3 mrt 25`
    DateShort,
    /// `3 maart 2025`
    DateLong,
}

/// Renders a cell as the plain string a template parameter expects.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(f) = n.as_f64() {
                if !f.is_finite() {
                    String::new()
                } else if f.fract() == 0.0 && f.abs() < 1e15 {
                    (f as i64).to_string()
                } else {
                    f.to_string()
                }
            } else {
                n.to_string()
            }
        }
        Value::String(s) => {
            let trimmed = s.trim();
            match trimmed.to_ascii_lowercase().as_str() {
                "nan" | "inf" | "-inf" | "none" | "null" => String::new(),
                _ => trimmed.to_string(),
            }
        }
        // Airtable lookup and multi-select fields arrive as arrays.
        Value::Array(items) => items
            .iter()
            .map(cell_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => value.to_string(),
    }
}

pub fn format_phone(raw: &Value, format: PhoneFormat, country_code: &str) -> Option<String> {
    let text = cell_text(raw);
    if text.is_empty() {
        return None;
    }

    match format {
        PhoneFormat::International => {
            let mut digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
            if digits.is_empty() {
                return None;
            }
            if let Some(rest) = digits.strip_prefix("00") {
                digits = rest.to_string();
            }
            let subscriber = digits
                .strip_prefix('0')
                .or_else(|| digits.strip_prefix(country_code))
                .unwrap_or(&digits);
            if subscriber.is_empty() {
                return None;
            }
            Some(format!("{}{}", country_code, subscriber))
        }
        PhoneFormat::AsIs => {
            let phone = text.strip_suffix(".0").unwrap_or(&text).trim();
            (!phone.is_empty()).then(|| phone.to_string())
        }
        PhoneFormat::PlusPrefix => {
            if text.starts_with('+') {
                Some(text)
            } else {
                Some(format!("+{}", text))
            }
        }
    }
}

pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
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
}

pub fn format_date_short(date: NaiveDate) -> String {
    use chrono::Datelike;
    format!(
        "{} {} {:02}",
        date.day(),
        NL_MONTH_ABBR[date.month0() as usize],
        date.year().rem_euclid(100)
    )
}

pub fn format_date_long(date: NaiveDate) -> String {
    use chrono::Datelike;
    format!("{} {} {}", date.day(), NL_MONTH[date.month0() as usize], date.year())
}

/// Applies a parameter format. Dates that do not parse are passed through unchanged.
pub fn format_value(value: &Value, format: ValueFormat) -> String {
    let text = cell_text(value);
    let render: fn(NaiveDate) -> String = match format {
        ValueFormat::Text => return text,
        ValueFormat::DateShort => format_date_short,
        ValueFormat::DateLong => format_date_long,
    };

    match parse_date(&text) {
        Some(date) => render(date),
        None => {
            if !text.is_empty() {
                tracing::warn!("⚠️ Could not parse date '{}', using it unchanged", text);
            }
            text
        }
    }
}

/// Planning portal link: `base` followed by base64 of `location,email,planregel`.
pub fn plan_url(base_url: &str, location: &str, email: &str, planregel: &str) -> String {
    let combined = format!("{},{},{}", location, email, planregel);
    format!("{}{}", base_url, STANDARD.encode(combined.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_international_phone_numbers() {
        let f = |v: Value| format_phone(&v, PhoneFormat::International, "31");
        assert_eq!(f(json!("06-12345678")), Some("31612345678".to_string()));
        assert_eq!(f(json!("+31 6 1234 5678")), Some("31612345678".to_string()));
        assert_eq!(f(json!("0031612345678")), Some("31612345678".to_string()));
        assert_eq!(f(json!("612345678")), Some("31612345678".to_string()));
        assert_eq!(f(json!(612345678.0)), Some("31612345678".to_string()));
        assert_eq!(f(json!("")), None);
        assert_eq!(f(json!(null)), None);
        assert_eq!(f(json!("n.v.t.")), None);
    }

    #[test]
    fn test_prefix_without_subscriber_number_is_rejected() {
        let f = |v: Value| format_phone(&v, PhoneFormat::International, "31");
        assert_eq!(f(json!("0")), None);
        assert_eq!(f(json!("00")), None);
        assert_eq!(f(json!("0031")), None);
        assert_eq!(f(json!("+31")), None);
        assert_eq!(f(json!(0)), None);
    }

    #[test]
    fn test_as_is_and_plus_prefix_phone_numbers() {
        assert_eq!(
            format_phone(&json!(" 31612345678.0 "), PhoneFormat::AsIs, "31"),
            Some("31612345678".to_string())
        );
        assert_eq!(
            format_phone(&json!(31612345678.0), PhoneFormat::AsIs, "31"),
            Some("31612345678".to_string())
        );
        assert_eq!(
            format_phone(&json!("31612345678"), PhoneFormat::PlusPrefix, "31"),
            Some("+31612345678".to_string())
        );
        assert_eq!(
            format_phone(&json!("+31612345678"), PhoneFormat::PlusPrefix, "31"),
            Some("+31612345678".to_string())
        );
        assert_eq!(format_phone(&json!("nan"), PhoneFormat::AsIs, "31"), None);
    }

    #[test]
    fn test_cell_text_normalizes_spreadsheet_noise() {
        assert_eq!(cell_text(&json!(null)), "");
        assert_eq!(cell_text(&json!("NaN")), "");
        assert_eq!(cell_text(&json!(" None ")), "");
        assert_eq!(cell_text(&json!(12345.0)), "12345");
        assert_eq!(cell_text(&json!(2.5)), "2.5");
        assert_eq!(cell_text(&json!(["Badkamer", "Keuken"])), "Badkamer, Keuken");
        assert_eq!(cell_text(&json!("  Binnen ")), "Binnen");
    }

    #[test]
    fn test_dutch_dates() {
        let cases = ["2025-03-03", "03/03/2025", "03-03-2025", "2025-03-03 00:00:00", "2025-03-03T08:00:00.000Z"];
        for case in cases {
            assert_eq!(format_value(&json!(case), ValueFormat::DateShort), "3 mrt 25", "{}", case);
        }
        assert_eq!(format_value(&json!("2024-10-21"), ValueFormat::DateLong), "21 oktober 2024");
        assert_eq!(format_value(&json!("2009-01-05"), ValueFormat::DateShort), "5 jan 09");
    }

    #[test]
    fn test_unparseable_date_is_passed_through() {
        assert_eq!(format_value(&json!("volgende week"), ValueFormat::DateShort), "volgende week");
        assert_eq!(format_value(&json!(null), ValueFormat::DateLong), "");
    }

    #[test]
    fn test_plan_url() {
        let url = plan_url("https://fixzed.plannen.app/token/", "fixzed", "planning@example.nl", "PR-42");
        let encoded = url.strip_prefix("https://fixzed.plannen.app/token/").unwrap();
        let decoded = String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap();
        assert_eq!(decoded, "fixzed,planning@example.nl,PR-42");
    }
}
