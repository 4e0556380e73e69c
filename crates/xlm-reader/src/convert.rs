//! String-to-target-field-type conversion (spec §4.1(c)).
//!
//! Covers every target kind the spec names: string, i32/i64, f32/f64, bool,
//! big-decimal, date, datetime, and case-insensitive enum-by-name. Empty
//! input returns the type's zero/null equivalent per §4.1 guarantees.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ConvertError {
    #[error("cannot parse {raw:?} as {target_kind}")]
    Invalid {
        raw: String,
        target_kind: &'static str,
    },
}

fn invalid(raw: &str, target_kind: &'static str) -> ConvertError {
    ConvertError::Invalid {
        raw: raw.to_string(),
        target_kind,
    }
}

pub fn to_string(raw: &str) -> Result<String, ConvertError> {
    Ok(raw.to_string())
}

pub fn to_i32(raw: &str) -> Result<i32, ConvertError> {
    if raw.is_empty() {
        return Ok(0);
    }
    raw.trim().parse().map_err(|_| invalid(raw, "i32"))
}

pub fn to_i64(raw: &str) -> Result<i64, ConvertError> {
    if raw.is_empty() {
        return Ok(0);
    }
    raw.trim().parse().map_err(|_| invalid(raw, "i64"))
}

pub fn to_f32(raw: &str) -> Result<f32, ConvertError> {
    if raw.is_empty() {
        return Ok(0.0);
    }
    raw.trim().parse().map_err(|_| invalid(raw, "f32"))
}

pub fn to_f64(raw: &str) -> Result<f64, ConvertError> {
    if raw.is_empty() {
        return Ok(0.0);
    }
    raw.trim().parse().map_err(|_| invalid(raw, "f64"))
}

pub fn to_bool(raw: &str) -> Result<bool, ConvertError> {
    if raw.is_empty() {
        return Ok(false);
    }
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        _ => Err(invalid(raw, "bool")),
    }
}

pub fn to_decimal(raw: &str) -> Result<Decimal, ConvertError> {
    if raw.is_empty() {
        return Ok(Decimal::ZERO);
    }
    Decimal::from_str(raw.trim()).map_err(|_| invalid(raw, "decimal"))
}

/// `YYYY-MM-DD`.
pub fn to_date(raw: &str) -> Result<Option<NaiveDate>, ConvertError> {
    if raw.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map(Some)
        .map_err(|_| invalid(raw, "date"))
}

/// `YYYY-MM-DD HH:MM:SS`.
pub fn to_datetime(raw: &str) -> Result<Option<chrono::NaiveDateTime>, ConvertError> {
    if raw.is_empty() {
        return Ok(None);
    }
    chrono::NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%d %H:%M:%S")
        .map(Some)
        .map_err(|_| invalid(raw, "datetime"))
}

/// Case-insensitive enum-by-name lookup against a fixed variant list.
pub fn to_enum_name<'a>(raw: &str, variants: &[&'a str]) -> Result<Option<&'a str>, ConvertError> {
    if raw.is_empty() {
        return Ok(None);
    }
    variants
        .iter()
        .find(|v| v.eq_ignore_ascii_case(raw.trim()))
        .copied()
        .map(Some)
        .ok_or_else(|| invalid(raw, "enum"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_values_return_zero_equivalent() {
        assert_eq!(to_i32("").unwrap(), 0);
        assert_eq!(to_bool("").unwrap(), false);
        assert_eq!(to_date("").unwrap(), None);
        assert_eq!(to_decimal("").unwrap(), Decimal::ZERO);
    }

    #[test]
    fn date_and_datetime_parse_expected_formats() {
        assert_eq!(
            to_date("2024-03-05").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );
        assert!(to_datetime("2024-03-05 10:15:00").unwrap().is_some());
        assert!(to_date("03/05/2024").is_err());
    }

    #[test]
    fn enum_lookup_is_case_insensitive() {
        let variants = ["ACTIVE", "INACTIVE"];
        assert_eq!(to_enum_name("active", &variants).unwrap(), Some("ACTIVE"));
        assert!(to_enum_name("bogus", &variants).is_err());
    }
}
