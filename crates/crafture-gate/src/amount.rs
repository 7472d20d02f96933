//! Decimal price to base-unit conversion.
//!
//! Prices are human-readable decimal strings ("5", "0.25", ".5"). The
//! conversion is integer-only: the string is split on the decimal point and
//! the digits are concatenated, so no floating point is involved and the
//! result is exact for up to `decimals` fractional digits.

use crate::GateError;
use alloy::primitives::U256;

/// Convert a decimal `price` into base units with `decimals` fractional digits.
///
/// Rejects empty input, signs, exponents, non-digit characters, more
/// fractional digits than `decimals`, and values that overflow `U256`.
pub fn to_base_units(price: &str, decimals: u32) -> Result<U256, GateError> {
    let trimmed = price.trim();
    if trimmed.is_empty() {
        return Err(GateError::Validation("price is empty".to_string()));
    }
    if trimmed.starts_with('-') {
        return Err(GateError::Validation(format!(
            "invalid price '{price}': must be 0 or greater"
        )));
    }

    let (integer_part, fractional_part) = trimmed.split_once('.').unwrap_or((trimmed, ""));
    if integer_part.is_empty() && fractional_part.is_empty() {
        return Err(GateError::Validation(format!(
            "invalid price '{price}': no numeric content"
        )));
    }

    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if !all_digits(integer_part) || !all_digits(fractional_part) {
        return Err(GateError::Validation(format!(
            "invalid price '{price}': expected a plain decimal number"
        )));
    }

    let width = decimals as usize;
    if fractional_part.len() > width {
        return Err(GateError::Validation(format!(
            "invalid price '{price}': more than {decimals} decimal places"
        )));
    }

    // "12.5" with 3 decimals -> "12" + "500"
    let digits = format!("{integer_part}{fractional_part:0<width$}");
    U256::from_str_radix(&digits, 10)
        .map_err(|e| GateError::Validation(format!("invalid price '{price}': {e}")))
}

/// Exponents beyond this are left unexpanded for [`to_base_units`] to reject.
const MAX_EXPONENT: i64 = 96;

/// Rewrite a JSON number in exponent form (`1e-7`, `2.5E+3`) as plain decimal
/// text (`0.0000001`, `2500`) by moving the decimal point through the digits.
///
/// Input without an exponent, or that is not a number, is returned trimmed
/// but otherwise unchanged.
pub fn expand_exponent(number: &str) -> String {
    let number = number.trim();
    let Some((mantissa, exponent)) = number.split_once(|c: char| c == 'e' || c == 'E') else {
        return number.to_string();
    };
    let exponent = match exponent.parse::<i64>() {
        Ok(e) if e.abs() <= MAX_EXPONENT => e,
        _ => return number.to_string(),
    };

    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let (integer_part, fractional_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let digits = format!("{integer_part}{fractional_part}");
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return number.to_string();
    }

    // Position of the decimal point within `digits` after shifting.
    let point = integer_part.len() as i64 + exponent;
    let (whole, fraction) = if point <= 0 {
        ("0".to_string(), format!("{}{digits}", "0".repeat(point.unsigned_abs() as usize)))
    } else if point as usize >= digits.len() {
        let padding = "0".repeat(point as usize - digits.len());
        (format!("{digits}{padding}"), String::new())
    } else {
        let (w, f) = digits.split_at(point as usize);
        (w.to_string(), f.to_string())
    };

    let whole = match whole.trim_start_matches('0') {
        "" => "0",
        w => w,
    };
    match fraction.trim_end_matches('0') {
        "" => format!("{sign}{whole}"),
        f => format!("{sign}{whole}.{f}"),
    }
}
