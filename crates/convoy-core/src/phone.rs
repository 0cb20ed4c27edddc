// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Phone number normalization to international digits.

use crate::error::ConvoyError;

/// Normalise `raw` to international digits without a leading `+`.
///
/// Formatting characters (spaces, dashes, dots, parentheses) are dropped.
/// `+` and `00` mark an international number. A single leading `0` is a
/// trunk prefix and is replaced by `country_code`. Any other number is
/// treated as national and prefixed with `country_code` unless it already
/// starts with it.
pub fn normalize_phone(raw: &str, country_code: &str) -> Result<String, ConvoyError> {
    let invalid = || ConvoyError::InvalidPhone {
        raw: raw.to_string(),
    };

    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();

    let (international, rest) = if let Some(rest) = cleaned.strip_prefix('+') {
        (true, rest)
    } else if let Some(rest) = cleaned.strip_prefix("00") {
        (true, rest)
    } else {
        (false, cleaned.as_str())
    };

    if rest.is_empty() || !rest.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    if international {
        return Ok(rest.to_string());
    }

    let normalized = match rest.strip_prefix('0') {
        Some("") => return Err(invalid()),
        Some(national) => format!("{country_code}{national}"),
        None if rest.starts_with(country_code) => rest.to_string(),
        None => format!("{country_code}{rest}"),
    };

    if normalized.is_empty() {
        return Err(invalid());
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn international_prefixes_are_stripped() {
        assert_eq!(normalize_phone("+31 6 1234 5678", "49").unwrap(), "31612345678");
        assert_eq!(normalize_phone("0031612345678", "49").unwrap(), "31612345678");
    }

    #[test]
    fn trunk_zero_is_replaced_by_country_code() {
        assert_eq!(normalize_phone("06-1234.5678", "31").unwrap(), "31612345678");
        assert_eq!(normalize_phone("(030) 123 45", "49").unwrap(), "493012345");
    }

    #[test]
    fn bare_national_numbers_get_country_code_once() {
        assert_eq!(normalize_phone("612345678", "31").unwrap(), "31612345678");
        assert_eq!(normalize_phone("31612345678", "31").unwrap(), "31612345678");
    }

    #[test]
    fn empty_country_code_leaves_digits_untouched() {
        assert_eq!(normalize_phone("15551234567", "").unwrap(), "15551234567");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            normalize_phone("", "31"),
            Err(ConvoyError::InvalidPhone { .. })
        ));
        assert!(normalize_phone("+", "31").is_err());
        assert!(normalize_phone("0", "31").is_err());
        assert!(normalize_phone("06-abc", "31").is_err());
        assert!(normalize_phone("+31 6 12x", "31").is_err());
    }
}
