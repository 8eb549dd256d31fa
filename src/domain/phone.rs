// src/domain/phone.rs

/// Italian country calling code.
pub const ITALY_CALLING_CODE: &str = "39";

/// Length of a national Italian number (mobile or landline) without prefix.
const NATIONAL_NUMBER_LEN: usize = 10;

/// Canonicalize a free-form phone string into the digits-only international
/// form used by messaging deep links.
///
/// - every non-digit is dropped (spaces, dashes, parentheses, a leading `+`)
/// - a leading `00` international prefix is removed
/// - a bare 10-digit number not already starting with `39` gets `39` prepended
/// - anything else is returned as-is
///
/// An empty result means "no usable phone". Never fails.
pub fn normalize_phone(raw: Option<&str>) -> String {
    let digits: String = raw
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();

    let digits = match digits.strip_prefix("00") {
        Some(rest) => rest.to_string(),
        None => digits,
    };

    if !digits.starts_with(ITALY_CALLING_CODE) && digits.len() == NATIONAL_NUMBER_LEN {
        return format!("{ITALY_CALLING_CODE}{digits}");
    }

    digits
}

/// True when `raw` carries at least one digit, i.e. a deep link can be built.
pub fn has_usable_phone(raw: Option<&str>) -> bool {
    !normalize_phone(raw).is_empty()
}
