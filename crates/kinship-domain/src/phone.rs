//! Phone number normalization
//!
//! Numbers are compared in E.164 form. National numbers without a country code are
//! assumed to be Indian (`+91`).

/// Default country calling code for national numbers
pub const DEFAULT_COUNTRY_CODE: &str = "91";

/// Normalize a phone number to E.164 form
///
/// Separators are dropped. A bare 10-digit number gets the default country code, a
/// leading trunk `0` on an 11-digit number is replaced by it, and anything else is
/// returned as `+` followed by its digits. Normalizing twice changes nothing.
///
/// # Examples
///
/// ```
/// use kinship_domain::normalize_phone;
///
/// assert_eq!(normalize_phone("98765-43210"), "+919876543210");
/// assert_eq!(normalize_phone("09876543210"), "+919876543210");
/// assert_eq!(normalize_phone("+14155551234"), "+14155551234");
/// ```
pub fn normalize_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    match digits.len() {
        10 => format!("+{}{}", DEFAULT_COUNTRY_CODE, digits),
        11 if digits.starts_with('0') => format!("+{}{}", DEFAULT_COUNTRY_CODE, &digits[1..]),
        _ => format!("+{}", digits),
    }
}

/// Check that a number is in E.164 form: `+`, a non-zero digit, then 6 to 14 digits
pub fn is_valid_phone(phone: &str) -> bool {
    let Some(rest) = phone.strip_prefix('+') else {
        return false;
    };

    (7..=15).contains(&rest.len())
        && rest.bytes().all(|b| b.is_ascii_digit())
        && !rest.starts_with('0')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_national_numbers_get_country_code() {
        assert_eq!(normalize_phone("9876543210"), "+919876543210");
        assert_eq!(normalize_phone("98765 43210"), "+919876543210");
        assert_eq!(normalize_phone("(987) 654-3210"), "+919876543210");
    }

    #[test]
    fn test_existing_country_code_preserved() {
        assert_eq!(normalize_phone("+919876543210"), "+919876543210");
        assert_eq!(normalize_phone("919876543210"), "+919876543210");
        assert_eq!(normalize_phone("+44 7911 123456"), "+447911123456");
    }

    #[test]
    fn test_trunk_prefix_replaced() {
        assert_eq!(normalize_phone("09876543210"), "+919876543210");
    }

    #[test]
    fn test_is_valid_phone() {
        assert!(is_valid_phone("+919876543210"));
        assert!(is_valid_phone("+14155551234"));
        assert!(is_valid_phone("+447911123456"));
        assert!(!is_valid_phone("+9198765"));
        assert!(!is_valid_phone("+91987654321012345"));
        assert!(!is_valid_phone("919876543210"));
        assert!(!is_valid_phone("+0123456789"));
        assert!(!is_valid_phone("+91 98765 43210"));
        assert!(!is_valid_phone(""));
    }
}
