//! Validation of user input

use crate::domain::entities::constants::{DIGIT_PATTERN, EMAIL_PATTERN};

/// Normalise a phone number to E.164.
/// Numbers starting with neither `+` nor `00` are taken to carry a country code already.
pub fn normalize_phone_number(input: &str) -> Option<String> {
    let input = input.trim();
    let to_parse = if input.starts_with('+') || input.starts_with("00") {
        input.to_string()
    } else {
        format!("+{}", input)
    };

    // An international prefix is only recognised relative to a region, and Ireland dials out with 00
    let number = phonenumber::parse(Some(phonenumber::country::Id::IE), &to_parse).ok()?;
    number
        .is_valid()
        .then(|| number.format().mode(phonenumber::Mode::E164).to_string())
}

pub fn is_valid_email(input: &str) -> bool {
    EMAIL_PATTERN.is_match(input.trim())
}

pub fn is_digits(input: &str) -> bool {
    DIGIT_PATTERN.is_match(input)
}

/// Parse timezone callback data like `-8:00` or `5:30` into (hour, minute)
pub fn parse_utc_offset(data: &str) -> Option<(i32, i32)> {
    let (hour, minute) = data.split_once(':')?;
    let hour: i32 = hour.parse().ok()?;
    let minute: i32 = minute.parse().ok()?;
    if !(-12..=14).contains(&hour) || !(0..60).contains(&minute) {
        return None;
    }
    Some((hour, minute))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_numbers_are_normalised() {
        assert_eq!(normalize_phone_number("+380 (67) 123-45-67").as_deref(), Some("+380671234567"));
        assert_eq!(normalize_phone_number("00491701234567").as_deref(), Some("+491701234567"));
        assert_eq!(normalize_phone_number("353 87 123 4567").as_deref(), Some("+353871234567"));
    }

    #[test]
    fn invalid_phone_numbers_are_rejected() {
        assert_eq!(normalize_phone_number("12345"), None);
        assert_eq!(normalize_phone_number("12345678"), None);
        assert_eq!(normalize_phone_number("+999 1234 5678"), None);
        assert_eq!(normalize_phone_number("+1 000 000 0000"), None);
        assert_eq!(normalize_phone_number("not a number"), None);
    }

    #[test]
    fn utc_offsets() {
        assert_eq!(parse_utc_offset("-8:00"), Some((-8, 0)));
        assert_eq!(parse_utc_offset("5:30"), Some((5, 30)));
        assert_eq!(parse_utc_offset("13:00"), Some((13, 0)));
        assert_eq!(parse_utc_offset("25:00"), None);
        assert_eq!(parse_utc_offset("abc"), None);
    }

    #[test]
    fn emails() {
        assert!(is_valid_email(" jane@example.com "));
        assert!(!is_valid_email("jane@"));
    }
}
