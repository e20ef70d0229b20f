use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ApiError;

static PHONE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?\d{10,15}$").expect("regex compiles"));

pub const MAX_CAPACITY: u32 = 50;

fn char_len_between(field: &str, value: &str, min: usize, max: usize) -> Result<(), ApiError> {
    let len = value.trim().chars().count();
    if (min..=max).contains(&len) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "{field} must be between {min} and {max} characters"
        )))
    }
}

pub fn validate_full_name(value: &str) -> Result<(), ApiError> {
    char_len_between("full_name", value, 3, 100)
}

pub fn validate_phone(value: &str) -> Result<(), ApiError> {
    if PHONE.is_match(value) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(
            "phone must be 10 to 15 digits, optionally starting with +".into(),
        ))
    }
}

pub fn validate_password(value: &str) -> Result<(), ApiError> {
    char_len_between("password", value, 6, 100)
}

pub fn validate_passport(value: &str) -> Result<(), ApiError> {
    char_len_between("passport", value, 10, 15)
}

pub fn validate_specialization(value: &str) -> Result<(), ApiError> {
    char_len_between("specialization", value, 3, 50)
}

pub fn validate_membership_type(value: &str) -> Result<(), ApiError> {
    char_len_between("membership_type", value, 1, 100)
}

pub fn validate_price(value: i64) -> Result<i64, ApiError> {
    if value >= 1 {
        Ok(value)
    } else {
        Err(ApiError::BadRequest("price must be at least 1".into()))
    }
}

pub fn validate_capacity(value: u32) -> Result<u32, ApiError> {
    if (1..=MAX_CAPACITY).contains(&value) {
        Ok(value)
    } else {
        Err(ApiError::BadRequest(format!(
            "capacity must be between 1 and {MAX_CAPACITY}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("+79001234567").is_ok());
        assert!(validate_phone("89001234567").is_ok());
        assert!(validate_phone("123456789").is_err());
        assert!(validate_phone("+7 900 123 45 67").is_err());
        assert!(validate_phone("+7900123456789012").is_err());
    }

    #[test]
    fn test_validate_full_name_counts_chars() {
        // three Cyrillic letters are six bytes
        assert!(validate_full_name("Аня").is_ok());
        assert!(validate_full_name("Ян").is_err());
        assert!(validate_full_name(&"я".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("secret").is_ok());
        assert!(validate_password("short").is_err());
    }

    #[test]
    fn test_validate_price_and_capacity() {
        assert!(validate_price(1).is_ok());
        assert!(validate_price(0).is_err());
        assert!(validate_capacity(15).is_ok());
        assert!(validate_capacity(0).is_err());
        assert!(validate_capacity(MAX_CAPACITY + 1).is_err());
    }
}
