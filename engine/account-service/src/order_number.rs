//! Order number validation

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderNumberError {
    #[error("order number is empty")]
    Empty,

    #[error("order number must contain only digits")]
    NonDigit,

    #[error("order number fails the Luhn checksum")]
    Checksum,
}

/// Luhn mod-10 check over an ASCII digit string.
///
/// Every second digit from the right is doubled, 9 is subtracted from doubles
/// above 9, and the total must be a multiple of 10. Returns false for any
/// non-digit character.
pub fn luhn_valid(number: &str) -> bool {
    let mut sum = 0u32;
    for (i, byte) in number.bytes().rev().enumerate() {
        if !byte.is_ascii_digit() {
            return false;
        }
        let mut digit = u32::from(byte - b'0');
        if i % 2 == 1 {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
    }
    sum % 10 == 0
}

/// Check that `number` is a non-empty digit string with a valid checksum
pub fn validate_order_number(number: &str) -> Result<(), OrderNumberError> {
    if number.is_empty() {
        return Err(OrderNumberError::Empty);
    }
    if !number.bytes().all(|b| b.is_ascii_digit()) {
        return Err(OrderNumberError::NonDigit);
    }
    if !luhn_valid(number) {
        return Err(OrderNumberError::Checksum);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vectors() {
        assert!(luhn_valid("4561261212345467"));
        assert!(luhn_valid("2377225624"));
        assert!(luhn_valid("79927398713"));
        assert!(luhn_valid("12345678903"));
        assert!(luhn_valid("0"));

        assert!(!luhn_valid("4561261212345464"));
        assert!(!luhn_valid("79927398710"));
        assert!(!luhn_valid("1234"));
    }

    #[test]
    fn test_single_digit_change_is_detected() {
        let valid = "4561261212345467";
        for position in 0..valid.len() {
            let mut bytes = valid.as_bytes().to_vec();
            bytes[position] = b'0' + (bytes[position] - b'0' + 1) % 10;
            let changed = String::from_utf8(bytes).unwrap();
            assert!(!luhn_valid(&changed), "{changed} should fail");
        }
    }

    #[test]
    fn test_validate_order_number() {
        assert_eq!(validate_order_number("4561261212345467"), Ok(()));
        assert_eq!(validate_order_number(""), Err(OrderNumberError::Empty));
        assert_eq!(validate_order_number("4561-2612"), Err(OrderNumberError::NonDigit));
        assert_eq!(validate_order_number("12a4"), Err(OrderNumberError::NonDigit));
        assert_eq!(validate_order_number("4561261212345464"), Err(OrderNumberError::Checksum));
    }
}
