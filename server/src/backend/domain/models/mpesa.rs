//! Inbound M-Pesa payments waiting to be attributed to a loan.
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::backend::domain::errors::LoanError;

#[derive(Debug, Clone, PartialEq)]
pub struct MpesaTransaction {
    pub id: i64,
    /// M-Pesa receipt number, e.g. `QGH7XK2P9L`
    pub transaction_id: String,
    pub phone: String,
    pub bill_reference: String,
    pub amount: Decimal,
    pub received_at: DateTime<Utc>,
    pub matched: bool,
    pub loan_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMpesaTransaction {
    pub transaction_id: String,
    pub phone: String,
    pub bill_reference: String,
    pub amount: Decimal,
    pub received_at: DateTime<Utc>,
}

/// Normalise a Kenyan mobile number to the `2547XXXXXXXX` form M-Pesa expects.
///
/// Accepts `07XXXXXXXX`, `01XXXXXXXX`, `+2547...` and `2547...`, ignoring spaces
/// and dashes.
pub fn normalize_msisdn(phone: &str) -> Result<String, LoanError> {
    let digits: String = phone
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    let digits = digits.strip_prefix('+').unwrap_or(&digits);

    let national = if let Some(rest) = digits.strip_prefix("254") {
        rest
    } else if let Some(rest) = digits.strip_prefix('0') {
        rest
    } else {
        digits
    };

    let valid = national.len() == 9
        && (national.starts_with('7') || national.starts_with('1'))
        && national.chars().all(|c| c.is_ascii_digit());
    if !valid {
        return Err(LoanError::Validation(format!(
            "Invalid phone number: {}",
            phone
        )));
    }

    Ok(format!("254{}", national))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_msisdn_variants() {
        assert_eq!(normalize_msisdn("0712345678").unwrap(), "254712345678");
        assert_eq!(normalize_msisdn("+254712345678").unwrap(), "254712345678");
        assert_eq!(normalize_msisdn("254712345678").unwrap(), "254712345678");
        assert_eq!(normalize_msisdn("0712 345-678").unwrap(), "254712345678");
        assert_eq!(normalize_msisdn("0112345678").unwrap(), "254112345678");
    }

    #[test]
    fn test_normalize_msisdn_rejects_garbage() {
        for bad in ["", "12345", "0812345678", "07123456789", "07123x5678", "+1 555 0100"] {
            assert!(
                matches!(normalize_msisdn(bad), Err(LoanError::Validation(_))),
                "{} should be rejected",
                bad
            );
        }
    }
}
