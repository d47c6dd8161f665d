//! Currency utility functions for payment amounts
//!
//! Amounts travel through the API as dollars (`f64`). Comparisons between a
//! paid amount and a quoted price are done in whole cents to avoid
//! floating-point noise.

/// Convert dollars to cents
pub fn dollars_to_cents(dollars: f64) -> i64 {
    (dollars * 100.0).round() as i64
}

/// Convert cents to dollars
pub fn cents_to_dollars(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// Format an amount as a dollar string with 2 decimal places
pub fn format_dollars(amount: f64) -> String {
    format!("${:.2}", cents_to_dollars(dollars_to_cents(amount)))
}

/// Price of a booking quoted from the accepted hourly rate, in cents
pub fn quoted_price_cents(hourly_rate: f64, duration_hours: f64) -> i64 {
    dollars_to_cents(hourly_rate * duration_hours)
}

/// A payable amount must be a finite, non-negative number
pub fn validate_amount(amount: f64) -> Result<f64, String> {
    if !amount.is_finite() {
        Err("Amount must be a number".to_string())
    } else if amount < 0.0 {
        Err("Amount cannot be negative".to_string())
    } else {
        Ok(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dollars_to_cents() {
        assert_eq!(dollars_to_cents(100.0), 10000);
        assert_eq!(dollars_to_cents(0.50), 50);
        assert_eq!(dollars_to_cents(123.45), 12345);
    }

    #[test]
    fn test_cents_to_dollars() {
        assert_eq!(cents_to_dollars(10000), 100.0);
        assert_eq!(cents_to_dollars(50), 0.50);
    }

    #[test]
    fn test_format_dollars() {
        assert_eq!(format_dollars(62.5), "$62.50");
        assert_eq!(format_dollars(0.0), "$0.00");
    }

    #[test]
    fn test_quoted_price() {
        assert_eq!(quoted_price_cents(25.0, 2.5), 6250);
        assert_eq!(quoted_price_cents(20.0, 1.5), 3000);
    }

    #[test]
    fn test_validate_amount() {
        assert_eq!(validate_amount(10.0), Ok(10.0));
        assert_eq!(validate_amount(0.0), Ok(0.0));
        assert_eq!(validate_amount(-1.0), Err("Amount cannot be negative".to_string()));
        assert!(validate_amount(f64::NAN).is_err());
    }
}
