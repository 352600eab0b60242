use crate::domain::errors::LedgerError;

/// A validated trade price: finite and strictly positive.
///
/// Entry and exit prices go through this type at the operation boundary,
/// so the ledger never stores NaN, infinity, or a non-positive price.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Price(f64);

impl Price {
    pub fn new(value: f64) -> Result<Self, LedgerError> {
        if value.is_finite() && value > 0.0 {
            Ok(Price(value))
        } else {
            Err(LedgerError::InvalidPrice(value))
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_new_valid() {
        let price = Price::new(150.0);
        assert!(price.is_ok());
        assert_eq!(price.unwrap().value(), 150.0);
    }

    #[test]
    fn test_price_new_zero() {
        assert_eq!(Price::new(0.0), Err(LedgerError::InvalidPrice(0.0)));
    }

    #[test]
    fn test_price_new_negative() {
        assert!(Price::new(-10.0).is_err());
    }

    #[test]
    fn test_price_new_nan() {
        assert!(Price::new(f64::NAN).is_err());
    }

    #[test]
    fn test_price_new_infinite() {
        assert!(Price::new(f64::INFINITY).is_err());
    }
}
