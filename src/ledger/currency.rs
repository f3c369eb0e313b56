//! Supported account currencies
//!
//! A transfer is only possible between two accounts of the same currency,
//! so every currency code entering the system goes through [`Currency::new`].

use std::fmt;

pub const USD: &str = "USD";
pub const EUR: &str = "EUR";
pub const BRL: &str = "BRL";

/// All currency codes an account may be opened in
pub const SUPPORTED: [&str; 3] = [USD, EUR, BRL];

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CurrencyError {
    #[error("Unsupported currency: '{0}' (expected one of USD, EUR, BRL)")]
    Unsupported(String),
}

/// Validated currency code (one of [`SUPPORTED`])
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Currency(&'static str);

impl Currency {
    /// Parse a currency code
    ///
    /// Surrounding whitespace is ignored; the code itself must be uppercase.
    ///
    /// ```
    /// use bank_ledger::ledger::currency::Currency;
    ///
    /// assert_eq!(Currency::new(" BRL ").unwrap().as_str(), "BRL");
    /// assert!(Currency::new("brl").is_err());
    /// ```
    pub fn new(code: &str) -> Result<Self, CurrencyError> {
        let code = code.trim();
        SUPPORTED
            .iter()
            .find(|c| **c == code)
            .map(|c| Currency(*c))
            .ok_or_else(|| CurrencyError::Unsupported(code.to_string()))
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

pub fn is_supported(code: &str) -> bool {
    Currency::new(code).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_codes() {
        for code in SUPPORTED {
            assert_eq!(Currency::new(code).unwrap().as_str(), code);
        }
    }

    #[test]
    fn test_rejects_lowercase_and_unknown() {
        assert_eq!(
            Currency::new("usd"),
            Err(CurrencyError::Unsupported("usd".to_string()))
        );
        assert!(Currency::new("JPY").is_err());
        assert!(Currency::new("").is_err());
        assert!(!is_supported("GBP"));
    }

    #[test]
    fn test_trims_whitespace() {
        assert_eq!(Currency::new("  EUR\n").unwrap().to_string(), "EUR");
    }
}
