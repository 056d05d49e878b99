//! Currency codes and validation of monetary amounts.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::Error;

/// A three letter currency code such as "NZD" or "EUR".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    /// The currency used when a user has not picked one.
    pub const DEFAULT: &str = "USD";

    /// Create a currency code, normalising it to upper case.
    ///
    /// # Errors
    ///
    /// Returns an [Error::InvalidCurrency] if `code` is not exactly three ASCII letters.
    pub fn new(code: &str) -> Result<Self, Error> {
        let code = code.trim();

        if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(Self(code.to_ascii_uppercase()))
        } else {
            Err(Error::InvalidCurrency(code.to_owned()))
        }
    }

    /// Create a currency code without validation.
    ///
    /// The caller should ensure that the string is a valid, upper case code,
    /// e.g. because it was read back from the database.
    pub fn new_unchecked(code: &str) -> Self {
        Self(code.to_owned())
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self(Self::DEFAULT.to_owned())
    }
}

impl AsRef<str> for Currency {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Currency {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Currency::new(&value)
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.0
    }
}

/// Check that two currencies match before moving money between them.
///
/// # Errors
///
/// Returns an [Error::CurrencyMismatch] if the currencies differ.
pub fn ensure_same_currency(expected: &Currency, actual: &Currency) -> Result<(), Error> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::CurrencyMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }
}

/// Check that `amount` is a finite number greater than zero.
///
/// # Errors
///
/// Returns an [Error::InvalidAmount] otherwise.
pub fn ensure_positive(amount: f64) -> Result<f64, Error> {
    if amount.is_finite() && amount > 0.0 {
        Ok(amount)
    } else {
        Err(Error::InvalidAmount(amount, "must be greater than zero"))
    }
}

/// Check that `amount` is a finite number that is zero or more.
///
/// # Errors
///
/// Returns an [Error::InvalidAmount] otherwise.
pub fn ensure_not_negative(amount: f64) -> Result<f64, Error> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(amount)
    } else {
        Err(Error::InvalidAmount(amount, "must not be negative"))
    }
}

/// Check that `amount` is a finite, non-zero number.
///
/// # Errors
///
/// Returns an [Error::InvalidAmount] otherwise.
pub fn ensure_non_zero(amount: f64) -> Result<f64, Error> {
    if amount.is_finite() && amount != 0.0 {
        Ok(amount)
    } else {
        Err(Error::InvalidAmount(amount, "must not be zero"))
    }
}

/// Amounts closer together than this are treated as equal.
const TOLERANCE: f64 = 1e-9;

/// Whether `amount` is greater than `limit`, ignoring floating point noise
/// such as `0.1 + 0.2 > 0.3`.
pub fn exceeds(amount: f64, limit: f64) -> bool {
    amount - limit > TOLERANCE
}
