use std::{
    fmt,
    ops::{Add, Neg, Sub},
    str::FromStr,
};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Exact decimal money amount.
///
/// Use this type for **all** monetary values in the engine (cash balances,
/// invested totals, fund totals, transfer amounts). It wraps a
/// [`Decimal`], so repeated transfers sum exactly to the ledger total and no
/// value is ever rounded beyond the precision it was given with.
///
/// # Examples
///
/// ```rust
/// use engine::Money;
///
/// let amount: Money = "12.34".parse().unwrap();
/// assert_eq!(amount.to_string(), "12.34");
/// assert!(amount.is_positive());
/// ```
///
/// Parsing from user input accepts `.` or `,` as decimal separator:
///
/// ```rust
/// use engine::Money;
///
/// assert_eq!("10,5".parse::<Money>().unwrap(), "10.5".parse::<Money>().unwrap());
/// assert!("ten".parse::<Money>().is_err());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    #[must_use]
    pub const fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Whole units, e.g. `Money::from_units(25_000)`.
    #[must_use]
    pub fn from_units(units: i64) -> Self {
        Self(Decimal::from(units))
    }

    /// Returns the raw decimal.
    #[must_use]
    pub const fn amount(self) -> Decimal {
        self.0
    }

    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// Strictly greater than zero.
    #[must_use]
    pub fn is_positive(self) -> bool {
        self.0 > Decimal::ZERO
    }

    #[must_use]
    pub fn is_negative(self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Checked addition.
    ///
    /// Returns `None` on overflow and when the sum would need more precision
    /// than a `Decimal` holds (`Decimal` rounds those silently).
    #[must_use]
    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        let sum = self.0.checked_add(rhs.0)?;
        (sum.checked_sub(self.0) == Some(rhs.0)).then_some(Money(sum))
    }

    /// Checked subtraction, `None` on overflow or lost precision.
    #[must_use]
    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        let difference = self.0.checked_sub(rhs.0)?;
        (self.0.checked_sub(difference) == Some(rhs.0)).then_some(Money(difference))
    }

    /// Canonical text used for storage. Trailing zeros are dropped so that
    /// `10.50` and `10.5` persist identically.
    #[must_use]
    pub fn to_storage(self) -> String {
        self.0.normalize().to_string()
    }

    /// Parse a value previously written by [`Money::to_storage`].
    pub fn from_storage(value: &str, column: &str) -> Result<Self, EngineError> {
        Decimal::from_str_exact(value)
            .map(Money)
            .map_err(|_| EngineError::CorruptedRecord(format!("{column}: {value}")))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Self::Output {
        Money(-self.0)
    }
}

impl FromStr for Money {
    type Err = EngineError;

    /// Parses a decimal string.
    ///
    /// Accepts `.` or `,` as decimal separator and an optional leading `+`/`-`.
    /// Rejects empty strings, exponents and anything that is not a plain
    /// decimal number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(EngineError::InvalidAmount("empty amount".to_string()));
        }

        let normalized = trimmed.replace(',', ".");
        let digits = normalized
            .strip_prefix(['+', '-'])
            .unwrap_or(normalized.as_str());
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit() || c == '.') {
            return Err(EngineError::InvalidAmount("invalid amount".to_string()));
        }

        Decimal::from_str_exact(&normalized)
            .map(Money)
            .map_err(|_| EngineError::InvalidAmount("invalid amount".to_string()))
    }
}
