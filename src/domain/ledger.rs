use crate::error::{BlackjackError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable user identifier supplied by the hosting platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Trims surrounding whitespace and rejects empty identifiers.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            Err(BlackjackError::MissingUser)
        } else {
            Ok(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier the payment platform assigns to a completed charge. Used as the
/// deduplication key for settled payments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(String);

impl PaymentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A chip balance. Integral so stored values round-trip exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Balance(i64);

impl Balance {
    pub const ZERO: Self = Self(0);

    pub fn new(chips: i64) -> Self {
        Self(chips)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// Applies a signed delta, refusing to go below zero or overflow.
    pub fn checked_adjust(self, delta: i64) -> Result<Self> {
        let next = self.0.checked_add(delta).ok_or_else(|| {
            BlackjackError::InvalidRequest(format!("adjustment {delta} overflows balance"))
        })?;
        if next < 0 {
            return Err(BlackjackError::InsufficientBalance {
                balance: self.0,
                required: delta.unsigned_abs(),
            });
        }
        Ok(Self(next))
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A strictly positive chip amount: wagers, credits and debits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Amount(u64);

impl Amount {
    /// Upper bound keeps every amount representable as a signed delta.
    pub const MAX: u64 = i64::MAX as u64;

    pub fn new(value: u64) -> Result<Self> {
        if value == 0 {
            Err(BlackjackError::InvalidRequest(
                "Amount must be positive".to_string(),
            ))
        } else if value > Self::MAX {
            Err(BlackjackError::InvalidRequest(
                "Amount is too large".to_string(),
            ))
        } else {
            Ok(Self(value))
        }
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn signed(&self) -> i64 {
        self.0 as i64
    }
}

impl TryFrom<u64> for Amount {
    type Error = BlackjackError;

    fn try_from(value: u64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for u64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(1).is_ok());
        assert!(matches!(
            Amount::new(0),
            Err(BlackjackError::InvalidRequest(_))
        ));
        assert!(Amount::new(u64::MAX).is_err());
    }

    #[test]
    fn test_checked_adjust_never_goes_negative() {
        let balance = Balance::new(50);
        assert_eq!(balance.checked_adjust(-50).unwrap(), Balance::ZERO);
        assert!(matches!(
            balance.checked_adjust(-51),
            Err(BlackjackError::InsufficientBalance {
                balance: 50,
                required: 51
            })
        ));
        assert!(balance.checked_adjust(i64::MAX).is_err());
    }

    #[test]
    fn test_user_id_parse() {
        assert_eq!(UserId::parse(" 42 ").unwrap().as_str(), "42");
        assert!(matches!(
            UserId::parse("   "),
            Err(BlackjackError::MissingUser)
        ));
    }

    #[test]
    fn test_balance_round_trips_through_json() {
        let balance = Balance::new(9_007_199_254_740_993);
        let json = serde_json::to_string(&balance).unwrap();
        assert_eq!(serde_json::from_str::<Balance>(&json).unwrap(), balance);
    }
}
