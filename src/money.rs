use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

/// A monetary amount stored as a whole number of cents.
///
/// Every amount that flows through the split calculator, the balance
/// aggregator and the settlement matcher uses this type, so sums never pick
/// up binary floating point noise. On the wire it is a plain number in
/// major units (`12.34`).
///
/// Amounts coming from outside are limited to [`Money::MAX_AMOUNT`] in either
/// direction, which keeps the floating point wire form exact. Arithmetic
/// saturates at the `i64` range instead of wrapping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

const CENTS_PER_UNIT: i64 = 100;

impl Money {
    pub const ZERO: Money = Money(0);

    /// 2^53 cents, the largest amount accepted from a request or a document.
    pub const MAX_AMOUNT: Money = Money(1 << 53);

    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Converts a floating major-unit value, rejecting anything that is not
    /// a whole number of cents.
    pub fn from_major(value: f64) -> Result<Self, Error> {
        if !value.is_finite() {
            return Err(Error::InvalidAmount(value.to_string()));
        }
        // The shortest decimal form is exact for large amounts, where the
        // scaled float below can be several ULPs away from a whole cent.
        if let Ok(amount) = value.to_string().parse() {
            return Ok(amount);
        }
        let scaled = value * CENTS_PER_UNIT as f64;
        let cents = scaled.round();
        if (scaled - cents).abs() > 1e-6 || cents.abs() > Money::MAX_AMOUNT.0 as f64 {
            return Err(Error::InvalidAmount(value.to_string()));
        }
        Ok(Money(cents as i64))
    }

    /// Accepts `cents` only within [`Money::MAX_AMOUNT`] of zero.
    pub fn bounded(cents: i64) -> Result<Self, Error> {
        let amount = Money(cents);
        if amount.abs() > Money::MAX_AMOUNT {
            return Err(Error::InvalidAmount(amount.to_string()));
        }
        Ok(amount)
    }

    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    pub fn to_major(self) -> f64 {
        self.0 as f64 / CENTS_PER_UNIT as f64
    }

    pub fn abs(self) -> Self {
        Money(self.0.saturating_abs())
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }
}

impl FromStr for Money {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidAmount(input.to_string());
        let trimmed = input.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };

        let (whole, fraction) = match digits.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (digits, ""),
        };
        if whole.is_empty()
            || fraction.len() > 2
            || !whole.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }

        let whole: i64 = whole.parse().map_err(|_| invalid())?;
        let fraction: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => fraction.parse().map_err(|_| invalid())?,
        };
        let cents = whole
            .checked_mul(CENTS_PER_UNIT)
            .and_then(|cents| cents.checked_add(fraction))
            .ok_or_else(invalid)?;

        Money::bounded(if negative { -cents } else { cents }).map_err(|_| invalid())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(
            f,
            "{sign}{}.{:02}",
            abs / CENTS_PER_UNIT as u64,
            abs % CENTS_PER_UNIT as u64
        )
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 = self.0.saturating_sub(rhs.0);
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(self.0.saturating_neg())
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.copied().sum()
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_major())
    }
}

struct MoneyVisitor;

impl<'de> Visitor<'de> for MoneyVisitor {
    type Value = Money;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an amount with at most two decimal places")
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Money, E> {
        value
            .checked_mul(CENTS_PER_UNIT)
            .ok_or_else(|| Error::InvalidAmount(value.to_string()))
            .and_then(Money::bounded)
            .map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Money, E> {
        i64::try_from(value)
            .map_err(|_| E::custom(Error::InvalidAmount(value.to_string())))
            .and_then(|value| self.visit_i64(value))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Money, E> {
        Money::from_major(value).map_err(E::custom)
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Money, E> {
        value.parse().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Money, D::Error> {
        deserializer.deserialize_any(MoneyVisitor)
    }
}
