use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;

use num_traits::{ToPrimitive, Zero};
use separator::Separatable;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde::ser::SerializeStruct;

use crate::core::{EmptyResult, GenericResult};
use crate::types::{Date, Decimal};

mod name_cache;

pub mod converter;
pub mod rates;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cash {
    pub currency: &'static str,
    pub amount: Decimal,
}

impl Cash {
    pub fn new(currency: &str, amount: Decimal) -> Cash {
        Cash {
            currency: name_cache::get(currency),
            amount: amount,
        }
    }

    pub fn zero(currency: &str) -> Cash {
        Cash::new(currency, Decimal::zero())
    }

    pub fn new_from_string(currency: &str, amount: &str) -> GenericResult<Cash> {
        Ok(Cash::new(currency, Decimal::from_str(amount).map_err(|_| format!(
            "Invalid cash amount: {amount:?}"))?))
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    #[allow(clippy::should_implement_trait)]
    pub fn add(mut self, amount: Cash) -> GenericResult<Cash> {
        self.add_assign(amount)?;
        Ok(self)
    }

    pub fn add_assign(&mut self, amount: Cash) -> EmptyResult {
        self.ensure_same_currency(amount)?;
        self.amount += amount.amount;
        Ok(())
    }

    pub fn sub(self, amount: Cash) -> GenericResult<Cash> {
        self.add(-amount)
    }

    pub fn round(mut self) -> Cash {
        self.amount = round(self.amount);
        self
    }

    pub fn normalize(mut self) -> Cash {
        self.amount = self.amount.normalize();
        self
    }

    fn ensure_same_currency(self, other: Cash) -> EmptyResult {
        if self.currency == other.currency {
            Ok(())
        } else {
            Err!("Currency mismatch: {} and {}", self.currency, other.currency)
        }
    }
}

impl Neg for Cash {
    type Output = Cash;

    fn neg(mut self) -> Cash {
        self.amount = -self.amount;
        self
    }
}

impl Add for Cash {
    type Output = Cash;

    fn add(self, rhs: Cash) -> Cash {
        self.add(rhs).unwrap()
    }
}

impl AddAssign for Cash {
    fn add_assign(&mut self, rhs: Cash) {
        self.add_assign(rhs).unwrap()
    }
}

impl Sub for Cash {
    type Output = Cash;

    fn sub(self, rhs: Cash) -> Cash {
        self.sub(rhs).unwrap()
    }
}

impl SubAssign for Cash {
    fn sub_assign(&mut self, rhs: Cash) {
        self.add_assign(-rhs).unwrap()
    }
}

impl<T> Mul<T> for Cash where T: Into<Decimal> {
    type Output = Cash;

    fn mul(mut self, rhs: T) -> Cash {
        self.amount *= rhs.into();
        self
    }
}

impl<T> Div<T> for Cash where T: Into<Decimal> {
    type Output = Cash;

    fn div(mut self, rhs: T) -> Cash {
        self.amount /= rhs.into();
        self
    }
}

impl PartialOrd for Cash {
    fn partial_cmp(&self, other: &Cash) -> Option<Ordering> {
        self.ensure_same_currency(*other).ok()?;
        self.amount.partial_cmp(&other.amount)
    }
}

impl fmt::Display for Cash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", format_cash(self.currency, self.amount))
    }
}

impl Serialize for Cash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut cash = serializer.serialize_struct("Cash", 2)?;
        cash.serialize_field("currency", self.currency)?;
        cash.serialize_field("amount", &self.amount)?;
        cash.end()
    }
}

impl<'de> Deserialize<'de> for Cash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Cash, D::Error> {
        #[derive(Deserialize)]
        struct CashRepr {
            currency: String,
            amount: Decimal,
        }

        let cash = CashRepr::deserialize(deserializer)?;
        Ok(Cash::new(&cash.currency, cash.amount))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurrencyRate {
    pub date: Date,
    pub price: Decimal,
}

pub fn round(amount: Decimal) -> Decimal {
    round_to(amount, 2)
}

pub fn round_to(amount: Decimal, points: u32) -> Decimal {
    amount
        .round_dp_with_strategy(points, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
        .normalize()
}

fn format_cash(currency: &str, mut amount: Decimal) -> String {
    amount = amount.normalize();

    let formatted = if amount.fract().is_zero() {
        amount.to_i64().map(|amount| amount.separated_string())
            .unwrap_or_else(|| amount.to_string())
    } else {
        amount.to_string()
    };

    match currency {
        "EUR" => format!("€{formatted}"),
        "USD" => format!("${formatted}"),
        _ => format!("{formatted} {currency}"),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest(amount, points, expected,
        case(dec!(1.004), 2, dec!(1)),
        case(dec!(1.005), 2, dec!(1.01)),
        case(dec!(-1.005), 2, dec!(-1.01)),
        case(dec!(1.5), 0, dec!(2)),
    )]
    fn rounding(amount: Decimal, points: u32, expected: Decimal) {
        assert_eq!(round_to(amount, points), expected);
    }

    #[test]
    fn cash_arithmetic() {
        let mut cash = Cash::new("EUR", dec!(10));
        cash += Cash::new("EUR", dec!(2.5));
        assert_eq!(cash, Cash::new("EUR", dec!(12.5)));
        assert_eq!(cash * 2, Cash::new("EUR", dec!(25)));

        assert!(Cash::new("EUR", dec!(1)).add(Cash::new("USD", dec!(1))).is_err());
    }

    #[test]
    fn serialization() {
        let cash = Cash::new("EUR", dec!(498.25));
        let json = serde_json::to_string(&cash).unwrap();
        assert_eq!(serde_json::from_str::<Cash>(&json).unwrap(), cash);
    }

    #[rstest(cash, expected,
        case(Cash::new("EUR", dec!(1500)), "€1,500"),
        case(Cash::new("USD", dec!(12.34)), "$12.34"),
        case(Cash::new("NOK", dec!(7)), "7 NOK"),
    )]
    fn formatting(cash: Cash, expected: &str) {
        assert_eq!(cash.to_string(), expected);
    }
}
