use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::currency::Cash;
use crate::instruments::InstrumentId;
use crate::localities;
use crate::matching::{AssetClass, PurchaseLot};
use crate::results::Dividend;
use crate::types::Decimal;

/// Dividend income and withheld tax in the reporting currency, aggregated by
/// (tax year, source country).
pub type TaxYearSummary = BTreeMap<i32, BTreeMap<String, TaxYearTotals>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxYearTotals {
    pub gross: Cash,
    pub withheld: Cash,
}

/// Pure function of its inputs: deterministic and safe to recompute on every
/// read if caching is bypassed.
pub fn dividend_summary(dividends: &[Dividend], reporting_currency: &str) -> TaxYearSummary {
    let mut summary = TaxYearSummary::new();

    for dividend in dividends {
        let totals = summary
            .entry(localities::tax_year(dividend.date))
            .or_default()
            .entry(dividend.country.clone())
            .or_insert_with(|| TaxYearTotals {
                gross: Cash::zero(reporting_currency),
                withheld: Cash::zero(reporting_currency),
            });

        totals.gross += dividend.local_amount;
        totals.withheld += dividend.local_paid_tax;
    }

    summary
}

/// A flat by-instrument rollup of open lots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub instrument: InstrumentId,
    pub asset_class: AssetClass,
    /// Net quantity, negative for short positions.
    pub quantity: Decimal,
    /// Total remaining cost basis in the reporting currency.
    pub local_cost: Cash,
}

pub fn holdings(lots: &[PurchaseLot]) -> Vec<Holding> {
    let mut rollup: BTreeMap<(InstrumentId, AssetClass), Holding> = BTreeMap::new();

    for lot in lots {
        let key = (lot.instrument.clone(), lot.asset_class);

        rollup.entry(key)
            .and_modify(|holding| {
                holding.quantity += lot.quantity;
                holding.local_cost += lot.local_cost;
            })
            .or_insert_with(|| Holding {
                instrument: lot.instrument.clone(),
                asset_class: lot.asset_class,
                quantity: lot.quantity,
                local_cost: lot.local_cost,
            });
    }

    rollup.into_values().collect()
}

#[cfg(test)]
mod tests {
    use maplit::btreemap;

    use crate::types::Date;

    use super::*;

    fn dividend(date: Date, isin: &str, amount: Decimal, tax: Decimal) -> Dividend {
        Dividend {
            date: date,
            country: InstrumentId::parse(isin).country().to_owned(),
            instrument: Some(InstrumentId::parse(isin)),
            amount: Cash::new("EUR", amount),
            paid_tax: Cash::new("EUR", tax),
            local_amount: Cash::new("EUR", amount),
            local_paid_tax: Cash::new("EUR", tax),
            description: String::new(),
        }
    }

    #[test]
    fn summary() {
        let dividends = [
            dividend(date!(2023, 3, 15), "US0378331005", dec!(24), dec!(3.6)),
            dividend(date!(2023, 9, 15), "US0378331005", dec!(26), dec!(3.9)),
            dividend(date!(2023, 5, 10), "DE0007164600", dec!(100), dec!(26.375)),
            dividend(date!(2024, 3, 15), "US0378331005", dec!(28), dec!(4.2)),
        ];

        let summary = dividend_summary(&dividends, "EUR");

        assert_eq!(summary, btreemap! {
            2023 => btreemap! {
                s!("DE") => TaxYearTotals {
                    gross: Cash::new("EUR", dec!(100)),
                    withheld: Cash::new("EUR", dec!(26.375)),
                },
                s!("US") => TaxYearTotals {
                    gross: Cash::new("EUR", dec!(50)),
                    withheld: Cash::new("EUR", dec!(7.5)),
                },
            },
            2024 => btreemap! {
                s!("US") => TaxYearTotals {
                    gross: Cash::new("EUR", dec!(28)),
                    withheld: Cash::new("EUR", dec!(4.2)),
                },
            },
        });
    }

    #[test]
    fn holdings_rollup() {
        let instrument = InstrumentId::parse("US0378331005");

        let lot = |quantity: Decimal, cost: Decimal| PurchaseLot {
            instrument: instrument.clone(),
            asset_class: AssetClass::Stock,
            open_date: date!(2023, 1, 1),
            quantity: quantity,
            price: Cash::new("USD", dec!(1)),
            cost: Cash::new("USD", cost),
            local_cost: Cash::new("EUR", cost),
        };

        let holdings = holdings(&[lot(dec!(10), dec!(100)), lot(dec!(5), dec!(60))]);

        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].quantity, dec!(15));
        assert_eq!(holdings[0].local_cost, Cash::new("EUR", dec!(160)));
    }
}
