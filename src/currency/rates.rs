use std::collections::{BTreeMap, HashMap};

use crate::core::GenericResult;
use crate::currency::CurrencyRate;
use crate::types::{Date, Decimal};
use crate::util::{self, DecimalRestrictions};

/// A historical exchange rate source keyed by (currency, date). Rates are
/// quoted as the price of one unit of the currency in the reporting currency.
pub trait RateSource: Send + Sync {
    /// Returns the nearest known rate at or before `date`, or `None` if the
    /// date precedes the earliest known rate.
    fn rate(&self, currency: &str, date: Date) -> GenericResult<Option<Decimal>>;
}

/// An in-memory rate table.
pub struct RateTable {
    rates: HashMap<String, BTreeMap<Date, Decimal>>,
}

impl RateTable {
    pub fn new() -> RateTable {
        RateTable {
            rates: HashMap::new(),
        }
    }

    pub fn add(&mut self, currency: &str, rate: CurrencyRate) {
        self.rates.entry(currency.to_owned()).or_default().insert(rate.date, rate.price);
    }
}

impl RateSource for RateTable {
    fn rate(&self, currency: &str, date: Date) -> GenericResult<Option<Decimal>> {
        Ok(self.rates.get(currency).and_then(|rates| {
            rates.range(..=date).next_back().map(|(_, &price)| price)
        }))
    }
}

/// Reads a `date,currency,rate` CSV file (for example an ECB reference rate
/// export) into per-currency rate lists.
pub fn read_rates_file(data: &[u8]) -> GenericResult<Vec<(String, CurrencyRate)>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    let mut rates = Vec::new();

    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let line = index + 2;

        if record.len() != 3 {
            return Err!("Line {}: unexpected number of fields", line);
        }

        let date = util::parse_date(record.get(0).unwrap(), "%Y-%m-%d")
            .map_err(|e| format!("Line {line}: {e}"))?;
        let currency = record.get(1).unwrap().to_uppercase();
        let price = util::parse_decimal(record.get(2).unwrap(), DecimalRestrictions::StrictlyPositive)
            .map_err(|e| format!("Line {line}: {e}"))?;

        rates.push((currency, CurrencyRate {date, price}));
    }

    Ok(rates)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn nearest_rate_lookup() {
        let mut table = RateTable::new();
        table.add("USD", CurrencyRate {date: date!(2023, 5, 5), price: dec!(0.91)});
        table.add("USD", CurrencyRate {date: date!(2023, 5, 8), price: dec!(0.92)});

        assert_eq!(table.rate("USD", date!(2023, 5, 4)).unwrap(), None);
        assert_eq!(table.rate("USD", date!(2023, 5, 5)).unwrap(), Some(dec!(0.91)));
        assert_eq!(table.rate("USD", date!(2023, 5, 7)).unwrap(), Some(dec!(0.91)));
        assert_eq!(table.rate("USD", date!(2023, 6, 1)).unwrap(), Some(dec!(0.92)));
        assert_eq!(table.rate("GBP", date!(2023, 5, 5)).unwrap(), None);
    }

    #[test]
    fn rates_file_reading() {
        let data = indoc!("
            date,currency,rate
            2023-05-05,USD,0.91
            2023-05-08,usd,0.92
        ");

        let rates = read_rates_file(data.as_bytes()).unwrap();
        assert_eq!(rates, vec![
            (s!("USD"), CurrencyRate {date: date!(2023, 5, 5), price: dec!(0.91)}),
            (s!("USD"), CurrencyRate {date: date!(2023, 5, 8), price: dec!(0.92)}),
        ]);
    }
}
