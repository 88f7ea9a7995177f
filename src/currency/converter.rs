use crate::currency::Cash;
use crate::currency::rates::RateSource;
use crate::error::Error;
use crate::types::{Date, Decimal};

use super::name_cache;

/// Converts cash amounts into the reporting currency at the historical rate
/// for a given date.
///
/// Conversion happens once at ingestion time and the result is stored with
/// the transaction, so historical reports stay stable even if rate data is
/// refined afterwards.
pub struct CurrencyConverter {
    reporting_currency: &'static str,
    source: Box<dyn RateSource>,
}

impl CurrencyConverter {
    pub fn new(reporting_currency: &str, source: Box<dyn RateSource>) -> CurrencyConverter {
        CurrencyConverter {
            reporting_currency: name_cache::get(reporting_currency),
            source: source,
        }
    }

    pub fn reporting_currency(&self) -> &'static str {
        self.reporting_currency
    }

    pub fn currency_rate(&self, currency: &str, date: Date) -> Result<Decimal, Error> {
        if currency == self.reporting_currency {
            return Ok(dec!(1));
        }

        match self.source.rate(currency, date) {
            Ok(Some(rate)) => Ok(rate),
            Ok(None) => Err(Error::RateUnavailable {
                currency: currency.to_owned(),
                date: date,
            }),
            Err(err) => Err(Error::Storage(err)),
        }
    }

    pub fn convert(&self, date: Date, cash: Cash) -> Result<Cash, Error> {
        if cash.currency == self.reporting_currency {
            return Ok(cash);
        }

        // Zero amounts don't need a rate to be available
        if cash.is_zero() {
            return Ok(Cash::zero(self.reporting_currency));
        }

        let rate = self.currency_rate(cash.currency, date)?;
        Ok(Cash::new(self.reporting_currency, cash.amount * rate))
    }
}
