//! The ingestion engine: the single entry point that ties parsing, currency
//! conversion, persistence, lot matching and result caching together.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use log::info;

use crate::aggregation;
use crate::cache::ResultCache;
use crate::config::Config;
use crate::currency::converter::CurrencyConverter;
use crate::currency::rates;
use crate::error::Error;
use crate::instruments::InstrumentId;
use crate::matching::{AssetClass, LotMatcher};
use crate::parsers;
use crate::results::{CashFlow, Dividend, UploadResult};
use crate::storage::{self, Storage, StorageRates};
use crate::transactions::{chronological_order, RawTransaction, Side};
use crate::types::UserId;

pub struct Engine {
    storage: Arc<Storage>,
    cache: ResultCache,
    converter: CurrencyConverter,
    matcher: LotMatcher,

    // Serializes ingestions per user. Different users never contend.
    user_locks: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl Engine {
    pub fn new(config: &Config) -> Result<Engine, Error> {
        let storage = Arc::new(Storage::new(&config.db_path)?);
        let rates = StorageRates::new(storage.clone());

        Ok(Engine {
            cache: ResultCache::new(storage.clone()),
            storage: storage,
            converter: CurrencyConverter::new(&config.reporting_currency, Box::new(rates)),
            matcher: LotMatcher::new(config.stock_shorting, config.option_shorting),
            user_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Ingests an uploaded statement and returns the user's recomputed result.
    ///
    /// Deduplication, insertion and recomputation run in one database
    /// transaction: an error on any record rolls the whole batch back and the
    /// previous result stays intact.
    pub fn ingest(&self, user_id: UserId, name: &str, data: &[u8]) -> Result<Arc<UploadResult>, Error> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().unwrap();

        let mut transactions = parsers::parse_statement(name, data)?;
        for transaction in &mut transactions {
            self.convert(transaction)?;
        }
        let total = transactions.len();

        let mut ingested = 0;
        let result = self.storage.transaction(|connection| {
            let mut known = storage::existing_hashes(connection, user_id)?;
            let mut seq = storage::next_seq(connection, user_id)?;

            let mut new_transactions = Vec::new();
            for transaction in &transactions {
                if !known.insert(transaction.content_hash()) {
                    continue;
                }

                let mut transaction = transaction.clone();
                transaction.seq = seq;
                seq += 1;

                new_transactions.push(transaction);
            }
            ingested = new_transactions.len();

            storage::insert_transactions(connection, user_id, &new_transactions)?;

            let result = self.compute(storage::load_transactions(connection, user_id)?)?;
            storage::save_result(connection, user_id, &result)?;

            Ok(result)
        })?;

        info!("Ingested {name:?} for user #{user_id}: {ingested} new transactions of {total}.");

        let result = Arc::new(result);
        self.cache.fill(user_id, result.clone());
        Ok(result)
    }

    /// Returns the latest computed result for the user.
    pub fn results(&self, user_id: UserId) -> Result<Arc<UploadResult>, Error> {
        self.cache.get(user_id)
    }

    /// Deletes all of the user's data.
    pub fn purge(&self, user_id: UserId) -> Result<(), Error> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().unwrap();

        self.storage.transaction(|connection| {
            storage::delete_transactions(connection, user_id)?;
            storage::delete_result(connection, user_id)
        })?;
        self.cache.invalidate(user_id);

        info!("Purged all data of user #{user_id}.");
        Ok(())
    }

    /// Loads historical exchange rates from a `date,currency,rate` CSV export.
    pub fn load_rates(&self, data: &[u8]) -> Result<usize, Error> {
        let rates = rates::read_rates_file(data).map_err(|e| Error::ParsingFailed(e.to_string()))?;
        self.storage.store_rates(&rates)
    }

    fn user_lock(&self, user_id: UserId) -> Arc<Mutex<()>> {
        self.user_locks.lock().unwrap()
            .entry(user_id)
            .or_default()
            .clone()
    }

    fn convert(&self, transaction: &mut RawTransaction) -> Result<(), Error> {
        let date = transaction.date();
        transaction.local_amount = self.converter.convert(date, transaction.amount)?;
        transaction.local_commission = self.converter.convert(date, transaction.commission)?;
        transaction.local_tax = self.converter.convert(date, transaction.tax)?;
        Ok(())
    }

    /// Recomputes the full result from scratch by replaying all of the user's
    /// transactions in deterministic chronological order.
    fn compute(&self, mut transactions: Vec<RawTransaction>) -> Result<UploadResult, Error> {
        // Reporting currency amounts are computed once at ingestion time, so
        // transactions stored under a different reporting currency can't be
        // replayed against the current configuration
        let reporting_currency = self.converter.reporting_currency();
        for transaction in &transactions {
            if transaction.local_amount.currency != reporting_currency {
                return Err(Error::Internal(format!(
                    "The stored transactions are converted to {} while the configured reporting currency is {}",
                    transaction.local_amount.currency, reporting_currency).into()));
            }
        }

        transactions.sort_by(chronological_order);

        let mut result = UploadResult::default();
        let mut trades: BTreeMap<(InstrumentId, AssetClass), Vec<&RawTransaction>> = BTreeMap::new();

        for transaction in &transactions {
            let asset_class = match transaction.side {
                Side::Buy | Side::Sell => AssetClass::Stock,
                Side::Open | Side::Close => AssetClass::Option,
                // Splits apply to the stock position
                Side::CorporateAction(_) => AssetClass::Stock,

                Side::Dividend | Side::Interest => {
                    result.dividends.push(Dividend::from_transaction(transaction));
                    continue;
                },
                Side::Deposit | Side::Withdrawal | Side::Fee => {
                    result.cash_flows.push(CashFlow::from_transaction(transaction));
                    continue;
                },
            };

            let instrument = transaction.instrument.clone().ok_or_else(|| Error::Internal(
                "Got a trade without an instrument".into()))?;

            trades.entry((instrument, asset_class)).or_default().push(transaction);
        }

        for ((instrument, asset_class), group) in trades {
            let matched = self.matcher.process(&instrument, asset_class, &group)?;

            match asset_class {
                AssetClass::Stock => {
                    result.stock_sales.extend(matched.sales);
                    result.stock_holdings.extend(matched.open_lots);
                },
                AssetClass::Option => {
                    result.option_sales.extend(matched.sales);
                    result.option_holdings.extend(matched.open_lots);
                },
            }
        }

        result.tax_summary = aggregation::dividend_summary(
            &result.dividends, self.converter.reporting_currency());

        Ok(result)
    }
}
