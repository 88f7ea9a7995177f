//! Persistence layer: all engine state lives in a single SQLite database.
//! Transactions are stored as JSON payloads keyed by (user id, content hash).

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use diesel::prelude::*;
// The db::Connection type alias shadows the trait from the prelude
use diesel::Connection as ConnectionTrait;
use log::warn;

use crate::core::GenericResult;
use crate::currency::CurrencyRate;
use crate::currency::rates::RateSource;
use crate::db::{self, models, schema, Connection};
use crate::error::Error;
use crate::results::UploadResult;
use crate::transactions::RawTransaction;
use crate::types::{Date, Decimal, UserId};
use crate::util::{self, DecimalRestrictions};

pub struct Storage {
    connection: Mutex<Connection>,
}

impl Storage {
    pub fn new(url: &str) -> Result<Storage, Error> {
        let connection = db::connect(url).map_err(Error::Storage)?;
        Ok(Storage {
            connection: Mutex::new(connection),
        })
    }

    #[cfg(test)]
    pub fn new_temporary() -> (tempfile::TempDir, Arc<Storage>) {
        let (temp_dir, connection) = db::new_temporary();
        let storage = Arc::new(Storage {
            connection: Mutex::new(connection),
        });
        (temp_dir, storage)
    }

    /// Runs `operation` inside a database transaction, retrying once if the
    /// database turns out to be locked by a concurrent writer. Any error from
    /// the closure rolls the whole transaction back.
    pub fn transaction<T, F>(&self, mut operation: F) -> Result<T, Error>
        where F: FnMut(&mut Connection) -> Result<T, Error>
    {
        let mut connection = self.connection.lock().unwrap();

        let result = connection.transaction(&mut operation);
        if let Err(err) = &result {
            if is_locked(err) {
                warn!("The database is locked by a concurrent writer. Retrying the transaction...");
                std::thread::sleep(Duration::from_millis(100));
                return connection.transaction(&mut operation);
            }
        }

        result
    }

    pub fn result(&self, user_id: UserId) -> Result<Option<UploadResult>, Error> {
        self.transaction(|connection| load_result(connection, user_id))
    }

    pub fn store_rates(&self, rates: &[(String, CurrencyRate)]) -> Result<usize, Error> {
        self.transaction(|connection| save_rates(connection, rates))
    }
}

fn is_locked(err: &Error) -> bool {
    matches!(err, Error::Storage(source) if source.to_string().contains("database is locked"))
}

pub fn existing_hashes(connection: &mut Connection, user_id: UserId) -> Result<HashSet<String>, Error> {
    Ok(schema::transactions::table
        .select(schema::transactions::hash)
        .filter(schema::transactions::user_id.eq(user_id))
        .load::<String>(connection)?
        .into_iter().collect())
}

pub fn next_seq(connection: &mut Connection, user_id: UserId) -> Result<i64, Error> {
    let max_seq: Option<i64> = schema::transactions::table
        .select(diesel::dsl::max(schema::transactions::seq))
        .filter(schema::transactions::user_id.eq(user_id))
        .first(connection)?;

    Ok(max_seq.unwrap_or(0) + 1)
}

/// Persists pre-deduplicated transactions. `seq` must already be assigned.
pub fn insert_transactions(
    connection: &mut Connection, user_id: UserId, transactions: &[RawTransaction],
) -> Result<(), Error> {
    for transaction in transactions {
        let hash = transaction.content_hash();
        let payload = serde_json::to_string(transaction).map_err(|e| Error::Internal(Box::new(e)))?;

        diesel::insert_into(schema::transactions::table)
            .values(models::NewTransaction {
                user_id: user_id,
                hash: &hash,
                time: transaction.time,
                seq: transaction.seq,
                payload: payload,
            })
            .execute(connection)?;
    }

    Ok(())
}

pub fn load_transactions(connection: &mut Connection, user_id: UserId) -> Result<Vec<RawTransaction>, Error> {
    schema::transactions::table
        .select(schema::transactions::payload)
        .filter(schema::transactions::user_id.eq(user_id))
        .order(schema::transactions::seq.asc())
        .load::<String>(connection)?
        .iter()
        .map(|payload| serde_json::from_str(payload).map_err(|e| Error::Storage(Box::new(e))))
        .collect()
}

pub fn delete_transactions(connection: &mut Connection, user_id: UserId) -> Result<(), Error> {
    diesel::delete(schema::transactions::table.filter(schema::transactions::user_id.eq(user_id)))
        .execute(connection)?;
    Ok(())
}

pub fn save_result(connection: &mut Connection, user_id: UserId, result: &UploadResult) -> Result<(), Error> {
    let payload = serde_json::to_string(result).map_err(|e| Error::Internal(Box::new(e)))?;

    diesel::replace_into(schema::results::table)
        .values(models::NewResult {
            user_id: user_id,
            updated: util::now(),
            payload: payload,
        })
        .execute(connection)?;

    Ok(())
}

pub fn load_result(connection: &mut Connection, user_id: UserId) -> Result<Option<UploadResult>, Error> {
    let payload = schema::results::table
        .select(schema::results::payload)
        .filter(schema::results::user_id.eq(user_id))
        .first::<String>(connection)
        .optional()?;

    Ok(match payload {
        Some(payload) => Some(serde_json::from_str(&payload).map_err(|e| Error::Storage(Box::new(e)))?),
        None => None,
    })
}

pub fn delete_result(connection: &mut Connection, user_id: UserId) -> Result<(), Error> {
    diesel::delete(schema::results::table.filter(schema::results::user_id.eq(user_id)))
        .execute(connection)?;
    Ok(())
}

pub fn save_rates(connection: &mut Connection, rates: &[(String, CurrencyRate)]) -> Result<usize, Error> {
    for (currency, rate) in rates {
        diesel::replace_into(schema::currency_rates::table)
            .values(models::NewCurrencyRate {
                currency: currency,
                date: rate.date,
                price: rate.price.normalize().to_string(),
            })
            .execute(connection)?;
    }

    Ok(rates.len())
}

/// Serves historical exchange rates from the database. Lookup semantics match
/// [`RateSource`]: the nearest rate at or before the requested date.
pub struct StorageRates {
    storage: Arc<Storage>,
}

impl StorageRates {
    pub fn new(storage: Arc<Storage>) -> StorageRates {
        StorageRates {storage}
    }
}

impl RateSource for StorageRates {
    fn rate(&self, currency: &str, date: Date) -> GenericResult<Option<Decimal>> {
        let mut connection = self.storage.connection.lock().unwrap();

        let price = schema::currency_rates::table
            .select(schema::currency_rates::price)
            .filter(schema::currency_rates::currency.eq(currency))
            .filter(schema::currency_rates::date.le(date))
            .order(schema::currency_rates::date.desc())
            .first::<String>(&mut *connection)
            .optional()?;

        Ok(match price {
            Some(price) => Some(util::parse_decimal(&price, DecimalRestrictions::StrictlyPositive)?),
            None => None,
        })
    }
}
