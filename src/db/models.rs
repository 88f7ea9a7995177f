use diesel::prelude::*;

use crate::db::schema::{currency_rates, results, transactions};
use crate::types::{Date, DateTime, UserId};

#[derive(Insertable)]
#[diesel(table_name = transactions)]
pub struct NewTransaction<'a> {
    pub user_id: UserId,
    pub hash: &'a str,
    pub time: DateTime,
    pub seq: i64,
    pub payload: String,
}

#[derive(Insertable)]
#[diesel(table_name = currency_rates)]
pub struct NewCurrencyRate<'a> {
    pub currency: &'a str,
    pub date: Date,
    pub price: String,
}

#[derive(Insertable)]
#[diesel(table_name = results)]
pub struct NewResult {
    pub user_id: UserId,
    pub updated: DateTime,
    pub payload: String,
}
