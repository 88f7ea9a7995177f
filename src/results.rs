use serde::{Deserialize, Serialize};

use crate::aggregation::TaxYearSummary;
use crate::currency::Cash;
use crate::instruments::InstrumentId;
use crate::localities;
use crate::matching::{PurchaseLot, RealizedSale};
use crate::transactions::{RawTransaction, Side};
use crate::types::Date;

/// A cash movement classified as dividend or interest income.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dividend {
    pub date: Date,
    /// Country of source, derived from the instrument's ISIN. Interest on
    /// idle cash carries no instrument and gets the unknown country.
    pub country: String,
    pub instrument: Option<InstrumentId>,

    pub amount: Cash,
    pub paid_tax: Cash,

    pub local_amount: Cash,
    pub local_paid_tax: Cash,

    pub description: String,
}

impl Dividend {
    pub fn from_transaction(transaction: &RawTransaction) -> Dividend {
        Dividend {
            date: transaction.date(),
            country: transaction.instrument.as_ref()
                .map(|instrument| instrument.country().to_owned())
                .unwrap_or_else(|| localities::UNKNOWN_COUNTRY.to_owned()),
            instrument: transaction.instrument.clone(),

            amount: transaction.amount,
            paid_tax: transaction.tax,

            local_amount: transaction.local_amount,
            local_paid_tax: transaction.local_tax,

            description: transaction.description.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CashFlowKind {
    Deposit,
    Withdrawal,
    Fee,
}

/// A non-income cash movement, retained for detail views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlow {
    pub date: Date,
    pub kind: CashFlowKind,
    pub amount: Cash,
    pub local_amount: Cash,
    pub description: String,
}

impl CashFlow {
    pub fn from_transaction(transaction: &RawTransaction) -> CashFlow {
        let kind = match transaction.side {
            Side::Deposit => CashFlowKind::Deposit,
            Side::Withdrawal => CashFlowKind::Withdrawal,
            Side::Fee => CashFlowKind::Fee,
            _ => unreachable!("Got a non-cash-flow transaction"),
        };

        CashFlow {
            date: transaction.date(),
            kind: kind,
            amount: transaction.amount,
            local_amount: transaction.local_amount,
            description: transaction.description.clone(),
        }
    }
}

/// The full computed snapshot for a user. Owned by the result cache: one
/// logical "latest" instance per user, replaced atomically on recomputation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct UploadResult {
    pub stock_sales: Vec<RealizedSale>,
    pub option_sales: Vec<RealizedSale>,

    pub stock_holdings: Vec<PurchaseLot>,
    pub option_holdings: Vec<PurchaseLot>,

    pub dividends: Vec<Dividend>,
    pub cash_flows: Vec<CashFlow>,

    /// Derived from `dividends`, always regenerable.
    pub tax_summary: TaxYearSummary,
}
