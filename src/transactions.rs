use std::cmp::Ordering;
use std::fmt::Write;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::currency::Cash;
use crate::instruments::InstrumentId;
use crate::types::{Date, DateTime, Decimal};

/// One normalized broker export line. Immutable once persisted: reporting
/// currency amounts are computed at ingestion time and never recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub time: DateTime,
    pub instrument: Option<InstrumentId>,
    pub side: Side,

    /// Positive magnitude. Zero for pure cash movements.
    pub quantity: Decimal,
    pub price: Option<Cash>,
    pub amount: Cash,
    pub commission: Cash,
    /// Tax withheld at source (dividend / interest income).
    pub tax: Cash,

    pub local_amount: Cash,
    pub local_commission: Cash,
    pub local_tax: Cash,

    pub description: String,
    pub broker: String,
    pub order_id: Option<String>,

    /// Row index within the source file.
    pub row: usize,
    /// Per-user ingestion sequence, assigned when the transaction is persisted.
    #[serde(default)]
    pub seq: i64,
}

impl RawTransaction {
    pub fn date(&self) -> Date {
        self.time.date()
    }

    /// Content hash over normalized field values. Two records with the same
    /// hash for the same user are considered the same transaction, which
    /// protects against re-uploading the same export. Position metadata
    /// (row, seq) and derived reporting currency amounts are excluded.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();

        let mut feed = |value: &str| {
            hasher.update(value.as_bytes());
            hasher.update(b"\x1f");
        };

        feed(&self.time.format("%Y-%m-%dT%H:%M:%S").to_string());
        feed(self.instrument.as_ref().map(InstrumentId::as_str).unwrap_or(""));
        feed(&self.side.id());
        feed(&self.quantity.normalize().to_string());
        feed(&self.price.map(format_cash).unwrap_or_default());
        feed(&format_cash(self.amount));
        feed(&format_cash(self.commission));
        feed(&format_cash(self.tax));
        feed(&self.description);
        feed(&self.broker);
        feed(self.order_id.as_deref().unwrap_or(""));

        let digest = hasher.finalize();
        let mut hash = String::with_capacity(digest.len() * 2);
        for byte in digest {
            write!(&mut hash, "{byte:02x}").unwrap();
        }
        hash
    }
}

fn format_cash(cash: Cash) -> String {
    format!("{} {}", cash.currency, cash.amount.normalize())
}

/// Deterministic replay order: chronological, with same-moment ties broken by
/// ingestion sequence (which preserves original file order) and then by order
/// identifier.
pub fn chronological_order(a: &RawTransaction, b: &RawTransaction) -> Ordering {
    a.time.cmp(&b.time)
        .then_with(|| a.seq.cmp(&b.seq))
        .then_with(|| a.row.cmp(&b.row))
        .then_with(|| a.order_id.cmp(&b.order_id))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
    /// Option buy side: premium paid. Covers a written position if one is open.
    Open,
    /// Option sell side: premium received. With no open lots this is a written
    /// contract and opens a short position.
    Close,
    Dividend,
    Interest,
    Fee,
    Deposit,
    Withdrawal,
    CorporateAction(CorporateActionKind),
}

impl Side {
    pub fn is_stock_trade(&self) -> bool {
        matches!(self, Side::Buy | Side::Sell)
    }

    pub fn is_option_trade(&self) -> bool {
        matches!(self, Side::Open | Side::Close)
    }

    fn id(&self) -> String {
        match self {
            Side::Buy => "buy".to_owned(),
            Side::Sell => "sell".to_owned(),
            Side::Open => "open".to_owned(),
            Side::Close => "close".to_owned(),
            Side::Dividend => "dividend".to_owned(),
            Side::Interest => "interest".to_owned(),
            Side::Fee => "fee".to_owned(),
            Side::Deposit => "deposit".to_owned(),
            Side::Withdrawal => "withdrawal".to_owned(),
            Side::CorporateAction(CorporateActionKind::StockSplit {numerator, denominator}) =>
                format!("split:{numerator}:{denominator}"),
            Side::CorporateAction(CorporateActionKind::Other(name)) =>
                format!("corporate-action:{name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorporateActionKind {
    StockSplit {
        numerator: u32,
        denominator: u32,
    },
    /// A corporate action type the engine doesn't know how to price. Matching
    /// fails loudly on it instead of silently mis-pricing positions.
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_transaction(broker: &str) -> RawTransaction {
        RawTransaction {
            time: date_time!(2023, 5, 10, 14, 30),
            instrument: Some(InstrumentId::parse("US0378331005")),
            side: Side::Buy,
            quantity: dec!(10),
            price: Some(Cash::new("USD", dec!(170.5))),
            amount: Cash::new("USD", dec!(1705)),
            commission: Cash::new("USD", dec!(1)),
            tax: Cash::zero("USD"),
            local_amount: Cash::zero("EUR"),
            local_commission: Cash::zero("EUR"),
            local_tax: Cash::zero("EUR"),
            description: String::new(),
            broker: broker.to_owned(),
            order_id: Some(s!("A-1")),
            row: 1,
            seq: 0,
        }
    }

    #[test]
    fn content_hash() {
        let transaction = new_transaction("ib");
        assert_eq!(transaction.content_hash(), transaction.content_hash());

        // Derived and positional fields don't change identity
        let mut reingested = transaction.clone();
        reingested.row = 7;
        reingested.seq = 42;
        reingested.local_amount = Cash::new("EUR", dec!(1551.55));
        assert_eq!(reingested.content_hash(), transaction.content_hash());

        let other = new_transaction("degiro");
        assert_ne!(other.content_hash(), transaction.content_hash());
    }

    #[test]
    fn replay_order() {
        let mut first = new_transaction("ib");
        let mut second = new_transaction("ib");
        second.time = first.time + chrono::Duration::hours(1);

        assert_eq!(chronological_order(&first, &second), Ordering::Less);

        second.time = first.time;
        first.seq = 1;
        second.seq = 2;
        assert_eq!(chronological_order(&first, &second), Ordering::Less);
    }
}
