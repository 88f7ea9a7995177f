use serde::Deserialize;

use crate::core::GenericResult;
use crate::currency::Cash;
use crate::instruments::InstrumentId;
use crate::transactions::{CorporateActionKind, RawTransaction, Side};
use crate::types::{DateTime, Decimal};
use crate::util::{self, DecimalRestrictions};

/// Parses a broker XML report:
///
/// ```xml
/// <broker-report broker="...">
///     <trades>
///         <trade date="2023-01-10" time="14:30:00" type="buy" isin="US0378331005"
///                quantity="10" price="170.5" currency="USD" commission="1" order-id="A-1"/>
///     </trades>
///     <cash-flows>
///         <cash-flow date="2023-03-15" type="dividend" isin="US0378331005"
///                    amount="24" tax="3.6" currency="USD"/>
///     </cash-flows>
///     <corporate-actions>
///         <corporate-action date="2024-06-10" type="split" symbol="NVDA" ratio="10:1"/>
///     </corporate-actions>
/// </broker-report>
/// ```
pub fn parse(data: &[u8]) -> GenericResult<Vec<RawTransaction>> {
    let report: BrokerReport = quick_xml::de::from_reader(data).map_err(|e| format!(
        "Malformed XML report: {e}"))?;
    report.normalize()
}

#[derive(Deserialize)]
struct BrokerReport {
    #[serde(rename = "@broker")]
    broker: String,

    #[serde(default)]
    trades: Trades,

    #[serde(rename = "cash-flows", default)]
    cash_flows: CashFlows,

    #[serde(rename = "corporate-actions", default)]
    corporate_actions: CorporateActions,
}

#[derive(Deserialize, Default)]
struct Trades {
    #[serde(rename = "trade", default)]
    trades: Vec<Trade>,
}

#[derive(Deserialize)]
struct Trade {
    #[serde(rename = "@date")]
    date: String,
    #[serde(rename = "@time")]
    time: Option<String>,
    #[serde(rename = "@type")]
    type_: String,
    #[serde(rename = "@symbol")]
    symbol: Option<String>,
    #[serde(rename = "@isin")]
    isin: Option<String>,
    #[serde(rename = "@quantity")]
    quantity: Decimal,
    #[serde(rename = "@price")]
    price: Decimal,
    #[serde(rename = "@currency")]
    currency: String,
    #[serde(rename = "@commission")]
    commission: Option<Decimal>,
    #[serde(rename = "@order-id")]
    order_id: Option<String>,
}

#[derive(Deserialize, Default)]
struct CashFlows {
    #[serde(rename = "cash-flow", default)]
    cash_flows: Vec<CashFlow>,
}

#[derive(Deserialize)]
struct CashFlow {
    #[serde(rename = "@date")]
    date: String,
    #[serde(rename = "@type")]
    type_: String,
    #[serde(rename = "@isin")]
    isin: Option<String>,
    #[serde(rename = "@amount")]
    amount: Decimal,
    #[serde(rename = "@tax")]
    tax: Option<Decimal>,
    #[serde(rename = "@currency")]
    currency: String,
    #[serde(rename = "@description")]
    description: Option<String>,
}

#[derive(Deserialize, Default)]
struct CorporateActions {
    #[serde(rename = "corporate-action", default)]
    actions: Vec<CorporateAction>,
}

#[derive(Deserialize)]
struct CorporateAction {
    #[serde(rename = "@date")]
    date: String,
    #[serde(rename = "@type")]
    type_: String,
    #[serde(rename = "@symbol")]
    symbol: Option<String>,
    #[serde(rename = "@isin")]
    isin: Option<String>,
    #[serde(rename = "@ratio")]
    ratio: Option<String>,
}

impl BrokerReport {
    fn normalize(&self) -> GenericResult<Vec<RawTransaction>> {
        let mut transactions = Vec::new();

        for (index, trade) in self.trades.trades.iter().enumerate() {
            transactions.push(trade.normalize(&self.broker).map_err(|e| format!(
                "Invalid <trade> element #{}: {}", index + 1, e))?);
        }

        for (index, cash_flow) in self.cash_flows.cash_flows.iter().enumerate() {
            transactions.push(cash_flow.normalize(&self.broker).map_err(|e| format!(
                "Invalid <cash-flow> element #{}: {}", index + 1, e))?);
        }

        for (index, action) in self.corporate_actions.actions.iter().enumerate() {
            transactions.push(action.normalize(&self.broker).map_err(|e| format!(
                "Invalid <corporate-action> element #{}: {}", index + 1, e))?);
        }

        // The report groups records by section, so chronological replay order
        // is restored later by the matching engine's comparator. Row indices
        // only disambiguate same-moment records within one section.
        for (row, transaction) in transactions.iter_mut().enumerate() {
            transaction.row = row + 1;
        }

        Ok(transactions)
    }
}

impl Trade {
    fn normalize(&self, broker: &str) -> GenericResult<RawTransaction> {
        let side = match self.type_.to_lowercase().as_str() {
            "buy" => Side::Buy,
            "sell" => Side::Sell,
            "open" => Side::Open,
            "close" => Side::Close,
            _ => return Err!("Unsupported trade type: {:?}", self.type_),
        };

        let quantity = util::validate_decimal(self.quantity, DecimalRestrictions::StrictlyPositive)
            .map_err(|_| format!("Invalid quantity: {}", self.quantity))?;
        let price = util::validate_decimal(self.price, DecimalRestrictions::StrictlyPositive)
            .map_err(|_| format!("Invalid price: {}", self.price))?;

        let currency = self.currency.to_uppercase();
        let commission = self.commission.unwrap_or_default();

        Ok(RawTransaction {
            time: parse_time(&self.date, self.time.as_deref())?,
            instrument: Some(instrument(self.isin.as_deref(), self.symbol.as_deref())?),
            side: side,
            quantity: quantity,
            price: Some(Cash::new(&currency, price)),
            amount: Cash::new(&currency, quantity * price),
            commission: Cash::new(&currency, commission),
            tax: Cash::zero(&currency),
            local_amount: Cash::zero(&currency),
            local_commission: Cash::zero(&currency),
            local_tax: Cash::zero(&currency),
            description: String::new(),
            broker: broker.to_owned(),
            order_id: self.order_id.clone(),
            row: 0,
            seq: 0,
        })
    }
}

impl CashFlow {
    fn normalize(&self, broker: &str) -> GenericResult<RawTransaction> {
        let side = match self.type_.to_lowercase().as_str() {
            "dividend" => Side::Dividend,
            "interest" => Side::Interest,
            "fee" => Side::Fee,
            "deposit" => Side::Deposit,
            "withdrawal" => Side::Withdrawal,
            _ => return Err!("Unsupported cash flow type: {:?}", self.type_),
        };

        if matches!(side, Side::Dividend) && self.isin.is_none() {
            return Err!("Missing ISIN for a dividend");
        }

        let amount = util::validate_decimal(self.amount, DecimalRestrictions::StrictlyPositive)
            .map_err(|_| format!("Invalid amount: {}", self.amount))?;

        let currency = self.currency.to_uppercase();

        Ok(RawTransaction {
            time: parse_time(&self.date, None)?,
            instrument: self.isin.as_deref().map(InstrumentId::parse),
            side: side,
            quantity: dec!(0),
            price: None,
            amount: Cash::new(&currency, amount),
            commission: Cash::zero(&currency),
            tax: Cash::new(&currency, self.tax.unwrap_or_default()),
            local_amount: Cash::zero(&currency),
            local_commission: Cash::zero(&currency),
            local_tax: Cash::zero(&currency),
            description: self.description.clone().unwrap_or_default(),
            broker: broker.to_owned(),
            order_id: None,
            row: 0,
            seq: 0,
        })
    }
}

impl CorporateAction {
    fn normalize(&self, broker: &str) -> GenericResult<RawTransaction> {
        let kind = match self.type_.to_lowercase().as_str() {
            "split" => {
                let ratio = self.ratio.as_deref().ok_or("Missing split ratio")?;
                parse_split_ratio(ratio)?
            },
            other => CorporateActionKind::Other(other.to_owned()),
        };

        Ok(RawTransaction {
            time: parse_time(&self.date, None)?,
            instrument: Some(instrument(self.isin.as_deref(), self.symbol.as_deref())?),
            side: Side::CorporateAction(kind),
            quantity: dec!(0),
            price: None,
            amount: Cash::zero("EUR"),
            commission: Cash::zero("EUR"),
            tax: Cash::zero("EUR"),
            local_amount: Cash::zero("EUR"),
            local_commission: Cash::zero("EUR"),
            local_tax: Cash::zero("EUR"),
            description: self.ratio.clone().unwrap_or_default(),
            broker: broker.to_owned(),
            order_id: None,
            row: 0,
            seq: 0,
        })
    }
}

fn instrument(isin: Option<&str>, symbol: Option<&str>) -> GenericResult<InstrumentId> {
    isin.or(symbol)
        .map(InstrumentId::parse)
        .ok_or_else(|| "Missing instrument identifier (symbol or ISIN)".into())
}

fn parse_time(date: &str, time: Option<&str>) -> GenericResult<DateTime> {
    let date = util::parse_date(date, "%Y-%m-%d")?;

    let time = match time {
        Some(time) => chrono::NaiveTime::parse_from_str(time, "%H:%M:%S").map_err(|_| format!(
            "Invalid time: {time:?}"))?,
        None => chrono::NaiveTime::MIN,
    };

    Ok(date.and_time(time))
}

fn parse_split_ratio(ratio: &str) -> GenericResult<CorporateActionKind> {
    let (numerator, denominator) = ratio.split_once(':').ok_or_else(|| format!(
        "Invalid split ratio: {ratio:?}"))?;

    let parse = |value: &str| -> GenericResult<u32> {
        match value.trim().parse() {
            Ok(value) if value != 0 => Ok(value),
            _ => Err!("Invalid split ratio: {ratio:?}"),
        }
    };

    Ok(CorporateActionKind::StockSplit {
        numerator: parse(numerator)?,
        denominator: parse(denominator)?,
    })
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use matches::assert_matches;

    use super::*;

    #[test]
    fn parsing() {
        let data = indoc!(r#"
            <?xml version="1.0" encoding="UTF-8"?>
            <broker-report broker="mock-broker">
                <trades>
                    <trade date="2023-01-10" time="14:30:00" type="buy" isin="US0378331005"
                           quantity="10" price="170.5" currency="USD" commission="1" order-id="A-1"/>
                    <trade date="2023-02-01" type="close" symbol="AAPL 2023-06-16 C180"
                           quantity="2" price="3.5" currency="USD"/>
                </trades>
                <cash-flows>
                    <cash-flow date="2023-03-15" type="dividend" isin="US0378331005"
                               amount="24" tax="3.6" currency="USD"/>
                    <cash-flow date="2023-04-01" type="deposit" amount="1000" currency="EUR"/>
                </cash-flows>
                <corporate-actions>
                    <corporate-action date="2024-06-10" type="split" symbol="NVDA" ratio="10:1"/>
                </corporate-actions>
            </broker-report>
        "#);

        let transactions = parse(data.as_bytes()).unwrap();
        assert_eq!(transactions.len(), 5);

        let buy = &transactions[0];
        assert_eq!(buy.time, date_time!(2023, 1, 10, 14, 30));
        assert_eq!(buy.side, Side::Buy);
        assert_eq!(buy.amount, Cash::new("USD", dec!(1705)));
        assert_eq!(buy.broker, "mock-broker");

        let close = &transactions[1];
        assert_eq!(close.side, Side::Close);
        assert_eq!(close.instrument, Some(InstrumentId::Symbol(s!("AAPL 2023-06-16 C180"))));

        let dividend = &transactions[2];
        assert_eq!(dividend.side, Side::Dividend);
        assert_eq!(dividend.tax, Cash::new("USD", dec!(3.6)));

        let split = &transactions[4];
        assert_eq!(split.side, Side::CorporateAction(CorporateActionKind::StockSplit {
            numerator: 10,
            denominator: 1,
        }));
    }

    #[test]
    fn element_context_in_errors() {
        let data = indoc!(r#"
            <broker-report broker="mock-broker">
                <trades>
                    <trade date="2023-01-10" type="buy" isin="US0378331005"
                           quantity="10" price="170.5" currency="USD"/>
                    <trade date="2023-01-11" type="buy" isin="US0378331005"
                           quantity="0" price="170.5" currency="USD"/>
                </trades>
            </broker-report>
        "#);

        let err = parse(data.as_bytes()).unwrap_err().to_string();
        assert!(err.contains("<trade> element #2"), "{err}");
    }

    #[test]
    fn malformed_report() {
        assert_matches!(parse(b"<broker-report><unclosed></broker-report>"), Err(_));
    }
}
