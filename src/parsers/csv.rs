use std::collections::HashMap;

use csv::StringRecord;

use crate::core::GenericResult;
use crate::currency::Cash;
use crate::instruments::InstrumentId;
use crate::transactions::{CorporateActionKind, RawTransaction, Side};
use crate::types::{DateTime, Decimal};
use crate::util::{self, DecimalRestrictions};

const REQUIRED_COLUMNS: &[&str] = &["date", "type", "currency"];
const OPTIONAL_COLUMNS: &[&str] = &[
    "time", "symbol", "isin", "quantity", "price", "amount", "fee", "tax",
    "description", "order_id", "broker",
];

/// Parses a generic CSV export.
///
/// Required columns: date, type, currency. Optional columns are defaulted,
/// unknown columns fail parsing.
pub fn parse(data: &[u8]) -> GenericResult<Vec<RawTransaction>> {
    let data = decode(data)?;

    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(::csv::Trim::All)
        .from_reader(data.as_bytes());

    let columns = parse_header(reader.headers()?)?;
    let mut transactions = Vec::new();

    for (index, record) in reader.records().enumerate() {
        let row = index + 2; // Header occupies the first line

        let record = record.map_err(|e| format!("Line {row}: {e}"))?;
        let transaction = parse_record(&columns, &record, row).map_err(|e| format!(
            "Line {row}: {e}"))?;

        transactions.push(transaction);
    }

    Ok(transactions)
}

// Broker exports are not always UTF-8 encoded
fn decode(data: &[u8]) -> GenericResult<String> {
    match std::str::from_utf8(data) {
        Ok(data) => Ok(data.to_owned()),
        Err(_) => {
            let (decoded, _, errors) = encoding_rs::WINDOWS_1252.decode(data);
            if errors {
                return Err!("The file has an unsupported character encoding");
            }
            Ok(decoded.into_owned())
        }
    }
}

struct Columns(HashMap<&'static str, usize>);

impl Columns {
    fn get<'a>(&self, name: &str, record: &'a StringRecord) -> Option<&'a str> {
        self.0.get(name)
            .and_then(|&index| record.get(index))
            .filter(|value| !value.is_empty())
    }
}

fn parse_header(headers: &StringRecord) -> GenericResult<Columns> {
    let mut columns = HashMap::new();
    let mut unknown = Vec::new();

    for (index, name) in headers.iter().enumerate() {
        let normalized = name.trim().to_lowercase().replace([' ', '-'], "_");

        match REQUIRED_COLUMNS.iter().chain(OPTIONAL_COLUMNS).find(|&&known| known == normalized) {
            Some(&known) => {
                if columns.insert(known, index).is_some() {
                    return Err!("Duplicated {name:?} column");
                }
            },
            None => unknown.push(name.to_owned()),
        }
    }

    if !unknown.is_empty() {
        return Err!("The file has an unsupported header: unknown columns {}", unknown.join(", "));
    }

    for &required in REQUIRED_COLUMNS {
        if !columns.contains_key(required) {
            return Err!("The file has an unsupported header: missing {required:?} column");
        }
    }

    Ok(Columns(columns))
}

fn parse_record(columns: &Columns, record: &StringRecord, row: usize) -> GenericResult<RawTransaction> {
    let date = columns.get("date", record).ok_or("Missing date")?;
    let time = parse_time(date, columns.get("time", record))?;

    let currency = columns.get("currency", record).ok_or("Missing currency")?.to_uppercase();
    let instrument = columns.get("isin", record)
        .or_else(|| columns.get("symbol", record))
        .map(InstrumentId::parse);

    let type_name = columns.get("type", record).ok_or("Missing transaction type")?;
    let side = parse_side(type_name, columns.get("description", record))?;

    let quantity = columns.get("quantity", record)
        .map(|quantity| util::parse_decimal(quantity, DecimalRestrictions::StrictlyPositive))
        .transpose()?;

    let price = columns.get("price", record)
        .map(|price| util::parse_decimal(price, DecimalRestrictions::StrictlyPositive))
        .transpose()?
        .map(|price| Cash::new(&currency, price));

    let amount = columns.get("amount", record)
        .map(|amount| util::parse_decimal(amount, DecimalRestrictions::StrictlyPositive))
        .transpose()?;

    let fee = parse_optional_cash(columns.get("fee", record), &currency)?;
    let tax = parse_optional_cash(columns.get("tax", record), &currency)?;

    let (quantity, amount) = validate_record(&side, instrument.as_ref(), quantity, price, amount)?;

    Ok(RawTransaction {
        time: time,
        instrument: instrument,
        side: side,
        quantity: quantity,
        price: price,
        amount: Cash::new(&currency, amount),
        commission: fee,
        tax: tax,
        local_amount: Cash::zero(&currency),
        local_commission: Cash::zero(&currency),
        local_tax: Cash::zero(&currency),
        description: columns.get("description", record).unwrap_or_default().to_owned(),
        broker: columns.get("broker", record).unwrap_or("generic").to_owned(),
        order_id: columns.get("order_id", record).map(ToOwned::to_owned),
        row: row,
        seq: 0,
    })
}

fn parse_time(date: &str, time: Option<&str>) -> GenericResult<DateTime> {
    let date = util::parse_date(date, "%Y-%m-%d")?;

    let time = match time {
        Some(time) => {
            let format = if time.matches(':').count() == 2 {"%H:%M:%S"} else {"%H:%M"};
            chrono::NaiveTime::parse_from_str(time, format).map_err(|_| format!(
                "Invalid time: {time:?}"))?
        },
        None => chrono::NaiveTime::MIN,
    };

    Ok(date.and_time(time))
}

fn parse_side(name: &str, description: Option<&str>) -> GenericResult<Side> {
    Ok(match name.to_lowercase().as_str() {
        "buy" => Side::Buy,
        "sell" => Side::Sell,
        "open" => Side::Open,
        "close" => Side::Close,
        "dividend" => Side::Dividend,
        "interest" => Side::Interest,
        "fee" => Side::Fee,
        "deposit" => Side::Deposit,
        "withdrawal" => Side::Withdrawal,
        "split" => Side::CorporateAction(parse_split_ratio(description.unwrap_or_default())?),
        name @ ("merger" | "spinoff" | "delisting") =>
            Side::CorporateAction(CorporateActionKind::Other(name.to_owned())),
        _ => return Err!("Unsupported transaction type: {name:?}"),
    })
}

// Split ratios come as "N:M" in the description column, e.g. "10:1" for a
// forward split and "1:10" for a reverse one.
fn parse_split_ratio(description: &str) -> GenericResult<CorporateActionKind> {
    let ratio = description.split_whitespace().next().unwrap_or_default();

    let (numerator, denominator) = ratio.split_once(':').ok_or_else(|| format!(
        "Invalid split ratio: {description:?}"))?;

    let parse = |value: &str| -> GenericResult<u32> {
        let value: u32 = value.parse().map_err(|_| format!("Invalid split ratio: {description:?}"))?;
        if value == 0 {
            return Err!("Invalid split ratio: {description:?}");
        }
        Ok(value)
    };

    Ok(CorporateActionKind::StockSplit {
        numerator: parse(numerator)?,
        denominator: parse(denominator)?,
    })
}

fn parse_optional_cash(value: Option<&str>, currency: &str) -> GenericResult<Cash> {
    Ok(match value {
        Some(value) => Cash::new(currency, util::parse_decimal(
            value, DecimalRestrictions::PositiveOrZero)?),
        None => Cash::zero(currency),
    })
}

fn validate_record(
    side: &Side, instrument: Option<&InstrumentId>,
    quantity: Option<Decimal>, price: Option<Cash>, amount: Option<Decimal>,
) -> GenericResult<(Decimal, Decimal)> {
    let require_instrument = || -> GenericResult<()> {
        if instrument.is_none() {
            return Err!("Missing instrument identifier (symbol or ISIN)");
        }
        Ok(())
    };

    match side {
        Side::Buy | Side::Sell | Side::Open | Side::Close => {
            require_instrument()?;

            let quantity = quantity.ok_or("Missing quantity")?;
            let amount = match (amount, price) {
                (Some(amount), _) => amount,
                (None, Some(price)) => quantity * price.amount,
                (None, None) => return Err!("Missing both price and amount"),
            };

            Ok((quantity, amount))
        },

        Side::Dividend => {
            require_instrument()?;
            Ok((dec!(0), amount.ok_or("Missing amount")?))
        },

        Side::Interest | Side::Fee | Side::Deposit | Side::Withdrawal => {
            Ok((dec!(0), amount.ok_or("Missing amount")?))
        },

        Side::CorporateAction(_) => {
            require_instrument()?;
            Ok((dec!(0), amount.unwrap_or_default()))
        },
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use matches::assert_matches;

    use super::*;

    #[test]
    fn parsing() {
        let data = indoc!("
            Date,Time,Type,Symbol,ISIN,Quantity,Price,Amount,Currency,Fee,Tax,Description,Order ID
            2023-01-10,14:30:00,Buy,AAPL,US0378331005,10,170.5,1705,USD,1,,,A-1
            2023-03-15,,Dividend,AAPL,US0378331005,,,24,USD,,3.6,Quarterly dividend,
            2023-04-01,,Deposit,,,,,1000,EUR,,,Wire transfer,
            2024-06-10,,Split,NVDA,,,,,USD,,,10:1 forward split,
        ");

        let transactions = parse(data.as_bytes()).unwrap();
        assert_eq!(transactions.len(), 4);

        let buy = &transactions[0];
        assert_eq!(buy.time, date_time!(2023, 1, 10, 14, 30));
        assert_eq!(buy.side, Side::Buy);
        assert_eq!(buy.instrument, Some(InstrumentId::Isin(s!("US0378331005"))));
        assert_eq!(buy.quantity, dec!(10));
        assert_eq!(buy.price, Some(Cash::new("USD", dec!(170.5))));
        assert_eq!(buy.amount, Cash::new("USD", dec!(1705)));
        assert_eq!(buy.commission, Cash::new("USD", dec!(1)));
        assert_eq!(buy.order_id.as_deref(), Some("A-1"));
        assert_eq!(buy.row, 2);

        let dividend = &transactions[1];
        assert_eq!(dividend.side, Side::Dividend);
        assert_eq!(dividend.amount, Cash::new("USD", dec!(24)));
        assert_eq!(dividend.tax, Cash::new("USD", dec!(3.6)));

        let deposit = &transactions[2];
        assert_eq!(deposit.side, Side::Deposit);
        assert_eq!(deposit.instrument, None);
        assert_eq!(deposit.amount, Cash::new("EUR", dec!(1000)));

        let split = &transactions[3];
        assert_eq!(split.side, Side::CorporateAction(CorporateActionKind::StockSplit {
            numerator: 10,
            denominator: 1,
        }));
    }

    #[test]
    fn amount_defaulting() {
        let data = indoc!("
            Date,Type,Symbol,Quantity,Price,Currency
            2023-01-10,Buy,AAPL,10,170.5,USD
        ");

        let transactions = parse(data.as_bytes()).unwrap();
        assert_eq!(transactions[0].amount, Cash::new("USD", dec!(1705)));
    }

    #[test]
    fn unknown_column() {
        let data = "Date,Type,Currency,Magic\n2023-01-10,Deposit,EUR,1\n";
        let err = parse(data.as_bytes()).unwrap_err().to_string();
        assert!(err.contains("Magic"), "{err}");
    }

    #[test]
    fn row_context_in_errors() {
        let data = indoc!("
            Date,Type,Symbol,Quantity,Price,Currency
            2023-01-10,Buy,AAPL,10,170.5,USD
            2023-01-11,Buy,AAPL,-1,170.5,USD
        ");

        let err = parse(data.as_bytes()).unwrap_err().to_string();
        assert!(err.starts_with("Line 3:"), "{err}");
    }

    #[test]
    fn unsupported_type() {
        let data = "Date,Type,Currency\n2023-01-10,Loan,EUR\n";
        assert_matches!(parse(data.as_bytes()), Err(_));
    }
}
