use indoc::indoc;
use matches::assert_matches;
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;

use taxfolio::currency::Cash;
use taxfolio::{Config, Engine, Error};

const RATES: &str = indoc!("
    date,currency,rate
    2023-01-01,USD,0.9
");

const STATEMENT: &str = indoc!("
    Date,Type,Symbol,ISIN,Quantity,Price,Amount,Currency,Fee,Tax,Description
    2023-01-15,Buy,SAP,DE0007164600,100,10,1000,EUR,1,,
    2023-03-10,Sell,SAP,DE0007164600,100,15,1500,EUR,1,,
    2023-03-15,Dividend,AAPL,US0378331005,,,24,USD,,3.6,Quarterly dividend
    2023-04-01,Deposit,,,,,500,EUR,,,Wire transfer
");

fn new_engine() -> (tempfile::TempDir, Engine) {
    let temp_dir = tempfile::tempdir().unwrap();

    let config = Config {
        db_path: temp_dir.path().join("db.sqlite").to_str().unwrap().to_owned(),
        ..Default::default()
    };

    let engine = Engine::new(&config).unwrap();
    (temp_dir, engine)
}

#[test]
fn full_pipeline() {
    let (_temp_dir, engine) = new_engine();

    engine.load_rates(RATES.as_bytes()).unwrap();
    let result = engine.ingest(1, "statement.csv", STATEMENT.as_bytes()).unwrap();

    assert_eq!(result.stock_sales.len(), 1);
    let sale = &result.stock_sales[0];
    assert_eq!(sale.quantity, dec!(100));
    assert_eq!(sale.country, "DE");
    assert_eq!(sale.local_open_cost, Cash::new("EUR", dec!(1001)));
    assert_eq!(sale.delta, Cash::new("EUR", dec!(498)));

    assert!(result.stock_holdings.is_empty());
    assert!(result.option_sales.is_empty());

    assert_eq!(result.dividends.len(), 1);
    let dividend = &result.dividends[0];
    assert_eq!(dividend.country, "US");
    assert_eq!(dividend.amount, Cash::new("USD", dec!(24)));
    assert_eq!(dividend.local_amount, Cash::new("EUR", dec!(21.6)));
    assert_eq!(dividend.local_paid_tax, Cash::new("EUR", dec!(3.24)));

    assert_eq!(result.cash_flows.len(), 1);

    let totals = &result.tax_summary[&2023]["US"];
    assert_eq!(totals.gross, Cash::new("EUR", dec!(21.6)));
    assert_eq!(totals.withheld, Cash::new("EUR", dec!(3.24)));

    assert_eq!(*engine.results(1).unwrap(), *result);
}

#[test]
fn reingest_is_idempotent() {
    let (_temp_dir, engine) = new_engine();
    engine.load_rates(RATES.as_bytes()).unwrap();

    let first = engine.ingest(1, "statement.csv", STATEMENT.as_bytes()).unwrap();

    // Refining the rate table afterwards must not alter already converted
    // amounts: they are computed once at ingestion time and stored
    engine.load_rates(b"date,currency,rate\n2023-01-01,USD,0.5\n").unwrap();
    let second = engine.ingest(1, "statement-copy.csv", STATEMENT.as_bytes()).unwrap();

    assert_eq!(*first, *second);
    assert_eq!(second.stock_sales.len(), 1);
    assert_eq!(second.dividends.len(), 1);
    assert_eq!(second.dividends[0].local_amount, Cash::new("EUR", dec!(21.6)));
}

#[test]
fn concurrent_reads_see_consistent_snapshots() {
    let (_temp_dir, engine) = new_engine();
    engine.load_rates(RATES.as_bytes()).unwrap();
    engine.ingest(1, "statement.csv", STATEMENT.as_bytes()).unwrap();

    let extra = indoc!("
        Date,Type,Symbol,ISIN,Quantity,Price,Currency,Fee
        2023-06-01,Buy,SAP,DE0007164600,10,12,EUR,1
    ");

    std::thread::scope(|scope| {
        let reader = scope.spawn(|| {
            for _ in 0..1000 {
                let result = engine.results(1).unwrap();
                // Either the old snapshot or the new one, never a mix
                assert_eq!(result.stock_sales.len(), 1);
                assert!(result.stock_holdings.len() <= 1);
            }
        });

        engine.ingest(1, "extra.csv", extra.as_bytes()).unwrap();
        reader.join().unwrap();
    });
}

#[test]
fn failed_batch_preserves_previous_result() {
    let (_temp_dir, engine) = new_engine();
    engine.load_rates(RATES.as_bytes()).unwrap();

    let result = engine.ingest(1, "statement.csv", STATEMENT.as_bytes()).unwrap();

    // Selling with no open position is rejected for stocks
    let uncovered = indoc!("
        Date,Type,Symbol,Quantity,Price,Currency
        2023-05-01,Sell,AAPL,50,170,EUR
    ");
    assert_matches!(
        engine.ingest(1, "uncovered.csv", uncovered.as_bytes()),
        Err(Error::InsufficientLot {..})
    );

    // A transaction preceding all known exchange rates fails the whole batch
    let unpriced = indoc!("
        Date,Type,Symbol,Amount,Currency
        2022-06-01,Dividend,AAPL,10,USD
    ");
    assert_matches!(
        engine.ingest(1, "unpriced.csv", unpriced.as_bytes()),
        Err(Error::RateUnavailable {..})
    );

    assert_eq!(*engine.results(1).unwrap(), *result);
}

#[test]
fn reporting_currency_change_is_rejected() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("db.sqlite").to_str().unwrap().to_owned();

    let config = Config {
        db_path: db_path.clone(),
        ..Default::default()
    };
    let engine = Engine::new(&config).unwrap();
    engine.load_rates(RATES.as_bytes()).unwrap();
    engine.ingest(1, "statement.csv", STATEMENT.as_bytes()).unwrap();
    drop(engine);

    // Amounts stored under the old reporting currency can't be replayed
    // against a new one, so the mismatch must surface as a structured error
    let config = Config {
        db_path: db_path,
        reporting_currency: "USD".to_owned(),
        ..Default::default()
    };
    let engine = Engine::new(&config).unwrap();

    let deposit = indoc!("
        Date,Type,Amount,Currency
        2023-07-01,Deposit,100,USD
    ");
    assert_matches!(
        engine.ingest(1, "deposit.csv", deposit.as_bytes()),
        Err(Error::Internal(_))
    );
}

#[test]
fn users_are_isolated() {
    let (_temp_dir, engine) = new_engine();
    engine.load_rates(RATES.as_bytes()).unwrap();

    engine.ingest(1, "statement.csv", STATEMENT.as_bytes()).unwrap();
    assert_matches!(engine.results(2), Err(Error::NotFound));
}

#[test]
fn purge() {
    let (_temp_dir, engine) = new_engine();
    engine.load_rates(RATES.as_bytes()).unwrap();

    engine.ingest(1, "statement.csv", STATEMENT.as_bytes()).unwrap();
    engine.purge(1).unwrap();
    assert_matches!(engine.results(1), Err(Error::NotFound));

    // A fresh upload starts from a clean state
    let result = engine.ingest(1, "statement.csv", STATEMENT.as_bytes()).unwrap();
    assert_eq!(result.stock_sales.len(), 1);
}
