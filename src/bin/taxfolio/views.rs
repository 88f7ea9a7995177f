use prettytable::format::{Alignment, FormatBuilder, LinePosition, LineSeparator};
use prettytable::{row, Cell, Row, Table};

use taxfolio::aggregation::{self, TaxYearSummary};
use taxfolio::matching::{AssetClass, RealizedSale};
use taxfolio::util::format_date;
use taxfolio::UploadResult;

pub fn print_report(result: &UploadResult) {
    print_sales("Stock sales", &result.stock_sales);
    print_sales("Option trades", &result.option_sales);
    print_tax_summary(&result.tax_summary);

    if result.stock_sales.is_empty() && result.option_sales.is_empty() && result.tax_summary.is_empty() {
        println!("There is nothing to report yet.");
    }
}

fn print_sales(name: &str, sales: &[RealizedSale]) {
    if sales.is_empty() {
        return;
    }

    let mut table = new_table();
    table.set_titles(row![
        "Instrument", "Country", "Opened", "Closed", "Quantity",
        "Open cost", "Close amount", "Commission", "Result",
    ]);

    let mut total = None;
    for sale in sales {
        table.add_row(row![
            sale.instrument,
            sale.country,
            format_date(sale.open_date),
            format_date(sale.close_date),
            r->sale.quantity.normalize(),
            r->sale.local_open_cost.round(),
            r->sale.local_close_amount.round(),
            r->sale.local_commission.round(),
            r->sale.delta.round(),
        ]);

        total = Some(match total {
            Some(total) => total + sale.delta,
            None => sale.delta,
        });
    }

    if let Some(total) = total {
        table.add_row(row!["", "", "", "", "", "", "", b->"Total", br->total.round()]);
    }

    print_statement(name, table);
}

pub fn print_holdings(result: &UploadResult) {
    let lots: Vec<_> = result.stock_holdings.iter()
        .chain(result.option_holdings.iter())
        .cloned()
        .collect();

    let holdings = aggregation::holdings(&lots);
    if holdings.is_empty() {
        println!("There are no open positions.");
        return;
    }

    let mut table = new_table();
    table.set_titles(row!["Instrument", "Type", "Quantity", "Cost basis"]);

    for holding in holdings {
        table.add_row(row![
            holding.instrument,
            asset_class_name(holding.asset_class),
            r->holding.quantity.normalize(),
            r->holding.local_cost.round(),
        ]);
    }

    print_statement("Open positions", table);
}

pub fn print_dividends(result: &UploadResult) {
    if result.dividends.is_empty() {
        println!("There is no dividend income yet.");
        return;
    }

    let mut table = new_table();
    table.set_titles(row!["Date", "Instrument", "Country", "Amount", "Paid tax", "Amount", "Paid tax"]);

    for dividend in &result.dividends {
        table.add_row(row![
            format_date(dividend.date),
            dividend.instrument.as_ref().map(ToString::to_string).unwrap_or_default(),
            dividend.country,
            r->dividend.amount.round(),
            r->dividend.paid_tax.round(),
            r->dividend.local_amount.round(),
            r->dividend.local_paid_tax.round(),
        ]);
    }

    print_statement("Dividends", table);
    print_tax_summary(&result.tax_summary);
}

fn print_tax_summary(summary: &TaxYearSummary) {
    if summary.is_empty() {
        return;
    }

    let mut table = new_table();
    table.set_titles(row!["Year", "Country", "Gross income", "Withheld tax"]);

    for (year, countries) in summary {
        for (country, totals) in countries {
            table.add_row(row![
                year, country,
                r->totals.gross.round(),
                r->totals.withheld.round(),
            ]);
        }
    }

    print_statement("Dividend tax summary", table);
}

fn asset_class_name(asset_class: AssetClass) -> &'static str {
    match asset_class {
        AssetClass::Stock => "stock",
        AssetClass::Option => "option",
    }
}

fn new_table() -> Table {
    let mut table = Table::new();
    table.set_format(FormatBuilder::new()
        .padding(1, 1)
        .separator(LinePosition::Title, LineSeparator::new('-', '-', '-', '-'))
        .build());
    table
}

fn print_statement(name: &str, statement: Table) {
    let mut table = Table::new();

    table.set_format(FormatBuilder::new()
        .separator(LinePosition::Title, LineSeparator::new(' ', ' ', ' ', ' '))
        .build());

    table.set_titles(Row::new(vec![
        Cell::new_align(&("\n".to_owned() + name), Alignment::CENTER),
    ]));

    table.add_row(Row::new(vec![
        Cell::new_align(&statement.to_string(), Alignment::CENTER),
    ]));

    table.printstd();
}
