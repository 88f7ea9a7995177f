use crate::error::Error;
use crate::transactions::RawTransaction;

mod csv;
mod xml;

/// Supported upload formats, resolved once at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementFormat {
    /// Generic CSV export with a known header set.
    Csv,
    /// Broker XML report.
    Xml,
}

impl StatementFormat {
    pub fn detect(name: &str, data: &[u8]) -> Result<StatementFormat, Error> {
        let name = name.to_lowercase();

        if name.ends_with(".csv") {
            return Ok(StatementFormat::Csv);
        } else if name.ends_with(".xml") {
            return Ok(StatementFormat::Xml);
        }

        match data.iter().find(|byte| !byte.is_ascii_whitespace()) {
            Some(b'<') => Ok(StatementFormat::Xml),
            Some(_) => Ok(StatementFormat::Csv),
            None => Err(Error::ParsingFailed("The file is empty".to_owned())),
        }
    }
}

// Adversarially large files must not stall the pipeline. The engine is
// synchronous, so the bound is on input size rather than on wall clock time.
const MAX_STATEMENT_SIZE: usize = 32 * 1024 * 1024;
const MAX_RECORDS: usize = 100_000;

/// Parses an uploaded statement into normalized transaction records,
/// preserving the original row order.
pub fn parse_statement(name: &str, data: &[u8]) -> Result<Vec<RawTransaction>, Error> {
    if data.len() > MAX_STATEMENT_SIZE {
        return Err(Error::ParsingFailed(format!(
            "The file is too big: {} bytes ({MAX_STATEMENT_SIZE} bytes max)", data.len())));
    }

    let format = StatementFormat::detect(name, data)?;

    let transactions = match format {
        StatementFormat::Csv => csv::parse(data),
        StatementFormat::Xml => xml::parse(data),
    }.map_err(|e| Error::ParsingFailed(e.to_string()))?;

    if transactions.len() > MAX_RECORDS {
        return Err(Error::ParsingFailed(format!(
            "The file contains too many records: {} ({MAX_RECORDS} max)", transactions.len())));
    }

    Ok(transactions)
}

#[cfg(test)]
mod tests {
    use matches::assert_matches;

    use crate::error::Error;

    use super::*;

    #[test]
    fn format_detection() {
        assert_eq!(StatementFormat::detect("report.csv", b"").unwrap(), StatementFormat::Csv);
        assert_eq!(StatementFormat::detect("report.XML", b"").unwrap(), StatementFormat::Xml);
        assert_eq!(StatementFormat::detect("upload", b"  <broker-report/>").unwrap(), StatementFormat::Xml);
        assert_eq!(StatementFormat::detect("upload", b"Date,Type").unwrap(), StatementFormat::Csv);
        assert_matches!(StatementFormat::detect("upload", b"  "), Err(Error::ParsingFailed(_)));
    }
}
