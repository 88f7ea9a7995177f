use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::localities;

/// Instrument identity as it appears in broker exports: either a validated
/// ISIN or a free-form exchange symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum InstrumentId {
    Isin(String),
    Symbol(String),
}

impl InstrumentId {
    pub fn parse(identifier: &str) -> InstrumentId {
        let identifier = identifier.trim();

        match isin::ISIN::from_str(identifier) {
            Ok(_) => InstrumentId::Isin(identifier.to_uppercase()),
            Err(_) => InstrumentId::Symbol(identifier.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            InstrumentId::Isin(isin) => isin,
            InstrumentId::Symbol(symbol) => symbol,
        }
    }

    /// Country code of the instrument's source market. ISIN prefix is the
    /// issuer country; plain symbols carry no country information.
    pub fn country(&self) -> &str {
        match self {
            InstrumentId::Isin(isin) => &isin[..2],
            InstrumentId::Symbol(_) => localities::UNKNOWN_COUNTRY,
        }
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
