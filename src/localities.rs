/// Placeholder country code for income whose source market can't be derived
/// from the available instrument identifiers.
pub const UNKNOWN_COUNTRY: &str = "ZZ";

/// Tax years are calendar years in all supported jurisdictions.
pub fn tax_year(date: crate::types::Date) -> i32 {
    use chrono::Datelike;
    date.year()
}
