use std::str::FromStr;

use crate::core::GenericResult;
use crate::types::{Date, DateTime, Decimal};

pub enum DecimalRestrictions {
    No,
    PositiveOrZero,
    StrictlyPositive,
}

pub fn parse_decimal(string: &str, restrictions: DecimalRestrictions) -> GenericResult<Decimal> {
    let value = Decimal::from_str(string.trim()).map_err(|_| format!(
        "Invalid decimal value: {string:?}"))?;
    validate_decimal(value, restrictions)
}

pub fn validate_decimal(value: Decimal, restrictions: DecimalRestrictions) -> GenericResult<Decimal> {
    if !match restrictions {
        DecimalRestrictions::No => true,
        DecimalRestrictions::PositiveOrZero => !value.is_sign_negative() || value.is_zero(),
        DecimalRestrictions::StrictlyPositive => value.is_sign_positive() && !value.is_zero(),
    } {
        return Err!("The value doesn't comply to the specified restrictions: {}", value);
    }

    Ok(value)
}

pub fn parse_date(date: &str, format: &str) -> GenericResult<Date> {
    Ok(Date::parse_from_str(date.trim(), format).map_err(|_| format!(
        "Invalid date: {date:?}"))?)
}

pub fn parse_date_time(date_time: &str, format: &str) -> GenericResult<DateTime> {
    Ok(DateTime::parse_from_str(date_time.trim(), format).map_err(|_| format!(
        "Invalid time: {date_time:?}"))?)
}

pub fn format_date(date: Date) -> String {
    date.format("%d.%m.%Y").to_string()
}

pub fn today() -> Date {
    now().date()
}

pub fn now() -> DateTime {
    chrono::Local::now().naive_local()
}
