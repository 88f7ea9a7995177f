pub use chrono::NaiveDate as Date;
pub use chrono::NaiveDateTime as DateTime;
pub use rust_decimal::Decimal;

pub type UserId = i64;

macro_rules! date {
    ($year:expr, $month:expr, $day:expr) => {
        ::chrono::NaiveDate::from_ymd_opt($year, $month, $day).unwrap()
    };
}

#[cfg(test)]
macro_rules! date_time {
    ($year:expr, $month:expr, $day:expr, $hour:expr, $minute:expr) => {
        date!($year, $month, $day).and_hms_opt($hour, $minute, 0).unwrap()
    };
}
