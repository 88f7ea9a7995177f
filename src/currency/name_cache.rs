use std::collections::HashSet;
use std::sync::Mutex;

use lazy_static::lazy_static;

lazy_static! {
    static ref CURRENCIES: Mutex<HashSet<&'static str>> = Mutex::new(HashSet::new());
}

// Currency names are interned, so Cash stays Copy and currency comparison is cheap.
pub fn get(currency: &str) -> &'static str {
    let mut currencies = CURRENCIES.lock().unwrap();

    match currencies.get(currency).copied() {
        Some(static_currency) => static_currency,
        None => {
            let static_currency = Box::leak(currency.to_owned().into_boxed_str());
            currencies.insert(static_currency);
            static_currency
        }
    }
}
