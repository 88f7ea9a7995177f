diesel::table! {
    transactions (user_id, hash) {
        user_id -> BigInt,
        hash -> Text,
        time -> Timestamp,
        seq -> BigInt,
        payload -> Text,
    }
}

diesel::table! {
    currency_rates (currency, date) {
        currency -> Text,
        date -> Date,
        price -> Text,
    }
}

diesel::table! {
    results (user_id) {
        user_id -> BigInt,
        updated -> Timestamp,
        payload -> Text,
    }
}
