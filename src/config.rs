use std::fs::File;

use serde::Deserialize;

use crate::core::{EmptyResult, GenericResult};
use crate::matching::ShortPolicy;

#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub db_path: String,
    pub reporting_currency: String,

    /// Whether a sell order may exceed the open position and open a short one.
    pub stock_shorting: ShortPolicy,
    /// Written option contracts are short positions, so options default to
    /// allowing them.
    pub option_shorting: ShortPolicy,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            db_path: "~/.taxfolio/db.sqlite".to_owned(),
            reporting_currency: "EUR".to_owned(),
            stock_shorting: ShortPolicy::Forbid,
            option_shorting: ShortPolicy::Allow,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> GenericResult<Config> {
        let mut config: Config = serde_yaml::from_reader(
            File::open(path).map_err(|e| format!("Unable to read {path:?}: {e}"))?)?;

        config.db_path = shellexpand::tilde(&config.db_path).to_string();
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> EmptyResult {
        let currency = &self.reporting_currency;
        if currency.len() != 3 || !currency.bytes().all(|byte| byte.is_ascii_uppercase()) {
            return Err!("Invalid reporting currency: {:?}", currency);
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn mock(db_path: &str) -> Config {
        Config {
            db_path: db_path.to_owned(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use matches::assert_matches;

    use super::*;

    #[test]
    fn validation() {
        assert_matches!(Config::default().validate(), Ok(()));

        let config = Config {
            reporting_currency: s!("euros"),
            ..Default::default()
        };
        assert_matches!(config.validate(), Err(_));
    }
}
