mod init;
mod views;

use std::ffi::OsStr;
use std::fs;
use std::path::Path;
use std::process;

use log::error;

use taxfolio::{Config, Engine, Error, ErrorClass};

use crate::init::{initialize, Action};

fn main() {
    let (action, config) = initialize();

    if let Err(err) = run(action, config) {
        if err.class() == ErrorClass::Empty {
            println!("{err}.");
            process::exit(0);
        }

        error!("{}.", err);
        process::exit(match err.class() {
            ErrorClass::InvalidInput => 2,
            ErrorClass::Unavailable => 3,
            _ => 1,
        });
    }
}

fn run(action: Action, config: Config) -> Result<(), Error> {
    if let Some(parent) = Path::new(&config.db_path).parent() {
        fs::create_dir_all(parent).map_err(|e| Error::Storage(Box::new(e)))?;
    }
    let engine = Engine::new(&config)?;

    match action {
        Action::Ingest {user_id, path} => {
            let data = read_file(&path)?;
            let name = Path::new(&path).file_name().and_then(OsStr::to_str).unwrap_or(&path);
            let result = engine.ingest(user_id, name, &data)?;
            views::print_report(&result);
        },

        Action::Report {user_id} => views::print_report(&*engine.results(user_id)?),
        Action::Holdings {user_id} => views::print_holdings(&*engine.results(user_id)?),
        Action::Dividends {user_id} => views::print_dividends(&*engine.results(user_id)?),

        Action::LoadRates {path} => {
            let count = engine.load_rates(&read_file(&path)?)?;
            println!("Loaded {count} exchange rates.");
        },

        Action::Purge {user_id} => {
            engine.purge(user_id)?;
            println!("All data of user #{user_id} has been deleted.");
        },
    }

    Ok(())
}

fn read_file(path: &str) -> Result<Vec<u8>, Error> {
    fs::read(path).map_err(|e| Error::ParsingFailed(format!("Unable to read {path:?}: {e}")))
}
