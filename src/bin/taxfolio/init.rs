use std::io::{self, Write};
use std::path::Path;
use std::process;

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use log::error;

use taxfolio::core::GenericResult;
use taxfolio::types::UserId;
use taxfolio::Config;

pub enum Action {
    Ingest {
        user_id: UserId,
        path: String,
    },
    Report {user_id: UserId},
    Holdings {user_id: UserId},
    Dividends {user_id: UserId},
    LoadRates {path: String},
    Purge {user_id: UserId},
}

pub fn initialize() -> (Action, Config) {
    let default_config_path = "~/.taxfolio/config.yaml";

    let matches = Command::new("taxfolio")
        .about("Computes realized capital gains, option trade results and dividend withholding tax from broker statement exports")
        .disable_help_subcommand(true)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(Arg::new("config")
            .short('c')
            .long("config")
            .value_name("PATH")
            .help(format!("Configuration file path [default: {default_config_path}]")))
        .arg(Arg::new("verbose")
            .short('v')
            .long("verbose")
            .action(ArgAction::Count)
            .help("Sets the level of verbosity"))
        .subcommand(Command::new("ingest")
            .about("Ingest a broker statement")
            .long_about(concat!(
                "\nParses the specified broker statement (CSV or XML), persists its transactions ",
                "and recomputes the user's results. Re-ingesting the same statement is a no-op."))
            .arg(user_id_arg())
            .arg(Arg::new("STATEMENT")
                .help("Path to the statement file")
                .required(true)))
        .subcommand(Command::new("report")
            .about("Show realized trade results and the dividend tax summary")
            .arg(user_id_arg()))
        .subcommand(Command::new("holdings")
            .about("Show open positions")
            .arg(user_id_arg()))
        .subcommand(Command::new("dividends")
            .about("Show dividend and interest income")
            .arg(user_id_arg()))
        .subcommand(Command::new("load-rates")
            .about("Load historical exchange rates")
            .arg(Arg::new("RATES")
                .help("Path to a date,currency,rate *.csv file")
                .required(true)))
        .subcommand(Command::new("purge")
            .about("Delete all data of a user")
            .arg(user_id_arg()))
        .get_matches();

    let log_level = match matches.get_count("verbose") {
        0 => log::Level::Info,
        1 => log::Level::Debug,
        _ => log::Level::Trace,
    };

    if let Err(err) = easy_logging::init(module_path!().split("::").next().unwrap(), log_level) {
        let _ = writeln!(io::stderr(), "Failed to initialize the logging: {err}.");
        process::exit(1);
    }

    let action = match parse_arguments(&matches) {
        Ok(action) => action,
        Err(err) => {
            error!("{}.", err);
            process::exit(1);
        },
    };

    let config = match load_config(&matches, default_config_path) {
        Ok(config) => config,
        Err(err) => {
            error!("Error while reading the configuration file: {}.", err);
            process::exit(1);
        },
    };

    (action, config)
}

fn user_id_arg() -> Arg {
    Arg::new("USER_ID")
        .help("User identifier")
        .value_parser(value_parser!(UserId))
        .required(true)
}

fn load_config(matches: &ArgMatches, default_path: &str) -> GenericResult<Config> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => Config::load(&shellexpand::tilde(path))?,
        None => {
            let path = shellexpand::tilde(default_path).to_string();
            if Path::new(&path).exists() {
                Config::load(&path)?
            } else {
                Config::default()
            }
        },
    };

    config.db_path = shellexpand::tilde(&config.db_path).to_string();
    Ok(config)
}

fn parse_arguments(matches: &ArgMatches) -> GenericResult<Action> {
    let (command, matches) = matches.subcommand().unwrap();

    let user_id = || *matches.get_one::<UserId>("USER_ID").unwrap();

    Ok(match command {
        "ingest" => Action::Ingest {
            user_id: user_id(),
            path: matches.get_one::<String>("STATEMENT").unwrap().clone(),
        },
        "report" => Action::Report {user_id: user_id()},
        "holdings" => Action::Holdings {user_id: user_id()},
        "dividends" => Action::Dividends {user_id: user_id()},
        "load-rates" => Action::LoadRates {
            path: matches.get_one::<String>("RATES").unwrap().clone(),
        },
        "purge" => Action::Purge {user_id: user_id()},
        _ => unreachable!(),
    })
}
