#[macro_use] pub mod core;
#[macro_use] pub mod types;

pub mod aggregation;
pub mod cache;
pub mod config;
pub mod currency;
pub mod db;
pub mod error;
pub mod ingest;
pub mod instruments;
pub mod localities;
pub mod matching;
pub mod parsers;
pub mod results;
pub mod storage;
pub mod transactions;
pub mod util;

pub use crate::config::Config;
pub use crate::error::{Error, ErrorClass};
pub use crate::ingest::Engine;
pub use crate::results::UploadResult;
