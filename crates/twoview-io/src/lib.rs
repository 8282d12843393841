#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// JSON parameter files.
pub mod config;

/// Two-line summary/metrics records.
pub mod record;

pub use config::{load_json, save_json, ConfigError};
pub use record::{
    append_records, parse_metrics_line, parse_records, read_records, write_records, Record,
    RecordError,
};
