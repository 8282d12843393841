use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use serde::{de::DeserializeOwned, Serialize};

/// Error types for the config module.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Error reading or writing file
    #[error("error reading or writing file")]
    IoError(#[from] std::io::Error),

    /// Error (de)serializing the JSON content
    #[error("Failed to (de)serialize JSON")]
    SerializationError(#[from] serde_json::Error),
}

/// Load a value from a JSON file.
///
/// Parameter structs are `#[serde(default)]`, so missing fields keep their defaults.
pub fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, ConfigError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let value = serde_json::from_reader(BufReader::new(file))?;
    log::debug!("loaded {}", path.display());
    Ok(value)
}

/// Write a value to a JSON file, pretty-printed.
pub fn save_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<(), ConfigError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}
