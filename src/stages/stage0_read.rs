use std::path::PathBuf;

use tracing::info;

use crate::error::Result;
use crate::io::read_product_table;
use crate::models::ProductRecord;

/// Configuration for reading the product table
#[derive(Debug, Clone)]
pub struct ReadConfig {
    /// Delimited input file with a header row
    pub input_path: PathBuf,
    /// Field delimiter byte
    pub delimiter: u8,
}

impl Default for ReadConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("products.csv"),
            delimiter: b',',
        }
    }
}

/// Read the product table, in file order
pub fn execute_read(config: &ReadConfig) -> Result<Vec<ProductRecord>> {
    info!("Reading products from {:?}", config.input_path);
    let table = read_product_table(&config.input_path, config.delimiter)?;

    info!(
        "Loaded {} products ({} with an existing description)",
        table.records.len(),
        table.described_count()
    );

    Ok(table.records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    #[test]
    fn test_read_config_default() {
        let config = ReadConfig::default();
        assert_eq!(config.input_path, PathBuf::from("products.csv"));
        assert_eq!(config.delimiter, b',');
    }

    #[test]
    fn test_execute_read_missing_file() {
        let config = ReadConfig {
            input_path: PathBuf::from("/no/such/products.csv"),
            ..Default::default()
        };
        assert!(matches!(
            execute_read(&config),
            Err(PipelineError::InputNotFound { .. })
        ));
    }
}
