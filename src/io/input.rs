use std::collections::BTreeMap;
use std::io::{ErrorKind, Read};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::models::ProductRecord;

pub const NAME_COLUMN: &str = "name";
pub const URL_COLUMN: &str = "url";
pub const DESCRIPTION_COLUMN: &str = "description";

/// Parsed input table: the header plus the product rows in file order
#[derive(Debug, Clone)]
pub struct ProductTable {
    /// Header names as written in the file (trimmed)
    pub columns: Vec<String>,
    pub records: Vec<ProductRecord>,
}

impl ProductTable {
    /// Number of rows carrying an operator-provided description
    pub fn described_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.existing_description.is_some())
            .count()
    }
}

/// Read a delimited product file into a ProductTable
pub fn read_product_table(path: &Path, delimiter: u8) -> Result<ProductTable> {
    let file = std::fs::File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => PipelineError::InputNotFound {
            path: path.to_path_buf(),
        },
        _ => PipelineError::InputMalformed {
            path: path.to_path_buf(),
            detail: format!("cannot open: {}", e),
        },
    })?;
    parse_product_table(file, delimiter, path)
}

/// Read a delimited product file into records, in file order
pub fn read_products(path: &Path, delimiter: u8) -> Result<Vec<ProductRecord>> {
    Ok(read_product_table(path, delimiter)?.records)
}

/// Parse delimited product data from any reader.
///
/// `path` is only used in error messages.
pub fn parse_product_table<R: Read>(reader: R, delimiter: u8, path: &Path) -> Result<ProductTable> {
    let malformed = |detail: String| PipelineError::InputMalformed {
        path: path.to_path_buf(),
        detail,
    };

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| malformed(format!("unreadable header: {}", e)))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let columns = ColumnMap::resolve(&headers).map_err(malformed)?;

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| malformed(e.to_string()))?;
        let line = row.position().map(|p| p.line()).unwrap_or_default();

        if let Some(record) = columns.record(&row, line).map_err(malformed)? {
            records.push(record);
        } else {
            debug!("Skipping blank row at line {}", line);
        }
    }

    Ok(ProductTable {
        columns: headers,
        records,
    })
}

/// Column positions of the fields the pipeline understands
struct ColumnMap {
    name: usize,
    url: usize,
    description: Option<usize>,
    extra: Vec<(usize, String)>,
}

impl ColumnMap {
    fn resolve(headers: &[String]) -> std::result::Result<Self, String> {
        let find = |wanted: &str| {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(wanted))
        };

        let name = find(NAME_COLUMN)
            .ok_or_else(|| format!("missing required column '{}'", NAME_COLUMN))?;
        let url =
            find(URL_COLUMN).ok_or_else(|| format!("missing required column '{}'", URL_COLUMN))?;
        let description = find(DESCRIPTION_COLUMN);

        let extra = headers
            .iter()
            .enumerate()
            .filter(|(i, h)| {
                *i != name && *i != url && Some(*i) != description && !h.is_empty()
            })
            .map(|(i, h)| (i, h.clone()))
            .collect();

        Ok(Self {
            name,
            url,
            description,
            extra,
        })
    }

    /// Build a record from a row; `None` for a row with neither name nor url
    fn record(
        &self,
        row: &StringRecord,
        line: u64,
    ) -> std::result::Result<Option<ProductRecord>, String> {
        let field = |i: usize| row.get(i).unwrap_or_default().to_string();

        let name = field(self.name);
        let url = field(self.url);

        match (name.is_empty(), url.is_empty()) {
            (true, true) => return Ok(None),
            (true, false) => return Err(format!("line {}: empty '{}'", line, NAME_COLUMN)),
            (false, true) => return Err(format!("line {}: empty '{}'", line, URL_COLUMN)),
            (false, false) => {}
        }

        let existing_description = self
            .description
            .map(field)
            .filter(|d| !d.is_empty());

        let extra: BTreeMap<String, String> = self
            .extra
            .iter()
            .map(|(i, header)| (header.clone(), field(*i)))
            .collect();

        Ok(Some(ProductRecord {
            name,
            source_url: url,
            existing_description,
            extra,
        }))
    }
}
