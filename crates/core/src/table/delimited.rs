//! Delimited text (CSV) reading and writing

use std::io::Read;
use std::path::Path;

use serde_json::Value;

use super::{Cell, Table, TableError, TableResult, cell_to_text};

impl Table {
    /// Serialize the table as UTF-8 CSV with a header row
    pub fn to_csv_bytes(&self) -> TableResult<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(|cell| cell_to_text(cell).into_owned()))?;
        }
        writer
            .into_inner()
            .map_err(|e| TableError::Csv(csv::Error::from(e.into_error())))
    }

    /// Write the table as CSV to `path`, replacing any existing file
    ///
    /// Returns the bytes written.
    pub fn write_csv_file(&self, path: &Path) -> TableResult<Vec<u8>> {
        let bytes = self.to_csv_bytes()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| TableError::io(parent, e))?;
        }
        std::fs::write(path, &bytes).map_err(|e| TableError::io(path, e))?;
        Ok(bytes)
    }
}

/// Read a CSV file with a header row into a table
pub fn read_csv_file(path: &Path) -> TableResult<Table> {
    let file = std::fs::File::open(path).map_err(|e| TableError::io(path, e))?;
    read_csv(file)
}

/// Read CSV with a header row into a table
///
/// Empty cells become null, integer-looking cells become integers and other numeric cells
/// become floats. Everything else stays a string.
pub fn read_csv<R: Read>(reader: R) -> TableResult<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(reader);

    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut table = Table::new(columns);

    for record in reader.records() {
        let record = record?;
        table.push_row(record.iter().map(parse_field).collect())?;
    }

    Ok(table)
}

fn parse_field(field: &str) -> Cell {
    if field.is_empty() {
        return Value::Null;
    }
    if let Ok(n) = field.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(f) = field.parse::<f64>()
        && f.is_finite()
    {
        return Value::from(f);
    }
    Value::String(field.to_string())
}
