//! In-memory tabular data passed between pipeline stages
//!
//! A [`Table`] is an ordered list of column names plus rows of JSON cells. Nested API
//! structures stay as JSON objects until the transform stage flattens them, so every stage can
//! work on the same type.
//!
//! ```rust
//! use ibge_etl_core::table::Table;
//! use serde_json::json;
//!
//! let table = Table::from_records(vec![
//!     json!({"id": 1, "nome": "Alpha"}),
//!     json!({"id": 2, "nome": "Beta"}),
//! ])
//! .unwrap();
//!
//! assert_eq!(table.columns(), ["id", "nome"]);
//! assert_eq!(table.row_count(), 2);
//! ```

mod delimited;
mod error;

use std::borrow::Cow;
use std::fmt::Write as _;

use serde::Serialize;
use serde_json::Value;

pub use delimited::{read_csv, read_csv_file};
pub use error::{TableError, TableResult};

/// A single table cell
pub type Cell = Value;

/// Ordered columns plus row-major cells
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Create an empty table with the given columns
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Build a table from columns and rows, checking every row's width
    pub fn from_rows<I, S>(columns: I, rows: Vec<Vec<Cell>>) -> TableResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// Build a table from a list of JSON objects
    ///
    /// Columns are the union of object keys in first-seen order. Keys missing from a record
    /// become null cells.
    pub fn from_records(records: Vec<Value>) -> TableResult<Self> {
        let mut columns: Vec<String> = Vec::new();
        let mut objects = Vec::with_capacity(records.len());

        for (index, record) in records.into_iter().enumerate() {
            let Value::Object(map) = record else {
                return Err(TableError::NotAnObject { index });
            };
            for key in map.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
            objects.push(map);
        }

        let rows = objects
            .into_iter()
            .map(|mut map| {
                columns
                    .iter()
                    .map(|c| map.remove(c).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Ok(Self { columns, rows })
    }

    /// Column names in order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All rows
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Check if the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Check if a column exists
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Position of a column, if present
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Position of a column, or a [`TableError::MissingColumn`]
    pub fn require_column(&self, name: &str) -> TableResult<usize> {
        self.column_index(name)
            .ok_or_else(|| TableError::missing_column(name, &self.columns))
    }

    /// Value at a row and named column
    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        let index = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[index])
    }

    /// Append a row
    pub fn push_row(&mut self, row: Vec<Cell>) -> TableResult<()> {
        if row.len() != self.columns.len() {
            return Err(TableError::RowWidth {
                row: self.rows.len(),
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Rename a column in place
    pub fn rename_column(&mut self, from: &str, to: &str) -> TableResult<()> {
        let index = self.require_column(from)?;
        if from != to && self.has_column(to) {
            return Err(TableError::DuplicateColumn(to.to_string()));
        }
        self.columns[index] = to.to_string();
        Ok(())
    }

    /// Remove a column and its values
    pub fn drop_column(&mut self, name: &str) -> TableResult<()> {
        let index = self.require_column(name)?;
        self.columns.remove(index);
        for row in &mut self.rows {
            row.remove(index);
        }
        Ok(())
    }

    /// Remove a column if it exists, returning whether it did
    pub fn drop_column_if_present(&mut self, name: &str) -> bool {
        self.drop_column(name).is_ok()
    }

    /// Append a column with one value per row
    pub fn add_column(&mut self, name: impl Into<String>, values: Vec<Cell>) -> TableResult<()> {
        let name = name.into();
        if self.has_column(&name) {
            return Err(TableError::DuplicateColumn(name));
        }
        if values.len() != self.rows.len() {
            return Err(TableError::ColumnLength {
                column: name,
                expected: self.rows.len(),
                found: values.len(),
            });
        }
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
        self.columns.push(name);
        Ok(())
    }

    /// Replace every value of a column with `f(value)`
    pub fn map_column<F>(&mut self, name: &str, mut f: F) -> TableResult<()>
    where
        F: FnMut(Cell) -> Cell,
    {
        let index = self.require_column(name)?;
        for row in &mut self.rows {
            let value = std::mem::take(&mut row[index]);
            row[index] = f(value);
        }
        Ok(())
    }

    /// Keep only rows for which the predicate holds
    pub fn retain_rows<F>(&mut self, mut f: F)
    where
        F: FnMut(&[Cell]) -> bool,
    {
        self.rows.retain(|row| f(row));
    }

    /// New table with the given columns in the given order
    pub fn select(&self, columns: &[&str]) -> TableResult<Table> {
        let indices = columns
            .iter()
            .map(|c| self.require_column(c))
            .collect::<TableResult<Vec<_>>>()?;

        Ok(Table {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        })
    }

    /// New table with at most the first `n` rows
    pub fn head(&self, n: usize) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Split into columns and rows
    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<Cell>>) {
        (self.columns, self.rows)
    }

    /// Render the table as an aligned text grid, with a leading row index column
    pub fn render(&self) -> String {
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(|c| display_cell(c, 40)).collect())
            .collect();

        for row in &cells {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }
        let index_width = self.rows.len().saturating_sub(1).to_string().len();

        let mut out = String::new();
        let _ = write!(out, "{:index_width$}", "");
        for (name, width) in self.columns.iter().zip(widths.iter().copied()) {
            let _ = write!(out, "  {name:>width$}");
        }
        for (i, row) in cells.iter().enumerate() {
            out.push('\n');
            let _ = write!(out, "{i:<index_width$}");
            for (cell, width) in row.iter().zip(widths.iter().copied()) {
                let _ = write!(out, "  {cell:>width$}");
            }
        }
        out
    }
}

/// Text form of a cell as written to delimited files
///
/// Null is empty, strings are written raw, and nested values are compact JSON.
pub fn cell_to_text(cell: &Cell) -> Cow<'_, str> {
    match cell {
        Value::Null => Cow::Borrowed(""),
        Value::String(s) => Cow::Borrowed(s.as_str()),
        Value::Bool(b) => Cow::Owned(b.to_string()),
        Value::Number(n) => Cow::Owned(n.to_string()),
        other => Cow::Owned(other.to_string()),
    }
}

/// Text form of a cell for log output, truncated to `max_chars`
pub fn display_cell(cell: &Cell, max_chars: usize) -> String {
    let text = match cell {
        Value::Null => Cow::Borrowed("null"),
        other => cell_to_text(other),
    };
    if text.chars().count() <= max_chars {
        text.into_owned()
    } else {
        let mut truncated: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        truncated.push_str("...");
        truncated
    }
}

/// Interpret a cell as an integer
///
/// Integers pass through, integral floats and numeric strings convert, anything else is
/// `None`.
pub fn cell_as_i64(cell: &Cell) -> Option<i64> {
    match cell {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .filter(|f| *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .and_then(|f| cell_as_i64(&serde_json::json!(f)))
            })
        }
        _ => None,
    }
}
