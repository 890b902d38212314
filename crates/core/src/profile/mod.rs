//! Profiling stage: read-only diagnostics over a table
//!
//! [`TableProfile::of`] computes the shape, per-column types and null counts, descriptive
//! statistics and a row sample. [`Profiler::run`] logs the rendered profile; it never changes
//! the table it looks at.

mod stats;

use std::fmt::Write as _;

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::table::{Cell, Table, display_cell};

pub use stats::{CategoricalSummary, NumericSummary};

/// Inferred type of a column's non-null values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// No non-null values
    Null,
    Boolean,
    Integer,
    /// Floating point, or integers mixed with floats
    Number,
    String,
    Object,
    Array,
    /// More than one incompatible type
    Mixed,
}

impl ColumnType {
    /// Type of a single non-null cell
    fn of_cell(cell: &Cell) -> Self {
        match cell {
            Value::Null => ColumnType::Null,
            Value::Bool(_) => ColumnType::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => ColumnType::Integer,
            Value::Number(_) => ColumnType::Number,
            Value::String(_) => ColumnType::String,
            Value::Array(_) => ColumnType::Array,
            Value::Object(_) => ColumnType::Object,
        }
    }

    fn merge(self, other: ColumnType) -> ColumnType {
        match (self, other) {
            (a, b) if a == b => a,
            (ColumnType::Null, b) => b,
            (a, ColumnType::Null) => a,
            (ColumnType::Integer, ColumnType::Number)
            | (ColumnType::Number, ColumnType::Integer) => ColumnType::Number,
            _ => ColumnType::Mixed,
        }
    }

    /// Check if values of this type have numeric statistics
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Number)
    }

    /// Type name used in profile output
    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::Null => "null",
            ColumnType::Boolean => "boolean",
            ColumnType::Integer => "integer",
            ColumnType::Number => "number",
            ColumnType::String => "string",
            ColumnType::Object => "object",
            ColumnType::Array => "array",
            ColumnType::Mixed => "mixed",
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Profile of one column
#[derive(Debug, Clone, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    pub column_type: ColumnType,
    pub non_null: usize,
    pub nulls: usize,
    pub categorical: CategoricalSummary,
    /// Present when every non-null value is numeric
    pub numeric: Option<NumericSummary>,
}

impl ColumnProfile {
    fn of(name: &str, values: &[&Cell]) -> Self {
        let column_type = values
            .iter()
            .map(|v| ColumnType::of_cell(v))
            .fold(ColumnType::Null, ColumnType::merge);

        let non_null = values.iter().filter(|v| !v.is_null()).count();
        let numeric = if column_type.is_numeric() {
            NumericSummary::of(values.iter().filter_map(|v| v.as_f64()))
        } else {
            None
        };

        Self {
            name: name.to_string(),
            column_type,
            non_null,
            nulls: values.len() - non_null,
            categorical: CategoricalSummary::of(values),
            numeric,
        }
    }
}

/// Profile of a whole table
#[derive(Debug, Clone, Serialize)]
pub struct TableProfile {
    pub rows: usize,
    pub columns: Vec<ColumnProfile>,
    /// First rows of the table
    pub sample: Table,
}

impl TableProfile {
    /// Profile a table, keeping `sample_rows` rows as a sample
    pub fn of(table: &Table, sample_rows: usize) -> Self {
        let columns = table
            .columns()
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let values: Vec<&Cell> = table.rows().iter().map(|row| &row[i]).collect();
                ColumnProfile::of(name, &values)
            })
            .collect();

        Self {
            rows: table.row_count(),
            columns,
            sample: table.head(sample_rows),
        }
    }

    /// Profile of a named column
    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Shape line, e.g. `(5570, 4)`
    pub fn shape(&self) -> String {
        format!("({}, {})", self.rows, self.columns.len())
    }

    /// Column name, non-null count and type for every column
    pub fn render_info(&self) -> String {
        let width = name_width(&self.columns);
        let mut out = format!(
            "{} entries, {} columns\n {:>3}  {:<width$}  {:>8}  type",
            self.rows,
            self.columns.len(),
            "#",
            "column",
            "non-null"
        );
        for (i, c) in self.columns.iter().enumerate() {
            let _ = write!(
                out,
                "\n {:>3}  {:<width$}  {:>8}  {}",
                i, c.name, c.non_null, c.column_type
            );
        }
        out
    }

    /// Descriptive statistics, one line per column
    pub fn render_describe(&self) -> String {
        let width = name_width(&self.columns);
        let mut out = format!(
            "{:<width$}  {:>6}  {:>6}  {:<24}  {:>5}  {:>12}  {:>12}  {:>12}  {:>12}  {:>12}  {:>12}  {:>12}",
            "column", "count", "unique", "top", "freq", "mean", "std", "min", "25%", "50%", "75%", "max"
        );
        for c in &self.columns {
            let cat = &c.categorical;
            let top = cat
                .top
                .as_ref()
                .map(|t| display_cell(t, 24))
                .unwrap_or_else(|| "-".to_string());
            let _ = write!(
                out,
                "\n{:<width$}  {:>6}  {:>6}  {:<24}  {:>5}",
                c.name, cat.count, cat.unique, top, cat.freq
            );
            match &c.numeric {
                Some(n) => {
                    for value in [
                        Some(n.mean),
                        n.std,
                        Some(n.min),
                        Some(n.q25),
                        Some(n.median),
                        Some(n.q75),
                        Some(n.max),
                    ] {
                        let _ = write!(out, "  {:>12}", format_stat(value));
                    }
                }
                None => {
                    for _ in 0..7 {
                        let _ = write!(out, "  {:>12}", "-");
                    }
                }
            }
        }
        out
    }

    /// Null count per column
    pub fn render_nulls(&self) -> String {
        let width = name_width(&self.columns);
        self.columns
            .iter()
            .map(|c| format!("{:<width$}  {}", c.name, c.nulls))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn name_width(columns: &[ColumnProfile]) -> usize {
    columns
        .iter()
        .map(|c| c.name.chars().count())
        .max()
        .unwrap_or(0)
        .max("column".len())
}

fn format_stat(value: Option<f64>) -> String {
    match value {
        Some(v) if v.fract() == 0.0 && v.abs() < 1e15 => format!("{v:.1}"),
        Some(v) => format!("{v:.4}"),
        None => "-".to_string(),
    }
}

/// Logs table diagnostics at INFO level
#[derive(Debug, Clone)]
pub struct Profiler {
    sample_rows: usize,
}

impl Default for Profiler {
    fn default() -> Self {
        Self { sample_rows: 5 }
    }
}

impl Profiler {
    /// Create a profiler that samples `sample_rows` rows
    pub fn new(sample_rows: usize) -> Self {
        Self { sample_rows }
    }

    /// Profile the table and log the results
    pub fn run(&self, table: &Table) -> TableProfile {
        info!("Profiling fetched data");
        let profile = TableProfile::of(table, self.sample_rows);

        info!(shape = %profile.shape(), "Table shape");
        info!("Column types and non-null counts:\n{}", profile.render_info());
        info!("Descriptive statistics:\n{}", profile.render_describe());
        info!("Missing values per column:\n{}", profile.render_nulls());
        info!("Sample rows:\n{}", profile.sample.render());

        profile
    }
}
