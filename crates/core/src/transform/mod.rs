//! Transform stage: flatten the region hierarchy and coerce key columns
//!
//! Each API record carries its state three levels down:
//! `microrregiao → mesorregiao → UF → {id, sigla, nome}`. The transformer copies those three
//! fields into top-level `id_uf`, `sigla_uf` and `nome_uf` columns, drops the nested columns
//! and coerces the identifier columns to integers.

mod error;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::clean::ID_MUNICIPIO;
use crate::table::{Cell, Table, cell_as_i64};

pub use error::TransformError;

/// State identifier column
pub const ID_UF: &str = "id_uf";
/// State abbreviation column
pub const SIGLA_UF: &str = "sigla_uf";
/// State name column
pub const NOME_UF: &str = "nome_uf";

/// Where the state record lives inside each row, and what to pull out of it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyPath {
    /// Top-level column holding the nested record
    pub column: String,
    /// Keys to follow from that column down to the state record
    pub path: Vec<String>,
    /// `(state field, output column)` pairs
    pub fields: Vec<(String, String)>,
}

impl Default for HierarchyPath {
    fn default() -> Self {
        Self {
            column: "microrregiao".to_string(),
            path: vec!["mesorregiao".to_string(), "UF".to_string()],
            fields: vec![
                ("id".to_string(), ID_UF.to_string()),
                ("sigla".to_string(), SIGLA_UF.to_string()),
                ("nome".to_string(), NOME_UF.to_string()),
            ],
        }
    }
}

impl HierarchyPath {
    /// Dotted form, e.g. `microrregiao.mesorregiao.UF`
    pub fn dotted(&self) -> String {
        std::iter::once(self.column.as_str())
            .chain(self.path.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(".")
    }

    fn resolve<'a>(&self, cell: &'a Cell) -> Option<&'a Map<String, Value>> {
        let mut current = cell.as_object()?;
        for key in &self.path {
            current = current.get(key)?.as_object()?;
        }
        Some(current)
    }
}

/// Outcome counters for a transform pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransformStats {
    /// Rows whose nested path did not reach the state record
    pub broken_hierarchy_rows: usize,
    /// Non-null values turned into null by numeric coercion, per column
    pub coerced_to_null: BTreeMap<String, usize>,
}

/// Flattens nested state data and coerces identifiers
#[derive(Debug, Clone)]
pub struct Transformer {
    hierarchy: HierarchyPath,
    dropped_columns: Vec<String>,
    integer_columns: Vec<String>,
    strict: bool,
}

impl Default for Transformer {
    fn default() -> Self {
        Self {
            hierarchy: HierarchyPath::default(),
            dropped_columns: vec!["microrregiao".to_string(), "regiao-imediata".to_string()],
            integer_columns: vec![ID_MUNICIPIO.to_string(), ID_UF.to_string()],
            strict: false,
        }
    }
}

impl Transformer {
    /// Create a transformer with the default hierarchy
    ///
    /// With `strict` set, rows whose hierarchy is broken fail the stage instead of producing
    /// null state fields.
    pub fn new(strict: bool) -> Self {
        Self {
            strict,
            ..Self::default()
        }
    }

    /// Use a different hierarchy path
    pub fn with_hierarchy(mut self, hierarchy: HierarchyPath) -> Self {
        self.hierarchy = hierarchy;
        self
    }

    /// Transform a table, discarding the counters
    pub fn transform(&self, table: Table) -> Result<Table, TransformError> {
        self.transform_with_stats(table).map(|(table, _)| table)
    }

    /// Flatten, drop and coerce
    pub fn transform_with_stats(
        &self,
        mut table: Table,
    ) -> Result<(Table, TransformStats), TransformError> {
        info!("Transforming data");
        let mut stats = TransformStats::default();

        let nested = table.require_column(&self.hierarchy.column)?;
        let mut extracted: Vec<Vec<Cell>> =
            vec![Vec::with_capacity(table.row_count()); self.hierarchy.fields.len()];
        let mut first_broken = None;

        for (i, row) in table.rows().iter().enumerate() {
            let state = self.hierarchy.resolve(&row[nested]);
            if state.is_none() {
                stats.broken_hierarchy_rows += 1;
                first_broken.get_or_insert(i);
            }
            for (values, (field, _)) in extracted.iter_mut().zip(&self.hierarchy.fields) {
                values.push(
                    state
                        .and_then(|s| s.get(field))
                        .cloned()
                        .unwrap_or(Value::Null),
                );
            }
        }

        if let Some(first_row) = first_broken {
            if self.strict {
                return Err(TransformError::BrokenHierarchy {
                    path: self.hierarchy.dotted(),
                    rows: stats.broken_hierarchy_rows,
                    first_row,
                });
            }
            warn!(
                rows = stats.broken_hierarchy_rows,
                first_row,
                path = %self.hierarchy.dotted(),
                "Rows without a state record; state columns left null"
            );
        }

        for (values, (_, column)) in extracted.into_iter().zip(&self.hierarchy.fields) {
            table.add_column(column.as_str(), values)?;
        }

        for column in &self.dropped_columns {
            if !table.drop_column_if_present(column) {
                warn!(column = %column, "Column to drop not present");
            }
        }

        for column in &self.integer_columns {
            let mut nulled = 0;
            table.map_column(column, |cell| {
                let was_null = cell.is_null();
                let coerced = coerce_integer(cell);
                if !was_null && coerced.is_null() {
                    nulled += 1;
                }
                coerced
            })?;
            if nulled > 0 {
                warn!(column = %column, values = nulled, "Unparsable values coerced to null");
            }
            stats.coerced_to_null.insert(column.clone(), nulled);
        }

        info!(
            columns = ?table.columns(),
            "Data transformed and derived columns created"
        );
        Ok((table, stats))
    }
}

/// Coerce a cell to an integer, or null when it cannot be read as one
pub fn coerce_integer(cell: Cell) -> Cell {
    cell_as_i64(&cell).map(Value::from).unwrap_or(Value::Null)
}
