//! Cleaning stage: explicit column names and business-key de-duplication

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::table::{Table, TableError, TableResult};

/// Business key column
pub const ID_MUNICIPIO: &str = "id_municipio";
/// Municipality display name column
pub const NOME_MUNICIPIO: &str = "nome_municipio";

/// Source column names as delivered by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceColumns {
    /// Identifier column, renamed to `id_municipio`
    pub id: String,
    /// Name column, renamed to `nome_municipio`
    pub name: String,
}

impl Default for SourceColumns {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            name: "nome".to_string(),
        }
    }
}

/// Outcome counters for a cleaning pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanStats {
    pub rows_in: usize,
    pub duplicates_removed: usize,
}

/// Renames ambiguous columns and removes duplicate business keys
#[derive(Debug, Clone, Default)]
pub struct Cleaner {
    source: SourceColumns,
}

impl Cleaner {
    /// Create a cleaner for the given source column names
    pub fn new(source: SourceColumns) -> Self {
        Self { source }
    }

    /// Clean a table, discarding the counters
    pub fn clean(&self, table: Table) -> TableResult<Table> {
        self.clean_with_stats(table).map(|(table, _)| table)
    }

    /// Rename the id and name columns, then keep the first row per `id_municipio`
    ///
    /// A table that was already cleaned passes through unchanged.
    pub fn clean_with_stats(&self, mut table: Table) -> TableResult<(Table, CleanStats)> {
        info!("Cleaning data");

        rename(&mut table, &self.source.id, ID_MUNICIPIO)?;
        rename(&mut table, &self.source.name, NOME_MUNICIPIO)?;

        let rows_in = table.row_count();
        let key = table.require_column(ID_MUNICIPIO)?;
        let mut seen = HashSet::with_capacity(rows_in);
        table.retain_rows(|row| seen.insert(row[key].to_string()));

        let stats = CleanStats {
            rows_in,
            duplicates_removed: rows_in - table.row_count(),
        };
        if stats.duplicates_removed > 0 {
            info!(
                removed = stats.duplicates_removed,
                "Removed {} duplicate rows", stats.duplicates_removed
            );
        } else {
            info!("No duplicates found");
        }

        Ok((table, stats))
    }
}

fn rename(table: &mut Table, from: &str, to: &str) -> TableResult<()> {
    if table.has_column(from) {
        return table.rename_column(from, to);
    }
    if table.has_column(to) {
        debug!(column = to, "Column already renamed");
        return Ok(());
    }
    Err(TableError::missing_column(from, table.columns()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw() -> Table {
        Table::from_records(vec![
            json!({"id": 1, "nome": "Alpha", "microrregiao": {"id": 100}}),
            json!({"id": 2, "nome": "Beta", "microrregiao": {"id": 200}}),
            json!({"id": 1, "nome": "Alpha (dup)", "microrregiao": {"id": 999}}),
            json!({"id": 3, "nome": "Gamma", "microrregiao": null}),
            json!({"id": 2, "nome": "Beta (dup)", "microrregiao": null}),
        ])
        .unwrap()
    }

    #[test]
    fn test_renames_columns() {
        let table = Cleaner::default().clean(raw()).unwrap();
        assert_eq!(table.columns(), [ID_MUNICIPIO, NOME_MUNICIPIO, "microrregiao"]);
    }

    #[test]
    fn test_keeps_first_occurrence() {
        let (table, stats) = Cleaner::default().clean_with_stats(raw()).unwrap();
        assert_eq!(stats.rows_in, 5);
        assert_eq!(stats.duplicates_removed, 2);
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.get(0, NOME_MUNICIPIO), Some(&json!("Alpha")));
        assert_eq!(table.get(0, "microrregiao"), Some(&json!({"id": 100})));
        assert_eq!(table.get(1, NOME_MUNICIPIO), Some(&json!("Beta")));
        assert_eq!(table.get(2, ID_MUNICIPIO), Some(&json!(3)));
    }

    #[test]
    fn test_idempotent() {
        let cleaner = Cleaner::default();
        let once = cleaner.clean(raw()).unwrap();
        let (twice, stats) = cleaner.clean_with_stats(once.clone()).unwrap();
        assert_eq!(once, twice);
        assert_eq!(stats.duplicates_removed, 0);
    }

    #[test]
    fn test_null_keys_are_duplicates_of_each_other() {
        let table = Table::from_records(vec![
            json!({"id": null, "nome": "A"}),
            json!({"id": null, "nome": "B"}),
        ])
        .unwrap();
        let (table, stats) = Cleaner::default().clean_with_stats(table).unwrap();
        assert_eq!(stats.duplicates_removed, 1);
        assert_eq!(table.get(0, NOME_MUNICIPIO), Some(&json!("A")));
    }

    #[test]
    fn test_missing_id_column() {
        let table = Table::from_records(vec![json!({"codigo": 1, "nome": "A"})]).unwrap();
        let err = Cleaner::default().clean(table).unwrap_err();
        assert!(matches!(err, TableError::MissingColumn { ref column, .. } if column == "id"));
    }

    #[test]
    fn test_custom_source_columns() {
        let table = Table::from_records(vec![json!({"codigo": 7, "municipio": "A"})]).unwrap();
        let cleaner = Cleaner::new(SourceColumns {
            id: "codigo".to_string(),
            name: "municipio".to_string(),
        });
        let table = cleaner.clean(table).unwrap();
        assert_eq!(table.columns(), [ID_MUNICIPIO, NOME_MUNICIPIO]);
    }
}
