//! Enrichment stage: add the macro-region name from a local reference file
//!
//! The reference file is a CSV with one row per state (`codigo_uf,nome_regiao`). It is read
//! fresh on every run and left-joined onto the municipalities by state code.

mod error;
mod join;

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::pipeline::PipelineConfig;
use crate::table::{Table, read_csv_file};
use crate::transform::ID_UF;

pub use error::EnrichError;
pub use join::{JoinStats, left_join};

/// Reference join key column
pub const CODIGO_UF: &str = "codigo_uf";
/// Region name column supplied by the reference file
pub const NOME_REGIAO: &str = "nome_regiao";

/// Outcome counters for an enrichment pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnrichStats {
    pub reference_rows: usize,
    pub matched_rows: usize,
    pub unmatched_rows: usize,
}

/// Left-joins the reference table onto the main table
#[derive(Debug, Clone)]
pub struct Enricher {
    reference_path: PathBuf,
}

impl Enricher {
    /// Create an enricher reading the given reference file
    pub fn new(reference_path: impl Into<PathBuf>) -> Self {
        Self {
            reference_path: reference_path.into(),
        }
    }

    /// Create an enricher from pipeline configuration
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(&config.reference_path)
    }

    /// Reference file path
    pub fn reference_path(&self) -> &Path {
        &self.reference_path
    }

    /// Read the reference table
    pub fn load_reference(&self) -> Result<Table, EnrichError> {
        read_csv_file(&self.reference_path).map_err(|source| {
            if source.is_not_found() {
                EnrichError::ReferenceNotFound(self.reference_path.clone())
            } else {
                EnrichError::Reference {
                    path: self.reference_path.clone(),
                    source,
                }
            }
        })
    }

    /// Enrich a table, discarding the counters
    pub fn enrich(&self, table: Table) -> Result<Table, EnrichError> {
        self.enrich_with_stats(table).map(|(table, _)| table)
    }

    /// Join `id_uf` against the reference `codigo_uf` and drop `codigo_uf`
    pub fn enrich_with_stats(&self, table: Table) -> Result<(Table, EnrichStats), EnrichError> {
        info!("Enriching data");

        let reference = self.load_reference()?;
        info!(
            path = %self.reference_path.display(),
            rows = reference.row_count(),
            "Enrichment data loaded"
        );

        let (mut joined, join) = left_join(table, &reference, ID_UF, CODIGO_UF)?;
        joined.drop_column(CODIGO_UF)?;

        if join.unmatched_rows > 0 {
            warn!(
                rows = join.unmatched_rows,
                "Rows without a matching region; nome_regiao left null"
            );
        }
        info!("Data enriched with macro-region information");

        Ok((
            joined,
            EnrichStats {
                reference_rows: reference.row_count(),
                matched_rows: join.matched_rows,
                unmatched_rows: join.unmatched_rows,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use tempfile::TempDir;

    fn main_table() -> Table {
        Table::from_records(vec![
            json!({"id_municipio": 1, "id_uf": 10, "sigla_uf": "AL"}),
            json!({"id_municipio": 2, "id_uf": 35, "sigla_uf": "SP"}),
            json!({"id_municipio": 3, "id_uf": 99, "sigla_uf": "XX"}),
            json!({"id_municipio": 4, "id_uf": null, "sigla_uf": null}),
        ])
        .unwrap()
    }

    fn write_reference(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("regioes_enriquecimento.csv");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_left_join_preserves_rows() {
        let dir = TempDir::new().unwrap();
        let path = write_reference(&dir, "codigo_uf,nome_regiao\n10,Nordeste\n35,Sudeste\n");

        let (table, stats) = Enricher::new(path).enrich_with_stats(main_table()).unwrap();

        assert_eq!(table.row_count(), 4);
        assert_eq!(
            table.columns(),
            ["id_municipio", "id_uf", "sigla_uf", NOME_REGIAO]
        );
        assert_eq!(table.get(0, NOME_REGIAO), Some(&json!("Nordeste")));
        assert_eq!(table.get(1, NOME_REGIAO), Some(&json!("Sudeste")));
        assert_eq!(table.get(2, NOME_REGIAO), Some(&Value::Null));
        assert_eq!(table.get(3, NOME_REGIAO), Some(&Value::Null));
        assert_eq!(stats.reference_rows, 2);
        assert_eq!(stats.matched_rows, 2);
        assert_eq!(stats.unmatched_rows, 2);
    }

    #[test]
    fn test_missing_reference_file() {
        let dir = TempDir::new().unwrap();
        let enricher = Enricher::new(dir.path().join("absent.csv"));
        let err = enricher.enrich(main_table()).unwrap_err();
        assert!(matches!(err, EnrichError::ReferenceNotFound(_)));
        assert!(err.user_message().contains("Hint:"));
    }

    #[test]
    fn test_reference_without_join_key() {
        let dir = TempDir::new().unwrap();
        let path = write_reference(&dir, "uf,nome_regiao\n10,Nordeste\n");
        let err = Enricher::new(path).enrich(main_table()).unwrap_err();
        assert!(matches!(err, EnrichError::Table(_)));
    }

    #[test]
    fn test_malformed_reference_file() {
        let dir = TempDir::new().unwrap();
        let path = write_reference(&dir, "codigo_uf,nome_regiao\n10,Nordeste,extra\n");
        let err = Enricher::new(path).enrich(main_table()).unwrap_err();
        assert!(matches!(err, EnrichError::Reference { .. }));
    }
}
