//! Load stage: replace the destination table and constrain its business key
//!
//! Credentials are resolved from [`DatabaseSettings`] and a connection is opened by a
//! [`Connector`]. The load then runs against the resulting [`LoadTarget`]:
//!
//! 1. drop and recreate the table from [`TableSchema`]
//! 2. insert every row in multi-row chunks
//! 3. add the primary key on `id_municipio`
//!
//! No transaction wraps the steps, so a failure while adding the key leaves a
//! populated table without a constraint.
//!
//! Every failure is caught and reported as a [`LoadOutcome`]; the loader never propagates an
//! error to the pipeline.

mod error;
mod postgres;
mod schema;
mod settings;

use async_trait::async_trait;
use tracing::{error, info};

pub use error::LoadError;
pub use postgres::{PostgresConnector, PostgresTarget};
pub use schema::{
    ColumnDef, DEFAULT_TABLE_NAME, FINAL_COLUMNS, MunicipalityRecord, SqlType, TableSchema,
    is_valid_identifier, quote_ident, select_final_columns,
};
pub use settings::{
    DB_HOST, DB_NAME, DB_PASSWORD, DB_PORT, DB_USER, DEFAULT_PORT, DatabaseCredentials,
    DatabaseSettings,
};

/// Default rows per `INSERT` statement
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Opens connections to the destination database
#[async_trait]
pub trait Connector: Send + Sync {
    type Target: LoadTarget;

    /// Open a connection with the given credentials
    async fn connect(&self, credentials: &DatabaseCredentials) -> Result<Self::Target, LoadError>;
}

/// Operations the loader performs on an open connection
#[async_trait]
pub trait LoadTarget: Send {
    /// Drop the table if it exists and create it from the schema
    async fn replace_table(&mut self, schema: &TableSchema) -> Result<(), LoadError>;

    /// Insert rows, returning how many were written
    async fn insert_rows(
        &mut self,
        schema: &TableSchema,
        rows: &[MunicipalityRecord],
    ) -> Result<u64, LoadError>;

    /// Add the primary key constraint
    async fn add_primary_key(&mut self, schema: &TableSchema) -> Result<(), LoadError>;
}

/// Result of a load attempt
#[derive(Debug)]
pub enum LoadOutcome {
    /// All rows written and the primary key added
    Loaded { rows: usize },
    /// Credentials were incomplete; no connection was attempted
    Skipped { missing: Vec<String> },
    /// Connecting, recreating, inserting or constraining failed
    Failed(LoadError),
}

impl LoadOutcome {
    /// Check if the table was fully loaded
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadOutcome::Loaded { .. })
    }

    /// Short label for reports
    pub fn label(&self) -> &'static str {
        match self {
            LoadOutcome::Loaded { .. } => "loaded",
            LoadOutcome::Skipped { .. } => "skipped",
            LoadOutcome::Failed(_) => "failed",
        }
    }

    /// Operator-facing description for reports, with a hint when the load did not happen
    pub fn describe(&self) -> String {
        match self {
            LoadOutcome::Loaded { rows } => format!("{rows} rows loaded"),
            LoadOutcome::Skipped { missing } => {
                LoadError::MissingCredentials(missing.clone()).user_message()
            }
            LoadOutcome::Failed(err) => err.user_message(),
        }
    }
}

/// Writes final records to the destination table
#[derive(Debug, Clone)]
pub struct Loader {
    settings: DatabaseSettings,
    schema: TableSchema,
    batch_size: usize,
}

impl Loader {
    /// Create a loader for the given settings and table name
    pub fn new(settings: DatabaseSettings, table: impl Into<String>) -> Self {
        Self {
            settings,
            schema: TableSchema::municipalities(table),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Rows per `INSERT`, capped by the bind parameter limit
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, self.schema.max_rows_per_insert());
        self
    }

    /// Destination schema
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Load records, catching and logging every failure
    pub async fn load<C: Connector>(
        &self,
        connector: &C,
        records: &[MunicipalityRecord],
    ) -> LoadOutcome {
        info!(table = %self.schema.table, rows = records.len(), "Loading data");

        let credentials = match self.settings.credentials() {
            Ok(credentials) => credentials,
            Err(LoadError::MissingCredentials(missing)) => {
                error!(
                    missing = ?missing,
                    "Database credentials not configured; skipping load"
                );
                return LoadOutcome::Skipped { missing };
            }
            Err(err) => {
                error!(error = %err, "Invalid database settings");
                return LoadOutcome::Failed(err);
            }
        };

        match self.write(connector, &credentials, records).await {
            Ok(rows) => {
                info!(
                    table = %self.schema.table,
                    rows,
                    "Data loaded and primary key added on {}", self.schema.primary_key
                );
                LoadOutcome::Loaded { rows }
            }
            Err(err) => {
                error!(table = %self.schema.table, error = %err, "Failed to load data");
                LoadOutcome::Failed(err)
            }
        }
    }

    async fn write<C: Connector>(
        &self,
        connector: &C,
        credentials: &DatabaseCredentials,
        records: &[MunicipalityRecord],
    ) -> Result<usize, LoadError> {
        let mut target = connector.connect(credentials).await?;
        info!(host = %credentials.host, database = %credentials.database, "Connected");

        target.replace_table(&self.schema).await?;

        let mut inserted = 0;
        for chunk in records.chunks(self.batch_size) {
            target
                .insert_rows(&self.schema, chunk)
                .await
                .map_err(|err| match err {
                    LoadError::Insert { table, message, .. } => LoadError::Insert {
                        table,
                        inserted,
                        message,
                    },
                    other => other,
                })?;
            inserted += chunk.len();
        }

        target.add_primary_key(&self.schema).await?;
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorded {
        statements: Vec<String>,
        rows: Vec<MunicipalityRecord>,
    }

    struct MemoryTarget {
        recorded: Arc<Mutex<Recorded>>,
    }

    #[async_trait]
    impl LoadTarget for MemoryTarget {
        async fn replace_table(&mut self, schema: &TableSchema) -> Result<(), LoadError> {
            let mut recorded = self.recorded.lock().unwrap();
            recorded.statements.push(schema.drop_sql());
            recorded.statements.push(schema.create_sql());
            recorded.rows.clear();
            Ok(())
        }

        async fn insert_rows(
            &mut self,
            schema: &TableSchema,
            rows: &[MunicipalityRecord],
        ) -> Result<u64, LoadError> {
            let mut recorded = self.recorded.lock().unwrap();
            recorded.statements.push(schema.insert_sql(rows.len()));
            recorded.rows.extend_from_slice(rows);
            Ok(rows.len() as u64)
        }

        async fn add_primary_key(&mut self, schema: &TableSchema) -> Result<(), LoadError> {
            let mut recorded = self.recorded.lock().unwrap();
            recorded.statements.push(schema.add_primary_key_sql());
            let mut seen = HashSet::new();
            for row in &recorded.rows {
                match row.id_municipio {
                    Some(id) if seen.insert(id) => {}
                    _ => {
                        return Err(LoadError::Constraint {
                            table: schema.table.clone(),
                            column: schema.primary_key.to_string(),
                            message: format!("duplicate or null key {:?}", row.id_municipio),
                        });
                    }
                }
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemoryConnector {
        connects: AtomicUsize,
        recorded: Arc<Mutex<Recorded>>,
        refuse: bool,
    }

    #[async_trait]
    impl Connector for MemoryConnector {
        type Target = MemoryTarget;

        async fn connect(
            &self,
            credentials: &DatabaseCredentials,
        ) -> Result<MemoryTarget, LoadError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.refuse {
                return Err(LoadError::Connect {
                    host: credentials.host.clone(),
                    database: credentials.database.clone(),
                    message: "connection refused".into(),
                });
            }
            Ok(MemoryTarget {
                recorded: Arc::clone(&self.recorded),
            })
        }
    }

    fn settings() -> DatabaseSettings {
        DatabaseSettings {
            user: Some("etl".into()),
            password: Some("secret".into()),
            host: Some("localhost".into()),
            database: Some("ibge".into()),
            port: None,
        }
    }

    fn record(id: i64) -> MunicipalityRecord {
        MunicipalityRecord {
            id_municipio: Some(id),
            nome_municipio: Some(format!("M{id}")),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_load_runs_steps_in_order() {
        let connector = MemoryConnector::default();
        let records: Vec<_> = (1..=5).map(record).collect();

        let outcome = Loader::new(settings(), "t")
            .with_batch_size(2)
            .load(&connector, &records)
            .await;

        assert!(matches!(outcome, LoadOutcome::Loaded { rows: 5 }));
        let recorded = connector.recorded.lock().unwrap();
        assert!(recorded.statements[0].starts_with("DROP TABLE"));
        assert!(recorded.statements[1].starts_with("CREATE TABLE"));
        let inserts = recorded
            .statements
            .iter()
            .filter(|s| s.starts_with("INSERT"))
            .count();
        assert_eq!(inserts, 3);
        assert!(recorded.statements.last().unwrap().contains("ADD PRIMARY KEY"));
        assert_eq!(recorded.rows.len(), 5);
    }

    #[tokio::test]
    async fn test_missing_credentials_skip_without_connecting() {
        let connector = MemoryConnector::default();
        let mut settings = settings();
        settings.password = None;

        let outcome = Loader::new(settings, "t").load(&connector, &[record(1)]).await;

        let description = outcome.describe();
        assert!(description.contains(DB_PASSWORD));
        assert!(description.contains("Hint:"));
        match outcome {
            LoadOutcome::Skipped { missing } => assert_eq!(missing, [DB_PASSWORD]),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(connector.connects.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failed_outcome_describes_with_hint() {
        let outcome = LoadOutcome::Failed(LoadError::Connect {
            host: "db.internal".to_string(),
            database: "ibge".to_string(),
            message: "connection refused".to_string(),
        });
        let description = outcome.describe();
        assert!(description.contains("db.internal"));
        assert!(description.contains("Hint:"));
        assert_eq!(LoadOutcome::Loaded { rows: 3 }.describe(), "3 rows loaded");
    }

    #[tokio::test]
    async fn test_duplicate_key_fails_at_constraint() {
        let connector = MemoryConnector::default();
        let outcome = Loader::new(settings(), "t")
            .load(&connector, &[record(1), record(2), record(1)])
            .await;

        assert!(matches!(outcome, LoadOutcome::Failed(LoadError::Constraint { .. })));
        assert_eq!(connector.recorded.lock().unwrap().rows.len(), 3);
    }

    #[tokio::test]
    async fn test_connection_failure_is_caught() {
        let connector = MemoryConnector {
            refuse: true,
            ..Default::default()
        };
        let outcome = Loader::new(settings(), "t").load(&connector, &[record(1)]).await;

        assert!(matches!(outcome, LoadOutcome::Failed(LoadError::Connect { .. })));
        assert_eq!(outcome.label(), "failed");
    }

    #[test]
    fn test_batch_size_is_capped() {
        let loader = Loader::new(settings(), "t").with_batch_size(usize::MAX);
        assert_eq!(loader.batch_size, loader.schema().max_rows_per_insert());
        let loader = Loader::new(settings(), "t").with_batch_size(0);
        assert_eq!(loader.batch_size, 1);
    }
}
