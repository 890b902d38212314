//! PostgreSQL load target backed by `tokio-postgres`

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error};

use super::schema::{MunicipalityRecord, TableSchema};
use super::settings::DatabaseCredentials;
use super::{Connector, LoadError, LoadTarget};

/// Opens PostgreSQL connections
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresConnector;

#[async_trait]
impl Connector for PostgresConnector {
    type Target = PostgresTarget;

    async fn connect(
        &self,
        credentials: &DatabaseCredentials,
    ) -> Result<PostgresTarget, LoadError> {
        let (client, connection) = credentials
            .to_postgres_config()
            .connect(NoTls)
            .await
            .map_err(|e| LoadError::Connect {
                host: credentials.host.clone(),
                database: credentials.database.clone(),
                message: e.to_string(),
            })?;

        // Spawn connection handler
        let connection = tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "PostgreSQL connection error");
            }
        });

        Ok(PostgresTarget { client, connection })
    }
}

/// An open PostgreSQL connection
pub struct PostgresTarget {
    client: Client,
    connection: JoinHandle<()>,
}

impl Drop for PostgresTarget {
    fn drop(&mut self) {
        self.connection.abort();
    }
}

#[async_trait]
impl LoadTarget for PostgresTarget {
    async fn replace_table(&mut self, schema: &TableSchema) -> Result<(), LoadError> {
        let ddl = format!("{};\n{};", schema.drop_sql(), schema.create_sql());
        debug!(sql = %ddl, "Recreating table");
        self.client
            .batch_execute(&ddl)
            .await
            .map_err(|e| LoadError::Schema {
                table: schema.table.clone(),
                message: e.to_string(),
            })
    }

    async fn insert_rows(
        &mut self,
        schema: &TableSchema,
        rows: &[MunicipalityRecord],
    ) -> Result<u64, LoadError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let sql = schema.insert_sql(rows.len());
        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(rows.len() * 6);
        for row in rows {
            params.push(&row.id_municipio);
            params.push(&row.nome_municipio);
            params.push(&row.id_uf);
            params.push(&row.sigla_uf);
            params.push(&row.nome_uf);
            params.push(&row.nome_regiao);
        }

        self.client
            .execute(sql.as_str(), &params)
            .await
            .map_err(|e| LoadError::Insert {
                table: schema.table.clone(),
                inserted: 0,
                message: e.to_string(),
            })
    }

    async fn add_primary_key(&mut self, schema: &TableSchema) -> Result<(), LoadError> {
        self.client
            .batch_execute(&schema.add_primary_key_sql())
            .await
            .map_err(|e| LoadError::Constraint {
                table: schema.table.clone(),
                column: schema.primary_key.to_string(),
                message: e.to_string(),
            })
    }
}
