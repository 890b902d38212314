//! Shared helpers for pipeline integration tests

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use ibge_etl_core::load::{
    Connector, DatabaseCredentials, DatabaseSettings, LoadError, LoadTarget, MunicipalityRecord,
    TableSchema,
};

/// Serve `body` with `status` to every request on a local port, returning the URL
pub async fn serve(status: u16, body: impl Into<String>) -> String {
    let body = body.into();
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().expect("No local address");

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let mut request = vec![0u8; 8192];
            let _ = socket.read(&mut request).await;

            let response = format!(
                "HTTP/1.1 {status} Test\r\n\
                 Content-Type: application/json; charset=utf-8\r\n\
                 Content-Length: {}\r\n\
                 Connection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    format!("http://{addr}/api/v1/localidades/municipios")
}

/// One API record with the full nested hierarchy
pub fn municipality(id: Value, nome: &str, uf_id: i64, sigla: &str, uf_nome: &str) -> Value {
    json!({
        "id": id,
        "nome": nome,
        "microrregiao": {
            "id": 100,
            "nome": "Micro",
            "mesorregiao": {
                "id": 10,
                "nome": "Meso",
                "UF": {
                    "id": uf_id,
                    "sigla": sigla,
                    "nome": uf_nome,
                    "regiao": {"id": 2, "sigla": "NE", "nome": "Nordeste"}
                }
            }
        },
        "regiao-imediata": {"id": 200, "nome": "Imediata"}
    })
}

/// Write a reference file into `dir`
pub fn write_reference(dir: &Path, rows: &[(i64, &str)]) -> PathBuf {
    let path = dir.join("regioes_enriquecimento.csv");
    let mut text = String::from("codigo_uf,nome_regiao\n");
    for (code, region) in rows {
        text.push_str(&format!("{code},{region}\n"));
    }
    std::fs::write(&path, text).expect("Failed to write reference file");
    path
}

/// Complete credentials for the in-memory database
pub fn credentials() -> DatabaseSettings {
    DatabaseSettings {
        user: Some("etl".into()),
        password: Some("secret".into()),
        host: Some("db.test".into()),
        database: Some("ibge".into()),
        port: None,
    }
}

/// A table stored by [`MemoryDatabase`]
#[derive(Debug, Default, Clone)]
pub struct StoredTable {
    pub create_sql: String,
    pub rows: Vec<MunicipalityRecord>,
    pub primary_key: Option<String>,
}

/// In-memory destination that enforces primary-key uniqueness
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    pub tables: BTreeMap<String, StoredTable>,
}

/// Connector counting its connection attempts
#[derive(Default, Clone)]
pub struct MemoryConnector {
    pub connects: Arc<AtomicUsize>,
    pub database: Arc<Mutex<MemoryDatabase>>,
}

impl MemoryConnector {
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn table(&self, name: &str) -> Option<StoredTable> {
        self.database.lock().unwrap().tables.get(name).cloned()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    type Target = MemoryTarget;

    async fn connect(&self, _credentials: &DatabaseCredentials) -> Result<MemoryTarget, LoadError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryTarget {
            database: Arc::clone(&self.database),
        })
    }
}

pub struct MemoryTarget {
    database: Arc<Mutex<MemoryDatabase>>,
}

#[async_trait]
impl LoadTarget for MemoryTarget {
    async fn replace_table(&mut self, schema: &TableSchema) -> Result<(), LoadError> {
        let mut db = self.database.lock().unwrap();
        db.tables.insert(
            schema.table.clone(),
            StoredTable {
                create_sql: schema.create_sql(),
                ..Default::default()
            },
        );
        Ok(())
    }

    async fn insert_rows(
        &mut self,
        schema: &TableSchema,
        rows: &[MunicipalityRecord],
    ) -> Result<u64, LoadError> {
        let mut db = self.database.lock().unwrap();
        let table = db
            .tables
            .get_mut(&schema.table)
            .ok_or_else(|| LoadError::Insert {
                table: schema.table.clone(),
                inserted: 0,
                message: "relation does not exist".into(),
            })?;
        table.rows.extend_from_slice(rows);
        Ok(rows.len() as u64)
    }

    async fn add_primary_key(&mut self, schema: &TableSchema) -> Result<(), LoadError> {
        let mut db = self.database.lock().unwrap();
        let Some(table) = db.tables.get_mut(&schema.table) else {
            return Err(LoadError::Constraint {
                table: schema.table.clone(),
                column: schema.primary_key.to_string(),
                message: "relation does not exist".into(),
            });
        };

        let mut seen = HashSet::new();
        for row in &table.rows {
            let Some(id) = row.id_municipio else {
                return Err(LoadError::Constraint {
                    table: schema.table.clone(),
                    column: schema.primary_key.to_string(),
                    message: "column contains null values".into(),
                });
            };
            if !seen.insert(id) {
                return Err(LoadError::Constraint {
                    table: schema.table.clone(),
                    column: schema.primary_key.to_string(),
                    message: format!("could not create unique index: key ({id}) is duplicated"),
                });
            }
        }

        table.primary_key = Some(schema.primary_key.to_string());
        Ok(())
    }
}
