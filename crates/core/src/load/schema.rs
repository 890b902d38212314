//! Destination table schema and the row type written to it

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::clean::{ID_MUNICIPIO, NOME_MUNICIPIO};
use crate::enrich::NOME_REGIAO;
use crate::table::{Cell, Table, TableResult, cell_as_i64, cell_to_text};
use crate::transform::{ID_UF, NOME_UF, SIGLA_UF};

/// Default destination table name
pub const DEFAULT_TABLE_NAME: &str = "municipios_brasil";

/// The six loaded columns, in table order
pub const FINAL_COLUMNS: [&str; 6] = [
    ID_MUNICIPIO,
    NOME_MUNICIPIO,
    ID_UF,
    SIGLA_UF,
    NOME_UF,
    NOME_REGIAO,
];

/// PostgreSQL limit on bind parameters per statement
pub const MAX_BIND_PARAMS: usize = u16::MAX as usize;

/// SQL column types used by the destination table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    BigInt,
    Integer,
    Char(u16),
    Varchar(u16),
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlType::BigInt => write!(f, "BIGINT"),
            SqlType::Integer => write!(f, "INTEGER"),
            SqlType::Char(n) => write!(f, "CHAR({n})"),
            SqlType::Varchar(n) => write!(f, "VARCHAR({n})"),
        }
    }
}

/// One column of the destination table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub sql_type: SqlType,
}

/// Destination table definition and the statements derived from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub table: String,
    pub columns: Vec<ColumnDef>,
    pub primary_key: &'static str,
}

impl TableSchema {
    /// Schema of the municipalities table
    pub fn municipalities(table: impl Into<String>) -> Self {
        let column = |name, sql_type| ColumnDef { name, sql_type };
        Self {
            table: table.into(),
            columns: vec![
                column(ID_MUNICIPIO, SqlType::BigInt),
                column(NOME_MUNICIPIO, SqlType::Varchar(100)),
                column(ID_UF, SqlType::Integer),
                column(SIGLA_UF, SqlType::Char(2)),
                column(NOME_UF, SqlType::Varchar(50)),
                column(NOME_REGIAO, SqlType::Varchar(20)),
            ],
            primary_key: ID_MUNICIPIO,
        }
    }

    /// `DROP TABLE IF EXISTS`
    pub fn drop_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", quote_ident(&self.table))
    }

    /// `CREATE TABLE` without constraints
    pub fn create_sql(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| format!("    {} {}", quote_ident(c.name), c.sql_type))
            .collect::<Vec<_>>()
            .join(",\n");
        format!("CREATE TABLE {} (\n{columns}\n)", quote_ident(&self.table))
    }

    /// Multi-row `INSERT` with numbered placeholders for `rows` rows
    pub fn insert_sql(&self, rows: usize) -> String {
        let names = self
            .columns
            .iter()
            .map(|c| quote_ident(c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let width = self.columns.len();
        let values = (0..rows)
            .map(|row| {
                let params = (1..=width)
                    .map(|col| format!("${}", row * width + col))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("({params})")
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO {} ({names}) VALUES {values}",
            quote_ident(&self.table)
        )
    }

    /// `ALTER TABLE … ADD PRIMARY KEY`
    pub fn add_primary_key_sql(&self) -> String {
        format!(
            "ALTER TABLE {} ADD PRIMARY KEY ({})",
            quote_ident(&self.table),
            quote_ident(self.primary_key)
        )
    }

    /// Largest number of rows one `INSERT` can carry
    pub fn max_rows_per_insert(&self) -> usize {
        MAX_BIND_PARAMS / self.columns.len().max(1)
    }
}

/// Quote an SQL identifier
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Check a table name is a plain identifier (letters, digits, underscores, at most 63 bytes)
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && name.len() <= 63
}

/// One row of the destination table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MunicipalityRecord {
    pub id_municipio: Option<i64>,
    pub nome_municipio: Option<String>,
    pub id_uf: Option<i32>,
    pub sigla_uf: Option<String>,
    pub nome_uf: Option<String>,
    pub nome_regiao: Option<String>,
}

impl MunicipalityRecord {
    fn from_cells(cells: &[&Cell]) -> Self {
        Self {
            id_municipio: cell_as_i64(cells[0]),
            nome_municipio: text(cells[1]),
            id_uf: cell_as_i64(cells[2]).and_then(|v| i32::try_from(v).ok()),
            sigla_uf: text(cells[3]),
            nome_uf: text(cells[4]),
            nome_regiao: text(cells[5]),
        }
    }
}

fn text(cell: &Cell) -> Option<String> {
    match cell {
        Value::Null => None,
        other => Some(cell_to_text(other).into_owned()),
    }
}

/// Project a table onto the six destination columns, in order
pub fn select_final_columns(table: &Table) -> TableResult<Vec<MunicipalityRecord>> {
    let indices = FINAL_COLUMNS
        .iter()
        .map(|c| table.require_column(c))
        .collect::<TableResult<Vec<_>>>()?;

    Ok(table
        .rows()
        .iter()
        .map(|row| {
            let cells: Vec<&Cell> = indices.iter().map(|&i| &row[i]).collect();
            MunicipalityRecord::from_cells(&cells)
        })
        .collect())
}
