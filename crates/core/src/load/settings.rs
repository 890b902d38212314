//! Database connection settings read from the environment

use std::fmt;

use super::LoadError;

/// Environment variable holding the database user
pub const DB_USER: &str = "DB_USER";
/// Environment variable holding the database password
pub const DB_PASSWORD: &str = "DB_PASSWORD";
/// Environment variable holding the database host
pub const DB_HOST: &str = "DB_HOST";
/// Environment variable holding the database name
pub const DB_NAME: &str = "DB_NAME";
/// Optional environment variable holding the database port
pub const DB_PORT: &str = "DB_PORT";

/// Default PostgreSQL port
pub const DEFAULT_PORT: u16 = 5432;

/// Possibly incomplete connection settings
///
/// Missing values are kept as `None` so the load stage can report exactly which ones are
/// absent and skip itself instead of failing the run.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct DatabaseSettings {
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub database: Option<String>,
    pub port: Option<String>,
}

impl DatabaseSettings {
    /// Read settings from process environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through an arbitrary lookup function
    ///
    /// Empty or whitespace-only values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            user: get(DB_USER),
            password: get(DB_PASSWORD),
            host: get(DB_HOST),
            database: get(DB_NAME),
            port: get(DB_PORT),
        }
    }

    /// Names of the required variables that are unset
    pub fn missing(&self) -> Vec<String> {
        [
            (DB_USER, &self.user),
            (DB_PASSWORD, &self.password),
            (DB_HOST, &self.host),
            (DB_NAME, &self.database),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_none())
        .map(|(name, _)| name.to_string())
        .collect()
    }

    /// Resolve complete credentials, or report what is missing
    pub fn credentials(&self) -> Result<DatabaseCredentials, LoadError> {
        let missing = self.missing();
        let (Some(user), Some(password), Some(host), Some(database)) = (
            self.user.clone(),
            self.password.clone(),
            self.host.clone(),
            self.database.clone(),
        ) else {
            return Err(LoadError::MissingCredentials(missing));
        };

        let port = match &self.port {
            None => DEFAULT_PORT,
            Some(raw) => raw.trim().parse().map_err(|_| LoadError::InvalidSetting {
                name: DB_PORT.to_string(),
                value: raw.clone(),
            })?,
        };

        Ok(DatabaseCredentials {
            user,
            password,
            host,
            database,
            port,
        })
    }
}

impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("host", &self.host)
            .field("database", &self.database)
            .field("port", &self.port)
            .finish()
    }
}

/// Complete connection credentials
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseCredentials {
    pub user: String,
    pub password: String,
    pub host: String,
    pub database: String,
    pub port: u16,
}

impl DatabaseCredentials {
    /// Build a `tokio_postgres::Config` for these credentials
    pub fn to_postgres_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .user(&self.user)
            .password(&self.password)
            .host(&self.host)
            .port(self.port)
            .dbname(&self.database)
            .application_name("ibge-etl");
        config
    }
}

impl fmt::Debug for DatabaseCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseCredentials")
            .field("user", &self.user)
            .field("password", &"***")
            .field("host", &self.host)
            .field("database", &self.database)
            .field("port", &self.port)
            .finish()
    }
}
