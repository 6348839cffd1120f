//! Database connection settings and connection setup

use lobby_common::LobbyError;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::time::Duration;

use crate::error::{LoadError, LoadResult};

/// Default PostgreSQL port.
pub const DEFAULT_PG_PORT: u16 = 5432;

/// Default connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Where the connection parameters came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbTarget {
    /// A full `postgresql://` URL
    Url(String),
    /// Individual components, as libpq's `PG*` variables describe them
    Components {
        host: String,
        port: u16,
        database: String,
        user: String,
        password: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub target: DbTarget,
    pub connect_timeout_secs: u64,
}

impl DbConfig {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            target: DbTarget::Url(url.into()),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }

    /// Read connection settings from the environment
    ///
    /// `DATABASE_URL` wins when set. Otherwise `PGDATABASE` is required and
    /// `PGHOST` (default `localhost`), `PGPORT` (default 5432), `PGUSER`
    /// (default `postgres`) and `PGPASSWORD` are optional.
    /// `DB_CONNECT_TIMEOUT` sets the timeout in seconds.
    pub fn from_env() -> Result<Self, LobbyError> {
        let connect_timeout_secs = match std::env::var("DB_CONNECT_TIMEOUT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| LobbyError::invalid_value("DB_CONNECT_TIMEOUT", raw))?,
            Err(_) => DEFAULT_CONNECT_TIMEOUT_SECS,
        };

        if let Ok(url) = std::env::var("DATABASE_URL") {
            if url.trim().is_empty() {
                return Err(LobbyError::config("DATABASE_URL is set but empty"));
            }
            return Ok(Self {
                target: DbTarget::Url(url),
                connect_timeout_secs,
            });
        }

        let database = std::env::var("PGDATABASE")
            .map_err(|_| LobbyError::config("neither DATABASE_URL nor PGDATABASE is set"))?;
        let port = match std::env::var("PGPORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| LobbyError::invalid_value("PGPORT", raw))?,
            Err(_) => DEFAULT_PG_PORT,
        };

        Ok(Self {
            target: DbTarget::Components {
                host: std::env::var("PGHOST").unwrap_or_else(|_| "localhost".to_string()),
                port,
                database,
                user: std::env::var("PGUSER").unwrap_or_else(|_| "postgres".to_string()),
                password: std::env::var("PGPASSWORD").ok(),
            },
            connect_timeout_secs,
        })
    }

    fn connect_options(&self) -> LoadResult<PgConnectOptions> {
        match &self.target {
            DbTarget::Url(url) => url.parse().map_err(LoadError::Connection),
            DbTarget::Components {
                host,
                port,
                database,
                user,
                password,
            } => {
                let options = PgConnectOptions::new()
                    .host(host)
                    .port(*port)
                    .database(database)
                    .username(user);
                Ok(match password {
                    Some(password) => options.password(password),
                    None => options,
                })
            },
        }
    }
}

/// Open the single connection a load runs on
///
/// The pool is capped at one connection: a load is strictly sequential and
/// the transaction it holds must see every insert. Callers close the pool
/// when the load returns, on success or failure.
pub async fn connect(config: &DbConfig) -> LoadResult<PgPool> {
    let options = config.connect_options()?;

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect_with(options)
        .await
        .map_err(LoadError::Connection)?;

    tracing::info!(
        connect_timeout_secs = config.connect_timeout_secs,
        "Database connection established"
    );

    Ok(pool)
}
