use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::fmt;

use crate::MetadataError;

/// PostgreSQL connection parameters
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    /// libpq sslmode; TLS modes go through rustls
    pub sslmode: String,
}

impl ConnectionConfig {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        dbname: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            dbname: dbname.into(),
            user: user.into(),
            password: password.into(),
            sslmode: "disable".to_string(),
        }
    }

    pub fn with_sslmode(mut self, sslmode: impl Into<String>) -> Self {
        self.sslmode = sslmode.into();
        self
    }

    pub fn connect_options(&self) -> Result<PgConnectOptions, MetadataError> {
        let ssl_mode: PgSslMode = self.sslmode.parse().map_err(MetadataError::Connect)?;
        Ok(PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.dbname)
            .username(&self.user)
            .password(&self.password)
            .ssl_mode(ssl_mode))
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new("localhost", 5432, "postgres", "postgres", "")
    }
}

// password never leaves the process through logs
impl fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "host={} port={} user={} password=*** dbname={} sslmode={}",
            self.host, self.port, self.user, self.dbname, self.sslmode
        )
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"***")
            .field("sslmode", &self.sslmode)
            .finish()
    }
}
