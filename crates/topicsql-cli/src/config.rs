//! Configuration system for the topicsql CLI
//!
//! Loads configuration from:
//! 1. config.yaml - database location, schema layout, rewrite options, logging
//! 2. .env file - secrets (database password)
//!
//! Environment variables always override config.yaml values. A missing
//! config.yaml is not an error; defaults are used instead.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use topicsql_meta::ConnectionConfig;
use topicsql_rewrite::RewriteOptions;
use topicsql_schema::{
    NumericPolicy, SchemaNames, DEFAULT_PAYLOAD_COLUMN, DEFAULT_PHYSICAL_TABLE,
    DEFAULT_TOPIC_COLUMN,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
}

/// Database configuration; the password comes from the environment only
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub sslmode: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "postgres".to_string(),
            user: "postgres".to_string(),
            sslmode: "disable".to_string(),
        }
    }
}

/// Physical layout queries are rewritten onto
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    pub physical_table: String,
    pub payload_column: String,
    pub topic_column: String,

    /// Numeric metadata scoping: flat or per_topic
    pub numeric_policy: NumericPolicy,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            physical_table: DEFAULT_PHYSICAL_TABLE.to_string(),
            payload_column: DEFAULT_PAYLOAD_COLUMN.to_string(),
            topic_column: DEFAULT_TOPIC_COLUMN.to_string(),
            numeric_policy: NumericPolicy::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or module-specific
    pub level: String,

    /// Output format: pretty, json, compact
    pub format: String,

    /// Output destination: stderr, file, both
    pub output: String,

    /// Directory for log files
    pub directory: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "compact".to_string(),
            output: "stderr".to_string(),
            directory: "./logs".to_string(),
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub schema: SchemaConfig,
    pub rewrite: RewriteOptions,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from YAML file with environment variable overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            serde_yaml::from_str(&contents)?
        } else {
            Config::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("TOPICSQL_DB_HOST") {
            self.database.host = host;
        }
        if let Ok(port) = std::env::var("TOPICSQL_DB_PORT") {
            if let Ok(port_num) = port.parse() {
                self.database.port = port_num;
            }
        }
        if let Ok(dbname) = std::env::var("TOPICSQL_DB_NAME") {
            self.database.dbname = dbname;
        }
        if let Ok(user) = std::env::var("TOPICSQL_DB_USER") {
            self.database.user = user;
        }

        if let Ok(table) = std::env::var("TOPICSQL_PHYSICAL_TABLE") {
            self.schema.physical_table = table;
        }
        if let Ok(column) = std::env::var("TOPICSQL_PAYLOAD_COLUMN") {
            self.schema.payload_column = column;
        }
        if let Ok(column) = std::env::var("TOPICSQL_TOPIC_COLUMN") {
            self.schema.topic_column = column;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(output) = std::env::var("LOG_OUTPUT") {
            self.logging.output = output;
        }
        if let Ok(dir) = std::env::var("LOG_DIR") {
            self.logging.directory = dir;
        }
    }

    /// Get the database password from environment (must be in .env)
    pub fn db_password() -> Result<String, ConfigError> {
        std::env::var("TOPICSQL_DB_PASSWORD")
            .map_err(|_| ConfigError::MissingEnvVar("TOPICSQL_DB_PASSWORD".to_string()))
    }

    pub fn connection(&self, password: String) -> ConnectionConfig {
        let db = &self.database;
        ConnectionConfig::new(&db.host, db.port, &db.dbname, &db.user, password)
            .with_sslmode(&db.sslmode)
    }

    pub fn schema_names(&self) -> SchemaNames {
        SchemaNames::new(
            &self.schema.physical_table,
            &self.schema.payload_column,
            &self.schema.topic_column,
        )
    }

    /// Set logging environment variables for the logging module
    pub fn apply_logging_env(&self) {
        std::env::set_var("RUST_LOG", &self.logging.level);
        std::env::set_var("LOG_FORMAT", &self.logging.format);
        std::env::set_var("LOG_OUTPUT", &self.logging.output);
        std::env::set_var("LOG_DIR", &self.logging.directory);
    }
}
