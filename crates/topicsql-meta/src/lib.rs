//! Field metadata over PostgreSQL and the one-shot rewrite pipeline

mod connection;
mod metadata;
mod shot;
mod star;

use thiserror::Error;

pub use connection::ConnectionConfig;
pub use metadata::{MetadataSource, PgMetadata, StaticMetadata};
pub use shot::{rewrite_with_metadata, rewrite_with_source, PipelineError, PipelineOptions};
pub use star::expand_select_star;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("connect failed: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("metadata query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),
}
