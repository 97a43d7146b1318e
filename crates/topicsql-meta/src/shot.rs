//! One-shot pipeline: load metadata, expand stars, rewrite

use thiserror::Error;
use topicsql_rewrite::{rewrite_with_options, RewriteError, RewriteOptions};
use topicsql_schema::{NumericPolicy, SchemaNames};
use tracing::info;

use crate::star::expand_select_star;
use crate::{ConnectionConfig, MetadataError, MetadataSource, PgMetadata};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("load numeric fields failed: {0}")]
    NumericFields(#[source] MetadataError),

    #[error("load all fields failed: {0}")]
    AllFields(#[source] MetadataError),

    #[error("SQL parse/map failed: {0}")]
    Rewrite(#[from] RewriteError),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    pub numeric_policy: NumericPolicy,
    pub rewrite: RewriteOptions,
}

/// Rewrite `sql` with metadata sampled from the database behind `config`.
///
/// A short-lived pool is opened for the two metadata queries and closed
/// before returning.
pub async fn rewrite_with_metadata(
    config: &ConnectionConfig,
    names: &SchemaNames,
    sql: &str,
    options: &PipelineOptions,
) -> Result<String, PipelineError> {
    let source = PgMetadata::connect_lazy(config).map_err(PipelineError::NumericFields)?;
    let result = rewrite_with_source(&source, names, sql, options).await;
    source.close().await;
    result
}

pub async fn rewrite_with_source(
    source: &dyn MetadataSource,
    names: &SchemaNames,
    sql: &str,
    options: &PipelineOptions,
) -> Result<String, PipelineError> {
    let numeric = source
        .numeric_fields(&names.physical_table, &names.payload_column, &names.topic_column)
        .await
        .map_err(PipelineError::NumericFields)?;
    let all = source
        .all_fields(&names.physical_table, &names.payload_column, &names.topic_column)
        .await
        .map_err(PipelineError::AllFields)?;

    let expanded = expand_select_star(sql, &all);
    let ctx = names.clone().with_numeric(options.numeric_policy.build(numeric));
    let mapped = rewrite_with_options(&expanded, &ctx, &options.rewrite)?;

    info!(
        table = %names.physical_table,
        policy = ?options.numeric_policy,
        topics = all.len(),
        "query rewritten"
    );
    Ok(mapped)
}
