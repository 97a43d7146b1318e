//! Per-topic field metadata sources

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::time::Duration;
use topicsql_schema::{TopicFieldLists, TopicFieldSets};
use tracing::{debug, info};

use crate::{ConnectionConfig, MetadataError};

/// Reports which payload fields each topic carries.
///
/// `table` is the physical table, `payload` its `jsonb` column and
/// `topic_key` the payload key naming a record's topic. The topic key itself
/// never appears in the results.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Fields holding a JSON number, per topic
    async fn numeric_fields(
        &self,
        table: &str,
        payload: &str,
        topic_key: &str,
    ) -> Result<TopicFieldSets, MetadataError>;

    /// Every field, per topic, ordered by key
    async fn all_fields(
        &self,
        table: &str,
        payload: &str,
        topic_key: &str,
    ) -> Result<TopicFieldLists, MetadataError>;
}

/// Metadata sampled from the physical table itself.
///
/// One record per topic is inspected (`DISTINCT ON` the topic key), so a
/// field's type is whatever that sample holds.
pub struct PgMetadata {
    pool: PgPool,
}

impl PgMetadata {
    /// Build a pool that connects on first use
    pub fn connect_lazy(config: &ConnectionConfig) -> Result<Self, MetadataError> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(10))
            .connect_lazy_with(config.connect_options()?);
        debug!(connection = %config, "metadata pool created");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    async fn fetch_pairs(
        &self,
        table: &str,
        payload: &str,
        topic_key: &str,
        numeric_only: bool,
    ) -> Result<Vec<(String, String)>, MetadataError> {
        let sql = field_query(table, payload, numeric_only)?;
        let rows = sqlx::query(&sql)
            .bind(topic_key)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<(String, String), MetadataError> {
                Ok((row.try_get(0)?, row.try_get(1)?))
            })
            .collect()
    }
}

#[async_trait]
impl MetadataSource for PgMetadata {
    async fn numeric_fields(
        &self,
        table: &str,
        payload: &str,
        topic_key: &str,
    ) -> Result<TopicFieldSets, MetadataError> {
        let mut fields = TopicFieldSets::new();
        for (topic, field) in self.fetch_pairs(table, payload, topic_key, true).await? {
            fields.entry(topic).or_default().insert(field);
        }
        info!(
            topics = fields.len(),
            fields = fields.values().map(|set| set.len()).sum::<usize>(),
            "numeric field metadata loaded"
        );
        Ok(fields)
    }

    async fn all_fields(
        &self,
        table: &str,
        payload: &str,
        topic_key: &str,
    ) -> Result<TopicFieldLists, MetadataError> {
        let mut fields = TopicFieldLists::new();
        for (topic, field) in self.fetch_pairs(table, payload, topic_key, false).await? {
            fields.entry(topic).or_default().push(field);
        }
        info!(
            topics = fields.len(),
            fields = fields.values().map(Vec::len).sum::<usize>(),
            "field metadata loaded"
        );
        Ok(fields)
    }
}

/// Fixed metadata, for tests and offline use
#[derive(Debug, Clone, Default)]
pub struct StaticMetadata {
    numeric: TopicFieldSets,
    all: TopicFieldLists,
}

impl StaticMetadata {
    pub fn new(numeric: TopicFieldSets, all: TopicFieldLists) -> Self {
        Self { numeric, all }
    }

    /// Register a topic's fields; `numeric` must be a subset of `fields`
    pub fn with_topic(mut self, topic: &str, fields: &[&str], numeric: &[&str]) -> Self {
        self.all.insert(
            topic.to_string(),
            fields.iter().map(|field| field.to_string()).collect(),
        );
        self.numeric.insert(
            topic.to_string(),
            numeric.iter().map(|field| field.to_string()).collect(),
        );
        self
    }
}

#[async_trait]
impl MetadataSource for StaticMetadata {
    async fn numeric_fields(
        &self,
        _table: &str,
        _payload: &str,
        _topic_key: &str,
    ) -> Result<TopicFieldSets, MetadataError> {
        Ok(self.numeric.clone())
    }

    async fn all_fields(
        &self,
        _table: &str,
        _payload: &str,
        _topic_key: &str,
    ) -> Result<TopicFieldLists, MetadataError> {
        Ok(self.all.clone())
    }
}

/// Sampling query; the topic key is bound as `$1`
fn field_query(table: &str, payload: &str, numeric_only: bool) -> Result<String, MetadataError> {
    let table = quote_qualified(table)?;
    let payload = quote_ident(payload)?;
    let numeric_filter = if numeric_only {
        "AND jsonb_typeof(field.value) = 'number'"
    } else {
        ""
    };

    Ok(format!(
        "WITH topic_samples AS (
            SELECT DISTINCT ON ({payload} ->> $1::text)
                   {payload} ->> $1::text AS topic,
                   {payload} AS data
            FROM {table}
            WHERE {payload} IS NOT NULL
              AND jsonb_typeof({payload}) = 'object'
              AND {payload} != '{{}}'::jsonb
              AND {payload} ? $1::text
            ORDER BY {payload} ->> $1::text
        )
        SELECT ts.topic, field.key
        FROM topic_samples ts,
        LATERAL jsonb_each(ts.data) AS field(key, value)
        WHERE field.key != $1::text
          {numeric_filter}
        ORDER BY ts.topic, field.key"
    ))
}

fn quote_ident(ident: &str) -> Result<String, MetadataError> {
    if ident.is_empty() || ident.contains(['"', '\0']) {
        return Err(MetadataError::InvalidIdentifier(ident.to_string()));
    }
    Ok(format!("\"{ident}\""))
}

/// `schema.table` quoted part by part
fn quote_qualified(name: &str) -> Result<String, MetadataError> {
    let parts = name
        .split('.')
        .map(quote_ident)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| MetadataError::InvalidIdentifier(name.to_string()))?;
    Ok(parts.join("."))
}
