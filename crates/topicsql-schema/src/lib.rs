//! topicsql schema context
//!
//! Describes the physical layout logical queries are rewritten onto: one shared
//! table, the `jsonb` payload column holding every record's fields, the key
//! inside the payload that names the record's topic, and which payload fields
//! are numeric.

use serde::{Deserialize, Serialize};

mod types;
pub use types::*;

pub const DEFAULT_PHYSICAL_TABLE: &str = "tsdb_table";
pub const DEFAULT_PAYLOAD_COLUMN: &str = "payload";
pub const DEFAULT_TOPIC_COLUMN: &str = "topic";

/// Names of the physical table and the payload keys, without field metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaNames {
    pub physical_table: String,
    pub payload_column: String,
    pub topic_column: String,
}

impl SchemaNames {
    pub fn new(
        physical_table: impl Into<String>,
        payload_column: impl Into<String>,
        topic_column: impl Into<String>,
    ) -> Self {
        Self {
            physical_table: physical_table.into(),
            payload_column: payload_column.into(),
            topic_column: topic_column.into(),
        }
    }

    /// Attach numeric field metadata, producing the context a rewrite runs with
    pub fn with_numeric(self, numeric_fields: NumericFields) -> SchemaContext {
        SchemaContext {
            physical_table: self.physical_table,
            payload_column: self.payload_column,
            topic_column: self.topic_column,
            numeric_fields,
        }
    }
}

impl Default for SchemaNames {
    fn default() -> Self {
        Self::new(
            DEFAULT_PHYSICAL_TABLE,
            DEFAULT_PAYLOAD_COLUMN,
            DEFAULT_TOPIC_COLUMN,
        )
    }
}

/// Everything a single rewrite needs to know about the physical schema.
///
/// Immutable for the duration of a rewrite. The physical table itself is
/// never substituted and never receives a topic predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaContext {
    pub physical_table: String,
    pub payload_column: String,
    pub topic_column: String,
    #[serde(default)]
    pub numeric_fields: NumericFields,
}

impl SchemaContext {
    pub fn new(
        physical_table: impl Into<String>,
        payload_column: impl Into<String>,
        topic_column: impl Into<String>,
        numeric_fields: NumericFields,
    ) -> Self {
        SchemaNames::new(physical_table, payload_column, topic_column).with_numeric(numeric_fields)
    }

    /// Context over `tsdb_table` / `payload` / `topic`
    pub fn with_defaults(numeric_fields: NumericFields) -> Self {
        SchemaNames::default().with_numeric(numeric_fields)
    }

    pub fn is_physical_table(&self, table: &str) -> bool {
        table == self.physical_table
    }

    /// Whether `field` should be cast when read by a query scoped to `topics`
    pub fn is_numeric(&self, field: &str, topics: &[&str]) -> bool {
        self.numeric_fields.is_numeric(field, topics)
    }

    pub fn names(&self) -> SchemaNames {
        SchemaNames::new(
            self.physical_table.clone(),
            self.payload_column.clone(),
            self.topic_column.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_names() {
        let ctx = SchemaContext::with_defaults(NumericFields::default());
        assert_eq!(ctx.physical_table, "tsdb_table");
        assert_eq!(ctx.payload_column, "payload");
        assert_eq!(ctx.topic_column, "topic");
        assert!(ctx.is_physical_table("tsdb_table"));
        assert!(!ctx.is_physical_table("factory_alarm_pump_alarm"));
    }

    #[test]
    fn test_context_from_json() {
        let json = r#"{
            "physical_table": "events",
            "payload_column": "body",
            "topic_column": "kind",
            "numeric_fields": { "policy": "flat", "fields": ["threshold"] }
        }"#;

        let ctx: SchemaContext = serde_json::from_str(json).unwrap();
        assert_eq!(ctx.names(), SchemaNames::new("events", "body", "kind"));
        assert!(ctx.is_numeric("threshold", &[]));
        assert!(!ctx.is_numeric("code", &[]));
    }

    #[test]
    fn test_numeric_fields_default_when_missing() {
        let json = r#"{"physical_table": "t", "payload_column": "p", "topic_column": "k"}"#;
        let ctx: SchemaContext = serde_json::from_str(json).unwrap();
        assert_eq!(ctx.numeric_fields, NumericFields::default());
    }
}
