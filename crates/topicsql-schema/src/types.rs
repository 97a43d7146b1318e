//! Field metadata types

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Numeric field names reported per topic
pub type TopicFieldSets = BTreeMap<String, BTreeSet<String>>;

/// All field names per topic, in metadata order, topic key excluded
pub type TopicFieldLists = BTreeMap<String, Vec<String>>;

/// How numeric field metadata is scoped at rewrite time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericPolicy {
    /// One global set: a field numeric in any topic is cast everywhere
    #[default]
    Flat,
    /// A field is cast only for topics that report it numeric
    PerTopic,
}

impl NumericPolicy {
    pub fn build(self, per_topic: TopicFieldSets) -> NumericFields {
        match self {
            NumericPolicy::Flat => NumericFields::flatten(&per_topic),
            NumericPolicy::PerTopic => NumericFields::PerTopic(per_topic),
        }
    }
}

/// Fields eligible for the `::FLOAT` cast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", content = "fields", rename_all = "snake_case")]
pub enum NumericFields {
    Flat(BTreeSet<String>),
    PerTopic(TopicFieldSets),
}

impl Default for NumericFields {
    fn default() -> Self {
        NumericFields::Flat(BTreeSet::new())
    }
}

impl NumericFields {
    pub fn flat<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        NumericFields::Flat(fields.into_iter().map(Into::into).collect())
    }

    /// Union every topic's numeric fields into one set
    pub fn flatten(per_topic: &TopicFieldSets) -> Self {
        NumericFields::Flat(per_topic.values().flatten().cloned().collect())
    }

    pub fn policy(&self) -> NumericPolicy {
        match self {
            NumericFields::Flat(_) => NumericPolicy::Flat,
            NumericFields::PerTopic(_) => NumericPolicy::PerTopic,
        }
    }

    /// Check a field against the topics a reference may resolve to.
    ///
    /// An empty `topics` slice means the reference could not be tied to any
    /// topic; the per-topic policy then falls back to any topic's metadata.
    pub fn is_numeric(&self, field: &str, topics: &[&str]) -> bool {
        match self {
            NumericFields::Flat(fields) => fields.contains(field),
            NumericFields::PerTopic(map) if topics.is_empty() => {
                map.values().any(|fields| fields.contains(field))
            }
            NumericFields::PerTopic(map) => topics
                .iter()
                .filter_map(|topic| map.get(*topic))
                .any(|fields| fields.contains(field)),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            NumericFields::Flat(fields) => fields.is_empty(),
            NumericFields::PerTopic(map) => map.values().all(BTreeSet::is_empty),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TopicFieldSets {
        TopicFieldSets::from([
            (
                "pump_alarm".to_string(),
                BTreeSet::from(["threshold".to_string(), "value".to_string()]),
            ),
            (
                "door_event".to_string(),
                BTreeSet::from(["duration".to_string()]),
            ),
        ])
    }

    #[test]
    fn test_flatten_unions_topics() {
        let fields = NumericFields::flatten(&sample());
        assert_eq!(fields, NumericFields::flat(["duration", "threshold", "value"]));
        assert!(fields.is_numeric("duration", &["pump_alarm"]));
    }

    #[test]
    fn test_per_topic_scoping() {
        let fields = NumericPolicy::PerTopic.build(sample());
        assert!(fields.is_numeric("threshold", &["pump_alarm"]));
        assert!(!fields.is_numeric("threshold", &["door_event"]));
        assert!(fields.is_numeric("threshold", &["door_event", "pump_alarm"]));
        assert!(!fields.is_numeric("threshold", &["unknown_topic"]));
    }

    #[test]
    fn test_per_topic_without_scope_checks_all() {
        let fields = NumericPolicy::PerTopic.build(sample());
        assert!(fields.is_numeric("duration", &[]));
        assert!(!fields.is_numeric("code", &[]));
    }

    #[test]
    fn test_policy_and_empty() {
        assert_eq!(NumericFields::default().policy(), NumericPolicy::Flat);
        assert!(NumericFields::default().is_empty());
        assert!(NumericFields::PerTopic(TopicFieldSets::new()).is_empty());
        assert!(!NumericPolicy::PerTopic.build(sample()).is_empty());
    }
}
