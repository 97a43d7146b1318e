//! Topic resolution for column references within one SELECT

use crate::table::LogicalTable;

/// Qualifier to topic bindings introduced by a SELECT's FROM list.
///
/// Only consulted by the per-topic numeric policy. Subqueries build their
/// own scope; an empty scope means "any topic".
#[derive(Debug, Default)]
pub(crate) struct TopicScope {
    bindings: Vec<(String, String)>,
}

impl TopicScope {
    pub(crate) fn new(tables: &[LogicalTable<'_>]) -> Self {
        let bindings = tables
            .iter()
            .map(|table| {
                let qualifier = table.alias.map_or(table.name, |alias| alias.value.as_str());
                (qualifier.to_string(), table.name.to_string())
            })
            .collect();
        Self { bindings }
    }

    /// Every topic in scope, for unqualified references
    pub(crate) fn topics(&self) -> Vec<&str> {
        let mut topics: Vec<&str> = Vec::with_capacity(self.bindings.len());
        for (_, topic) in &self.bindings {
            if !topics.contains(&topic.as_str()) {
                topics.push(topic);
            }
        }
        topics
    }

    /// Topics bound to `qualifier`; empty when it names something else
    pub(crate) fn resolve(&self, qualifier: &str) -> Vec<&str> {
        self.bindings
            .iter()
            .filter(|(bound, _)| bound == qualifier)
            .map(|(_, topic)| topic.as_str())
            .collect()
    }
}
