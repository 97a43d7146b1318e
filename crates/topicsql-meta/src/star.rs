//! `SELECT *` expansion from field metadata

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;
use topicsql_schema::TopicFieldLists;
use tracing::{debug, warn};

static SELECT_STAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bSELECT\s+\*\s+FROM\s+([A-Za-z0-9_."]+)"#).expect("valid select-star regex")
});

/// A comma or JOIN after the table (and its optional alias) means more than one FROM target
static MORE_TARGETS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)^\s*(?:(?:AS\s+)?[A-Za-z0-9_"]+\s*)?(?:,|(?:(?:NATURAL|INNER|LEFT|RIGHT|FULL|CROSS|OUTER)\s+)*JOIN\b)"#,
    )
    .expect("valid join regex")
});

/// Replace every `SELECT * FROM <topic>` with the topic's field list.
///
/// Fields become plain column references so the rewriter gives them the
/// usual extraction and cast. A table without metadata keeps its `*`, as
/// does a FROM list naming more than one table. Text inside string
/// literals and comments is never touched.
pub fn expand_select_star(sql: &str, all_fields: &TopicFieldLists) -> String {
    let skipped = literal_and_comment_spans(sql);
    let mut expanded = String::with_capacity(sql.len());
    let mut copied = 0;

    for caps in SELECT_STAR.captures_iter(sql) {
        let (Some(whole), Some(table)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if skipped.iter().any(|span| span.contains(&whole.start())) {
            continue;
        }
        if MORE_TARGETS.is_match(&sql[whole.end()..]) {
            debug!(table = table.as_str(), "select star over several tables, leaving it");
            continue;
        }

        let topic = topic_name(table.as_str());
        let Some(fields) = all_fields.get(topic).filter(|fields| !fields.is_empty()) else {
            warn!(topic, "no field metadata for topic, leaving select star");
            continue;
        };
        debug!(topic, fields = fields.len(), "expanding select star");
        let columns: Vec<String> = fields.iter().map(|f| column_ref(f)).collect();

        expanded.push_str(&sql[copied..whole.start()]);
        expanded.push_str(&format!("SELECT {} FROM {}", columns.join(", "), table.as_str()));
        copied = whole.end();
    }

    expanded.push_str(&sql[copied..]);
    expanded
}

/// Byte ranges of `'...'` literals, `-- ...` line comments and `/* ... */` blocks
fn literal_and_comment_spans(sql: &str) -> Vec<Range<usize>> {
    let bytes = sql.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let start = i;
        match (bytes[i], bytes.get(i + 1)) {
            (b'\'', _) => {
                i += 1;
                while i < bytes.len() {
                    if bytes[i] == b'\'' {
                        if bytes.get(i + 1) == Some(&b'\'') {
                            i += 2;
                            continue;
                        }
                        break;
                    }
                    i += 1;
                }
            }
            (b'-', Some(b'-')) => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            (b'/', Some(b'*')) => {
                i += 2;
                while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                    i += 1;
                }
                i += 1;
            }
            _ => {
                i += 1;
                continue;
            }
        }
        i = (i + 1).min(bytes.len());
        spans.push(start..i);
    }
    spans
}

fn topic_name(table: &str) -> &str {
    let last = table.rsplit('.').next().unwrap_or(table);
    last.trim_matches('"')
}

fn column_ref(field: &str) -> String {
    let mut chars = field.chars();
    let simple = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        field.to_string()
    } else {
        format!("\"{}\"", field.replace('"', "\"\""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> TopicFieldLists {
        TopicFieldLists::from([
            (
                "pump_alarm".to_string(),
                vec!["code".to_string(), "threshold".to_string()],
            ),
            (
                "door_event".to_string(),
                vec!["door id".to_string(), "state".to_string()],
            ),
        ])
    }

    #[test]
    fn test_expands_known_topic() {
        assert_eq!(
            expand_select_star("select *  from pump_alarm WHERE code = 'E1'", &fields()),
            "SELECT code, threshold FROM pump_alarm WHERE code = 'E1'"
        );
    }

    #[test]
    fn test_each_match_uses_its_own_table() {
        assert_eq!(
            expand_select_star(
                "SELECT * FROM pump_alarm UNION ALL SELECT * FROM door_event",
                &fields()
            ),
            "SELECT code, threshold FROM pump_alarm UNION ALL SELECT \"door id\", state FROM door_event"
        );
    }

    #[test]
    fn test_unknown_topic_is_untouched() {
        let sql = "SELECT * FROM unknown_topic";
        assert_eq!(expand_select_star(sql, &fields()), sql);
    }

    #[test]
    fn test_qualified_star_is_untouched() {
        let sql = "SELECT p.* FROM pump_alarm p";
        assert_eq!(expand_select_star(sql, &fields()), sql);
    }

    #[test]
    fn test_several_from_targets_are_untouched() {
        for sql in [
            "SELECT * FROM pump_alarm, door_event",
            "SELECT * FROM pump_alarm p JOIN door_event d ON p.id = d.id",
            "SELECT * FROM pump_alarm LEFT OUTER JOIN door_event USING (id)",
        ] {
            assert_eq!(expand_select_star(sql, &fields()), sql);
        }
    }

    #[test]
    fn test_alias_and_where_still_expand() {
        assert_eq!(
            expand_select_star("SELECT * FROM pump_alarm p WHERE p.code IN ('a', 'b')", &fields()),
            "SELECT code, threshold FROM pump_alarm p WHERE p.code IN ('a', 'b')"
        );
    }

    #[test]
    fn test_literals_and_comments_are_untouched() {
        let sql = "SELECT code FROM pump_alarm WHERE note = 'SELECT * FROM pump_alarm' \
                   -- SELECT * FROM door_event\n\
                   /* SELECT * FROM pump_alarm */";
        assert_eq!(expand_select_star(sql, &fields()), sql);

        assert_eq!(
            expand_select_star("SELECT * FROM door_event WHERE state = 'it''s'", &fields()),
            "SELECT \"door id\", state FROM door_event WHERE state = 'it''s'"
        );
    }

    #[test]
    fn test_schema_qualified_table() {
        assert_eq!(
            expand_select_star("SELECT * FROM public.pump_alarm", &fields()),
            "SELECT code, threshold FROM public.pump_alarm"
        );
    }
}
