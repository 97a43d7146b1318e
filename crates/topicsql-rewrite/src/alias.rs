//! Output names surfaced by one SELECT list

use sqlparser::ast::Expr;
use std::collections::{HashMap, HashSet};

/// Names a SELECT list surfaces, for reuse in GROUP BY, HAVING and ORDER BY.
///
/// Matching is textual: a bare column matches by name, a bare call matches
/// by its source text (`COUNT(*)`) or, failing that, by its function name.
#[derive(Debug, Default)]
pub(crate) struct AliasMap {
    names: HashSet<String>,
    calls: HashMap<String, String>,
}

impl AliasMap {
    pub(crate) fn insert(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    /// Record that the call `call_text` is surfaced as `alias`
    pub(crate) fn insert_call(&mut self, call_text: impl Into<String>, alias: impl Into<String>) {
        let alias = alias.into();
        self.calls.entry(call_text.into()).or_insert_with(|| alias.clone());
        self.names.insert(alias);
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// The surfaced name to render instead of mapping `expr`, if any
    pub(crate) fn short_circuit(&self, expr: &Expr) -> Option<String> {
        match expr {
            Expr::Identifier(ident) if self.contains(&ident.value) => Some(ident.to_string()),
            Expr::Function(function) => {
                if let Some(alias) = self.calls.get(&function.to_string()) {
                    return Some(alias.clone());
                }
                let name = function.name.to_string();
                self.contains(&name).then_some(name)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlparser::dialect::GenericDialect;
    use sqlparser::parser::Parser;

    fn expr(sql: &str) -> Expr {
        Parser::new(&GenericDialect {})
            .try_with_sql(sql)
            .unwrap()
            .parse_expr()
            .unwrap()
    }

    #[test]
    fn test_column_match() {
        let mut aliases = AliasMap::default();
        aliases.insert("code");

        assert_eq!(aliases.short_circuit(&expr("code")), Some("code".to_string()));
        assert_eq!(aliases.short_circuit(&expr("other")), None);
        assert_eq!(aliases.short_circuit(&expr("a.code")), None);
    }

    #[test]
    fn test_call_match() {
        let mut aliases = AliasMap::default();
        aliases.insert_call("COUNT(*)", "alarm_count");
        aliases.insert_call("MAX(value)", "MAX");

        assert_eq!(
            aliases.short_circuit(&expr("COUNT(*)")),
            Some("alarm_count".to_string())
        );
        assert_eq!(aliases.short_circuit(&expr("alarm_count")), Some("alarm_count".to_string()));
        assert_eq!(aliases.short_circuit(&expr("MAX(other)")), Some("MAX".to_string()));
        assert_eq!(aliases.short_circuit(&expr("SUM(value)")), None);
        assert_eq!(aliases.short_circuit(&expr("COUNT(*) > 0")), None);
    }
}
