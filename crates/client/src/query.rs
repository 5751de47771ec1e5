//! ICAT query builder.
//!
//! Renders the JPQL-flavoured search syntax understood by icat.server:
//!
//! ```text
//! SELECT COUNT(o) FROM Datafile o JOIN o.dataset AS s1 WHERE s1.id = 42
//! ```
//!
//! Conditions and ordering address attributes by path relative to the
//! selected entity (`"name"`, `"dataset.id"`, `"dataset.investigation.name"`).
//! Every relation step in a path becomes a `JOIN` with a generated alias.

use std::fmt;

/// Alias of the selected entity in rendered queries.
const ROOT: &str = "o";

/// Aggregate function applied to the selected expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count => write!(f, "COUNT"),
            Self::Sum => write!(f, "SUM"),
            Self::Min => write!(f, "MIN"),
            Self::Max => write!(f, "MAX"),
            Self::Avg => write!(f, "AVG"),
        }
    }
}

/// Comparison operator of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq => write!(f, "="),
            Self::Ne => write!(f, "<>"),
            Self::Lt => write!(f, "<"),
            Self::Le => write!(f, "<="),
            Self::Gt => write!(f, ">"),
            Self::Ge => write!(f, ">="),
        }
    }
}

/// Right-hand side of a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Str(String),
    Bool(bool),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Self::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
        }
    }
}

impl From<i64> for Literal {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Condition {
    path: String,
    op: Op,
    value: Literal,
}

/// A search query against one entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    entity: String,
    attribute: Option<String>,
    aggregate: Option<Aggregate>,
    conditions: Vec<Condition>,
    order: Vec<String>,
    limit: Option<(usize, usize)>,
}

impl Query {
    /// Select whole objects of `entity`.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            attribute: None,
            aggregate: None,
            conditions: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Select a single attribute path instead of whole objects.
    pub fn attribute(mut self, path: impl Into<String>) -> Self {
        self.attribute = Some(path.into());
        self
    }

    pub fn aggregate(mut self, aggregate: Aggregate) -> Self {
        self.aggregate = Some(aggregate);
        self
    }

    /// Add an equality condition. Conditions are combined with `AND`.
    pub fn where_eq(self, path: impl Into<String>, value: impl Into<Literal>) -> Self {
        self.where_cmp(path, Op::Eq, value)
    }

    pub fn where_cmp(mut self, path: impl Into<String>, op: Op, value: impl Into<Literal>) -> Self {
        self.conditions.push(Condition { path: path.into(), op, value: value.into() });
        self
    }

    pub fn order_by(mut self, path: impl Into<String>) -> Self {
        self.order.push(path.into());
        self
    }

    pub fn has_order(&self) -> bool {
        !self.order.is_empty()
    }

    /// Restrict the result window to `count` items starting at `offset`.
    pub fn limit(mut self, offset: usize, count: usize) -> Self {
        self.limit = Some((offset, count));
        self
    }

    /// Render the query string sent to the server.
    pub fn render(&self) -> String {
        let mut joins = Joins::default();

        let mut selected = match &self.attribute {
            Some(path) => joins.resolve(path),
            None => ROOT.to_string(),
        };
        if let Some(agg) = self.aggregate {
            selected = format!("{agg}({selected})");
        }

        let conditions: Vec<String> = self
            .conditions
            .iter()
            .map(|c| format!("{} {} {}", joins.resolve(&c.path), c.op, c.value))
            .collect();
        let order: Vec<String> = self.order.iter().map(|p| joins.resolve(p)).collect();

        let mut out = format!("SELECT {selected} FROM {} {ROOT}", self.entity);
        for (relation, alias) in &joins.aliases {
            out.push_str(&format!(" JOIN {relation} AS {alias}"));
        }
        if !conditions.is_empty() {
            out.push_str(" WHERE ");
            out.push_str(&conditions.join(" AND "));
        }
        if !order.is_empty() {
            out.push_str(" ORDER BY ");
            out.push_str(&order.join(", "));
        }
        if let Some((offset, count)) = self.limit {
            out.push_str(&format!(" LIMIT {offset}, {count}"));
        }
        out
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Join clauses collected while resolving attribute paths.
///
/// Keyed by the relation path from the root (`"dataset"`,
/// `"dataset.investigation"`) in order of first use.
#[derive(Default)]
struct Joins {
    paths: Vec<String>,
    /// (`"<parent alias>.<relation>"`, alias)
    aliases: Vec<(String, String)>,
}

impl Joins {
    /// Turn `a.b.attr` into `<alias of a.b>.attr`, registering joins.
    fn resolve(&mut self, path: &str) -> String {
        let parts: Vec<&str> = path.split('.').collect();
        let (attr, relations) = match parts.split_last() {
            Some(split) => split,
            None => return ROOT.to_string(),
        };

        let mut parent = ROOT.to_string();
        let mut prefix = String::new();
        for rel in relations {
            if !prefix.is_empty() {
                prefix.push('.');
            }
            prefix.push_str(rel);
            parent = match self.paths.iter().position(|p| *p == prefix) {
                Some(idx) => self.aliases[idx].1.clone(),
                None => {
                    let alias = format!("s{}", self.paths.len() + 1);
                    self.paths.push(prefix.clone());
                    self.aliases.push((format!("{parent}.{rel}"), alias.clone()));
                    alias
                }
            };
        }
        format!("{parent}.{attr}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_objects() {
        assert_eq!(Query::new("Investigation").render(), "SELECT o FROM Investigation o");
    }

    #[test]
    fn count_with_relation_condition() {
        let q = Query::new("Datafile")
            .aggregate(Aggregate::Count)
            .where_eq("dataset.id", 42);
        assert_eq!(
            q.render(),
            "SELECT COUNT(o) FROM Datafile o JOIN o.dataset AS s1 WHERE s1.id = 42"
        );
    }

    #[test]
    fn sum_of_attribute() {
        let q = Query::new("Datafile")
            .attribute("fileSize")
            .aggregate(Aggregate::Sum)
            .where_eq("dataset.id", 7);
        assert_eq!(
            q.render(),
            "SELECT SUM(o.fileSize) FROM Datafile o JOIN o.dataset AS s1 WHERE s1.id = 7"
        );
    }

    #[test]
    fn shared_join_prefix_is_reused() {
        let q = Query::new("Datafile")
            .where_eq("dataset.investigation.name", "exp-1")
            .where_eq("dataset.name", "raw")
            .order_by("id");
        assert_eq!(
            q.render(),
            "SELECT o FROM Datafile o JOIN o.dataset AS s1 JOIN s1.investigation AS s2 \
             WHERE s2.name = 'exp-1' AND s1.name = 'raw' ORDER BY o.id"
        );
    }

    #[test]
    fn string_literals_are_escaped() {
        let q = Query::new("Investigation").where_eq("name", "O'Brien");
        assert_eq!(q.render(), "SELECT o FROM Investigation o WHERE o.name = 'O''Brien'");
    }

    #[test]
    fn limit_and_order() {
        let q = Query::new("Dataset")
            .where_cmp("id", Op::Gt, 10)
            .order_by("id")
            .limit(200, 100);
        assert_eq!(
            q.render(),
            "SELECT o FROM Dataset o WHERE o.id > 10 ORDER BY o.id LIMIT 200, 100"
        );
    }

    #[test]
    fn bool_literal() {
        let q = Query::new("Dataset").where_eq("complete", false);
        assert_eq!(q.render(), "SELECT o FROM Dataset o WHERE o.complete = FALSE");
    }
}
