//! FQL predicate builder and evaluator.
//!
//! The object store accepts filters of the form `field:OP'value'` joined by
//! `+` (logical AND) and a sort string `field.asc` / `nested.path|desc`.
//! Building is what the services use; parsing and evaluation back the
//! local store backends so they can answer searches the same way the
//! remote store does.

use std::cmp::Ordering;
use std::fmt;

use serde_json::Value;

use crate::error::CoreError;

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FqlOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Match,
    NotMatch,
}

impl FqlOp {
    /// Wire token placed between the colon and the quoted value.
    pub fn as_str(&self) -> &'static str {
        match self {
            FqlOp::Eq => "",
            FqlOp::Neq => "!",
            FqlOp::Gt => ">",
            FqlOp::Gte => ">=",
            FqlOp::Lt => "<",
            FqlOp::Lte => "<=",
            FqlOp::Match => "~",
            FqlOp::NotMatch => "!~",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "" => FqlOp::Eq,
            "!" => FqlOp::Neq,
            ">" => FqlOp::Gt,
            ">=" => FqlOp::Gte,
            "<" => FqlOp::Lt,
            "<=" => FqlOp::Lte,
            "~" => FqlOp::Match,
            "!~" => FqlOp::NotMatch,
            _ => return None,
        })
    }
}

/// A single predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub field: String,
    pub op: FqlOp,
    pub value: String,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: FqlOp, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Evaluate the predicate against a JSON document.
    ///
    /// Array-valued fields match when any element matches.
    pub fn matches(&self, doc: &Value) -> bool {
        match lookup(doc, &self.field) {
            Some(Value::Array(items)) => {
                let hit = items.iter().any(|v| self.compare(scalar(v).as_deref()));
                match self.op {
                    FqlOp::Neq | FqlOp::NotMatch => {
                        items.iter().all(|v| self.compare(scalar(v).as_deref()))
                    }
                    _ => hit,
                }
            }
            Some(v) => self.compare(scalar(v).as_deref()),
            None => self.compare(None),
        }
    }

    fn compare(&self, actual: Option<&str>) -> bool {
        let Some(actual) = actual else {
            return matches!(self.op, FqlOp::Neq | FqlOp::NotMatch);
        };
        match self.op {
            FqlOp::Eq => actual == self.value,
            FqlOp::Neq => actual != self.value,
            FqlOp::Match => contains_ci(actual, &self.value),
            FqlOp::NotMatch => !contains_ci(actual, &self.value),
            FqlOp::Gt => compare_values(actual, &self.value) == Ordering::Greater,
            FqlOp::Gte => compare_values(actual, &self.value) != Ordering::Less,
            FqlOp::Lt => compare_values(actual, &self.value) == Ordering::Less,
            FqlOp::Lte => compare_values(actual, &self.value) != Ordering::Greater,
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}'{}'",
            self.field.trim(),
            self.op.as_str(),
            self.value.trim()
        )
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// AND together the given predicates.
pub fn build_query(filters: &[Filter]) -> Result<String, CoreError> {
    if filters.is_empty() {
        return Err(CoreError::InvalidQuery("empty filter list".to_string()));
    }

    let mut elems = Vec::with_capacity(filters.len());
    let mut errs = Vec::new();
    for (i, filter) in filters.iter().enumerate() {
        if filter.field.trim().is_empty() {
            errs.push(format!("filter at index {} has blank field", i));
            continue;
        }
        elems.push(filter.to_string());
    }

    if !errs.is_empty() {
        return Err(CoreError::InvalidQuery(errs.join("\n")));
    }
    Ok(elems.join("+"))
}

/// Render a sort string. Nested paths use `|` as the direction delimiter.
pub fn build_sort(field: &str, direction: SortDirection) -> Result<String, CoreError> {
    let field = field.trim();
    if field.is_empty() {
        return Err(CoreError::InvalidQuery("blank field".to_string()));
    }
    if field.contains('.') {
        Ok(format!("{}|{}", field, direction.as_str()))
    } else {
        Ok(format!("{}.{}", field, direction.as_str()))
    }
}

/// A parsed filter: clauses joined by `,` (OR), each a list of `+`-joined predicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FqlQuery {
    clauses: Vec<Vec<Filter>>,
}

impl FqlQuery {
    /// Parse a filter string. An empty string matches everything.
    pub fn parse(input: &str) -> Result<Self, CoreError> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(Self::default());
        }

        let mut clauses = Vec::new();
        for clause in split_unquoted(input, ',') {
            let mut filters = Vec::new();
            for elem in split_unquoted(&clause, '+') {
                filters.push(parse_element(elem.trim())?);
            }
            clauses.push(filters);
        }
        Ok(Self { clauses })
    }

    pub fn matches(&self, doc: &Value) -> bool {
        if self.clauses.is_empty() {
            return true;
        }
        self.clauses
            .iter()
            .any(|clause| clause.iter().all(|f| f.matches(doc)))
    }

    /// All predicates in clause order.
    pub fn filters(&self) -> impl Iterator<Item = &Filter> {
        self.clauses.iter().flatten()
    }
}

/// A parsed sort string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FqlSort {
    pub field: String,
    pub direction: SortDirection,
}

impl FqlSort {
    pub fn parse(input: &str) -> Result<Self, CoreError> {
        let input = input.trim();
        let (field, dir) = input
            .rsplit_once('|')
            .or_else(|| input.rsplit_once('.'))
            .ok_or_else(|| CoreError::InvalidQuery(format!("invalid sort: {}", input)))?;
        let direction = match dir {
            "asc" => SortDirection::Asc,
            "desc" => SortDirection::Desc,
            other => {
                return Err(CoreError::InvalidQuery(format!(
                    "invalid sort direction: {}",
                    other
                )));
            }
        };
        if field.is_empty() {
            return Err(CoreError::InvalidQuery("blank field".to_string()));
        }
        Ok(Self {
            field: field.to_string(),
            direction,
        })
    }

    /// Order two documents by the sort field. Missing values sort first ascending.
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        let a = lookup(a, &self.field).and_then(scalar);
        let b = lookup(b, &self.field).and_then(scalar);
        let ord = match (a, b) {
            (Some(a), Some(b)) => compare_values(&a, &b),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        match self.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    }
}

fn parse_element(elem: &str) -> Result<Filter, CoreError> {
    let invalid = || CoreError::InvalidQuery(format!("invalid filter element: {}", elem));

    let (field, rest) = elem.split_once(':').ok_or_else(invalid)?;
    let quote = rest.find('\'').ok_or_else(invalid)?;
    let op = FqlOp::from_token(rest[..quote].trim()).ok_or_else(invalid)?;
    let value = rest[quote + 1..].strip_suffix('\'').ok_or_else(invalid)?;

    let field = field.trim();
    if field.is_empty() {
        return Err(invalid());
    }
    Ok(Filter::new(field, op, value))
}

fn split_unquoted(input: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in input.chars() {
        if c == '\'' {
            quoted = !quoted;
        }
        if c == sep && !quoted {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    parts.push(current);
    parts
}

fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    if let Some(v) = doc.get(path) {
        return Some(v);
    }
    path.split('.').try_fold(doc, |node, key| node.get(key))
}

fn scalar(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

fn compare_values(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.cmp(b),
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
#[path = "fql_tests.rs"]
mod tests;
