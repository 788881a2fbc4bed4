//! List query composition
//!
//! Translates an untrusted query-string (`?price[gte]=100&sort=-price&fields=name&page=2`)
//! into a [`QueryDescriptor`]: filter clauses, sort keys, a projection and a
//! page window. Only four comparison operators are accepted from the outside;
//! anything else is rejected before it can reach the store.

use crate::{NatoursError, Result};
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;

/// Query-string keys that control the listing instead of filtering it
pub const RESERVED_KEYS: [&str; 4] = ["page", "sort", "limit", "fields"];

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 100;

/// Field sorted on when the request names none
pub const DEFAULT_SORT_FIELD: &str = "createdAt";

/// Internal per-document version counter, hidden by the default projection
pub const VERSION_FIELD: &str = "__v";

/// Identifier field, always part of an explicit projection
pub const ID_FIELD: &str = "id";

/// Comparison operators understood by the store
///
/// `Ne` is only produced internally (entity base filters); the query-string
/// grammar can reach `Eq` and the four range operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparison {
    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            _ => None,
        }
    }
}

/// A single predicate on one (possibly dotted) field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterClause {
    pub field: String,
    pub op: Comparison,
    pub value: Value,
}

impl FilterClause {
    pub fn new(field: impl Into<String>, op: Comparison, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Comparison::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Comparison::Ne, value)
    }

    /// Evaluate the clause against a stored document
    pub fn matches(&self, doc: &Map<String, Value>) -> bool {
        let actual = lookup(doc, &self.field);
        let ordering = || actual.and_then(|v| compare_values(v, &self.value));
        match self.op {
            Comparison::Eq => actual.is_some_and(|v| value_equals(v, &self.value)),
            // Missing fields are "not equal" to anything.
            Comparison::Ne => !actual.is_some_and(|v| value_equals(v, &self.value)),
            Comparison::Gt => ordering() == Some(Ordering::Greater),
            Comparison::Gte => matches!(ordering(), Some(Ordering::Greater | Ordering::Equal)),
            Comparison::Lt => ordering() == Some(Ordering::Less),
            Comparison::Lte => matches!(ordering(), Some(Ordering::Less | Ordering::Equal)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Which top-level fields of a document are returned
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub enum Projection {
    /// Everything except the internal version counter
    #[default]
    All,
    /// Only these fields (plus `id`)
    Include(Vec<String>),
    /// Everything except these fields
    Exclude(Vec<String>),
}

impl Projection {
    pub fn apply(&self, mut doc: Map<String, Value>) -> Map<String, Value> {
        match self {
            Projection::All => {
                doc.remove(VERSION_FIELD);
                doc
            }
            Projection::Include(fields) => doc
                .into_iter()
                .filter(|(key, _)| key == ID_FIELD || fields.iter().any(|f| f == key))
                .collect(),
            Projection::Exclude(fields) => {
                doc.remove(VERSION_FIELD);
                for field in fields {
                    doc.remove(field);
                }
                doc
            }
        }
    }
}

/// Parsed, safe representation of a list request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryDescriptor {
    pub filters: Vec<FilterClause>,
    pub sort: Vec<SortKey>,
    pub projection: Projection,
    pub page: u64,
    pub limit: u64,
}

impl Default for QueryDescriptor {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            sort: Vec::new(),
            projection: Projection::All,
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl QueryDescriptor {
    /// Unpaged query over the given clauses, used for internal lookups
    pub fn matching(filters: Vec<FilterClause>) -> Self {
        Self {
            filters,
            limit: u64::MAX,
            ..Self::default()
        }
    }

    pub fn skip(&self) -> usize {
        usize::try_from((self.page - 1).saturating_mul(self.limit)).unwrap_or(usize::MAX)
    }

    pub fn take(&self) -> usize {
        usize::try_from(self.limit).unwrap_or(usize::MAX)
    }

    pub fn matches(&self, doc: &Map<String, Value>) -> bool {
        self.filters.iter().all(|clause| clause.matches(doc))
    }

    /// Order two documents by the sort keys; ties keep insertion order
    pub fn compare(&self, a: &Map<String, Value>, b: &Map<String, Value>) -> Ordering {
        for key in &self.sort {
            let ordering = sort_order(lookup(a, &key.field), lookup(b, &key.field));
            let ordering = match key.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

/// Chainable builder over the raw query-string pairs
///
/// Each step fills one axis of the descriptor, so steps can be chained in any
/// order and none of them re-runs another:
///
/// ```
/// use natours_core::query::QueryBuilder;
///
/// let params = vec![("price[gte]".to_string(), "100".to_string())];
/// let query = QueryBuilder::new(&params)
///     .filter()?
///     .sort()
///     .limit_fields()?
///     .paginate()
///     .build();
/// assert_eq!(query.filters.len(), 1);
/// # Ok::<(), natours_core::NatoursError>(())
/// ```
#[derive(Debug, Clone)]
pub struct QueryBuilder<'a> {
    params: &'a [(String, String)],
    descriptor: QueryDescriptor,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(params: &'a [(String, String)]) -> Self {
        Self {
            params,
            descriptor: QueryDescriptor::default(),
        }
    }

    /// Start from clauses that always apply (entity base filter, parent scope)
    pub fn scoped(params: &'a [(String, String)], scope: Vec<FilterClause>) -> Self {
        let mut builder = Self::new(params);
        builder.descriptor.filters = scope;
        builder
    }

    pub fn filter(mut self) -> Result<Self> {
        for (key, raw) in self.params {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            let (field, op) = parse_filter_key(key)?;
            self.descriptor
                .filters
                .push(FilterClause::new(field, op, parse_scalar(raw)));
        }
        Ok(self)
    }

    pub fn sort(mut self) -> Self {
        self.descriptor.sort = match self.last("sort") {
            Some(raw) => {
                let keys: Vec<SortKey> = split_list(raw)
                    .map(|item| match item.strip_prefix('-') {
                        Some(field) => SortKey::desc(field),
                        None => SortKey::asc(item.trim_start_matches('+')),
                    })
                    .filter(|key| !key.field.is_empty())
                    .collect();
                if keys.is_empty() {
                    vec![SortKey::desc(DEFAULT_SORT_FIELD)]
                } else {
                    keys
                }
            }
            None => vec![SortKey::desc(DEFAULT_SORT_FIELD)],
        };
        self
    }

    pub fn limit_fields(mut self) -> Result<Self> {
        let Some(raw) = self.last("fields") else {
            self.descriptor.projection = Projection::All;
            return Ok(self);
        };

        let items: Vec<&str> = split_list(raw).collect();
        if items.is_empty() {
            self.descriptor.projection = Projection::All;
            return Ok(self);
        }

        let excluded = items.iter().filter(|item| item.starts_with('-')).count();
        self.descriptor.projection = if excluded == 0 {
            Projection::Include(items.iter().map(|s| s.to_string()).collect())
        } else if excluded == items.len() {
            Projection::Exclude(items.iter().map(|s| s[1..].to_string()).collect())
        } else {
            return Err(NatoursError::InvalidQuery(
                "fields cannot mix inclusion and exclusion".to_string(),
            ));
        };
        Ok(self)
    }

    pub fn paginate(mut self) -> Self {
        self.descriptor.page = self
            .last("page")
            .and_then(parse_positive)
            .unwrap_or(DEFAULT_PAGE);
        self.descriptor.limit = self
            .last("limit")
            .and_then(parse_positive)
            .unwrap_or(DEFAULT_LIMIT);
        self
    }

    pub fn build(self) -> QueryDescriptor {
        self.descriptor
    }

    /// Last occurrence wins for repeated control keys
    fn last(&self, key: &str) -> Option<&'a str> {
        self.params
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Run every step of the builder in its canonical order
pub fn build_query(
    params: &[(String, String)],
    scope: Vec<FilterClause>,
) -> Result<QueryDescriptor> {
    Ok(QueryBuilder::scoped(params, scope)
        .filter()?
        .sort()
        .limit_fields()?
        .paginate()
        .build())
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_positive(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok().filter(|n| *n > 0)
}

fn parse_filter_key(key: &str) -> Result<(String, Comparison)> {
    let (field, op) = match key.find('[') {
        Some(open) => {
            let suffix = key[open + 1..]
                .strip_suffix(']')
                .ok_or_else(|| NatoursError::InvalidQuery(format!("malformed filter key '{key}'")))?;
            let op = Comparison::from_suffix(suffix).ok_or_else(|| {
                NatoursError::InvalidQuery(format!("unsupported operator '{suffix}' in '{key}'"))
            })?;
            (&key[..open], op)
        }
        None => (key, Comparison::Eq),
    };

    if !is_valid_field(field) {
        return Err(NatoursError::InvalidQuery(format!(
            "invalid field name '{field}'"
        )));
    }
    Ok((field.to_string(), op))
}

fn is_valid_field(field: &str) -> bool {
    !field.is_empty()
        && !field.starts_with('.')
        && !field.ends_with('.')
        && !field.contains("..")
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Type a raw query-string value: numbers, booleans, otherwise text
pub fn parse_scalar(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Some(n) = raw
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
    {
        return Value::Number(n);
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

/// Resolve a dotted path inside a document
pub fn lookup<'v>(doc: &'v Map<String, Value>, path: &str) -> Option<&'v Value> {
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn value_equals(actual: &Value, expected: &Value) -> bool {
    match actual {
        // Array fields match when any element matches.
        Value::Array(items) if !expected.is_array() => {
            items.iter().any(|item| value_equals(item, expected))
        }
        _ => compare_values(actual, expected) == Some(Ordering::Equal) || actual == expected,
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(raw).ok()
}

/// Compare two scalars of the same kind; timestamps compare chronologically
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => match (parse_timestamp(x), parse_timestamp(y)) {
            (Some(tx), Some(ty)) => Some(tx.cmp(&ty)),
            _ => Some(x.cmp(y)),
        },
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

fn sort_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => compare_values(x, y).unwrap_or_else(|| type_rank(a).cmp(&type_rank(b))),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}
