//! Canonical query descriptors
//!
//! A [`QueryDescriptor`] is the immutable, canonicalized form of a query:
//! namespace, filter predicate, projection, sort, skip and limit. Runners
//! own one for their whole lifetime and never mutate it.
//!
//! Canonicalization happens once in [`QueryBuilder::build`]:
//! - nested `And`/`Or` of the same kind are flattened
//! - `All` children of an `And` are dropped; an `Or` with an `All` child
//!   becomes `All`
//! - single-child `And`/`Or` collapse to the child
//! - children are ordered by shape, so `a AND b` and `b AND a` share a
//!   [`QueryShape`]

use crate::document::{canonical_cmp, Document, ID_FIELD};
use crate::error::{Error, Result};
use crate::types::Namespace;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use xxhash_rust::xxh3::xxh3_64;

/// Comparison operator of a [`Predicate::Compare`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    /// Equal (a missing field equals `null`)
    Eq,
    /// Not equal
    Ne,
    /// Greater than
    Gt,
    /// Greater than or equal
    Gte,
    /// Less than
    Lt,
    /// Less than or equal
    Lte,
}

impl CompareOp {
    fn name(self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
            CompareOp::Gt => "gt",
            CompareOp::Gte => "gte",
            CompareOp::Lt => "lt",
            CompareOp::Lte => "lte",
        }
    }
}

/// Filter predicate over documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    /// Matches every document
    All,
    /// Compare the value at `path` with a constant
    Compare {
        /// Dotted field path
        path: String,
        /// Operator
        op: CompareOp,
        /// Constant operand
        value: Value,
    },
    /// Field presence test
    Exists {
        /// Dotted field path
        path: String,
        /// Whether the field must be present (`true`) or absent (`false`)
        exists: bool,
    },
    /// Field equals any of the listed values
    In {
        /// Dotted field path
        path: String,
        /// Candidate values
        values: Vec<Value>,
    },
    /// All children match
    And(Vec<Predicate>),
    /// At least one child matches
    Or(Vec<Predicate>),
}

impl Predicate {
    /// `path == value`
    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(path, CompareOp::Eq, value)
    }

    /// `path != value`
    pub fn ne(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(path, CompareOp::Ne, value)
    }

    /// `path > value`
    pub fn gt(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(path, CompareOp::Gt, value)
    }

    /// `path >= value`
    pub fn gte(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(path, CompareOp::Gte, value)
    }

    /// `path < value`
    pub fn lt(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(path, CompareOp::Lt, value)
    }

    /// `path <= value`
    pub fn lte(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(path, CompareOp::Lte, value)
    }

    /// Generic comparison constructor
    pub fn compare(path: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            path: path.into(),
            op,
            value: value.into(),
        }
    }

    /// Field presence test
    pub fn exists(path: impl Into<String>, exists: bool) -> Self {
        Predicate::Exists {
            path: path.into(),
            exists,
        }
    }

    /// Membership test
    pub fn is_in(path: impl Into<String>, values: Vec<Value>) -> Self {
        Predicate::In {
            path: path.into(),
            values,
        }
    }

    /// Evaluate against a document
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Predicate::All => true,
            Predicate::Compare { path, op, value } => {
                compare_matches(doc.get_path(path), *op, value)
            }
            Predicate::Exists { path, exists } => doc.contains_path(path) == *exists,
            Predicate::In { path, values } => {
                let field = doc.get_path(path);
                values
                    .iter()
                    .any(|v| compare_matches(field, CompareOp::Eq, v))
            }
            Predicate::And(children) => children.iter().all(|c| c.matches(doc)),
            Predicate::Or(children) => children.iter().any(|c| c.matches(doc)),
        }
    }

    /// Shape of the predicate with constants stripped
    pub fn shape(&self) -> String {
        match self {
            Predicate::All => "all".to_string(),
            Predicate::Compare { path, op, .. } => format!("{}({})", op.name(), path),
            Predicate::Exists { path, .. } => format!("exists({})", path),
            Predicate::In { path, .. } => format!("in({})", path),
            Predicate::And(children) => format!("and({})", join_shapes(children)),
            Predicate::Or(children) => format!("or({})", join_shapes(children)),
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Predicate::All => Ok(()),
            Predicate::Compare { path, .. } | Predicate::Exists { path, .. } => {
                validate_path(path)
            }
            Predicate::In { path, values } => {
                validate_path(path)?;
                if values.is_empty() {
                    return Err(Error::InvalidQuery(format!(
                        "in({}) needs at least one value",
                        path
                    )));
                }
                Ok(())
            }
            Predicate::And(children) | Predicate::Or(children) => {
                if children.is_empty() {
                    return Err(Error::InvalidQuery(
                        "and/or needs at least one clause".to_string(),
                    ));
                }
                children.iter().try_for_each(Predicate::validate)
            }
        }
    }

    fn canonicalize(self) -> Predicate {
        match self {
            Predicate::And(children) => {
                let mut flat = Vec::with_capacity(children.len());
                for child in children.into_iter().map(Predicate::canonicalize) {
                    match child {
                        Predicate::And(inner) => flat.extend(inner),
                        Predicate::All => {}
                        other => flat.push(other),
                    }
                }
                collapse(flat, Predicate::And).unwrap_or(Predicate::All)
            }
            Predicate::Or(children) => {
                let mut flat = Vec::with_capacity(children.len());
                for child in children.into_iter().map(Predicate::canonicalize) {
                    match child {
                        Predicate::Or(inner) => flat.extend(inner),
                        Predicate::All => return Predicate::All,
                        other => flat.push(other),
                    }
                }
                collapse(flat, Predicate::Or).unwrap_or(Predicate::All)
            }
            other => other,
        }
    }
}

fn collapse(
    mut children: Vec<Predicate>,
    wrap: fn(Vec<Predicate>) -> Predicate,
) -> Option<Predicate> {
    match children.len() {
        0 => None,
        1 => children.pop(),
        _ => {
            children.sort_by_key(Predicate::shape);
            Some(wrap(children))
        }
    }
}

fn join_shapes(children: &[Predicate]) -> String {
    children
        .iter()
        .map(Predicate::shape)
        .collect::<Vec<_>>()
        .join(",")
}

fn validate_path(path: &str) -> Result<()> {
    if path.is_empty() || path.split('.').any(str::is_empty) {
        return Err(Error::InvalidQuery(format!("invalid field path '{}'", path)));
    }
    Ok(())
}

fn same_type_bracket(a: &Value, b: &Value) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}

fn compare_matches(field: Option<&Value>, op: CompareOp, operand: &Value) -> bool {
    let field = field.unwrap_or(&Value::Null);
    match op {
        CompareOp::Eq => canonical_cmp(field, operand) == Ordering::Equal,
        CompareOp::Ne => canonical_cmp(field, operand) != Ordering::Equal,
        // Range operators only match within one type bracket
        _ if !same_type_bracket(field, operand) => false,
        CompareOp::Gt => canonical_cmp(field, operand) == Ordering::Greater,
        CompareOp::Gte => canonical_cmp(field, operand) != Ordering::Less,
        CompareOp::Lt => canonical_cmp(field, operand) == Ordering::Less,
        CompareOp::Lte => canonical_cmp(field, operand) != Ordering::Greater,
    }
}

/// Field selection applied to result documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    /// Keep only the listed paths (and `_id` unless `include_id` is false)
    Include {
        /// Dotted paths to keep
        fields: Vec<String>,
        /// Keep `_id` as well
        include_id: bool,
    },
    /// Drop the listed paths
    Exclude {
        /// Dotted paths to drop
        fields: Vec<String>,
    },
}

impl Projection {
    /// Inclusion projection that keeps `_id`
    pub fn include<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Projection::Include {
            fields: fields.into_iter().map(Into::into).collect(),
            include_id: true,
        }
    }

    /// Exclusion projection
    pub fn exclude<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Projection::Exclude {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Drop `_id` from an inclusion projection
    pub fn without_id(self) -> Self {
        match self {
            Projection::Include { fields, .. } => Projection::Include {
                fields,
                include_id: false,
            },
            Projection::Exclude { mut fields } => {
                if !fields.iter().any(|f| f == ID_FIELD) {
                    fields.push(ID_FIELD.to_string());
                }
                Projection::Exclude { fields }
            }
        }
    }

    /// Produce the projected copy of `doc`
    pub fn apply(&self, doc: &Document) -> Document {
        match self {
            Projection::Include { fields, include_id } => {
                let mut out = Map::new();
                if *include_id {
                    if let Some(id) = doc.id() {
                        out.insert(ID_FIELD.to_string(), id.clone());
                    }
                }
                for path in fields {
                    if let Some(value) = doc.get_path(path) {
                        set_path(&mut out, path, value.clone());
                    }
                }
                Document::from(out)
            }
            Projection::Exclude { fields } => {
                let mut out = doc.as_map().clone();
                for path in fields {
                    remove_path(&mut out, path);
                }
                Document::from(out)
            }
        }
    }

    /// Shape of the projection
    pub fn shape(&self) -> String {
        match self {
            Projection::Include { fields, include_id } => {
                let mut fields = fields.clone();
                fields.sort();
                format!("include({};id={})", fields.join(","), include_id)
            }
            Projection::Exclude { fields } => {
                let mut fields = fields.clone();
                fields.sort();
                format!("exclude({})", fields.join(","))
            }
        }
    }

    fn validate(&self) -> Result<()> {
        let fields = match self {
            Projection::Include { fields, .. } | Projection::Exclude { fields } => fields,
        };
        if fields.is_empty() {
            return Err(Error::InvalidQuery("projection lists no fields".to_string()));
        }
        fields.iter().try_for_each(|f| validate_path(f))
    }
}

fn set_path(target: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            target.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = target
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(map) = child {
                set_path(map, rest, value);
            }
        }
    }
}

fn remove_path(target: &mut Map<String, Value>, path: &str) {
    match path.split_once('.') {
        None => {
            target.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Value::Object(map)) = target.get_mut(head) {
                remove_path(map, rest);
            }
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    /// Smallest first
    Ascending,
    /// Largest first
    Descending,
}

/// One component of a sort pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortKey {
    /// Dotted field path
    pub path: String,
    /// Direction for this component
    pub direction: SortDirection,
}

/// Ordered sort pattern, e.g. `{a: 1, b: -1}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortSpec {
    keys: Vec<SortKey>,
}

impl SortSpec {
    /// Empty sort pattern
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an ascending component
    pub fn asc(mut self, path: impl Into<String>) -> Self {
        self.keys.push(SortKey {
            path: path.into(),
            direction: SortDirection::Ascending,
        });
        self
    }

    /// Append a descending component
    pub fn desc(mut self, path: impl Into<String>) -> Self {
        self.keys.push(SortKey {
            path: path.into(),
            direction: SortDirection::Descending,
        });
        self
    }

    /// Components in priority order
    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    /// Check if the pattern has no components
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Compare two documents; missing fields sort as `null`
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for key in &self.keys {
            let left = a.get_path(&key.path).unwrap_or(&Value::Null);
            let right = b.get_path(&key.path).unwrap_or(&Value::Null);
            let ord = match key.direction {
                SortDirection::Ascending => canonical_cmp(left, right),
                SortDirection::Descending => canonical_cmp(right, left),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Shape of the sort pattern
    pub fn shape(&self) -> String {
        self.keys
            .iter()
            .map(|k| match k.direction {
                SortDirection::Ascending => format!("{}:1", k.path),
                SortDirection::Descending => format!("{}:-1", k.path),
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Immutable, canonicalized query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    namespace: Namespace,
    filter: Predicate,
    projection: Option<Projection>,
    sort: Option<SortSpec>,
    skip: usize,
    limit: Option<usize>,
}

impl QueryDescriptor {
    /// Start building a query against `namespace`
    pub fn builder(namespace: Namespace) -> QueryBuilder {
        QueryBuilder {
            namespace,
            filter: Predicate::All,
            projection: None,
            sort: None,
            skip: 0,
            limit: None,
        }
    }

    /// Collection the query reads
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Canonical filter
    pub fn filter(&self) -> &Predicate {
        &self.filter
    }

    /// Projection, if any
    pub fn projection(&self) -> Option<&Projection> {
        self.projection.as_ref()
    }

    /// Sort pattern, if any
    pub fn sort(&self) -> Option<&SortSpec> {
        self.sort.as_ref()
    }

    /// Number of leading results to discard
    pub fn skip(&self) -> usize {
        self.skip
    }

    /// Maximum number of results, if bounded
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Shape used as the plan cache key
    pub fn shape(&self) -> QueryShape {
        QueryShape {
            namespace: self.namespace.clone(),
            filter: self.filter.shape(),
            projection: self.projection.as_ref().map(Projection::shape),
            sort: self.sort.as_ref().map(SortSpec::shape),
        }
    }
}

/// Builder for [`QueryDescriptor`]
///
/// # Example
///
/// ```
/// use strata_core::query::{Predicate, QueryDescriptor, SortSpec};
/// use strata_core::types::Namespace;
///
/// let query = QueryDescriptor::builder(Namespace::parse("shop.orders").unwrap())
///     .filter(Predicate::gt("total", 100))
///     .sort(SortSpec::new().desc("total"))
///     .limit(10)
///     .build()
///     .unwrap();
/// assert_eq!(query.limit(), Some(10));
/// ```
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    namespace: Namespace,
    filter: Predicate,
    projection: Option<Projection>,
    sort: Option<SortSpec>,
    skip: usize,
    limit: Option<usize>,
}

impl QueryBuilder {
    /// Set the filter predicate
    pub fn filter(mut self, filter: Predicate) -> Self {
        self.filter = filter;
        self
    }

    /// Set the projection
    pub fn project(mut self, projection: Projection) -> Self {
        self.projection = Some(projection);
        self
    }

    /// Set the sort pattern; an empty pattern means natural order
    pub fn sort(mut self, sort: SortSpec) -> Self {
        self.sort = if sort.is_empty() { None } else { Some(sort) };
        self
    }

    /// Discard the first `n` results
    pub fn skip(mut self, n: usize) -> Self {
        self.skip = n;
        self
    }

    /// Return at most `n` results; `0` means unbounded
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = if n == 0 { None } else { Some(n) };
        self
    }

    /// Validate and canonicalize
    pub fn build(self) -> Result<QueryDescriptor> {
        self.filter.validate()?;
        if let Some(projection) = &self.projection {
            projection.validate()?;
        }
        if let Some(sort) = &self.sort {
            sort.keys.iter().try_for_each(|k| validate_path(&k.path))?;
        }
        Ok(QueryDescriptor {
            namespace: self.namespace,
            filter: self.filter.canonicalize(),
            projection: self.projection,
            sort: self.sort,
            skip: self.skip,
            limit: self.limit,
        })
    }
}

/// Query shape: the query with constants stripped
///
/// Two queries that differ only in the constants they compare against
/// share a shape, and therefore a plan cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryShape {
    /// Collection queried
    pub namespace: Namespace,
    /// Filter shape
    pub filter: String,
    /// Projection shape
    pub projection: Option<String>,
    /// Sort shape
    pub sort: Option<String>,
}

impl QueryShape {
    /// Stable 64-bit key for this shape
    pub fn cache_key(&self) -> u64 {
        xxh3_64(self.to_string().as_bytes())
    }
}

impl std::fmt::Display for QueryShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} filter={} projection={} sort={}",
            self.namespace,
            self.filter,
            self.projection.as_deref().unwrap_or("-"),
            self.sort.as_deref().unwrap_or("-")
        )
    }
}
