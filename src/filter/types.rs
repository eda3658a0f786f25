use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

/// Comparison applied by a filter predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Case-insensitive substring match; the bound value is wrapped in `%`.
    ILike,
    /// `$n = ANY(column)` for array columns.
    ArrayContains,
    /// Boolean switch: `true` renders `IS NULL`, `false` renders `IS NOT NULL`. Binds nothing.
    IsNull,
    /// Boolean switch: `true` renders `IS NOT NULL`, `false` renders `IS NULL`. Binds nothing.
    NotNull,
}

impl FilterOp {
    pub fn to_sql(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Ne => "<>",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
            FilterOp::ILike => "ILIKE",
            FilterOp::ArrayContains => "= ANY",
            FilterOp::IsNull => "IS NULL",
            FilterOp::NotNull => "IS NOT NULL",
        }
    }
}

/// How a raw query-string value is parsed before binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Int,
    Decimal,
    Bool,
    Uuid,
    Timestamp,
    /// Text restricted to a fixed set of values (status enumerations).
    OneOf(&'static [&'static str]),
}

/// One entry of a filter allow-list. `name` is the public query key, `columns` the
/// trusted SQL expressions it targets. More than one column renders an OR group.
#[derive(Debug, Clone, Copy)]
pub struct FilterField {
    pub name: &'static str,
    pub columns: &'static [&'static str],
    pub op: FilterOp,
    pub kind: FieldKind,
}

impl FilterField {
    pub const fn new(name: &'static str, column: &'static [&'static str], op: FilterOp, kind: FieldKind) -> Self {
        Self { name, columns: column, op, kind }
    }

    /// Free-text search over one or more text columns.
    pub const fn search(name: &'static str, columns: &'static [&'static str]) -> Self {
        Self { name, columns, op: FilterOp::ILike, kind: FieldKind::Text }
    }
}

/// One entry of a sort allow-list.
#[derive(Debug, Clone, Copy)]
pub struct SortField {
    pub name: &'static str,
    pub column: &'static str,
}

impl SortField {
    pub const fn new(name: &'static str, column: &'static str) -> Self {
        Self { name, column }
    }
}

/// Declarative description of one list endpoint. Everything here is code-declared
/// and trusted; caller input only ever selects among these entries.
#[derive(Debug)]
pub struct ListSpec {
    /// Projection, e.g. `SELECT s.id, s.status`.
    pub select: &'static str,
    /// `FROM ... JOIN ...` clause.
    pub from: &'static str,
    /// Fixed predicate always applied, without bound values.
    pub base_where: Option<&'static str>,
    /// Count projection, `COUNT(*)` unless joins fan rows out.
    pub count: &'static str,
    pub filters: &'static [FilterField],
    pub sorts: &'static [SortField],
    /// Name of the default sort entry in `sorts`.
    pub default_sort: &'static str,
    /// Unique column appended to every ORDER BY so pages are stable.
    pub tie_breaker: &'static str,
    pub default_limit: u32,
}

impl ListSpec {
    pub fn filter_field(&self, name: &str) -> Option<&FilterField> {
        self.filters.iter().find(|f| f.name == name)
    }

    pub fn sort_field(&self, name: &str) -> Option<&SortField> {
        self.sorts.iter().find(|s| s.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    /// Anything other than a case-insensitive `asc` resolves to `Desc`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some(s) if s.trim().eq_ignore_ascii_case("asc") => SortDirection::Asc,
            _ => SortDirection::Desc,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOrderInfo {
    pub name: &'static str,
    pub column: &'static str,
    pub sort: SortDirection,
}

/// A value bound to a positional placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Int(i64),
    Decimal(Decimal),
    Bool(bool),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
}

impl From<&str> for SqlParam {
    fn from(v: &str) -> Self {
        SqlParam::Text(v.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(v: String) -> Self {
        SqlParam::Text(v)
    }
}

impl From<i64> for SqlParam {
    fn from(v: i64) -> Self {
        SqlParam::Int(v)
    }
}

impl From<bool> for SqlParam {
    fn from(v: bool) -> Self {
        SqlParam::Bool(v)
    }
}

impl From<Uuid> for SqlParam {
    fn from(v: Uuid) -> Self {
        SqlParam::Uuid(v)
    }
}

impl From<Decimal> for SqlParam {
    fn from(v: Decimal) -> Self {
        SqlParam::Decimal(v)
    }
}

impl From<DateTime<Utc>> for SqlParam {
    fn from(v: DateTime<Utc>) -> Self {
        SqlParam::Timestamp(v)
    }
}

/// Immutable `(queryText, parameterList)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<SqlParam>,
}

/// Uniform pagination envelope returned by every list endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_count: i64,
    pub limit: u32,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total_count: i64) -> Self {
        let total = total_count.max(0) as u64;
        let limit_u = u64::from(limit.max(1));
        let total_pages = ((total + limit_u - 1) / limit_u) as u32;
        Self { current_page: page, total_pages, total_count: total_count.max(0), limit }
    }
}

/// One page of rows plus its pagination metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}
