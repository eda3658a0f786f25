use std::str::FromStr;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::error::FilterError;
use super::types::{FieldKind, FilterField, FilterOp, SqlParam};

/// Right-hand side of a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionValue {
    /// Bound through a positional placeholder.
    Param(SqlParam),
    /// Null-check switch for `IsNull` / `NotNull`; renders no placeholder.
    Switch(bool),
}

/// A resolved predicate. Several columns form an OR group, each with its own placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterWhereInfo {
    pub columns: Vec<&'static str>,
    pub operator: FilterOp,
    pub data: ConditionValue,
}

impl FilterWhereInfo {
    /// Parse a raw query-string value against an allow-list entry.
    pub fn from_raw(field: &FilterField, raw: &str) -> Result<Self, FilterError> {
        let data = match field.op {
            FilterOp::IsNull | FilterOp::NotNull => ConditionValue::Switch(parse_bool(field.name, raw)?),
            FilterOp::ILike => ConditionValue::Param(SqlParam::Text(format!("%{}%", escape_like(raw.trim())))),
            _ => ConditionValue::Param(parse_value(field.name, field.kind, raw)?),
        };
        Ok(Self { columns: field.columns.to_vec(), operator: field.op, data })
    }
}

/// Renders predicates into a WHERE clause with strictly increasing placeholders.
pub struct FilterWhere {
    param_values: Vec<SqlParam>,
}

impl FilterWhere {
    fn new() -> Self {
        Self { param_values: vec![] }
    }

    /// Returns `("WHERE ...", params)` or an empty clause when nothing applies.
    pub fn generate(base_where: Option<&str>, conditions: &[FilterWhereInfo]) -> (String, Vec<SqlParam>) {
        let mut filter_where = Self::new();
        let mut sql_conditions = vec![];
        if let Some(base) = base_where {
            sql_conditions.push(base.to_string());
        }
        for condition in conditions {
            sql_conditions.push(filter_where.build_sql_condition(condition));
        }
        let clause = if sql_conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", sql_conditions.join(" AND "))
        };
        (clause, filter_where.param_values)
    }

    fn build_sql_condition(&mut self, condition: &FilterWhereInfo) -> String {
        let parts: Vec<String> = condition
            .columns
            .iter()
            .map(|column| self.build_column_condition(column, condition.operator, &condition.data))
            .collect();
        if parts.len() == 1 {
            parts.into_iter().next().unwrap_or_default()
        } else {
            format!("({})", parts.join(" OR "))
        }
    }

    fn build_column_condition(&mut self, column: &str, op: FilterOp, data: &ConditionValue) -> String {
        match (op, data) {
            (FilterOp::IsNull, ConditionValue::Switch(true)) | (FilterOp::NotNull, ConditionValue::Switch(false)) => {
                format!("{} IS NULL", column)
            }
            (FilterOp::IsNull, ConditionValue::Switch(false)) | (FilterOp::NotNull, ConditionValue::Switch(true)) => {
                format!("{} IS NOT NULL", column)
            }
            (FilterOp::ArrayContains, ConditionValue::Param(value)) => {
                format!("{} = ANY({})", self.param(value.clone()), column)
            }
            (op, ConditionValue::Param(value)) => {
                format!("{} {} {}", column, op.to_sql(), self.param(value.clone()))
            }
            // Switch values are only produced for null-check operators.
            (_, ConditionValue::Switch(_)) => "1=1".to_string(),
        }
    }

    fn param(&mut self, value: SqlParam) -> String {
        self.param_values.push(value);
        format!("${}", self.param_values.len())
    }
}

pub fn parse_value(field: &str, kind: FieldKind, raw: &str) -> Result<SqlParam, FilterError> {
    let raw = raw.trim();
    let invalid = |reason: &str| FilterError::InvalidValue { field: field.to_string(), reason: reason.to_string() };
    match kind {
        FieldKind::Text => Ok(SqlParam::Text(raw.to_string())),
        FieldKind::Int => raw.parse::<i64>().map(SqlParam::Int).map_err(|_| invalid("expected an integer")),
        FieldKind::Decimal => Decimal::from_str(raw).map(SqlParam::Decimal).map_err(|_| invalid("expected a number")),
        FieldKind::Bool => parse_bool(field, raw).map(SqlParam::Bool),
        FieldKind::Uuid => Uuid::parse_str(raw).map(SqlParam::Uuid).map_err(|_| invalid("expected a UUID")),
        FieldKind::Timestamp => parse_timestamp(raw).map(SqlParam::Timestamp).ok_or_else(|| invalid("expected an RFC 3339 timestamp or YYYY-MM-DD date")),
        FieldKind::OneOf(allowed) => {
            if allowed.contains(&raw) {
                Ok(SqlParam::Text(raw.to_string()))
            } else {
                Err(invalid(&format!("expected one of: {}", allowed.join(", "))))
            }
        }
    }
}

fn parse_bool(field: &str, raw: &str) -> Result<bool, FilterError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(FilterError::InvalidValue { field: field.to_string(), reason: "expected true or false".to_string() }),
    }
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}
