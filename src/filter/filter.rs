use std::collections::HashSet;

use crate::config::FilterConfig;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::{ConditionValue, FilterWhere, FilterWhereInfo};
use super::params::ListParams;
use super::types::{FilterOp, FilterOrderInfo, ListSpec, Pagination, SqlParam, SqlResult};

/// Builds the data query and count query for one list request.
///
/// Both queries render their WHERE clause from the same predicate list through
/// [`Filter::to_where_sql`], so their filter parameters cannot drift apart.
#[derive(Debug, Clone)]
pub struct Filter {
    spec: &'static ListSpec,
    scopes: Vec<FilterWhereInfo>,
    conditions: Vec<FilterWhereInfo>,
    order: FilterOrderInfo,
    page: u32,
    limit: u32,
}

impl Filter {
    pub fn new(spec: &'static ListSpec) -> Self {
        Self {
            spec,
            scopes: vec![],
            conditions: vec![],
            order: FilterOrder::resolve(spec, None, None),
            page: 1,
            limit: spec.default_limit,
        }
    }

    /// Add a code-declared equality predicate, e.g. restricting rows to the caller.
    pub fn scope(self, column: &'static str, value: impl Into<SqlParam>) -> Self {
        self.scope_with(&[column], FilterOp::Eq, value)
    }

    /// Add a code-declared predicate; several columns render an OR group.
    pub fn scope_with(mut self, columns: &[&'static str], op: FilterOp, value: impl Into<SqlParam>) -> Self {
        self.scopes.push(FilterWhereInfo {
            columns: columns.to_vec(),
            operator: op,
            data: ConditionValue::Param(value.into()),
        });
        self
    }

    /// Apply caller-supplied paging, sorting and filters.
    pub fn assign(mut self, params: &ListParams, config: &FilterConfig) -> Result<Self, FilterError> {
        self.page = match params.page.as_deref() {
            None => 1,
            Some(raw) => parse_positive(raw).ok_or_else(|| FilterError::InvalidPage(format!("'{}' is not a positive integer", raw)))?,
        };

        let limit = match params.limit.as_deref() {
            None => self.spec.default_limit,
            Some(raw) => parse_positive(raw).ok_or_else(|| FilterError::InvalidLimit(format!("'{}' is not a positive integer", raw)))?,
        };
        self.limit = match config.max_limit {
            Some(max) if limit > max => {
                tracing::warn!("Limit {} exceeds max {}, capping to max", limit, max);
                max
            }
            _ => limit,
        };

        self.order = FilterOrder::resolve(self.spec, params.sort_by.as_deref(), params.sort_order.as_deref());

        let mut seen = HashSet::new();
        for (name, _) in &params.filters {
            if self.spec.filter_field(name).is_none() {
                return Err(FilterError::UnknownField(name.clone()));
            }
            if !seen.insert(name.as_str()) {
                return Err(FilterError::DuplicateField(name.clone()));
            }
        }

        // Declaration order keeps placeholder numbering independent of query-string order.
        let mut conditions = vec![];
        for field in self.spec.filters {
            let raw = params.filters.iter().find(|(name, _)| name == field.name).map(|(_, v)| v.as_str());
            match raw {
                Some(value) if !value.trim().is_empty() => conditions.push(FilterWhereInfo::from_raw(field, value)?),
                _ => {}
            }
        }
        self.conditions = conditions;

        if config.debug_logging {
            let data = self.to_sql();
            tracing::debug!(query = %data.query, params = ?data.params, "built list query");
        }
        Ok(self)
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }

    pub fn order(&self) -> &FilterOrderInfo {
        &self.order
    }

    /// Shared predicate rendering for every query this filter produces.
    pub fn to_where_sql(&self) -> SqlResult {
        let predicates: Vec<FilterWhereInfo> = self.scopes.iter().chain(self.conditions.iter()).cloned().collect();
        let (query, params) = FilterWhere::generate(self.spec.base_where, &predicates);
        SqlResult { query, params }
    }

    /// Data query: projection, predicates, ordering, then `LIMIT`/`OFFSET` placeholders.
    pub fn to_sql(&self) -> SqlResult {
        let where_result = self.to_where_sql();
        let mut params = where_result.params;
        let limit_index = params.len() + 1;
        params.push(SqlParam::Int(i64::from(self.limit)));
        params.push(SqlParam::Int(self.offset()));

        let query = self.join_clauses(&[
            self.spec.select.to_string(),
            self.spec.from.to_string(),
            where_result.query,
            FilterOrder::generate(&self.order, self.spec.tie_breaker),
            format!("LIMIT ${} OFFSET ${}", limit_index, limit_index + 1),
        ]);
        SqlResult { query, params }
    }

    /// Count query over the identical predicate list; no pagination parameters.
    pub fn to_count_sql(&self) -> SqlResult {
        let where_result = self.to_where_sql();
        let query = self.join_clauses(&[
            format!("SELECT {} AS count", self.spec.count),
            self.spec.from.to_string(),
            where_result.query,
        ]);
        SqlResult { query, params: where_result.params }
    }

    /// Unpaginated variant for exports, capped at `max_rows`.
    pub fn to_export_sql(&self, max_rows: u32) -> SqlResult {
        let where_result = self.to_where_sql();
        let mut params = where_result.params;
        params.push(SqlParam::Int(i64::from(max_rows)));
        let query = self.join_clauses(&[
            self.spec.select.to_string(),
            self.spec.from.to_string(),
            where_result.query,
            FilterOrder::generate(&self.order, self.spec.tie_breaker),
            format!("LIMIT ${}", params.len()),
        ]);
        SqlResult { query, params }
    }

    pub fn pagination(&self, total_count: i64) -> Pagination {
        Pagination::new(self.page, self.limit, total_count)
    }

    fn join_clauses(&self, clauses: &[String]) -> String {
        clauses.iter().filter(|s| !s.is_empty()).cloned().collect::<Vec<_>>().join(" ")
    }
}

fn parse_positive(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|n| *n >= 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::types::{FieldKind, FilterField, SortDirection, SortField};
    use uuid::Uuid;

    static SESSIONS: ListSpec = ListSpec {
        select: "SELECT s.id, s.status, s.scheduled_at",
        from: "FROM sessions s JOIN users st ON st.id = s.student_id",
        base_where: None,
        count: "COUNT(*)",
        filters: &[
            FilterField::new("status", &["s.status"], FilterOp::Eq, FieldKind::OneOf(&["scheduled", "completed", "cancelled"])),
            FilterField::new("from", &["s.scheduled_at"], FilterOp::Gte, FieldKind::Timestamp),
            FilterField::new("paid", &["s.paid"], FilterOp::Eq, FieldKind::Bool),
            FilterField::search("search", &["st.email", "s.subject"]),
        ],
        sorts: &[SortField::new("scheduledAt", "s.scheduled_at"), SortField::new("price", "s.price")],
        default_sort: "scheduledAt",
        tie_breaker: "s.id",
        default_limit: 20,
    };

    fn config() -> FilterConfig {
        FilterConfig { max_limit: Some(100), max_export_rows: 1000, debug_logging: false }
    }

    #[test]
    fn defaults_without_params() {
        let filter = Filter::new(&SESSIONS).assign(&ListParams::new(), &config()).unwrap();
        let sql = filter.to_sql();
        assert_eq!(
            sql.query,
            "SELECT s.id, s.status, s.scheduled_at FROM sessions s JOIN users st ON st.id = s.student_id \
             ORDER BY s.scheduled_at DESC, s.id DESC LIMIT $1 OFFSET $2"
        );
        assert_eq!(sql.params, vec![SqlParam::Int(20), SqlParam::Int(0)]);
        assert_eq!(filter.page(), 1);
    }

    #[test]
    fn data_and_count_share_predicates_and_values() {
        let student = Uuid::new_v4();
        let params = ListParams::new()
            .filter("search", "algebra")
            .filter("status", "scheduled")
            .page("3")
            .limit("10");
        let filter = Filter::new(&SESSIONS).scope("s.student_id", student).assign(&params, &config()).unwrap();

        let data = filter.to_sql();
        let count = filter.to_count_sql();

        assert_eq!(
            count.query,
            "SELECT COUNT(*) AS count FROM sessions s JOIN users st ON st.id = s.student_id \
             WHERE s.student_id = $1 AND s.status = $2 AND (st.email ILIKE $3 OR s.subject ILIKE $4)"
        );
        assert!(data.query.contains("WHERE s.student_id = $1 AND s.status = $2 AND (st.email ILIKE $3 OR s.subject ILIKE $4)"));
        assert!(data.query.ends_with("LIMIT $5 OFFSET $6"));
        assert_eq!(&data.params[..count.params.len()], &count.params[..]);
        assert_eq!(&data.params[count.params.len()..], &[SqlParam::Int(10), SqlParam::Int(20)]);
    }

    #[test]
    fn unknown_filter_field_is_rejected() {
        let params = ListParams::new().filter("password_hash", "x");
        let err = Filter::new(&SESSIONS).assign(&params, &config()).unwrap_err();
        assert_eq!(err, FilterError::UnknownField("password_hash".to_string()));
    }

    #[test]
    fn duplicate_filter_field_is_rejected() {
        let params = ListParams::new().filter("status", "scheduled").filter("status", "completed");
        assert!(matches!(Filter::new(&SESSIONS).assign(&params, &config()), Err(FilterError::DuplicateField(_))));
    }

    #[test]
    fn invalid_sort_falls_back_to_default() {
        let params = ListParams::new().sort("s.id; DROP TABLE sessions", "asc");
        let filter = Filter::new(&SESSIONS).assign(&params, &config()).unwrap();
        assert_eq!(filter.order().column, "s.scheduled_at");
        assert_eq!(filter.order().sort, SortDirection::Asc);
        assert!(!filter.to_sql().query.contains("DROP"));
    }

    #[test]
    fn non_positive_or_garbage_paging_fails() {
        for bad in ["0", "-1", "abc", "", "1.5"] {
            let params = ListParams::new().page(bad);
            assert!(matches!(Filter::new(&SESSIONS).assign(&params, &config()), Err(FilterError::InvalidPage(_))), "page={bad}");
            let params = ListParams::new().limit(bad);
            assert!(matches!(Filter::new(&SESSIONS).assign(&params, &config()), Err(FilterError::InvalidLimit(_))), "limit={bad}");
        }
    }

    #[test]
    fn limit_is_capped() {
        let params = ListParams::new().limit("100000");
        let filter = Filter::new(&SESSIONS).assign(&params, &config()).unwrap();
        assert_eq!(filter.limit(), 100);
        assert_eq!(filter.pagination(250).total_pages, 3);
    }

    #[test]
    fn explicit_false_filter_applies_and_empty_value_is_absent() {
        let params = ListParams::new().filter("paid", "false").filter("search", "");
        let filter = Filter::new(&SESSIONS).assign(&params, &config()).unwrap();
        let count = filter.to_count_sql();
        assert!(count.query.ends_with("WHERE s.paid = $1"));
        assert_eq!(count.params, vec![SqlParam::Bool(false)]);
    }

    #[test]
    fn placeholder_order_ignores_query_string_order() {
        let a = Filter::new(&SESSIONS)
            .assign(&ListParams::new().filter("status", "completed").filter("from", "2025-01-01"), &config())
            .unwrap();
        let b = Filter::new(&SESSIONS)
            .assign(&ListParams::new().filter("from", "2025-01-01").filter("status", "completed"), &config())
            .unwrap();
        assert_eq!(a.to_sql(), b.to_sql());
    }

    #[test]
    fn export_query_has_single_row_cap() {
        let filter = Filter::new(&SESSIONS).assign(&ListParams::new().filter("status", "completed"), &config()).unwrap();
        let sql = filter.to_export_sql(500);
        assert!(sql.query.ends_with("LIMIT $2"));
        assert_eq!(sql.params.last(), Some(&SqlParam::Int(500)));
    }
}
