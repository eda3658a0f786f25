use super::types::{FilterOrderInfo, ListSpec, SortDirection, SortField};

pub struct FilterOrder;

impl FilterOrder {
    /// Resolve a requested sort against the allow-list. Unknown or absent fields fall
    /// back to the declared default; the raw input never reaches the query text.
    /// Direction is resolved independently and defaults to `DESC`.
    pub fn resolve(spec: &ListSpec, sort_by: Option<&str>, sort_order: Option<&str>) -> FilterOrderInfo {
        let requested = sort_by.and_then(|name| spec.sort_field(name.trim())).copied();
        if requested.is_none() {
            if let Some(raw) = sort_by {
                tracing::debug!("sortBy '{}' is not sortable, using '{}'", raw, spec.default_sort);
            }
        }

        let field = requested
            .or_else(|| spec.sort_field(spec.default_sort).copied())
            .or_else(|| spec.sorts.first().copied())
            .unwrap_or(SortField::new("id", spec.tie_breaker));

        FilterOrderInfo { name: field.name, column: field.column, sort: SortDirection::parse(sort_order) }
    }

    /// `ORDER BY` with the list's unique tie-breaker so equal sort keys page stably.
    pub fn generate(info: &FilterOrderInfo, tie_breaker: &str) -> String {
        let dir = info.sort.to_sql();
        if info.column == tie_breaker {
            format!("ORDER BY {} {}", info.column, dir)
        } else {
            format!("ORDER BY {} {}, {} {}", info.column, dir, tie_breaker, dir)
        }
    }
}
