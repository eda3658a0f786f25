use serde::Deserialize;

/// Raw list query as received on the wire. `page`, `limit`, `sortBy` and `sortOrder`
/// are reserved; every other key is treated as a filter request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "Vec<(String, String)>")]
pub struct ListParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub filters: Vec<(String, String)>,
}

impl ListParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: impl Into<String>) -> Self {
        self.page = Some(page.into());
        self
    }

    pub fn limit(mut self, limit: impl Into<String>) -> Self {
        self.limit = Some(limit.into());
        self
    }

    pub fn sort(mut self, sort_by: impl Into<String>, sort_order: impl Into<String>) -> Self {
        self.sort_by = Some(sort_by.into());
        self.sort_order = Some(sort_order.into());
        self
    }

    pub fn filter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((name.into(), value.into()));
        self
    }
}

impl From<Vec<(String, String)>> for ListParams {
    fn from(pairs: Vec<(String, String)>) -> Self {
        let mut params = ListParams::default();
        for (key, value) in pairs {
            match key.as_str() {
                "page" => params.page = Some(value),
                "limit" => params.limit = Some(value),
                "sortBy" => params.sort_by = Some(value),
                "sortOrder" => params.sort_order = Some(value),
                _ => params.filters.push((key, value)),
            }
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_reserved_keys_from_filters() {
        let params = ListParams::from(vec![
            ("page".to_string(), "2".to_string()),
            ("status".to_string(), "open".to_string()),
            ("sortBy".to_string(), "createdAt".to_string()),
        ]);
        assert_eq!(params.page.as_deref(), Some("2"));
        assert_eq!(params.sort_by.as_deref(), Some("createdAt"));
        assert_eq!(params.filters, vec![("status".to_string(), "open".to_string())]);
    }
}
