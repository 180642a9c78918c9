//! Request parameters of the standard endpoints
//!
//! Parameters arrive as query-string pairs (`page=2&filter.status=1`) or as
//! camelCase JSON; both land in the same structs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parameters every data-source-backed endpoint accepts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataSourceParameters {
    /// Content view name matched against `[DtoIncludes]`/`[DtoExcludes]`
    pub includes: Option<String>,
    /// Named data source; empty or `Default` for the default one
    pub data_source: Option<String>,
    /// Values for the data source's `[Coalesce]` properties
    pub data_source_params: BTreeMap<String, Value>,
}

impl DataSourceParameters {
    pub fn data_source_name(&self) -> &str {
        self.data_source.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterParameters {
    #[serde(flatten)]
    pub data_source: DataSourceParameters,
    pub search: Option<String>,
    /// Property name to raw value
    pub filter: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListParameters {
    #[serde(flatten)]
    pub filter: FilterParameters,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
    pub order_by: Option<String>,
    pub order_by_descending: Option<String>,
    /// Comma-separated fields to project to
    pub fields: Option<String>,
    pub count_only: bool,
}

impl ListParameters {
    /// Read query-string pairs; unknown keys are ignored
    pub fn from_query<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            if let Some(field) = key.strip_prefix("filter.") {
                params.filter.filter.insert(field.to_string(), value.to_string());
                continue;
            }
            if let Some(field) = key.strip_prefix("dataSource.") {
                params
                    .filter
                    .data_source
                    .data_source_params
                    .insert(field.to_string(), Value::String(value.to_string()));
                continue;
            }
            let text = Some(value.to_string()).filter(|v| !v.is_empty());
            match key.to_ascii_lowercase().as_str() {
                "page" => params.page = value.parse().ok(),
                "pagesize" => params.page_size = value.parse().ok(),
                "search" => params.filter.search = text,
                "orderby" => params.order_by = text,
                "orderbydescending" => params.order_by_descending = text,
                "fields" => params.fields = text,
                "includes" => params.filter.data_source.includes = text,
                "datasource" => params.filter.data_source.data_source = text,
                "countonly" => params.count_only = value.eq_ignore_ascii_case("true"),
                _ => {}
            }
        }
        params
    }

    /// Requested field names, empty when no projection applies
    pub fn field_list(&self) -> Vec<String> {
        self.fields
            .as_deref()
            .map(|f| {
                f.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_from_query() {
        let params = ListParameters::from_query([
            ("page", "2"),
            ("pageSize", "10"),
            ("search", "acme"),
            ("filter.status", "1,2"),
            ("dataSource", "BorCPeople"),
            ("dataSource.letter", "B"),
            ("orderByDescending", "Name"),
            ("fields", "name, city,"),
            ("unknown", "x"),
        ]);
        assert_eq!(params.page, Some(2));
        assert_eq!(params.page_size, Some(10));
        assert_eq!(params.filter.search.as_deref(), Some("acme"));
        assert_eq!(params.filter.filter["status"], "1,2");
        assert_eq!(params.filter.data_source.data_source_name(), "BorCPeople");
        assert_eq!(params.filter.data_source.data_source_params["letter"], json!("B"));
        assert_eq!(params.order_by_descending.as_deref(), Some("Name"));
        assert_eq!(params.field_list(), vec!["name".to_string(), "city".to_string()]);
    }

    #[test]
    fn test_deserialize_flattened_json() {
        let params: ListParameters = serde_json::from_value(json!({
            "search": "Acme",
            "page": 1,
            "countOnly": false,
            "dataSource": "Default",
            "filter": {"city": "Spokane"}
        }))
        .unwrap();
        assert_eq!(params.filter.search.as_deref(), Some("Acme"));
        assert_eq!(params.filter.filter["city"], "Spokane");
        assert_eq!(params.filter.data_source.data_source.as_deref(), Some("Default"));
        assert_eq!(params.page_size, None);
    }
}
