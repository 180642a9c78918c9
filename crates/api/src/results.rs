//! Response envelopes
//!
//! Every controller action answers with one of these shapes, serialized with
//! camelCase keys and absent optional fields skipped:
//!
//! - `ApiResult { wasSuccessful, message?, validationIssues? }`
//! - `ItemResult<T> { ..., object? }`
//! - `ListResult<T> { ..., list?, page, pageSize, pageCount, totalCount }`

use serde::{Deserialize, Serialize};

/// One failed validation check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub property: String,
    pub issue: String,
}

impl ValidationIssue {
    pub fn new(property: impl Into<String>, issue: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            issue: issue.into(),
        }
    }
}

/// Messages joined the way a failed save reports them
pub fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| i.issue.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// ApiResult
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResult {
    pub was_successful: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_issues: Option<Vec<ValidationIssue>>,
}

impl ApiResult {
    pub fn success() -> Self {
        Self {
            was_successful: true,
            message: None,
            validation_issues: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            was_successful: false,
            message: Some(message.into()),
            validation_issues: None,
        }
    }

    pub fn invalid(issues: Vec<ValidationIssue>) -> Self {
        Self {
            was_successful: false,
            message: Some(join_issues(&issues)),
            validation_issues: Some(issues),
        }
    }
}

impl Default for ApiResult {
    fn default() -> Self {
        Self::success()
    }
}

// ============================================================================
// ItemResult
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResult<T> {
    pub was_successful: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_issues: Option<Vec<ValidationIssue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<T>,
}

impl<T> ItemResult<T> {
    pub fn success(object: T) -> Self {
        Self {
            was_successful: true,
            message: None,
            validation_issues: None,
            object: Some(object),
        }
    }

    /// Success with no object (void methods, deletes)
    pub fn ok() -> Self {
        Self {
            was_successful: true,
            message: None,
            validation_issues: None,
            object: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            was_successful: false,
            message: Some(message.into()),
            validation_issues: None,
            object: None,
        }
    }

    pub fn invalid(issues: Vec<ValidationIssue>) -> Self {
        let api = ApiResult::invalid(issues);
        Self {
            was_successful: false,
            message: api.message,
            validation_issues: api.validation_issues,
            object: None,
        }
    }

    pub fn not_found(id: impl std::fmt::Display) -> Self {
        Self::failure(format!("Item with ID {} was not found.", id))
    }

    /// Same outcome, different payload type
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ItemResult<U> {
        ItemResult {
            was_successful: self.was_successful,
            message: self.message,
            validation_issues: self.validation_issues,
            object: self.object.map(f),
        }
    }

    /// Drop the payload, keeping success and messages
    pub fn into_api_result(self) -> ApiResult {
        ApiResult {
            was_successful: self.was_successful,
            message: self.message,
            validation_issues: self.validation_issues,
        }
    }
}

impl<T> From<ApiResult> for ItemResult<T> {
    fn from(result: ApiResult) -> Self {
        Self {
            was_successful: result.was_successful,
            message: result.message,
            validation_issues: result.validation_issues,
            object: None,
        }
    }
}

// ============================================================================
// ListResult
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResult<T> {
    pub was_successful: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<Vec<T>>,
    pub page: usize,
    pub page_size: usize,
    pub page_count: usize,
    pub total_count: i64,
}

impl<T> ListResult<T> {
    pub fn success(list: Vec<T>, page: usize, page_size: usize, total_count: i64) -> Self {
        Self {
            was_successful: true,
            message: None,
            list: Some(list),
            page,
            page_size,
            page_count: page_count(total_count, page_size),
            total_count,
        }
    }

    /// A count-only answer with no list
    pub fn count_only(page: usize, page_size: usize, total_count: i64) -> Self {
        Self {
            was_successful: true,
            message: None,
            list: None,
            page,
            page_size,
            page_count: page_count(total_count, page_size),
            total_count,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            was_successful: false,
            message: Some(message.into()),
            list: None,
            page: 0,
            page_size: 0,
            page_count: 0,
            total_count: -1,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> ListResult<U> {
        ListResult {
            was_successful: self.was_successful,
            message: self.message,
            list: self.list.map(|l| l.into_iter().map(f).collect()),
            page: self.page,
            page_size: self.page_size,
            page_count: self.page_count,
            total_count: self.total_count,
        }
    }
}

fn page_count(total_count: i64, page_size: usize) -> usize {
    if page_size == 0 || total_count <= 0 {
        return 0;
    }
    (total_count as usize).div_ceil(page_size)
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
    fn test_item_result_skips_absent_fields() {
        let result: ItemResult<i32> = ItemResult::failure("nope");
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"wasSuccessful": false, "message": "nope"})
        );
        let ok = ItemResult::success(json!({"id": 1}));
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"wasSuccessful": true, "object": {"id": 1}})
        );
    }

    #[test]
    fn test_list_result_paging_fields() {
        let result = ListResult::success(vec![1, 2, 3], 2, 3, 7);
        assert_eq!(result.page_count, 3);
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "wasSuccessful": true,
                "list": [1, 2, 3],
                "page": 2,
                "pageSize": 3,
                "pageCount": 3,
                "totalCount": 7
            })
        );
        let empty: ListResult<i32> = ListResult::count_only(1, 25, 0);
        assert_eq!(empty.page_count, 0);
        assert!(empty.list.is_none());
    }

    #[test]
    fn test_invalid_carries_issues() {
        let result: ItemResult<()> = ItemResult::invalid(vec![
            ValidationIssue::new("name", "Name is required."),
            ValidationIssue::new("age", "Age must be between 0 and 10."),
        ]);
        assert!(!result.was_successful);
        assert_eq!(
            result.message.as_deref(),
            Some("Name is required. Age must be between 0 and 10.")
        );
        assert_eq!(result.validation_issues.unwrap().len(), 2);
    }

    #[test]
    fn test_not_found_message() {
        let result: ItemResult<()> = ItemResult::not_found(42);
        assert_eq!(result.message.as_deref(), Some("Item with ID 42 was not found."));
    }
}
