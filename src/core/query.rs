//! Query parameters and pagination utilities

use crate::core::{Queryable, SpecError, SpecResult, Value};
use crate::filter::{FilterCondition, FilterGroup, FilterOperator, SortDirection, SortField};
use crate::specification::AdvancedSpecification;
use serde::{Deserialize, Serialize};

/// Query parameters for pagination, filtering and sorting
///
/// This structure is used to extract pagination and filtering parameters
/// from URL query strings. All parameters have sensible defaults, and
/// [`to_specification`](Self::to_specification) turns them into a
/// specification.
///
/// # Example
/// ```rust,ignore
/// // Usage:
/// GET /items?page=2&limit=10
/// GET /items?filter={"status": "active"}
/// GET /items?page=1&limit=20&filter={"amount>": 100}&sort=created_at:desc
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueryParams {
    /// Page number (starts at 1)
    #[serde(default = "default_page")]
    pub page: usize,

    /// Number of items per page
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Filters as JSON object
    ///
    /// # Format
    /// - Exact match: `{"field": "value"}`
    /// - Comparison: `{"field>": value, "field<": value, "field>=": value, "field<=": value}`
    /// - Not equal: `{"field!": value}`
    /// - Case-insensitive substring: `{"field~": "text"}`
    /// - Membership: `{"field": ["a", "b"]}`, `{"field!": ["a", "b"]}`
    /// - Null check: `{"field": null}`, `{"field!": null}`
    ///
    /// # Example
    /// ```text
    /// filter={"status": "active", "amount>": 100, "customer_name~": "acme"}
    /// ```
    pub filter: Option<String>,

    /// Sort fields and directions, comma separated
    ///
    /// # Format
    /// - `field:asc` or `field` (ascending)
    /// - `field:desc` (descending)
    ///
    /// # Example
    /// ```text
    /// sort=amount:desc
    /// sort=status,created_at:desc
    /// ```
    pub sort: Option<String>,
}

fn default_page() -> usize {
    1
}

fn default_limit() -> usize {
    20
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
            filter: None,
            sort: None,
        }
    }
}

impl QueryParams {
    /// Get page number, ensuring minimum of 1
    pub fn page(&self) -> usize {
        self.page.max(1)
    }

    /// Get limit, ensuring it doesn't exceed the maximum
    pub fn limit(&self) -> usize {
        self.limit.clamp(1, 100) // Maximum 100 per page, minimum 1
    }

    /// Number of items before the current page
    pub fn skip(&self) -> usize {
        (self.page() - 1).saturating_mul(self.limit())
    }

    /// Parse the filter JSON string into a condition group
    ///
    /// Returns `None` when no filter is given. Keys are combined with AND.
    pub fn filter_group(&self) -> SpecResult<Option<FilterGroup>> {
        let Some(raw) = self.filter.as_deref().filter(|s| !s.trim().is_empty()) else {
            return Ok(None);
        };
        let parsed: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| SpecError::invalid("filter", format!("invalid JSON: {}", e)))?;
        let serde_json::Value::Object(entries) = parsed else {
            return Err(SpecError::invalid("filter", "filter must be a JSON object"));
        };

        let mut group = FilterGroup::and();
        for (key, value) in entries {
            group = group.with_condition(parse_condition(&key, Value::from(value))?);
        }
        Ok(Some(group))
    }

    /// Parse the sort string into sort fields
    pub fn sort_fields(&self) -> SpecResult<Vec<SortField>> {
        let Some(raw) = self.sort.as_deref() else {
            return Ok(Vec::new());
        };
        raw.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .enumerate()
            .map(|(order, part)| {
                let (path, direction) = match part.split_once(':') {
                    None => (part, SortDirection::Ascending),
                    Some((path, dir)) => match dir.to_ascii_lowercase().as_str() {
                        "asc" => (path, SortDirection::Ascending),
                        "desc" => (path, SortDirection::Descending),
                        other => {
                            return Err(SpecError::invalid(
                                "sort",
                                format!("unknown sort direction '{}'", other),
                            ));
                        }
                    },
                };
                crate::filter::validate_property_path(path)?;
                Ok(SortField::property(path, direction, order as i32))
            })
            .collect()
    }

    /// Build a paged specification from these parameters
    pub fn to_specification<T: Queryable>(&self) -> SpecResult<AdvancedSpecification<T>> {
        let mut spec = AdvancedSpecification::new();
        if let Some(group) = self.filter_group()? {
            spec = spec.with_filter(group)?;
        }
        for field in self.sort_fields()? {
            spec = spec.with_sort_field(field);
        }
        Ok(spec.with_paging(self.skip(), self.limit()))
    }
}

fn parse_condition(key: &str, value: Value) -> SpecResult<FilterCondition> {
    const SUFFIXES: [(&str, FilterOperator); 6] = [
        (">=", FilterOperator::GreaterOrEqual),
        ("<=", FilterOperator::LessOrEqual),
        (">", FilterOperator::GreaterThan),
        ("<", FilterOperator::LessThan),
        ("!", FilterOperator::NotEquals),
        ("~", FilterOperator::Contains),
    ];

    let (path, operator) = SUFFIXES
        .iter()
        .find_map(|(suffix, op)| key.strip_suffix(*suffix).map(|path| (path, *op)))
        .unwrap_or((key, FilterOperator::Equals));

    let condition = match (operator, &value) {
        (FilterOperator::Equals, Value::Null) => FilterCondition::new(path, FilterOperator::IsNull),
        (FilterOperator::NotEquals, Value::Null) => {
            FilterCondition::new(path, FilterOperator::IsNotNull)
        }
        (FilterOperator::Equals, Value::List(_)) => {
            FilterCondition::compare(path, FilterOperator::In, value)
        }
        (FilterOperator::NotEquals, Value::List(_)) => {
            FilterCondition::compare(path, FilterOperator::NotIn, value)
        }
        (FilterOperator::Contains, _) => {
            FilterCondition::compare(path, operator, value).ignore_case()
        }
        _ => FilterCondition::compare(path, operator, value),
    };
    condition.validate()?;
    Ok(condition)
}

/// Paginated response structure
///
/// This structure wraps paginated data with metadata about pagination state.
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    /// The paginated data
    pub data: Vec<T>,

    /// Pagination metadata
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginationMeta {
    /// Current page number (starts at 1)
    pub page: usize,

    /// Number of items per page
    pub limit: usize,

    /// Total number of items (after filters)
    pub total: usize,

    /// Total number of pages
    pub total_pages: usize,

    /// Whether there is a next page
    pub has_next: bool,

    /// Whether there is a previous page
    pub has_prev: bool,
}

impl PaginationMeta {
    /// Create pagination metadata from calculation
    pub fn new(page: usize, limit: usize, total: usize) -> Self {
        // Ensure limit is at least 1 to avoid division by zero
        let limit = limit.max(1);
        let page = page.max(1);
        let total_pages = if total == 0 { 0 } else { total.div_ceil(limit) };
        let start = (page - 1).saturating_mul(limit);

        Self {
            page,
            limit,
            total,
            total_pages,
            has_next: start.saturating_add(limit) < total,
            has_prev: page > 1,
        }
    }
}
