//! Structured filter and sort data
//!
//! [`FilterGroup`] trees describe conditions as plain data (for example
//! parsed from a request) instead of a prebuilt predicate. They are lowered
//! into a [`Predicate`](crate::specification::Predicate) by [`lower`].

pub mod lower;

use crate::core::{SpecError, SpecResult, Value};
use crate::expr::Lambda;
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};
use std::sync::OnceLock;

/// Comparison applied by a single condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperator {
    Equals,
    NotEquals,
    Contains,
    StartsWith,
    EndsWith,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    In,
    NotIn,
    IsNull,
    IsNotNull,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// A single comparison
///
/// For `Custom`, the `custom_predicate` fragment is used and
/// `property_path` is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterCondition {
    #[serde(default)]
    pub property_path: String,
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(
        default,
        skip_deserializing,
        serialize_with = "serialize_lambda",
        skip_serializing_if = "Option::is_none"
    )]
    pub custom_predicate: Option<Lambda>,
    #[serde(default)]
    pub case_insensitive: bool,
}

impl FilterCondition {
    pub fn new(property_path: impl Into<String>, operator: FilterOperator) -> Self {
        Self {
            property_path: property_path.into(),
            operator,
            value: None,
            custom_predicate: None,
            case_insensitive: false,
        }
    }

    /// Condition comparing a property against a value
    pub fn compare(
        property_path: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<Value>,
    ) -> Self {
        Self::new(property_path, operator).with_value(value)
    }

    pub fn equals(property_path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(property_path, FilterOperator::Equals, value)
    }

    /// Condition backed by a predicate fragment over the entity
    pub fn custom(predicate: Lambda) -> Self {
        Self {
            custom_predicate: Some(predicate),
            ..Self::new(String::new(), FilterOperator::Custom)
        }
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn ignore_case(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    /// Check the condition's invariants
    pub fn validate(&self) -> SpecResult<()> {
        if self.operator == FilterOperator::Custom {
            if self.custom_predicate.is_none() {
                return Err(SpecError::invalid(
                    "custom_predicate",
                    "a Custom condition requires a predicate",
                ));
            }
            return Ok(());
        }

        validate_property_path(&self.property_path)?;

        match self.operator {
            FilterOperator::In | FilterOperator::NotIn => match &self.value {
                Some(Value::List(_)) => Ok(()),
                _ => Err(SpecError::invalid(
                    self.property_path.clone(),
                    "In/NotIn conditions require a list value",
                )),
            },
            FilterOperator::Contains | FilterOperator::StartsWith | FilterOperator::EndsWith => {
                match &self.value {
                    Some(Value::String(_)) => Ok(()),
                    _ => Err(SpecError::invalid(
                        self.property_path.clone(),
                        "string conditions require a string value",
                    )),
                }
            }
            _ => Ok(()),
        }
    }
}

/// A boolean group of conditions and nested groups
///
/// An empty group is always true.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterGroup {
    #[serde(default)]
    pub operator: LogicalOperator,
    #[serde(default)]
    pub conditions: Vec<FilterCondition>,
    #[serde(default)]
    pub subgroups: Vec<FilterGroup>,
}

impl FilterGroup {
    pub fn new(operator: LogicalOperator) -> Self {
        Self {
            operator,
            conditions: Vec::new(),
            subgroups: Vec::new(),
        }
    }

    pub fn and() -> Self {
        Self::new(LogicalOperator::And)
    }

    pub fn or() -> Self {
        Self::new(LogicalOperator::Or)
    }

    pub fn with_condition(mut self, condition: FilterCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_subgroup(mut self, group: FilterGroup) -> Self {
        self.subgroups.push(group);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.subgroups.is_empty()
    }

    /// Validate every condition in the tree
    pub fn validate(&self) -> SpecResult<()> {
        for condition in &self.conditions {
            condition.validate()?;
        }
        for group in &self.subgroups {
            group.validate()?;
        }
        Ok(())
    }
}

/// What a sort field orders by
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SortTarget {
    Property(String),
    #[serde(skip_deserializing, serialize_with = "serialize_expression_target")]
    Expression(Lambda),
}

/// One ordering key; fields apply in ascending `order`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortField {
    pub target: SortTarget,
    #[serde(default)]
    pub direction: SortDirection,
    #[serde(default)]
    pub order: i32,
}

impl SortField {
    pub fn property(path: impl Into<String>, direction: SortDirection, order: i32) -> Self {
        Self {
            target: SortTarget::Property(path.into()),
            direction,
            order,
        }
    }

    pub fn expression(lambda: Lambda, direction: SortDirection, order: i32) -> Self {
        Self {
            target: SortTarget::Expression(lambda),
            direction,
            order,
        }
    }
}

/// Sort fields in application order; ties keep their relative position
pub fn ordered_sort_fields(fields: &[SortField]) -> Vec<&SortField> {
    let mut ordered: Vec<&SortField> = fields.iter().collect();
    ordered.sort_by_key(|field| field.order);
    ordered
}

/// Reject property paths that are not dotted identifiers
///
/// Paths end up as column names in generated SQL, so anything else is refused.
pub fn validate_property_path(path: &str) -> SpecResult<()> {
    static PATH_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = PATH_REGEX.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
            .expect("property path pattern is valid")
    });

    if path.is_empty() {
        return Err(SpecError::invalid("property_path", "must not be empty"));
    }
    if !regex.is_match(path) {
        return Err(SpecError::invalid(
            path,
            "property paths must be dotted identifiers",
        ));
    }
    Ok(())
}

fn serialize_lambda<S: Serializer>(lambda: &Option<Lambda>, serializer: S) -> Result<S::Ok, S::Error> {
    match lambda {
        Some(lambda) => serializer.serialize_str(&lambda.to_string()),
        None => serializer.serialize_none(),
    }
}

fn serialize_expression_target<S: Serializer>(
    lambda: &Lambda,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_newtype_variant("SortTarget", 1, "Expression", &lambda.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_requires_predicate() {
        let condition = FilterCondition::new("ignored", FilterOperator::Custom);
        assert!(matches!(
            condition.validate(),
            Err(SpecError::InvalidArgument { .. })
        ));

        let condition = FilterCondition::custom(Lambda::new(|x| x.field("a").equals(1)));
        assert!(condition.validate().is_ok());
    }

    #[test]
    fn test_in_requires_list() {
        let condition = FilterCondition::compare("status", FilterOperator::In, "Active");
        assert!(condition.validate().is_err());

        let condition = FilterCondition::compare("status", FilterOperator::In, vec!["Active"]);
        assert!(condition.validate().is_ok());
    }

    #[test]
    fn test_property_path_validation() {
        assert!(validate_property_path("customer.name").is_ok());
        assert!(validate_property_path("_id").is_ok());
        assert!(validate_property_path("").is_err());
        assert!(validate_property_path("name; DROP TABLE users").is_err());
        assert!(validate_property_path("a..b").is_err());
    }

    #[test]
    fn test_sort_fields_are_stable_by_order() {
        let fields = vec![
            SortField::property("c", SortDirection::Ascending, 2),
            SortField::property("a", SortDirection::Ascending, 1),
            SortField::property("b", SortDirection::Descending, 1),
        ];
        let ordered: Vec<_> = ordered_sort_fields(&fields)
            .into_iter()
            .map(|f| match &f.target {
                SortTarget::Property(p) => p.clone(),
                SortTarget::Expression(_) => unreachable!(),
            })
            .collect();
        assert_eq!(ordered, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_group_deserializes_from_json() {
        let group: FilterGroup = serde_json::from_value(serde_json::json!({
            "operator": "Or",
            "conditions": [
                { "property_path": "status", "operator": "Equals", "value": "Active" },
                { "property_path": "status", "operator": "Equals", "value": "Draft" }
            ]
        }))
        .expect("group should deserialize");
        assert_eq!(group.operator, LogicalOperator::Or);
        assert_eq!(group.conditions.len(), 2);
        assert!(group.subgroups.is_empty());
    }

    #[test]
    fn test_custom_predicate_serializes_as_text() {
        let condition = FilterCondition::custom(Lambda::new(|x| x.field("a").equals(1)));
        let json = serde_json::to_value(&condition).expect("condition should serialize");
        assert_eq!(json["custom_predicate"], "x => (x.a == 1)");
    }
}
