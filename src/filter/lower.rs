//! Lowering of filter groups into predicates
//!
//! Conditions are joined before subgroups, left to right, with the group's
//! logical operator. An empty subgroup lowers to `true`.

use super::{FilterCondition, FilterGroup, FilterOperator, LogicalOperator};
use crate::core::{Queryable, SpecError, SpecResult, Value};
use crate::expr::{Expr, Lambda, Parameter, lit};
use crate::specification::Predicate;

/// Lower a group into a predicate; `None` for an empty root group
pub fn lower_group<T: Queryable>(group: &FilterGroup) -> SpecResult<Option<Predicate<T>>> {
    if group.is_empty() {
        return Ok(None);
    }
    let parameter = Parameter::fresh();
    let body = lower_group_body(group, &parameter)?;
    Ok(Some(Predicate::from_lambda(Lambda::from_parts(parameter, body))))
}

fn lower_group_body(group: &FilterGroup, parameter: &Parameter) -> SpecResult<Expr> {
    let mut parts = Vec::with_capacity(group.conditions.len() + group.subgroups.len());
    for condition in &group.conditions {
        parts.push(lower_condition(condition, parameter)?);
    }
    for subgroup in &group.subgroups {
        parts.push(lower_group_body(subgroup, parameter)?);
    }

    let mut parts = parts.into_iter();
    let Some(first) = parts.next() else {
        return Ok(lit(true));
    };
    Ok(parts.fold(first, |acc, part| match group.operator {
        LogicalOperator::And => acc.and(part),
        LogicalOperator::Or => acc.or(part),
    }))
}

/// Lower a single condition over `parameter`
pub fn lower_condition(condition: &FilterCondition, parameter: &Parameter) -> SpecResult<Expr> {
    condition.validate()?;

    if condition.operator == FilterOperator::Custom {
        // validate() guarantees the predicate is present
        return condition
            .custom_predicate
            .as_ref()
            .map(|lambda| lambda.body_rebound_to(parameter))
            .ok_or_else(|| SpecError::invalid("custom_predicate", "missing"));
    }

    let field = parameter.field(&condition.property_path);
    let value = condition.value.clone().filter(|v| !v.is_null());
    let folded = |field: Expr, value: Value| -> (Expr, Value) {
        match (condition.case_insensitive, value) {
            (true, Value::String(s)) => (field.to_lower(), Value::String(s.to_lowercase())),
            (_, value) => (field, value),
        }
    };

    let expr = match condition.operator {
        FilterOperator::Equals => match value {
            None => field.is_null(),
            Some(value) => {
                let (field, value) = folded(field, value);
                field.equals(value)
            }
        },
        FilterOperator::NotEquals => match value {
            None => field.is_not_null(),
            Some(value) => {
                let (field, value) = folded(field, value);
                field.not_equals(value)
            }
        },
        FilterOperator::Contains => {
            let term = required(condition, value)?;
            if condition.case_insensitive {
                field.contains_ignore_case(term)
            } else {
                field.contains(term)
            }
        }
        FilterOperator::StartsWith => {
            let term = required(condition, value)?;
            if condition.case_insensitive {
                field.starts_with_ignore_case(term)
            } else {
                field.starts_with(term)
            }
        }
        FilterOperator::EndsWith => {
            let term = required(condition, value)?;
            if condition.case_insensitive {
                field.ends_with_ignore_case(term)
            } else {
                field.ends_with(term)
            }
        }
        FilterOperator::GreaterThan => field.greater_than(required(condition, value)?),
        FilterOperator::GreaterOrEqual => field.greater_or_equal(required(condition, value)?),
        FilterOperator::LessThan => field.less_than(required(condition, value)?),
        FilterOperator::LessOrEqual => field.less_or_equal(required(condition, value)?),
        FilterOperator::In => field.is_in(required(condition, value)?),
        FilterOperator::NotIn => field.is_in(required(condition, value)?).not(),
        FilterOperator::IsNull => field.is_null(),
        FilterOperator::IsNotNull => field.is_not_null(),
        FilterOperator::Custom => {
            return Err(SpecError::invalid("custom_predicate", "missing"));
        }
    };
    Ok(expr)
}

fn required(condition: &FilterCondition, value: Option<Value>) -> SpecResult<Value> {
    value.ok_or_else(|| {
        SpecError::invalid(
            condition.property_path.clone(),
            format!("{:?} requires a value", condition.operator),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct Ticket {
        status: String,
        is_active: bool,
        priority: i64,
        assignee: Option<String>,
    }

    crate::impl_queryable!(Ticket, "tickets", { status, is_active, priority, assignee });

    fn ticket(status: &str, is_active: bool) -> Ticket {
        Ticket {
            status: status.to_string(),
            is_active,
            priority: 1,
            assignee: None,
        }
    }

    #[test]
    fn test_empty_group_is_always_true() {
        assert!(lower_group::<Ticket>(&FilterGroup::and()).unwrap().is_none());

        let group = FilterGroup::or()
            .with_condition(FilterCondition::equals("status", "Closed"))
            .with_subgroup(FilterGroup::and());
        let predicate = lower_group::<Ticket>(&group).unwrap().unwrap();
        assert!(predicate.evaluate(&ticket("Open", false)).unwrap());
    }

    #[test]
    fn test_nested_group_scenario() {
        let statuses = FilterGroup::or()
            .with_condition(FilterCondition::equals("status", "Active"))
            .with_condition(FilterCondition::equals("status", "Draft"));
        let group = FilterGroup::and()
            .with_condition(FilterCondition::equals("is_active", true))
            .with_subgroup(statuses);
        let predicate = lower_group::<Ticket>(&group).unwrap().unwrap();

        let cases = [
            ("Active", true, true),
            ("Draft", true, true),
            ("Closed", true, false),
            ("Active", false, false),
            ("Draft", false, false),
        ];
        for (status, active, expected) in cases {
            assert_eq!(
                predicate.evaluate(&ticket(status, active)).unwrap(),
                expected,
                "status={} active={}",
                status,
                active
            );
        }
    }

    #[test]
    fn test_equals_without_value_is_null_check() {
        let group = FilterGroup::and().with_condition(FilterCondition::new("assignee", FilterOperator::Equals));
        let predicate = lower_group::<Ticket>(&group).unwrap().unwrap();
        assert_eq!(predicate.to_string(), "x => (x.assignee == null)");
        assert!(predicate.evaluate(&ticket("Open", true)).unwrap());
    }

    #[test]
    fn test_case_insensitive_equals() {
        let group = FilterGroup::and()
            .with_condition(FilterCondition::equals("status", "ACTIVE").ignore_case());
        let predicate = lower_group::<Ticket>(&group).unwrap().unwrap();
        assert!(predicate.evaluate(&ticket("Active", true)).unwrap());
    }

    #[test]
    fn test_not_in() {
        let group = FilterGroup::and().with_condition(FilterCondition::compare(
            "priority",
            FilterOperator::NotIn,
            vec![2, 3],
        ));
        let predicate = lower_group::<Ticket>(&group).unwrap().unwrap();
        assert!(predicate.evaluate(&ticket("Open", true)).unwrap());
    }

    #[test]
    fn test_custom_condition_is_rebound() {
        let custom = Lambda::new(|t| t.field("priority").greater_than(0));
        let group = FilterGroup::and()
            .with_condition(FilterCondition::equals("is_active", true))
            .with_condition(FilterCondition::custom(custom));
        let predicate = lower_group::<Ticket>(&group).unwrap().unwrap();
        let params = crate::expr::rewrite::referenced_parameters(predicate.body());
        assert_eq!(params, vec![predicate.parameter().clone()]);
        assert!(predicate.evaluate(&ticket("Open", true)).unwrap());
    }

    #[test]
    fn test_missing_comparison_value_is_rejected() {
        let group = FilterGroup::and().with_condition(FilterCondition::new("priority", FilterOperator::GreaterThan));
        assert!(matches!(
            lower_group::<Ticket>(&group),
            Err(SpecError::InvalidArgument { .. })
        ));
    }
}
