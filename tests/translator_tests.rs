//! Integration tests for SQL lowering
//!
//! These tests verify that:
//! - Values never appear in the emitted text, only as parameters
//! - Clause shapes match the documented forms
//! - Ordering and paging follow the dialect
//! - Untranslatable specifications fail with a typed error

mod common;

use common::*;
use this_spec::prelude::*;

fn translate(spec: &BaseSpecification<Customer>) -> QueryText {
    SqlTranslator::default().translate_specification(spec).unwrap()
}

// =============================================================================
// Injection safety
// =============================================================================

mod injection_tests {
    use super::*;

    #[test]
    fn test_hostile_values_only_appear_as_parameters() {
        for hostile in hostile_strings() {
            let spec = BaseSpecification::<Customer>::matching(|c| {
                c.field("name")
                    .equals(hostile)
                    .or(c.field("email").starts_with(hostile))
                    .or(c.field("status").contains_ignore_case(hostile))
            });
            let text = translate(&spec);
            assert!(!text.sql.contains(hostile), "{} leaked into {}", hostile, text.sql);
            assert!(!text.sql.contains('"'));
            assert_eq!(text.parameters.len(), 3);
            assert_eq!(text.parameters["p0"], Value::from(hostile));
        }
    }

    #[test]
    fn test_hostile_membership_values_are_bound() {
        let values: Vec<&str> = hostile_strings();
        let spec = BaseSpecification::<Customer>::matching(|c| {
            c.field("status").is_in(captured("statuses", values.clone()))
        });
        let text = translate(&spec);
        for hostile in &values {
            assert!(!text.sql.contains(hostile));
        }
        assert_eq!(text.parameters.len(), values.len());
    }

    #[test]
    fn test_invalid_order_path_is_rejected() {
        let spec = BaseSpecification::<Customer>::new().with_order_by("name; DROP TABLE customers");
        let err = SqlTranslator::default()
            .translate_specification(&spec)
            .unwrap_err();
        assert!(matches!(err, SpecError::InvalidArgument { .. }));
    }
}

// =============================================================================
// Clause shapes
// =============================================================================

mod shape_tests {
    use super::*;

    #[test]
    fn test_equality_round_trip() {
        let spec = BaseSpecification::<Customer>::matching(|c| c.field("status").equals("test"));
        let text = translate(&spec);
        assert_eq!(text.sql, "SELECT * FROM customers WHERE status = @p0");
        assert_eq!(text.parameters["p0"], Value::from("test"));
    }

    #[test]
    fn test_case_insensitive_contains() {
        let spec =
            BaseSpecification::<Customer>::matching(|c| c.field("name").contains_ignore_case("x"));
        let text = translate(&spec);
        assert_eq!(
            text.sql,
            "SELECT * FROM customers WHERE LOWER(full_name) LIKE LOWER(@p0) ESCAPE '!'"
        );
        assert_eq!(text.parameters["p0"], Value::from("%x%"));
    }

    #[test]
    fn test_no_criteria_has_no_where() {
        let text = translate(&BaseSpecification::new());
        assert_eq!(text.sql, "SELECT * FROM customers");
        assert!(text.parameters.is_empty());
    }

    #[test]
    fn test_constant_criteria() {
        let everything = BaseSpecification::<Customer>::new();
        let nothing = everything.not();
        assert_eq!(translate(&nothing).sql, "SELECT * FROM customers WHERE 1 = 0");
    }

    #[test]
    fn test_filter_group_lowering_translates() {
        let group = FilterGroup::and()
            .with_condition(FilterCondition::equals("is_active", true))
            .with_subgroup(
                FilterGroup::or()
                    .with_condition(FilterCondition::equals("status", "Active"))
                    .with_condition(FilterCondition::equals("status", "Draft")),
            );
        let spec = AdvancedSpecification::<Customer>::new()
            .with_filter(group)
            .unwrap();
        let text = SqlTranslator::default()
            .translate_specification(&spec)
            .unwrap();
        assert_eq!(
            text.sql,
            "SELECT * FROM customers WHERE (is_active = @p0 AND (status = @p1 OR status = @p2))"
        );
        assert_eq!(text.values().count(), 3);
    }
}

// =============================================================================
// Ordering and paging per dialect
// =============================================================================

mod dialect_tests {
    use super::*;

    fn paged() -> BaseSpecification<Customer> {
        BaseSpecification::matching(|c| c.field("age").greater_than(18))
            .with_order_by("name")
            .with_then_by_descending("age")
            .with_paging(20, 10)
    }

    #[test]
    fn test_generic_limit_offset() {
        let text = translate(&paged());
        assert_eq!(
            text.sql,
            "SELECT * FROM customers WHERE age > @p0 ORDER BY full_name ASC, age DESC LIMIT @p1 OFFSET @p2"
        );
        assert_eq!(text.parameters["p1"], Value::Integer(10));
        assert_eq!(text.parameters["p2"], Value::Integer(20));
    }

    #[test]
    fn test_postgres_positional_placeholders() {
        let text = SqlTranslator::new(SqlDialect::Postgres)
            .translate_specification(&paged())
            .unwrap();
        assert!(text.sql.ends_with("LIMIT $2 OFFSET $3"));
        assert!(text.sql.contains("age > $1"));
    }

    #[test]
    fn test_sql_server_offset_fetch() {
        let text = SqlTranslator::new(SqlDialect::SqlServer)
            .translate_specification(&paged())
            .unwrap();
        assert!(text.sql.ends_with("OFFSET @p1 ROWS FETCH NEXT @p2 ROWS ONLY"));
        assert_eq!(text.parameters["p1"], Value::Integer(20));
    }

    #[test]
    fn test_sql_server_unordered_paging_gets_placeholder_order() {
        let spec = BaseSpecification::<Customer>::new().with_paging(0, 5);
        let text = SqlTranslator::new(SqlDialect::SqlServer)
            .translate_specification(&spec)
            .unwrap();
        assert_eq!(
            text.sql,
            "SELECT * FROM customers ORDER BY (SELECT NULL) OFFSET @p0 ROWS FETCH NEXT @p1 ROWS ONLY"
        );
    }

    #[test]
    fn test_mysql_like_uses_portable_escape() {
        let spec = BaseSpecification::<Customer>::matching(|c| c.field("status").contains("a_c"));
        let text = SqlTranslator::new(SqlDialect::MySql)
            .translate_specification(&spec)
            .unwrap();
        assert_eq!(text.sql, "SELECT * FROM customers WHERE status LIKE ? ESCAPE '!'");
        assert!(!text.sql.contains('\\'));
        assert_eq!(text.parameters["p0"], Value::from("%a!_c%"));
    }

    #[test]
    fn test_mysql_null_or_empty_on_captured_binds_each_placeholder() {
        let spec = BaseSpecification::<Customer>::matching(|_| {
            captured("nickname", "").is_null_or_empty()
        });
        let text = SqlTranslator::new(SqlDialect::MySql)
            .translate_specification(&spec)
            .unwrap();
        assert_eq!(text.sql, "SELECT * FROM customers WHERE (? IS NULL OR ? = '')");
        assert_eq!(text.sql.matches('?').count(), text.parameters.len());
    }

    #[test]
    fn test_null_or_empty_on_column_binds_nothing() {
        let spec = BaseSpecification::<Customer>::matching(|c| c.field("email").is_null_or_empty());
        let text = SqlTranslator::new(SqlDialect::MySql)
            .translate_specification(&spec)
            .unwrap();
        assert_eq!(text.sql, "SELECT * FROM customers WHERE (email IS NULL OR email = '')");
        assert!(text.parameters.is_empty());
    }

    #[test]
    fn test_take_without_skip_does_not_page() {
        let spec = BaseSpecification::<Customer>::new().with_take(5);
        assert_eq!(translate(&spec).sql, "SELECT * FROM customers");
    }
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn test_function_criteria_is_unsupported_specification() {
    let spec = BaseSpecification::<Customer>::new().with_function("rich", |c: &Customer| c.balance > 50.0);
    let err = SqlTranslator::default()
        .translate_specification(&spec)
        .unwrap_err();
    assert!(matches!(err, SpecError::UnsupportedSpecification { .. }));
    assert_eq!(err.error_code(), "UNSUPPORTED_SPECIFICATION");
}

#[test]
fn test_power_is_unsupported_operation() {
    let spec = BaseSpecification::<Customer>::matching(|c| c.field("age").pow(2).greater_than(100));
    let err = SqlTranslator::default()
        .translate_specification(&spec)
        .unwrap_err();
    match err {
        SpecError::UnsupportedOperation { operation } => assert_eq!(operation, "Power"),
        other => panic!("unexpected error: {other}"),
    }
}
