//! End-to-end scenarios: one specification realized in memory and as text

mod common;

use common::*;
use this_spec::prelude::*;

#[test]
fn test_null_handling_scenario() {
    let spec = BaseSpecification::<Customer>::matching(|c| c.field("email").not_equals(lit(Value::Null)));

    let missing = Customer::new(1, "Ann", "Active").without_email();
    let present = Customer {
        email: Some("a@b.com".to_string()),
        ..Customer::new(2, "Ben", "Active")
    };
    assert!(!spec.is_satisfied_by(&missing).unwrap());
    assert!(spec.is_satisfied_by(&present).unwrap());

    let text = SqlTranslator::default().translate_specification(&spec).unwrap();
    assert_eq!(text.sql, "SELECT * FROM customers WHERE email IS NOT NULL");
    assert!(text.parameters.is_empty());
}

#[test]
fn test_null_handling_through_filter_condition() {
    let spec = AdvancedSpecification::<Customer>::new()
        .with_filter(FilterGroup::and().with_condition(FilterCondition::new("email", FilterOperator::IsNotNull)))
        .unwrap();
    let query = CompiledQuery::build(&spec).unwrap();
    let ids: Vec<_> = query.apply(customers()).unwrap().iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 5, 6, 7, 9, 10, 11]);
}

#[test]
fn test_nested_group_scenario() {
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

    let data = customers();
    let expected: Vec<i64> = data
        .iter()
        .filter(|c| (c.status == "Active" || c.status == "Draft") && c.is_active)
        .map(|c| c.id)
        .collect();
    let actual: Vec<i64> = CompiledQuery::build(&spec)
        .unwrap()
        .select(&data)
        .unwrap()
        .iter()
        .map(|c| c.id)
        .collect();

    assert_eq!(actual, expected);
    assert_eq!(actual, vec![1, 3, 4, 6, 7, 9, 12]);
}

#[test]
fn test_paging_determinism_scenario() {
    let spec = BaseSpecification::<Customer>::new()
        .with_order_by("id")
        .with_paging(4, 3);
    let query = CompiledQuery::build(&spec).unwrap();

    let mut shuffled = customers();
    shuffled.reverse();
    shuffled.swap(0, 5);

    let first: Vec<_> = query.apply(customers()).unwrap().iter().map(|c| c.id).collect();
    let second: Vec<_> = query.apply(shuffled).unwrap().iter().map(|c| c.id).collect();
    assert_eq!(first, vec![5, 6, 7]);
    assert_eq!(first, second);
}

#[test]
fn test_sort_fields_order_by_priority() {
    let spec = AdvancedSpecification::<Customer>::new()
        .with_sort_field(SortField::property("id", SortDirection::Descending, 1))
        .with_sort_field(SortField::property("status", SortDirection::Ascending, 0));
    let ids: Vec<_> = CompiledQuery::build(&spec)
        .unwrap()
        .apply(customers())
        .unwrap()
        .iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(ids, vec![12, 9, 6, 3, 11, 8, 5, 2, 10, 7, 4, 1]);

    let text = SqlTranslator::default().translate_specification(&spec).unwrap();
    assert_eq!(text.sql, "SELECT * FROM customers ORDER BY status ASC, id DESC");
}

#[test]
fn test_nested_specification_applies_to_related_rows() {
    let nested = NestedSpecification::new()
        .with_filter(FilterGroup::and().with_condition(FilterCondition::compare(
            "total",
            FilterOperator::GreaterThan,
            30.0,
        )))
        .with_sort_field(SortField::property("total", SortDirection::Descending, 0))
        .with_paging(0, 2);
    let ids: Vec<_> = nested.apply(orders(6)).unwrap().iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![6, 5]);
}
