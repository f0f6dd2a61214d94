//! Integration tests for specification combinators
//!
//! These tests verify that:
//! - AND / OR / NOT agree with the boolean operators on every entity
//! - Combining never changes the operands
//! - Parameters are rebound so the combined tree has a single variable
//! - Includes, ordering and paging merge as documented

mod common;

use common::*;
use std::sync::Arc;
use this_spec::prelude::*;
use this_spec::specification::IncludePath;
use this_spec::specification::combinator;

fn adults() -> BaseSpecification<Customer> {
    BaseSpecification::matching(|c| c.field("age").greater_or_equal(40))
}

fn reachable() -> BaseSpecification<Customer> {
    BaseSpecification::matching(|c| c.field("email").is_not_null())
}

fn holds<S: Specification<Customer>>(spec: &S, customer: &Customer) -> bool {
    spec.is_satisfied_by(customer).unwrap()
}

// =============================================================================
// Boolean correctness
// =============================================================================

mod correctness_tests {
    use super::*;

    #[test]
    fn test_and_matches_conjunction_for_every_entity() {
        let (a, b) = (adults(), reachable());
        let combined = a.and(&b);
        for customer in customers() {
            assert_eq!(
                holds(&combined, &customer),
                holds(&a, &customer) && holds(&b, &customer),
                "customer {}",
                customer.id
            );
        }
    }

    #[test]
    fn test_or_matches_disjunction_for_every_entity() {
        let (a, b) = (adults(), reachable());
        let combined = a.or(&b);
        for customer in customers() {
            assert_eq!(
                holds(&combined, &customer),
                holds(&a, &customer) || holds(&b, &customer)
            );
        }
    }

    #[test]
    fn test_not_matches_negation_for_every_entity() {
        let a = adults();
        let negated = a.not();
        for customer in customers() {
            assert_eq!(holds(&negated, &customer), !holds(&a, &customer));
        }
    }

    #[test]
    fn test_mixed_function_and_expression() {
        let active = BaseSpecification::<Customer>::new()
            .with_function("active", |c: &Customer| c.is_active);
        let combined = adults().and(&active);
        assert!(!combined.criteria().unwrap().is_translatable());
        for customer in customers() {
            assert_eq!(
                holds(&combined, &customer),
                customer.age >= 40 && customer.is_active
            );
        }
    }

    #[test]
    fn test_missing_criteria_behaves_as_always_true() {
        let everything = BaseSpecification::<Customer>::new();
        let a = adults();

        let conjunction = everything.and(&a);
        assert_eq!(
            conjunction.criteria().unwrap().canonical_text(),
            a.criteria().unwrap().canonical_text()
        );

        let disjunction = everything.or(&a);
        assert!(disjunction.criteria().is_none());
        assert!(customers().iter().all(|c| holds(&disjunction, c)));

        let negated = everything.not();
        assert!(customers().iter().all(|c| !holds(&negated, c)));
    }
}

// =============================================================================
// Rebinding and non-mutation
// =============================================================================

mod rebinding_tests {
    use super::*;

    #[test]
    fn test_combined_tree_uses_one_parameter() {
        let combined = adults().and(&reachable());
        let predicate = combined.criteria().unwrap().as_expression().unwrap();
        assert_eq!(
            predicate.to_string(),
            "x => ((x.age >= 40) && (x.email != null))"
        );
        let referenced = this_spec::expr::rewrite::referenced_parameters(predicate.body());
        assert_eq!(referenced.len(), 1);
        assert_eq!(referenced[0], *predicate.parameter());
    }

    #[test]
    fn test_operands_are_unchanged() {
        let (a, b) = (adults(), reachable());
        let a_text = a.criteria().unwrap().canonical_text();
        let b_text = b.criteria().unwrap().canonical_text();
        let a_parameter = a.criteria().unwrap().as_expression().unwrap().parameter().clone();

        let _ = a.and(&b);
        let _ = a.or(&b);
        let _ = b.not();

        assert_eq!(a.criteria().unwrap().canonical_text(), a_text);
        assert_eq!(b.criteria().unwrap().canonical_text(), b_text);
        assert_eq!(
            *a.criteria().unwrap().as_expression().unwrap().parameter(),
            a_parameter
        );
    }

    #[test]
    fn test_combined_text_is_deterministic() {
        let first = adults().and(&reachable());
        let second = adults().and(&reachable());
        assert_eq!(
            first.criteria().unwrap().canonical_text(),
            second.criteria().unwrap().canonical_text()
        );
    }

    #[test]
    fn test_combined_spec_translates() {
        let combined = adults().and(&reachable().not());
        let text = SqlTranslator::default()
            .translate_specification(&combined)
            .unwrap();
        assert_eq!(
            text.sql,
            "SELECT * FROM customers WHERE (age >= @p0 AND NOT (email IS NOT NULL))"
        );
    }
}

// =============================================================================
// Side-effect merging
// =============================================================================

mod merge_tests {
    use super::*;

    #[test]
    fn test_shared_includes_are_deduplicated_by_identity() {
        let orders = IncludePath::new("orders");
        let a = adults()
            .with_shared_include(orders.clone())
            .with_include("address");
        let b = reachable().with_shared_include(orders.clone());

        let combined = a.and(&b);
        let paths: Vec<_> = combined.includes().iter().map(|i| i.path()).collect();
        assert_eq!(paths, vec!["orders", "address"]);
        assert!(Arc::ptr_eq(&combined.includes()[0], &orders));
    }

    #[test]
    fn test_include_strings_are_deduplicated_by_value() {
        let a = adults().with_include_string("orders.lines");
        let b = reachable()
            .with_include_string("orders.lines")
            .with_include_string("profile");
        let combined = a.or(&b);
        assert_eq!(combined.include_strings(), ["orders.lines", "profile"]);
    }

    #[test]
    fn test_first_ordering_and_paging_win() {
        let a = adults().with_order_by("name").with_take(5);
        let b = reachable()
            .with_order_by("age")
            .with_then_by("id")
            .with_paging(10, 20);
        let combined = combinator::and(&a, &b);
        assert_eq!(combined.order_by(), Some("name"));
        assert_eq!(combined.take(), Some(5));
        assert_eq!(combined.skip(), Some(10));
        assert!(combined.is_paging_enabled());
        assert!(combined.then_by().is_empty());
    }

    #[test]
    fn test_then_by_follows_the_primary_ordering() {
        let a = adults();
        let b = reachable().with_order_by("age").with_then_by_descending("id");
        let combined = a.and(&b);
        assert_eq!(combined.order_by(), Some("age"));
        assert_eq!(combined.then_by().len(), 1);
        assert!(combined.then_by()[0].descending);
    }

    #[test]
    fn test_not_keeps_side_effects() {
        let a = adults().with_include("orders").with_order_by_descending("age");
        let negated = a.not();
        assert_eq!(negated.includes().len(), 1);
        assert_eq!(negated.order_by_descending(), Some("age"));
    }
}
