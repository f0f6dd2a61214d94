//! AND / OR / NOT over specifications
//!
//! Combining two expression criteria allocates one fresh parameter, rebinds
//! both operand trees onto it (a tree copy, the operands are never touched)
//! and joins the bodies. Function criteria cannot be rebound, so any
//! combination involving one is combined as closures instead.
//!
//! Missing criteria behave as "always true":
//! `None AND b == b`, `None OR b == None`, `NOT None == false`.

use super::{BaseSpecification, Criteria, FunctionPredicate, Predicate, Specification};
use crate::core::Queryable;
use crate::expr::compile::CompiledExpr;
use crate::expr::{BinaryOperator, Expr, Lambda, Parameter, UnaryOperator};
use std::sync::{Arc, OnceLock};

/// AND two criteria
pub fn and_criteria<T: Queryable>(
    left: Option<&Criteria<T>>,
    right: Option<&Criteria<T>>,
) -> Option<Criteria<T>> {
    match (left, right) {
        (None, None) => None,
        (Some(only), None) | (None, Some(only)) => Some(only.clone()),
        (Some(left), Some(right)) => Some(join(BinaryOperator::AndAlso, left, right)),
    }
}

/// OR two criteria
pub fn or_criteria<T: Queryable>(
    left: Option<&Criteria<T>>,
    right: Option<&Criteria<T>>,
) -> Option<Criteria<T>> {
    match (left, right) {
        (Some(left), Some(right)) => Some(join(BinaryOperator::OrElse, left, right)),
        _ => None,
    }
}

/// Negate a criteria
pub fn not_criteria<T: Queryable>(criteria: Option<&Criteria<T>>) -> Criteria<T> {
    match criteria {
        None => Criteria::Expression(Predicate::new(|_| Expr::from(false))),
        Some(Criteria::Expression(predicate)) => {
            let parameter = Parameter::fresh();
            let body = Expr::Unary {
                op: UnaryOperator::Not,
                operand: Box::new(predicate.lambda().body_rebound_to(&parameter)),
            };
            Criteria::Expression(Predicate::from_lambda(Lambda::from_parts(parameter, body)))
        }
        Some(Criteria::Function(function)) => {
            let inner = function.clone();
            FunctionPredicate::fallible(format!("!({})", inner.label()), move |entity| {
                Ok(!inner.evaluate(entity)?)
            })
            .into()
        }
    }
}

fn join<T: Queryable>(op: BinaryOperator, left: &Criteria<T>, right: &Criteria<T>) -> Criteria<T> {
    if let (Criteria::Expression(left), Criteria::Expression(right)) = (left, right) {
        let parameter = Parameter::fresh();
        let body = Expr::binary(
            op,
            left.lambda().body_rebound_to(&parameter),
            right.lambda().body_rebound_to(&parameter),
        );
        return Criteria::Expression(Predicate::from_lambda(Lambda::from_parts(parameter, body)));
    }

    let label = format!(
        "({} {} {})",
        label_of(left),
        op.symbol(),
        label_of(right)
    );
    let left = as_function(left);
    let right = as_function(right);
    let function = match op {
        BinaryOperator::OrElse => FunctionPredicate::fallible(label, move |entity| {
            Ok(left.evaluate(entity)? || right.evaluate(entity)?)
        }),
        _ => FunctionPredicate::fallible(label, move |entity| {
            Ok(left.evaluate(entity)? && right.evaluate(entity)?)
        }),
    };
    Criteria::Function(function)
}

fn label_of<T>(criteria: &Criteria<T>) -> String {
    match criteria {
        Criteria::Expression(predicate) => predicate.to_string(),
        Criteria::Function(function) => function.label().to_string(),
    }
}

/// View any criteria as a closure; expressions compile on first use
fn as_function<T: Queryable>(criteria: &Criteria<T>) -> FunctionPredicate<T> {
    match criteria {
        Criteria::Function(function) => function.clone(),
        Criteria::Expression(predicate) => {
            let predicate = predicate.clone();
            let compiled: Arc<OnceLock<Option<CompiledExpr<T>>>> = Arc::new(OnceLock::new());
            FunctionPredicate::fallible(predicate.to_string(), move |entity| {
                match compiled.get_or_init(|| predicate.compile().ok()) {
                    Some(compiled) => Ok(compiled.matches(entity)),
                    // Recompile to surface the error to the caller
                    None => predicate.evaluate(entity),
                }
            })
        }
    }
}

/// `a AND b` with the composite side effects applied
pub fn and<T, A, B>(a: &A, b: &B) -> BaseSpecification<T>
where
    T: Queryable,
    A: Specification<T> + ?Sized,
    B: Specification<T> + ?Sized,
{
    merge(a, Some(b), and_criteria(a.criteria(), b.criteria()))
}

/// `a OR b` with the composite side effects applied
pub fn or<T, A, B>(a: &A, b: &B) -> BaseSpecification<T>
where
    T: Queryable,
    A: Specification<T> + ?Sized,
    B: Specification<T> + ?Sized,
{
    merge(a, Some(b), or_criteria(a.criteria(), b.criteria()))
}

/// `NOT a`, keeping everything but the criteria
pub fn not<T, A>(a: &A) -> BaseSpecification<T>
where
    T: Queryable,
    A: Specification<T> + ?Sized,
{
    merge::<T, A, A>(a, None, Some(not_criteria(a.criteria())))
}

fn merge<T, A, B>(a: &A, b: Option<&B>, criteria: Option<Criteria<T>>) -> BaseSpecification<T>
where
    T: Queryable,
    A: Specification<T> + ?Sized,
    B: Specification<T> + ?Sized,
{
    let mut spec = BaseSpecification::new().with_optional_criteria(criteria);

    for include in a.includes().iter().chain(b.map(|b| b.includes()).unwrap_or(&[])) {
        spec = spec.with_shared_include(include.clone());
    }
    for include in a
        .include_strings()
        .iter()
        .chain(b.map(|b| b.include_strings()).unwrap_or(&[]))
    {
        spec = spec.with_include_string(include.clone());
    }

    let order_by = a.order_by().or_else(|| b.and_then(|b| b.order_by()));
    let order_by_descending = a
        .order_by_descending()
        .or_else(|| b.and_then(|b| b.order_by_descending()));
    spec = spec.with_ordering(
        order_by.map(str::to_string),
        order_by_descending.map(str::to_string),
    );

    // Secondary keys follow the operand that supplied the primary ordering
    let then_by = match b {
        Some(b)
            if !has_primary_ordering::<T, _>(a)
                && (has_primary_ordering::<T, _>(b) || a.then_by().is_empty()) =>
        {
            b.then_by().to_vec()
        }
        _ => a.then_by().to_vec(),
    };
    spec = spec.with_then_by_clauses(then_by);

    let skip = a.skip().or_else(|| b.and_then(|b| b.skip()));
    let take = a.take().or_else(|| b.and_then(|b| b.take()));
    spec = spec.with_skip_take(skip, take);

    let mut nested = b
        .map(|b| b.nested_specifications().clone())
        .unwrap_or_default();
    for (property, specification) in a.nested_specifications() {
        nested.insert(property.clone(), specification.clone());
    }
    spec = spec.with_nested_map(nested);

    let sort_fields = match b {
        Some(b) if a.sort_fields().is_empty() => b.sort_fields().to_vec(),
        _ => a.sort_fields().to_vec(),
    };
    spec.with_sort_fields(sort_fields)
}

fn has_primary_ordering<T: Queryable, S: Specification<T> + ?Sized>(spec: &S) -> bool {
    spec.order_by().is_some() || spec.order_by_descending().is_some()
}

/// Combinator methods available on every specification
pub trait SpecificationExt<T: Queryable>: Specification<T> {
    fn and<S: Specification<T> + ?Sized>(&self, other: &S) -> BaseSpecification<T> {
        and(self, other)
    }

    fn or<S: Specification<T> + ?Sized>(&self, other: &S) -> BaseSpecification<T> {
        or(self, other)
    }

    #[allow(clippy::should_implement_trait)]
    fn not(&self) -> BaseSpecification<T> {
        not(self)
    }

    /// Evaluate the criteria against one entity
    fn is_satisfied_by(&self, entity: &T) -> crate::core::SpecResult<bool> {
        match self.criteria() {
            Some(criteria) => criteria.is_satisfied_by(entity),
            None => Ok(true),
        }
    }
}

impl<T: Queryable, S: Specification<T> + ?Sized> SpecificationExt<T> for S {}
