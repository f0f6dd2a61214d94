//! In-memory evaluation of a whole specification
//!
//! [`CompiledQuery`] is the compiled transformer the artifact cache stores:
//! criteria compiled to a closure, ordering resolved to key extractors and
//! paging captured. Building it is the expensive part; applying it to a
//! sequence is a filter, a stable sort and an optional skip/take.

use super::{Criteria, FunctionPredicate, Specification};
use crate::core::{Queryable, SpecResult, Value};
use crate::expr::compile::CompiledExpr;
use crate::filter::{SortDirection, SortTarget, ordered_sort_fields, validate_property_path};
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;

enum Filter<T> {
    All,
    Compiled(CompiledExpr<T>),
    Function(FunctionPredicate<T>),
}

enum SortKey<T> {
    Property(String),
    Expression(CompiledExpr<T>),
}

struct Comparator<T> {
    key: SortKey<T>,
    descending: bool,
}

impl<T: Queryable> Comparator<T> {
    fn property(path: &str, descending: bool) -> SpecResult<Self> {
        validate_property_path(path)?;
        Ok(Self {
            key: SortKey::Property(path.to_string()),
            descending,
        })
    }

    fn key_of(&self, entity: &T) -> Value {
        match &self.key {
            SortKey::Property(path) => entity.field_value(path).unwrap_or(Value::Null),
            SortKey::Expression(compiled) => compiled.evaluate(entity),
        }
    }

    fn compare(&self, left: &T, right: &T) -> Ordering {
        let ordering = self.key_of(left).sort_cmp(&self.key_of(right));
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

/// A specification compiled for in-memory sequences
pub struct CompiledQuery<T> {
    filter: Filter<T>,
    comparators: Vec<Comparator<T>>,
    paging: Option<(usize, usize)>,
}

impl<T: Queryable> CompiledQuery<T> {
    /// Compile criteria, ordering and paging
    ///
    /// Ordering is `order_by` (or `order_by_descending`), then the `then_by`
    /// clauses, then the sort fields in ascending `order`.
    pub fn build<S: Specification<T> + ?Sized>(spec: &S) -> SpecResult<Self> {
        let filter = match spec.criteria() {
            None => Filter::All,
            Some(Criteria::Expression(predicate)) => Filter::Compiled(predicate.compile()?),
            Some(Criteria::Function(function)) => Filter::Function(function.clone()),
        };

        let mut comparators = Vec::new();
        if let Some(path) = spec.order_by() {
            comparators.push(Comparator::property(path, false)?);
        }
        if let Some(path) = spec.order_by_descending() {
            comparators.push(Comparator::property(path, true)?);
        }
        for clause in spec.then_by() {
            comparators.push(Comparator::property(&clause.path, clause.descending)?);
        }
        for field in ordered_sort_fields(spec.sort_fields()) {
            let descending = field.direction == SortDirection::Descending;
            let comparator = match &field.target {
                SortTarget::Property(path) => Comparator::property(path, descending)?,
                SortTarget::Expression(lambda) => Comparator {
                    key: SortKey::Expression(CompiledExpr::compile(lambda)?),
                    descending,
                },
            };
            comparators.push(comparator);
        }

        let paging = match (spec.skip(), spec.take()) {
            (Some(skip), Some(take)) => Some((skip, take)),
            _ => None,
        };

        Ok(Self {
            filter,
            comparators,
            paging,
        })
    }

    /// Whether a single entity passes the criteria
    pub fn matches(&self, entity: &T) -> SpecResult<bool> {
        match &self.filter {
            Filter::All => Ok(true),
            Filter::Compiled(compiled) => Ok(compiled.matches(entity)),
            Filter::Function(function) => function.evaluate(entity),
        }
    }

    /// Filter, order and page owned entities
    pub fn apply(&self, items: Vec<T>) -> SpecResult<Vec<T>> {
        self.run(items)
    }

    /// Filter, order and page borrowed entities
    pub fn select<'a>(&self, items: impl IntoIterator<Item = &'a T>) -> SpecResult<Vec<&'a T>> {
        self.run(items.into_iter().collect())
    }

    /// Number of matching entities, ignoring paging
    pub fn count<'a>(&self, items: impl IntoIterator<Item = &'a T>) -> SpecResult<usize> {
        let mut count = 0;
        for item in items {
            if self.matches(item)? {
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn is_paging_enabled(&self) -> bool {
        self.paging.is_some()
    }

    fn run<I: Borrow<T>>(&self, items: Vec<I>) -> SpecResult<Vec<I>> {
        let mut selected = Vec::with_capacity(items.len());
        for item in items {
            if self.matches(<I as Borrow<T>>::borrow(&item))? {
                selected.push(item);
            }
        }

        if !self.comparators.is_empty() {
            // sort_by is stable, so equal keys keep their input order
            selected.sort_by(|left, right| {
                self.comparators
                    .iter()
                    .map(|c| c.compare(<I as Borrow<T>>::borrow(left), <I as Borrow<T>>::borrow(right)))
                    .find(|ordering| ordering.is_ne())
                    .unwrap_or(Ordering::Equal)
            });
        }

        Ok(match self.paging {
            Some((skip, take)) => selected.into_iter().skip(skip).take(take).collect(),
            None => selected,
        })
    }
}

impl<T> fmt::Debug for CompiledQuery<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledQuery")
            .field("comparators", &self.comparators.len())
            .field("paging", &self.paging)
            .finish_non_exhaustive()
    }
}
