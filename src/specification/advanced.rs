//! Specifications built from structured filter data
//!
//! An [`AdvancedSpecification`] wraps a base specification and adds a
//! [`FilterGroup`] root. The group is lowered when it is set, and the
//! effective criteria is `base criteria AND lowered group`.

use super::combinator::and_criteria;
use super::{
    BaseSpecification, Criteria, IncludePath, NestedSpecification, OrderClause, Predicate,
    Specification,
};
use crate::core::{Queryable, SpecResult};
use crate::filter::lower::lower_group;
use crate::filter::{FilterGroup, SortField};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub struct AdvancedSpecification<T> {
    base: BaseSpecification<T>,
    base_criteria: Option<Criteria<T>>,
    filter: Option<FilterGroup>,
    lowered: Option<Predicate<T>>,
    effective: Option<Criteria<T>>,
}

impl<T: Queryable> AdvancedSpecification<T> {
    pub fn new() -> Self {
        Self::from_base(BaseSpecification::new())
    }

    /// Start from an existing specification; its criteria become the base criteria
    pub fn from_base(base: BaseSpecification<T>) -> Self {
        let base_criteria = base.criteria().cloned();
        Self {
            effective: base_criteria.clone(),
            base,
            base_criteria,
            filter: None,
            lowered: None,
        }
    }

    /// Set the filter root, validating and lowering it
    pub fn with_filter(mut self, group: FilterGroup) -> SpecResult<Self> {
        group.validate()?;
        self.lowered = lower_group::<T>(&group)?;
        self.filter = Some(group);
        self.recompute();
        Ok(self)
    }

    pub fn with_criteria(mut self, criteria: impl Into<Criteria<T>>) -> Self {
        self.base_criteria = Some(criteria.into());
        self.recompute();
        self
    }

    pub fn with_sort_field(mut self, field: SortField) -> Self {
        self.base = self.base.with_sort_field(field);
        self
    }

    pub fn with_include(mut self, path: impl Into<String>) -> Self {
        self.base = self.base.with_include(path);
        self
    }

    pub fn with_order_by(mut self, path: impl Into<String>) -> Self {
        self.base = self.base.with_order_by(path);
        self
    }

    pub fn with_order_by_descending(mut self, path: impl Into<String>) -> Self {
        self.base = self.base.with_order_by_descending(path);
        self
    }

    pub fn with_paging(mut self, skip: usize, take: usize) -> Self {
        self.base = self.base.with_paging(skip, take);
        self
    }

    pub fn with_nested(mut self, property: impl Into<String>, nested: NestedSpecification) -> Self {
        self.base = self.base.with_nested(property, nested);
        self
    }

    fn recompute(&mut self) {
        let lowered = self.lowered.clone().map(Criteria::Expression);
        self.effective = and_criteria(self.base_criteria.as_ref(), lowered.as_ref());
    }
}

impl<T: Queryable> Default for AdvancedSpecification<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for AdvancedSpecification<T> {
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
            base_criteria: self.base_criteria.clone(),
            filter: self.filter.clone(),
            lowered: self.lowered.clone(),
            effective: self.effective.clone(),
        }
    }
}

impl<T> fmt::Debug for AdvancedSpecification<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdvancedSpecification")
            .field("base", &self.base)
            .field("filter", &self.filter)
            .field("effective", &self.effective)
            .finish()
    }
}

impl<T: Queryable> Specification<T> for AdvancedSpecification<T> {
    fn criteria(&self) -> Option<&Criteria<T>> {
        self.effective.as_ref()
    }

    fn includes(&self) -> &[Arc<IncludePath>] {
        self.base.includes()
    }

    fn include_strings(&self) -> &[String] {
        self.base.include_strings()
    }

    fn order_by(&self) -> Option<&str> {
        self.base.order_by()
    }

    fn order_by_descending(&self) -> Option<&str> {
        self.base.order_by_descending()
    }

    fn then_by(&self) -> &[OrderClause] {
        self.base.then_by()
    }

    fn skip(&self) -> Option<usize> {
        self.base.skip()
    }

    fn take(&self) -> Option<usize> {
        self.base.take()
    }

    fn nested_specifications(&self) -> &BTreeMap<String, NestedSpecification> {
        self.base.nested_specifications()
    }

    fn filter_group(&self) -> Option<&FilterGroup> {
        self.filter.as_ref()
    }

    fn sort_fields(&self) -> &[SortField] {
        self.base.sort_fields()
    }
}
