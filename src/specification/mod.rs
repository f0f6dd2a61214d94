//! Specification contract
//!
//! A specification bundles the criteria, includes, ordering, paging and
//! nested specifications of a single query intent. Execution collaborators
//! read it through the [`Specification`] trait; [`BaseSpecification`] is the
//! builder most callers start from.
//!
//! # Example
//!
//! ```rust,ignore
//! use this_spec::prelude::*;
//!
//! let active = BaseSpecification::<Order>::matching(|o| o.field("status").equals("Active"))
//!     .with_order_by_descending("total")
//!     .with_paging(0, 20);
//! let large = BaseSpecification::<Order>::matching(|o| o.field("total").greater_than(1000));
//!
//! let combined = active.and(&large);
//! ```

pub mod advanced;
pub mod combinator;
pub mod evaluator;

pub use advanced::AdvancedSpecification;
pub use combinator::SpecificationExt;
pub use evaluator::CompiledQuery;

use crate::core::{Queryable, SpecResult};
use crate::expr::compile::CompiledExpr;
use crate::expr::{Expr, Lambda, Parameter};
use crate::filter::{FilterGroup, SortField};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A condition tree typed by the entity it is evaluated against
pub struct Predicate<T> {
    lambda: Lambda,
    _entity: PhantomData<fn(&T) -> bool>,
}

impl<T> Predicate<T> {
    /// Build a predicate over a fresh parameter
    pub fn new(build: impl FnOnce(&Parameter) -> Expr) -> Self {
        Self::from_lambda(Lambda::new(build))
    }

    pub fn from_lambda(lambda: Lambda) -> Self {
        Self {
            lambda,
            _entity: PhantomData,
        }
    }

    pub fn lambda(&self) -> &Lambda {
        &self.lambda
    }

    pub fn parameter(&self) -> &Parameter {
        self.lambda.parameter()
    }

    pub fn body(&self) -> &Expr {
        self.lambda.body()
    }
}

impl<T: Queryable> Predicate<T> {
    pub fn compile(&self) -> SpecResult<CompiledExpr<T>> {
        CompiledExpr::compile(&self.lambda)
    }

    /// Compile and evaluate against a single entity
    ///
    /// Use [`Predicate::compile`] when evaluating many entities.
    pub fn evaluate(&self, entity: &T) -> SpecResult<bool> {
        Ok(self.compile()?.matches(entity))
    }
}

impl<T> Clone for Predicate<T> {
    fn clone(&self) -> Self {
        Self::from_lambda(self.lambda.clone())
    }
}

impl<T> fmt::Debug for Predicate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Predicate").field(&self.lambda.to_string()).finish()
    }
}

impl<T> fmt::Display for Predicate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lambda)
    }
}

type PredicateFn<T> = dyn Fn(&T) -> SpecResult<bool> + Send + Sync;

/// An opaque, labelled predicate
///
/// Usable in memory only: there is no tree to translate. The label stands in
/// for the tree in cache keys, so two function predicates with the same label
/// are assumed to be the same predicate.
pub struct FunctionPredicate<T> {
    label: Arc<str>,
    func: Arc<PredicateFn<T>>,
}

impl<T> FunctionPredicate<T> {
    pub fn new(label: impl Into<Arc<str>>, func: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        Self::fallible(label, move |entity| Ok(func(entity)))
    }

    pub(crate) fn fallible(
        label: impl Into<Arc<str>>,
        func: impl Fn(&T) -> SpecResult<bool> + Send + Sync + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            func: Arc::new(func),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn evaluate(&self, entity: &T) -> SpecResult<bool> {
        (self.func)(entity)
    }
}

impl<T> Clone for FunctionPredicate<T> {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            func: self.func.clone(),
        }
    }
}

impl<T> fmt::Debug for FunctionPredicate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FunctionPredicate").field(&self.label).finish()
    }
}

/// The filter of a specification
pub enum Criteria<T> {
    /// An inspectable tree; evaluable in memory and translatable to text
    Expression(Predicate<T>),
    /// An opaque closure; in memory only
    Function(FunctionPredicate<T>),
}

impl<T> Criteria<T> {
    pub fn as_expression(&self) -> Option<&Predicate<T>> {
        match self {
            Criteria::Expression(predicate) => Some(predicate),
            Criteria::Function(_) => None,
        }
    }

    pub fn is_translatable(&self) -> bool {
        matches!(self, Criteria::Expression(_))
    }

    /// Canonical text used for fingerprinting
    pub fn canonical_text(&self) -> String {
        match self {
            Criteria::Expression(predicate) => predicate.to_string(),
            Criteria::Function(function) => format!("fn:{}", function.label()),
        }
    }
}

impl<T: Queryable> Criteria<T> {
    pub fn is_satisfied_by(&self, entity: &T) -> SpecResult<bool> {
        match self {
            Criteria::Expression(predicate) => predicate.evaluate(entity),
            Criteria::Function(function) => function.evaluate(entity),
        }
    }
}

impl<T> Clone for Criteria<T> {
    fn clone(&self) -> Self {
        match self {
            Criteria::Expression(predicate) => Criteria::Expression(predicate.clone()),
            Criteria::Function(function) => Criteria::Function(function.clone()),
        }
    }
}

impl<T> fmt::Debug for Criteria<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criteria::Expression(predicate) => f.debug_tuple("Expression").field(predicate).finish(),
            Criteria::Function(function) => f.debug_tuple("Function").field(function).finish(),
        }
    }
}

impl<T> From<Predicate<T>> for Criteria<T> {
    fn from(predicate: Predicate<T>) -> Self {
        Criteria::Expression(predicate)
    }
}

impl<T> From<FunctionPredicate<T>> for Criteria<T> {
    fn from(function: FunctionPredicate<T>) -> Self {
        Criteria::Function(function)
    }
}

/// A related-data path to load with the root entity
///
/// Includes are shared by `Arc` and de-duplicated by identity when
/// specifications are combined.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct IncludePath {
    path: String,
}

impl IncludePath {
    pub fn new(path: impl Into<String>) -> Arc<Self> {
        Arc::new(Self { path: path.into() })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for IncludePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)
    }
}

/// A secondary ordering key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderClause {
    pub path: String,
    pub descending: bool,
}

impl OrderClause {
    pub fn ascending(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            descending: false,
        }
    }

    pub fn descending(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            descending: true,
        }
    }
}

/// Type-erased specification for a related collection
///
/// Holds only structured data, so it can be applied to any [`Queryable`]
/// sequence and serialized into cache keys.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NestedSpecification {
    pub filter: Option<FilterGroup>,
    pub sort_fields: Vec<SortField>,
    pub skip: Option<usize>,
    pub take: Option<usize>,
}

impl NestedSpecification {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: FilterGroup) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_sort_field(mut self, field: SortField) -> Self {
        self.sort_fields.push(field);
        self
    }

    pub fn with_paging(mut self, skip: usize, take: usize) -> Self {
        self.skip = Some(skip);
        self.take = Some(take);
        self
    }

    /// Filter, order and page a related collection
    pub fn apply<U: Queryable>(&self, items: Vec<U>) -> SpecResult<Vec<U>> {
        let mut spec = AdvancedSpecification::<U>::new();
        if let Some(filter) = &self.filter {
            spec = spec.with_filter(filter.clone())?;
        }
        for field in &self.sort_fields {
            spec = spec.with_sort_field(field.clone());
        }
        if let (Some(skip), Some(take)) = (self.skip, self.take) {
            spec = spec.with_paging(skip, take);
        }
        CompiledQuery::build(&spec)?.apply(items)
    }
}

/// Read contract of a specification
///
/// Object safe, so execution collaborators can hold `&dyn Specification<T>`.
pub trait Specification<T: Queryable>: Send + Sync {
    /// `None` means every entity matches
    fn criteria(&self) -> Option<&Criteria<T>>;

    fn includes(&self) -> &[Arc<IncludePath>];

    fn include_strings(&self) -> &[String];

    fn order_by(&self) -> Option<&str>;

    fn order_by_descending(&self) -> Option<&str>;

    fn then_by(&self) -> &[OrderClause];

    fn skip(&self) -> Option<usize>;

    fn take(&self) -> Option<usize>;

    /// Paging applies only when both skip and take are set
    fn is_paging_enabled(&self) -> bool {
        self.skip().is_some() && self.take().is_some()
    }

    fn nested_specifications(&self) -> &BTreeMap<String, NestedSpecification>;

    /// Structured filter root, for specifications built from data
    fn filter_group(&self) -> Option<&FilterGroup> {
        None
    }

    fn sort_fields(&self) -> &[SortField] {
        &[]
    }

    /// Name used in error messages
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// The default specification: a builder over every field of the contract
pub struct BaseSpecification<T> {
    criteria: Option<Criteria<T>>,
    includes: Vec<Arc<IncludePath>>,
    include_strings: Vec<String>,
    order_by: Option<String>,
    order_by_descending: Option<String>,
    then_by: Vec<OrderClause>,
    skip: Option<usize>,
    take: Option<usize>,
    nested: BTreeMap<String, NestedSpecification>,
    sort_fields: Vec<SortField>,
}

impl<T> BaseSpecification<T> {
    /// A specification matching every entity
    pub fn new() -> Self {
        Self {
            criteria: None,
            includes: Vec::new(),
            include_strings: Vec::new(),
            order_by: None,
            order_by_descending: None,
            then_by: Vec::new(),
            skip: None,
            take: None,
            nested: BTreeMap::new(),
            sort_fields: Vec::new(),
        }
    }

    /// A specification with an expression criteria
    pub fn matching(build: impl FnOnce(&Parameter) -> Expr) -> Self {
        Self::new().with_criteria(Predicate::new(build))
    }

    pub fn with_criteria(mut self, criteria: impl Into<Criteria<T>>) -> Self {
        self.criteria = Some(criteria.into());
        self
    }

    pub fn with_optional_criteria(mut self, criteria: Option<Criteria<T>>) -> Self {
        self.criteria = criteria;
        self
    }

    /// Use an opaque closure as criteria
    pub fn with_function(
        self,
        label: impl Into<Arc<str>>,
        func: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.with_criteria(FunctionPredicate::new(label, func))
    }

    pub fn with_include(mut self, path: impl Into<String>) -> Self {
        self.includes.push(IncludePath::new(path));
        self
    }

    /// Add an include shared with other specifications
    pub fn with_shared_include(mut self, include: Arc<IncludePath>) -> Self {
        if !self.includes.iter().any(|i| Arc::ptr_eq(i, &include)) {
            self.includes.push(include);
        }
        self
    }

    pub fn with_include_string(mut self, include: impl Into<String>) -> Self {
        let include = include.into();
        if !self.include_strings.contains(&include) {
            self.include_strings.push(include);
        }
        self
    }

    pub fn with_order_by(mut self, path: impl Into<String>) -> Self {
        self.order_by = Some(path.into());
        self
    }

    pub fn with_order_by_descending(mut self, path: impl Into<String>) -> Self {
        self.order_by_descending = Some(path.into());
        self
    }

    pub fn with_then_by(mut self, path: impl Into<String>) -> Self {
        self.then_by.push(OrderClause::ascending(path));
        self
    }

    pub fn with_then_by_descending(mut self, path: impl Into<String>) -> Self {
        self.then_by.push(OrderClause::descending(path));
        self
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_take(mut self, take: usize) -> Self {
        self.take = Some(take);
        self
    }

    pub fn with_paging(self, skip: usize, take: usize) -> Self {
        self.with_skip(skip).with_take(take)
    }

    pub fn with_nested(mut self, property: impl Into<String>, nested: NestedSpecification) -> Self {
        self.nested.insert(property.into(), nested);
        self
    }

    pub fn with_sort_field(mut self, field: SortField) -> Self {
        self.sort_fields.push(field);
        self
    }

    pub(crate) fn with_sort_fields(mut self, fields: Vec<SortField>) -> Self {
        self.sort_fields = fields;
        self
    }

    pub(crate) fn with_then_by_clauses(mut self, clauses: Vec<OrderClause>) -> Self {
        self.then_by = clauses;
        self
    }

    pub(crate) fn with_nested_map(mut self, nested: BTreeMap<String, NestedSpecification>) -> Self {
        self.nested = nested;
        self
    }

    pub(crate) fn with_skip_take(mut self, skip: Option<usize>, take: Option<usize>) -> Self {
        self.skip = skip;
        self.take = take;
        self
    }

    pub(crate) fn with_ordering(
        mut self,
        order_by: Option<String>,
        order_by_descending: Option<String>,
    ) -> Self {
        self.order_by = order_by;
        self.order_by_descending = order_by_descending;
        self
    }
}

impl<T> Default for BaseSpecification<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for BaseSpecification<T> {
    fn clone(&self) -> Self {
        Self {
            criteria: self.criteria.clone(),
            includes: self.includes.clone(),
            include_strings: self.include_strings.clone(),
            order_by: self.order_by.clone(),
            order_by_descending: self.order_by_descending.clone(),
            then_by: self.then_by.clone(),
            skip: self.skip,
            take: self.take,
            nested: self.nested.clone(),
            sort_fields: self.sort_fields.clone(),
        }
    }
}

impl<T> fmt::Debug for BaseSpecification<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseSpecification")
            .field("criteria", &self.criteria)
            .field("includes", &self.includes)
            .field("include_strings", &self.include_strings)
            .field("order_by", &self.order_by)
            .field("order_by_descending", &self.order_by_descending)
            .field("then_by", &self.then_by)
            .field("skip", &self.skip)
            .field("take", &self.take)
            .field("nested", &self.nested)
            .finish_non_exhaustive()
    }
}

impl<T: Queryable> Specification<T> for BaseSpecification<T> {
    fn criteria(&self) -> Option<&Criteria<T>> {
        self.criteria.as_ref()
    }

    fn includes(&self) -> &[Arc<IncludePath>] {
        &self.includes
    }

    fn include_strings(&self) -> &[String] {
        &self.include_strings
    }

    fn order_by(&self) -> Option<&str> {
        self.order_by.as_deref()
    }

    fn order_by_descending(&self) -> Option<&str> {
        self.order_by_descending.as_deref()
    }

    fn then_by(&self) -> &[OrderClause] {
        &self.then_by
    }

    fn skip(&self) -> Option<usize> {
        self.skip
    }

    fn take(&self) -> Option<usize> {
        self.take
    }

    fn nested_specifications(&self) -> &BTreeMap<String, NestedSpecification> {
        &self.nested
    }

    fn sort_fields(&self) -> &[SortField] {
        &self.sort_fields
    }
}
