//! # This-Spec
//!
//! Composable query specifications for Rust.
//!
//! A specification describes a data query as a value: criteria, ordering,
//! paging and related-data includes. It can be evaluated in memory, compiled
//! once and applied to sequences, or lowered to parameterized SQL.
//!
//! ## Features
//!
//! - **Expression Criteria**: Condition trees built with a small DSL and rendered canonically
//! - **Combinators**: AND / OR / NOT with correct parameter rebinding
//! - **Structured Filters**: `FilterGroup` trees parsed from requests and lowered to predicates
//! - **SQL Lowering**: Parameterized text for several dialects, values never inlined
//! - **Compiled Cache**: Build-once-per-key transformers and query text with periodic sweep
//! - **Result Cache**: Local LRU plus an optional shared tier
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use this_spec::prelude::*;
//!
//! #[derive(Clone)]
//! struct Customer {
//!     name: String,
//!     email: Option<String>,
//!     age: i64,
//! }
//!
//! impl_queryable!(Customer, "customers", { name => "full_name", email, age });
//!
//! let adults = BaseSpecification::<Customer>::matching(|c| c.field("age").greater_or_equal(18));
//! let reachable = BaseSpecification::<Customer>::matching(|c| c.field("email").is_not_null());
//! let spec = adults.and(&reachable).with_order_by("name").with_paging(0, 20);
//!
//! // In memory
//! let page = CompiledQuery::build(&spec)?.apply(customers)?;
//!
//! // As SQL
//! let text = SqlTranslator::new(SqlDialect::Postgres).translate_specification(&spec)?;
//! ```

pub mod cache;
pub mod config;
pub mod core;
pub mod entities;
pub mod expr;
pub mod filter;
pub mod specification;
pub mod storage;
pub mod translate;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core Traits ===
    pub use crate::core::{
        ConfigError, PaginatedResponse, PaginationMeta, QueryParams, Queryable, SpecError,
        SpecResult, SpecificationRepository, Value,
    };

    // === Macros ===
    pub use crate::impl_queryable;

    // === Expressions ===
    pub use crate::expr::{Expr, Lambda, Parameter, captured, lit};

    // === Filters ===
    pub use crate::filter::{
        FilterCondition, FilterGroup, FilterOperator, LogicalOperator, SortDirection, SortField,
        SortTarget,
    };

    // === Specifications ===
    pub use crate::specification::{
        AdvancedSpecification, BaseSpecification, CompiledQuery, Criteria, NestedSpecification,
        Predicate, Specification, SpecificationExt,
    };

    // === Translation ===
    pub use crate::translate::{QueryText, SqlDialect, SqlTranslator};

    // === Caching ===
    pub use crate::cache::{
        CacheConfig, CacheStatistics, CompiledQueryCache, DistributedCache,
        InMemoryDistributedCache, KeyGenerator, ResultCache,
    };

    // === Storage ===
    pub use crate::storage::InMemoryRepository;

    // === Config ===
    pub use crate::config::{EngineConfig, TranslatorConfig};

    // === External dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
}
