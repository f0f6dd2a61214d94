//! Specification fingerprints
//!
//! A key is `"<entity type>:<hex sha256>"`. The digest covers a fixed-order
//! projection of everything that changes what a specification selects, so
//! structurally identical specifications share a key whatever their object
//! identity.

use crate::core::{Queryable, SpecResult};
use crate::filter::{FilterGroup, SortField};
use crate::specification::{NestedSpecification, OrderClause, Specification};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

const RESULT_PREFIX: &str = "result:";

/// Field order here is the serialization order and must stay fixed
#[derive(Serialize)]
struct Projection<'a> {
    entity: &'a str,
    criteria: Option<String>,
    includes: Vec<&'a str>,
    include_strings: &'a [String],
    order_by: Option<&'a str>,
    order_by_descending: Option<&'a str>,
    then_by: &'a [OrderClause],
    skip: Option<usize>,
    take: Option<usize>,
    filter_group: Option<&'a FilterGroup>,
    sort_fields: &'a [SortField],
    nested: &'a BTreeMap<String, NestedSpecification>,
}

pub struct KeyGenerator;

impl KeyGenerator {
    /// Fingerprint a specification
    pub fn generate<T, S>(spec: &S) -> SpecResult<String>
    where
        T: Queryable,
        S: Specification<T> + ?Sized,
    {
        let entity = Self::type_identity::<T>();
        let projection = Projection {
            entity,
            criteria: spec.criteria().map(|c| c.canonical_text()),
            includes: spec.includes().iter().map(|i| i.path()).collect(),
            include_strings: spec.include_strings(),
            order_by: spec.order_by(),
            order_by_descending: spec.order_by_descending(),
            then_by: spec.then_by(),
            skip: spec.skip(),
            take: spec.take(),
            filter_group: spec.filter_group(),
            sort_fields: spec.sort_fields(),
            nested: spec.nested_specifications(),
        };

        let canonical = serde_json::to_vec(&projection)?;
        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        let digest = hasher.finalize().to_vec();
        Ok(format!("{}:{}", entity, hex::encode(digest)))
    }

    /// Key for the result cache, distinct from the compiled-artifact key
    pub fn result_key<T, S>(spec: &S) -> SpecResult<String>
    where
        T: Queryable,
        S: Specification<T> + ?Sized,
    {
        Ok(format!("{}{}", RESULT_PREFIX, Self::generate::<T, S>(spec)?))
    }

    /// The prefix every key of `T` starts with
    pub fn type_identity<T: Queryable>() -> &'static str {
        std::any::type_name::<T>()
    }

    /// Whether `key` was generated for `T`
    pub fn belongs_to<T: Queryable>(key: &str) -> bool {
        let key = key.strip_prefix(RESULT_PREFIX).unwrap_or(key);
        key.rsplit_once(':')
            .is_some_and(|(entity, _)| entity == Self::type_identity::<T>())
    }
}
