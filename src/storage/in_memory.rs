//! In-memory implementation of SpecificationRepository for testing and development

use crate::cache::CompiledQueryCache;
use crate::core::{Queryable, SpecificationRepository};
use crate::specification::{CompiledQuery, Specification};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::sync::{Arc, RwLock};

/// In-memory repository
///
/// Useful for testing and development. Uses RwLock for thread-safe access.
/// With a [`CompiledQueryCache`] attached, each distinct specification is
/// compiled once and reused.
#[derive(Clone)]
pub struct InMemoryRepository<T> {
    items: Arc<RwLock<Vec<T>>>,
    cache: Option<Arc<CompiledQueryCache>>,
}

impl<T: Queryable + Clone> InMemoryRepository<T> {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::from_items(Vec::new())
    }

    pub fn from_items(items: Vec<T>) -> Self {
        Self {
            items: Arc::new(RwLock::new(items)),
            cache: None,
        }
    }

    /// Compile specifications through a shared cache
    pub fn with_cache(mut self, cache: Arc<CompiledQueryCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn insert(&self, item: T) -> Result<()> {
        self.items
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?
            .push(item);
        Ok(())
    }

    /// Remove every stored item matching the specification's criteria
    ///
    /// Compiled entries for `T` are invalidated afterwards.
    pub fn remove_matching(&self, spec: &dyn Specification<T>) -> Result<usize> {
        let query = CompiledQuery::build(spec)?;
        let mut items = self
            .items
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let before = items.len();
        let mut failure = None;
        items.retain(|item| match query.matches(item) {
            Ok(matched) => !matched,
            Err(err) => {
                failure.get_or_insert(err);
                true
            }
        });
        if let Some(err) = failure {
            return Err(err.into());
        }
        let removed = before - items.len();
        drop(items);

        if let Some(cache) = &self.cache {
            cache.invalidate_for_type::<T>();
        }
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.items.read().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn compile(&self, spec: &dyn Specification<T>) -> Result<Arc<CompiledQuery<T>>> {
        let query = match &self.cache {
            Some(cache) => cache.get_or_add_transformer(spec)?,
            None => Arc::new(CompiledQuery::build(spec)?),
        };
        Ok(query)
    }
}

impl<T: Queryable + Clone> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Queryable + Clone> SpecificationRepository<T> for InMemoryRepository<T> {
    async fn list(&self, spec: &dyn Specification<T>) -> Result<Vec<T>> {
        let query = self.compile(spec)?;
        let items = self
            .items
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(query.select(items.iter())?.into_iter().cloned().collect())
    }

    async fn count(&self, spec: &dyn Specification<T>) -> Result<usize> {
        let query = self.compile(spec)?;
        let items = self
            .items
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(query.count(items.iter())?)
    }
}
