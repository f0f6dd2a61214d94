//! Repository trait for executing specifications

use crate::core::query::{PaginatedResponse, PaginationMeta, QueryParams};
use crate::core::Queryable;
use crate::specification::Specification;
use anyhow::Result;
use async_trait::async_trait;

/// Read contract of a data source that executes specifications
///
/// Implementations decide how a specification is realized: applied to an
/// in-memory sequence, or lowered to query text and sent to a database.
/// The engine itself performs no I/O.
#[async_trait]
pub trait SpecificationRepository<T: Queryable>: Send + Sync {
    /// Entities matching the specification, ordered and paged
    async fn list(&self, spec: &dyn Specification<T>) -> Result<Vec<T>>;

    /// Number of matching entities, ignoring paging
    async fn count(&self, spec: &dyn Specification<T>) -> Result<usize>;

    /// First entity in the specification's order
    async fn first(&self, spec: &dyn Specification<T>) -> Result<Option<T>> {
        Ok(self.list(spec).await?.into_iter().next())
    }

    /// One page of results for request parameters
    async fn find_page(&self, params: &QueryParams) -> Result<PaginatedResponse<T>> {
        let spec = params.to_specification::<T>()?;
        let total = self.count(&spec).await?;
        let data = self.list(&spec).await?;
        Ok(PaginatedResponse {
            data,
            pagination: PaginationMeta::new(params.page(), params.limit(), total),
        })
    }
}
