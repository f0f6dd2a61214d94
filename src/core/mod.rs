//! Core module containing fundamental traits and types for the engine

pub mod entity;
pub mod error;
pub mod field;
pub mod query;
pub mod store;

pub use entity::Queryable;
pub use error::{ConfigError, SpecError, SpecResult};
pub use field::Value;
pub use query::{PaginatedResponse, PaginationMeta, QueryParams};
pub use store::SpecificationRepository;
