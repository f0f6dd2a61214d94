//! Caching of compiled specifications and query results
//!
//! - [`keys`]: fingerprints specifications into stable cache keys
//! - [`compiled`]: build-once store of compiled transformers and query text
//! - [`result`]: two-tier cache of query results
//! - [`config`]: sizes, timeouts and the hit threshold

pub mod compiled;
pub mod config;
pub mod keys;
mod lock;
pub mod result;

pub use compiled::{CacheStatistics, CompiledQueryCache};
pub use config::CacheConfig;
pub use keys::KeyGenerator;
pub use result::{DistributedCache, InMemoryDistributedCache, ResultCache};
