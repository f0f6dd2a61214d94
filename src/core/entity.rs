//! Entity trait defining how specifications read entity fields

use crate::core::field::Value;

/// Base trait for every type a specification can be evaluated against.
///
/// A queryable entity exposes:
/// - entity_name: the logical name, used in cache keys and as the default table
/// - field_value: dynamic access to a field by dotted path (e.g. `customer.name`)
/// - column_name: an optional column override used when lowering to SQL
///
/// Most types implement it with [`impl_queryable!`](crate::impl_queryable).
pub trait Queryable: Send + Sync + 'static {
    /// The logical entity name (e.g., "customer", "order")
    fn entity_name() -> &'static str;

    /// The table used by generated SELECT statements
    fn table_name() -> &'static str {
        Self::entity_name()
    }

    /// Get the value of a field by dotted path
    ///
    /// Returns `None` for unknown paths, which evaluate like `Null`.
    fn field_value(&self, path: &str) -> Option<Value>;

    /// Column override for a field path
    ///
    /// Return `Some` to map a property to a differently named column.
    fn column_name(_path: &str) -> Option<&'static str> {
        None
    }
}
