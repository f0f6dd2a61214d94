//! Macros for reducing boilerplate when defining queryable entities
//!
//! These macros generate the repetitive `Queryable` implementation needed
//! for each entity type so that specifications can read its fields.

/// Implement [`Queryable`](crate::core::Queryable) for a struct
///
/// Each listed field must be `Clone` and convertible into a
/// [`Value`](crate::core::Value). A field may carry a column override with
/// `=> "column"`, which is what the SQL translator emits instead of the
/// property name.
///
/// # Example
/// ```rust,ignore
/// #[derive(Clone)]
/// struct Customer {
///     name: String,
///     email: Option<String>,
///     is_active: bool,
/// }
///
/// impl_queryable!(Customer, "customers", {
///     name,
///     email => "email_address",
///     is_active,
/// });
/// ```
#[macro_export]
macro_rules! impl_queryable {
    (@column $column:literal) => {
        Some($column)
    };
    (@column) => {
        None
    };
    ($type:ty, $entity:literal, { $($field:ident $(=> $column:literal)?),* $(,)? }) => {
        impl $crate::core::Queryable for $type {
            fn entity_name() -> &'static str {
                $entity
            }

            fn field_value(&self, path: &str) -> Option<$crate::core::Value> {
                match path {
                    $(
                        stringify!($field) => {
                            Some($crate::core::Value::from(self.$field.clone()))
                        }
                    )*
                    _ => None,
                }
            }

            #[allow(unreachable_patterns)]
            fn column_name(path: &str) -> Option<&'static str> {
                match path {
                    $(
                        stringify!($field) => $crate::impl_queryable!(@column $($column)?),
                    )*
                    _ => None,
                }
            }
        }
    };
}
