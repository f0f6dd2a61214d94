//! Entity helpers

pub mod macros;
