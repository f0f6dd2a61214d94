//! Storage implementations executing specifications

pub mod in_memory;

pub use in_memory::InMemoryRepository;
