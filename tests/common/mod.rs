//! Shared fixtures for integration tests
//!
//! Provides `Customer` and `Order` entities implementing `Queryable`, a
//! deterministic customer data set, and a tracing initializer.
//!
//! # Usage
//!
//! From any integration test file in `tests/`:
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use this_spec::impl_queryable;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Customer — covers string, optional, boolean, integer and float fields
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub status: String,
    pub is_active: bool,
    pub age: i64,
    pub balance: f64,
}

impl_queryable!(Customer, "customers", {
    id,
    name => "full_name",
    email,
    status,
    is_active,
    age,
    balance,
});

impl Customer {
    pub fn new(id: i64, name: &str, status: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            email: Some(format!("{}@example.com", name.to_lowercase())),
            status: status.to_string(),
            is_active: true,
            age: 30,
            balance: 0.0,
        }
    }

    pub fn without_email(mut self) -> Self {
        self.email = None;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn aged(mut self, age: i64) -> Self {
        self.age = age;
        self
    }

    pub fn with_balance(mut self, balance: f64) -> Self {
        self.balance = balance;
        self
    }
}

// ---------------------------------------------------------------------------
// Order — a second entity type for per-type cache behavior
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub customer_id: i64,
    pub total: f64,
}

impl_queryable!(Order, "orders", { id, customer_id, total });

// ---------------------------------------------------------------------------
// Data sets
// ---------------------------------------------------------------------------

/// Twelve customers with mixed statuses, ages and missing emails
pub fn customers() -> Vec<Customer> {
    let statuses = ["Active", "Draft", "Archived"];
    (1..=12)
        .map(|id| {
            let mut customer = Customer::new(id, &format!("Customer{:02}", id), statuses[(id % 3) as usize])
                .aged(15 + id * 5)
                .with_balance(id as f64 * 12.5);
            if id % 4 == 0 {
                customer = customer.without_email();
            }
            if id % 5 == 0 {
                customer = customer.inactive();
            }
            customer
        })
        .collect()
}

pub fn orders(count: i64) -> Vec<Order> {
    (1..=count)
        .map(|id| Order {
            id,
            customer_id: id % 3,
            total: id as f64 * 10.0,
        })
        .collect()
}

/// Strings that would break naive SQL concatenation
pub fn hostile_strings() -> Vec<&'static str> {
    vec![
        "O'Brien",
        "'; DROP TABLE customers; --",
        "\" OR \"1\"=\"1",
        "100% _real_ \\ value",
        "Robert'); DELETE FROM orders WHERE ('1'='1",
    ]
}

/// Install a test subscriber once; honors `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
