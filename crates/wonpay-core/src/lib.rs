//! Shared infrastructure helpers for Wonpay services.

pub mod health;
pub mod middleware;
pub mod sea_ext;
pub mod serde;
pub mod tracing;
