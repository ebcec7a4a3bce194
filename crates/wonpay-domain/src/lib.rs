//! Domain types shared across all Wonpay services.
//!
//! This crate contains only pure types with no framework dependencies;
//! framework code stays in the service crates that import it.

pub mod event;
pub mod id;
pub mod money;
pub mod payment;
