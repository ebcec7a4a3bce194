pub mod metrics;
pub mod payment;
pub mod wallet;
