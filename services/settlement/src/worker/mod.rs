pub mod compensator;
pub mod dlq_monitor;
pub mod outbox;
pub mod reconcile;
pub mod retention;
