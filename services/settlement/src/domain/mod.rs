pub mod gateway;
pub mod repository;
pub mod types;
