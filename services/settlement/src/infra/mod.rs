pub mod alert;
pub mod broker;
pub mod db;
pub mod gateway;
