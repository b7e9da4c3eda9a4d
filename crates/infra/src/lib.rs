//! Infrastructure layer: stores, movement and workflow services, configuration.

pub mod audit_log;
pub mod catalog;
pub mod config;
pub mod error;
pub mod identity;
pub mod ledger_store;
pub mod movement;
pub mod order_numbers;
pub mod pending_counts;
pub mod pg;
pub mod request_store;
pub mod transfer_engine;

mod guard;


pub use error::{ServiceError, ServiceResult};
