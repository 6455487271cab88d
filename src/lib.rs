#![forbid(unsafe_code)]

pub mod audit;
pub mod config;
pub mod errors;
pub mod identity;
pub mod models;
pub mod notify;
pub mod persistence;
pub mod workflow;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
