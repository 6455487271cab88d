//! Domain model module declarations.

pub mod actor;
pub mod assignment;
pub mod notification;
pub mod request;
pub mod stage;
