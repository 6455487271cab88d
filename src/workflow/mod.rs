//! Approval workflow: stage sequencing, task assignment, and the service
//! that ties them to storage and delivery.

pub mod assignment;
pub mod sequencer;
pub mod service;

pub use sequencer::StageAction;
pub use service::{RequestStatus, WorkflowService};
