//! Authorization and gating rules around ICT officer task assignments.

use crate::models::actor::{Actor, Role};
use crate::models::assignment::TaskAssignment;
use crate::models::request::{AccessRequest, CurrentStage};
use crate::models::stage::StageName;
use crate::workflow::sequencer::current_stage;
use crate::{AppError, Result};

/// Create an assignment of `officer` to `request`.
///
/// `existing` holds every assignment already recorded for the request.
///
/// # Errors
///
/// - `AppError::UnauthorizedActor` unless `assigner` is head of IT or admin
///   and `officer` holds the ICT officer role.
/// - `AppError::StageGateViolation` unless the request awaits the ICT officer stage.
/// - `AppError::AlreadyAssigned` if an assigned or in-progress task exists.
pub fn assign(
    request: &AccessRequest,
    existing: &[TaskAssignment],
    assigner: &Actor,
    officer: &Actor,
) -> Result<TaskAssignment> {
    if !matches!(assigner.role, Role::HeadOfIt | Role::Admin) {
        return Err(AppError::UnauthorizedActor(format!(
            "{} may not assign implementation tasks",
            assigner.role
        )));
    }
    if officer.role != Role::IctOfficer {
        return Err(AppError::UnauthorizedActor(format!(
            "{} is a {}, tasks go to ict_officer",
            officer.name, officer.role
        )));
    }
    let current = current_stage(request);
    if current != CurrentStage::Awaiting(StageName::IctOfficer) {
        return Err(AppError::StageGateViolation(format!(
            "request {} is {}, tasks are assigned once head_of_it has approved",
            request.id,
            current.label()
        )));
    }
    if let Some(active) = existing.iter().find(|task| task.status.is_active()) {
        return Err(AppError::AlreadyAssigned(format!(
            "request {} is {} to {} (assignment {})",
            request.id, active.status, active.officer_name, active.id
        )));
    }

    Ok(TaskAssignment::new(
        request.id.clone(),
        officer.name.clone(),
        officer.pf_number.clone(),
        assigner.name.clone(),
    ))
}

/// Officer begins work.
///
/// # Errors
///
/// `AppError::UnauthorizedActor` unless `actor` is the assigned officer;
/// `AppError::InvalidTransition` if the task is not `assigned`.
pub fn start(task: &mut TaskAssignment, actor: &Actor) -> Result<()> {
    ensure_assignee(task, actor)?;
    task.start()
}

/// Officer finishes work.
///
/// # Errors
///
/// `AppError::UnauthorizedActor` unless `actor` is the assigned officer;
/// `AppError::InvalidTransition` if the task is not `in_progress`.
pub fn complete(task: &mut TaskAssignment, actor: &Actor, notes: Option<String>) -> Result<()> {
    ensure_assignee(task, actor)?;
    task.complete(notes)
}

/// Withdraw the task so another officer can be assigned.
///
/// # Errors
///
/// `AppError::UnauthorizedActor` unless `actor` is head of IT, admin, or the
/// assignee; `AppError::InvalidTransition` if the task is already finished.
pub fn cancel(task: &mut TaskAssignment, actor: &Actor, reason: Option<String>) -> Result<()> {
    if !(matches!(actor.role, Role::HeadOfIt | Role::Admin) || is_assignee(task, actor)) {
        return Err(AppError::UnauthorizedActor(format!(
            "{} may not cancel assignment {}",
            actor.name, task.id
        )));
    }
    task.cancel(reason)
}

fn ensure_assignee(task: &TaskAssignment, actor: &Actor) -> Result<()> {
    if is_assignee(task, actor) {
        Ok(())
    } else {
        Err(AppError::UnauthorizedActor(format!(
            "assignment {} belongs to {}",
            task.id, task.officer_name
        )))
    }
}

fn is_assignee(task: &TaskAssignment, actor: &Actor) -> bool {
    if actor.role != Role::IctOfficer {
        return false;
    }
    match (&task.officer_pf_number, &actor.pf_number) {
        (Some(assigned), Some(caller)) => assigned.eq_ignore_ascii_case(caller),
        _ => task.officer_name == actor.name,
    }
}
