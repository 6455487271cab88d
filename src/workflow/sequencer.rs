//! Stage sequencer: the ordering gate over a request's stage records.
//!
//! Every mutating function validates completely before touching the
//! request, so a returned error always means the request is unchanged.

use chrono::Utc;

use crate::models::actor::{Actor, Role};
use crate::models::notification::StageTransitioned;
use crate::models::request::{AccessRequest, Cancellation, CurrentStage};
use crate::models::stage::{Decision, StageName, StageSignoff, StageState, StageStatus};
use crate::{AppError, Result};

/// Derive where the request stands from its stage records.
///
/// Cancellation wins over everything; a rejected stage halts the request;
/// otherwise the first pending stage is the one awaited.
#[must_use]
pub fn current_stage(request: &AccessRequest) -> CurrentStage {
    if request.cancellation.is_some() {
        return CurrentStage::Cancelled;
    }
    if let Some(rejected) = request
        .stages
        .iter()
        .find(|record| record.status() == StageStatus::Rejected)
    {
        return CurrentStage::Rejected(rejected.stage);
    }
    request
        .stages
        .iter()
        .find(|record| record.status() == StageStatus::Pending)
        .map_or(CurrentStage::Completed, |record| {
            CurrentStage::Awaiting(record.stage)
        })
}

/// Whether `role` may decide `stage` right now.
#[must_use]
pub fn can_act(request: &AccessRequest, stage: StageName, role: Role) -> bool {
    current_stage(request) == CurrentStage::Awaiting(stage) && stage.authorized_role() == role
}

/// A single approve/reject action against one stage.
#[derive(Debug, Clone)]
pub struct StageAction {
    /// Stage being decided.
    pub stage: StageName,
    /// Outcome.
    pub decision: Decision,
    /// Remarks; required when rejecting.
    pub comment: Option<String>,
    /// Signature override; defaults to the actor's stored signature.
    pub signature_ref: Option<String>,
}

impl StageAction {
    /// Approve `stage` without remarks.
    #[must_use]
    pub fn approve(stage: StageName) -> Self {
        Self {
            stage,
            decision: Decision::Approve,
            comment: None,
            signature_ref: None,
        }
    }

    /// Reject `stage` with the given reason.
    #[must_use]
    pub fn reject(stage: StageName, reason: impl Into<String>) -> Self {
        Self {
            stage,
            decision: Decision::Reject,
            comment: Some(reason.into()),
            signature_ref: None,
        }
    }

    /// Attach remarks.
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Record `action` by `actor` against `request`.
///
/// # Errors
///
/// - `AppError::StageGateViolation` if the request is not awaiting
///   `action.stage` (earlier stage open, stage already decided, request
///   rejected, completed, or cancelled).
/// - `AppError::UnauthorizedActor` if the actor's role is not the stage's role.
/// - `AppError::Validation` if a rejection carries no reason.
pub fn apply_decision(
    request: &mut AccessRequest,
    action: StageAction,
    actor: &Actor,
) -> Result<StageTransitioned> {
    let stage = action.stage;
    let current = current_stage(request);
    if current != CurrentStage::Awaiting(stage) {
        return Err(AppError::StageGateViolation(format!(
            "request {} cannot take a decision on {stage} while {}",
            request.id,
            describe(current)
        )));
    }
    if actor.role != stage.authorized_role() {
        return Err(AppError::UnauthorizedActor(format!(
            "{stage} must be decided by {}, not {}",
            stage.authorized_role(),
            actor.role
        )));
    }
    let comment = action
        .comment
        .map(|c| c.trim().to_owned())
        .filter(|c| !c.is_empty());
    if action.decision == Decision::Reject && comment.is_none() {
        return Err(AppError::Validation(
            "a rejection must state a reason".into(),
        ));
    }

    let now = Utc::now();
    let signoff = StageSignoff {
        approver_name: actor.name.clone(),
        comments: comment.clone(),
        signature_ref: action.signature_ref.or_else(|| actor.signature_ref.clone()),
        decided_at: now,
    };
    let record = request
        .stages
        .get_mut(stage.position())
        .filter(|record| record.stage == stage)
        .ok_or_else(|| AppError::Db(format!("request {} is missing stage {stage}", request.id)))?;
    record.state = match action.decision {
        Decision::Approve => StageState::Approved(signoff),
        Decision::Reject => StageState::Rejected(signoff),
    };
    request.updated_at = now;

    let next_stage = match action.decision {
        Decision::Approve => stage.next(),
        Decision::Reject => None,
    };

    Ok(StageTransitioned {
        request_id: request.id.clone(),
        stage,
        decision: action.decision,
        actor_name: actor.name.clone(),
        actor_role: actor.role,
        comment,
        staff_name: request.staff_name.clone(),
        phone: request.phone.clone(),
        next_stage,
        occurred_at: now,
    })
}

/// Reopen the rejected `from_stage` and clear every stage after it.
///
/// # Errors
///
/// - `AppError::InvalidResubmission` if the request is cancelled or
///   `from_stage` is not currently rejected.
/// - `AppError::UnauthorizedActor` unless the actor is the requester or an admin.
pub fn resubmit(request: &mut AccessRequest, from_stage: StageName, actor: &Actor) -> Result<()> {
    if request.cancellation.is_some() {
        return Err(AppError::InvalidResubmission(format!(
            "request {} is cancelled",
            request.id
        )));
    }
    let status = request.stage(from_stage)?.status();
    if status != StageStatus::Rejected {
        return Err(AppError::InvalidResubmission(format!(
            "{from_stage} is {}, only a rejected stage can be resubmitted",
            status.as_str()
        )));
    }
    if !(is_requester(request, actor) || actor.role == Role::Admin) {
        return Err(AppError::UnauthorizedActor(format!(
            "only the requester or an admin may resubmit request {}",
            request.id
        )));
    }

    for record in request.stages.iter_mut().skip(from_stage.position()) {
        record.state = StageState::Pending;
    }
    let now = Utc::now();
    request.resubmission_count += 1;
    request.last_resubmitted_at = Some(now);
    request.last_resubmitted_by = Some(actor.name.clone());
    request.updated_at = now;
    Ok(())
}

/// Withdraw a request before it completes.
///
/// # Errors
///
/// - `AppError::StageGateViolation` if the request is already completed or cancelled.
/// - `AppError::UnauthorizedActor` unless the actor is the requester, the
///   head of IT, or an admin.
pub fn cancel(request: &mut AccessRequest, actor: &Actor, reason: Option<String>) -> Result<()> {
    let current = current_stage(request);
    if current.is_terminal() {
        return Err(AppError::StageGateViolation(format!(
            "request {} cannot be cancelled while {}",
            request.id,
            describe(current)
        )));
    }
    let permitted =
        matches!(actor.role, Role::Admin | Role::HeadOfIt) || is_requester(request, actor);
    if !permitted {
        return Err(AppError::UnauthorizedActor(format!(
            "{} may not cancel request {}",
            actor.role, request.id
        )));
    }

    let now = Utc::now();
    request.cancellation = Some(Cancellation {
        cancelled_by: actor.name.clone(),
        reason,
        cancelled_at: now,
    });
    request.updated_at = now;
    Ok(())
}

/// Whether `actor` is the staff member who raised `request`.
#[must_use]
pub fn is_requester(request: &AccessRequest, actor: &Actor) -> bool {
    actor
        .pf_number
        .as_deref()
        .is_some_and(|pf| pf.eq_ignore_ascii_case(&request.pf_number))
}

fn describe(current: CurrentStage) -> String {
    match current {
        CurrentStage::Awaiting(stage) => format!("awaiting {stage}"),
        CurrentStage::Completed => "completed".into(),
        CurrentStage::Rejected(stage) => format!("rejected at {stage}"),
        CurrentStage::Cancelled => "cancelled".into(),
    }
}
