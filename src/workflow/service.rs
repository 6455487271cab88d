//! Workflow service: the sequencer wired to persistence, identity,
//! notification, and audit collaborators.
//!
//! Every request mutation is a single load-validate-save transaction. A
//! write conflict is retried once against freshly loaded state; the
//! retry re-runs validation, so a lost race surfaces as the domain error
//! the winner's write implies (e.g. a stage gate violation).

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, info_span, warn, Instrument};

use crate::audit::{AuditEntry, AuditEventType, AuditLogger};
use crate::identity::IdentityResolver;
use crate::models::actor::Role;
use crate::models::assignment::TaskAssignment;
use crate::models::request::{AccessRequest, CurrentStage, NewAccessRequest};
use crate::models::stage::{Decision, StageName};
use crate::notify::NotificationDispatcher;
use crate::persistence::assignment_repo::AssignmentRepo;
use crate::persistence::db::Database;
use crate::persistence::request_repo::RequestRepo;
use crate::workflow::{assignment, sequencer, StageAction};
use crate::{AppError, Result};

/// A request together with its derived status and assignments.
#[derive(Debug, Clone, Serialize)]
pub struct RequestStatus {
    /// Where the request stands.
    pub current: CurrentStage,
    /// The full request.
    pub request: AccessRequest,
    /// Every implementation assignment, oldest first.
    pub assignments: Vec<TaskAssignment>,
}

/// Entry point for all workflow operations.
pub struct WorkflowService {
    requests: RequestRepo,
    assignments: AssignmentRepo,
    identity: Arc<dyn IdentityResolver>,
    notifier: Option<NotificationDispatcher>,
    audit: Option<Arc<dyn AuditLogger>>,
}

impl WorkflowService {
    /// Build a service with no notifier and no audit trail.
    #[must_use]
    pub fn new(db: Arc<Database>, identity: Arc<dyn IdentityResolver>) -> Self {
        Self {
            requests: RequestRepo::new(Arc::clone(&db)),
            assignments: AssignmentRepo::new(db),
            identity,
            notifier: None,
            audit: None,
        }
    }

    /// Dispatch stage transitions through `notifier`.
    #[must_use]
    pub fn with_notifier(mut self, notifier: NotificationDispatcher) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Record workflow events to `audit`.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditLogger>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Create a new request with every stage pending.
    ///
    /// Staff may only submit for their own PF number.
    ///
    /// # Errors
    ///
    /// `UnauthorizedActor` for an unknown token or a staff member filing
    /// for someone else, `Validation` for malformed input, `Db` on failure.
    pub async fn submit(&self, token: &str, input: NewAccessRequest) -> Result<AccessRequest> {
        let actor = self.identity.resolve(token)?;
        let span = info_span!("submit_request", pf_number = %input.pf_number, actor = %actor.name);

        async move {
            if actor.role == Role::Staff
                && !actor
                    .pf_number
                    .as_deref()
                    .is_some_and(|pf| pf.eq_ignore_ascii_case(input.pf_number.trim()))
            {
                return Err(AppError::UnauthorizedActor(
                    "staff may only submit requests for themselves".into(),
                ));
            }
            input.validate()?;

            let request = self.requests.insert(&AccessRequest::new(input)).await?;
            info!(request_id = %request.id, "access request submitted");
            self.audit(
                AuditEntry::new(AuditEventType::RequestSubmitted)
                    .with_request_id(&request.id)
                    .with_actor(&actor),
            );
            Ok(request)
        }
        .instrument(span)
        .await
    }

    /// Approve or reject one stage.
    ///
    /// On success the stage transition is handed to the notifier after the
    /// transaction commits.
    ///
    /// # Errors
    ///
    /// `StageGateViolation`, `UnauthorizedActor`, or `Validation` from the
    /// sequencer; `NotFound` for an unknown request; `Conflict` if the write
    /// lost a race twice.
    pub async fn decide(
        &self,
        token: &str,
        request_id: &str,
        action: StageAction,
    ) -> Result<AccessRequest> {
        let actor = self.identity.resolve(token)?;
        let span = info_span!(
            "decide_stage",
            request_id,
            stage = %action.stage,
            decision = action.decision.as_str(),
            actor = %actor.name,
        );

        async move {
            let (request, event) = self
                .mutate(request_id, |request| {
                    sequencer::apply_decision(request, action.clone(), &actor)
                })
                .await?;

            info!(current = sequencer::current_stage(&request).label(), "stage decided");
            let event_type = match event.decision {
                Decision::Approve => AuditEventType::StageApproved,
                Decision::Reject => AuditEventType::StageRejected,
            };
            self.audit(
                AuditEntry::new(event_type)
                    .with_request_id(request_id)
                    .with_stage(event.stage)
                    .with_actor(&actor)
                    .with_reason(event.comment.clone()),
            );
            if let Some(notifier) = &self.notifier {
                notifier.notify(event).await;
            }
            Ok(request)
        }
        .instrument(span)
        .await
    }

    /// Reopen a rejected stage.
    ///
    /// # Errors
    ///
    /// `InvalidResubmission` unless `stage` is currently rejected,
    /// `UnauthorizedActor` unless the caller is the requester or an admin.
    pub async fn resubmit(
        &self,
        token: &str,
        request_id: &str,
        stage: StageName,
    ) -> Result<AccessRequest> {
        let actor = self.identity.resolve(token)?;
        let span = info_span!("resubmit_request", request_id, stage = %stage, actor = %actor.name);

        async move {
            let (request, ()) = self
                .mutate(request_id, |request| {
                    sequencer::resubmit(request, stage, &actor)
                })
                .await?;
            info!(
                resubmissions = request.resubmission_count,
                "request resubmitted"
            );
            self.audit(
                AuditEntry::new(AuditEventType::Resubmitted)
                    .with_request_id(request_id)
                    .with_stage(stage)
                    .with_actor(&actor),
            );
            Ok(request)
        }
        .instrument(span)
        .await
    }

    /// Withdraw a request before completion.
    ///
    /// Any active implementation assignment is cancelled in the same
    /// transaction.
    ///
    /// # Errors
    ///
    /// `StageGateViolation` if already completed or cancelled,
    /// `UnauthorizedActor` for a caller who may not cancel.
    pub async fn cancel(
        &self,
        token: &str,
        request_id: &str,
        reason: Option<String>,
    ) -> Result<AccessRequest> {
        let actor = self.identity.resolve(token)?;
        let span = info_span!("cancel_request", request_id, actor = %actor.name);

        async move {
            let (request, ()) = self
                .mutate_with_tasks(request_id, |request, tasks| {
                    sequencer::cancel(request, &actor, reason.clone())?;
                    for task in tasks.iter_mut().filter(|task| task.status.is_active()) {
                        task.cancel(Some("request cancelled".into()))?;
                    }
                    Ok(())
                })
                .await?;

            info!("request cancelled");
            self.audit(
                AuditEntry::new(AuditEventType::RequestCancelled)
                    .with_request_id(request_id)
                    .with_actor(&actor)
                    .with_reason(reason),
            );
            Ok(request)
        }
        .instrument(span)
        .await
    }

    /// Current status of one request.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown request.
    pub async fn status(&self, request_id: &str) -> Result<RequestStatus> {
        let request = self
            .requests
            .load(request_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("access request {request_id} not found")))?;
        self.status_of(request).await
    }

    /// Requests the caller can act on now.
    ///
    /// Stage approvers see requests awaiting their stage, admins see every
    /// open request, staff see their own requests.
    ///
    /// # Errors
    ///
    /// `UnauthorizedActor` for an unknown token, `Db` on failure.
    pub async fn queue_for(&self, token: &str) -> Result<Vec<RequestStatus>> {
        let actor = self.identity.resolve(token)?;

        let requests = match actor.role {
            Role::Staff => match actor.pf_number.as_deref() {
                Some(pf) => self.requests.list_by_pf_number(pf).await?,
                None => Vec::new(),
            },
            Role::Admin => self.requests.list_open().await?,
            role => self
                .requests
                .list_open()
                .await?
                .into_iter()
                .filter(|request| {
                    matches!(
                        sequencer::current_stage(request),
                        CurrentStage::Awaiting(stage) if stage.authorized_role() == role
                    )
                })
                .collect(),
        };

        let mut queue = Vec::with_capacity(requests.len());
        for request in requests {
            queue.push(self.status_of(request).await?);
        }
        Ok(queue)
    }

    /// Assign the officer with `officer_pf_number` to implement a request.
    ///
    /// # Errors
    ///
    /// `UnauthorizedActor`, `StageGateViolation`, or `AlreadyAssigned` from
    /// the assignment rules; `NotFound` for an unknown request or officer.
    pub async fn assign_task(
        &self,
        token: &str,
        request_id: &str,
        officer_pf_number: &str,
    ) -> Result<TaskAssignment> {
        let assigner = self.identity.resolve(token)?;
        let officer = self.identity.lookup(officer_pf_number)?;
        let span = info_span!("assign_task", request_id, officer = %officer.name);

        async move {
            let (_, task) = self
                .mutate_with_tasks(request_id, |request, tasks| {
                    let task = assignment::assign(request, tasks.as_slice(), &assigner, &officer)?;
                    tasks.push(task.clone());
                    Ok(task)
                })
                .await?;

            info!(assignment_id = %task.id, "task assigned");
            self.audit(
                AuditEntry::new(AuditEventType::TaskAssigned)
                    .with_request_id(request_id)
                    .with_assignment(&task.id)
                    .with_actor(&assigner),
            );
            Ok(task)
        }
        .instrument(span)
        .await
    }

    /// The assigned officer starts work.
    ///
    /// # Errors
    ///
    /// `UnauthorizedActor` or `InvalidTransition` from the assignment rules.
    pub async fn start_task(&self, token: &str, assignment_id: &str) -> Result<TaskAssignment> {
        self.update_task(token, assignment_id, AuditEventType::TaskStarted, None, |task, actor| {
            assignment::start(task, actor)
        })
        .await
    }

    /// The assigned officer finishes work.
    ///
    /// # Errors
    ///
    /// `UnauthorizedActor` or `InvalidTransition` from the assignment rules.
    pub async fn complete_task(
        &self,
        token: &str,
        assignment_id: &str,
        notes: Option<String>,
    ) -> Result<TaskAssignment> {
        self.update_task(
            token,
            assignment_id,
            AuditEventType::TaskCompleted,
            notes.clone(),
            |task, actor| assignment::complete(task, actor, notes.clone()),
        )
        .await
    }

    /// Withdraw an assignment.
    ///
    /// # Errors
    ///
    /// `UnauthorizedActor` or `InvalidTransition` from the assignment rules.
    pub async fn cancel_task(
        &self,
        token: &str,
        assignment_id: &str,
        reason: Option<String>,
    ) -> Result<TaskAssignment> {
        self.update_task(
            token,
            assignment_id,
            AuditEventType::TaskCancelled,
            reason.clone(),
            |task, actor| assignment::cancel(task, actor, reason.clone()),
        )
        .await
    }

    /// Re-queue notifications that were never delivered.
    ///
    /// Returns the number re-queued, or zero when notifications are off.
    ///
    /// # Errors
    ///
    /// `Db` if listing fails, `Notify` if the worker has stopped.
    pub async fn retry_notifications(&self) -> Result<usize> {
        match &self.notifier {
            Some(notifier) => notifier.retry_undelivered().await,
            None => Ok(0),
        }
    }

    async fn status_of(&self, request: AccessRequest) -> Result<RequestStatus> {
        let assignments = self.assignments.list_for_request(&request.id).await?;
        Ok(RequestStatus {
            current: sequencer::current_stage(&request),
            request,
            assignments,
        })
    }

    async fn mutate<T, F>(&self, request_id: &str, mutate: F) -> Result<(AccessRequest, T)>
    where
        F: Fn(&mut AccessRequest) -> Result<T>,
    {
        match self.requests.update_with(request_id, &mutate).await {
            Err(AppError::Conflict(msg)) => {
                warn!(request_id, %msg, "write conflict; retrying with fresh state");
                self.requests.update_with(request_id, &mutate).await
            }
            other => other,
        }
    }

    async fn mutate_with_tasks<T, F>(&self, request_id: &str, mutate: F) -> Result<(AccessRequest, T)>
    where
        F: Fn(&mut AccessRequest, &mut Vec<TaskAssignment>) -> Result<T>,
    {
        let outcome = match self.requests.update_with_tasks(request_id, &mutate).await {
            Err(AppError::Conflict(msg)) => {
                warn!(request_id, %msg, "write conflict; retrying with fresh state");
                self.requests.update_with_tasks(request_id, &mutate).await
            }
            other => other,
        };
        outcome.map(|(request, _, value)| (request, value))
    }

    async fn update_task<F>(
        &self,
        token: &str,
        assignment_id: &str,
        event_type: AuditEventType,
        reason: Option<String>,
        apply: F,
    ) -> Result<TaskAssignment>
    where
        F: FnOnce(&mut TaskAssignment, &crate::models::actor::Actor) -> Result<()>,
    {
        let actor = self.identity.resolve(token)?;
        let mut task = self
            .assignments
            .get_by_id(assignment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("assignment {assignment_id} not found")))?;
        let previous = task.status;

        apply(&mut task, &actor)?;
        self.assignments.update_lifecycle(&task, previous).await?;

        info!(assignment_id, status = %task.status, actor = %actor.name, "assignment updated");
        self.audit(
            AuditEntry::new(event_type)
                .with_request_id(&task.request_id)
                .with_assignment(&task.id)
                .with_actor(&actor)
                .with_reason(reason),
        );
        Ok(task)
    }

    fn audit(&self, entry: AuditEntry) {
        if let Some(audit) = &self.audit {
            if let Err(err) = audit.log_entry(entry) {
                warn!(%err, "failed to write audit entry");
            }
        }
    }
}
