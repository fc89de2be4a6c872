use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::alert::AlertRegistry;
use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, TracingAuditSink};
use crate::broadcast::ChangeBroadcaster;
use crate::domain::notification::{
    ApprovalAction, ManagerNotification, NotificationEntry, NotificationId,
};
use crate::domain::order::{LinkedOrder, LinkedSection, OrderId};
use crate::domain::request::{GuestRequest, NewGuestRequest, RequestId, RequestStatus};
use crate::domain::Actor;
use crate::lifecycle::transitions::{self, Decision, Transition};
use crate::notify::{NoopNotificationSender, NotificationPayload, NotificationSender};
use crate::store::{
    Change, Collection, CollectionKey, CollectionStore, StoreError, DEFAULT_RETRY_LIMIT,
};

const MANAGER_TARGET: &str = "manager";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("guest request `{id}` was not found")]
    NotFound { id: RequestId },
    #[error("invalid guest request: {0}")]
    Invalid(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LifecycleSettings {
    pub notifications_enabled: bool,
    pub notification_channel: String,
    pub retry_limit: u32,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            notifications_enabled: false,
            notification_channel: "reception".to_string(),
            retry_limit: DEFAULT_RETRY_LIMIT,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "request", rename_all = "snake_case")]
pub enum TransitionOutcome {
    Applied(GuestRequest),
    /// The precondition did not hold; nothing was written.
    Unchanged(GuestRequest),
}

impl TransitionOutcome {
    pub fn request(&self) -> &GuestRequest {
        match self {
            Self::Applied(request) | Self::Unchanged(request) => request,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CascadeOutcome {
    Updated { section: LinkedSection, order_id: OrderId, status: String },
    OrderMissing { section: LinkedSection, order_id: OrderId },
    Failed { section: LinkedSection, order_id: OrderId, error: String },
}

/// Everything an approve/reject did, side effects included.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionReport {
    pub outcome: TransitionOutcome,
    pub cascade: Option<CascadeOutcome>,
    pub notification: Option<ManagerNotification>,
    pub alert_stopped: bool,
    pub warnings: Vec<String>,
}

impl TransitionReport {
    fn unchanged(request: GuestRequest) -> Self {
        Self {
            outcome: TransitionOutcome::Unchanged(request),
            cascade: None,
            notification: None,
            alert_stopped: false,
            warnings: Vec::new(),
        }
    }
}

/// Proof that the operator confirmed an irreversible deletion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmedDeletion {
    id: RequestId,
}

impl ConfirmedDeletion {
    pub fn confirm(id: RequestId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> &RequestId {
        &self.id
    }
}

/// Owns every guest request transition and its side effects.
pub struct RequestLifecycle {
    store: Arc<dyn CollectionStore>,
    requests: Collection<GuestRequest>,
    notifications: Collection<NotificationEntry>,
    broadcaster: ChangeBroadcaster,
    alerts: Arc<AlertRegistry>,
    notifier: Arc<dyn NotificationSender>,
    audit: Arc<dyn AuditSink>,
    settings: LifecycleSettings,
}

impl RequestLifecycle {
    pub fn new(
        store: Arc<dyn CollectionStore>,
        broadcaster: ChangeBroadcaster,
        alerts: Arc<AlertRegistry>,
    ) -> Self {
        let settings = LifecycleSettings::default();
        Self {
            requests: Collection::new(Arc::clone(&store), CollectionKey::GuestRequests)
                .with_retry_limit(settings.retry_limit),
            notifications: Collection::new(Arc::clone(&store), CollectionKey::Notifications)
                .with_retry_limit(settings.retry_limit),
            store,
            broadcaster,
            alerts,
            notifier: Arc::new(NoopNotificationSender),
            audit: Arc::new(TracingAuditSink),
            settings,
        }
    }

    pub fn with_settings(mut self, settings: LifecycleSettings) -> Self {
        self.requests = self.requests.with_retry_limit(settings.retry_limit);
        self.notifications = self.notifications.with_retry_limit(settings.retry_limit);
        self.settings = settings;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSender>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn broadcaster(&self) -> &ChangeBroadcaster {
        &self.broadcaster
    }

    pub fn alerts(&self) -> &Arc<AlertRegistry> {
        &self.alerts
    }

    pub fn requests(&self) -> &Collection<GuestRequest> {
        &self.requests
    }

    pub fn orders(&self, section: LinkedSection) -> Collection<LinkedOrder> {
        Collection::new(Arc::clone(&self.store), section.collection())
            .with_retry_limit(self.settings.retry_limit)
    }

    pub async fn find(&self, id: &RequestId) -> Option<GuestRequest> {
        self.requests.find(id.as_str()).await
    }

    pub async fn pending_count_for(&self, employee: &str) -> usize {
        self.requests
            .load()
            .await
            .iter()
            .filter(|request| request.awaits_approval_from(employee))
            .count()
    }

    /// Creator flow: validates, assigns identity and initial state, appends.
    pub async fn create(
        &self,
        input: NewGuestRequest,
        actor: &Actor,
    ) -> Result<GuestRequest, LifecycleError> {
        input.validate().map_err(LifecycleError::Invalid)?;
        let correlation_id = new_correlation_id();
        let created_at = Utc::now();

        let created = self
            .requests
            .modify(|records| {
                let mut id = RequestId::generate();
                while records.iter().any(|existing| existing.id == id) {
                    id = RequestId::generate();
                }
                let request = input.clone().into_request(id, created_at);
                records.push(request.clone());
                Change::Commit(request)
            })
            .await?;

        self.broadcaster.notify(CollectionKey::GuestRequests);
        info!(
            event_name = "lifecycle.request.created",
            correlation_id = %correlation_id,
            request_id = %created.id,
            room = %created.room,
            status = %created.status,
            assigned_employee = created.assigned_employee.as_deref().unwrap_or("none"),
            "guest request created"
        );
        self.audit.emit(
            AuditEvent::new(
                Some(created.id.clone()),
                correlation_id,
                "lifecycle.request.created",
                AuditCategory::Lifecycle,
                actor.username.clone(),
                AuditOutcome::Success,
            )
            .with_metadata("status", created.status.as_str()),
        );

        Ok(created)
    }

    pub async fn approve(
        &self,
        id: &RequestId,
        actor: &Actor,
    ) -> Result<TransitionReport, LifecycleError> {
        self.decide(id, actor, ApprovalAction::Approved).await
    }

    pub async fn reject(
        &self,
        id: &RequestId,
        actor: &Actor,
    ) -> Result<TransitionReport, LifecycleError> {
        self.decide(id, actor, ApprovalAction::Rejected).await
    }

    /// Manual override; any status, no side effects beyond the write and the broadcast.
    pub async fn set_status(
        &self,
        id: &RequestId,
        status: RequestStatus,
        actor: &Actor,
    ) -> Result<TransitionOutcome, LifecycleError> {
        let correlation_id = new_correlation_id();
        let transition = Transition::SetStatus(status);
        let (outcome, decision) = self.transition_record(id, transition, Utc::now()).await?;

        self.record_decision(&outcome, &decision, transition, actor, &correlation_id);
        if outcome.is_applied() {
            self.broadcaster.notify(CollectionKey::GuestRequests);
        }
        Ok(outcome)
    }

    pub async fn delete(
        &self,
        confirmation: ConfirmedDeletion,
        actor: &Actor,
    ) -> Result<GuestRequest, LifecycleError> {
        let correlation_id = new_correlation_id();
        let id = confirmation.id;

        let removed = self
            .requests
            .modify(|records| match records.iter().position(|request| request.id == id) {
                Some(index) => Change::Commit(Some(records.remove(index))),
                None => Change::Discard(None),
            })
            .await?
            .ok_or_else(|| LifecycleError::NotFound { id: id.clone() })?;

        self.broadcaster.notify(CollectionKey::GuestRequests);
        info!(
            event_name = "lifecycle.request.deleted",
            correlation_id = %correlation_id,
            request_id = %removed.id,
            actor = %actor.username,
            "guest request deleted"
        );
        self.audit.emit(AuditEvent::new(
            Some(removed.id.clone()),
            correlation_id,
            "lifecycle.request.deleted",
            AuditCategory::Lifecycle,
            actor.username.clone(),
            AuditOutcome::Success,
        ));

        if let Some(employee) = removed.assigned_employee.as_deref() {
            self.silence_if_idle(employee).await;
        }

        Ok(removed)
    }

    /// Employee approval notifications; entries other subsystems keep under the same key are
    /// skipped.
    pub async fn manager_notifications(&self) -> Vec<ManagerNotification> {
        let entries = self.notifications.load().await;
        entries.into_iter().filter_map(NotificationEntry::into_manager).collect()
    }

    pub async fn unread_notification_count(&self) -> usize {
        self.manager_notifications().await.iter().filter(|notification| !notification.read).count()
    }

    /// Marks one notification read. Returns `false` when it was already read.
    pub async fn mark_notification_read(&self, id: &NotificationId) -> Result<bool, StoreError> {
        let changed = self
            .notifications
            .modify(|entries| {
                let target = entries.iter_mut().find_map(|entry| match entry {
                    NotificationEntry::Manager(record) if record.id == *id => Some(record),
                    _ => None,
                });
                match target {
                    Some(record) if !record.read => {
                        record.read = true;
                        Change::Commit(Some(true))
                    }
                    Some(_) => Change::Discard(Some(false)),
                    None => Change::Discard(None),
                }
            })
            .await?;

        match changed {
            Some(true) => {
                self.broadcaster.notify(CollectionKey::Notifications);
                Ok(true)
            }
            Some(false) => Ok(false),
            None => {
                debug!(
                    event_name = "lifecycle.notification.missing",
                    notification_id = %id.0,
                    "mark-read target not found"
                );
                Ok(false)
            }
        }
    }

    async fn decide(
        &self,
        id: &RequestId,
        actor: &Actor,
        action: ApprovalAction,
    ) -> Result<TransitionReport, LifecycleError> {
        let correlation_id = new_correlation_id();
        let now = Utc::now();
        let transition = match action {
            ApprovalAction::Approved => Transition::Approve,
            ApprovalAction::Rejected => Transition::Reject,
        };
        let (outcome, decision) = self.transition_record(id, transition, now).await?;
        self.record_decision(&outcome, &decision, transition, actor, &correlation_id);

        let request = match outcome {
            TransitionOutcome::Unchanged(request) => {
                return Ok(TransitionReport::unchanged(request));
            }
            TransitionOutcome::Applied(request) => request,
        };
        self.broadcaster.notify(CollectionKey::GuestRequests);

        let mut warnings = Vec::new();

        let cascade = match request.linked_order() {
            Some((section, order_id)) => {
                let cascade = self.cascade(section, order_id, action, &correlation_id).await;
                if let CascadeOutcome::Failed { error, .. } = &cascade {
                    warnings.push(format!("linked order cascade failed: {error}"));
                }
                if let CascadeOutcome::OrderMissing { order_id, .. } = &cascade {
                    warnings.push(format!("linked order `{order_id}` was not found"));
                }
                Some(cascade)
            }
            None => None,
        };

        let notification = self
            .emit_manager_notification(&request, action, actor, now, &correlation_id, &mut warnings)
            .await;

        let alert_stopped = match request.assigned_employee.as_deref() {
            Some(employee) => self.silence_if_idle(employee).await,
            None => false,
        };

        Ok(TransitionReport {
            outcome: TransitionOutcome::Applied(request),
            cascade,
            notification,
            alert_stopped,
            warnings,
        })
    }

    async fn transition_record(
        &self,
        id: &RequestId,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<(TransitionOutcome, Decision), LifecycleError> {
        let result = self
            .requests
            .modify(|records| {
                let Some(record) = records.iter_mut().find(|record| record.id == *id) else {
                    return Change::Discard(None);
                };
                let decision = transitions::apply(record, transition, now);
                if matches!(decision, Decision::Applied { .. }) {
                    Change::Commit(Some((TransitionOutcome::Applied(record.clone()), decision)))
                } else {
                    Change::Discard(Some((TransitionOutcome::Unchanged(record.clone()), decision)))
                }
            })
            .await?;

        result.ok_or_else(|| {
            debug!(
                event_name = "lifecycle.request.missing",
                request_id = %id,
                transition = transition.event_name(),
                "transition target not found"
            );
            LifecycleError::NotFound { id: id.clone() }
        })
    }

    fn record_decision(
        &self,
        outcome: &TransitionOutcome,
        decision: &Decision,
        transition: Transition,
        actor: &Actor,
        correlation_id: &str,
    ) {
        let request = outcome.request();
        match decision {
            Decision::Applied { from, to } => {
                info!(
                    event_name = transition.event_name(),
                    correlation_id,
                    request_id = %request.id,
                    actor = %actor.username,
                    from = %from,
                    to = %to,
                    "guest request transition applied"
                );
                self.audit.emit(
                    AuditEvent::new(
                        Some(request.id.clone()),
                        correlation_id,
                        transition.event_name(),
                        AuditCategory::Lifecycle,
                        actor.username.clone(),
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", from.as_str())
                    .with_metadata("to", to.as_str()),
                );
            }
            Decision::Unchanged { reason } => {
                debug!(
                    event_name = transition.event_name(),
                    correlation_id,
                    request_id = %request.id,
                    actor = %actor.username,
                    reason = reason.as_str(),
                    "guest request transition skipped"
                );
                self.audit.emit(
                    AuditEvent::new(
                        Some(request.id.clone()),
                        correlation_id,
                        transition.event_name(),
                        AuditCategory::Lifecycle,
                        actor.username.clone(),
                        AuditOutcome::Skipped,
                    )
                    .with_metadata("reason", reason.as_str()),
                );
            }
        }
    }

    async fn cascade(
        &self,
        section: LinkedSection,
        order_id: &OrderId,
        action: ApprovalAction,
        correlation_id: &str,
    ) -> CascadeOutcome {
        let result = self
            .orders(section)
            .modify(|orders| match orders.iter_mut().find(|order| order.id == *order_id) {
                Some(order) => {
                    match action {
                        ApprovalAction::Approved => order.mark_approved(section),
                        ApprovalAction::Rejected => order.mark_rejected(section),
                    }
                    Change::Commit(Some(order.status.clone()))
                }
                None => Change::Discard(None),
            })
            .await;

        let outcome = match result {
            Ok(Some(status)) => {
                self.broadcaster.notify(section.collection());
                CascadeOutcome::Updated { section, order_id: order_id.clone(), status }
            }
            Ok(None) => CascadeOutcome::OrderMissing { section, order_id: order_id.clone() },
            Err(error) => CascadeOutcome::Failed {
                section,
                order_id: order_id.clone(),
                error: error.to_string(),
            },
        };

        let audit_outcome = match &outcome {
            CascadeOutcome::Updated { status, .. } => {
                info!(
                    event_name = "lifecycle.cascade.order_updated",
                    correlation_id,
                    section = section.as_str(),
                    order_id = %order_id,
                    status = %status,
                    "linked order updated"
                );
                AuditOutcome::Success
            }
            CascadeOutcome::OrderMissing { .. } => {
                warn!(
                    event_name = "lifecycle.cascade.order_missing",
                    correlation_id,
                    section = section.as_str(),
                    order_id = %order_id,
                    "linked order not found; request transition kept"
                );
                AuditOutcome::Skipped
            }
            CascadeOutcome::Failed { error, .. } => {
                warn!(
                    event_name = "lifecycle.cascade.failed",
                    correlation_id,
                    section = section.as_str(),
                    order_id = %order_id,
                    error = %error,
                    "linked order cascade failed; request transition kept"
                );
                AuditOutcome::Failed
            }
        };
        self.audit.emit(
            AuditEvent::new(
                None,
                correlation_id,
                "lifecycle.cascade",
                AuditCategory::Cascade,
                "lifecycle-engine",
                audit_outcome,
            )
            .with_metadata("section", section.as_str())
            .with_metadata("order_id", order_id.0.clone())
            .with_metadata("action", action.as_str()),
        );

        outcome
    }

    async fn emit_manager_notification(
        &self,
        request: &GuestRequest,
        action: ApprovalAction,
        actor: &Actor,
        now: DateTime<Utc>,
        correlation_id: &str,
        warnings: &mut Vec<String>,
    ) -> Option<ManagerNotification> {
        let notification = ManagerNotification::for_decision(request, action, &actor.username, now);

        let appended = match self.notifications.append(NotificationEntry::Manager(notification.clone())).await {
            Ok(()) => {
                self.broadcaster.notify(CollectionKey::Notifications);
                true
            }
            Err(error) => {
                warn!(
                    event_name = "lifecycle.notification.append_failed",
                    correlation_id,
                    request_id = %request.id,
                    error = %error,
                    "manager notification could not be recorded"
                );
                warnings.push(format!("manager notification could not be recorded: {error}"));
                false
            }
        };

        if self.settings.notifications_enabled {
            let payload = NotificationPayload::from(&notification);
            if let Err(error) = self
                .notifier
                .send_notification(&self.settings.notification_channel, MANAGER_TARGET, &payload)
                .await
            {
                warn!(
                    event_name = "lifecycle.notification.send_failed",
                    correlation_id,
                    request_id = %request.id,
                    channel = %self.settings.notification_channel,
                    error = %error,
                    "external manager notification failed"
                );
                warnings.push(format!("external manager notification failed: {error}"));
            }
        }

        self.audit.emit(
            AuditEvent::new(
                Some(request.id.clone()),
                correlation_id,
                "lifecycle.notification.emitted",
                AuditCategory::Notification,
                actor.username.clone(),
                if appended { AuditOutcome::Success } else { AuditOutcome::Failed },
            )
            .with_metadata("action", action.as_str()),
        );

        appended.then_some(notification)
    }

    /// Stops the employee's alert once nothing awaits their approval anymore.
    async fn silence_if_idle(&self, employee: &str) -> bool {
        let remaining = self.pending_count_for(employee).await;
        if remaining > 0 {
            return false;
        }
        self.alerts.stop(employee)
    }
}

fn new_correlation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
