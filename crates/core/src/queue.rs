//! Employee and manager request queues, and the live desks that keep them current.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::broadcast::Subscription;
use crate::domain::request::{
    EmployeeApprovalStatus, GuestRequest, Priority, RequestId, RequestStatus,
};
use crate::domain::Actor;
use crate::lifecycle::{
    ConfirmedDeletion, LifecycleError, RequestLifecycle, TransitionOutcome, TransitionReport,
};
use crate::store::CollectionKey;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "filter", content = "value")]
pub enum StatusFilter<S> {
    All,
    Only(S),
}

impl<S> Default for StatusFilter<S> {
    fn default() -> Self {
        Self::All
    }
}

impl<S: PartialEq> StatusFilter<S> {
    pub fn admits(&self, value: Option<&S>) -> bool {
        match self {
            Self::All => true,
            Self::Only(expected) => value == Some(expected),
        }
    }
}

impl<S> FromStr for StatusFilter<S>
where
    S: FromStr<Err = String>,
{
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        value.parse().map(Self::Only)
    }
}

impl<S: fmt::Display> fmt::Display for StatusFilter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Only(status) => status.fmt(f),
        }
    }
}

/// Case-insensitive substring match over `fields`; a blank term matches everything.
pub fn matches_search(term: &str, fields: &[&str]) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return true;
    }
    fields.iter().any(|field| field.to_lowercase().contains(&term))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmployeeQueue {
    pub employee: String,
    pub filter: StatusFilter<EmployeeApprovalStatus>,
    pub search: String,
}

impl EmployeeQueue {
    pub fn new(employee: impl Into<String>) -> Self {
        Self { employee: employee.into(), filter: StatusFilter::All, search: String::new() }
    }

    pub fn with_filter(mut self, filter: StatusFilter<EmployeeApprovalStatus>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    pub fn matches(&self, request: &GuestRequest) -> bool {
        request.assigned_employee.as_deref() == Some(self.employee.as_str())
            && self.filter.admits(request.employee_approval_status.as_ref())
            && matches_search(
                &self.search,
                &[request.room.as_str(), request.guest.as_str(), request.request_type.as_str()],
            )
    }

    pub fn project(&self, requests: &[GuestRequest]) -> Vec<GuestRequest> {
        project(requests, |request| self.matches(request))
    }

    /// Requests awaiting this employee, regardless of filter and search.
    pub fn pending_count(&self, requests: &[GuestRequest]) -> usize {
        requests.iter().filter(|request| request.awaits_approval_from(&self.employee)).count()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ManagerQueue {
    pub filter: StatusFilter<RequestStatus>,
    pub search: String,
}

impl ManagerQueue {
    pub fn with_filter(mut self, filter: StatusFilter<RequestStatus>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    pub fn matches(&self, request: &GuestRequest) -> bool {
        self.filter.admits(Some(&request.status))
            && matches_search(
                &self.search,
                &[
                    request.room.as_str(),
                    request.guest.as_str(),
                    request.description.as_str(),
                    request.request_type.as_str(),
                ],
            )
    }

    pub fn project(&self, requests: &[GuestRequest]) -> Vec<GuestRequest> {
        project(requests, |request| self.matches(request))
    }
}

/// Newest first; ties keep store order.
fn project<F>(requests: &[GuestRequest], keep: F) -> Vec<GuestRequest>
where
    F: Fn(&GuestRequest) -> bool,
{
    let mut visible: Vec<GuestRequest> =
        requests.iter().filter(|request| keep(request)).cloned().collect();
    visible.sort_by(|left, right| right.created_at.cmp(&left.created_at));
    visible
}

/// Dashboard counters for the manager page.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestStats {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub awaiting_employee_approval: usize,
    pub high_priority_open: usize,
}

impl RequestStats {
    pub fn from_requests(requests: &[GuestRequest]) -> Self {
        let mut by_status: BTreeMap<String, usize> =
            RequestStatus::ALL.iter().map(|status| (status.as_str().to_string(), 0)).collect();
        let mut stats = Self { total: requests.len(), ..Self::default() };

        for request in requests {
            *by_status.entry(request.status.as_str().to_string()).or_default() += 1;
            if request.employee_approval_status == Some(EmployeeApprovalStatus::Pending) {
                stats.awaiting_employee_approval += 1;
            }
            if request.priority == Priority::High && !request.status.is_terminal() {
                stats.high_priority_open += 1;
            }
        }

        stats.by_status = by_status;
        stats
    }
}

/// Live employee view: reloads on store changes and keeps the employee's alert in sync.
pub struct EmployeeDesk {
    lifecycle: Arc<RequestLifecycle>,
    actor: Actor,
    queue: EmployeeQueue,
    subscription: Subscription,
    records: Vec<GuestRequest>,
    visible: Vec<GuestRequest>,
}

impl EmployeeDesk {
    /// Subscribes before the first load so no change between the two is missed.
    pub async fn open(lifecycle: Arc<RequestLifecycle>, actor: Actor) -> Self {
        let subscription = lifecycle.broadcaster().subscribe();
        let queue = EmployeeQueue::new(actor.username.clone());
        let mut desk = Self {
            lifecycle,
            actor,
            queue,
            subscription,
            records: Vec::new(),
            visible: Vec::new(),
        };
        desk.refresh().await;
        desk
    }

    pub fn queue(&self) -> &EmployeeQueue {
        &self.queue
    }

    pub fn visible(&self) -> &[GuestRequest] {
        &self.visible
    }

    pub fn pending_count(&self) -> usize {
        self.queue.pending_count(&self.records)
    }

    pub fn set_filter(&mut self, filter: StatusFilter<EmployeeApprovalStatus>) {
        self.queue.filter = filter;
        self.visible = self.queue.project(&self.records);
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.queue.search = search.into();
        self.visible = self.queue.project(&self.records);
    }

    pub async fn refresh(&mut self) -> &[GuestRequest] {
        self.records = self.lifecycle.requests().load().await;
        self.visible = self.queue.project(&self.records);
        let pending = self.pending_count();
        self.lifecycle.alerts().sync(&self.queue.employee, pending);
        debug!(
            event_name = "queue.employee.refreshed",
            employee = %self.queue.employee,
            visible = self.visible.len(),
            pending,
            "employee desk refreshed"
        );
        &self.visible
    }

    /// Waits for the next change to the request collection and re-projects.
    /// Returns `None` once the broadcaster is gone.
    pub async fn next_change(&mut self) -> Option<&[GuestRequest]> {
        self.subscription.next_affecting(CollectionKey::GuestRequests).await?;
        Some(self.refresh().await)
    }

    pub async fn approve(&mut self, id: &RequestId) -> Result<TransitionReport, LifecycleError> {
        let report = self.lifecycle.approve(id, &self.actor).await?;
        self.refresh().await;
        Ok(report)
    }

    pub async fn reject(&mut self, id: &RequestId) -> Result<TransitionReport, LifecycleError> {
        let report = self.lifecycle.reject(id, &self.actor).await?;
        self.refresh().await;
        Ok(report)
    }
}

/// Live manager view over every request.
pub struct ManagerDesk {
    lifecycle: Arc<RequestLifecycle>,
    actor: Actor,
    queue: ManagerQueue,
    subscription: Subscription,
    records: Vec<GuestRequest>,
    visible: Vec<GuestRequest>,
}

impl ManagerDesk {
    pub async fn open(lifecycle: Arc<RequestLifecycle>, actor: Actor) -> Self {
        let subscription = lifecycle.broadcaster().subscribe();
        let mut desk = Self {
            lifecycle,
            actor,
            queue: ManagerQueue::default(),
            subscription,
            records: Vec::new(),
            visible: Vec::new(),
        };
        desk.refresh().await;
        desk
    }

    pub fn queue(&self) -> &ManagerQueue {
        &self.queue
    }

    pub fn visible(&self) -> &[GuestRequest] {
        &self.visible
    }

    pub fn stats(&self) -> RequestStats {
        RequestStats::from_requests(&self.records)
    }

    pub fn set_filter(&mut self, filter: StatusFilter<RequestStatus>) {
        self.queue.filter = filter;
        self.visible = self.queue.project(&self.records);
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.queue.search = search.into();
        self.visible = self.queue.project(&self.records);
    }

    pub async fn refresh(&mut self) -> &[GuestRequest] {
        self.records = self.lifecycle.requests().load().await;
        self.visible = self.queue.project(&self.records);
        debug!(
            event_name = "queue.manager.refreshed",
            visible = self.visible.len(),
            total = self.records.len(),
            "manager desk refreshed"
        );
        &self.visible
    }

    pub async fn next_change(&mut self) -> Option<&[GuestRequest]> {
        self.subscription.next_affecting(CollectionKey::GuestRequests).await?;
        Some(self.refresh().await)
    }

    pub async fn set_status(
        &mut self,
        id: &RequestId,
        status: RequestStatus,
    ) -> Result<TransitionOutcome, LifecycleError> {
        let outcome = self.lifecycle.set_status(id, status, &self.actor).await?;
        self.refresh().await;
        Ok(outcome)
    }

    pub async fn delete(
        &mut self,
        confirmation: ConfirmedDeletion,
    ) -> Result<GuestRequest, LifecycleError> {
        let removed = self.lifecycle.delete(confirmation, &self.actor).await?;
        self.refresh().await;
        Ok(removed)
    }
}
