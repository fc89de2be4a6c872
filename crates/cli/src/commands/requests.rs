use serde::Serialize;

use hostdesk_core::{
    Actor, ConfirmedDeletion, GuestRequest, ManagerDesk, NewGuestRequest, RequestId,
    RequestStats, RequestStatus, StatusFilter, TransitionOutcome, TransitionReport,
};

use crate::commands::{with_desk, CommandResult, Failure};

pub fn create(input: NewGuestRequest, operator: &str) -> CommandResult {
    let actor = Actor::operator(operator);
    with_desk("create", |desk| async move {
        let created = desk.lifecycle.create(input, &actor).await.map_err(Failure::operation)?;
        Ok(CommandResult::success_with_data(
            "create",
            format!("created request {} with status {}", created.id, created.status),
            created,
        ))
    })
}

#[derive(Debug, Serialize)]
struct ListOutput {
    filter: String,
    search: String,
    stats: RequestStats,
    requests: Vec<GuestRequest>,
}

/// Manager view: every request, filtered by exact status and free-text search.
pub fn list(filter: StatusFilter<RequestStatus>, search: String) -> CommandResult {
    with_desk("list", |desk| async move {
        let mut view = ManagerDesk::open(desk.lifecycle.clone(), Actor::operator("manager")).await;
        view.set_filter(filter);
        view.set_search(search);

        let output = ListOutput {
            filter: view.queue().filter.to_string(),
            search: view.queue().search.clone(),
            stats: view.stats(),
            requests: view.visible().to_vec(),
        };
        Ok(CommandResult::success_with_data(
            "list",
            format!("{} of {} requests shown", output.requests.len(), output.stats.total),
            output,
        ))
    })
}

pub fn approve(id: String, employee: &str) -> CommandResult {
    decide("approve", id, employee, true)
}

pub fn reject(id: String, employee: &str) -> CommandResult {
    decide("reject", id, employee, false)
}

fn decide(command: &'static str, id: String, employee: &str, approve: bool) -> CommandResult {
    let actor = Actor::operator(employee);
    let id = RequestId(id);
    with_desk(command, |desk| async move {
        let report = if approve {
            desk.lifecycle.approve(&id, &actor).await
        } else {
            desk.lifecycle.reject(&id, &actor).await
        }
        .map_err(Failure::operation)?;

        Ok(CommandResult::success_with_data(command, report_message(&report), report))
    })
}

fn report_message(report: &TransitionReport) -> String {
    let request = report.outcome.request();
    let mut message = match &report.outcome {
        TransitionOutcome::Applied(_) => format!(
            "request {} is now {} (employee approval {})",
            request.id,
            request.status,
            request.employee_approval_status.map(|status| status.as_str()).unwrap_or("none")
        ),
        TransitionOutcome::Unchanged(_) => {
            format!("request {} unchanged: employee approval is not pending", request.id)
        }
    };
    if !report.warnings.is_empty() {
        message.push_str(&format!(" ({} warning(s))", report.warnings.len()));
    }
    message
}

pub fn set_status(id: String, status: RequestStatus, operator: &str) -> CommandResult {
    let actor = Actor::operator(operator);
    let id = RequestId(id);
    with_desk("set-status", |desk| async move {
        let outcome =
            desk.lifecycle.set_status(&id, status, &actor).await.map_err(Failure::operation)?;
        let message = match &outcome {
            TransitionOutcome::Applied(request) => {
                format!("request {} set to {}", request.id, request.status)
            }
            TransitionOutcome::Unchanged(request) => {
                format!("request {} already {}", request.id, request.status)
            }
        };
        Ok(CommandResult::success_with_data("set-status", message, outcome))
    })
}

/// Irreversible; refuses to run without explicit confirmation.
pub fn delete(id: String, confirmed: bool, operator: &str) -> CommandResult {
    if !confirmed {
        return CommandResult::failure(
            "delete",
            "confirmation_required",
            format!("deleting request {id} is irreversible; pass --yes to confirm"),
            6,
        );
    }

    let actor = Actor::operator(operator);
    let confirmation = ConfirmedDeletion::confirm(RequestId(id));
    with_desk("delete", |desk| async move {
        let removed =
            desk.lifecycle.delete(confirmation, &actor).await.map_err(Failure::operation)?;
        Ok(CommandResult::success_with_data(
            "delete",
            format!("deleted request {}", removed.id),
            removed,
        ))
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use hostdesk_core::{
        GuestRequest, NewGuestRequest, RequestId, TransitionOutcome, TransitionReport,
    };

    use super::report_message;

    fn request() -> GuestRequest {
        NewGuestRequest {
            room: "204".to_string(),
            guest: "Layla".to_string(),
            request_type: "coffee".to_string(),
            assigned_employee: Some("emp1".to_string()),
            ..NewGuestRequest::default()
        }
        .into_request(RequestId("R1".to_string()), Utc::now())
    }

    #[test]
    fn unchanged_report_says_so() {
        let report = TransitionReport {
            outcome: TransitionOutcome::Unchanged(request()),
            cascade: None,
            notification: None,
            alert_stopped: false,
            warnings: Vec::new(),
        };
        assert_eq!(
            report_message(&report),
            "request R1 unchanged: employee approval is not pending"
        );
    }

    #[test]
    fn warnings_are_counted_in_the_message() {
        let report = TransitionReport {
            outcome: TransitionOutcome::Applied(request()),
            cascade: None,
            notification: None,
            alert_stopped: true,
            warnings: vec!["linked order C9 was not found".to_string()],
        };
        let message = report_message(&report);
        assert!(message.starts_with("request R1 is now awaiting_employee_approval"));
        assert!(message.ends_with("(1 warning(s))"));
    }
}
