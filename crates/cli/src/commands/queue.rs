use serde::Serialize;

use hostdesk_core::{
    EmployeeApprovalStatus, EmployeeQueue, GuestRequest, RequestLifecycle, StatusFilter,
};

use crate::commands::{with_desk, CommandResult};

#[derive(Debug, Serialize)]
struct QueueOutput {
    employee: String,
    filter: String,
    search: String,
    pending: usize,
    requests: Vec<GuestRequest>,
}

/// Employee view: requests assigned to `employee`, filtered by approval status and search.
/// One-shot; the pending alert tone belongs to `watch`.
pub fn run(
    employee: &str,
    filter: StatusFilter<EmployeeApprovalStatus>,
    search: String,
) -> CommandResult {
    let queue = EmployeeQueue::new(employee).with_filter(filter).with_search(search);
    with_desk("queue", |desk| async move {
        let output = snapshot(&desk.lifecycle, &queue).await;
        Ok(CommandResult::success_with_data(
            "queue",
            format!("{} awaiting approval from {}", output.pending, output.employee),
            output,
        ))
    })
}

async fn snapshot(lifecycle: &RequestLifecycle, queue: &EmployeeQueue) -> QueueOutput {
    let records = lifecycle.requests().load().await;
    QueueOutput {
        employee: queue.employee.clone(),
        filter: queue.filter.to_string(),
        search: queue.search.clone(),
        pending: queue.pending_count(&records),
        requests: queue.project(&records),
    }
}
