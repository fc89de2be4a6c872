use std::time::Duration;

use serde::Serialize;

use hostdesk_core::{Actor, EmployeeDesk, GuestRequest, ManagerDesk, RequestStats};

use crate::commands::{with_desk, CommandResult};

const STORE_POLL_INTERVAL: Duration = Duration::from_millis(500);

enum Watched {
    Employee(EmployeeDesk),
    Manager(ManagerDesk),
}

#[derive(Debug, Serialize)]
struct Snapshot<'a> {
    view: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    employee: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pending: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<RequestStats>,
    requests: &'a [GuestRequest],
}

impl Watched {
    async fn next_change(&mut self) -> bool {
        match self {
            Self::Employee(desk) => desk.next_change().await.is_some(),
            Self::Manager(desk) => desk.next_change().await.is_some(),
        }
    }

    fn snapshot(&self) -> Snapshot<'_> {
        match self {
            Self::Employee(desk) => Snapshot {
                view: "employee",
                employee: Some(desk.queue().employee.as_str()),
                pending: Some(desk.pending_count()),
                stats: None,
                requests: desk.visible(),
            },
            Self::Manager(desk) => Snapshot {
                view: "manager",
                employee: None,
                pending: None,
                stats: Some(desk.stats()),
                requests: desk.visible(),
            },
        }
    }

    fn print(&self) {
        match serde_json::to_string(&self.snapshot()) {
            Ok(line) => println!("{line}"),
            Err(error) => tracing::warn!(
                event_name = "cli.watch.snapshot_failed",
                error = %error,
                "snapshot could not be serialized"
            ),
        }
    }
}

/// Streams one JSON snapshot line per change until interrupted or `max_events` changes
/// were seen. With `employee`, the alert tone plays while that employee has pending
/// approvals.
pub fn run(employee: Option<String>, max_events: Option<u32>) -> CommandResult {
    with_desk("watch", |desk| async move {
        let lifecycle = desk.lifecycle.clone();
        let _poller =
            lifecycle.broadcaster().watch_store(desk.store.clone(), STORE_POLL_INTERVAL);

        let mut watched = match employee.as_deref() {
            Some(employee) => {
                let actor = Actor::operator(employee);
                Watched::Employee(EmployeeDesk::open(lifecycle.clone(), actor).await)
            }
            None => {
                let actor = Actor::operator("manager");
                Watched::Manager(ManagerDesk::open(lifecycle.clone(), actor).await)
            }
        };
        watched.print();

        let mut seen = 0u32;
        while max_events.map_or(true, |limit| seen < limit) {
            let changed = tokio::select! {
                changed = watched.next_change() => changed,
                _ = tokio::signal::ctrl_c() => false,
            };
            if !changed {
                break;
            }
            seen += 1;
            watched.print();
        }

        if let Some(employee) = employee.as_deref() {
            lifecycle.alerts().stop(employee);
        }
        Ok(CommandResult::success("watch", format!("watch ended after {seen} change(s)")))
    })
}
