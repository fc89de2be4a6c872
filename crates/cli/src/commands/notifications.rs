use serde::Serialize;

use hostdesk_core::{ManagerNotification, NotificationId};

use crate::commands::{with_desk, CommandResult, Failure};

#[derive(Debug, Serialize)]
struct NotificationsOutput {
    unread: usize,
    notifications: Vec<ManagerNotification>,
}

/// Lists manager notifications newest first, optionally marking one read beforehand.
pub fn run(mark_read: Option<String>) -> CommandResult {
    with_desk("notifications", |desk| async move {
        let mut marked = None;
        if let Some(id) = mark_read {
            let id = NotificationId(id);
            let changed =
                desk.lifecycle.mark_notification_read(&id).await.map_err(Failure::operation)?;
            marked = Some((id, changed));
        }

        let mut notifications = desk.lifecycle.manager_notifications().await;
        notifications.sort_by(|left, right| right.time.cmp(&left.time));
        let unread = notifications.iter().filter(|notification| !notification.read).count();

        let message = match marked {
            Some((id, true)) => format!("marked {} read; {unread} unread", id.0),
            Some((id, false)) => format!("{} was already read or missing; {unread} unread", id.0),
            None => format!("{unread} unread of {}", notifications.len()),
        };
        Ok(CommandResult::success_with_data(
            "notifications",
            message,
            NotificationsOutput { unread, notifications },
        ))
    })
}
