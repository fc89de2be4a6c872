use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::request::{GuestRequest, RequestId};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    EmployeeApproval,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalAction {
    Approved,
    Rejected,
}

impl ApprovalAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

/// Manager-facing record appended when an employee decides on a request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerNotification {
    pub id: NotificationId,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
    pub request_id: RequestId,
    pub action: ApprovalAction,
    pub employee_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One entry of the shared `notifications` key. Entries other subsystems write in their
/// own shapes are kept as raw JSON.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NotificationEntry {
    Manager(ManagerNotification),
    Foreign(Value),
}

impl NotificationEntry {
    pub fn id(&self) -> &str {
        match self {
            Self::Manager(notification) => &notification.id.0,
            Self::Foreign(value) => value.get("id").and_then(Value::as_str).unwrap_or_default(),
        }
    }

    pub fn as_manager(&self) -> Option<&ManagerNotification> {
        match self {
            Self::Manager(notification) => Some(notification),
            Self::Foreign(_) => None,
        }
    }

    pub fn into_manager(self) -> Option<ManagerNotification> {
        match self {
            Self::Manager(notification) => Some(notification),
            Self::Foreign(_) => None,
        }
    }
}

impl ManagerNotification {
    pub fn for_decision(
        request: &GuestRequest,
        action: ApprovalAction,
        employee_id: &str,
        time: DateTime<Utc>,
    ) -> Self {
        let (title, verb) = match action {
            ApprovalAction::Approved => ("Request approved by employee", "approved"),
            ApprovalAction::Rejected => ("Request rejected by employee", "rejected"),
        };
        let message = format!(
            "{employee_id} {verb} the {} request from room {} ({})",
            request.request_type, request.room, request.guest
        );

        Self {
            id: NotificationId(uuid::Uuid::new_v4().to_string()),
            kind: NotificationKind::EmployeeApproval,
            title: title.to_string(),
            message,
            time,
            read: false,
            request_id: request.id.clone(),
            action,
            employee_id: employee_id.to_string(),
            extra: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ApprovalAction, NotificationEntry};

    #[test]
    fn manager_records_decode_and_other_shapes_stay_opaque() {
        let entries: Vec<NotificationEntry> = serde_json::from_value(json!([
            {
                "id": "N1",
                "type": "employee_approval",
                "title": "Request approved by employee",
                "message": "emp2 approved the restaurant request from room 118",
                "time": "2026-10-01T09:00:00Z",
                "read": false,
                "requestId": "R3",
                "action": "approved",
                "employeeId": "emp2"
            },
            {"id": "N0", "type": "new_order", "orderId": "T7", "read": false},
            {"id": "N2", "type": "employee_approval", "title": "incomplete"}
        ]))
        .expect("entries should decode");

        let manager = entries[0].as_manager().expect("manager notification");
        assert_eq!(manager.action, ApprovalAction::Approved);
        assert!(entries[1].as_manager().is_none());
        assert!(entries[2].as_manager().is_none());
        assert_eq!(entries[1].id(), "N0");

        let encoded = serde_json::to_value(&entries[1]).expect("encode");
        assert_eq!(encoded, json!({"id": "N0", "type": "new_order", "orderId": "T7", "read": false}));
    }
}
