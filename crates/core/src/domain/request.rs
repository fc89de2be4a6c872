use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::order::{LinkedSection, OrderId};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Manager-facing status of a guest request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "awaiting_employee_approval")]
    AwaitingEmployeeApproval,
    #[serde(rename = "in-progress")]
    InProgress,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "rejected")]
    Rejected,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 5] = [
        Self::Pending,
        Self::AwaitingEmployeeApproval,
        Self::InProgress,
        Self::Completed,
        Self::Rejected,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::AwaitingEmployeeApproval => "awaiting_employee_approval",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }

    /// No natural transition leaves these states; only the manual override does.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Rejected)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "awaiting_employee_approval" => Ok(Self::AwaitingEmployeeApproval),
            "in-progress" | "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!(
                "unknown request status `{other}` (expected pending|awaiting_employee_approval|in-progress|completed|rejected)"
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmployeeApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl EmployeeApprovalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for EmployeeApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EmployeeApprovalStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!(
                "unknown employee approval status `{other}` (expected pending|approved|rejected)"
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown priority `{other}` (expected low|medium|high)")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestRequest {
    pub id: RequestId,
    pub room: String,
    pub guest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(rename = "type")]
    pub request_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub status: RequestStatus,
    #[serde(default)]
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_employee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_approval_status: Option<EmployeeApprovalStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub manager_notified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_section: Option<LinkedSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_order_id: Option<OrderId>,
    /// Fields written by other subsystems (order items, totals); carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GuestRequest {
    pub fn awaits_approval_from(&self, employee: &str) -> bool {
        self.assigned_employee.as_deref() == Some(employee)
            && self.employee_approval_status == Some(EmployeeApprovalStatus::Pending)
    }

    /// The linked order this request cascades into, if both halves of the link are present.
    pub fn linked_order(&self) -> Option<(LinkedSection, &OrderId)> {
        match (self.linked_section, self.original_order_id.as_ref()) {
            (Some(section), Some(order_id)) => Some((section, order_id)),
            _ => None,
        }
    }

    /// Checks the approval timestamp and order link invariants; returns the first violation.
    pub fn invariant_violation(&self) -> Option<String> {
        let decided = matches!(
            self.employee_approval_status,
            Some(EmployeeApprovalStatus::Approved | EmployeeApprovalStatus::Rejected)
        );
        if decided != self.employee_approved_at.is_some() {
            return Some(format!(
                "request `{}` has employeeApprovedAt={} with employeeApprovalStatus={:?}",
                self.id,
                self.employee_approved_at.is_some(),
                self.employee_approval_status
            ));
        }

        if self.linked_section.is_some() && self.original_order_id.is_none() {
            return Some(format!(
                "request `{}` is linked to a section but carries no originalOrderId",
                self.id
            ));
        }

        None
    }
}

/// Input of the creator flow (guest ordering app or front desk).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGuestRequest {
    pub room: String,
    pub guest: String,
    pub phone: Option<String>,
    pub request_type: String,
    pub description: String,
    pub notes: Option<String>,
    pub priority: Priority,
    pub assigned_employee: Option<String>,
    pub linked_section: Option<LinkedSection>,
    pub original_order_id: Option<OrderId>,
}

impl NewGuestRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.room.trim().is_empty() {
            return Err("room is required".to_string());
        }
        if self.guest.trim().is_empty() {
            return Err("guest name is required".to_string());
        }
        if self.request_type.trim().is_empty() {
            return Err("request type is required".to_string());
        }
        if self.linked_section.is_some() && self.original_order_id.is_none() {
            return Err("a linked section requires an original order id".to_string());
        }
        if self.original_order_id.is_some() && self.linked_section.is_none() {
            return Err("an original order id requires a linked section".to_string());
        }
        Ok(())
    }

    pub fn into_request(self, id: RequestId, created_at: DateTime<Utc>) -> GuestRequest {
        let assigned_employee =
            self.assigned_employee.filter(|employee| !employee.trim().is_empty());
        let (status, employee_approval_status) = if assigned_employee.is_some() {
            (RequestStatus::AwaitingEmployeeApproval, Some(EmployeeApprovalStatus::Pending))
        } else {
            (RequestStatus::Pending, None)
        };

        GuestRequest {
            id,
            room: self.room.trim().to_string(),
            guest: self.guest.trim().to_string(),
            phone: self.phone,
            request_type: self.request_type,
            description: self.description,
            notes: self.notes,
            status,
            priority: self.priority,
            created_at,
            assigned_employee,
            employee_approval_status,
            employee_approved_at: None,
            manager_notified: false,
            linked_section: self.linked_section,
            original_order_id: self.original_order_id,
            extra: Map::new(),
        }
    }
}
