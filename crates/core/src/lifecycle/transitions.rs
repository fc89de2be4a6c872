use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::request::{EmployeeApprovalStatus, GuestRequest, RequestStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition {
    Approve,
    Reject,
    SetStatus(RequestStatus),
}

impl Transition {
    pub fn event_name(self) -> &'static str {
        match self {
            Self::Approve => "lifecycle.request.approved",
            Self::Reject => "lifecycle.request.rejected",
            Self::SetStatus(_) => "lifecycle.request.status_set",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Applied { from: RequestStatus, to: RequestStatus },
    Unchanged { reason: UnchangedReason },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnchangedReason {
    /// Approve/reject on a request whose employee approval already left `pending`, or that
    /// never had one.
    ApprovalNotPending,
    StatusAlreadySet,
}

impl UnchangedReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ApprovalNotPending => "employee approval is not pending",
            Self::StatusAlreadySet => "status already has the requested value",
        }
    }
}

/// Applies `transition` to `request` in place. Only `Applied` decisions modify the record.
///
/// Rejection deliberately leaves `status` untouched; only the approval sub-status moves.
pub fn apply(request: &mut GuestRequest, transition: Transition, now: DateTime<Utc>) -> Decision {
    let from = request.status;

    match transition {
        Transition::Approve | Transition::Reject => {
            if request.employee_approval_status != Some(EmployeeApprovalStatus::Pending) {
                return Decision::Unchanged { reason: UnchangedReason::ApprovalNotPending };
            }

            request.employee_approved_at = Some(now);
            request.manager_notified = true;
            if transition == Transition::Approve {
                request.employee_approval_status = Some(EmployeeApprovalStatus::Approved);
                request.status = RequestStatus::InProgress;
            } else {
                request.employee_approval_status = Some(EmployeeApprovalStatus::Rejected);
            }
        }
        Transition::SetStatus(status) => {
            if request.status == status {
                return Decision::Unchanged { reason: UnchangedReason::StatusAlreadySet };
            }
            request.status = status;
        }
    }

    Decision::Applied { from, to: request.status }
}
