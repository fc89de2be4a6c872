pub mod alert;
pub mod audit;
pub mod broadcast;
pub mod config;
pub mod domain;
pub mod errors;
pub mod lifecycle;
pub mod notify;
pub mod queue;
pub mod store;

pub use alert::{AlertRegistry, EmployeeAlert, TerminalBell, TonePlayer};
pub use broadcast::{ChangeBroadcaster, ChangeEvent, Subscription, SubscriptionHandle};
pub use domain::notification::{
    ApprovalAction, ManagerNotification, NotificationEntry, NotificationId,
};
pub use domain::order::{LinkedOrder, LinkedSection, OrderId};
pub use domain::request::{
    EmployeeApprovalStatus, GuestRequest, NewGuestRequest, Priority, RequestId, RequestStatus,
};
pub use domain::Actor;
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use lifecycle::{
    CascadeOutcome, ConfirmedDeletion, LifecycleError, LifecycleSettings, RequestLifecycle,
    TransitionOutcome, TransitionReport,
};
pub use queue::{EmployeeDesk, EmployeeQueue, ManagerDesk, ManagerQueue, RequestStats, StatusFilter};
pub use store::{
    Collection, CollectionKey, CollectionStore, InMemoryCollectionStore, StoreError,
    VersionedPayload,
};
