pub mod engine;
pub mod transitions;

pub use engine::{
    CascadeOutcome, ConfirmedDeletion, LifecycleError, LifecycleSettings, RequestLifecycle,
    TransitionOutcome, TransitionReport,
};
pub use transitions::{Decision, Transition, UnchangedReason};
