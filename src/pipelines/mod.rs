//! Workflow pipelines orchestrating stateless services.

pub mod sign;
pub mod state;

pub use sign::{BatchReport, DocumentOutcome, DocumentReport, SignJob, SignWorkflow};
pub use state::{SigningState, StateMachine};
