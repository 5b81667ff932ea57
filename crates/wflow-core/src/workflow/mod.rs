//! Workflow engine core: definition loading, condition evaluation and
//! durable step-by-step execution.
//!
//! - `definition` -- document validation against the action registry
//! - `condition` -- `{var}` templates rendered and evaluated as JEXL
//! - `context` -- live variables and the input layering for each step
//! - `permission` -- owner policy checked before run and resume
//! - `checkpoint` -- run and step-run records written through the repository
//! - `engine` -- the step loop behind `run` and `resume`

pub mod checkpoint;
pub mod condition;
pub mod context;
pub mod definition;
pub mod engine;
pub mod permission;
pub mod result;

pub use engine::{
    EngineError, ResumeRequest, RunRequest, TransactionRef, ValidationError, WorkflowEngine,
    WorkflowRunner,
};
pub use result::{RunOutcome, StepResult};
