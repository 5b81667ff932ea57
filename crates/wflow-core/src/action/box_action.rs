//! BoxAction -- object-safe dynamic dispatch wrapper for Action.
//!
//! 1. `ActionDyn` is an object-safe mirror of `Action` with boxed futures
//! 2. Blanket-impl `ActionDyn` for all `T: Action`
//! 3. `BoxAction` wraps `Box<dyn ActionDyn>` and delegates

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use wflow_types::workflow::Variables;

use super::{Action, ActionError, ActionOutcome, InputSpec};

type ActionFuture<'a> = Pin<Box<dyn Future<Output = Result<ActionOutcome, ActionError>> + Send + 'a>>;

/// Object-safe version of [`Action`] with boxed futures.
///
/// A blanket implementation is provided for all types implementing `Action`.
pub trait ActionDyn: Send + Sync {
    fn name(&self) -> &str;

    fn required_inputs(&self) -> Vec<InputSpec>;

    fn produced_outputs(&self) -> Vec<String>;

    fn run_boxed<'a>(&'a self, inputs: &'a Variables) -> ActionFuture<'a>;

    fn resume_boxed<'a>(&'a self, inputs: &'a Variables) -> ActionFuture<'a>;
}

impl<T: Action> ActionDyn for T {
    fn name(&self) -> &str {
        Action::name(self)
    }

    fn required_inputs(&self) -> Vec<InputSpec> {
        Action::required_inputs(self)
    }

    fn produced_outputs(&self) -> Vec<String> {
        Action::produced_outputs(self)
    }

    fn run_boxed<'a>(&'a self, inputs: &'a Variables) -> ActionFuture<'a> {
        Box::pin(self.run(inputs))
    }

    fn resume_boxed<'a>(&'a self, inputs: &'a Variables) -> ActionFuture<'a> {
        Box::pin(self.resume(inputs))
    }
}

/// Type-erased action, produced by registry factories.
///
/// Since `Action` uses RPITIT it cannot be a trait object directly;
/// `BoxAction` provides the same methods over `dyn ActionDyn`.
pub struct BoxAction {
    inner: Box<dyn ActionDyn>,
}

impl BoxAction {
    pub fn new<T: Action + 'static>(action: T) -> Self {
        Self {
            inner: Box::new(action),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn required_inputs(&self) -> Vec<InputSpec> {
        self.inner.required_inputs()
    }

    pub fn produced_outputs(&self) -> Vec<String> {
        self.inner.produced_outputs()
    }

    pub async fn run(&self, inputs: &Variables) -> Result<ActionOutcome, ActionError> {
        self.inner.run_boxed(inputs).await
    }

    pub async fn resume(&self, inputs: &Variables) -> Result<ActionOutcome, ActionError> {
        self.inner.resume_boxed(inputs).await
    }
}

impl fmt::Debug for BoxAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxAction")
            .field("name", &self.inner.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wflow_types::workflow::RunStatus;

    struct Suspends;

    impl Action for Suspends {
        fn name(&self) -> &str {
            "suspends"
        }

        fn required_inputs(&self) -> Vec<InputSpec> {
            Vec::new()
        }

        fn produced_outputs(&self) -> Vec<String> {
            Vec::new()
        }

        async fn run(&self, _inputs: &Variables) -> Result<ActionOutcome, ActionError> {
            Ok(ActionOutcome::waiting("paused"))
        }

        async fn resume(&self, _inputs: &Variables) -> Result<ActionOutcome, ActionError> {
            Ok(ActionOutcome::completed())
        }
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_box_action_is_send_sync() {
        assert_send_sync::<BoxAction>();
    }

    #[tokio::test]
    async fn test_box_action_delegates_run_and_resume() {
        let action = BoxAction::new(Suspends);
        assert_eq!(action.name(), "suspends");
        let inputs = Variables::new();
        assert_eq!(action.run(&inputs).await.unwrap().status, RunStatus::Waiting);
        assert_eq!(action.resume(&inputs).await.unwrap().status, RunStatus::Completed);
        assert!(format!("{action:?}").contains("suspends"));
    }
}
