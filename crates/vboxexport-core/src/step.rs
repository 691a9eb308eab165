//! Build steps and the sequential runner that drives them.

use crate::error::Error;
use crate::state::BuildState;

/// What the runner should do after a step returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    /// Go on with the next step.
    Continue,
    /// Stop the build; carries the cause.
    Halt(Error),
}

impl StepAction {
    /// Whether this action stops the build.
    pub fn is_halt(&self) -> bool {
        matches!(self, StepAction::Halt(_))
    }
}

/// One stage of a build.
pub trait Step {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Do the step's work.
    fn run(&self, state: &mut BuildState<'_>) -> StepAction;

    /// Release whatever `run` acquired. Called once for every step that ran,
    /// whether the build halted or not.
    fn cleanup(&self, state: &mut BuildState<'_>);
}

/// Record `err` in the state, report it, and halt.
pub(crate) fn halt(state: &mut BuildState<'_>, err: Error) -> StepAction {
    state.record_error(err.clone());
    state.ui.error(&err.to_string());
    StepAction::Halt(err)
}

/// Runs steps one after another until one halts.
#[derive(Default)]
pub struct Runner {
    steps: Vec<Box<dyn Step>>,
}

impl Runner {
    /// Create a runner with no steps.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step.
    pub fn step(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Number of steps queued.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether no steps are queued.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run all steps in order, stopping at the first halt, then clean up the
    /// steps that ran in reverse order.
    pub fn run(&self, state: &mut BuildState<'_>) -> StepAction {
        let mut action = StepAction::Continue;
        let mut ran = 0;

        for step in &self.steps {
            let span = tracing::info_span!("step", name = step.name());
            let _guard = span.enter();

            ran += 1;
            action = step.run(state);
            if let StepAction::Halt(err) = &action {
                tracing::info!(%err, "step halted build");
                state.record_error(err.clone());
                break;
            }
            tracing::debug!("step completed");
        }

        for step in self.steps[..ran].iter().rev() {
            let span = tracing::debug_span!("cleanup", name = step.name());
            let _guard = span.enter();
            step.cleanup(state);
        }

        action
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.steps.iter().map(|s| s.name()).collect();
        f.debug_struct("Runner").field("steps", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::Driver;
    use crate::error::{DriverError, DriverResult};
    use crate::ui::BufferUi;

    struct NullDriver;

    impl Driver for NullDriver {
        fn vboxmanage(&self, _args: &[String]) -> DriverResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_is_halt() {
        assert!(!StepAction::Continue.is_halt());
        assert!(StepAction::Halt(Error::missing_state("x")).is_halt());
    }

    #[test]
    fn test_halt_records_and_reports() {
        let ui = BufferUi::new();
        let mut state = BuildState::new(&NullDriver, &ui, "vm");
        let err = Error::export(DriverError::command(Some(1), "disk full"));

        let action = halt(&mut state, err.clone());

        assert_eq!(action, StepAction::Halt(err.clone()));
        assert_eq!(state.error, Some(err.clone()));
        assert_eq!(ui.errors(), vec![err.to_string()]);
    }

    #[test]
    fn test_empty_runner_continues() {
        let ui = BufferUi::new();
        let mut state = BuildState::new(&NullDriver, &ui, "vm");
        let runner = Runner::new();
        assert!(runner.is_empty());
        assert_eq!(runner.run(&mut state), StepAction::Continue);
    }
}
