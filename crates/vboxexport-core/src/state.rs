//! State shared by the steps of one build run.

use std::path::PathBuf;

use crate::driver::Driver;
use crate::error::Error;
use crate::ui::Ui;

/// Values produced and consumed by build steps.
///
/// Created when the pipeline starts and handed to each step in turn by
/// mutable reference.
pub struct BuildState<'a> {
    /// Hypervisor control driver.
    pub driver: &'a dyn Driver,
    /// Operator output channel.
    pub ui: &'a dyn Ui,
    /// Name of the VM being built.
    pub vm_name: String,
    /// Host port of the SSH forwarding rule, if one was installed.
    pub ssh_host_port: Option<u16>,
    /// Path of the exported appliance.
    pub export_path: Option<PathBuf>,
    /// Cause of the halt, set by the step that stopped the build.
    pub error: Option<Error>,
}

impl<'a> BuildState<'a> {
    /// Create state for a build of `vm_name`.
    pub fn new(driver: &'a dyn Driver, ui: &'a dyn Ui, vm_name: impl Into<String>) -> Self {
        Self {
            driver,
            ui,
            vm_name: vm_name.into(),
            ssh_host_port: None,
            export_path: None,
            error: None,
        }
    }

    /// Set the SSH host port.
    pub fn with_ssh_host_port(mut self, port: u16) -> Self {
        self.ssh_host_port = Some(port);
        self
    }

    /// Record `err` as the build failure unless one is already recorded.
    pub fn record_error(&mut self, err: Error) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }
}

impl std::fmt::Debug for BuildState<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildState")
            .field("vm_name", &self.vm_name)
            .field("ssh_host_port", &self.ssh_host_port)
            .field("export_path", &self.export_path)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DriverError, DriverResult};
    use crate::ui::BufferUi;

    struct NullDriver;

    impl Driver for NullDriver {
        fn vboxmanage(&self, _args: &[String]) -> DriverResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_new_state_is_empty() {
        let ui = BufferUi::new();
        let state = BuildState::new(&NullDriver, &ui, "vm-42").with_ssh_host_port(2222);
        assert_eq!(state.vm_name, "vm-42");
        assert_eq!(state.ssh_host_port, Some(2222));
        assert!(state.export_path.is_none());
        assert!(state.error.is_none());
    }

    #[test]
    fn test_record_error_keeps_first() {
        let ui = BufferUi::new();
        let mut state = BuildState::new(&NullDriver, &ui, "vm-42");
        let first = Error::export(DriverError::command(Some(1), "disk full"));
        state.record_error(first.clone());
        state.record_error(Error::missing_state("late"));
        assert_eq!(state.error, Some(first));
    }
}
