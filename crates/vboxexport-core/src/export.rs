//! Export step for VirtualBox builds.
//!
//! Runs once the VM has been shut down:
//! 1. Wait for the VM to settle
//! 2. Delete the SSH port forwarding rule added for provisioning, retrying
//!    while VirtualBox still holds the VM configuration
//! 3. Export the VM with `VBoxManage export` and publish the artifact path
//!
//! # Example
//!
//! ```no_run
//! use vboxexport_core::{BuildState, BufferUi, ExportConfig, Step, StepExport, VBoxManageDriver};
//!
//! let driver = VBoxManageDriver::detect();
//! let ui = BufferUi::new();
//! let mut state = BuildState::new(&driver, &ui, "packer-ubuntu").with_ssh_host_port(2222);
//!
//! let step = StepExport::new(ExportConfig::new("ova", "output-virtualbox"));
//! step.run(&mut state);
//! println!("{:?}", state.export_path);
//! ```

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::state::BuildState;
use crate::step::{halt, Step, StepAction};

/// Name of the NAT forwarding rule created for SSH during provisioning.
pub const SSH_FORWARD_RULE: &str = "packerssh";

/// Default appliance format.
pub const DEFAULT_FORMAT: &str = "ovf";

/// Formats `VBoxManage export` can write.
pub const SUPPORTED_FORMATS: [&str; 2] = ["ovf", "ova"];

/// Default pause before touching a VM that was just stopped.
pub const DEFAULT_SETTLE_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration for the export step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    /// Appliance format, used as the file extension.
    pub format: String,
    /// Directory the appliance is written to.
    pub output_dir: PathBuf,
    /// Extra arguments appended to `VBoxManage export`, in order.
    pub export_opts: Vec<String>,
    /// Retry behaviour for deleting the forwarding rule.
    pub retry: RetryPolicy,
    /// Pause before the first command.
    pub settle_interval: Duration,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_FORMAT.to_string(),
            output_dir: PathBuf::from("."),
            export_opts: Vec::new(),
            retry: RetryPolicy::default(),
            settle_interval: DEFAULT_SETTLE_INTERVAL,
        }
    }
}

impl ExportConfig {
    /// Create a config for the given format and output directory.
    pub fn new(format: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            format: format.into(),
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    /// Set the extra export arguments.
    pub fn with_export_opts<I, S>(mut self, opts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.export_opts = opts.into_iter().map(Into::into).collect();
        self
    }

    /// Set the retry policy for deleting the forwarding rule.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the settle interval.
    pub fn with_settle_interval(mut self, interval: Duration) -> Self {
        self.settle_interval = interval;
        self
    }

    /// Check the config before a build starts.
    pub fn validate(&self) -> Result<()> {
        if self.format.is_empty() {
            return Err(Error::config("format must not be empty"));
        }
        if !SUPPORTED_FORMATS.contains(&self.format.as_str()) {
            return Err(Error::config(format!(
                "unsupported format '{}', expected one of: {}",
                self.format,
                SUPPORTED_FORMATS.join(", ")
            )));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(Error::config("output directory must not be empty"));
        }
        if self.output_dir.to_str().is_none() {
            return Err(Error::config(format!(
                "output directory '{}' is not valid UTF-8",
                self.output_dir.display()
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::config("retry attempts must be at least 1"));
        }
        Ok(())
    }

    /// Where the appliance for `vm_name` is written.
    pub fn output_path(&self, vm_name: &str) -> PathBuf {
        self.output_dir.join(format!("{}.{}", vm_name, self.format))
    }
}

/// Arguments that delete the SSH forwarding rule from `vm_name`.
pub fn delete_forward_args(vm_name: &str) -> Vec<String> {
    ["modifyvm", vm_name, "--natpf1", "delete", SSH_FORWARD_RULE]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Arguments that export `vm_name` to `output_path`, followed by `extra`.
pub fn export_args(vm_name: &str, output_path: &str, extra: &[String]) -> Vec<String> {
    let mut args = vec![
        "export".to_string(),
        vm_name.to_string(),
        "--output".to_string(),
        output_path.to_string(),
    ];
    args.extend(extra.iter().cloned());
    args
}

/// Releases the SSH port forward and exports the VM.
///
/// Reads `vm_name` and `ssh_host_port` from the build state and produces
/// `export_path`.
#[derive(Debug, Clone)]
pub struct StepExport {
    config: ExportConfig,
}

impl StepExport {
    /// Create the step.
    pub fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    /// The step's configuration.
    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    fn delete_forward(&self, state: &BuildState<'_>) -> Result<()> {
        let args = delete_forward_args(&state.vm_name);
        self.config
            .retry
            .run(|attempt| {
                tracing::debug!(attempt, rule = SSH_FORWARD_RULE, "deleting forwarded port");
                state.driver.vboxmanage(&args)
            })
            .map_err(Error::delete_forward)
    }

    fn export(&self, state: &BuildState<'_>, args: &[String]) -> Result<()> {
        state.driver.vboxmanage(args).map_err(Error::export)
    }
}

impl Step for StepExport {
    fn name(&self) -> &'static str {
        "export"
    }

    fn run(&self, state: &mut BuildState<'_>) -> StepAction {
        if state.vm_name.is_empty() {
            return halt(state, Error::missing_state("vm_name is not set"));
        }

        // VBoxManage arguments are strings; the published path must be the
        // exact one it was told to write.
        let output_path = self.config.output_path(&state.vm_name);
        let Some(output_arg) = output_path.to_str() else {
            let err = Error::config(format!(
                "output path '{}' is not valid UTF-8",
                output_path.display()
            ));
            return halt(state, err);
        };
        let args = export_args(&state.vm_name, output_arg, &self.config.export_opts);

        tracing::debug!(
            interval = ?self.config.settle_interval,
            "waiting to ensure VM is really shutdown"
        );
        thread::sleep(self.config.settle_interval);

        state.ui.say("Preparing to export machine...");
        state.ui.message(&match state.ssh_host_port {
            Some(port) => format!("Deleting forwarded port mapping for SSH (host port {port})"),
            None => "Deleting forwarded port mapping for SSH".to_string(),
        });
        if let Err(err) = self.delete_forward(state) {
            return halt(state, err);
        }

        state.ui.say("Exporting virtual machine...");
        state.ui.message(&format!("Executing: {}", args.join(" ")));
        if let Err(err) = self.export(state, &args) {
            return halt(state, err);
        }

        tracing::info!(path = %output_path.display(), "export complete");
        state.export_path = Some(output_path);
        StepAction::Continue
    }

    fn cleanup(&self, _state: &mut BuildState<'_>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY};

    #[test]
    fn test_export_config_default() {
        let config = ExportConfig::default();
        assert_eq!(config.format, "ovf");
        assert_eq!(config.output_dir, PathBuf::from("."));
        assert!(config.export_opts.is_empty());
        assert_eq!(config.retry.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(config.retry.delay, DEFAULT_RETRY_DELAY);
        assert_eq!(config.settle_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_export_config_builders() {
        let config = ExportConfig::new("ova", "/out")
            .with_export_opts(["--manifest", "--ovf20"])
            .with_retry(RetryPolicy::new(2, Duration::from_millis(5)))
            .with_settle_interval(Duration::ZERO);
        assert_eq!(config.format, "ova");
        assert_eq!(config.export_opts, vec!["--manifest", "--ovf20"]);
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.settle_interval, Duration::ZERO);
    }

    #[test]
    fn test_validate_accepts_known_formats() {
        assert!(ExportConfig::new("ovf", "/out").validate().is_ok());
        assert!(ExportConfig::new("ova", "/out").validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_config() {
        let err = ExportConfig::new("vmdk", "/out").validate().unwrap_err();
        assert!(err.to_string().contains("unsupported format 'vmdk'"));

        assert!(ExportConfig::new("", "/out").validate().is_err());
        assert!(ExportConfig::new("ovf", "").validate().is_err());

        let zero = ExportConfig::new("ovf", "/out").with_retry(RetryPolicy::new(0, Duration::ZERO));
        assert!(matches!(zero.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn test_output_path() {
        let config = ExportConfig::new("ovf", "/out");
        assert_eq!(config.output_path("vm-42"), PathBuf::from("/out/vm-42.ovf"));
    }

    #[test]
    fn test_delete_forward_args() {
        assert_eq!(
            delete_forward_args("vm-42"),
            vec!["modifyvm", "vm-42", "--natpf1", "delete", "packerssh"]
        );
    }

    #[test]
    fn test_export_args_appends_extra_in_order() {
        let extra = vec!["--vsys".to_string(), "0".to_string(), "--ovf20".to_string()];
        let args = export_args("vm-42", "/out/vm-42.ovf", &extra);
        assert_eq!(
            args,
            vec!["export", "vm-42", "--output", "/out/vm-42.ovf", "--vsys", "0", "--ovf20"]
        );
    }

    #[test]
    fn test_step_name() {
        assert_eq!(StepExport::new(ExportConfig::default()).name(), "export");
    }

    #[test]
    fn test_step_keeps_config() {
        let config = ExportConfig::new("ova", "/out").with_export_opts(["--manifest"]);
        let step = StepExport::new(config.clone());
        assert_eq!(step.config(), &config);
    }

    #[cfg(unix)]
    #[test]
    fn test_validate_rejects_non_utf8_output_dir() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let config = ExportConfig::new("ovf", PathBuf::from(OsStr::from_bytes(b"/out/\xff")));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("not valid UTF-8"));
    }
}
