//! vboxexport Core Library
//!
//! This crate provides the final stage of a VirtualBox image build: releasing
//! the SSH port forward used during provisioning and exporting the VM to an
//! OVF or OVA appliance.
//!
//! # Overview
//!
//! Builds are modelled as a sequence of [`Step`]s sharing one [`BuildState`].
//! Each step returns a [`StepAction`]; the [`Runner`] stops at the first halt
//! and cleans up the steps that ran. [`StepExport`] is the export step, and it
//! talks to VirtualBox only through the [`Driver`] trait.
//!
//! # Modules
//!
//! - [`error`] - Error types and Result aliases
//! - [`driver`] - `VBoxManage` control driver
//! - [`ui`] - Operator output channel
//! - [`state`] - Build state shared between steps
//! - [`retry`] - Fixed-delay bounded retry
//! - [`step`] - Step trait and sequential runner
//! - [`export`] - Forward cleanup and export step
//!
//! # Quick Start
//!
//! ```no_run
//! use vboxexport_core::{BuildState, BufferUi, ExportConfig, Runner, StepExport, VBoxManageDriver};
//!
//! let driver = VBoxManageDriver::detect();
//! let ui = BufferUi::new();
//! let mut state = BuildState::new(&driver, &ui, "packer-ubuntu").with_ssh_host_port(3213);
//!
//! let runner = Runner::new().step(StepExport::new(ExportConfig::new("ova", "output")));
//! if runner.run(&mut state).is_halt() {
//!     eprintln!("{}", state.error.unwrap());
//! }
//! ```

pub mod driver;
pub mod error;
pub mod export;
pub mod retry;
pub mod state;
pub mod step;
pub mod ui;

pub use error::{DriverError, DriverResult, Error, Result};

pub use driver::{Driver, VBoxManageDriver};
pub use export::{ExportConfig, StepExport, SSH_FORWARD_RULE};
pub use retry::RetryPolicy;
pub use state::BuildState;
pub use step::{Runner, Step, StepAction};
pub use ui::{BufferUi, Ui, UiLevel};
