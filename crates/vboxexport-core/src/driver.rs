//! VirtualBox control driver.
//!
//! Build steps only ever talk to the hypervisor through the [`Driver`] trait,
//! which runs a single `VBoxManage` invocation and reports whether it worked.
//! [`VBoxManageDriver`] is the implementation that shells out to the real
//! binary.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{DriverError, DriverResult};

/// Name of the VirtualBox command line tool.
#[cfg(windows)]
pub const VBOXMANAGE_BIN: &str = "VBoxManage.exe";
#[cfg(not(windows))]
pub const VBOXMANAGE_BIN: &str = "VBoxManage";

/// Environment variables checked by [`VBoxManageDriver::detect`], in order.
const INSTALL_PATH_VARS: [&str; 2] = ["VBOX_INSTALL_PATH", "VBOX_MSI_INSTALL_PATH"];

/// Capability to run administrative commands against the hypervisor.
pub trait Driver {
    /// Run `VBoxManage` with the given arguments.
    fn vboxmanage(&self, args: &[String]) -> DriverResult<()>;
}

/// Driver backed by the `VBoxManage` executable.
#[derive(Debug, Clone)]
pub struct VBoxManageDriver {
    program: PathBuf,
}

impl VBoxManageDriver {
    /// Create a driver that runs the given executable.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Locate `VBoxManage` from the VirtualBox install variables, falling
    /// back to resolving it through `PATH`.
    pub fn detect() -> Self {
        for var in INSTALL_PATH_VARS {
            let Some(dirs) = env::var_os(var) else {
                continue;
            };
            for dir in env::split_paths(&dirs) {
                let candidate = dir.join(VBOXMANAGE_BIN);
                if candidate.is_file() {
                    tracing::debug!(var, path = %candidate.display(), "found VBoxManage");
                    return Self::new(candidate);
                }
            }
        }
        Self::new(VBOXMANAGE_BIN)
    }

    /// Path of the executable this driver runs.
    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Default for VBoxManageDriver {
    fn default() -> Self {
        Self::detect()
    }
}

impl Driver for VBoxManageDriver {
    fn vboxmanage(&self, args: &[String]) -> DriverResult<()> {
        tracing::debug!(program = %self.program.display(), args = ?args, "executing VBoxManage");

        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|e| DriverError::spawn(&self.program, &e))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::debug!(stdout = %stdout.trim(), stderr = %stderr.trim(), "VBoxManage finished");

        if !output.status.success() {
            return Err(DriverError::command(output.status.code(), stderr.trim()));
        }

        Ok(())
    }
}
