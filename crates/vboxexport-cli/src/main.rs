//! vboxexport CLI - Release the SSH port forward and export a VirtualBox VM.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;
use vboxexport_core::{
    BuildState, ExportConfig, RetryPolicy, Runner, StepExport, Ui, VBoxManageDriver,
};

/// Finish a VirtualBox build by exporting the VM to an appliance.
#[derive(Parser)]
#[command(name = "vboxexport")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log driver commands and retries.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Delete the SSH forwarding rule and export the VM.
    Export {
        /// Name of the VirtualBox VM.
        vm_name: String,

        /// Directory to write the appliance to.
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// Appliance format.
        #[arg(short, long, value_enum, default_value = "ovf")]
        format: FormatArg,

        /// Extra argument for `VBoxManage export`. Repeat to pass several.
        #[arg(long = "export-opt", value_name = "ARG", allow_hyphen_values = true)]
        export_opts: Vec<String>,

        /// Host port of the SSH forwarding rule being removed.
        #[arg(long)]
        ssh_host_port: Option<u16>,

        /// Attempts at deleting the forwarding rule.
        #[arg(long, default_value = "5")]
        retry_max: usize,

        /// Pause between deletion attempts in milliseconds.
        #[arg(long, default_value = "200")]
        retry_delay_ms: u64,

        /// Pause before the first command in milliseconds.
        #[arg(long, default_value = "1000")]
        settle_ms: u64,

        /// Path to VBoxManage. Located from the VirtualBox install if omitted.
        #[arg(long)]
        vboxmanage: Option<PathBuf>,

        /// Suppress progress output. Errors are still printed.
        #[arg(short, long)]
        quiet: bool,
    },
}

/// Appliance format argument mapping.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    /// Open Virtualization Format descriptor with separate disk files.
    Ovf,
    /// Single-file OVF archive.
    Ova,
}

impl FormatArg {
    fn as_str(self) -> &'static str {
        match self {
            FormatArg::Ovf => "ovf",
            FormatArg::Ova => "ova",
        }
    }
}

/// [`Ui`] that prints status lines to stderr above a spinner.
struct SpinnerUi {
    bar: ProgressBar,
    quiet: bool,
}

impl SpinnerUi {
    fn new(quiet: bool) -> Result<Self> {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new_spinner();
            let style = ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")?;
            bar.set_style(style);
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        };
        Ok(Self { bar, quiet })
    }

    /// Print a line on stderr, whether or not the spinner is drawn.
    fn line(&self, text: String) {
        self.bar.suspend(|| eprintln!("{text}"));
    }
}

impl Ui for SpinnerUi {
    fn say(&self, message: &str) {
        if !self.quiet {
            self.line(format!("==> {message}"));
            self.bar.set_message(message.to_string());
        }
    }

    fn message(&self, message: &str) {
        if !self.quiet {
            self.line(format!("    {message}"));
        }
    }

    // Shown in quiet mode too; it is the only report of a halt.
    fn error(&self, message: &str) {
        self.line(format!("==> {message}"));
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Export {
            vm_name,
            output_dir,
            format,
            export_opts,
            ssh_host_port,
            retry_max,
            retry_delay_ms,
            settle_ms,
            vboxmanage,
            quiet,
        } => {
            let config = ExportConfig::new(format.as_str(), output_dir)
                .with_export_opts(export_opts)
                .with_retry(RetryPolicy::new(retry_max, Duration::from_millis(retry_delay_ms)))
                .with_settle_interval(Duration::from_millis(settle_ms));
            let driver = match vboxmanage {
                Some(path) => VBoxManageDriver::new(path),
                None => VBoxManageDriver::detect(),
            };
            run_export(&vm_name, ssh_host_port, config, &driver, quiet)
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_export(
    vm_name: &str,
    ssh_host_port: Option<u16>,
    config: ExportConfig,
    driver: &VBoxManageDriver,
    quiet: bool,
) -> Result<ExitCode> {
    config.validate()?;
    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "failed to create output directory '{}'",
            config.output_dir.display()
        )
    })?;
    tracing::debug!(program = %driver.program().display(), "using VBoxManage");

    let ui = SpinnerUi::new(quiet)?;
    let mut state = BuildState::new(driver, &ui, vm_name);
    state.ssh_host_port = ssh_host_port;

    let runner = Runner::new().step(StepExport::new(config));
    let action = runner.run(&mut state);
    ui.bar.finish_and_clear();

    // The halt cause was already reported through the UI.
    if action.is_halt() {
        return Ok(ExitCode::FAILURE);
    }

    if !quiet {
        if let Some(path) = &state.export_path {
            println!("Export completed successfully: {}", path.display());
        }
    }

    Ok(ExitCode::SUCCESS)
}
