mod commands;

use clap::Parser;
use commands::{CliError, EXIT_SUCCESS, EXIT_USAGE};
use snapwrap_core::{ConfigOverrides, WrapperConfig};
use snapwrap_runtime::LaunchMode;
use snapwrap_schema::SnapContext;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

#[derive(Debug, Parser)]
#[command(
    name = "snapwrap",
    version,
    about = "Run a snap's service binaries with their configuration wired in",
    after_help = "Everything after ENTRY_POINT is passed to the launched binary unchanged."
)]
struct Cli {
    /// Manifest to read instead of $SNAP/snapwrap.{yaml,yml,json,toml}.
    #[arg(long, value_name = "PATH")]
    manifest: Option<PathBuf>,

    /// Directory holding the setup templates (default: $SNAP/templates).
    #[arg(long, value_name = "DIR")]
    templates: Option<PathBuf>,

    /// Lock file serialising setup across concurrent launches.
    #[arg(long, value_name = "PATH")]
    lock_file: Option<PathBuf>,

    /// Replace this process with the target (exec) or wait for it (spawn).
    #[arg(long, value_name = "MODE")]
    launch: Option<LaunchMode>,

    /// Resolve and print the invocation without running setup or launching.
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Print --dry-run output as JSON.
    #[arg(long, default_value_t = false, requires = "dry_run")]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false)]
    trace: bool,

    /// Entry point to run, followed by its pass-through arguments.
    #[arg(
        required = true,
        trailing_var_arg = true,
        value_name = "ENTRY_POINT"
    )]
    command: Vec<String>,
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { EXIT_USAGE } else { EXIT_SUCCESS };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("SNAPWRAP_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(cli: Cli) -> Result<u8, CliError> {
    let Cli {
        manifest,
        templates,
        lock_file,
        launch,
        dry_run,
        json,
        command,
        ..
    } = cli;

    let context = SnapContext::from_env();
    debug!("snap environment: {:?}", context.vars());

    let overrides = ConfigOverrides::from_env()?.merge(ConfigOverrides {
        manifest,
        templates,
        lock_file,
        launch_mode: launch,
    });
    let config = WrapperConfig::resolve(&context, overrides)?;

    let (entry_point, passthrough) = command
        .split_first()
        .ok_or_else(|| CliError::Usage("an entry point name is required".to_owned()))?;

    if dry_run {
        commands::dry_run::run(config, context, entry_point, passthrough, json)
    } else {
        commands::launch::run(config, context, entry_point, passthrough)
    }
}
