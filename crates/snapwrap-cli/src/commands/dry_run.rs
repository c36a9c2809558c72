use super::{json_pretty, CliError, EXIT_SUCCESS};
use serde::Serialize;
use snapwrap_core::{Dispatcher, Invocation, WrapperConfig};
use snapwrap_runtime::BinaryLookup;
use snapwrap_schema::SnapContext;

#[derive(Serialize)]
struct DryRun<'a> {
    #[serde(flatten)]
    invocation: &'a Invocation,
    command_line: String,
    config: &'a WrapperConfig,
    setup_pending: bool,
}

/// Resolve and print what would be launched, touching nothing on the host.
pub fn run(
    config: WrapperConfig,
    context: SnapContext,
    entry_point: &str,
    passthrough: &[String],
    json: bool,
) -> Result<u8, CliError> {
    let dispatcher = Dispatcher::new(config, context)?;
    let invocation = dispatcher.resolve(entry_point, passthrough)?;
    let report = DryRun {
        invocation: &invocation,
        command_line: invocation.command_line(),
        config: dispatcher.config(),
        setup_pending: dispatcher
            .manifest()
            .setup
            .as_ref()
            .is_some_and(|s| !s.is_empty()),
    };

    if json {
        println!("{}", json_pretty(&report)?);
    } else {
        let lookup = match &invocation.executable.lookup {
            BinaryLookup::SearchPath => "search path".to_owned(),
            BinaryLookup::InstallRoot(root) => format!("under {}", root.display()),
        };
        println!("entry point: {}", invocation.entry_point);
        println!("binary:      {} ({lookup})", invocation.executable);
        println!("manifest:    {}", report.config.manifest_path.display());
        println!("launch:      {}", report.config.launch_mode);
        println!(
            "setup:       {}",
            if report.setup_pending { "pending" } else { "none" }
        );
        println!("command:     {}", report.command_line);
    }
    Ok(EXIT_SUCCESS)
}
