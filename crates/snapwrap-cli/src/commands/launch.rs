use super::{child_exit_code, CliError};
use snapwrap_core::{install_interrupt_passthrough, Dispatcher, WrapperConfig};
use snapwrap_runtime::LaunchMode;
use snapwrap_schema::SnapContext;
use tracing::debug;

pub fn run(
    config: WrapperConfig,
    context: SnapContext,
    entry_point: &str,
    passthrough: &[String],
) -> Result<u8, CliError> {
    if config.launch_mode == LaunchMode::Spawn {
        install_interrupt_passthrough();
    }
    let mut dispatcher = Dispatcher::new(config, context)?;
    let code = dispatcher.dispatch(entry_point, passthrough)?;
    debug!("{entry_point} exited with {code}");
    Ok(child_exit_code(code))
}
