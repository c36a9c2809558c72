use crate::concurrency::SetupLock;
use crate::config::WrapperConfig;
use crate::resolve::{resolve_entry_point, Invocation};
use crate::CoreError;
use snapwrap_runtime::{
    drop_privileges, run_setup, select_launcher, JinjaRenderer, Launcher, SetupReport,
    TemplateRenderer,
};
use snapwrap_schema::{parse_manifest_file, Manifest, SnapContext};
use tracing::{debug, info};

/// Runs one wrapper invocation: setup once, resolve, launch.
pub struct Dispatcher {
    manifest: Manifest,
    context: SnapContext,
    config: WrapperConfig,
    renderer: Box<dyn TemplateRenderer>,
    launcher: Box<dyn Launcher>,
    setup_complete: bool,
}

impl Dispatcher {
    /// Decode the configured manifest and wire up the real renderer and
    /// launcher.
    pub fn new(config: WrapperConfig, context: SnapContext) -> Result<Self, CoreError> {
        info!("using manifest {}", config.manifest_path.display());
        let manifest = parse_manifest_file(&config.manifest_path)?;
        let renderer = Box::new(JinjaRenderer::new(&config.templates_dir));
        let launcher = select_launcher(config.launch_mode);
        Ok(Self::with_parts(manifest, context, config, renderer, launcher))
    }

    pub fn with_parts(
        manifest: Manifest,
        context: SnapContext,
        config: WrapperConfig,
        renderer: Box<dyn TemplateRenderer>,
        launcher: Box<dyn Launcher>,
    ) -> Self {
        Self {
            manifest,
            context,
            config,
            renderer,
            launcher,
            setup_complete: false,
        }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn context(&self) -> &SnapContext {
        &self.context
    }

    pub fn config(&self) -> &WrapperConfig {
        &self.config
    }

    pub fn setup_complete(&self) -> bool {
        self.setup_complete
    }

    /// Apply the manifest's setup section, at most once per dispatcher.
    ///
    /// Returns `None` when setup already ran or there is nothing to do. The
    /// setup lock is only taken when there is work.
    pub fn run_setup(&mut self) -> Result<Option<SetupReport>, CoreError> {
        if self.setup_complete {
            return Ok(None);
        }
        let report = match self.manifest.setup.as_ref().filter(|s| !s.is_empty()) {
            Some(spec) => {
                let _lock = SetupLock::acquire(&self.config.lock_file, self.config.lock_timeout)?;
                let report = run_setup(spec, &self.context, self.renderer.as_ref())?;
                info!(
                    "setup complete: {} dirs, {} new symlinks, {} templates, {} copied files",
                    report.dirs.len(),
                    report.symlinks.len(),
                    report.templates.len(),
                    report.copied.len()
                );
                Some(report)
            }
            None => {
                debug!("manifest has no setup actions");
                None
            }
        };
        self.setup_complete = true;
        Ok(report)
    }

    pub fn resolve(&self, name: &str, passthrough: &[String]) -> Result<Invocation, CoreError> {
        resolve_entry_point(&self.manifest, name, &self.context, passthrough)
    }

    /// Set up, resolve `name` and launch it, returning the target's exit code.
    ///
    /// With an exec launcher this only returns on failure.
    pub fn dispatch(&mut self, name: &str, passthrough: &[String]) -> Result<i32, CoreError> {
        self.run_setup()?;
        let invocation = self.resolve(name, passthrough)?;
        let program = invocation.executable.locate()?;

        if let Some(account) = self.manifest.setup.as_ref().and_then(|s| s.user.as_ref()) {
            drop_privileges(account)?;
        }

        info!(
            "executing {} via {} launcher",
            invocation.entry_point,
            self.launcher.name()
        );
        debug!("command line: {}", invocation.command_line());
        Ok(self.launcher.launch(&program, &invocation.args)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapwrap_runtime::{LaunchMode, MockLauncher, RenderError};
    use snapwrap_schema::decode;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    struct StaticRenderer;

    impl TemplateRenderer for StaticRenderer {
        fn render(&self, name: &str, context: &SnapContext) -> Result<String, RenderError> {
            Ok(format!("{name} for {}\n", context.get("snap").unwrap_or("?")))
        }
    }

    fn config(dir: &std::path::Path) -> WrapperConfig {
        WrapperConfig {
            manifest_path: dir.join("snapwrap.yaml"),
            templates_dir: dir.join("templates"),
            lock_file: dir.join("setup.lock"),
            lock_timeout: Duration::from_secs(1),
            launch_mode: LaunchMode::Spawn,
        }
    }

    fn dispatcher(
        dir: &std::path::Path,
        manifest: &str,
        launcher: Arc<MockLauncher>,
    ) -> Dispatcher {
        let context = SnapContext::new()
            .with("snap", "/snap/x/1")
            .with("snap_common", dir.to_string_lossy());
        Dispatcher::with_parts(
            decode(manifest.as_bytes()).unwrap(),
            context,
            config(dir),
            Box::new(StaticRenderer),
            Box::new(launcher),
        )
    }

    const MANIFEST: &str = r#"
setup:
  dirs:
    - "{snap_common}/etc/nova"
  templates:
    nova.conf.j2: "{snap_common}/etc/nova/nova.conf"
entry-points:
  nova-manage:
    binary: /usr/bin/nova-manage
    config-files:
      - "{snap_common}/etc/nova/nova.conf"
"#;

    #[test]
    fn dispatch_runs_setup_then_launches() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockLauncher::new().with_exit_code(4));
        let mut d = dispatcher(dir.path(), MANIFEST, Arc::clone(&mock));

        let code = d.dispatch("nova-manage", &["--version".to_owned()]).unwrap();
        assert_eq!(code, 4);
        assert!(d.setup_complete());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("etc/nova/nova.conf")).unwrap(),
            "nova.conf.j2 for /snap/x/1\n"
        );

        let conf = format!("--config-file={}/etc/nova/nova.conf", dir.path().display());
        assert_eq!(
            mock.launches(),
            vec![(
                PathBuf::from("/usr/bin/nova-manage"),
                vec![conf, "--version".to_owned()]
            )]
        );
    }

    #[test]
    fn setup_runs_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut d = dispatcher(dir.path(), MANIFEST, Arc::new(MockLauncher::new()));

        let first = d.run_setup().unwrap();
        assert_eq!(first.unwrap().templates.len(), 1);
        std::fs::remove_file(dir.path().join("etc/nova/nova.conf")).unwrap();

        assert!(d.run_setup().unwrap().is_none());
        d.dispatch("nova-manage", &[]).unwrap();
        assert!(!dir.path().join("etc/nova/nova.conf").exists());
    }

    #[test]
    fn no_setup_needs_no_lock() {
        let dir = tempfile::tempdir().unwrap();
        let mut d = dispatcher(
            dir.path(),
            "entry-points:\n  sh:\n    binary: /bin/sh\n",
            Arc::new(MockLauncher::new()),
        );
        assert!(d.run_setup().unwrap().is_none());
        assert!(d.setup_complete());
        assert!(!dir.path().join("setup.lock").exists());
    }

    #[test]
    fn unknown_entry_point_launches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockLauncher::new());
        let mut d = dispatcher(dir.path(), MANIFEST, Arc::clone(&mock));

        let err = d.dispatch("nova-lol", &[]).unwrap_err();
        assert!(matches!(err, CoreError::UnknownEntryPoint(_)));
        assert!(mock.launches().is_empty());
    }

    #[test]
    fn missing_binary_is_launch_error() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockLauncher::new().with_missing("/usr/bin/nova-manage"));
        let mut d = dispatcher(dir.path(), MANIFEST, mock);

        let err = d.dispatch("nova-manage", &[]).unwrap_err();
        assert!(matches!(err, CoreError::Launch(_)));
        assert_eq!(err.phase(), "launch");
    }

    #[test]
    fn setup_failure_prevents_launch() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("etc"), "not a directory").unwrap();
        let mock = Arc::new(MockLauncher::new());
        let mut d = dispatcher(dir.path(), MANIFEST, Arc::clone(&mock));

        let err = d.dispatch("nova-manage", &[]).unwrap_err();
        assert!(matches!(err, CoreError::Setup(_)));
        assert!(!d.setup_complete());
        assert!(mock.launches().is_empty());
    }
}
