use crate::RenderError;
use minijinja::{Environment, ErrorKind};
use snapwrap_schema::SnapContext;
use std::path::{Path, PathBuf};

/// Renders a named template against the snap context.
pub trait TemplateRenderer {
    fn render(&self, template_name: &str, context: &SnapContext) -> Result<String, RenderError>;
}

/// Jinja-compatible renderer loading templates shipped in the install root
/// (conventionally `$SNAP/templates`).
pub struct JinjaRenderer {
    templates_dir: PathBuf,
    env: Environment<'static>,
}

impl JinjaRenderer {
    pub fn new(templates_dir: impl Into<PathBuf>) -> Self {
        let templates_dir = templates_dir.into();
        let mut env = Environment::new();
        env.set_loader(minijinja::path_loader(&templates_dir));
        Self { templates_dir, env }
    }

    pub fn templates_dir(&self) -> &Path {
        &self.templates_dir
    }
}

impl TemplateRenderer for JinjaRenderer {
    fn render(&self, template_name: &str, context: &SnapContext) -> Result<String, RenderError> {
        let template = self.env.get_template(template_name).map_err(|e| {
            if e.kind() == ErrorKind::TemplateNotFound {
                tracing::error!("unable to locate template: {template_name}");
                RenderError::NotFound {
                    name: template_name.to_owned(),
                    dir: self.templates_dir.clone(),
                }
            } else {
                RenderError::Render {
                    name: template_name.to_owned(),
                    source: e,
                }
            }
        })?;

        template
            .render(context.vars())
            .map_err(|source| RenderError::Render {
                name: template_name.to_owned(),
                source,
            })
    }
}
