//! Template compilation.
//!
//! Templates use Jinja syntax. The loader is rooted at the templates
//! directory, so pages pull partials in with `{% include "_header.html" %}`
//! or `{% extends "_layout.html" %}`.

use std::path::Path;

use minijinja::{context, path_loader, AutoEscape, Environment, Value};

use super::{run_files, write_output, Outcome, TaskContext, TaskError, TaskReport};
use crate::layout::{AssetClass, Layout};
use crate::BuildMode;

/// Template engine using minijinja.
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    /// Create an engine that loads templates from the layout's template dir.
    pub fn new(layout: &Layout, mode: BuildMode) -> Self {
        let mut env = Environment::new();
        env.set_loader(path_loader(layout.templates_src.clone()));
        env.set_keep_trailing_newline(true);
        env.set_auto_escape_callback(|_| AutoEscape::None);

        env.add_global("mode", Value::from(mode.as_str()));
        env.add_global("production", Value::from(mode.is_production()));
        env.add_global("assets", Value::from(layout.assets_url()));

        Self { env }
    }

    /// Render the template at `name`, relative to the template dir.
    pub fn render(&self, name: &str) -> Result<String, minijinja::Error> {
        let tmpl = self.env.get_template(name)?;
        tmpl.render(context! {})
    }
}

/// Loader name for a template: its path relative to the root, `/`-separated.
fn template_name(templates_src: &Path, source: &Path) -> Option<String> {
    let rel = source.strip_prefix(templates_src).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

/// Compile every non-partial template.
pub fn compile(ctx: &TaskContext<'_>) -> TaskReport {
    let layout = ctx.layout;
    let engine = TemplateEngine::new(layout, ctx.mode);
    let sources = layout.sources(AssetClass::Templates);

    run_files("templates", &sources, ctx.notifier, |source| {
        let name = template_name(&layout.templates_src, source)
            .ok_or_else(|| TaskError::NoDestination(source.to_path_buf()))?;
        let dest = layout
            .destination(AssetClass::Templates, source)
            .ok_or_else(|| TaskError::NoDestination(source.to_path_buf()))?;

        let html = engine
            .render(&name)
            .map_err(|e| TaskError::Template(format!("{:#}", e)))?;

        write_output(&dest, html)?;
        Ok(Outcome::Written)
    })
}
