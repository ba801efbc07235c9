use minijinja::{Environment, UndefinedBehavior};

use super::{RenderContext, TemplateError, TemplateRenderer};

/// Jinja-style renderer. `{{ migration.schema_name }}` and friends are
/// substituted; referencing anything undefined is an error rather than an
/// empty string so a typo never reaches the database.
#[derive(Debug)]
pub struct JinjaRenderer {
    env: Environment<'static>,
}

impl JinjaRenderer {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        // SQL goes out verbatim
        env.set_auto_escape_callback(|_| minijinja::AutoEscape::None);
        env.set_keep_trailing_newline(true);
        Self { env }
    }
}

impl Default for JinjaRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer for JinjaRenderer {
    fn render(&self, template: &str, context: &RenderContext) -> Result<String, TemplateError> {
        self.env
            .render_str(template, context)
            .map_err(|e| TemplateError::with_source(e.to_string(), e))
    }
}
