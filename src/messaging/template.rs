//! Template rendering with Handlebars.
//!
//! Templates are registered by name and rendered in strict mode, so a
//! variable missing from the context is an error rather than an empty
//! string. HTML bodies are rendered with HTML escaping; subjects and plain
//! text bodies are rendered verbatim.

use std::fs;
use std::path::Path;

use handlebars::Handlebars;

use super::context::Context;
use crate::error::{AppError, AppResult};

/// File extensions picked up by [`TemplateRenderer::load_directory`]
const TEMPLATE_EXTENSIONS: &[&str] = &["hbs", "html", "txt", "tpl"];

/// Which part of a message a template produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    Subject,
    Html,
    Text,
}

impl TemplateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateKind::Subject => "subject",
            TemplateKind::Html => "html",
            TemplateKind::Text => "text",
        }
    }
}

/// Named-template renderer backed by two Handlebars registries
///
/// Registration needs `&mut self`; load every template before the renderer
/// is shared with the dispatcher.
pub struct TemplateRenderer {
    markup: Handlebars<'static>,
    plain: Handlebars<'static>,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        let mut markup = Handlebars::new();
        markup.set_strict_mode(true);

        let mut plain = Handlebars::new();
        plain.set_strict_mode(true);
        plain.register_escape_fn(handlebars::no_escape);

        Self { markup, plain }
    }

    /// Registers a template source under `name`, replacing any previous one
    pub fn register_template(&mut self, name: &str, source: &str) -> AppResult<()> {
        self.markup
            .register_template_string(name, source)
            .map_err(|e| AppError::template(name, e))?;
        self.plain
            .register_template_string(name, source)
            .map_err(|e| AppError::template(name, e))?;

        tracing::trace!(template = name, "Template registered");
        Ok(())
    }

    /// Registers every template file below `dir`
    ///
    /// Templates are named by their path relative to `dir`, using `/` as the
    /// separator (`emails/welcome.html`). Returns the number of templates
    /// loaded.
    pub fn load_directory(&mut self, dir: impl AsRef<Path>) -> AppResult<usize> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(AppError::Configuration {
                key: "messaging.template_folder".to_string(),
                source: anyhow::anyhow!("Template directory not found: {}", dir.display()),
            });
        }

        let mut loaded = 0;
        self.load_dir_recursive(dir, dir, &mut loaded)?;
        tracing::debug!(dir = %dir.display(), count = loaded, "Templates loaded");
        Ok(loaded)
    }

    fn load_dir_recursive(&mut self, root: &Path, dir: &Path, loaded: &mut usize) -> AppResult<()> {
        let entries = fs::read_dir(dir).map_err(|e| AppError::Configuration {
            key: "messaging.template_folder".to_string(),
            source: anyhow::Error::from(e).context(format!("Cannot read {}", dir.display())),
        })?;

        for entry in entries {
            let path = entry
                .map_err(|e| AppError::Internal {
                    source: anyhow::Error::from(e),
                })?
                .path();

            if path.is_dir() {
                self.load_dir_recursive(root, &path, loaded)?;
                continue;
            }

            let is_template = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| TEMPLATE_EXTENSIONS.contains(&ext));
            if !is_template {
                continue;
            }

            let name = template_name(root, &path);
            let source = fs::read_to_string(&path).map_err(|e| AppError::Configuration {
                key: "messaging.template_folder".to_string(),
                source: anyhow::Error::from(e).context(format!("Cannot read {}", path.display())),
            })?;
            self.register_template(&name, &source)?;
            *loaded += 1;
        }

        Ok(())
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.plain.has_template(name)
    }

    /// Registered template names, sorted
    pub fn template_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.plain.get_templates().keys().cloned().collect();
        names.sort();
        names
    }

    /// Renders template `name` as `kind` with the given context
    pub fn render(&self, kind: TemplateKind, name: &str, context: &Context) -> AppResult<String> {
        let registry = match kind {
            TemplateKind::Html => &self.markup,
            TemplateKind::Subject | TemplateKind::Text => &self.plain,
        };

        registry
            .render(name, context)
            .map_err(|e| AppError::template(name, e))
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn template_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Sender plus the template names that make up one kind of message
///
/// At least one of the HTML and text bodies must be present. The template is
/// immutable once built; deliveries only ever read it.
#[derive(Debug, Clone)]
pub struct MessageTemplate {
    sender: String,
    subject: String,
    body_html: Option<String>,
    body_text: Option<String>,
    context: Context,
}

impl MessageTemplate {
    /// Creates a message template
    ///
    /// # Errors
    /// Validation error when neither an HTML nor a text body template is given
    pub fn new(
        sender: impl Into<String>,
        subject: impl Into<String>,
        body_html: Option<String>,
        body_text: Option<String>,
    ) -> AppResult<Self> {
        let body_html = body_html.filter(|name| !name.trim().is_empty());
        let body_text = body_text.filter(|name| !name.trim().is_empty());

        if body_html.is_none() && body_text.is_none() {
            return Err(AppError::validation(
                "template",
                "A message template needs an HTML body, a text body, or both",
            ));
        }

        let subject = subject.into();
        if subject.trim().is_empty() {
            return Err(AppError::validation(
                "subject",
                "A message template needs a subject template",
            ));
        }

        Ok(Self {
            sender: sender.into(),
            subject,
            body_html,
            body_text,
            context: Context::new(),
        })
    }

    /// Sets the template-level base context
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn body_html(&self) -> Option<&str> {
        self.body_html.as_deref()
    }

    pub fn body_text(&self) -> Option<&str> {
        self.body_text.as_deref()
    }

    pub fn context(&self) -> &Context {
        &self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::context::to_context;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn renderer() -> TemplateRenderer {
        let mut renderer = TemplateRenderer::new();
        renderer.register_template("subject", "Hi {{name}}").unwrap();
        renderer.register_template("body.html", "<p>{{name}}</p>").unwrap();
        renderer.register_template("body.txt", "{{name}}").unwrap();
        renderer
    }

    #[test]
    fn test_render_substitutes_variables() {
        let renderer = renderer();
        let context = to_context(&json!({"name": "Ada"})).unwrap();

        assert_eq!(
            renderer.render(TemplateKind::Subject, "subject", &context).unwrap(),
            "Hi Ada"
        );
        assert_eq!(
            renderer.render(TemplateKind::Html, "body.html", &context).unwrap(),
            "<p>Ada</p>"
        );
        assert_eq!(
            renderer.render(TemplateKind::Text, "body.txt", &context).unwrap(),
            "Ada"
        );
    }

    #[test]
    fn test_render_is_pure() {
        let renderer = renderer();
        let context = to_context(&json!({"name": "Ada"})).unwrap();

        let first = renderer.render(TemplateKind::Html, "body.html", &context).unwrap();
        let second = renderer.render(TemplateKind::Html, "body.html", &context).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_variable_is_template_error() {
        let renderer = renderer();
        let err = renderer
            .render(TemplateKind::Subject, "subject", &Context::new())
            .unwrap_err();

        match err {
            AppError::Template { template, .. } => assert_eq!(template, "subject"),
            other => panic!("Expected Template error, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_template_is_template_error() {
        let renderer = renderer();
        let err = renderer
            .render(TemplateKind::Text, "missing.txt", &Context::new())
            .unwrap_err();
        assert!(matches!(err, AppError::Template { .. }));
    }

    #[test]
    fn test_malformed_template_rejected() {
        let mut renderer = TemplateRenderer::new();
        let err = renderer.register_template("broken", "{{#if}}").unwrap_err();
        assert!(matches!(err, AppError::Template { .. }));
    }

    #[test]
    fn test_html_escaped_only_in_html_bodies() {
        let renderer = renderer();
        let context = to_context(&json!({"name": "Ada & <Bob>"})).unwrap();

        let html = renderer.render(TemplateKind::Html, "body.html", &context).unwrap();
        assert_eq!(html, "<p>Ada &amp; &lt;Bob&gt;</p>");

        let subject = renderer.render(TemplateKind::Subject, "subject", &context).unwrap();
        assert_eq!(subject, "Hi Ada & <Bob>");
    }

    #[test]
    fn test_load_directory_names_by_relative_path() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        fs::create_dir(dir.path().join("welcome")).unwrap();
        fs::write(dir.path().join("welcome/subject.txt"), "Welcome {{name}}").unwrap();
        fs::write(dir.path().join("welcome/body.html"), "<b>{{name}}</b>").unwrap();
        fs::write(dir.path().join("README.md"), "not a template").unwrap();

        let mut renderer = TemplateRenderer::new();
        let loaded = renderer.load_directory(dir.path()).unwrap();

        assert_eq!(loaded, 2);
        assert!(renderer.has_template("welcome/subject.txt"));
        assert!(renderer.has_template("welcome/body.html"));
        assert!(!renderer.has_template("README.md"));
        assert_eq!(
            renderer.template_names(),
            vec!["welcome/body.html".to_string(), "welcome/subject.txt".to_string()]
        );
    }

    #[test]
    fn test_load_missing_directory_fails() {
        let mut renderer = TemplateRenderer::new();
        let err = renderer.load_directory("/definitely/not/here").unwrap_err();
        assert!(matches!(err, AppError::Configuration { .. }));
    }

    #[test]
    fn test_message_template_requires_a_body() {
        let err = MessageTemplate::new("sender@example.com", "subject", None, None).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let err = MessageTemplate::new(
            "sender@example.com",
            "subject",
            Some("  ".to_string()),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn test_message_template_accepts_any_body_combination() {
        let both = MessageTemplate::new(
            "sender@example.com",
            "subject",
            Some("body.html".to_string()),
            Some("body.txt".to_string()),
        )
        .unwrap();
        assert_eq!(both.body_html(), Some("body.html"));
        assert_eq!(both.body_text(), Some("body.txt"));

        let html_only = MessageTemplate::new(
            "sender@example.com",
            "subject",
            Some("body.html".to_string()),
            None,
        )
        .unwrap();
        assert_eq!(html_only.body_text(), None);

        let text_only = MessageTemplate::new(
            "sender@example.com",
            "subject",
            None,
            Some("body.txt".to_string()),
        )
        .unwrap();
        assert_eq!(text_only.body_html(), None);
    }
}
