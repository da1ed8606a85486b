//! Handlebars page templates, compiled into the binary.

use axum::http::StatusCode;
use handlebars::Handlebars;
use serde::Serialize;

use crate::error::WebError;

const PARTIALS: [(&str, &str); 2] = [
    ("header", include_str!("../templates/partials/header.hbs")),
    ("footer", include_str!("../templates/partials/footer.hbs")),
];

const PAGES: [(&str, &str); 9] = [
    ("index", include_str!("../templates/index.hbs")),
    ("register", include_str!("../templates/register.hbs")),
    ("signin", include_str!("../templates/signin.hbs")),
    ("home", include_str!("../templates/home.hbs")),
    ("logout", include_str!("../templates/logout.hbs")),
    ("disease", include_str!("../templates/disease.hbs")),
    ("quiz", include_str!("../templates/quiz.hbs")),
    ("clinic", include_str!("../templates/clinic.hbs")),
    ("error", include_str!("../templates/error.hbs")),
];

/// Registry of every page and shared partial.
pub struct Templates {
    registry: Handlebars<'static>,
}

impl std::fmt::Debug for Templates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Templates")
            .field("pages", &self.names())
            .finish()
    }
}

impl Templates {
    pub fn new() -> Result<Self, WebError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);
        for (name, source) in PARTIALS {
            registry
                .register_partial(name, source)
                .map_err(|e| WebError::Template(format!("partial '{name}': {e}")))?;
        }
        for (name, source) in PAGES {
            registry
                .register_template_string(name, source)
                .map_err(|e| WebError::Template(format!("template '{name}': {e}")))?;
        }
        Ok(Self { registry })
    }

    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<String, WebError> {
        self.registry
            .render(name, data)
            .map_err(|e| WebError::Template(format!("rendering '{name}': {e}")))
    }

    pub fn names(&self) -> Vec<&str> {
        PAGES.iter().map(|(name, _)| *name).collect()
    }

    /// Render the error page, falling back to [`bare_error`] if it fails.
    pub fn render_error(&self, status: StatusCode, message: &str) -> String {
        let data = serde_json::json!({
            "title": status.canonical_reason().unwrap_or("Error"),
            "status": status.as_u16(),
            "message": message,
        });
        self.render("error", &data)
            .unwrap_or_else(|_| bare_error(status, message))
    }
}

/// Minimal error body used until the registry renders the full page.
pub fn bare_error(status: StatusCode, message: &str) -> String {
    format!(
        "<h1>{}</h1><p>{}</p>",
        status.as_u16(),
        handlebars::html_escape(message)
    )
}
