//! Theme engine
//!
//! Server-rendered public pages use Tera. The default theme is compiled into
//! the binary; a theme directory on disk (`{themes_path}/{active}`) may
//! override any template by name.

use anyhow::{Context, Result};
use chrono::Datelike;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::error::Error as StdError;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context as TeraContext, Tera, Value};

use crate::models::{AppData, SocialMedia, User};

mod error;

pub use error::ThemeError;

/// Templates of the built-in theme
const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../../themes/default/base.html")),
    ("pagination.html", include_str!("../../themes/default/pagination.html")),
    ("index.html", include_str!("../../themes/default/index.html")),
    ("articles.html", include_str!("../../themes/default/articles.html")),
    ("article.html", include_str!("../../themes/default/article.html")),
    ("talents.html", include_str!("../../themes/default/talents.html")),
    ("talent.html", include_str!("../../themes/default/talent.html")),
    ("communities.html", include_str!("../../themes/default/communities.html")),
    ("community.html", include_str!("../../themes/default/community.html")),
    ("products.html", include_str!("../../themes/default/products.html")),
    ("zhub.html", include_str!("../../themes/default/zhub.html")),
    ("legal.html", include_str!("../../themes/default/legal.html")),
    ("404.html", include_str!("../../themes/default/404.html")),
    ("error.html", include_str!("../../themes/default/error.html")),
];

/// Theme engine for rendering templates
pub struct ThemeEngine {
    tera: Tera,
    theme_path: PathBuf,
    active: String,
}

impl ThemeEngine {
    /// Load the built-in templates, then any overrides found under
    /// `themes_path/active`. A missing theme directory is not an error.
    pub fn new(themes_path: &Path, active: &str) -> Result<Self> {
        let theme_path = themes_path.join(active);

        let mut templates: BTreeMap<String, String> = BUILTIN_TEMPLATES
            .iter()
            .map(|(name, content)| (name.to_string(), content.to_string()))
            .collect();

        if theme_path.is_dir() {
            let mut overrides = Vec::new();
            collect_templates_from_dir(&theme_path, &theme_path, &mut overrides)?;
            tracing::info!(theme = active, count = overrides.len(), "Loaded theme overrides");
            templates.extend(overrides);
        } else if active != "default" {
            tracing::warn!(theme = active, path = ?theme_path, "Theme directory not found, using built-in templates");
        }

        let tera = build_tera(templates)?;

        Ok(Self {
            tera,
            theme_path,
            active: active.to_string(),
        })
    }

    /// Render a template with context
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        self.tera.render(template, context).map_err(|e| {
            let mut error_msg = format!("Failed to render '{}': {}", template, e);
            let mut source = e.source();
            while let Some(s) = source {
                error_msg.push_str(&format!("\n  Caused by: {}", s));
                source = s.source();
            }
            ThemeError::TemplateError(error_msg).into()
        })
    }

    /// Render with the layout variables every page needs
    pub fn render_page(&self, template: &str, context: &TeraContext, vars: &PageVars) -> Result<String> {
        let mut full_context = context.clone();
        full_context.insert("app", &vars.app);
        full_context.insert("socials", &vars.socials);
        full_context.insert("request_path", &vars.request_path);
        full_context.insert("year", &vars.year);
        full_context.insert("theme_name", &self.active);
        if let Some(ref user) = vars.current_user {
            full_context.insert("current_user", user);
        }

        self.render(template, &full_context)
    }

    /// Render, falling back to `error.html` and finally to a plain page.
    /// Never fails.
    pub fn render_with_fallback(&self, template: &str, context: &TeraContext, vars: &PageVars) -> String {
        match self.render_page(template, context, vars) {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!("Failed to render template '{}': {}, trying error template", template, e);

                let mut error_context = context.clone();
                error_context.insert("error_message", "Halaman tidak dapat ditampilkan.");
                error_context.insert("requested_template", template);

                match self.render_page("error.html", &error_context, vars) {
                    Ok(html) => html,
                    Err(error_template_err) => {
                        tracing::error!("Failed to render error template: {}", error_template_err);
                        Self::simple_error_page(&vars.app.site.name)
                    }
                }
            }
        }
    }

    /// Last resort when even `error.html` fails
    fn simple_error_page(site_name: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html lang="id">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Terjadi kesalahan</title>
</head>
<body style="font-family: sans-serif; max-width: 600px; margin: 50px auto;">
    <h1>Terjadi kesalahan</h1>
    <p>Halaman tidak dapat ditampilkan. Silakan coba lagi nanti.</p>
    <p><a href="/">{}</a></p>
</body>
</html>"#,
            escape_html(site_name)
        )
    }

    pub fn active_theme(&self) -> &str {
        &self.active
    }

    pub fn theme_path(&self) -> &Path {
        &self.theme_path
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|t| t == name)
    }
}

/// Variables shared by every public page
#[derive(Debug, Clone, Serialize)]
pub struct PageVars {
    pub app: AppData,
    pub socials: Vec<SocialMedia>,
    pub current_user: Option<CurrentUser>,
    pub request_path: String,
    pub year: i32,
}

impl PageVars {
    pub fn new(app: AppData, socials: Vec<SocialMedia>, request_path: impl Into<String>) -> Self {
        Self {
            app,
            socials,
            current_user: None,
            request_path: request_path.into(),
            year: chrono::Utc::now().year(),
        }
    }

    pub fn with_user(mut self, user: Option<&User>) -> Self {
        self.current_user = user.map(CurrentUser::from);
        self
    }
}

/// The signed-in user as templates see it
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub is_admin: bool,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            display_name: user.display_name().to_string(),
            is_admin: user.is_admin(),
        }
    }
}

fn build_tera(templates: BTreeMap<String, String>) -> Result<Tera> {
    let mut tera = Tera::default();

    // base templates first so children can resolve their parent
    let mut ordered: Vec<(String, String)> = templates.into_iter().collect();
    ordered.sort_by(|a, b| {
        let a_is_base = a.0 == "base.html" || a.0.ends_with("/base.html");
        let b_is_base = b.0 == "base.html" || b.0.ends_with("/base.html");
        b_is_base.cmp(&a_is_base)
    });

    for (name, content) in ordered {
        tera.add_raw_template(&name, &content)
            .map_err(|e| ThemeError::TemplateError(format!("Failed to add template {}: {}", name, e)))?;
    }
    tera.build_inheritance_chains()
        .map_err(|e| ThemeError::TemplateError(format!("Failed to build template inheritance: {}", e)))?;

    tera.register_filter("rupiah", rupiah_filter);
    Ok(tera)
}

/// Recursively collect `*.html` files keyed by their path relative to `base_path`
fn collect_templates_from_dir(
    base_path: &Path,
    current_path: &Path,
    templates: &mut Vec<(String, String)>,
) -> Result<()> {
    for entry in fs::read_dir(current_path)? {
        let path = entry?.path();

        if path.is_dir() {
            collect_templates_from_dir(base_path, &path, templates)?;
        } else if path.extension().is_some_and(|ext| ext == "html") {
            let relative_path = path
                .strip_prefix(base_path)
                .map_err(|_| ThemeError::TemplateError("Failed to get relative path".to_string()))?;
            let template_name = relative_path.to_string_lossy().replace('\\', "/");
            let content =
                fs::read_to_string(&path).with_context(|| format!("Failed to read template: {:?}", path))?;
            templates.push((template_name, content));
        }
    }

    Ok(())
}

/// `{{ product.price | rupiah }}` renders `Rp150.000`
fn rupiah_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let amount = value
        .as_i64()
        .ok_or_else(|| tera::Error::msg("rupiah filter expects an integer"))?;
    Ok(Value::String(format_rupiah(amount)))
}

pub fn format_rupiah(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    if amount < 0 {
        format!("-Rp{}", grouped)
    } else {
        format!("Rp{}", grouped)
    }
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
