//! View engine
//!
//! Renders pages with Tera. Templates are embedded in the binary; an
//! optional override directory replaces embedded templates of the same name
//! when the engine is built.

use rust_embed::RustEmbed;
use std::error::Error as StdError;
use std::fs;
use std::path::Path;
use tera::{Context, Tera};

mod error;

pub use error::ViewError;

#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct EmbeddedTemplates;

/// Tera wrapper holding every page template
pub struct ViewEngine {
    tera: Tera,
}

impl ViewEngine {
    /// Build from the embedded templates, then apply `override_dir` if given
    pub fn new(override_dir: Option<&Path>) -> Result<Self, ViewError> {
        let mut templates = embedded_templates()?;

        if let Some(dir) = override_dir {
            let mut overrides = Vec::new();
            collect_templates_from_dir(dir, dir, &mut overrides)?;
            for (name, content) in overrides {
                tracing::info!("Template override: {}", name);
                match templates.iter_mut().find(|(n, _)| *n == name) {
                    Some(existing) => existing.1 = content,
                    None => templates.push((name, content)),
                }
            }
        }

        // Base templates first so inheritance resolves
        templates.sort_by(|a, b| is_base(&b.0).cmp(&is_base(&a.0)));

        let mut tera = Tera::default();
        tera.add_raw_templates(templates)
            .map_err(|e| ViewError::TemplateError(error_chain(&e)))?;

        Ok(Self { tera })
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }

    pub fn render(&self, template: &str, context: &Context) -> Result<String, ViewError> {
        if !self.has_template(template) {
            return Err(ViewError::NotFound(template.to_string()));
        }
        self.tera.render(template, context).map_err(|e| {
            ViewError::TemplateError(format!("Failed to render '{}': {}", template, error_chain(&e)))
        })
    }
}

fn is_base(name: &str) -> bool {
    name == "base.html" || name.ends_with("/base.html")
}

fn error_chain(e: &tera::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        message.push_str(&format!("\n  Caused by: {}", s));
        source = s.source();
    }
    message
}

fn embedded_templates() -> Result<Vec<(String, String)>, ViewError> {
    let mut templates = Vec::new();
    for name in EmbeddedTemplates::iter() {
        let file = EmbeddedTemplates::get(&name).ok_or_else(|| ViewError::NotFound(name.to_string()))?;
        let content = String::from_utf8(file.data.into_owned())
            .map_err(|_| ViewError::TemplateError(format!("Template {} is not UTF-8", name)))?;
        templates.push((name.to_string(), content));
    }
    Ok(templates)
}

/// Collect `.html` files under `current_path`, named relative to `base_path`
fn collect_templates_from_dir(
    base_path: &Path,
    current_path: &Path,
    templates: &mut Vec<(String, String)>,
) -> Result<(), ViewError> {
    if !current_path.exists() {
        tracing::warn!("Template override directory {:?} does not exist", current_path);
        return Ok(());
    }

    for entry in fs::read_dir(current_path)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_templates_from_dir(base_path, &path, templates)?;
        } else if path.extension().is_some_and(|ext| ext == "html") {
            let relative = path
                .strip_prefix(base_path)
                .map_err(|_| ViewError::TemplateError("Failed to get relative path".to_string()))?;
            let name = relative.to_string_lossy().replace('\\', "/");
            templates.push((name, fs::read_to_string(&path)?));
        }
    }
    Ok(())
}
