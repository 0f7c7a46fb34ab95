//! Template TOML parser with validation.
//!
//! Parses a `templates.toml` document into [`TemplateSpec`] values and
//! validates: ids present and unique, labels present. Column lists may be
//! empty (custom mode) and rosters default to empty.

use serde::Deserialize;
use thiserror::Error;

use super::TemplateSpec;

/// Errors from template parsing and validation.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to read template file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("template with empty id")]
    EmptyId,

    #[error("duplicate template id: {0:?}")]
    DuplicateId(String),

    #[error("template {id:?} has an empty label")]
    EmptyLabel { id: String },
}

#[derive(Debug, Deserialize)]
struct TemplatesFile {
    #[serde(default)]
    templates: Vec<TemplateToml>,
}

#[derive(Debug, Deserialize)]
struct TemplateToml {
    id: String,
    label: String,
    #[serde(default)]
    hint: String,
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    roster: Vec<String>,
}

/// Parse and validate a templates TOML document.
pub fn parse_templates_toml(content: &str) -> Result<Vec<TemplateSpec>, TemplateError> {
    let file: TemplatesFile = toml::from_str(content)?;

    let mut seen = std::collections::HashSet::new();
    let mut templates = Vec::with_capacity(file.templates.len());
    for entry in file.templates {
        if entry.id.trim().is_empty() {
            return Err(TemplateError::EmptyId);
        }
        if !seen.insert(entry.id.clone()) {
            return Err(TemplateError::DuplicateId(entry.id));
        }
        if entry.label.trim().is_empty() {
            return Err(TemplateError::EmptyLabel { id: entry.id });
        }
        templates.push(TemplateSpec {
            id: entry.id,
            label: entry.label,
            hint: entry.hint,
            columns: entry.columns,
            roster: entry.roster,
        });
    }
    Ok(templates)
}
