//! Report template registry.
//!
//! A template supplies the column contract for a transform run: an ordered
//! column list, a natural-language extraction hint passed to the prompt
//! verbatim, and an optional default roster of expected participants.
//! Built-in presets are embedded at compile time; a user TOML file can add
//! templates or override presets by id.

pub mod parser;

use std::path::Path;

pub use parser::TemplateError;

/// One report template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSpec {
    /// Stable identifier, e.g. `public-traffic`.
    pub id: String,
    /// Display label.
    pub label: String,
    /// Extraction hint passed to the prompt verbatim.
    pub hint: String,
    /// Ordered column names. Empty means "no constraint yet" (custom mode).
    pub columns: Vec<String>,
    /// Default roster of expected participants. May be empty.
    pub roster: Vec<String>,
}

/// The embedded preset library.
static PRESETS_TOML: &str = include_str!("templates.toml");

/// Ordered collection of templates, looked up by id.
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    templates: Vec<TemplateSpec>,
}

impl TemplateRegistry {
    /// Registry holding only the embedded presets.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML is malformed. If the binary was built,
    /// the TOML is valid.
    pub fn builtin() -> Self {
        let templates =
            parser::parse_templates_toml(PRESETS_TOML).expect("embedded templates.toml is invalid");
        Self { templates }
    }

    /// Extend the registry from a user TOML file. Entries with a known id
    /// replace the preset; new ids append in file order.
    pub fn merge_file(&mut self, path: &Path) -> Result<(), TemplateError> {
        let contents = std::fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.display().to_string(),
            source,
        })?;
        for template in parser::parse_templates_toml(&contents)? {
            match self.templates.iter_mut().find(|t| t.id == template.id) {
                Some(existing) => *existing = template,
                None => self.templates.push(template),
            }
        }
        Ok(())
    }

    /// Look up a template by id.
    pub fn get(&self, id: &str) -> Option<&TemplateSpec> {
        self.templates.iter().find(|t| t.id == id)
    }

    /// All templates, in registry order.
    pub fn all(&self) -> &[TemplateSpec] {
        &self.templates
    }
}
