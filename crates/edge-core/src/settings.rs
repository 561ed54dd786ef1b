//! Settings for the edge template engine.
//!
//! [`Settings`] holds the engine configuration with sensible defaults. Load it
//! from files or the environment with [`crate::settings_loader`].

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EdgeError;

/// Which context a layout is rendered with when a child template names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutContext {
    /// The layout is rendered on its own with an empty context, and its
    /// output becomes the parent text. Layout expressions cannot see caller
    /// data.
    #[default]
    Empty,
    /// The layout's raw source becomes the parent text, so its expressions are
    /// evaluated against the caller's context together with the child's.
    Deferred,
}

impl fmt::Display for LayoutContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("empty"),
            Self::Deferred => f.write_str("deferred"),
        }
    }
}

impl FromStr for LayoutContext {
    type Err = EdgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "empty" => Ok(Self::Empty),
            "deferred" => Ok(Self::Deferred),
            other => Err(EdgeError::ConfigurationError(format!(
                "Unknown layout context '{other}', expected 'empty' or 'deferred'"
            ))),
        }
    }
}

/// Template engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateSettings {
    /// Directory that template names are resolved against.
    pub base_directory: PathBuf,
    /// File extension appended to template names (without the dot).
    pub extension: String,
    /// Context used when rendering layouts.
    pub layout_context: LayoutContext,
    /// Maximum number of templates in one layout chain.
    pub max_layout_depth: usize,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            base_directory: PathBuf::from("views"),
            extension: "edge".to_string(),
            layout_context: LayoutContext::Empty,
            max_layout_depth: 16,
        }
    }
}

/// The complete set of settings.
///
/// # Examples
///
/// ```
/// use edge_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert!(settings.debug);
/// assert_eq!(settings.templates.extension, "edge");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Whether debug mode is enabled. Selects the pretty log format.
    pub debug: bool,
    /// The log level filter (e.g. "info", "edge_template=debug").
    pub log_level: String,
    /// Template engine configuration.
    pub templates: TemplateSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: true,
            log_level: "info".to_string(),
            templates: TemplateSettings::default(),
        }
    }
}
