//! Template loaders.
//!
//! A loader turns a template name into source text. The engine loads a
//! template once per compile and never re-reads it after it is cached. A
//! layout that another thread is already compiling is loaded again for a
//! private, uncached compile.

use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};

use edge_core::error::EdgeError;
use edge_core::settings::TemplateSettings;
use parking_lot::RwLock;

/// Loads template source text by name.
pub trait TemplateLoader: Send + Sync {
    /// Loads the template source with the given name.
    ///
    /// # Errors
    ///
    /// Returns `TemplateDoesNotExist` if the template cannot be found.
    fn load(&self, name: &str) -> Result<String, EdgeError>;
}

/// Loads templates from `<base_directory>/<name>.<extension>`.
///
/// Names may contain `/` to reach subdirectories (`partials/nav`), but may
/// not climb out of the base directory.
#[derive(Debug, Clone)]
pub struct FileSystemLoader {
    base_directory: PathBuf,
    extension: String,
}

impl FileSystemLoader {
    /// Creates a loader rooted at `base_directory`.
    ///
    /// A leading `.` on `extension` is ignored.
    pub fn new(base_directory: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        Self {
            base_directory: base_directory.into(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    /// Creates a loader from template settings.
    pub fn from_settings(settings: &TemplateSettings) -> Self {
        Self::new(settings.base_directory.clone(), settings.extension.clone())
    }

    /// Returns the base directory.
    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }

    /// Returns the file extension, without a leading dot.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Resolves a template name to a path under the base directory.
    ///
    /// # Errors
    ///
    /// Returns `SuspiciousOperation` for absolute names and names containing
    /// `..` components.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, EdgeError> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || name.is_empty() {
            return Err(EdgeError::SuspiciousOperation(format!(
                "Template name '{name}' is outside the template directory"
            )));
        }

        let file = if self.extension.is_empty() {
            name.to_string()
        } else {
            format!("{name}.{}", self.extension)
        };
        Ok(self.base_directory.join(file))
    }
}

impl TemplateLoader for FileSystemLoader {
    fn load(&self, name: &str) -> Result<String, EdgeError> {
        let path = self.path_for(name)?;
        std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => EdgeError::TemplateDoesNotExist(format!(
                "Template '{name}' not found at {}",
                path.display()
            )),
            _ => {
                tracing::warn!(template = name, path = %path.display(), error = %e, "failed to read template");
                EdgeError::IoError(e)
            }
        })
    }
}

/// Loads templates from an in-memory map of name to source strings.
///
/// Useful for tests and for applications that keep templates outside the
/// filesystem. Templates added after a name has been rendered are not seen
/// by an engine that already cached that name.
#[derive(Debug, Default)]
pub struct StringLoader {
    templates: RwLock<HashMap<String, String>>,
}

impl StringLoader {
    /// Creates a new empty `StringLoader`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a `StringLoader` from a map of template names to source strings.
    pub fn from_map(templates: HashMap<String, String>) -> Self {
        Self {
            templates: RwLock::new(templates),
        }
    }

    /// Adds or replaces a template.
    pub fn add(&self, name: impl Into<String>, source: impl Into<String>) {
        self.templates.write().insert(name.into(), source.into());
    }
}

impl TemplateLoader for StringLoader {
    fn load(&self, name: &str) -> Result<String, EdgeError> {
        self.templates.read().get(name).cloned().ok_or_else(|| {
            EdgeError::TemplateDoesNotExist(format!("Template '{name}' not found in StringLoader"))
        })
    }
}
