//! # edge
//!
//! A small layout-aware string template compiler.
//!
//! This is the meta-crate that re-exports the sub-crates for convenient
//! access. Depend on `edge` to get everything, or on the individual crates
//! for finer-grained control.
//!
//! ```
//! use edge::template::{Context, Engine, StringLoader};
//!
//! let loader = StringLoader::new();
//! loader.add("hello", "Hello {{ name }}!");
//! let engine = Engine::builder().loader(loader).build();
//! assert_eq!(
//!     engine.render("hello", &Context::new().with("name", "edge")).unwrap(),
//!     "Hello edge!"
//! );
//! ```

/// Error type, settings, settings loading, and logging setup.
pub use edge_core as core;

/// Template compiler, engine, loaders, and expression evaluator.
#[cfg(feature = "template")]
pub use edge_template as template;

/// Axum response adapter.
#[cfg(feature = "http")]
pub use edge_http as http;

pub use edge_core::{EdgeError, EdgeResult, Settings};

// Third-party re-exports
pub use axum;
pub use serde;
pub use serde_json;
pub use tracing;
pub use tracing_subscriber;

/// Loads settings from the environment, installs logging, and builds an
/// engine from the result.
///
/// With `config` set, the TOML file is read first and environment overrides
/// are applied on top; otherwise the defaults are used with environment
/// overrides.
///
/// # Errors
///
/// Returns `ConfigurationError` if the configuration file cannot be parsed.
#[cfg(feature = "template")]
pub fn bootstrap(config: Option<&std::path::Path>) -> EdgeResult<template::Engine> {
    let settings = match config {
        Some(path) => edge_core::settings_loader::from_toml_file_with_env(path)?,
        None => edge_core::settings_loader::from_env(),
    };
    edge_core::logging::setup_logging(&settings);
    tracing::info!(
        base_directory = %settings.templates.base_directory.display(),
        extension = %settings.templates.extension,
        layout_context = %settings.templates.layout_context,
        "template engine configured"
    );
    Ok(template::Engine::from_settings(&settings))
}

#[cfg(all(test, feature = "template"))]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_from_toml() {
        let dir = std::env::temp_dir().join(format!("edge_bootstrap_{}", std::process::id()));
        let _ = std::fs::create_dir_all(&dir);
        std::fs::write(dir.join("page.tpl"), "{{ 40 + 2 }}").unwrap();
        let config = dir.join("edge.toml");
        std::fs::write(
            &config,
            format!(
                "debug = false\n\n[templates]\nbase_directory = {:?}\nextension = \"tpl\"\n",
                dir.display().to_string()
            ),
        )
        .unwrap();

        let engine = bootstrap(Some(&config)).unwrap();
        assert_eq!(engine.settings().extension, "tpl");
        assert_eq!(
            engine.render("page", &template::Context::new()).unwrap(),
            "42"
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_bootstrap_bad_config() {
        let dir = std::env::temp_dir().join(format!("edge_bootstrap_bad_{}", std::process::id()));
        let _ = std::fs::create_dir_all(&dir);
        let config = dir.join("edge.toml");
        std::fs::write(&config, "templates = [not toml").unwrap();

        assert!(matches!(
            bootstrap(Some(&config)),
            Err(EdgeError::ConfigurationError(_))
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
