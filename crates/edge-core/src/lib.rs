//! # edge-core
//!
//! Core types shared by the edge crates. This crate has no dependency on the
//! template engine itself and provides the foundation for the other crates.
//!
//! ## Modules
//!
//! - [`error`] - Error type and result alias
//! - [`settings`] - Engine settings with serde defaults
//! - [`settings_loader`] - Loading settings from TOML, JSON, and the environment
//! - [`logging`] - Tracing-based logging integration

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;

// Re-export the most commonly used types at the crate root.
pub use error::{EdgeError, EdgeResult};
pub use settings::{LayoutContext, Settings, TemplateSettings};
