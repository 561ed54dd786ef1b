//! # edge-template
//!
//! Compiles edge templates (literal text with `@layout`, `@section` and
//! `{{ expression }}` markers) into reusable [`Template`]s, and caches them
//! per name in an [`Engine`].
//!
//! ```
//! use edge_template::{Context, Engine, StringLoader};
//!
//! let loader = StringLoader::new();
//! loader.add("main", "<h1>@!section('title')</h1>");
//! loader.add("home", "@layout('main') @section('title') {{ greeting }} @end");
//!
//! let engine = Engine::builder().loader(loader).build();
//! let ctx = Context::new().with("greeting", "hello");
//! assert_eq!(engine.render("home", &ctx).unwrap(), "<h1>hello</h1>");
//! ```

pub mod compiler;
pub mod context;
pub mod engine;
pub mod evaluator;
pub mod layout;
pub mod loaders;
pub mod scanner;

pub use compiler::{Instruction, Template};
pub use context::{Context, Value};
pub use engine::{Engine, EngineBuilder, Renderer};
pub use evaluator::{DefaultEvaluator, Evaluator, FunctionRegistry};
pub use loaders::{FileSystemLoader, StringLoader, TemplateLoader};
