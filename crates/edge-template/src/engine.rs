//! Template engine: loading, caching, and rendering templates by name.
//!
//! The [`Engine`] owns a loader, an expression evaluator, a function
//! registry and a cache of compiled templates. Templates are compiled on
//! first use and never invalidated; restart the process to pick up source
//! edits.
//!
//! The cache maps each name to a once-cell. The first caller to claim a
//! name compiles it, and concurrent first renders of that name wait on a
//! condition variable until the claim is released. A failed compile leaves
//! the cell empty, so a later call tries again.
//!
//! Only top-level lookups wait. A layout fetched while another template is
//! compiling never blocks on a claim held elsewhere: if some other thread
//! is already compiling it, the layout is compiled privately and not cached.
//! A thread holding a claim therefore never waits, so crossed layout chains
//! cannot deadlock and cycles surface as `CyclicLayout`.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use edge_core::error::{EdgeError, EdgeResult};
use edge_core::logging::render_span;
use edge_core::settings::{LayoutContext, Settings, TemplateSettings};
use once_cell::sync::OnceCell;
use parking_lot::{Condvar, Mutex, RwLock};

use crate::compiler::{Compiler, LayoutResolver, Template};
use crate::context::{Context, Value};
use crate::evaluator::{DefaultEvaluator, Evaluator, FunctionRegistry};
use crate::loaders::{FileSystemLoader, TemplateLoader};

type Slot = Arc<OnceCell<Arc<Template>>>;

/// Renders named templates to bytes.
///
/// HTTP adapters depend on this trait rather than on [`Engine`] directly.
pub trait Renderer: Send + Sync {
    /// Renders the named template with the given context.
    ///
    /// # Errors
    ///
    /// Returns any loading, compilation or evaluation error.
    fn render(&self, name: &str, context: &Context) -> EdgeResult<Vec<u8>>;
}

/// The template engine.
///
/// # Examples
///
/// ```
/// use edge_template::{Context, Engine, StringLoader};
///
/// let loader = StringLoader::new();
/// loader.add("hello", "Hello {{ name }}!");
///
/// let engine = Engine::builder().loader(loader).build();
/// let ctx = Context::new().with("name", "World");
/// assert_eq!(engine.render("hello", &ctx).unwrap(), "Hello World!");
/// assert!(engine.is_cached("hello"));
/// ```
pub struct Engine {
    settings: TemplateSettings,
    loader: Box<dyn TemplateLoader>,
    evaluator: Arc<dyn Evaluator>,
    functions: Arc<FunctionRegistry>,
    cache: RwLock<HashMap<String, Slot>>,
    compiling: Mutex<HashSet<String>>,
    compiled: Condvar,
}

impl Engine {
    /// Creates an engine that loads templates from the filesystem as
    /// described by `settings`.
    pub fn new(settings: &TemplateSettings) -> Self {
        Self::builder().settings(settings.clone()).build()
    }

    /// Creates an engine from the application settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.templates)
    }

    /// Starts building an engine.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Returns the template settings.
    pub const fn settings(&self) -> &TemplateSettings {
        &self.settings
    }

    /// Returns the functions available to expressions.
    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Renders the named template.
    ///
    /// # Errors
    ///
    /// Returns `TemplateDoesNotExist` if the loader has no such template,
    /// a compilation error if the source (or a layout) is malformed, or the
    /// first evaluation error.
    pub fn render(&self, name: &str, context: &Context) -> EdgeResult<String> {
        let span = render_span(name);
        let _guard = span.enter();
        self.get_template(name)?.render(context)
    }

    /// Returns the compiled template for `name`, compiling it on first use.
    ///
    /// # Errors
    ///
    /// Returns any loading or compilation error. Nothing is cached on error.
    pub fn get_template(&self, name: &str) -> EdgeResult<Arc<Template>> {
        self.fetch(name, &[name.to_string()], true)
    }

    /// Compiles ad-hoc template text. Layouts named by the text are resolved
    /// through this engine. The result is not cached.
    ///
    /// # Errors
    ///
    /// Returns any compilation or layout resolution error.
    pub fn compile_str(&self, source: &str) -> EdgeResult<Template> {
        self.compiler().compile(source, &[])
    }

    /// Compiles and renders ad-hoc template text.
    ///
    /// # Errors
    ///
    /// Returns any compilation or evaluation error.
    pub fn render_str(&self, source: &str, context: &Context) -> EdgeResult<String> {
        self.compile_str(source)?.render(context)
    }

    /// Returns `true` if a compiled template is cached under `name`.
    pub fn is_cached(&self, name: &str) -> bool {
        self.cache
            .read()
            .get(name)
            .is_some_and(|slot| slot.get().is_some())
    }

    /// Returns the names of all cached templates, sorted.
    pub fn cached_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .cache
            .read()
            .iter()
            .filter(|(_, slot)| slot.get().is_some())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort_unstable();
        names
    }

    fn compiler(&self) -> Compiler<'_> {
        Compiler::new(
            Arc::clone(&self.evaluator),
            Arc::clone(&self.functions),
            self,
            self.settings.max_layout_depth,
        )
    }

    fn slot(&self, name: &str) -> Slot {
        let existing = self.cache.read().get(name).cloned();
        match existing {
            Some(slot) => slot,
            None => Arc::clone(self.cache.write().entry(name.to_string()).or_default()),
        }
    }

    /// Fetches or compiles `name`. `chain` is the layout chain ending with
    /// `name`.
    ///
    /// With `wait` set, a caller that finds `name` claimed by another thread
    /// blocks until that compile finishes. Without it, the caller compiles
    /// its own uncached copy instead.
    fn fetch(&self, name: &str, chain: &[String], wait: bool) -> EdgeResult<Arc<Template>> {
        let slot = self.slot(name);
        let mut logged_miss = false;

        loop {
            if let Some(template) = slot.get() {
                tracing::debug!(template = name, "template cache hit");
                return Ok(Arc::clone(template));
            }
            if !logged_miss {
                tracing::debug!(template = name, "template cache miss");
                logged_miss = true;
            }

            let mut compiling = self.compiling.lock();
            if compiling.insert(name.to_string()) {
                drop(compiling);
                let _claim = Claim { engine: self, name };
                if let Some(template) = slot.get() {
                    return Ok(Arc::clone(template));
                }

                let template = Arc::new(self.compile_named(name, chain)?);
                // The claim excludes other writers, so the cell is still empty.
                let _ = slot.set(Arc::clone(&template));
                tracing::info!(
                    template = name,
                    instructions = template.instructions().len(),
                    "template compiled and cached"
                );
                return Ok(template);
            }

            if !wait {
                drop(compiling);
                tracing::debug!(template = name, "template claimed elsewhere, compiling a private copy");
                return self.compile_named(name, chain).map(Arc::new);
            }
            self.compiled.wait(&mut compiling);
        }
    }

    fn compile_named(&self, name: &str, chain: &[String]) -> EdgeResult<Template> {
        let source = self.loader.load(name)?;
        tracing::debug!(template = name, "compiling template");
        self.compiler().compile(&source, chain)
    }
}

/// Releases a compile claim and wakes the threads waiting on it.
struct Claim<'a> {
    engine: &'a Engine,
    name: &'a str,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.engine.compiling.lock().remove(self.name);
        self.engine.compiled.notify_all();
    }
}

impl LayoutResolver for Engine {
    fn layout_text(&self, name: &str, chain: &[String]) -> EdgeResult<String> {
        match self.settings.layout_context {
            LayoutContext::Empty => self.fetch(name, chain, false)?.render(&Context::new()),
            LayoutContext::Deferred => self.loader.load(name),
        }
    }
}

impl Renderer for Engine {
    fn render(&self, name: &str, context: &Context) -> EdgeResult<Vec<u8>> {
        Self::render(self, name, context).map(String::into_bytes)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(&TemplateSettings::default())
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("settings", &self.settings)
            .field("functions", &self.functions)
            .field("cached", &self.cached_names())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Engine`].
///
/// Defaults to [`TemplateSettings::default`], a [`FileSystemLoader`] built
/// from those settings, the [`DefaultEvaluator`] and no functions.
#[derive(Default)]
pub struct EngineBuilder {
    settings: Option<TemplateSettings>,
    loader: Option<Box<dyn TemplateLoader>>,
    evaluator: Option<Arc<dyn Evaluator>>,
    functions: FunctionRegistry,
}

impl EngineBuilder {
    /// Sets the template settings.
    #[must_use]
    pub fn settings(mut self, settings: TemplateSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Sets how layouts are rendered.
    #[must_use]
    pub fn layout_context(mut self, layout_context: LayoutContext) -> Self {
        self.settings
            .get_or_insert_with(TemplateSettings::default)
            .layout_context = layout_context;
        self
    }

    /// Replaces the loader.
    #[must_use]
    pub fn loader(mut self, loader: impl TemplateLoader + 'static) -> Self {
        self.loader = Some(Box::new(loader));
        self
    }

    /// Replaces the expression evaluator.
    #[must_use]
    pub fn evaluator(mut self, evaluator: impl Evaluator + 'static) -> Self {
        self.evaluator = Some(Arc::new(evaluator));
        self
    }

    /// Replaces the function registry.
    #[must_use]
    pub fn functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = functions;
        self
    }

    /// Registers one function.
    #[must_use]
    pub fn function<F>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[Value]) -> EdgeResult<Value> + Send + Sync + 'static,
    {
        self.functions.register(name, func);
        self
    }

    /// Builds the engine.
    pub fn build(self) -> Engine {
        let settings = self.settings.unwrap_or_default();
        let loader = self
            .loader
            .unwrap_or_else(|| Box::new(FileSystemLoader::from_settings(&settings)));
        Engine {
            loader,
            evaluator: self
                .evaluator
                .unwrap_or_else(|| Arc::new(DefaultEvaluator)),
            functions: Arc::new(self.functions),
            cache: RwLock::new(HashMap::new()),
            compiling: Mutex::new(HashSet::new()),
            compiled: Condvar::new(),
            settings,
        }
    }
}
