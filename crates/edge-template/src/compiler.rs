//! Template compilation and execution.
//!
//! Compilation is a single left-to-right pass over the source. Directives
//! (`@layout`, `@section ... @end`) are consumed, `{{ expression }}` markers
//! become [`Instruction::Substitute`] steps and everything else accumulates
//! into [`Instruction::Literal`] text. When the source names a layout, its
//! sections are merged into the layout text and the result is compiled again.
//!
//! A compiled [`Template`] is an ordered instruction list. Rendering folds
//! over it, so a template is a pure function of its context.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use edge_core::error::{EdgeError, EdgeResult};

use crate::context::Context;
use crate::evaluator::{Evaluator, FunctionRegistry};
use crate::layout::merge_sections;
use crate::scanner::{scan_expression, scan_section, scan_tag, END_TAG};

/// One step of a compiled template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Append fixed text.
    Literal(String),
    /// Evaluate an expression and append its display text.
    Substitute(String),
}

fn push_literal(instructions: &mut Vec<Instruction>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Instruction::Literal(last)) = instructions.last_mut() {
        last.push_str(text);
    } else {
        instructions.push(Instruction::Literal(text.to_string()));
    }
}

/// A compiled template.
///
/// Templates are immutable once built and are shared between threads by
/// the engine's cache.
#[derive(Clone)]
pub struct Template {
    instructions: Vec<Instruction>,
    evaluator: Arc<dyn Evaluator>,
    functions: Arc<FunctionRegistry>,
}

impl Template {
    /// Creates a template from an instruction list.
    ///
    /// Adjacent literals are coalesced and empty literals are dropped.
    pub fn new(
        instructions: Vec<Instruction>,
        evaluator: Arc<dyn Evaluator>,
        functions: Arc<FunctionRegistry>,
    ) -> Self {
        let mut coalesced = Vec::with_capacity(instructions.len());
        for instruction in instructions {
            match instruction {
                Instruction::Literal(text) => push_literal(&mut coalesced, &text),
                substitute @ Instruction::Substitute(_) => coalesced.push(substitute),
            }
        }
        Self {
            instructions: coalesced,
            evaluator,
            functions,
        }
    }

    /// Renders the template against a context.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by an expression. No partial output is
    /// produced.
    pub fn render(&self, context: &Context) -> EdgeResult<String> {
        self.instructions
            .iter()
            .try_fold(String::new(), |mut output, instruction| {
                match instruction {
                    Instruction::Literal(text) => output.push_str(text),
                    Instruction::Substitute(expression) => {
                        let value = self
                            .evaluator
                            .evaluate(expression, context, &self.functions)
                            .map_err(|e| match e {
                                EdgeError::Evaluation(message) => EdgeError::Evaluation(
                                    format!("{message} (in {{{{ {expression} }}}})"),
                                ),
                                other => other,
                            })?;
                        output.push_str(&value.to_display_string());
                    }
                }
                Ok(output)
            })
    }

    /// Returns the compiled instructions.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("instructions", &self.instructions)
            .field("functions", &self.functions)
            .finish_non_exhaustive()
    }
}

/// The result of scanning one source text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSource {
    /// Literal and substitution steps, in source order.
    pub instructions: Vec<Instruction>,
    /// Section bodies by name, trimmed.
    pub sections: HashMap<String, String>,
    /// The last `@layout` argument, if any.
    pub layout: Option<String>,
}

/// Scans a source text into instructions, sections and a layout name.
///
/// # Errors
///
/// Returns `MalformedDirective` for a `@layout` or `@section` without a
/// quoted argument, an `@end` outside a section, and any scanner failure.
pub fn parse(source: &str) -> EdgeResult<ParsedSource> {
    let mut parsed = ParsedSource::default();
    let mut history = String::new();
    let mut pos = 0;

    while let Some(ch) = source[pos..].chars().next() {
        match ch {
            '@' => {
                if let Some(tag) = scan_tag(source, pos + 1) {
                    match tag.name.as_str() {
                        "layout" | "section" => {
                            let Some(argument) = tag.argument else {
                                return Err(EdgeError::malformed(
                                    format!("@{} requires a quoted name argument", tag.name),
                                    pos,
                                ));
                            };
                            if tag.name == "layout" {
                                parsed.layout = Some(argument);
                                pos = tag.end;
                            } else {
                                let (body, end) = scan_section(source, tag.end)?;
                                parsed.sections.insert(argument, body.trim().to_string());
                                pos = end;
                            }
                            continue;
                        }
                        END_TAG => {
                            return Err(EdgeError::malformed(
                                "unexpected @end outside of a @section",
                                pos,
                            ));
                        }
                        _ => {}
                    }
                }
            }
            '{' => {
                if let Some((expression, end)) = scan_expression(source, pos)? {
                    push_literal(&mut parsed.instructions, &history);
                    history.clear();
                    parsed.instructions.push(Instruction::Substitute(expression));
                    pos = end;
                    continue;
                }
            }
            _ => {}
        }
        history.push(ch);
        pos += ch.len_utf8();
    }

    push_literal(&mut parsed.instructions, &history);
    Ok(parsed)
}

/// Supplies the parent text for a layout name.
pub trait LayoutResolver {
    /// Returns the text that a child's sections are merged into.
    ///
    /// `chain` lists the names on the layout chain so far and ends with
    /// `name`.
    ///
    /// # Errors
    ///
    /// Returns any error raised while loading or rendering the layout.
    fn layout_text(&self, name: &str, chain: &[String]) -> EdgeResult<String>;
}

/// A resolver for contexts where layouts are not available.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLayouts;

impl LayoutResolver for NoLayouts {
    fn layout_text(&self, name: &str, _chain: &[String]) -> EdgeResult<String> {
        Err(EdgeError::TemplateDoesNotExist(name.to_string()))
    }
}

/// Compiles source text into [`Template`]s.
pub struct Compiler<'a> {
    evaluator: Arc<dyn Evaluator>,
    functions: Arc<FunctionRegistry>,
    layouts: &'a dyn LayoutResolver,
    max_layout_depth: usize,
}

impl<'a> Compiler<'a> {
    /// Creates a compiler.
    pub fn new(
        evaluator: Arc<dyn Evaluator>,
        functions: Arc<FunctionRegistry>,
        layouts: &'a dyn LayoutResolver,
        max_layout_depth: usize,
    ) -> Self {
        Self {
            evaluator,
            functions,
            layouts,
            max_layout_depth,
        }
    }

    /// Compiles `source`.
    ///
    /// `chain` holds the names already on the layout chain: the template's
    /// own name when compiling a named template, empty for ad-hoc text.
    ///
    /// # Errors
    ///
    /// Returns `CyclicLayout` if a layout names a template already on the
    /// chain, `LayoutDepthExceeded` if the chain grows past the configured
    /// maximum, and any parse or layout resolution error. A
    /// `MalformedDirective` found after a merge names the layout, and its
    /// offset counts bytes in the merged text rather than in either file.
    pub fn compile(&self, source: &str, chain: &[String]) -> EdgeResult<Template> {
        let mut chain = chain.to_vec();
        let mut parsed = parse(source)?;

        while let Some(layout) = parsed.layout.take() {
            let cyclic = chain.contains(&layout);
            chain.push(layout);
            if cyclic {
                return Err(EdgeError::CyclicLayout(chain));
            }
            if chain.len() > self.max_layout_depth {
                return Err(EdgeError::LayoutDepthExceeded(self.max_layout_depth));
            }

            let name = &chain[chain.len() - 1];
            tracing::debug!(layout = %name, depth = chain.len(), "resolving layout");
            let parent = self.layouts.layout_text(name, &chain)?;
            parsed = parse(&merge_sections(&parent, &parsed.sections)).map_err(|e| match e {
                EdgeError::MalformedDirective { message, offset } => EdgeError::MalformedDirective {
                    message: format!("{message} (in layout '{name}' merged with its sections)"),
                    offset,
                },
                other => other,
            })?;
        }

        Ok(Template::new(
            parsed.instructions,
            Arc::clone(&self.evaluator),
            Arc::clone(&self.functions),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::DefaultEvaluator;

    struct MapLayouts(HashMap<&'static str, &'static str>);

    impl LayoutResolver for MapLayouts {
        fn layout_text(&self, name: &str, _chain: &[String]) -> EdgeResult<String> {
            self.0
                .get(name)
                .map(|s| (*s).to_string())
                .ok_or_else(|| EdgeError::TemplateDoesNotExist(name.to_string()))
        }
    }

    fn compile_with(source: &str, layouts: &dyn LayoutResolver) -> EdgeResult<Template> {
        Compiler::new(
            Arc::new(DefaultEvaluator),
            Arc::new(FunctionRegistry::new()),
            layouts,
            16,
        )
        .compile(source, &[])
    }

    fn compile(source: &str) -> EdgeResult<Template> {
        compile_with(source, &NoLayouts)
    }

    fn literal(text: &str) -> Instruction {
        Instruction::Literal(text.to_string())
    }

    fn substitute(expr: &str) -> Instruction {
        Instruction::Substitute(expr.to_string())
    }

    #[test]
    fn test_plain_text_is_one_literal() {
        let template = compile("hello, world").unwrap();
        assert_eq!(template.instructions(), &[literal("hello, world")]);
        assert_eq!(template.render(&Context::new()).unwrap(), "hello, world");
    }

    #[test]
    fn test_empty_source() {
        let template = compile("").unwrap();
        assert!(template.instructions().is_empty());
        assert_eq!(template.render(&Context::new()).unwrap(), "");
    }

    #[test]
    fn test_expressions_split_literals() {
        let template = compile("a {{ x }}b{{y}}").unwrap();
        assert_eq!(
            template.instructions(),
            &[literal("a "), substitute("x"), literal("b"), substitute("y")]
        );
        let ctx = Context::new().with("x", 1).with("y", "Y");
        assert_eq!(template.render(&ctx).unwrap(), "a 1bY");
    }

    #[test]
    fn test_unknown_tags_and_braces_are_literal() {
        let source = "mail me@example.com, @media { x } @append @!section('a')";
        let template = compile(source).unwrap();
        assert_eq!(template.instructions(), &[literal(source)]);
    }

    #[test]
    fn test_sections_without_layout_are_dropped() {
        let template = compile("a@section('s') body @end b").unwrap();
        assert_eq!(template.render(&Context::new()).unwrap(), "a b");
    }

    #[test]
    fn test_parse_collects_sections_and_last_layout() {
        let parsed = parse("@layout('one') @layout(\"two\") @section('t')  hi  @end").unwrap();
        assert_eq!(parsed.layout.as_deref(), Some("two"));
        assert_eq!(parsed.sections.get("t").map(String::as_str), Some("hi"));
    }

    #[test]
    fn test_layout_merge() {
        let layouts = MapLayouts(HashMap::from([("main", "<h1>@!section('title')</h1>")]));
        let template =
            compile_with("@layout('main') @section('title') {{ greeting }} @end", &layouts).unwrap();
        assert_eq!(
            template.instructions(),
            &[literal("<h1>"), substitute("greeting"), literal("</h1>")]
        );
        let ctx = Context::new().with("greeting", "hello");
        assert_eq!(template.render(&ctx).unwrap(), "<h1>hello</h1>");
    }

    #[test]
    fn test_child_text_outside_sections_is_discarded() {
        let layouts = MapLayouts(HashMap::from([("main", "[@!section('a')]")]));
        let template = compile_with("ignored @layout('main') {{ nope }}", &layouts).unwrap();
        assert_eq!(template.render(&Context::new()).unwrap(), "[]");
    }

    #[test]
    fn test_nested_layouts() {
        let layouts = MapLayouts(HashMap::from([
            ("base", "<body>@!section('body')</body>"),
            ("page", "@layout('base') @section('body')<main>@!section('content')</main>@end"),
        ]));
        let template =
            compile_with("@layout('page') @section('content'){{ 1 + 2 }}@end", &layouts).unwrap();
        assert_eq!(
            template.render(&Context::new()).unwrap(),
            "<body><main>3</main></body>"
        );
    }

    #[test]
    fn test_self_layout_is_cyclic() {
        let layouts = MapLayouts(HashMap::from([("loop", "@layout('loop')")]));
        let err = Compiler::new(
            Arc::new(DefaultEvaluator),
            Arc::new(FunctionRegistry::new()),
            &layouts,
            16,
        )
        .compile("@layout('loop')", &["loop".to_string()])
        .unwrap_err();
        match err {
            EdgeError::CyclicLayout(chain) => assert_eq!(chain, vec!["loop", "loop"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_depth_limit() {
        let layouts = MapLayouts(HashMap::from([
            ("a", "@layout('b')"),
            ("b", "@layout('c')"),
            ("c", "done"),
        ]));
        let compiler = |max| {
            Compiler::new(
                Arc::new(DefaultEvaluator),
                Arc::new(FunctionRegistry::new()),
                &layouts,
                max,
            )
            .compile("@layout('a')", &[])
        };
        assert!(matches!(compiler(2), Err(EdgeError::LayoutDepthExceeded(2))));
        assert_eq!(compiler(3).unwrap().render(&Context::new()).unwrap(), "done");
    }

    #[test]
    fn test_missing_layout() {
        let err = compile("@layout('nope')").unwrap_err();
        assert!(matches!(err, EdgeError::TemplateDoesNotExist(name) if name == "nope"));
    }

    #[test]
    fn test_malformed_directives_report_offsets() {
        let cases = [
            ("ab@layout", 2),
            ("@section('x') never closed", 13),
            ("x @end", 2),
            ("ok {{ open", 3),
            ("{{ }}", 0),
            ("@layout('a) rest", 0),
        ];
        for (source, offset) in cases {
            let err = compile(source).unwrap_err();
            assert_eq!(err.offset(), Some(offset), "{source}: {err}");
        }
    }

    #[test]
    fn test_malformed_merge_names_layout() {
        let layouts = MapLayouts(HashMap::from([("main", "[@!section('a')]")]));
        let err = compile_with("@layout('main') @section('a'){{ open@end", &layouts).unwrap_err();
        assert_eq!(err.offset(), Some(1));
        let message = err.to_string();
        assert!(message.contains("layout 'main'"), "{message}");
    }

    #[test]
    fn test_escaped_quote_in_expression() {
        let template = compile(r#"<p>{{ "a\"b" }}</p>"#).unwrap();
        assert_eq!(template.instructions()[1], substitute(r#""a\"b""#));
        assert_eq!(template.render(&Context::new()).unwrap(), r#"<p>a"b</p>"#);
    }

    #[test]
    fn test_evaluation_error_names_expression() {
        let template = compile("a {{ missing }} b").unwrap();
        let err = template.render(&Context::new()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("missing"), "{message}");
        assert!(matches!(err, EdgeError::Evaluation(_)));
    }

    #[test]
    fn test_template_new_coalesces_literals() {
        let template = Template::new(
            vec![literal("a"), literal(""), literal("b"), substitute("x"), literal("")],
            Arc::new(DefaultEvaluator),
            Arc::new(FunctionRegistry::new()),
        );
        assert_eq!(template.instructions(), &[literal("ab"), substitute("x")]);
    }

    #[test]
    fn test_multibyte_text() {
        let template = compile("héllo {{ name }} ✓").unwrap();
        let ctx = Context::new().with("name", "wörld");
        assert_eq!(template.render(&ctx).unwrap(), "héllo wörld ✓");
    }
}
