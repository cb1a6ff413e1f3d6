//! Handlebars-based template engine.
//!
//! One [`TemplateEngine`] holds the parent registry for a run: the installed function
//! namespace, the delimiter configuration, and every template parsed so far. Each input is
//! parsed as a named child of that registry, so partials parsed earlier can be included by
//! later templates with `{{> name}}`.
//!
//! The registry runs in **strict mode** with HTML escaping disabled. Strict mode turns a
//! reference to a missing variable into an execution error instead of an empty string;
//! escaping is off because outputs are configuration files, not HTML.
//!
//! Per input the lifecycle is `unparsed → parsed → (skipped | executed | failed)`, and the
//! types enforce it: [`ChildTemplate::parse`] consumes the child and yields a
//! [`ParsedTemplate`], which can only be executed once.

use std::borrow::Cow;
use std::io::Write;
use std::path::Path;

use handlebars::Handlebars;

use crate::context::Context;
use crate::error::{Result, TemplarError};
use crate::input::Input;
use crate::namespace::FunctionNamespace;

/// Name given to templates that have no filename (literal text, stdin without a name).
pub const DEFAULT_TEMPLATE_NAME: &str = "anonymous_template";

/// What happened to an input handed to [`TemplateEngine::run_template`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// A partial: parsed and registered, not executed.
    Skipped,
    /// Parsed and executed into the output.
    Executed,
}

/// Parent template registry for a rendering session.
pub struct TemplateEngine {
    registry: Handlebars<'static>,
    delims: Delimiters,
    context: Context,
}

impl TemplateEngine {
    /// Create an engine with `namespace` installed.
    pub fn new(namespace: &FunctionNamespace, delims: Delimiters) -> Result<Self> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_escape_fn(handlebars::no_escape);
        namespace.install(&mut registry)?;

        Ok(Self {
            registry,
            delims,
            context: Context::default(),
        })
    }

    /// Start a named child template; an empty name gets [`DEFAULT_TEMPLATE_NAME`].
    pub fn create_child_template(&mut self, name: &str) -> ChildTemplate<'_> {
        let name = if name.is_empty() {
            DEFAULT_TEMPLATE_NAME
        } else {
            name
        };
        ChildTemplate {
            name: name.to_string(),
            engine: self,
        }
    }

    /// Parse `input` and, unless it is a partial, return it ready for execution.
    pub fn prepare(&mut self, input: &Input) -> Result<Option<ParsedTemplate<'_>>> {
        let child = self.create_child_template(input.filename());
        if input.is_partial() {
            child.parse_partial(input.text())?;
            return Ok(None);
        }
        child.parse(input.text()).map(Some)
    }

    /// Parse `input`, then execute it into `out` unless it is a partial.
    pub fn run_template<W: Write>(&mut self, input: &Input, out: W) -> Result<RunOutcome> {
        match self.prepare(input)? {
            Some(template) => {
                template.execute(out)?;
                Ok(RunOutcome::Executed)
            }
            None => Ok(RunOutcome::Skipped),
        }
    }
}

impl std::fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEngine")
            .field("delims", &self.delims)
            .field("templates", &self.registry.get_templates().len())
            .finish()
    }
}

/// A named template in the engine that has not been parsed yet.
pub struct ChildTemplate<'e> {
    engine: &'e mut TemplateEngine,
    name: String,
}

impl<'e> ChildTemplate<'e> {
    /// Parse `text` and register it as an executable template.
    pub fn parse(self, text: &str) -> Result<ParsedTemplate<'e>> {
        let source = self.engine.delims.translate(text);
        self.engine
            .registry
            .register_template_string(&self.name, source.as_ref())
            .map_err(|e| TemplarError::TemplateParse {
                name: self.name.clone(),
                message: e.to_string(),
            })?;

        Ok(ParsedTemplate {
            engine: self.engine,
            name: self.name,
        })
    }

    /// Parse `text` and register it for `{{> name}}` inclusion under its full name and its
    /// file stem. Partials and templates share one namespace in the registry.
    pub fn parse_partial(self, text: &str) -> Result<()> {
        let source = self.engine.delims.translate(text);
        for alias in partial_names(&self.name) {
            self.engine
                .registry
                .register_template_string(alias, source.as_ref())
                .map_err(|e| TemplarError::TemplateParse {
                    name: self.name.clone(),
                    message: e.to_string(),
                })?;
        }
        tracing::debug!("registered partial {}", self.name);
        Ok(())
    }
}

/// A parsed, executable template.
pub struct ParsedTemplate<'e> {
    engine: &'e TemplateEngine,
    name: String,
}

impl ParsedTemplate<'_> {
    /// Execute against the engine's context, writing into `out`.
    pub fn execute<W: Write>(self, out: W) -> Result<()> {
        self.engine
            .registry
            .render_to_write(&self.name, &self.engine.context, out)
            .map_err(|e| TemplarError::TemplateRender {
                name: self.name.clone(),
                message: e.to_string(),
            })
    }
}

/// `dir/_header.tmpl` is reachable as `{{> dir/_header.tmpl}}` and `{{> _header}}`.
fn partial_names(name: &str) -> Vec<&str> {
    let mut names = vec![name];
    if let Some(stem) = Path::new(name).file_stem().and_then(|s| s.to_str()) {
        if stem != name {
            names.push(stem);
        }
    }
    names
}

// -------------------------------------------------------
// Delimiters
// -------------------------------------------------------

/// Action delimiters. Anything other than `{{`/`}}` is translated before parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    pub left: String,
    pub right: String,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            left: "{{".into(),
            right: "}}".into(),
        }
    }
}

impl Delimiters {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }

    pub fn is_default(&self) -> bool {
        self.left == "{{" && self.right == "}}"
    }

    /// Rewrite `text` written with these delimiters into standard Handlebars syntax.
    ///
    /// Literal `{{` outside actions is escaped. Inside an action, a right delimiter that
    /// appears within a `"..."` or `` `...` `` string does not close it. An action missing
    /// its right delimiter is emitted unclosed so the parser reports it.
    pub fn translate<'a>(&self, text: &'a str) -> Cow<'a, str> {
        if self.is_default() || self.left.is_empty() || self.right.is_empty() {
            return Cow::Borrowed(text);
        }

        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find(&self.left) {
            out.push_str(&rest[..start].replace("{{", "\\{{"));
            let action = &rest[start + self.left.len()..];
            match find_unquoted(action, &self.right) {
                Some(end) => {
                    out.push_str("{{");
                    out.push_str(&action[..end]);
                    out.push_str("}}");
                    rest = &action[end + self.right.len()..];
                }
                None => {
                    out.push_str("{{");
                    out.push_str(action);
                    rest = "";
                }
            }
        }
        out.push_str(&rest.replace("{{", "\\{{"));
        Cow::Owned(out)
    }
}

/// Byte offset of the first `needle` in `action` that is not inside a string literal.
fn find_unquoted(action: &str, needle: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in action.char_indices() {
        match quote {
            Some('"') if escaped => escaped = false,
            Some('"') if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if action[i..].starts_with(needle) => return Some(i),
            None if c == '"' || c == '`' => quote = Some(c),
            None => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> TemplateEngine {
        TemplateEngine::new(&FunctionNamespace::builtin(), Delimiters::default()).unwrap()
    }

    fn render(engine: &mut TemplateEngine, input: &Input) -> String {
        let mut out = Vec::new();
        engine.run_template(input, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_renders_with_builtins() {
        let mut engine = engine();
        let input = Input::from_text(r#"{{toUpper "hello"}} <{{trimSpace "  x "}}>"#);
        assert_eq!(render(&mut engine, &input), "HELLO <x>");
    }

    #[test]
    fn test_output_is_not_html_escaped() {
        let mut engine = engine();
        let input = Input::from_text(r#"{{toUpper "<b> & 'q'"}}"#);
        assert_eq!(render(&mut engine, &input), "<B> & 'Q'");
    }

    #[test]
    fn test_anonymous_name() {
        let mut engine = engine();
        let err = engine
            .run_template(&Input::from_text("{{nope}}"), Vec::new())
            .unwrap_err();
        assert!(
            matches!(err, TemplarError::TemplateRender { ref name, .. } if name == DEFAULT_TEMPLATE_NAME)
        );
    }

    #[test]
    fn test_partial_is_parsed_but_not_executed() {
        let mut engine = engine();
        let partial = Input::from_file("tmpl/_greeting.tmpl", "Hi {{toUpper \"there\"}}");

        let mut out = Vec::new();
        let outcome = engine.run_template(&partial, &mut out).unwrap();
        assert_eq!(outcome, RunOutcome::Skipped);
        assert!(out.is_empty());

        let main = Input::from_file("tmpl/main.tmpl", "[{{> _greeting}}]");
        assert_eq!(render(&mut engine, &main), "[Hi THERE]");
    }

    #[test]
    fn test_parse_error_is_typed() {
        let mut engine = engine();
        let input = Input::from_file("bad.tmpl", "{{#if true}}never closed");
        let mut out = Vec::new();
        let err = engine.run_template(&input, &mut out).unwrap_err();

        assert!(matches!(err, TemplarError::TemplateParse { ref name, .. } if name == "bad.tmpl"));
        assert!(out.is_empty());
    }

    #[test]
    fn test_partial_parse_error_is_reported() {
        let mut engine = engine();
        let input = Input::from_file("_bad.tmpl", "{{#each items}}");
        let err = engine.run_template(&input, Vec::new()).unwrap_err();
        assert!(err.is_template_error());
    }

    #[test]
    fn test_missing_variable_fails_execution() {
        let mut engine = engine();
        let input = Input::from_file("vars.tmpl", "{{nope}}");
        let err = engine.run_template(&input, Vec::new()).unwrap_err();
        assert!(matches!(err, TemplarError::TemplateRender { .. }));
    }

    #[test]
    fn test_custom_delimiters() {
        let mut engine = TemplateEngine::new(
            &FunctionNamespace::builtin(),
            Delimiters::new("<<", ">>"),
        )
        .unwrap();
        let input = Input::from_text(r#"a <<toUpper "b">> c"#);
        assert_eq!(render(&mut engine, &input), "a B c");
    }

    #[test]
    fn test_custom_delimiters_inside_string_literal() {
        let mut engine = TemplateEngine::new(
            &FunctionNamespace::builtin(),
            Delimiters::new("<<", ">>"),
        )
        .unwrap();
        let input = Input::from_text(r#"a <<toUpper "x>>y">> b"#);
        assert_eq!(render(&mut engine, &input), "a X>>Y b");
    }

    #[test]
    fn test_translate_delimiters() {
        let delims = Delimiters::new("[[", "]]");
        assert_eq!(delims.translate("x [[ y ]] z"), "x {{ y }} z");
        assert_eq!(delims.translate("{{ literal }}"), "\\{{ literal }}");
        assert_eq!(delims.translate("open [[ y"), "open {{ y");

        assert_eq!(
            delims.translate(r#"[[ "a]]b" ]] c"#),
            r#"{{ "a]]b" }} c"#
        );
        assert_eq!(
            delims.translate(r#"[[ "q\"]]" ]]"#),
            r#"{{ "q\"]]" }}"#
        );
        assert_eq!(delims.translate("[[ `x]]` ]]"), "{{ `x]]` }}");

        let default = Delimiters::default();
        assert!(matches!(default.translate("{{x}}"), Cow::Borrowed("{{x}}")));
    }

    #[test]
    fn test_partial_names() {
        assert_eq!(partial_names("dir/_h.tmpl"), vec!["dir/_h.tmpl", "_h"]);
        assert_eq!(partial_names("_h"), vec!["_h"]);
    }
}
