//! The set of functions visible to templates.
//!
//! Functions are grouped by capability. Each group implements [`FuncGroup`] and publishes
//! a fixed list of names; a [`FunctionNamespace`] merges groups into one registry and
//! refuses to install two functions with the same name.
//!
//! Built-in groups:
//! - [`strings`]: `contains`, `split`, `toUpper`, `trimSpace`, ...
//! - [`conv`]: `bool`, `json`, `yaml`, `toml`, `toJSON`, ...
//! - [`env`]: `getenv`
//! - [`data`]: `datasource`/`ds`, `datasourceExists`, `include`
//!
//! Provider groups (for example the EC2 metadata functions in `templar-aws`) plug in
//! through the same trait.
//!
//! Every function has the same signature, [`HelperFn`]: it receives the evaluated
//! positional arguments and returns a JSON value or an error message. Errors surface as
//! template execution failures.

pub mod conv;
pub mod data;
pub mod env;
pub mod strings;

use std::collections::HashSet;

use handlebars::{
    Context, Handlebars, Helper, HelperDef, JsonValue, RenderContext, RenderError,
    RenderErrorReason, ScopedJson,
};

use crate::error::{Result, TemplarError};

/// Signature shared by every template function.
pub type HelperFn = fn(&[&JsonValue]) -> std::result::Result<JsonValue, String>;

/// A capability-scoped group of template functions.
pub trait FuncGroup: Send + Sync {
    /// Capability name: "strings", "conv", "aws", ...
    fn name(&self) -> &'static str;

    /// Every function name this group registers.
    fn functions(&self) -> Vec<&'static str>;

    /// Register the group's helpers.
    fn install(&self, registry: &mut Handlebars<'static>);
}

/// A stateless group backed by a static `(name, function)` table.
#[derive(Debug, Clone, Copy)]
pub struct StaticGroup {
    name: &'static str,
    table: &'static [(&'static str, HelperFn)],
}

impl StaticGroup {
    pub const fn new(name: &'static str, table: &'static [(&'static str, HelperFn)]) -> Self {
        Self { name, table }
    }
}

impl FuncGroup for StaticGroup {
    fn name(&self) -> &'static str {
        self.name
    }

    fn functions(&self) -> Vec<&'static str> {
        self.table.iter().map(|(name, _)| *name).collect()
    }

    fn install(&self, registry: &mut Handlebars<'static>) {
        for (name, f) in self.table {
            register_fn(registry, *name, *f);
        }
    }
}

/// Ordered collection of function groups making up a rendering session's namespace.
#[derive(Default)]
pub struct FunctionNamespace {
    groups: Vec<Box<dyn FuncGroup>>,
}

impl FunctionNamespace {
    /// An empty namespace.
    pub fn new() -> Self {
        Self::default()
    }

    /// The stateless built-ins: strings, conv and env.
    pub fn builtin() -> Self {
        Self::new()
            .with_group(strings::group())
            .with_group(conv::group())
            .with_group(env::group())
    }

    pub fn with_group(mut self, group: impl FuncGroup + 'static) -> Self {
        self.groups.push(Box::new(group));
        self
    }

    pub fn groups(&self) -> impl Iterator<Item = &dyn FuncGroup> {
        self.groups.iter().map(|g| g.as_ref())
    }

    /// All function names in registration order.
    ///
    /// Fails if two groups publish the same name.
    pub fn function_names(&self) -> Result<Vec<&'static str>> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();
        for group in &self.groups {
            for name in group.functions() {
                if !seen.insert(name) {
                    return Err(TemplarError::DuplicateFunction(name.to_string()));
                }
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Register every group into `registry`. Nothing is registered if names collide.
    pub fn install(&self, registry: &mut Handlebars<'static>) -> Result<()> {
        let names = self.function_names()?;
        for group in &self.groups {
            group.install(registry);
        }
        tracing::debug!(
            "installed {} template functions from {} groups",
            names.len(),
            self.groups.len()
        );
        Ok(())
    }
}

impl std::fmt::Debug for FunctionNamespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.groups.iter().map(|g| g.name()))
            .finish()
    }
}

/// Adapts a plain function or closure into a Handlebars helper.
pub struct FnHelper<F> {
    name: &'static str,
    f: F,
}

impl<F> FnHelper<F>
where
    F: Fn(&[&JsonValue]) -> std::result::Result<JsonValue, String> + Send + Sync,
{
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }
}

impl<F> HelperDef for FnHelper<F>
where
    F: Fn(&[&JsonValue]) -> std::result::Result<JsonValue, String> + Send + Sync,
{
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> std::result::Result<ScopedJson<'rc>, RenderError> {
        let args: Vec<&JsonValue> = h.params().iter().map(|p| p.value()).collect();
        (self.f)(&args).map(ScopedJson::Derived).map_err(|message| {
            RenderErrorReason::Other(format!("{}: {message}", self.name)).into()
        })
    }
}

/// Register `f` under `name`.
pub fn register_fn<F>(registry: &mut Handlebars<'static>, name: &'static str, f: F)
where
    F: Fn(&[&JsonValue]) -> std::result::Result<JsonValue, String> + Send + Sync + 'static,
{
    registry.register_helper(name, Box::new(FnHelper::new(name, f)));
}

// -------------------------------------------------------
// Argument helpers shared by the groups
// -------------------------------------------------------

/// Render a JSON value the way a template would print it: strings verbatim, null empty.
pub fn to_text(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The `i`th argument as text, or an error naming the missing position.
pub fn text_arg(args: &[&JsonValue], i: usize) -> std::result::Result<String, String> {
    args.get(i)
        .map(|v| to_text(v))
        .ok_or_else(|| format!("missing argument {}", i + 1))
}

/// The `i`th argument as a signed integer (numbers or numeric strings).
pub fn int_arg(args: &[&JsonValue], i: usize) -> std::result::Result<i64, String> {
    let value = args.get(i).ok_or_else(|| format!("missing argument {}", i + 1))?;
    match *value {
        JsonValue::Number(n) => n
            .as_i64()
            .ok_or_else(|| format!("argument {} is not an integer: {n}", i + 1)),
        JsonValue::String(s) => s
            .trim()
            .parse()
            .map_err(|_| format!("argument {} is not an integer: {s:?}", i + 1)),
        other => Err(format!("argument {} is not an integer: {other}", i + 1)),
    }
}

/// Resolve a trailing optional default: the first of `defaults`, else `fallback`.
pub fn default_or(defaults: &[&JsonValue], fallback: &str) -> String {
    defaults
        .first()
        .map(|v| to_text(v))
        .unwrap_or_else(|| fallback.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo(args: &[&JsonValue]) -> std::result::Result<JsonValue, String> {
        Ok(JsonValue::String(text_arg(args, 0)?))
    }

    const ECHO: &[(&str, HelperFn)] = &[("echo", echo)];
    const ECHO_AGAIN: &[(&str, HelperFn)] = &[("shout", echo), ("echo", echo)];

    #[test]
    fn test_builtin_names_are_unique() {
        let names = FunctionNamespace::builtin().function_names().unwrap();
        assert!(names.contains(&"toUpper"));
        assert!(names.contains(&"toJSON"));
        assert!(names.contains(&"getenv"));
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let ns = FunctionNamespace::new()
            .with_group(StaticGroup::new("a", ECHO))
            .with_group(StaticGroup::new("b", ECHO_AGAIN));

        let mut registry = Handlebars::new();
        let err = ns.install(&mut registry).unwrap_err();
        assert!(matches!(err, TemplarError::DuplicateFunction(ref n) if n == "echo"));
        assert!(registry
            .render_template("{{shout \"x\"}}", &json!({}))
            .is_err());
    }

    #[test]
    fn test_installed_helper_renders() {
        let ns = FunctionNamespace::new().with_group(StaticGroup::new("a", ECHO));
        let mut registry = Handlebars::new();
        ns.install(&mut registry).unwrap();

        let out = registry.render_template("{{echo 42}}", &json!({})).unwrap();
        assert_eq!(out, "42");
    }

    #[test]
    fn test_helper_error_names_function() {
        let ns = FunctionNamespace::new().with_group(StaticGroup::new("a", ECHO));
        let mut registry = Handlebars::new();
        ns.install(&mut registry).unwrap();

        let err = registry.render_template("{{echo}}", &json!({})).unwrap_err();
        assert!(err.to_string().contains("echo: missing argument 1"));
    }

    #[test]
    fn test_int_arg_accepts_numeric_strings() {
        let four = json!(4);
        let five = json!("5");
        let word = json!("five");
        assert_eq!(int_arg(&[&four], 0).unwrap(), 4);
        assert_eq!(int_arg(&[&five], 0).unwrap(), 5);
        assert!(int_arg(&[&word], 0).is_err());
    }
}
