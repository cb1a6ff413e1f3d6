//! Environment access.

use handlebars::JsonValue;

use super::{default_or, text_arg, HelperFn, StaticGroup};

const FUNCS: &[(&str, HelperFn)] = &[("getenv", getenv)];

pub fn group() -> StaticGroup {
    StaticGroup::new("env", FUNCS)
}

/// `getenv name [default]`: unset and empty variables both fall back to the default.
fn getenv(args: &[&JsonValue]) -> std::result::Result<JsonValue, String> {
    let name = text_arg(args, 0)?;
    let value = std::env::var(&name)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default_or(&args[1..], ""));
    Ok(value.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_getenv_default() {
        let name = json!("TEMPLAR_TEST_SURELY_UNSET_VARIABLE");
        let default = json!("fallback");
        assert_eq!(getenv(&[&name]).unwrap(), json!(""));
        assert_eq!(getenv(&[&name, &default]).unwrap(), json!("fallback"));
    }

    #[test]
    fn test_getenv_reads_process_env() {
        let path = std::env::var("PATH").unwrap_or_default();
        let name = json!("PATH");
        let default = json!("unused");
        let expected = if path.is_empty() { "unused".to_string() } else { path };
        assert_eq!(getenv(&[&name, &default]).unwrap(), json!(expected));
    }
}
