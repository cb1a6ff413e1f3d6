//! String manipulation functions.
//!
//! Argument order follows pipeline style where it matters: the subject string comes
//! last for `replaceAll` and `indent` so they chain after other helpers.

use handlebars::JsonValue;

use super::{int_arg, text_arg, to_text, HelperFn, StaticGroup};

type FnResult = std::result::Result<JsonValue, String>;

const FUNCS: &[(&str, HelperFn)] = &[
    ("contains", contains),
    ("hasPrefix", has_prefix),
    ("hasSuffix", has_suffix),
    ("replaceAll", replace_all),
    ("split", split),
    ("splitN", split_n),
    ("title", title),
    ("toUpper", to_upper),
    ("toLower", to_lower),
    ("trim", trim),
    ("trimSpace", trim_space),
    ("indent", indent),
    ("join", join),
    ("urlParse", url_parse),
];

pub fn group() -> StaticGroup {
    StaticGroup::new("strings", FUNCS)
}

fn contains(args: &[&JsonValue]) -> FnResult {
    Ok(text_arg(args, 0)?.contains(&text_arg(args, 1)?).into())
}

fn has_prefix(args: &[&JsonValue]) -> FnResult {
    Ok(text_arg(args, 0)?.starts_with(&text_arg(args, 1)?).into())
}

fn has_suffix(args: &[&JsonValue]) -> FnResult {
    Ok(text_arg(args, 0)?.ends_with(&text_arg(args, 1)?).into())
}

/// `replaceAll old new s`
fn replace_all(args: &[&JsonValue]) -> FnResult {
    let old = text_arg(args, 0)?;
    let new = text_arg(args, 1)?;
    Ok(text_arg(args, 2)?.replace(&old, &new).into())
}

fn split(args: &[&JsonValue]) -> FnResult {
    let s = text_arg(args, 0)?;
    let sep = text_arg(args, 1)?;
    Ok(s.split(sep.as_str()).collect::<Vec<_>>().into())
}

/// `splitN s sep n`: at most `n` pieces; negative `n` means no limit, zero yields none.
fn split_n(args: &[&JsonValue]) -> FnResult {
    let s = text_arg(args, 0)?;
    let sep = text_arg(args, 1)?;
    let n = int_arg(args, 2)?;
    let parts: Vec<&str> = match usize::try_from(n) {
        Ok(0) => Vec::new(),
        Ok(n) => s.splitn(n, sep.as_str()).collect(),
        Err(_) => s.split(sep.as_str()).collect(),
    };
    Ok(parts.into())
}

/// Uppercase the first letter of every word.
fn title(args: &[&JsonValue]) -> FnResult {
    let s = text_arg(args, 0)?;
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if at_word_start && c.is_alphabetic() {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = !(c.is_alphanumeric() || c == '_' || c == '\'');
    }
    Ok(out.into())
}

fn to_upper(args: &[&JsonValue]) -> FnResult {
    Ok(text_arg(args, 0)?.to_uppercase().into())
}

fn to_lower(args: &[&JsonValue]) -> FnResult {
    Ok(text_arg(args, 0)?.to_lowercase().into())
}

/// `trim s cutset`: strip any of the characters in `cutset` from both ends.
fn trim(args: &[&JsonValue]) -> FnResult {
    let s = text_arg(args, 0)?;
    let cutset: Vec<char> = text_arg(args, 1)?.chars().collect();
    Ok(s.trim_matches(cutset.as_slice()).into())
}

fn trim_space(args: &[&JsonValue]) -> FnResult {
    Ok(text_arg(args, 0)?.trim().into())
}

/// `indent [width] [prefix] s`: prefix every non-empty line with `prefix` repeated `width` times.
fn indent(args: &[&JsonValue]) -> FnResult {
    let (width, prefix, s) = match args.len() {
        0 => return Err("missing argument 1".into()),
        1 => (1, " ".to_string(), text_arg(args, 0)?),
        2 => match int_arg(args, 0) {
            Ok(width) => (width, " ".to_string(), text_arg(args, 1)?),
            Err(_) => (1, text_arg(args, 0)?, text_arg(args, 1)?),
        },
        _ => (int_arg(args, 0)?, text_arg(args, 1)?, text_arg(args, 2)?),
    };
    let width = usize::try_from(width).map_err(|_| format!("negative indent width {width}"))?;
    let pad = prefix.repeat(width);

    let lines: Vec<String> = s
        .split('\n')
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{pad}{line}")
            }
        })
        .collect();
    Ok(lines.join("\n").into())
}

/// `join list sep`
fn join(args: &[&JsonValue]) -> FnResult {
    let list = args.first().ok_or("missing argument 1")?;
    let sep = text_arg(args, 1)?;
    let items = list
        .as_array()
        .ok_or_else(|| format!("argument 1 is not a list: {list}"))?;
    Ok(items.iter().map(to_text).collect::<Vec<_>>().join(&sep).into())
}

/// `urlParse s`: the components of an absolute URL.
///
/// Keys follow the usual URL field names: `Scheme`, `User`, `Host` (with port),
/// `Hostname`, `Port`, `Path`, `RawQuery`, `Fragment`.
fn url_parse(args: &[&JsonValue]) -> FnResult {
    let raw = text_arg(args, 0)?;
    let url = url::Url::parse(&raw).map_err(|e| format!("invalid URL {raw:?}: {e}"))?;

    let hostname = url.host_str().unwrap_or_default();
    let port = url.port().map(|p| p.to_string()).unwrap_or_default();
    let host = if port.is_empty() {
        hostname.to_string()
    } else {
        format!("{hostname}:{port}")
    };
    Ok(serde_json::json!({
        "Scheme": url.scheme(),
        "User": url.username(),
        "Host": host,
        "Hostname": hostname,
        "Port": port,
        "Path": url.path(),
        "RawQuery": url.query().unwrap_or_default(),
        "Fragment": url.fragment().unwrap_or_default(),
    }))
}
