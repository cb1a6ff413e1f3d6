//! Reading and classifying template inputs.
//!
//! An [`Input`] is created once per source (a literal string, a file, or standard input)
//! and never changes afterwards. Inputs whose base filename starts with `_` are
//! *partials*: they are parsed and registered so other templates can include them, but
//! they are never rendered to an output of their own.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::error::{Result, TemplarError};

/// Sentinel filename for standard input (and, on the output side, standard output).
pub const STDIO: &str = "-";

/// A template source and its text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    filename: String,
    text: String,
    partial: bool,
}

impl Input {
    /// An input given directly as text. Never a partial, and has no filename.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            filename: String::new(),
            text: text.into(),
            partial: false,
        }
    }

    /// An input read from `filename`; partial-ness is derived from the name.
    pub fn from_file(filename: impl Into<String>, text: impl Into<String>) -> Self {
        let filename = filename.into();
        let partial = is_partial_filename(&filename);
        Self {
            filename,
            text: text.into(),
            partial,
        }
    }

    /// The source filename, or `""` for literal text.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_partial(&self) -> bool {
        self.partial
    }
}

/// Whether the last path segment of `filename` starts with `_`.
pub fn is_partial_filename(filename: &str) -> bool {
    Path::new(filename)
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('_'))
}

/// Resolve the inputs for flat (non-directory) mode.
///
/// Literal `text`, when present, wins and yields a single non-partial input. Otherwise
/// every file is read in order, with an empty list meaning standard input. The first
/// failure aborts the whole batch.
pub fn read_inputs(text: Option<&str>, files: &[String]) -> Result<Vec<Input>> {
    if let Some(text) = text.filter(|t| !t.is_empty()) {
        return Ok(vec![Input::from_text(text)]);
    }

    if files.is_empty() {
        return Ok(vec![read_input(STDIO)?]);
    }

    files.iter().map(|f| read_input(f)).collect()
}

/// Read one input to completion. `"-"` reads standard input.
///
/// The file handle lives only inside this call and is closed on every path.
pub fn read_input(filename: impl AsRef<Path>) -> Result<Input> {
    let path = filename.as_ref();
    let read_err = |source: io::Error| TemplarError::Read {
        path: path.to_path_buf(),
        source,
    };

    let mut text = String::new();
    if path == Path::new(STDIO) {
        io::stdin().lock().read_to_string(&mut text).map_err(read_err)?;
    } else {
        let mut file = File::open(path).map_err(read_err)?;
        file.read_to_string(&mut text).map_err(read_err)?;
    }

    tracing::debug!("read input {} ({} bytes)", path.display(), text.len());
    Ok(Input::from_file(path.to_string_lossy(), text))
}
