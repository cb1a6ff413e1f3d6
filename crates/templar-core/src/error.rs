//! Unified error types for the templar toolkit.

use std::path::PathBuf;
use thiserror::Error;

/// All errors that can occur while resolving, planning, or rendering templates.
#[derive(Error, Debug)]
pub enum TemplarError {
    // --- Inputs ---

    /// An input file (or standard input) could not be opened or read to completion.
    #[error("failed to read input {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input directory given for directory mode does not exist or cannot be stat'ed.
    #[error("input path not found: {path}")]
    NotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Listing the entries of an input directory failed.
    #[error("failed to list directory {path}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // --- Outputs ---

    /// A mirrored output directory could not be created.
    #[error("failed to create output directory {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An output file could not be opened for writing.
    #[error("failed to open output {path}")]
    OpenOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Flushing rendered output to its destination failed.
    #[error("failed to write output {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// More renderable (non-partial) inputs were given than output destinations.
    #[error("fewer output destinations than renderable inputs ({available} outputs for {needed} inputs)")]
    NotEnoughOutputs { needed: usize, available: usize },

    // --- Templates ---

    /// The template text is not valid template syntax.
    #[error("failed to parse template {name}: {message}")]
    TemplateParse { name: String, message: String },

    /// A parsed template failed while executing.
    #[error("failed to render template {name}: {message}")]
    TemplateRender { name: String, message: String },

    /// Two function groups tried to publish the same function name.
    #[error("template function '{0}' is defined by more than one function group")]
    DuplicateFunction(String),

    // --- Data sources ---

    /// A `--datasource` argument could not be understood.
    #[error("invalid datasource: {0}")]
    InvalidDatasource(String),
}

impl TemplarError {
    /// Whether this error reports a defect in a template itself rather than its environment.
    ///
    /// The CLI exits with a distinct status for these so callers can tell a broken
    /// template from a missing file.
    pub fn is_template_error(&self) -> bool {
        matches!(
            self,
            Self::TemplateParse { .. } | Self::TemplateRender { .. }
        )
    }
}

/// Alias for `Result<T, TemplarError>`.
pub type Result<T> = std::result::Result<T, TemplarError>;
