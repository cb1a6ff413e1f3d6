//! Resolved options for one templar run.
//!
//! There is no configuration file: the CLI fills this from flags and environment
//! variables.

use std::path::PathBuf;

use crate::engine::Delimiters;

/// Everything the run driver needs to know about inputs and outputs.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Literal template text; takes precedence over `input_files`.
    pub input_text: Option<String>,
    /// Input files in order (`-` is standard input). Empty means standard input.
    pub input_files: Vec<String>,
    /// Output files paired positionally with non-partial inputs. Empty means stdout.
    pub output_files: Vec<String>,
    /// Directory mode: render this tree instead of the flat inputs.
    pub input_dir: Option<PathBuf>,
    /// Directory mode: root of the mirrored output tree.
    pub output_dir: PathBuf,
    /// `alias=path` data source declarations.
    pub datasources: Vec<String>,
    pub delimiters: Delimiters,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            input_text: None,
            input_files: Vec::new(),
            output_files: Vec::new(),
            input_dir: None,
            output_dir: PathBuf::from("."),
            datasources: Vec::new(),
            delimiters: Delimiters::default(),
        }
    }
}
