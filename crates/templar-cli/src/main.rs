//! templar CLI: render templates from files, literal text or whole directory trees.
//!
//! Templates are Handlebars with a function namespace for strings, conversions,
//! environment variables, file data sources and EC2 instance metadata. Inputs whose name
//! starts with `_` are partials: they can be included with `{{> _name}}` but produce no
//! output of their own.

mod commands;
mod output;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use templar_aws::AwsConfig;
use templar_core::config::RenderOptions;
use templar_core::engine::Delimiters;
use templar_core::error::TemplarError;

#[derive(Parser, Debug)]
#[command(
    name = "templar",
    about = "Render templates with data sources and instance metadata",
    version
)]
struct Cli {
    /// Template text to render (takes precedence over --file)
    #[arg(short = 'i', long = "in", value_name = "TEXT")]
    input_text: Option<String>,

    /// Template file to read; repeatable, `-` is stdin (default: stdin)
    #[arg(short = 'f', long = "file", value_name = "PATH")]
    files: Vec<String>,

    /// Output file, paired with non-partial inputs in order; `-` is stdout (default: stdout)
    #[arg(short = 'o', long = "out", value_name = "PATH")]
    outputs: Vec<String>,

    /// Render every file under this directory
    #[arg(long, value_name = "DIR", conflicts_with_all = ["input_text", "files", "outputs"])]
    input_dir: Option<PathBuf>,

    /// Where to mirror --input-dir
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Data source as `alias=path`, `alias=file:///path` or a bare path; repeatable
    #[arg(short = 'd', long = "datasource", value_name = "SPEC")]
    datasources: Vec<String>,

    /// Left action delimiter
    #[arg(long, env = "TEMPLAR_LEFT_DELIM", default_value = "{{")]
    left_delim: String,

    /// Right action delimiter
    #[arg(long, env = "TEMPLAR_RIGHT_DELIM", default_value = "}}")]
    right_delim: String,

    /// Instance metadata service endpoint
    #[arg(long, env = "AWS_META_ENDPOINT", default_value = templar_aws::DEFAULT_ENDPOINT)]
    metadata_endpoint: String,

    /// Instance metadata request timeout in milliseconds
    #[arg(long, env = "AWS_TIMEOUT", default_value_t = templar_aws::DEFAULT_TIMEOUT_MS)]
    metadata_timeout_ms: u64,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn render_options(&self) -> RenderOptions {
        let defaults = RenderOptions::default();
        RenderOptions {
            input_text: self.input_text.clone(),
            input_files: self.files.clone(),
            output_files: self.outputs.clone(),
            input_dir: self.input_dir.clone(),
            output_dir: self.output_dir.clone().unwrap_or(defaults.output_dir),
            datasources: self.datasources.clone(),
            delimiters: Delimiters::new(&self.left_delim, &self.right_delim),
        }
    }

    fn aws_config(&self) -> AwsConfig {
        AwsConfig {
            endpoint: self.metadata_endpoint.clone(),
            timeout: Duration::from_millis(self.metadata_timeout_ms),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout may be a rendered template.
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if cli.output_dir.is_some() && cli.input_dir.is_none() {
        output::print_warning("--output-dir has no effect without --input-dir");
    }

    if let Err(e) = commands::render::run(&cli.render_options(), cli.aws_config()) {
        output::print_error(&format!("{e:#}"));
        std::process::exit(exit_code(&e));
    }
}

/// `2` when a template is broken, `1` for everything else.
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<TemplarError>() {
        Some(e) if e.is_template_error() => 2,
        _ => 1,
    }
}
