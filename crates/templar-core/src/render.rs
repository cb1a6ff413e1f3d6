//! Run driver: renders either a directory tree or a flat list of inputs.

use std::io::Write;
use std::path::PathBuf;

use crate::config::RenderOptions;
use crate::engine::TemplateEngine;
use crate::error::{Result, TemplarError};
use crate::input::{read_inputs, Input};
use crate::output::Destination;
use crate::plan::plan_outputs;
use crate::walker::process_input_dir;

/// Render everything `options` describes. Stops at the first error.
pub fn run(options: &RenderOptions, engine: &mut TemplateEngine) -> Result<()> {
    match &options.input_dir {
        Some(input_dir) => {
            tracing::info!(
                "rendering directory {} into {}",
                input_dir.display(),
                options.output_dir.display()
            );
            process_input_dir(input_dir, &options.output_dir, engine)
        }
        None => process_input_files(
            options.input_text.as_deref(),
            &options.input_files,
            &options.output_files,
            engine,
        ),
    }
}

/// Flat mode: resolve every input, pair them with outputs, then render in order.
pub fn process_input_files(
    text: Option<&str>,
    files: &[String],
    outputs: &[String],
    engine: &mut TemplateEngine,
) -> Result<()> {
    let inputs = read_inputs(text, files)?;
    let plan = plan_outputs(inputs, outputs)?;
    for entry in &plan {
        render_input(engine, &entry.input, &entry.destination)?;
    }
    Ok(())
}

/// Parse `input` and, unless it is a partial, render it into `destination`.
///
/// The destination is opened only after the template parsed, and is closed before
/// returning on every path.
pub fn render_input(
    engine: &mut TemplateEngine,
    input: &Input,
    destination: &Destination,
) -> Result<()> {
    let Some(template) = engine.prepare(input)? else {
        tracing::debug!("skipping partial {}", input.filename());
        return Ok(());
    };

    let mut sink = destination.open()?;
    template.execute(&mut sink)?;
    sink.flush().map_err(|source| TemplarError::Write {
        path: PathBuf::from(destination.to_string()),
        source,
    })?;
    tracing::debug!("rendered {} -> {destination}", template_label(input));
    Ok(())
}

fn template_label(input: &Input) -> &str {
    match input.filename() {
        "" => "(inline)",
        name => name,
    }
}
