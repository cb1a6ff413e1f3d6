//! The render command: compose the function namespace, build the engine, run.

use std::sync::Arc;

use anyhow::Context;
use templar_aws::{AwsConfig, AwsNamespace};
use templar_core::config::RenderOptions;
use templar_core::engine::TemplateEngine;
use templar_core::namespace::data::{Data, DataFuncs};
use templar_core::namespace::FunctionNamespace;

pub fn run(options: &RenderOptions, aws: AwsConfig) -> anyhow::Result<()> {
    let data = Data::from_specs(&options.datasources).context("invalid --datasource")?;
    tracing::info!("{} data source(s) declared", options.datasources.len());

    let namespace = FunctionNamespace::builtin()
        .with_group(DataFuncs::new(Arc::new(data)))
        .with_group(AwsNamespace::new(aws));

    let mut engine = TemplateEngine::new(&namespace, options.delimiters.clone())?;
    templar_core::render::run(options, &mut engine)?;
    Ok(())
}
