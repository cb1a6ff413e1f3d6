use serde::Serialize;

/// The data every template executes against.
///
/// Empty for now: all values reach templates through functions. Per-render state
/// belongs here.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Context {}
