//! Core library for the templar template renderer.
//!
//! Renders Handlebars templates that call into a namespace of data-retrieval functions,
//! either as a flat list of inputs paired with outputs, or as a directory tree mirrored
//! into an output tree. Files whose name starts with `_` are *partials*: parsed so other
//! templates can include them, never rendered on their own.
//!
//! - [`input`]: reading and classifying inputs
//! - [`plan`]: pairing flat inputs with output destinations
//! - [`walker`]: directory mirroring
//! - [`engine`]: the Handlebars engine wrapper and custom delimiters
//! - [`namespace`]: template functions grouped by capability
//! - [`lazy`]: one-time construction of shared resources
//!
//! Provider namespaces live in their own crates and plug in through
//! [`namespace::FuncGroup`]:
//! - [`templar_aws`](https://docs.rs/templar-aws): EC2 instance metadata

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod input;
pub mod lazy;
pub mod namespace;
pub mod output;
pub mod plan;
pub mod render;
pub mod walker;
