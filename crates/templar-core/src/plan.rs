//! Pairing inputs with output destinations in flat (non-directory) mode.
//!
//! Inputs and destinations pair positionally, but partials never consume a destination:
//! with inputs `[_h, a, b]` and outputs `[x, y]`, `a → x`, `b → y`, and `_h` is discarded.
//! An empty destination list means standard output.

use crate::error::{Result, TemplarError};
use crate::input::{Input, STDIO};
use crate::output::Destination;

/// One input and where its rendering goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub input: Input,
    pub destination: Destination,
}

/// Pair `inputs` with `outputs` in order, skipping partials.
///
/// Fails before planning anything if there are fewer outputs than non-partial inputs.
/// Surplus outputs are ignored.
pub fn plan_outputs(inputs: Vec<Input>, outputs: &[String]) -> Result<Vec<PlanEntry>> {
    let default_outputs = [STDIO.to_string()];
    let outputs = if outputs.is_empty() {
        &default_outputs[..]
    } else {
        outputs
    };

    let needed = inputs.iter().filter(|i| !i.is_partial()).count();
    if needed > outputs.len() {
        return Err(TemplarError::NotEnoughOutputs {
            needed,
            available: outputs.len(),
        });
    }

    let mut next = outputs.iter();
    let plan = inputs
        .into_iter()
        .map(|input| {
            let destination = if input.is_partial() {
                Destination::Discard
            } else {
                // Length was checked above.
                next.next()
                    .map(|o| Destination::parse(o))
                    .unwrap_or(Destination::Discard)
            };
            PlanEntry { input, destination }
        })
        .collect();
    Ok(plan)
}
