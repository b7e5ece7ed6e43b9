//! Text encoding of dataflows
//!
//! ```text
//! observe geo:Slope
//!    using s:slope
//!    (
//!       reference geo:Elevation
//!    )
//!    apply gis.slope(units = "deg");
//! ```
//!
//! Used for logging, persistence and inspection. The encoding is a pure
//! function of the dataflow.

use crate::actuator::{Actuator, Dataflow};
use std::fmt::Write;

/// Encodes a [`Dataflow`] as text
#[derive(Debug, Clone, Copy)]
pub struct DataflowEncoder<'d> {
    dataflow: &'d Dataflow,
}

impl<'d> DataflowEncoder<'d> {
    #[must_use]
    pub const fn new(dataflow: &'d Dataflow) -> Self {
        Self { dataflow }
    }

    /// Encode all top-level actuators, one per statement
    #[must_use]
    pub fn encode(&self) -> String {
        let statements: Vec<String> = self
            .dataflow
            .actuators()
            .iter()
            .map(|actuator| {
                let mut out = String::new();
                encode_actuator(actuator, 0, &mut out);
                out
            })
            .collect();
        statements.join("\n")
    }
}

fn encode_actuator(actuator: &Actuator, indent: usize, out: &mut String) {
    let single = " ".repeat(indent);
    let double = " ".repeat(indent + 3);

    // writing to a String cannot fail
    let _ = write!(out, "{single}{} {}", actuator.kind(), actuator.target());

    if let Some(strategy) = actuator.strategy_urn() {
        let _ = write!(out, "\n{double}using {strategy}");
    }

    if !actuator.children().is_empty() {
        let _ = write!(out, "\n{double}(\n");
        let last = actuator.children().len() - 1;
        for (i, child) in actuator.children().iter().enumerate() {
            encode_actuator(child, indent + 6, out);
            if i < last {
                out.push_str(",\n");
            }
        }
        let _ = write!(out, "\n{double})");
    }

    let calls = actuator.computation();
    if !calls.is_empty() {
        let _ = write!(out, "\n{double}apply");
        for (i, call) in calls.iter().enumerate() {
            if calls.len() > 1 {
                let _ = write!(out, "\n{double}");
            } else {
                out.push(' ');
            }
            out.push_str(&call.encode());
            if i + 1 < calls.len() {
                out.push(',');
            }
        }
    }

    if indent == 0 {
        out.push(';');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::{ActuatorKind, ServiceCall};
    use kres_knowledge::ResourceSet;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn single_call_on_one_line() {
        let dataflow = Dataflow::new(
            vec![Actuator::new(ActuatorKind::Observe, "geo:Elevation")
                .using("s:direct")
                .with_call(ServiceCall::new("core.urn.resolver").with_parameter("urns", json!(["data:dem"])))],
            1.0,
            ResourceSet::native(),
        );
        assert_eq!(
            DataflowEncoder::new(&dataflow).encode(),
            "observe geo:Elevation\n   using s:direct\n   apply core.urn.resolver(urns = (\"data:dem\"));"
        );
    }

    #[test]
    fn children_and_multiple_calls() {
        let dataflow = Dataflow::new(
            vec![Actuator::new(ActuatorKind::Observe, "geo:Slope")
                .with_child(Actuator::new(ActuatorKind::Reference, "geo:Elevation"))
                .with_child(Actuator::new(ActuatorKind::Observe, "geo:Aspect").with_call(ServiceCall::new("gis.aspect")))
                .with_call(ServiceCall::new("gis.slope"))
                .with_call(ServiceCall::new("gis.smooth"))],
            1.0,
            ResourceSet::native(),
        );
        let expected = [
            "observe geo:Slope",
            "   (",
            "      reference geo:Elevation,",
            "      observe geo:Aspect",
            "         apply gis.aspect()",
            "   )",
            "   apply",
            "   gis.slope(),",
            "   gis.smooth();",
        ]
        .join("\n");
        assert_eq!(DataflowEncoder::new(&dataflow).encode(), expected);
    }

    #[test]
    fn nested_calls_line_up_with_their_apply() {
        let dataflow = Dataflow::new(
            vec![Actuator::new(ActuatorKind::Resolve, "geo:Slope").with_child(
                Actuator::new(ActuatorKind::Observe, "geo:Elevation")
                    .with_call(ServiceCall::new("dem.load"))
                    .with_call(ServiceCall::new("dem.fill")),
            )],
            1.0,
            ResourceSet::native(),
        );
        let expected = [
            "resolve geo:Slope",
            "   (",
            "      observe geo:Elevation",
            "         apply",
            "         dem.load(),",
            "         dem.fill()",
            "   );",
        ]
        .join("\n");
        assert_eq!(DataflowEncoder::new(&dataflow).encode(), expected);
    }

    #[test]
    fn empty_dataflow_encodes_to_nothing() {
        assert_eq!(DataflowEncoder::new(&Dataflow::empty()).encode(), "");
    }
}
