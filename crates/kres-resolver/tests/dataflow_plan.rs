//! Functional tests for end-to-end resolution into dataflows.
//!
//! These tests go through ResolverService, the public entry point:
//! - Resolution graphs compile into actuator trees that follow the
//!   strategies' operation order.
//! - The text encoding is stable and matches the documented layout.
//! - Dataflows survive a JSON round trip for persistence.

use kres_dataflow::{ActuatorKind, Dataflow};
use kres_knowledge::{Contextualizable, Observation, ObservationStrategy, Operation};
use kres_test_utils::{
    band, data_model, init_tracing, quality, region_observation, setup_test_service,
    InMemoryCatalog, InMemoryReasoner, InMemoryRuntime, TestBed,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

/// Tenet: one dependency-free model covering everything is one OBSERVE actuator.
#[tokio::test]
async fn single_model_dataflow() {
    init_tracing();
    let elevation = quality("geo:Elevation");
    let bed = TestBed::with_models([data_model("m:dem", elevation.clone(), "data:dem")]);
    let service = setup_test_service();

    let dataflow = service
        .resolve(Arc::new(Observation::new(elevation, None)), &bed.scope())
        .await
        .unwrap();

    assert_eq!(dataflow.actuators().len(), 1);
    let observe = &dataflow.actuators()[0];
    assert_eq!(observe.kind(), ActuatorKind::Observe);
    assert!(observe.children().is_empty());
    assert!((dataflow.coverage() - 1.0).abs() < 1e-9);

    let expected = [
        "observe geo:Elevation",
        "   using default:geo:Elevation",
        "   apply",
        "   core.urn.resolver(urns = (\"data:dem\")),",
        "   m:dem();",
    ]
    .join("\n");
    assert_eq!(service.encode(&dataflow), expected);
    // encoding is a pure function of the dataflow
    assert_eq!(service.encode(&dataflow), service.encode(&dataflow.clone()));
}

/// Tenet: overlapping models become sibling OBSERVE actuators.
#[tokio::test]
async fn overlapping_models_are_siblings() {
    init_tracing();
    let elevation = quality("geo:Elevation");
    let bed = TestBed::with_models([
        data_model("m:west", elevation.clone(), "data:west").with_coverage(band(0.0, 6.0)),
        data_model("m:east", elevation.clone(), "data:east").with_coverage(band(5.0, 10.0)),
    ]);

    let dataflow = setup_test_service()
        .resolve(Arc::new(Observation::new(elevation, None)), &bed.scope())
        .await
        .unwrap();

    let calls: Vec<_> = dataflow
        .actuators()
        .iter()
        .map(|a| (a.kind(), a.computation()[1].name().to_owned()))
        .collect();
    assert_eq!(
        calls,
        vec![
            (ActuatorKind::Observe, "m:west".to_owned()),
            (ActuatorKind::Observe, "m:east".to_owned()),
        ]
    );
    assert_eq!(dataflow.resources().len(), 2);
}

/// Tenet: dependencies nest under the model that needs them.
///
/// Slope is computed from elevation. The elevation observation is compiled
/// inside the slope actuator, and the strategy's APPLY follows.
#[tokio::test]
async fn dependencies_and_apply_nest() {
    init_tracing();
    let slope = quality("geo:Slope");
    let elevation = quality("geo:Elevation");
    let reasoner = InMemoryReasoner::new().with_strategies(
        "geo:Slope",
        vec![ObservationStrategy::new(
            "s:slope",
            vec![
                Operation::observe(slope.clone()),
                Operation::apply(vec![Contextualizable::call("gis.smooth").with_parameter("window", serde_json::json!(3))]),
            ],
        )],
    );
    let catalog = InMemoryCatalog::new()
        .with_model(
            kres_knowledge::Model::new("m:slope", slope.clone())
                .with_dependency(elevation.clone().named("elevation"))
                .with_computation(Contextualizable::call("gis.slope")),
        )
        .with_model(data_model("m:dem", elevation, "data:dem"));
    let bed = TestBed::new(reasoner, catalog, InMemoryRuntime::new());
    let service = setup_test_service();

    let dataflow = service
        .resolve(Arc::new(Observation::new(slope, None)), &bed.scope())
        .await
        .unwrap();

    let expected = [
        "observe geo:Slope",
        "   using s:slope",
        "   (",
        "      observe geo:Elevation",
        "         using default:geo:Elevation",
        "         apply",
        "         core.urn.resolver(urns = (\"data:dem\")),",
        "         m:dem()",
        "   )",
        "   apply gis.slope();",
        "apply geo:Slope",
        "   using s:slope",
        "   apply gis.smooth(window = 3);",
    ]
    .join("\n");
    assert_eq!(service.encode(&dataflow), expected);
}

/// Tenet: observations that already exist are referenced, not recomputed.
#[tokio::test]
async fn known_observations_are_referenced() {
    init_tracing();
    let slope = quality("geo:Slope");
    let elevation = quality("geo:Elevation");
    let bed = TestBed::with_models([kres_knowledge::Model::new("m:slope", slope.clone())
        .with_dependency(elevation.clone())
        .with_computation(Contextualizable::call("gis.slope"))]);
    let scope = bed.scope().with_observation(Observation::new(elevation, None).resolved());

    let dataflow = setup_test_service()
        .resolve(Arc::new(Observation::new(slope, None)), &scope)
        .await
        .unwrap();

    let observe = &dataflow.actuators()[0];
    assert_eq!(observe.children().len(), 1);
    assert_eq!(observe.children()[0].kind(), ActuatorKind::Reference);
    assert_eq!(observe.children()[0].target(), "geo:Elevation");
    // nothing was asked about elevation
    assert_eq!(bed.catalog.queries(), vec!["geo:Slope"]);
}

/// Tenet: a context with nothing to resolve it still gets instantiated.
#[tokio::test]
async fn unresolvable_subject_is_trivial() {
    init_tracing();
    let bed = TestBed::new(InMemoryReasoner::new(), InMemoryCatalog::new(), InMemoryRuntime::new());
    let region = Observation::new(kres_test_utils::region(), None);

    let dataflow = setup_test_service()
        .resolve(Arc::new(region), &bed.scope_without_context())
        .await
        .unwrap();

    assert_eq!(dataflow.actuators().len(), 1);
    assert_eq!(dataflow.actuators()[0].kind(), ActuatorKind::Resolve);
    assert!(dataflow.actuators()[0].computation().is_empty());
}

/// Tenet: dataflows persist as JSON without loss.
#[tokio::test]
async fn dataflow_json_round_trip() {
    init_tracing();
    let elevation = quality("geo:Elevation");
    let bed = TestBed::with_models([data_model("m:dem", elevation.clone(), "data:dem")]);
    let context = region_observation();
    let scope = bed.scope_without_context().with_context_observation(context);

    let dataflow = setup_test_service()
        .resolve(Arc::new(Observation::new(elevation, None)), &scope)
        .await
        .unwrap();

    let json = serde_json::to_string(&dataflow).unwrap();
    let restored: Dataflow = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, dataflow);
    assert!(json.contains("\"kind\":\"observe\""));
}
