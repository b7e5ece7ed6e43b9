//! Functional tests for context handling, degraded collaborators and
//! configuration.
//!
//! - Dependent observables need a context observation; without one the
//!   session fails with MissingContext and nothing is compiled.
//! - Slow collaborators are cut off by the configured timeout and count as
//!   empty answers.
//! - Configuration files are YAML with defaults for missing keys.

use kres_knowledge::{Observation, Scale};
use kres_resolver::{ResolverConfig, ResolverError, DEFAULT_RANKING_STRATEGY};
use kres_test_utils::{
    band, data_model, init_tracing, load_config, quality, scale, setup_test_service,
    setup_test_service_with, InMemoryCatalog, InMemoryReasoner, InMemoryRuntime, TestBed,
};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

/// Helper: slope computed from elevation, elevation read from data.
fn slope_models(optional: bool) -> InMemoryCatalog {
    let elevation = quality("geo:Elevation");
    let dependency = if optional { elevation.clone().optional() } else { elevation.clone() };
    InMemoryCatalog::new()
        .with_model(data_model("m:slope", quality("geo:Slope"), "data:slope").with_dependency(dependency))
        .with_model(data_model("m:dem", elevation, "data:dem"))
}

/// Tenet: a dependent quality without context is fatal and yields no dataflow.
///
/// No collaborator may be consulted: the request is rejected before any
/// search starts.
#[tokio::test]
async fn dependent_without_context_is_fatal() {
    init_tracing();
    let bed = TestBed::with_models([data_model("m:dem", quality("geo:Elevation"), "data:dem")]);
    let scope = bed.scope_without_context();

    let result = setup_test_service()
        .resolve(Arc::new(Observation::new(quality("geo:Elevation"), Some(scale()))), &scope)
        .await;

    match result {
        Err(ResolverError::MissingContext { urn, .. }) => assert_eq!(urn, "geo:Elevation"),
        other => panic!("expected MissingContext, got {other:?}"),
    }
    assert!(scope.is_fatal());
    assert!(bed.reasoner.calls().is_empty());
    assert!(bed.catalog.queries().is_empty());
}

/// Tenet: a timed-out catalog fails the required dependency that needed it.
#[tokio::test]
async fn slow_catalog_fails_required_dependency() {
    init_tracing();
    let catalog = slope_models(false).with_delay("geo:Elevation", Duration::from_millis(500));
    let bed = TestBed::new(InMemoryReasoner::new(), catalog, InMemoryRuntime::new());
    let service = setup_test_service_with(ResolverConfig::new().with_collaborator_timeout(Duration::from_millis(20)));

    let result = service
        .resolve(Arc::new(Observation::new(quality("geo:Slope"), None)), &bed.scope())
        .await;

    assert!(matches!(result, Err(ResolverError::CannotResolve { ref urn, .. }) if urn == "geo:Slope"));
    assert!(bed.catalog.queries().contains(&"geo:Elevation".to_owned()));
}

/// Tenet: the same timeout only drops an optional dependency.
#[tokio::test]
async fn slow_catalog_skips_optional_dependency() {
    init_tracing();
    let catalog = slope_models(true).with_delay("geo:Elevation", Duration::from_millis(500));
    let bed = TestBed::new(InMemoryReasoner::new(), catalog, InMemoryRuntime::new());
    let service = setup_test_service_with(ResolverConfig::new().with_collaborator_timeout(Duration::from_millis(20)));

    let dataflow = service
        .resolve(Arc::new(Observation::new(quality("geo:Slope"), None)), &bed.scope())
        .await
        .unwrap();

    let observe = &dataflow.actuators()[0];
    assert_eq!(observe.target(), "geo:Slope");
    assert!(observe.children().is_empty());
}

/// Tenet: collectives are resolved over the observer's view.
///
/// The request itself has no geometry; the models only need to cover what
/// the observer sees.
#[tokio::test]
async fn collectives_use_the_observer_view() {
    init_tracing();
    let towns = kres_knowledge::Observable::new("earth:Town", kres_knowledge::SemanticType::Subject).collective();
    let bed = TestBed::with_models([data_model("m:towns", towns.clone(), "data:towns").with_coverage(band(0.0, 10.0))]);
    let observer = Observation::new(kres_test_utils::region(), Some(scale())).resolved();
    let scope = bed.scope_without_context().with_observer(observer);

    let dataflow = setup_test_service()
        .resolve(Arc::new(Observation::new(towns.clone(), None)), &scope)
        .await
        .unwrap();
    assert!((dataflow.coverage() - 1.0).abs() < 1e-9);

    // without an observer the request is scalar and the regional model still covers it
    let dataflow = setup_test_service()
        .resolve(Arc::new(Observation::new(towns, Some(Scale::scalar()))), &bed.scope_without_context())
        .await
        .unwrap();
    assert_eq!(dataflow.actuators().len(), 1);
}

/// Tenet: configuration loads from YAML files with defaults for the rest.
#[test]
fn config_loads_from_yaml_file() -> anyhow::Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(file, "min_relevant_gain: 0.25")?;
    writeln!(file, "strategy_parallelism: 2")?;
    writeln!(file, "collaborator_timeout_ms: 1500")?;

    let config = load_config(file.path())?;
    assert!((config.min_relevant_gain - 0.25).abs() < f64::EPSILON);
    assert_eq!(config.strategy_parallelism, 2);
    assert_eq!(config.collaborator_timeout(), Duration::from_millis(1500));
    assert_eq!(config.ranking_strategy, DEFAULT_RANKING_STRATEGY);
    assert_eq!(config.model_parallelism, ResolverConfig::default().model_parallelism);
    Ok(())
}

/// Tenet: invalid configuration is rejected before any resolution.
#[test]
fn invalid_config_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "completeness_epsilon: 0.9").unwrap();

    let err = load_config(file.path()).unwrap_err();
    let root = err.downcast_ref::<ResolverError>().unwrap();
    assert!(root.is_fatal());
}
