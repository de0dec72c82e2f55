use std::sync::Arc;

use ingest_persistence::{JsonlEventStore, JsonlGraphSink};
use ingest_snyk::{FixtureSource, SnykContext};
use snyk_ingest::{run_ingestion, AppConfig, AppError};

fn run() -> Result<(), AppError> {
    let config = AppConfig::from_env()?;
    let Some(fixture) = config.fixture.as_ref() else {
        return Err(AppError::InvalidEnv { name: "INGEST_FIXTURE",
                                          value: String::new() });
    };
    let source = FixtureSource::from_path(fixture)?;
    let context = SnykContext::new(Arc::new(source), config.integration.clone());
    let event_store = JsonlEventStore::from_config(&config.sink)?;
    let mut sink = JsonlGraphSink::new(config.sink.clone());

    let outcome = run_ingestion(&context, config.execution_mode(), event_store, &mut sink)?;
    let report = &outcome.report;
    println!("run {} ({:?})", report.run_id, config.execution_mode());
    for step in &report.steps {
        match (&step.error, &step.blocked_by) {
            (Some(error), _) => println!("  {:<30} {:?}: {error}", step.step_id, step.status),
            (None, Some(dep)) => println!("  {:<30} blocked by {dep}", step.step_id),
            (None, None) => println!("  {:<30} {:?}", step.step_id, step.status),
        }
    }
    println!("entities: {} (+{} resolved targets)",
             outcome.snapshot.entities.len(),
             outcome.snapshot.mapped_targets.len());
    println!("relationships: {} direct, {} mapped",
             outcome.snapshot.relationships.len(),
             outcome.snapshot.mapped_relationships.len());
    println!("fingerprint: {}", report.run_fingerprint.as_deref().unwrap_or("-"));
    println!("output: {}", sink.run_dir(outcome.snapshot.run_id).display());
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
