use std::sync::Arc;

use ingest_core::{CoreResult, Entity, EntitySchema, ExecutionMode, GraphCoreError, InMemoryEventStore,
                  InMemoryGraphSink, JobState, SchedulerBuilder, StepDescriptor, StepExecutionContext, StepStatus};
use ingest_persistence::jsonl::{read_lines, ENTITIES_FILE};
use ingest_persistence::{JsonlEventStore, JsonlGraphSink, SinkConfig};
use ingest_snyk::{FixtureSource, IntegrationConfig, SnykContext};
use serde_json::json;
use snyk_ingest::run_ingestion;
use uuid::Uuid;

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/crates/ingest-snyk/tests/fixtures/snyk_fixture.json");

fn context(source: FixtureSource) -> SnykContext {
    SnykContext::new(Arc::new(source), IntegrationConfig::new("token", "g-1"))
}

fn project(org: &str, id: &str) -> Entity {
    Entity::new(format!("snyk_project:{org}-{id}"), "snyk_project", &["Project"]).with_property("name", id)
                                                                               .with_property("orgId", org)
}

#[test]
fn reprocessing_a_project_feed_keeps_one_entity() {
    let state = JobState::new(Uuid::new_v4());
    for org in ["1", "2"] {
        state.add_entity(Entity::new(format!("snyk_org:{org}"), "snyk_organization", &["Organization"])).unwrap();
    }
    state.add_entity(project("1", "foo")).unwrap();
    state.add_entity(project("1", "foo")).unwrap();
    assert_eq!(state.entity_count_by_type("snyk_project"), 1);

    let changed = project("1", "foo").with_property("branch", "dev");
    assert_eq!(state.add_entity(changed), Err(GraphCoreError::DuplicateEntity { key: "snyk_project:1-foo".into() }));
}

#[test]
fn raw_data_round_trips_through_the_store() {
    let state = JobState::new(Uuid::new_v4());
    let raw = json!({"id": "p-1", "attributes": {"nested": [1, 2, {"deep": true}]}});
    let stored = state.add_entity(project("1", "p-1").with_raw_data(raw.clone())).unwrap();
    assert_eq!(state.get_raw_data(&stored).as_deref(), Some(&raw));
}

const STEP: EntitySchema = EntitySchema { resource_name: "Step output",
                                          entity_type: "step_output",
                                          class: &["Record"] };

fn ok(ctx: &StepExecutionContext<'_, ()>) -> CoreResult<()> {
    ctx.add_entity(Entity::new(format!("step_output:{}", ctx.step_id()), STEP.entity_type, STEP.class))?;
    Ok(())
}

fn boom(_: &StepExecutionContext<'_, ()>) -> CoreResult<()> {
    Err(GraphCoreError::ExternalSource("503 from upstream".into()))
}

#[test]
fn failing_leaf_does_not_stop_its_sibling_branch() {
    for mode in [ExecutionMode::Sequential, ExecutionMode::Parallel] {
        let steps = vec![StepDescriptor::new("A", "A", ok).with_entities(&[STEP]),
                         StepDescriptor::new("B", "B", ok).with_entities(&[STEP]).with_dependencies(&["A"]),
                         StepDescriptor::new("C", "C", boom).with_dependencies(&["B"]),
                         StepDescriptor::new("D", "D", ok).with_entities(&[STEP]).with_dependencies(&["A"])];
        let state = JobState::new(Uuid::new_v4());
        let mut scheduler = SchedulerBuilder::new().add_steps(steps).mode(mode).build().unwrap();
        let report = scheduler.run(&state, &()).unwrap();

        assert_eq!(report.failed_steps(), vec!["C"]);
        assert!(report.blocked_steps().is_empty());
        for id in ["A", "B", "D"] {
            assert_eq!(report.status_of(id), Some(StepStatus::Completed), "{id} in {mode:?}");
        }
        assert!(!report.is_success());
        assert_eq!(state.entity_count(), 3);
    }
}

#[test]
fn cve_shared_by_two_projects_resolves_to_one_entity() {
    let mut sink = InMemoryGraphSink::default();
    let outcome = run_ingestion(&context(FixtureSource::from_path(FIXTURE).unwrap()),
                                ExecutionMode::Sequential,
                                InMemoryEventStore::new(),
                                &mut sink).unwrap();
    assert!(outcome.report.is_success());

    let snapshot = sink.last().unwrap();
    assert_eq!(snapshot, &outcome.snapshot);
    let cves: Vec<_> = snapshot.entities_of_type("cve").collect();
    assert_eq!(cves.len(), 1);
    assert_eq!(cves[0].key, "cve-2021-9999");
    let is_edges: Vec<_> = snapshot.relationships_to("cve-2021-9999").map(|r| r.from_entity_key.as_str()).collect();
    assert_eq!(is_edges, vec!["snyk_finding:p-1-SNYK-JS-1", "snyk_finding:p-3-SNYK-PY-1"]);
}

#[test]
fn schedules_agree_on_the_published_graph() {
    let run = |mode| {
        let mut sink = InMemoryGraphSink::default();
        run_ingestion(&context(FixtureSource::from_path(FIXTURE).unwrap()), mode, InMemoryEventStore::new(), &mut sink)
            .unwrap()
    };
    let sequential = run(ExecutionMode::Sequential);
    let parallel = run(ExecutionMode::Parallel);
    assert_eq!(sequential.report.run_fingerprint, parallel.report.run_fingerprint);
    assert_eq!(sequential.snapshot.entities, parallel.snapshot.entities);
    assert_eq!(sequential.snapshot.relationships, parallel.snapshot.relationships);
    assert_eq!(sequential.snapshot.mapped_targets, parallel.snapshot.mapped_targets);
}

#[test]
fn partial_run_is_still_published_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let config = SinkConfig::new(dir.path());
    let mut sink = JsonlGraphSink::new(config.clone());
    let source = FixtureSource::from_path(FIXTURE).unwrap().failing("projects:o-2");
    let outcome = run_ingestion(&context(source),
                                ExecutionMode::Sequential,
                                JsonlEventStore::from_config(&config).unwrap(),
                                &mut sink).unwrap();

    assert_eq!(outcome.report.failed_steps(), vec!["fetch-projects"]);
    assert_eq!(outcome.report.blocked_steps(), vec!["fetch-findings"]);
    let entities: Vec<Entity> = read_lines(&sink.run_dir(outcome.snapshot.run_id).join(ENTITIES_FILE)).unwrap();
    assert_eq!(entities.iter().filter(|e| e.entity_type == "snyk_project").count(), 2);
    assert_eq!(entities.iter().filter(|e| e.entity_type == "snyk_finding").count(), 0);
    assert!(config.event_log_path().exists());
}

#[test]
fn invalid_config_is_rejected_before_running() {
    let context = SnykContext::new(Arc::new(FixtureSource::default()), IntegrationConfig::new("", "g-1"));
    let mut sink = InMemoryGraphSink::default();
    let err = run_ingestion(&context, ExecutionMode::Sequential, InMemoryEventStore::new(), &mut sink).unwrap_err();
    assert!(matches!(err, snyk_ingest::AppError::Config(_)));
    assert!(sink.published.is_empty());
}
