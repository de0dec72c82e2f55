use std::sync::Arc;

use ingest_core::{ExecutionMode, GraphSnapshot, JobState, MappedRelationshipResolver, RunReport, SchedulerBuilder,
                  StepStatus};
use ingest_snyk::constants::{relationships, step_ids};
use ingest_snyk::{all_steps, FixtureSource, IntegrationConfig, SnykContext};
use uuid::Uuid;

fn fixture() -> FixtureSource {
    FixtureSource::from_path(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/snyk_fixture.json")).unwrap()
}

fn config() -> IntegrationConfig {
    IntegrationConfig::new("token", "g-1")
}

fn run(source: FixtureSource, config: IntegrationConfig, mode: ExecutionMode) -> (JobState, RunReport) {
    let context = SnykContext::new(Arc::new(source), config);
    let state = JobState::new(Uuid::new_v4());
    let mut scheduler = SchedulerBuilder::new().add_steps(all_steps()).mode(mode).build().unwrap();
    let report = scheduler.run(&state, &context).unwrap();
    (state, report)
}

fn close(state: &JobState) -> GraphSnapshot {
    let resolution = MappedRelationshipResolver::new().resolve(state).unwrap();
    state.close(resolution).unwrap()
}

#[test]
fn full_run_collects_the_expected_graph() {
    let (state, report) = run(fixture(), config(), ExecutionMode::Sequential);
    assert!(report.is_success(), "{:?}", report.failed_steps());
    assert_eq!(report.completed_steps().len(), 8);

    for (entity_type, expected) in [("snyk_account", 1),
                                    ("snyk_group", 1),
                                    ("snyk_organization", 2),
                                    ("snyk_role", 2),
                                    ("snyk_user", 3),
                                    ("snyk_project", 3),
                                    ("snyk_finding", 3)]
    {
        assert_eq!(state.entity_count_by_type(entity_type), expected, "{entity_type}");
    }
    assert_eq!(state.direct_relationships().len(), 22);
    assert_eq!(state.mapped_relationships().len(), 6);

    let snapshot = close(&state);
    assert_eq!(snapshot.entities_of_type("cve").count(), 1);
    assert_eq!(snapshot.entities_of_type("cwe").count(), 1);
    assert_eq!(snapshot.entities_of_type("CodeRepo").count(), 2);
    assert_eq!(snapshot.relationships_to("cve-2021-9999").count(), 2);
    assert_eq!(snapshot.relationships_to("cwe-79").count(), 2);
}

#[test]
fn shared_user_is_stored_once_with_one_edge_per_organization() {
    let (state, _) = run(fixture(), config(), ExecutionMode::Sequential);
    let snapshot = close(&state);
    let memberships: Vec<_> = snapshot.relationships_to("snyk_user:u-1")
                                      .filter(|r| r.relationship_type == relationships::ORGANIZATION_USER.relationship_type)
                                      .map(|r| r.from_entity_key.as_str())
                                      .collect();
    assert_eq!(memberships, vec!["snyk_org:o-1", "snyk_org:o-2"]);

    let admin: Vec<_> = snapshot.relationships_to("snyk_role:admin")
                                .filter(|r| r.relationship_type == relationships::USER_ROLE.relationship_type)
                                .map(|r| r.from_entity_key.as_str())
                                .collect();
    assert_eq!(admin, vec!["snyk_user:u-1"]);
    assert!(!snapshot.relationships
                     .iter()
                     .any(|r| r.from_entity_key == "snyk_user:u-3"
                              && r.relationship_type == relationships::USER_ROLE.relationship_type));
}

#[test]
fn projects_carry_their_organization_in_raw_data() {
    let (state, _) = run(fixture(), config(), ExecutionMode::Sequential);
    let project = state.find_entity("snyk_project:o-2-p-3").unwrap();
    let raw = state.get_raw_data(&project).unwrap();
    assert_eq!(raw["orgId"], "o-2");
    assert_eq!(raw["type"], "pip");
    assert_eq!(project.property("targetFile"), Some(serde_json::json!("requirements.txt")));
    assert!(state.has_key("snyk_org:o-2|identified|snyk_finding:p-3-SNYK-PY-1"));
}

#[test]
fn malformed_vulnerability_identifier_drops_only_the_edge() {
    let (state, report) = run(fixture(), config(), ExecutionMode::Sequential);
    assert_eq!(report.status_of(step_ids::FETCH_FINDINGS), Some(StepStatus::Completed));
    assert!(state.has_key("snyk_finding:p-1-SNYK-JS-2"));
    assert!(state.has_key("snyk_finding:p-1-SNYK-JS-2|exploits|cwe-79"));
    assert!(!state.relationship_keys().iter().any(|k| k.starts_with("snyk_finding:p-1-SNYK-JS-2|is|")));
}

#[test]
fn org_scope_limits_everything_below_it() {
    let mut cfg = config();
    cfg.org_scope = vec!["o-1".to_string()];
    let (state, report) = run(fixture(), cfg, ExecutionMode::Sequential);
    assert!(report.is_success());
    assert_eq!(state.entity_count_by_type("snyk_organization"), 1);
    assert_eq!(state.entity_count_by_type("snyk_project"), 2);
    assert_eq!(state.entity_count_by_type("snyk_finding"), 2);
    assert_eq!(state.entity_count_by_type("snyk_user"), 2);
}

#[test]
fn findings_can_be_disabled() {
    let mut cfg = config();
    cfg.include_findings = false;
    let (state, report) = run(fixture(), cfg, ExecutionMode::Sequential);
    assert_eq!(report.status_of(step_ids::FETCH_FINDINGS), Some(StepStatus::Completed));
    assert_eq!(state.entity_count_by_type("snyk_finding"), 0);
    assert_eq!(state.entity_count_by_type("snyk_project"), 3);
}

#[test]
fn failing_issue_feed_keeps_earlier_findings() {
    let (state, report) = run(fixture().failing("issues:p-3"), config(), ExecutionMode::Sequential);
    assert_eq!(report.failed_steps(), vec![step_ids::FETCH_FINDINGS]);
    assert_eq!(state.entity_count_by_type("snyk_finding"), 2);
    assert!(!state.has_key("snyk_finding:p-3-SNYK-PY-1"));
}

#[test]
fn failing_roles_block_role_assignment_only() {
    let (state, report) = run(fixture().failing("roles"), config(), ExecutionMode::Sequential);
    assert_eq!(report.failed_steps(), vec![step_ids::FETCH_ROLES]);
    assert_eq!(report.blocked_steps(), vec![step_ids::BUILD_USER_ROLE]);
    assert_eq!(report.status_of(step_ids::FETCH_USERS), Some(StepStatus::Completed));
    assert_eq!(report.status_of(step_ids::FETCH_FINDINGS), Some(StepStatus::Completed));
    assert_eq!(state.entity_count_by_type("snyk_user"), 3);
}

#[test]
fn parallel_run_produces_the_same_keys() {
    let (sequential, _) = run(fixture(), config(), ExecutionMode::Sequential);
    let (parallel, report) = run(fixture(), config(), ExecutionMode::Parallel);
    assert!(report.is_success());
    assert_eq!(sequential.key_fingerprint(), parallel.key_fingerprint());
    assert_eq!(sequential.entity_keys(), parallel.entity_keys());
}

#[test]
fn missing_group_fails_everything_downstream() {
    let (state, report) = run(fixture().failing("group"), config(), ExecutionMode::Sequential);
    assert_eq!(report.failed_steps(), vec![step_ids::FETCH_GROUP]);
    let mut blocked = report.blocked_steps();
    blocked.sort_unstable();
    assert_eq!(blocked,
               vec![step_ids::BUILD_USER_ROLE,
                    step_ids::FETCH_FINDINGS,
                    step_ids::FETCH_ORGANIZATIONS,
                    step_ids::FETCH_PROJECTS,
                    step_ids::FETCH_ROLES,
                    step_ids::FETCH_USERS]);
    assert_eq!(state.entity_count(), 1);
}

#[test]
fn registry_project_names_with_ports_and_tags_are_kept() {
    let source = FixtureSource::from_json_str(r#"{
        "group": {"id": "g-1", "name": "Acme Group"},
        "organizations": [{"id": "o-1", "name": "Acme Core"}],
        "projects": {"o-1": [
            {"id": "p-1", "name": "registry.acme.io:5000/app:1.2", "origin": "docker-hub", "type": "deb"},
            {"id": "p-2", "name": "acme/api:package.json", "origin": "github", "type": "npm"}
        ]},
        "issues": {"p-1": [
            {"id": "SNYK-DEBIAN-1", "issueType": "vuln", "pkgName": "openssl",
             "issueData": {"title": "Buffer Overflow", "severity": "high"}}
        ]}
    }"#).unwrap();
    let (state, report) = run(source, config(), ExecutionMode::Sequential);
    assert_eq!(report.status_of(step_ids::FETCH_PROJECTS), Some(StepStatus::Completed));
    assert_eq!(report.status_of(step_ids::FETCH_FINDINGS), Some(StepStatus::Completed));
    assert_eq!(state.entity_count_by_type("snyk_project"), 2);
    assert_eq!(state.entity_count_by_type("snyk_finding"), 1);

    let snapshot = close(&state);
    let registry = snapshot.entities_of_type("snyk_project").find(|e| e.key == "snyk_project:o-1-p-1").unwrap();
    assert_eq!(registry.property("repoName").unwrap(), "registry.acme.io");
    assert_eq!(registry.property("targetFile").unwrap(), "5000/app:1.2");
}

#[test]
fn punctuated_role_names_are_assigned() {
    let source = FixtureSource::from_json_str(r#"{
        "group": {"id": "g-1", "name": "Acme Group"},
        "organizations": [{"id": "o-1", "name": "Acme Core"}],
        "roles": [{"name": "Admin"}, {"name": "Org Viewer (custom)"}],
        "users": {"o-1": [{"id": "u-1", "username": "ana", "role": "Org Viewer (custom)"}]}
    }"#).unwrap();
    let (state, report) = run(source, config(), ExecutionMode::Sequential);
    assert_eq!(report.status_of(step_ids::FETCH_ROLES), Some(StepStatus::Completed));
    assert_eq!(report.status_of(step_ids::BUILD_USER_ROLE), Some(StepStatus::Completed));
    assert_eq!(state.entity_count_by_type("snyk_role"), 2);

    let snapshot = close(&state);
    let assigned: Vec<_> = snapshot.relationships_to("snyk_role:org-viewer-(custom)")
                                   .filter(|r| r.relationship_type == relationships::USER_ROLE.relationship_type)
                                   .map(|r| r.from_entity_key.as_str())
                                   .collect();
    assert_eq!(assigned, vec!["snyk_user:u-1"]);
}
