//! Raw Snyk records -> graph records. Keys follow the identity policy of
//! `ingest_core::identity`.

use chrono::DateTime;
use ingest_core::identity::{child_key, normalize_slug, vendor_key};
use ingest_core::{CoreResult, Entity, GraphCoreError, MappedRelationship};
use serde_json::{json, Map, Value};

use crate::constants::entities::{self, CODE_REPO_TYPE};
use crate::constants::mapped_relationships::{FINDING_EXPLOITS_CWE, FINDING_IS_CVE, PROJECT_REPO};
use crate::constants::{CVE_URL_BASE, CWE_URL_BASE, SCM_ORIGINS};
use crate::types::{Group, Issue, Organization, Project, Role, User};

/// RFC 3339 timestamp -> epoch milliseconds. Unparseable input yields `None`.
pub fn parse_time(value: Option<&str>) -> Option<i64> {
    value.and_then(|v| DateTime::parse_from_rfc3339(v).ok()).map(|d| d.timestamp_millis())
}

pub fn numeric_severity(severity: Option<&str>) -> u8 {
    match severity {
        Some("low") => 2,
        Some("medium") => 5,
        Some("high") => 7,
        Some("critical") => 10,
        _ => 0,
    }
}

fn start_case(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn organization_key(org_id: &str) -> CoreResult<String> {
    vendor_key("snyk_org", org_id)
}

pub fn role_key(role_name: &str) -> CoreResult<String> {
    vendor_key("snyk_role", &normalize_slug("snyk_role", role_name)?)
}

pub fn create_account_entity(group_id: &str) -> CoreResult<Entity> {
    let e = &entities::ACCOUNT;
    Ok(Entity::new(vendor_key("snyk", group_id)?, e.entity_type, e.class).with_property("category",
                                                                                       "code dependency scan")
                                                                          .with_property("displayName",
                                                                                         format!("snyk/{group_id}")))
}

pub fn create_group_entity(group: &Group) -> CoreResult<Entity> {
    let e = &entities::GROUP;
    Ok(Entity::new(vendor_key("snyk_group", &group.id)?, e.entity_type, e.class).with_property("id",
                                                                                               group.id.as_str())
                                                                                .with_property("name",
                                                                                               group.name.as_str())
                                                                                .with_property("displayName",
                                                                                               group.name.as_str()))
}

pub fn create_organization_entity(org: &Organization) -> CoreResult<Entity> {
    let e = &entities::ORGANIZATION;
    Ok(Entity::new(organization_key(&org.id)?, e.entity_type, e.class).with_property("id", org.id.as_str())
                                                                      .with_property("name", org.name.as_str())
                                                                      .with_property("displayName", org.name.as_str())
                                                                      .with_optional("slug", org.slug.clone())
                                                                      .with_optional("webLink", org.url.clone()))
}

pub fn create_role_entity(role: &Role) -> CoreResult<Entity> {
    let e = &entities::ROLE;
    Ok(Entity::new(role_key(&role.name)?, e.entity_type, e.class).with_property("name", role.name.as_str())
                                                                 .with_property("displayName", role.name.as_str())
                                                                 .with_optional("description", role.description.clone())
                                                                 .with_optional("publicId", role.public_id.clone())
                                                                 .with_optional("createdOn",
                                                                                parse_time(role.created.as_deref()))
                                                                 .with_optional("updatedOn",
                                                                                parse_time(role.modified.as_deref())))
}

pub fn create_user_entity(user: &User) -> CoreResult<Entity> {
    let e = &entities::USER;
    let display = user.name.clone().or_else(|| user.username.clone()).unwrap_or_else(|| user.id.clone());
    Ok(Entity::new(vendor_key("snyk_user", &user.id)?, e.entity_type, e.class)
        .with_property("id", user.id.as_str())
        .with_property("displayName", display)
        .with_optional("name", user.name.clone())
        .with_optional("username", user.username.clone())
        .with_optional("email", user.email.clone())
        .with_property("active", true))
}

/// Repository and manifest of a project named `<repo>:<file>`. Only the first
/// `:` splits; the rest belongs to the manifest part.
pub fn split_project_name(name: &str) -> (String, Option<String>) {
    match name.split_once(':') {
        Some((repo, file)) => (repo.to_string(), Some(file.to_string()).filter(|f| !f.is_empty())),
        None => (name.to_string(), None),
    }
}

pub fn create_project_entity(org_id: &str, project: &Project) -> CoreResult<Entity> {
    let e = &entities::PROJECT;
    let (repo_name, file) = split_project_name(&project.name);
    let counts = project.issue_counts_by_severity.clone().unwrap_or_default();
    Ok(Entity::new(child_key("snyk_project", org_id, &project.id)?, e.entity_type, e.class)
        .with_property("id", project.id.as_str())
        .with_property("name", project.name.as_str())
        .with_property("displayName", project.name.as_str())
        .with_property("orgId", org_id)
        .with_property("repoName", repo_name)
        .with_optional("targetFile", file)
        .with_optional("origin", project.origin.clone())
        .with_optional("projectType", project.project_type.clone())
        .with_optional("branch", project.branch.clone())
        .with_optional("isMonitored", project.is_monitored)
        .with_optional("totalDependencies", project.total_dependencies)
        .with_optional("createdOn", parse_time(project.created.as_deref()))
        .with_property("criticalIssueCount", counts.critical)
        .with_property("highIssueCount", counts.high)
        .with_property("mediumIssueCount", counts.medium)
        .with_property("lowIssueCount", counts.low))
}

/// Deferred `project SCANS CodeRepo` edge; only for projects imported from a
/// source-code host.
pub fn build_project_repo_mapped_relationship(project_entity: &Entity) -> CoreResult<Option<MappedRelationship>> {
    let origin = project_entity.property("origin");
    let Some(origin) = origin.as_ref().and_then(Value::as_str) else {
        return Ok(None);
    };
    if !SCM_ORIGINS.contains(&origin) {
        return Ok(None);
    }
    let Some(full_name) = project_entity.property("repoName").and_then(|v| v.as_str().map(str::to_string)) else {
        return Ok(None);
    };
    let short_name = full_name.rsplit('/').next().unwrap_or(full_name.as_str()).to_string();
    let mut target = Map::new();
    target.insert("_class".into(), json!([CODE_REPO_TYPE]));
    target.insert("name".into(), json!(short_name));
    target.insert("fullName".into(), json!(full_name));
    target.insert("origin".into(), json!(origin));
    MappedRelationship::from_schema(&PROJECT_REPO, project_entity, target, &[&["_type", "fullName"]]).map(Some)
}

/// `cve-2021-1234` from `CVE-2021-1234` (case-insensitive).
pub fn cve_key(cve: &str) -> CoreResult<String> {
    let upper = cve.trim().to_ascii_uppercase();
    let parts: Vec<&str> = upper.split('-').collect();
    let valid = parts.len() == 3
                && parts[0] == "CVE"
                && parts[1].len() == 4
                && parts[2].len() >= 4
                && parts[1..].iter().all(|p| p.chars().all(|c| c.is_ascii_digit()));
    if !valid {
        return Err(GraphCoreError::malformed("cve", format!("unexpected identifier {cve:?}")));
    }
    Ok(upper.to_ascii_lowercase())
}

/// `cwe-79` from `CWE-79` (case-insensitive).
pub fn cwe_key(cwe: &str) -> CoreResult<String> {
    let upper = cwe.trim().to_ascii_uppercase();
    let valid = upper.strip_prefix("CWE-")
                     .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()));
    if !valid {
        return Err(GraphCoreError::malformed("cwe", format!("unexpected identifier {cwe:?}")));
    }
    Ok(upper.to_ascii_lowercase())
}

fn cve_target(cve: &str, cvss_score: Option<f64>) -> CoreResult<Map<String, Value>> {
    let key = cve_key(cve)?;
    let name = key.to_ascii_uppercase();
    let link = format!("{CVE_URL_BASE}{name}");
    let mut target = Map::new();
    target.insert("_key".into(), json!(key));
    target.insert("_class".into(), json!(entities::CVE.class));
    target.insert("name".into(), json!(name));
    target.insert("displayName".into(), json!(name));
    if let Some(score) = cvss_score {
        target.insert("cvssScore".into(), json!(score));
    }
    target.insert("references".into(), json!([link]));
    target.insert("webLink".into(), json!(link));
    Ok(target)
}

fn cwe_target(cwe: &str) -> CoreResult<Map<String, Value>> {
    let key = cwe_key(cwe)?;
    let name = key.to_ascii_uppercase();
    let number = name.trim_start_matches("CWE-");
    let link = format!("{CWE_URL_BASE}{number}.html");
    let mut target = Map::new();
    target.insert("_key".into(), json!(key));
    target.insert("_class".into(), json!(entities::CWE.class));
    target.insert("name".into(), json!(name));
    target.insert("displayName".into(), json!(name));
    target.insert("references".into(), json!([link]));
    target.insert("webLink".into(), json!(link));
    Ok(target)
}

pub fn build_finding_cve_relationship(finding: &Entity, cve: &str, cvss_score: Option<f64>)
                                      -> CoreResult<MappedRelationship> {
    MappedRelationship::from_schema(&FINDING_IS_CVE, finding, cve_target(cve, cvss_score)?, &[&["_type", "_key"]])
}

pub fn build_finding_cwe_relationship(finding: &Entity, cwe: &str) -> CoreResult<MappedRelationship> {
    MappedRelationship::from_schema(&FINDING_EXPLOITS_CWE, finding, cwe_target(cwe)?, &[&["_type", "_key"]])
}

pub fn create_finding_entity(issue: &Issue, project_entity: &Entity) -> CoreResult<Entity> {
    let e = &entities::FINDING;
    let project_id = project_entity.property("id")
                                   .and_then(|v| v.as_str().map(str::to_string))
                                   .ok_or_else(|| GraphCoreError::malformed("snyk_finding", "project has no id"))?;
    let data = &issue.issue_data;
    let fix = issue.fix_info.clone().unwrap_or_default();
    let targets: Vec<Value> = project_entity.property("repoName").into_iter().collect();
    let identified_in_file = project_entity.property("targetFile").unwrap_or_else(|| json!(""));
    let severity = data.severity.as_deref();

    Ok(Entity::new(child_key("snyk_finding", &project_id, &issue.id)?, e.entity_type, e.class)
        .with_property("id", issue.id.as_str())
        .with_property("category", "application")
        .with_property("name", data.title.as_str())
        .with_property("displayName", data.title.as_str())
        .with_optional("description", data.description.clone())
        .with_optional("webLink", data.url.clone())
        .with_optional("score", data.cvss_score)
        .with_optional("cvssScore", data.cvss_score)
        .with_property("cve", json!(data.identifiers.cve))
        .with_property("cwe", json!(data.identifiers.cwe))
        .with_property("numericSeverity", numeric_severity(severity))
        .with_optional("severity", severity.map(start_case))
        .with_optional("originalSeverity", data.original_severity.clone())
        .with_optional("language", data.language.clone())
        .with_optional("pkgName", issue.pkg_name.clone())
        .with_property("pkgVersions", json!(issue.pkg_versions))
        .with_optional("issueType", issue.issue_type.clone())
        .with_optional("isUpgradable", fix.is_upgradable)
        .with_optional("isPatchable", fix.is_patchable)
        .with_optional("isPinnable", fix.is_pinnable)
        .with_optional("isFixable", fix.is_fixable)
        .with_optional("isPartiallyFixable", fix.is_partially_fixable)
        .with_property("fixedIn", json!(fix.fixed_in))
        .with_optional("priorityScore", issue.priority_score)
        .with_optional("isPatched", issue.is_patched)
        .with_optional("isIgnored", issue.is_ignored)
        .with_optional("publicationTime", parse_time(data.publication_time.as_deref()))
        .with_optional("disclosureTime", parse_time(data.disclosure_time.as_deref()))
        .with_property("open", true)
        .with_property("targets", Value::Array(targets))
        .with_property("identifiedInFile", identified_in_file))
}
