//! Typed views over raw Snyk API records.
//!
//! Steps keep the raw `serde_json::Value` as the entity's raw data and decode
//! it here only when they need fields. Unknown fields are ignored.

use ingest_core::{CoreResult, GraphCoreError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Decodes a raw record; a shape mismatch is reported as a source failure.
pub fn decode<T: DeserializeOwned>(kind: &str, raw: &Value) -> CoreResult<T> {
    T::deserialize(raw).map_err(|e| GraphCoreError::ExternalSource(format!("malformed {kind} record: {e}")))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub slug: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueCountsBySeverity {
    #[serde(default)]
    pub low: u64,
    #[serde(default)]
    pub medium: u64,
    #[serde(default)]
    pub high: u64,
    #[serde(default)]
    pub critical: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub origin: Option<String>,
    #[serde(rename = "type")]
    pub project_type: Option<String>,
    pub created: Option<String>,
    pub branch: Option<String>,
    pub is_monitored: Option<bool>,
    pub total_dependencies: Option<u64>,
    pub issue_counts_by_severity: Option<IssueCountsBySeverity>,
    /// Owning organization. Not part of the API record; the projects step
    /// adds it to the raw data it stores.
    pub org_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub name: String,
    pub description: Option<String>,
    pub public_id: Option<String>,
    pub created: Option<String>,
    pub modified: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identifiers {
    #[serde(rename = "CVE", default)]
    pub cve: Vec<String>,
    #[serde(rename = "CWE", default)]
    pub cwe: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueData {
    pub title: String,
    pub severity: Option<String>,
    pub original_severity: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub identifiers: Identifiers,
    pub cvss_score: Option<f64>,
    pub language: Option<String>,
    pub publication_time: Option<String>,
    pub disclosure_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixInfo {
    pub is_upgradable: Option<bool>,
    pub is_patchable: Option<bool>,
    pub is_pinnable: Option<bool>,
    pub is_fixable: Option<bool>,
    pub is_partially_fixable: Option<bool>,
    #[serde(default)]
    pub fixed_in: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: String,
    pub issue_type: Option<String>,
    pub pkg_name: Option<String>,
    #[serde(default)]
    pub pkg_versions: Vec<String>,
    pub issue_data: IssueData,
    pub fix_info: Option<FixInfo>,
    pub priority_score: Option<f64>,
    pub is_patched: Option<bool>,
    pub is_ignored: Option<bool>,
}
