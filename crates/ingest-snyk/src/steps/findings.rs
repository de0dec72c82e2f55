use std::sync::Arc;

use ingest_core::{CoreResult, DirectRelationship, Entity, GraphCoreError, MappedRelationship, StepDescriptor};
use log::{debug, info, warn};

use super::{raw_record, SnykStepContext};
use crate::client::SnykContext;
use crate::constants::mapped_relationships::{FINDING_EXPLOITS_CWE, FINDING_IS_CVE};
use crate::constants::relationships::{ORGANIZATION_IDENTIFIED_FINDING, PROJECT_FINDING};
use crate::constants::{entities, step_ids};
use crate::converters::{build_finding_cve_relationship, build_finding_cwe_relationship, create_finding_entity,
                        numeric_severity, organization_key};
use crate::types::{decode, Issue, Project};

/// Findings tallied by severity over the whole step.
#[derive(Debug, Default)]
struct SeverityCounts {
    critical: usize,
    high: usize,
    medium: usize,
    low: usize,
    other: usize,
}

impl SeverityCounts {
    fn record(&mut self, severity: Option<&str>) {
        match numeric_severity(severity) {
            10 => self.critical += 1,
            7 => self.high += 1,
            5 => self.medium += 1,
            2 => self.low += 1,
            _ => self.other += 1,
        }
    }

    fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low + self.other
    }
}

/// Adds a vulnerability edge. Identifiers that do not parse only lose the
/// edge; the finding itself is kept.
fn add_vulnerability_edge(ctx: &SnykStepContext<'_>, finding: &Entity, edge: CoreResult<MappedRelationship>)
                          -> CoreResult<()> {
    match edge {
        Ok(edge) => ctx.add_relationship(edge).map(|_| ()),
        Err(GraphCoreError::MalformedIdentity { kind, reason }) => {
            warn!("fetch-findings:skip_edge finding={} kind={kind} reason={reason}", finding.key);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn fetch_findings(ctx: &SnykStepContext<'_>) -> CoreResult<()> {
    if !ctx.client().config.include_findings {
        info!("fetch-findings:skip reason=disabled");
        return Ok(());
    }
    let mut counts = SeverityCounts::default();

    for project_entity in ctx.iterate_entities(entities::PROJECT.entity_type)? {
        ctx.checkpoint()?;
        let Some(project) = raw_record::<Project>(ctx, "project", &project_entity)? else {
            continue;
        };
        let org: Option<Arc<Entity>> = match project.org_id.as_deref() {
            Some(org_id) => ctx.find_entity(&organization_key(org_id)?),
            None => None,
        };
        if org.is_none() {
            warn!("fetch-findings:no_organization project={}", project_entity.key);
        }

        ctx.client().source.iterate_issues(&project.id, &mut |raw| {
                               let issue: Issue = decode("issue", &raw)?;
                               let finding = ctx.add_entity(create_finding_entity(&issue, &project_entity)?
                                                                .with_raw_data(raw))?;
                               counts.record(issue.issue_data.severity.as_deref());

                               let identifiers = &issue.issue_data.identifiers;
                               for cve in &identifiers.cve {
                                   add_vulnerability_edge(ctx,
                                                          &finding,
                                                          build_finding_cve_relationship(&finding,
                                                                                         cve,
                                                                                         issue.issue_data
                                                                                              .cvss_score))?;
                               }
                               for cwe in &identifiers.cwe {
                                   add_vulnerability_edge(ctx, &finding, build_finding_cwe_relationship(&finding, cwe))?;
                               }

                               if let Some(org) = &org {
                                   ctx.add_relationship(DirectRelationship::from_schema(&ORGANIZATION_IDENTIFIED_FINDING,
                                                                                        org,
                                                                                        &finding)?)?;
                               }
                               let has = DirectRelationship::from_schema(&PROJECT_FINDING, &project_entity, &finding)?;
                               if ctx.has_key(&has.key) {
                                   debug!("fetch-findings:duplicate_edge key={}", has.key);
                               } else {
                                   ctx.add_relationship(has)?;
                               }
                               Ok(())
                           })?;
    }

    info!("fetch-findings:done total={} critical={} high={} medium={} low={} other={}",
          counts.total(),
          counts.critical,
          counts.high,
          counts.medium,
          counts.low,
          counts.other);
    Ok(())
}

pub fn step() -> StepDescriptor<SnykContext> {
    StepDescriptor::new(step_ids::FETCH_FINDINGS, "Fetch Findings", fetch_findings)
        .with_entities(&[entities::FINDING])
        .with_relationships(&[PROJECT_FINDING, ORGANIZATION_IDENTIFIED_FINDING])
        .with_mapped_relationships(&[FINDING_IS_CVE, FINDING_EXPLOITS_CWE])
        .with_dependencies(&[step_ids::FETCH_ORGANIZATIONS, step_ids::FETCH_PROJECTS])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_tally() {
        let mut counts = SeverityCounts::default();
        for s in [Some("critical"), Some("high"), Some("high"), Some("low"), None] {
            counts.record(s);
        }
        assert_eq!((counts.critical, counts.high, counts.medium, counts.low, counts.other), (1, 2, 0, 1, 1));
        assert_eq!(counts.total(), 5);
    }
}
