use ingest_core::{CoreResult, DirectRelationship, StepDescriptor};
use log::info;
use serde_json::Value;

use super::{raw_record, SnykStepContext};
use crate::client::SnykContext;
use crate::constants::mapped_relationships::PROJECT_REPO;
use crate::constants::relationships::{ACCOUNT_PROJECT, ORGANIZATION_PROJECT};
use crate::constants::{entities, set_data_keys, step_ids};
use crate::converters::{build_project_repo_mapped_relationship, create_project_entity};
use crate::types::{decode, Organization, Project};

fn fetch_projects(ctx: &SnykStepContext<'_>) -> CoreResult<()> {
    let account = ctx.entity_slot(set_data_keys::ACCOUNT_ENTITY)?;
    let mut collected = 0usize;
    let mut repo_edges = 0usize;

    for org_entity in ctx.iterate_entities(entities::ORGANIZATION.entity_type)? {
        ctx.checkpoint()?;
        let Some(org) = raw_record::<Organization>(ctx, "organization", &org_entity)? else {
            continue;
        };
        ctx.client().source.iterate_projects(&org.id, &mut |mut raw| {
                               let project: Project = decode("project", &raw)?;
                               // The findings step needs the owning organization.
                               if let Value::Object(fields) = &mut raw {
                                   fields.insert("orgId".into(), Value::String(org.id.clone()));
                               }
                               let entity = ctx.add_entity(create_project_entity(&org.id, &project)?.with_raw_data(raw))?;
                               ctx.add_relationship(DirectRelationship::from_schema(&ORGANIZATION_PROJECT,
                                                                                    &org_entity,
                                                                                    &entity)?)?;
                               ctx.add_relationship(DirectRelationship::from_schema(&ACCOUNT_PROJECT,
                                                                                    &account,
                                                                                    &entity)?)?;
                               if let Some(repo) = build_project_repo_mapped_relationship(&entity)? {
                                   ctx.add_relationship(repo)?;
                                   repo_edges += 1;
                               }
                               collected += 1;
                               Ok(())
                           })?;
    }

    info!("fetch-projects:done collected={collected} repo_edges={repo_edges}");
    Ok(())
}

pub fn step() -> StepDescriptor<SnykContext> {
    StepDescriptor::new(step_ids::FETCH_PROJECTS, "Fetch Projects", fetch_projects)
        .with_entities(&[entities::PROJECT])
        .with_relationships(&[ORGANIZATION_PROJECT, ACCOUNT_PROJECT])
        .with_mapped_relationships(&[PROJECT_REPO])
        .with_dependencies(&[step_ids::FETCH_ACCOUNT, step_ids::FETCH_ORGANIZATIONS])
}
