use ingest_core::{CoreResult, DirectRelationship, StepDescriptor};
use log::{debug, info};

use super::SnykStepContext;
use crate::client::SnykContext;
use crate::constants::relationships::GROUP_ORGANIZATION;
use crate::constants::{entities, set_data_keys, step_ids};
use crate::converters::create_organization_entity;
use crate::types::{decode, Organization};

fn fetch_organizations(ctx: &SnykStepContext<'_>) -> CoreResult<()> {
    let group = ctx.entity_slot(set_data_keys::GROUP_ENTITY)?;
    let config = &ctx.client().config;
    let mut collected = 0usize;

    ctx.client().source.iterate_organizations(&mut |raw| {
                           ctx.checkpoint()?;
                           let org: Organization = decode("organization", &raw)?;
                           if !config.in_scope(&org.id) {
                               debug!("fetch-organizations:skip org_id={} reason=out_of_scope", org.id);
                               return Ok(());
                           }
                           let entity = ctx.add_entity(create_organization_entity(&org)?.with_raw_data(raw))?;
                           ctx.add_relationship(DirectRelationship::from_schema(&GROUP_ORGANIZATION, &group, &entity)?)?;
                           collected += 1;
                           Ok(())
                       })?;

    info!("fetch-organizations:done collected={collected}");
    Ok(())
}

pub fn step() -> StepDescriptor<SnykContext> {
    StepDescriptor::new(step_ids::FETCH_ORGANIZATIONS, "Fetch Organizations", fetch_organizations)
        .with_entities(&[entities::ORGANIZATION])
        .with_relationships(&[GROUP_ORGANIZATION])
        .with_dependencies(&[step_ids::FETCH_GROUP])
}
