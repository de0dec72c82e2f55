use ingest_core::{CoreResult, DirectRelationship, StepDescriptor};
use log::info;

use super::{raw_record, SnykStepContext};
use crate::client::SnykContext;
use crate::constants::relationships::ORGANIZATION_USER;
use crate::constants::{entities, step_ids};
use crate::converters::create_user_entity;
use crate::types::{decode, Organization, User};

/// Members of every organization. A user belonging to several organizations
/// is stored once (first organization wins); each membership gets its own
/// `HAS` edge.
fn fetch_users(ctx: &SnykStepContext<'_>) -> CoreResult<()> {
    let mut memberships = 0usize;
    for org_entity in ctx.iterate_entities(entities::ORGANIZATION.entity_type)? {
        ctx.checkpoint()?;
        let Some(org) = raw_record::<Organization>(ctx, "organization", &org_entity)? else {
            continue;
        };
        ctx.client().source.iterate_users(&org.id, &mut |raw| {
                               let user: User = decode("user", &raw)?;
                               let entity = ctx.add_entity_idempotent(create_user_entity(&user)?.with_raw_data(raw))?;
                               ctx.add_relationship(DirectRelationship::from_schema(&ORGANIZATION_USER,
                                                                                    &org_entity,
                                                                                    &entity)?)?;
                               memberships += 1;
                               Ok(())
                           })?;
    }
    info!("fetch-users:done users={} memberships={memberships}",
          ctx.job_state().entity_count_by_type(entities::USER.entity_type));
    Ok(())
}

pub fn step() -> StepDescriptor<SnykContext> {
    StepDescriptor::new(step_ids::FETCH_USERS, "Fetch Organization Members", fetch_users)
        .with_entities(&[entities::USER])
        .with_relationships(&[ORGANIZATION_USER])
        .with_dependencies(&[step_ids::FETCH_ORGANIZATIONS])
}
