use ingest_core::{CoreResult, DirectRelationship, StepDescriptor};
use log::{debug, info};

use super::{raw_record, SnykStepContext};
use crate::client::SnykContext;
use crate::constants::relationships::{GROUP_ROLE, USER_ROLE};
use crate::constants::{entities, set_data_keys, step_ids};
use crate::converters::{create_role_entity, role_key};
use crate::types::{decode, Role, User};

fn fetch_roles(ctx: &SnykStepContext<'_>) -> CoreResult<()> {
    let group = ctx.entity_slot(set_data_keys::GROUP_ENTITY)?;

    ctx.client().source.iterate_roles(&mut |raw| {
                           ctx.checkpoint()?;
                           let role: Role = decode("role", &raw)?;
                           let entity = ctx.add_entity(create_role_entity(&role)?.with_raw_data(raw))?;
                           ctx.add_relationship(DirectRelationship::from_schema(&GROUP_ROLE, &group, &entity)?)?;
                           Ok(())
                       })
}

/// Links each user to the role named in its raw record. Users whose role
/// was not returned by the roles endpoint are skipped.
fn build_user_role_relationship(ctx: &SnykStepContext<'_>) -> CoreResult<()> {
    let mut assigned = 0usize;
    for user_entity in ctx.iterate_entities(entities::USER.entity_type)? {
        let Some(user) = raw_record::<User>(ctx, "user", &user_entity)? else {
            continue;
        };
        let Some(role_name) = user.role.as_deref() else {
            continue;
        };
        match role_key(role_name).ok().and_then(|key| ctx.find_entity(&key)) {
            Some(role) => {
                ctx.add_relationship(DirectRelationship::from_schema(&USER_ROLE, &user_entity, &role)?)?;
                assigned += 1;
            }
            None => debug!("build-user-role-relationship:skip user={} role={role_name} reason=unknown_role",
                           user_entity.key),
        }
    }
    info!("build-user-role-relationship:done assigned={assigned}");
    Ok(())
}

pub fn fetch_roles_step() -> StepDescriptor<SnykContext> {
    StepDescriptor::new(step_ids::FETCH_ROLES, "Fetch Roles", fetch_roles)
        .with_entities(&[entities::ROLE])
        .with_relationships(&[GROUP_ROLE])
        .with_dependencies(&[step_ids::FETCH_GROUP])
}

pub fn build_user_role_step() -> StepDescriptor<SnykContext> {
    StepDescriptor::new(step_ids::BUILD_USER_ROLE, "Build User and Role Relationship", build_user_role_relationship)
        .with_relationships(&[USER_ROLE])
        .with_dependencies(&[step_ids::FETCH_ROLES, step_ids::FETCH_USERS])
}
