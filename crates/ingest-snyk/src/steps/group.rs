use ingest_core::{CoreResult, StepDescriptor};

use super::SnykStepContext;
use crate::client::SnykContext;
use crate::constants::{entities, set_data_keys, step_ids};
use crate::converters::create_group_entity;
use crate::types::{decode, Group};

fn fetch_group(ctx: &SnykStepContext<'_>) -> CoreResult<()> {
    let raw = ctx.client().source.get_group_details()?;
    let group: Group = decode("group", &raw)?;
    let entity = ctx.add_entity(create_group_entity(&group)?.with_raw_data(raw))?;
    ctx.set_entity_slot(set_data_keys::GROUP_ENTITY, entity);
    Ok(())
}

pub fn step() -> StepDescriptor<SnykContext> {
    StepDescriptor::new(step_ids::FETCH_GROUP, "Fetch Group", fetch_group).with_entities(&[entities::GROUP])
}
