use ingest_core::{CoreResult, StepDescriptor};

use super::SnykStepContext;
use crate::client::SnykContext;
use crate::constants::{entities, set_data_keys, step_ids};
use crate::converters::create_account_entity;

fn fetch_account(ctx: &SnykStepContext<'_>) -> CoreResult<()> {
    let account = ctx.add_entity(create_account_entity(&ctx.client().config.group_id)?)?;
    ctx.set_entity_slot(set_data_keys::ACCOUNT_ENTITY, account);
    Ok(())
}

pub fn step() -> StepDescriptor<SnykContext> {
    StepDescriptor::new(step_ids::FETCH_ACCOUNT, "Fetch Account", fetch_account).with_entities(&[entities::ACCOUNT])
}
