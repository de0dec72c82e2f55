//! The integration's steps. Each module exposes its descriptor(s); the
//! execution functions only see the job state and the `SnykContext` handed
//! in through `StepExecutionContext`.

pub mod account;
pub mod findings;
pub mod group;
pub mod organizations;
pub mod projects;
pub mod roles;
pub mod users;

use std::sync::Arc;

use ingest_core::{CoreResult, Entity, StepDescriptor, StepExecutionContext};
use log::warn;
use serde::de::DeserializeOwned;

use crate::client::SnykContext;
use crate::types::decode;

pub type SnykStepContext<'a> = StepExecutionContext<'a, SnykContext>;

/// Every step of the integration, in registration order.
pub fn all_steps() -> Vec<StepDescriptor<SnykContext>> {
    vec![account::step(),
         group::step(),
         organizations::step(),
         roles::fetch_roles_step(),
         users::step(),
         roles::build_user_role_step(),
         projects::step(),
         findings::step()]
}

/// Decodes the raw record stored with `entity`. A missing record is logged
/// and yields `None` so the caller can skip the entity.
fn raw_record<T: DeserializeOwned>(ctx: &SnykStepContext<'_>, kind: &str, entity: &Arc<Entity>)
                                   -> CoreResult<Option<T>> {
    match ctx.get_raw_data(entity) {
        Some(raw) => decode(kind, &raw).map(Some),
        None => {
            warn!("{}:skip key={} reason=no_raw_data", ctx.step_id(), entity.key);
            Ok(None)
        }
    }
}
