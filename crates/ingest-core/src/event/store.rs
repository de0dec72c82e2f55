use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use super::{RunEvent, RunEventKind};
use crate::errors::CoreResult;

/// Append-only event storage.
pub trait EventStore {
    /// Appends an event built from `kind` and returns it with its `seq` and
    /// timestamp.
    fn append_kind(&mut self, run_id: Uuid, kind: RunEventKind) -> CoreResult<RunEvent>;
    /// Events of a run in ascending `seq`.
    fn list(&self, run_id: Uuid) -> CoreResult<Vec<RunEvent>>;
}

#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    inner: HashMap<Uuid, Vec<RunEvent>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStore for InMemoryEventStore {
    fn append_kind(&mut self, run_id: Uuid, kind: RunEventKind) -> CoreResult<RunEvent> {
        let events = self.inner.entry(run_id).or_default();
        let ev = RunEvent { seq: events.len() as u64,
                            run_id,
                            kind,
                            ts: Utc::now() };
        events.push(ev.clone());
        Ok(ev)
    }

    fn list(&self, run_id: Uuid) -> CoreResult<Vec<RunEvent>> {
        Ok(self.inner.get(&run_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_is_per_run_and_ascending() {
        let mut store = InMemoryEventStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store.append_kind(a, RunEventKind::StepCompleted { step_id: "x".into() }).unwrap();
        store.append_kind(b, RunEventKind::StepCompleted { step_id: "y".into() }).unwrap();
        let second = store.append_kind(a, RunEventKind::StepCompleted { step_id: "z".into() }).unwrap();
        assert_eq!(second.seq, 1);
        assert_eq!(store.list(a).unwrap().len(), 2);
        assert_eq!(store.list(b).unwrap()[0].seq, 0);
        assert!(store.list(Uuid::new_v4()).unwrap().is_empty());
    }
}
