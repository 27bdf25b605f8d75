use std::collections::HashMap;

use chrono::Utc;

use super::{JobEvent, JobEventKind};
use crate::model::JobId;

/// Almacenamiento de eventos append-only.
pub trait EventStore: Send {
    /// Agrega un evento a partir de su kind y devuelve el evento completo (con seq y ts).
    fn append_kind(&mut self, job_id: JobId, kind: JobEventKind) -> JobEvent;
    /// Lista eventos de un job (orden ascendente por seq).
    fn list(&self, job_id: JobId) -> Vec<JobEvent>;
}

#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    inner: HashMap<JobId, Vec<JobEvent>>,
}

impl EventStore for InMemoryEventStore {
    fn append_kind(&mut self, job_id: JobId, kind: JobEventKind) -> JobEvent {
        let events = self.inner.entry(job_id).or_default();
        let ev = JobEvent { seq: events.len() as u64,
                            job_id,
                            kind,
                            ts: Utc::now() };
        events.push(ev.clone());
        ev
    }

    fn list(&self, job_id: JobId) -> Vec<JobEvent> {
        self.inner.get(&job_id).cloned().unwrap_or_default()
    }
}
