//! Backend en memoria con guion de progresión.
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use log::debug;

use diag_core::validation::derive_equipped_status;
use diag_core::{ArtifactPayload, ArtifactRef, ArtifactRequirementSet, JobId, JobRecord, JobStatus, JobStore, RunningPhase,
                StartPolicy, StoreError, SubjectId};

/// Respuesta del backend a una consulta de estado de un job en ejecución.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendStep {
    /// El worker todavía no registró el job.
    NotFound,
    Phase(RunningPhase),
    Succeed(String),
    Fail(String),
    /// Error de infraestructura (p. ej. 502 del gateway).
    TransportError(String),
    /// Réplica atrasada: responde con `status` sin tocar el registro
    /// guardado.
    Stale(JobStatus),
}

impl BackendStep {
    /// Progresión típica: recibido, procesando, éxito.
    pub fn happy_path(result_ref: &str) -> Vec<BackendStep> {
        vec![BackendStep::Phase(RunningPhase::Received),
             BackendStep::Phase(RunningPhase::Processing),
             BackendStep::Succeed(result_ref.to_string())]
    }
}

#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    records: DashMap<JobId, JobRecord>,
    payloads: DashMap<(JobId, String), ArtifactPayload>,
    scripts: DashMap<JobId, VecDeque<BackendStep>>,
    attach_failures: DashMap<(JobId, String), String>,
    default_script: Vec<BackendStep>,
    known_subjects: Option<HashSet<String>>,
    fetch_delay: Option<Duration>,
    start_calls: DashMap<JobId, usize>,
    fetch_calls: AtomicUsize,
}

impl InMemoryJobStore {
    /// Store que acepta cualquier sujeto y termina con éxito tras dos fases.
    pub fn new() -> Self {
        Self { default_script: BackendStep::happy_path("result"),
               ..Self::default() }
    }

    /// Guion aplicado a cada job al iniciarse (si no tiene uno propio).
    pub fn with_default_script(mut self, steps: Vec<BackendStep>) -> Self {
        self.default_script = steps;
        self
    }

    /// Restringe los sujetos resolubles.
    pub fn with_known_subjects<I, T>(mut self, subjects: I) -> Self
        where I: IntoIterator<Item = T>,
              T: Into<String>
    {
        self.known_subjects = Some(subjects.into_iter().map(Into::into).collect());
        self
    }

    /// Latencia simulada de cada `fetch_status`.
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    /// Guion específico de un job (reemplaza al default).
    pub fn script(&self, job_id: JobId, steps: Vec<BackendStep>) {
        self.scripts.insert(job_id, steps.into());
    }

    /// El próximo upload de `kind` para `job_id` falla con error de transporte.
    pub fn fail_next_attach(&self, job_id: JobId, kind: &str, reason: &str) {
        self.attach_failures.insert((job_id, kind.to_string()), reason.to_string());
    }

    /// Payload actualmente enlazado a `kind`.
    pub fn payload_for(&self, job_id: JobId, kind: &str) -> Option<ArtifactPayload> {
        self.payloads.get(&(job_id, kind.to_string())).map(|p| p.value().clone())
    }

    pub fn start_calls(&self, job_id: JobId) -> usize {
        self.start_calls.get(&job_id).map(|c| *c).unwrap_or(0)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Modifica el registro persistido directamente (otra sesión/backend).
    pub fn update_record<F: FnOnce(&mut JobRecord)>(&self, job_id: JobId, f: F) -> bool {
        match self.records.get_mut(&job_id) {
            Some(mut record) => {
                f(record.value_mut());
                true
            }
            None => false,
        }
    }

    /// Inserta un registro ya existente (p. ej. creado en otra sesión).
    pub fn insert_record(&self, record: JobRecord) {
        self.records.insert(record.id, record);
    }

    fn next_step(&self, job_id: JobId) -> Option<BackendStep> {
        self.scripts.get_mut(&job_id).and_then(|mut s| s.pop_front())
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, subject_id: &SubjectId, requirement_set: &ArtifactRequirementSet) -> Result<JobRecord, StoreError> {
        if let Some(known) = &self.known_subjects {
            if !known.contains(subject_id.as_str()) {
                return Err(StoreError::UnknownSubject(subject_id.to_string()));
            }
        }
        let record = JobRecord::new(JobId::new(), subject_id.clone(), requirement_set.clone());
        self.records.insert(record.id, record.clone());
        debug!("store:create job_id={} subject={subject_id}", record.id);
        Ok(record)
    }

    async fn attach_artifact(&self, job_id: JobId, kind: &str, payload: &ArtifactPayload) -> Result<ArtifactRef, StoreError> {
        if let Some((_, reason)) = self.attach_failures.remove(&(job_id, kind.to_string())) {
            return Err(StoreError::Transport(reason));
        }
        let mut record = self.records.get_mut(&job_id).ok_or(StoreError::NotFound)?;
        if !record.status.accepts_artifacts() {
            return Err(StoreError::Refused(format!("job is {}", record.status)));
        }
        let artifact = ArtifactRef::for_payload(kind, payload);
        record.bind_artifact(artifact.clone());
        let derived = derive_equipped_status(StartPolicy::AnyArtifact, &record.requirement_set, &record.attached_artifacts);
        record.status = derived;
        self.payloads.insert((job_id, kind.to_string()), payload.clone());
        Ok(artifact)
    }

    async fn start_execution(&self, job_id: JobId) -> Result<(), StoreError> {
        {
            let mut record = self.records.get_mut(&job_id).ok_or(StoreError::NotFound)?;
            if record.attached_artifacts.is_empty() {
                return Err(StoreError::Refused("no artifacts attached".into()));
            }
            if !record.status.accepts_artifacts() {
                return Err(StoreError::Refused(format!("job already {}", record.status)));
            }
            record.status = JobStatus::Running(RunningPhase::Queued);
        }
        *self.start_calls.entry(job_id).or_insert(0) += 1;
        if !self.scripts.contains_key(&job_id) {
            self.scripts.insert(job_id, self.default_script.clone().into());
        }
        debug!("store:start job_id={job_id}");
        Ok(())
    }

    async fn fetch_status(&self, job_id: JobId) -> Result<JobRecord, StoreError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        let running = self.records
                          .get(&job_id)
                          .map(|r| r.status.is_running())
                          .ok_or(StoreError::NotFound)?;
        if running {
            match self.next_step(job_id) {
                Some(BackendStep::NotFound) => return Err(StoreError::NotFound),
                Some(BackendStep::TransportError(msg)) => return Err(StoreError::Transport(msg)),
                Some(BackendStep::Stale(status)) => {
                    let mut snapshot = self.records.get(&job_id).map(|r| r.value().clone()).ok_or(StoreError::NotFound)?;
                    snapshot.status = status;
                    return Ok(snapshot);
                }
                Some(step) => {
                    if let Some(mut record) = self.records.get_mut(&job_id) {
                        let applied = match step {
                            BackendStep::Phase(phase) => record.advance_to(JobStatus::Running(phase)),
                            BackendStep::Succeed(result_ref) => record.succeed(result_ref),
                            BackendStep::Fail(detail) => record.fail(detail),
                            BackendStep::NotFound | BackendStep::TransportError(_) | BackendStep::Stale(_) => Ok(()),
                        };
                        if let Err(e) = applied {
                            return Err(StoreError::Transport(e.to_string()));
                        }
                    }
                }
                None => {}
            }
        }
        self.records
            .get(&job_id)
            .map(|r| r.value().clone())
            .ok_or(StoreError::NotFound)
    }

    async fn list_by_subject(&self, subject_id: &SubjectId) -> Result<Vec<JobRecord>, StoreError> {
        let mut jobs: Vec<JobRecord> = self.records
                                           .iter()
                                           .filter(|r| &r.subject_id == subject_id)
                                           .map(|r| r.value().clone())
                                           .collect();
        jobs.sort_by_key(|r| r.created_at);
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diag_core::catalog;
    use serde_json::json;

    fn subject() -> SubjectId {
        SubjectId::parse("P1").unwrap()
    }

    #[tokio::test]
    async fn start_is_refused_without_artifacts() {
        let store = InMemoryJobStore::new();
        let job = store.create(&subject(), &catalog::ct_diagnosis()).await.unwrap();
        let err = store.start_execution(job.id).await.unwrap_err();
        assert!(matches!(err, StoreError::Refused(_)));
        assert_eq!(store.start_calls(job.id), 0);
    }

    #[tokio::test]
    async fn script_drives_fetch_status() {
        let store = InMemoryJobStore::new().with_default_script(vec![BackendStep::NotFound,
                                                                     BackendStep::Phase(RunningPhase::Processing),
                                                                     BackendStep::Fail("pipeline crash".into())]);
        let job = store.create(&subject(), &catalog::ct_diagnosis()).await.unwrap();
        store.attach_artifact(job.id, "DICOM-series", &ArtifactPayload::new("s.zip", "application/zip", json!({})))
             .await
             .unwrap();
        store.start_execution(job.id).await.unwrap();

        assert_eq!(store.fetch_status(job.id).await.unwrap_err(), StoreError::NotFound);
        assert_eq!(store.fetch_status(job.id).await.unwrap().status, JobStatus::Running(RunningPhase::Processing));
        let failed = store.fetch_status(job.id).await.unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.error_detail.as_deref(), Some("pipeline crash"));
        // Guion agotado: el estado terminal se mantiene.
        assert_eq!(store.fetch_status(job.id).await.unwrap().status, JobStatus::Failed);
        assert_eq!(store.fetch_calls(), 4);
    }

    #[tokio::test]
    async fn unknown_subject_is_rejected() {
        let store = InMemoryJobStore::new().with_known_subjects(["P1"]);
        let err = store.create(&SubjectId::parse("P9").unwrap(), &catalog::ct_diagnosis()).await.unwrap_err();
        assert_eq!(err, StoreError::UnknownSubject("P9".into()));
    }

    #[tokio::test]
    async fn failed_upload_leaves_no_binding() {
        let store = InMemoryJobStore::new();
        let job = store.create(&subject(), &catalog::omics_analysis()).await.unwrap();
        store.fail_next_attach(job.id, "RNA-seq", "connection reset");
        let payload = ArtifactPayload::new("counts.csv", "text/csv", json!({"rows": 10}));
        assert!(store.attach_artifact(job.id, "RNA-seq", &payload).await.is_err());
        assert!(store.payload_for(job.id, "RNA-seq").is_none());
        store.attach_artifact(job.id, "RNA-seq", &payload).await.unwrap();
        let record = store.fetch_status(job.id).await.unwrap();
        assert_eq!(record.attached_artifacts.len(), 1);
    }
}
