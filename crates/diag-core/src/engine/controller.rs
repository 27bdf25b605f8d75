//! JobLifecycleController: dueño de la máquina de estados de los jobs.
//!
//! Responsabilidades:
//! - Validar cada comando (`create_job`, `attach_artifact`,
//!   `start_execution`) contra el estado persistido en el `JobStore`.
//! - Serializar los comandos de un mismo job (un mutex por job) sin
//!   bloquear a los demás.
//! - Publicar cada transición a los observadores en orden no decreciente.
//! - Suscribir el job al `PollingScheduler` al iniciar y aplicar lo que el
//!   polling observe.
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, info, warn};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use super::scheduler::{PollHandle, PollOutcome, PollSink, PollingScheduler};
use super::stream::StatusStream;
use crate::constants::{DEFAULT_POLL_INTERVAL_MS, POLLING_ABORTED_PREFIX};
use crate::errors::{LifecycleError, StoreError};
use crate::event::{EventStore, InMemoryEventStore, JobEvent, JobEventKind};
use crate::model::{ArtifactPayload, ArtifactRequirementSet, JobId, JobRecord, JobStatus, RunningPhase, SubjectId};
use crate::port::{JobStore, ResultProjector};
use crate::validation::{derive_equipped_status, is_kind_known, is_startable, StartPolicy};

/// Parámetros del controlador.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Intervalo fijo entre consultas de estado.
    pub poll_interval: Duration,
    /// Umbral mínimo de artifacts para iniciar.
    pub start_policy: StartPolicy,
    /// Suscribir automáticamente al polling tras `start_execution`.
    pub auto_poll: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self { poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
               start_policy: StartPolicy::default(),
               auto_poll: true }
    }
}

struct JobSlot {
    record: JobRecord,
    observers: Vec<mpsc::UnboundedSender<JobRecord>>,
}

type SlotRef = Arc<Mutex<JobSlot>>;

struct Inner<S, E> {
    store: Arc<S>,
    config: ControllerConfig,
    jobs: DashMap<JobId, SlotRef>,
    // Última versión publicada de cada job (lectura síncrona para la UI).
    snapshots: DashMap<JobId, JobRecord>,
    events: StdMutex<E>,
}

pub struct JobLifecycleController<S, E = InMemoryEventStore>
    where S: JobStore + 'static,
          E: EventStore + 'static
{
    inner: Arc<Inner<S, E>>,
    scheduler: PollingScheduler<S>,
}

impl<S> JobLifecycleController<S, InMemoryEventStore> where S: JobStore + 'static
{
    /// Controlador con log de auditoría en memoria.
    pub fn new(store: Arc<S>, config: ControllerConfig) -> Self {
        Self::with_event_store(store, InMemoryEventStore::default(), config)
    }
}

impl<S, E> JobLifecycleController<S, E>
    where S: JobStore + 'static,
          E: EventStore + 'static
{
    pub fn with_event_store(store: Arc<S>, event_store: E, config: ControllerConfig) -> Self {
        let scheduler = PollingScheduler::new(Arc::clone(&store));
        let inner = Inner { store,
                            config,
                            jobs: DashMap::new(),
                            snapshots: DashMap::new(),
                            events: StdMutex::new(event_store) };
        Self { inner: Arc::new(inner),
               scheduler }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    /// Crea un job para `subject_id` con el snapshot de `requirement_set`.
    pub async fn create_job(&self, subject_id: &str, requirement_set: ArtifactRequirementSet) -> Result<JobRecord, LifecycleError> {
        let subject = SubjectId::parse(subject_id)?;
        let record = self.inner
                         .store
                         .create(&subject, &requirement_set)
                         .await
                         .map_err(|e| match e {
                             StoreError::UnknownSubject(s) => LifecycleError::InvalidSubject(s),
                             other => LifecycleError::Store(other),
                         })?;
        let job_id = record.id;
        let slot = JobSlot { record: record.clone(),
                             observers: Vec::new() };
        self.inner.jobs.insert(job_id, Arc::new(Mutex::new(slot)));
        self.inner.snapshots.insert(job_id, record.clone());
        self.inner.append(job_id,
                          JobEventKind::JobCreated { subject_id: subject.to_string(),
                                                     requirement_set_id: requirement_set.id.clone() });
        info!("create_job:done job_id={job_id} subject={subject} requirements={}", requirement_set.id);
        Ok(record)
    }

    /// Adjunta (o reemplaza) el artifact de `kind`.
    pub async fn attach_artifact(&self, job_id: JobId, kind: &str, payload: ArtifactPayload) -> Result<JobRecord, LifecycleError> {
        let slot_ref = self.inner.slot_or_load(job_id).await?;
        let mut slot = slot_ref.lock().await;
        self.inner.refresh(&mut slot).await?;

        if !is_kind_known(&slot.record.requirement_set, kind) {
            return Err(LifecycleError::UnknownRequirementKind { job_id,
                                                                kind: kind.to_string() });
        }
        if !slot.record.status.accepts_artifacts() {
            return Err(LifecycleError::JobAlreadyRunning { job_id,
                                                           status: slot.record.status });
        }

        let artifact = self.inner.store.attach_artifact(job_id, kind, &payload).await?;
        let hash = artifact.hash.clone();
        let replaced = slot.record.bind_artifact(artifact).is_some();
        let derived = derive_equipped_status(self.inner.config.start_policy,
                                             &slot.record.requirement_set,
                                             &slot.record.attached_artifacts);
        if slot.record.status.can_advance_to(derived) {
            slot.record.advance_to(derived)?;
        }
        self.inner.append(job_id,
                          JobEventKind::ArtifactAttached { kind: kind.to_string(),
                                                           hash,
                                                           replaced });
        self.inner.publish(&mut slot);
        info!("attach_artifact:done job_id={job_id} kind={kind} replaced={replaced} status={}", slot.record.status);
        Ok(slot.record.clone())
    }

    /// Inicia la ejecución. Una segunda llamada mientras corre es
    /// `NotStartable` y no vuelve a invocar al backend.
    pub async fn start_execution(&self, job_id: JobId) -> Result<JobRecord, LifecycleError> {
        let record = {
            let slot_ref = self.inner.slot_or_load(job_id).await?;
            let mut slot = slot_ref.lock().await;
            self.inner.refresh(&mut slot).await?;

            let status = slot.record.status;
            let startable = is_startable(self.inner.config.start_policy,
                                         &slot.record.requirement_set,
                                         &slot.record.attached_artifacts);
            if !status.accepts_artifacts() || !startable {
                debug!("start_execution:rejected job_id={job_id} status={status} startable={startable}");
                return Err(LifecycleError::NotStartable { job_id, status });
            }

            self.inner.store.start_execution(job_id).await?;
            slot.record.advance_to(JobStatus::Running(RunningPhase::Queued))?;
            self.inner.append(job_id, JobEventKind::ExecutionStarted);
            self.inner.publish(&mut slot);
            info!("start_execution:done job_id={job_id} artifacts={}", slot.record.attached_artifacts.len());
            slot.record.clone()
        };
        if self.inner.config.auto_poll {
            self.subscribe(job_id);
        }
        Ok(record)
    }

    /// Canal pasivo de observación: el estado actual y luego cada
    /// transición hasta el terminal.
    pub async fn observe_status(&self, job_id: JobId) -> Result<StatusStream, LifecycleError> {
        let slot_ref = self.inner.slot_or_load(job_id).await?;
        let mut slot = slot_ref.lock().await;
        let (tx, rx) = mpsc::unbounded_channel();
        // El receptor está vivo: el envío no puede fallar aquí.
        let _ = tx.send(slot.record.clone());
        if !slot.record.is_terminal() {
            slot.observers.push(tx);
        }
        Ok(StatusStream::new(rx))
    }

    /// Último estado conocido, sin esperar ni consultar al store.
    pub fn current_state(&self, job_id: JobId) -> Option<JobRecord> {
        self.inner.snapshots.get(&job_id).map(|r| r.value().clone())
    }

    /// Historial de jobs del sujeto (lectura directa del store).
    pub async fn list_by_subject(&self, subject_id: &str) -> Result<Vec<JobRecord>, LifecycleError> {
        let subject = SubjectId::parse(subject_id)?;
        match self.inner.store.list_by_subject(&subject).await {
            Ok(jobs) => Ok(jobs),
            Err(StoreError::UnknownSubject(s)) => Err(LifecycleError::InvalidSubject(s)),
            Err(e) => Err(e.into()),
        }
    }

    /// Log de auditoría del job.
    pub fn history(&self, job_id: JobId) -> Vec<JobEvent> {
        self.inner.events().list(job_id)
    }

    /// Suscribe explícitamente el job al polling (p. ej. al reabrir la vista
    /// de un job que ya corre). `None` si el job ya es terminal.
    pub async fn poll(&self, job_id: JobId) -> Result<Option<PollHandle>, LifecycleError> {
        let slot_ref = self.inner.slot_or_load(job_id).await?;
        if slot_ref.lock().await.record.is_terminal() {
            return Ok(None);
        }
        Ok(Some(self.subscribe(job_id)))
    }

    /// Detiene el polling del job (la vista dueña se destruyó). Síncrono;
    /// una respuesta en vuelo se descarta.
    pub fn cancel_polling(&self, job_id: JobId) -> bool {
        let cancelled = self.scheduler.cancel(job_id);
        if cancelled {
            self.inner.append(job_id, JobEventKind::PollingCancelled);
            info!("cancel_polling:done job_id={job_id}");
        }
        cancelled
    }

    pub fn is_polling(&self, job_id: JobId) -> bool {
        self.scheduler.is_active(job_id)
    }

    pub fn active_polls(&self) -> usize {
        self.scheduler.active_count()
    }

    /// Entrega un job terminado con éxito al proyector de resultados.
    pub fn project_result<P: ResultProjector>(&self, job_id: JobId, projector: &P) -> Result<P::Output, LifecycleError> {
        let record = self.current_state(job_id).ok_or(LifecycleError::JobNotFound(job_id))?;
        if record.status != JobStatus::Succeeded {
            return Err(LifecycleError::NotTerminal { job_id,
                                                     status: record.status });
        }
        Ok(projector.project(&record))
    }

    fn subscribe(&self, job_id: JobId) -> PollHandle {
        let sink: Arc<dyn PollSink> = self.inner.clone();
        self.scheduler.subscribe(job_id, self.inner.config.poll_interval, sink)
    }
}

impl<S, E> Drop for JobLifecycleController<S, E>
    where S: JobStore + 'static,
          E: EventStore + 'static
{
    fn drop(&mut self) {
        self.scheduler.cancel_all();
    }
}

impl<S, E> Inner<S, E>
    where S: JobStore + 'static,
          E: EventStore + 'static
{
    fn events(&self) -> MutexGuard<'_, E> {
        // Un panic en otro hilo no invalida un log append-only.
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn append(&self, job_id: JobId, kind: JobEventKind) {
        let ev = self.events().append_kind(job_id, kind);
        debug!("event:append job_id={job_id} seq={} kind={}", ev.seq, ev.kind.variant_name());
    }

    /// Slot local del job o, si no existe, el registro persistido (jobs
    /// creados en otra sesión).
    async fn slot_or_load(&self, job_id: JobId) -> Result<SlotRef, LifecycleError> {
        if let Some(slot) = self.jobs.get(&job_id) {
            return Ok(Arc::clone(slot.value()));
        }
        let record = match self.store.fetch_status(job_id).await {
            Ok(record) => record,
            Err(StoreError::NotFound) => return Err(LifecycleError::JobNotFound(job_id)),
            Err(e) => return Err(e.into()),
        };
        let slot = match self.jobs.entry(job_id) {
            Entry::Occupied(e) => return Ok(Arc::clone(e.get())),
            Entry::Vacant(e) => {
                let slot = Arc::new(Mutex::new(JobSlot { record: record.clone(),
                                                         observers: Vec::new() }));
                e.insert(Arc::clone(&slot));
                slot
            }
        };
        if record.is_terminal() {
            self.append_outcome(&record);
        }
        self.snapshots.entry(job_id).or_insert(record);
        Ok(slot)
    }

    /// Relee el estado persistido antes de validar un comando. Un
    /// `NotFound` conserva el registro local.
    async fn refresh(&self, slot: &mut JobSlot) -> Result<(), LifecycleError> {
        match self.store.fetch_status(slot.record.id).await {
            Ok(persisted) => {
                if self.merge_persisted(&mut slot.record, persisted) {
                    if slot.record.is_terminal() {
                        self.append_outcome(&slot.record);
                    }
                    self.publish(slot);
                }
                Ok(())
            }
            Err(StoreError::NotFound) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Fusiona el registro del store sobre el local respetando la
    /// monotonía. Un job cerrado o una lectura atrasada no se aplican.
    /// Devuelve `true` si el estado cambió.
    fn merge_persisted(&self, local: &mut JobRecord, persisted: JobRecord) -> bool {
        if persisted.id != local.id || local.is_terminal() {
            return false;
        }
        let before = local.status;
        let target = if persisted.status.accepts_artifacts() {
            derive_equipped_status(self.config.start_policy, &local.requirement_set, &persisted.attached_artifacts)
        } else {
            persisted.status
        };
        if !local.status.can_advance_to(target) {
            debug!("merge:stale job_id={} local={} persisted={}", local.id, local.status, persisted.status);
            return false;
        }
        local.attached_artifacts = persisted.attached_artifacts;
        let applied = match target {
            JobStatus::Succeeded => local.succeed(persisted.result_ref.unwrap_or_default()),
            JobStatus::Failed => local.fail(persisted.error_detail.unwrap_or_default()),
            other => local.advance_to(other),
        };
        if let Err(e) = applied {
            warn!("merge:rejected job_id={} error={e}", local.id);
            return false;
        }
        before != local.status
    }

    /// Registra el desenlace (`JobSucceeded`/`JobFailed`) de un job cerrado.
    fn append_outcome(&self, record: &JobRecord) {
        let kind = match record.status {
            JobStatus::Succeeded => JobEventKind::JobSucceeded { result_ref: record.result_ref.clone().unwrap_or_default() },
            JobStatus::Failed => JobEventKind::JobFailed { error_detail: record.error_detail.clone().unwrap_or_default() },
            _ => return,
        };
        self.append(record.id, kind);
    }

    /// Publica el registro a observadores y snapshot. Al ser terminal cierra
    /// los canales.
    fn publish(&self, slot: &mut JobSlot) {
        let record = slot.record.clone();
        self.snapshots.insert(record.id, record.clone());
        slot.observers.retain(|tx| tx.send(record.clone()).is_ok());
        if record.is_terminal() {
            slot.observers.clear();
        }
    }
}

#[async_trait]
impl<S, E> PollSink for Inner<S, E>
    where S: JobStore + 'static,
          E: EventStore + 'static
{
    async fn deliver(&self, job_id: JobId, outcome: PollOutcome, token: &CancellationToken) {
        let Some(slot_ref) = self.jobs.get(&job_id).map(|s| Arc::clone(s.value())) else {
            debug!("poll:deliver unknown job_id={job_id}");
            return;
        };
        let mut slot = slot_ref.lock().await;
        if token.is_cancelled() {
            debug!("poll:deliver discarded job_id={job_id} (cancelled)");
            return;
        }
        if slot.record.is_terminal() {
            return;
        }
        match outcome {
            PollOutcome::NotYetAvailable => {}
            PollOutcome::Progress(persisted) => {
                if !slot.record.status.can_advance_to(persisted.status) {
                    debug!("poll:deliver stale job_id={job_id} local={} persisted={}", slot.record.status, persisted.status);
                    return;
                }
                if !self.merge_persisted(&mut slot.record, persisted) {
                    return;
                }
                self.append(job_id, JobEventKind::StatusObserved { status: slot.record.status });
                self.publish(&mut slot);
            }
            PollOutcome::Terminal(persisted) => {
                if !self.merge_persisted(&mut slot.record, persisted) {
                    return;
                }
                self.append_outcome(&slot.record);
                self.publish(&mut slot);
                info!("poll:terminal job_id={job_id} status={}", slot.record.status);
            }
            PollOutcome::Aborted(reason) => {
                let detail = format!("{POLLING_ABORTED_PREFIX}: {reason}");
                if let Err(e) = slot.record.fail(detail.clone()) {
                    warn!("poll:abort rejected job_id={job_id} error={e}");
                    return;
                }
                self.append(job_id, JobEventKind::PollingAborted { reason });
                self.append(job_id, JobEventKind::JobFailed { error_detail: detail });
                self.publish(&mut slot);
                warn!("poll:aborted job_id={job_id}; job marked failed");
            }
        }
    }
}
