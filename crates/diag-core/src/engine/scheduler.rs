//! PollingScheduler: consultas periódicas de estado para un job hasta
//! observar un estado terminal o hasta que la suscripción se cancele.
//!
//! - La primera consulta sale de inmediato (leading tick) y luego una por
//!   intervalo fijo, sin jitter.
//! - Hay a lo sumo un loop activo por job: un segundo `subscribe` reutiliza
//!   el existente y devuelve un handle sobre la misma cancelación.
//! - Tras cancelar, una respuesta en vuelo se descarta.
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, warn};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::errors::StoreError;
use crate::model::{JobId, JobRecord};
use crate::port::JobStore;

/// Clasificación del resultado de un tick.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// El backend aún no tiene registro: transitorio, se sigue consultando.
    NotYetAvailable,
    /// Estado no terminal; se propaga para mostrar la sub-fase.
    Progress(JobRecord),
    /// Estado terminal; el loop termina.
    Terminal(JobRecord),
    /// Error no clasificado; el loop termina y se propaga como fallo.
    Aborted(String),
}

impl PollOutcome {
    /// `true` si tras este resultado el loop debe detenerse.
    pub fn ends_polling(&self) -> bool {
        matches!(self, PollOutcome::Terminal(_) | PollOutcome::Aborted(_))
    }
}

/// Clasifica la respuesta de `JobStore::fetch_status`.
pub fn classify(result: Result<JobRecord, StoreError>) -> PollOutcome {
    match result {
        Ok(record) if record.is_terminal() => PollOutcome::Terminal(record),
        Ok(record) => PollOutcome::Progress(record),
        Err(StoreError::NotFound) => PollOutcome::NotYetAvailable,
        Err(other) => PollOutcome::Aborted(other.to_string()),
    }
}

/// Receptor de observaciones. El token permite al receptor descartar una
/// entrega que compite con una cancelación.
#[async_trait]
pub trait PollSink: Send + Sync {
    async fn deliver(&self, job_id: JobId, outcome: PollOutcome, token: &CancellationToken);
}

/// Handle de cancelación de una suscripción. Clonable; todos los clones
/// comparten la misma cancelación.
#[derive(Debug, Clone)]
pub struct PollHandle {
    job_id: JobId,
    token: CancellationToken,
    finished: Arc<AtomicBool>,
}

impl PollHandle {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Detiene el loop. Idempotente; no-op si ya terminó.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// `true` tras `cancel()` o tras la terminación natural del loop.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// `true` cuando la tarea de polling ya salió de su loop.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Espera a que el handle quede liberado (cancelación o terminal).
    pub async fn released(&self) {
        self.token.cancelled().await
    }
}

struct ActiveLoop {
    generation: u64,
    handle: PollHandle,
}

pub struct PollingScheduler<S: JobStore + 'static> {
    store: Arc<S>,
    active: Arc<DashMap<JobId, ActiveLoop>>,
    generation: AtomicU64,
}

impl<S: JobStore + 'static> PollingScheduler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store,
               active: Arc::new(DashMap::new()),
               generation: AtomicU64::new(0) }
    }

    /// Inicia (o reutiliza) el loop de polling de `job_id`. Debe llamarse
    /// dentro de un runtime tokio.
    pub fn subscribe(&self, job_id: JobId, interval: Duration, sink: Arc<dyn PollSink>) -> PollHandle {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let handle = match self.active.entry(job_id) {
            Entry::Occupied(existing) if !existing.get().handle.is_cancelled() => {
                debug!("poll:reuse job_id={job_id}");
                return existing.get().handle.clone();
            }
            Entry::Occupied(mut stale) => {
                let handle = new_handle(job_id);
                stale.insert(ActiveLoop { generation,
                                          handle: handle.clone() });
                handle
            }
            Entry::Vacant(slot) => {
                let handle = new_handle(job_id);
                slot.insert(ActiveLoop { generation,
                                         handle: handle.clone() });
                handle
            }
        };

        let store = Arc::clone(&self.store);
        let active = Arc::clone(&self.active);
        let loop_handle = handle.clone();
        let period = interval.max(Duration::from_millis(1));
        tokio::spawn(async move {
            run_loop(store, job_id, period, sink, &loop_handle).await;
            loop_handle.finished.store(true, Ordering::Release);
            loop_handle.token.cancel();
            active.remove_if(&job_id, |_, l| l.generation == generation);
        });
        debug!("poll:subscribed job_id={job_id} interval_ms={}", period.as_millis());
        handle
    }

    /// Cancela el loop activo de `job_id`, si existe.
    pub fn cancel(&self, job_id: JobId) -> bool {
        match self.active.remove(&job_id) {
            Some((_, l)) => {
                let was_active = !l.handle.is_cancelled();
                l.handle.cancel();
                was_active
            }
            None => false,
        }
    }

    /// Cancela todos los loops activos.
    pub fn cancel_all(&self) {
        for entry in self.active.iter() {
            entry.handle.cancel();
        }
        self.active.clear();
    }

    pub fn is_active(&self, job_id: JobId) -> bool {
        self.active.get(&job_id).map(|l| !l.handle.is_cancelled()).unwrap_or(false)
    }

    /// Cantidad de loops activos.
    pub fn active_count(&self) -> usize {
        self.active.iter().filter(|l| !l.handle.is_cancelled()).count()
    }
}

fn new_handle(job_id: JobId) -> PollHandle {
    PollHandle { job_id,
                 token: CancellationToken::new(),
                 finished: Arc::new(AtomicBool::new(false)) }
}

async fn run_loop<S: JobStore>(store: Arc<S>, job_id: JobId, period: Duration, sink: Arc<dyn PollSink>, handle: &PollHandle) {
    let token = &handle.token;
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ticks: u64 = 0;
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }
        ticks += 1;
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            r = store.fetch_status(job_id) => r,
        };
        if token.is_cancelled() {
            debug!("poll:discard job_id={job_id} tick={ticks} (cancelled in flight)");
            break;
        }
        let outcome = classify(result);
        match &outcome {
            PollOutcome::NotYetAvailable => debug!("poll:tick job_id={job_id} tick={ticks} not yet available"),
            PollOutcome::Progress(r) => debug!("poll:tick job_id={job_id} tick={ticks} status={}", r.status),
            PollOutcome::Terminal(r) => debug!("poll:terminal job_id={job_id} tick={ticks} status={}", r.status),
            PollOutcome::Aborted(reason) => warn!("poll:aborted job_id={job_id} tick={ticks} reason={reason}"),
        }
        let stop = outcome.ends_polling();
        sink.deliver(job_id, outcome, token).await;
        if stop {
            break;
        }
    }
}
