//! Runner de demostración: ejecuta un flujo completo (crear, adjuntar,
//! iniciar, observar) contra `InMemoryJobStore` y devuelve la secuencia de
//! estados observada junto al resumen del resultado.
use std::sync::Arc;

use diag_adapters::{BackendStep, InMemoryJobStore, ResultSummary, SummaryProjector};
use diag_core::{catalog, ArtifactPayload, ControllerConfig, JobLifecycleController, JobStatus};
use log::{debug, info};
use serde::Serialize;
use serde_json::json;

use crate::errors::{CoreError, DomainError};

#[derive(Debug, Clone, Serialize)]
pub struct DemoReport {
    pub statuses: Vec<String>,
    pub final_status: String,
    pub error_detail: Option<String>,
    pub summary: Option<ResultSummary>,
}

/// Corre el flujo `analysis` (id del catálogo) para `subject` adjuntando un
/// payload sintético por cada requisito.
pub async fn run_demo(analysis: &str, subject: &str, config: ControllerConfig) -> Result<DemoReport, CoreError> {
    let requirement_set =
        catalog::by_id(analysis).ok_or_else(|| DomainError::NotFound(format!("análisis {analysis}")))?;
    let store = Arc::new(InMemoryJobStore::new().with_default_script(BackendStep::happy_path(&format!("{analysis}-report"))));
    let auto_poll = config.auto_poll;
    let ctl = JobLifecycleController::new(store, config);

    let job = ctl.create_job(subject, requirement_set.clone()).await?;
    info!("demo:create job_id={} analysis={analysis} subject={subject}", job.id);
    let mut stream = ctl.observe_status(job.id).await?;

    for req in requirement_set.iter() {
        let payload = ArtifactPayload::new(format!("{}.json", req.kind), "application/json", json!({ "kind": req.kind, "label": req.label }));
        let record = ctl.attach_artifact(job.id, &req.kind, payload).await?;
        debug!("demo:attach kind={} status={}", req.kind, record.status);
    }
    ctl.start_execution(job.id).await?;
    if !auto_poll {
        ctl.poll(job.id).await?;
    }

    let mut statuses = Vec::new();
    let mut last = None;
    while let Some(record) = stream.recv().await {
        statuses.push(record.status.to_string());
        last = Some(record);
    }
    let last = last.ok_or_else(|| CoreError::Internal("el stream terminó sin estados".into()))?;
    info!("demo:done job_id={} status={}", job.id, last.status);

    let summary = match last.status {
        JobStatus::Succeeded => Some(ctl.project_result(job.id, &SummaryProjector)?),
        _ => None,
    };
    Ok(DemoReport { statuses,
                    final_status: last.status.to_string(),
                    error_detail: last.error_detail,
                    summary })
}
