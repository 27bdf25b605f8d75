//! Proyector mínimo de resultados: resume un job terminado con éxito.
use serde::{Deserialize, Serialize};

use diag_core::{JobId, JobRecord, ResultProjector};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub job_id: JobId,
    pub subject_id: String,
    pub analysis: String,
    pub result_ref: Option<String>,
    pub artifact_kinds: Vec<String>,
    pub elapsed_secs: i64,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SummaryProjector;

impl ResultProjector for SummaryProjector {
    type Output = ResultSummary;

    fn project(&self, record: &JobRecord) -> ResultSummary {
        ResultSummary { job_id: record.id,
                        subject_id: record.subject_id.to_string(),
                        analysis: record.requirement_set.id.clone(),
                        result_ref: record.result_ref.clone(),
                        artifact_kinds: record.attached_artifacts.keys().cloned().collect(),
                        elapsed_secs: (record.last_transition_at - record.created_at).num_seconds() }
    }
}
