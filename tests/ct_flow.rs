use std::sync::Arc;
use std::time::Duration;

use diagflow::{catalog, run_demo, ArtifactPayload, BackendStep, ControllerConfig, InMemoryJobStore, JobEventKind, JobLifecycleController,
               JobStatus, LifecycleError, SummaryProjector};
use serde_json::json;

#[tokio::test(start_paused = true)]
async fn ct_demo_reaches_success_with_summary() {
    let report = run_demo(catalog::CT_DIAGNOSIS, "P-7", ControllerConfig::default()).await.expect("demo");
    assert_eq!(report.statuses,
               vec!["created", "startable", "running:queued", "running:received", "running:processing", "succeeded"]);
    assert_eq!(report.final_status, "succeeded");
    let summary = report.summary.expect("summary");
    assert_eq!(summary.subject_id, "P-7");
    assert_eq!(summary.analysis, "ct-diagnosis");
    assert_eq!(summary.result_ref.as_deref(), Some("ct-diagnosis-report"));
    assert_eq!(summary.artifact_kinds, vec!["DICOM-series".to_string()]);
}

#[tokio::test]
async fn unknown_analysis_is_a_domain_error() {
    let err = run_demo("mri", "P-7", ControllerConfig::default()).await.unwrap_err();
    assert!(matches!(err, diagflow::CoreError::Domain(diagflow::DomainError::NotFound(_))), "{err}");
}

#[tokio::test(start_paused = true)]
async fn ct_history_and_result_projection() {
    let store = Arc::new(InMemoryJobStore::new().with_default_script(vec![BackendStep::Phase(diagflow::RunningPhase::Processing),
                                                                          BackendStep::Succeed("ct-42".into())]));
    let ctl = JobLifecycleController::new(Arc::clone(&store), ControllerConfig { poll_interval: Duration::from_secs(1),
                                                                                 ..ControllerConfig::default() });
    let job = ctl.create_job("P-9", catalog::ct_diagnosis()).await.unwrap();
    let mut stream = ctl.observe_status(job.id).await.unwrap();

    assert!(matches!(ctl.project_result(job.id, &SummaryProjector).unwrap_err(), LifecycleError::NotTerminal { .. }));

    ctl.attach_artifact(job.id, "DICOM-series", ArtifactPayload::new("series.zip", "application/zip", json!({"slices": 120})))
       .await
       .unwrap();
    ctl.start_execution(job.id).await.unwrap();
    while stream.recv().await.is_some() {}

    let summary = ctl.project_result(job.id, &SummaryProjector).unwrap();
    assert_eq!(summary.result_ref.as_deref(), Some("ct-42"));

    let kinds: Vec<&str> = ctl.history(job.id).iter().map(|e| e.kind.variant_name()).collect();
    assert_eq!(kinds.first(), Some(&"JobCreated"));
    assert_eq!(kinds.last(), Some(&"JobSucceeded"));
    assert!(ctl.history(job.id).iter().any(|e| matches!(e.kind, JobEventKind::ExecutionStarted)));

    let listed = ctl.list_by_subject("P-9").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, JobStatus::Succeeded);
}
