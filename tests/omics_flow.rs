use std::sync::Arc;

use diagflow::{catalog, run_demo, ArtifactPayload, ControllerConfig, InMemoryJobStore, JobLifecycleController, JobStatus, StartPolicy};
use serde_json::json;

#[tokio::test(start_paused = true)]
async fn omics_demo_attaches_every_kind() {
    let report = run_demo(catalog::OMICS_MULTI, "P-3", ControllerConfig::default()).await.expect("demo");
    assert_eq!(report.final_status, "succeeded");
    assert!(report.error_detail.is_none());
    let summary = report.summary.unwrap();
    assert_eq!(summary.artifact_kinds.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn omics_runs_with_a_subset_under_default_policy() {
    let store = Arc::new(InMemoryJobStore::new());
    let ctl = JobLifecycleController::new(Arc::clone(&store), ControllerConfig::default());
    let job = ctl.create_job("P-3", catalog::omics_analysis()).await.unwrap();

    let record = ctl.attach_artifact(job.id, "proteomics", ArtifactPayload::new("prot.csv", "text/csv", json!({"rows": 10})))
                    .await
                    .unwrap();
    assert_eq!(record.status, JobStatus::Startable);
    let mut stream = ctl.observe_status(job.id).await.unwrap();
    ctl.start_execution(job.id).await.unwrap();

    let mut last = None;
    while let Some(r) = stream.recv().await {
        last = Some(r);
    }
    assert_eq!(last.unwrap().status, JobStatus::Succeeded);
}

#[tokio::test]
async fn omics_at_least_policy_requires_two_kinds() {
    let store = Arc::new(InMemoryJobStore::new());
    let config = ControllerConfig { start_policy: StartPolicy::AtLeast(2),
                                    auto_poll: false,
                                    ..ControllerConfig::default() };
    let ctl = JobLifecycleController::new(Arc::clone(&store), config);
    let job = ctl.create_job("P-3", catalog::omics_analysis()).await.unwrap();

    let r = ctl.attach_artifact(job.id, "RNA-seq", ArtifactPayload::new("rna.tsv", "text/tab-separated-values", json!(1)))
               .await
               .unwrap();
    assert_eq!(r.status, JobStatus::PartiallyEquipped);
    assert!(ctl.start_execution(job.id).await.is_err());

    let r = ctl.attach_artifact(job.id, "clinical-variables", ArtifactPayload::new("clin.csv", "text/csv", json!(2)))
               .await
               .unwrap();
    assert_eq!(r.status, JobStatus::Startable);
    assert!(ctl.start_execution(job.id).await.unwrap().status.is_running());
}
