use std::sync::Arc;
use std::time::Duration;

use diag_adapters::{BackendStep, InMemoryJobStore};
use diag_core::{catalog, ArtifactPayload, ControllerConfig, JobEventKind, JobId, JobLifecycleController, JobRecord, JobStatus, RunningPhase,
                StatusStream};
use serde_json::json;

async fn drain(mut stream: StatusStream) -> Vec<JobRecord> {
    let mut out = Vec::new();
    while let Ok(Some(r)) = tokio::time::timeout(Duration::from_secs(300), stream.recv()).await {
        out.push(r);
    }
    out
}

async fn started_job(ctl: &JobLifecycleController<InMemoryJobStore>) -> (JobId, StatusStream) {
    let job = ctl.create_job("P1", catalog::ct_diagnosis()).await.unwrap();
    let stream = ctl.observe_status(job.id).await.unwrap();
    ctl.attach_artifact(job.id, "DICOM-series", ArtifactPayload::new("series.zip", "application/zip", json!({"slices": 240})))
       .await
       .unwrap();
    ctl.start_execution(job.id).await.unwrap();
    (job.id, stream)
}

#[tokio::test(start_paused = true)]
async fn not_found_responses_never_surface_as_errors() {
    let store = Arc::new(InMemoryJobStore::new().with_default_script(vec![BackendStep::NotFound,
                                                                          BackendStep::NotFound,
                                                                          BackendStep::NotFound,
                                                                          BackendStep::Phase(RunningPhase::Processing),
                                                                          BackendStep::NotFound,
                                                                          BackendStep::Succeed("ct-report-7".into())]));
    let ctl = JobLifecycleController::new(Arc::clone(&store), ControllerConfig::default());
    let (job_id, stream) = started_job(&ctl).await;

    let seen = drain(stream).await;
    assert!(seen.iter().all(|r| r.error_detail.is_none()));
    let last = seen.last().unwrap();
    assert_eq!(last.status, JobStatus::Succeeded);
    assert_eq!(last.result_ref.as_deref(), Some("ct-report-7"));
    // Leading tick + 5 ticks más.
    assert_eq!(store.fetch_calls(), 6 + 2);
    assert!(!ctl.history(job_id).iter().any(|e| matches!(e.kind, JobEventKind::PollingAborted { .. })));
}

#[tokio::test(start_paused = true)]
async fn transport_error_stops_polling_and_fails_the_job() {
    let store = Arc::new(InMemoryJobStore::new().with_default_script(vec![BackendStep::Phase(RunningPhase::Received),
                                                                          BackendStep::TransportError("502 bad gateway".into()),
                                                                          BackendStep::Succeed("never".into())]));
    let ctl = JobLifecycleController::new(Arc::clone(&store), ControllerConfig::default());
    let (job_id, stream) = started_job(&ctl).await;

    let last = drain(stream).await.pop().unwrap();
    assert_eq!(last.status, JobStatus::Failed);
    let detail = last.error_detail.unwrap();
    assert!(detail.starts_with("polling aborted"), "{detail}");
    assert!(detail.contains("502 bad gateway"));
    assert!(last.result_ref.is_none());

    let calls = store.fetch_calls();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(store.fetch_calls(), calls, "no more queries after abort");
    assert!(!ctl.is_polling(job_id));
    assert!(ctl.history(job_id).iter().any(|e| matches!(e.kind, JobEventKind::PollingAborted { .. })));
}

#[tokio::test(start_paused = true)]
async fn cancel_discards_in_flight_response() {
    let store = Arc::new(InMemoryJobStore::new().with_fetch_delay(Duration::from_secs(2))
                                                .with_default_script(BackendStep::happy_path("r")));
    let ctl = JobLifecycleController::new(Arc::clone(&store), ControllerConfig::default());
    let job = ctl.create_job("P1", catalog::ct_diagnosis()).await.unwrap();
    ctl.attach_artifact(job.id, "DICOM-series", ArtifactPayload::new("s.zip", "application/zip", json!(1)))
       .await
       .unwrap();
    let mut stream = ctl.observe_status(job.id).await.unwrap();
    ctl.start_execution(job.id).await.unwrap();
    assert!(ctl.is_polling(job.id));

    // La primera consulta está en vuelo (tarda 2 s).
    tokio::time::sleep(Duration::from_millis(500)).await;
    let calls = store.fetch_calls();
    assert!(ctl.cancel_polling(job.id));
    assert!(!ctl.cancel_polling(job.id), "second cancel is a no-op");

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(store.fetch_calls(), calls);
    assert_eq!(ctl.current_state(job.id).unwrap().status, JobStatus::Running(RunningPhase::Queued));

    let mut seen = Vec::new();
    while let Ok(Some(r)) = tokio::time::timeout(Duration::from_secs(10), stream.recv()).await {
        seen.push(r.status);
    }
    assert_eq!(seen.last(), Some(&JobStatus::Running(RunningPhase::Queued)));
    assert!(!seen.contains(&JobStatus::Running(RunningPhase::Received)));
    assert!(ctl.history(job.id).iter().any(|e| e.kind == JobEventKind::PollingCancelled));
}

#[tokio::test(start_paused = true)]
async fn second_subscription_reuses_the_active_loop() {
    let store = Arc::new(InMemoryJobStore::new().with_default_script(vec![BackendStep::Phase(RunningPhase::Processing)]));
    let config = ControllerConfig { auto_poll: false,
                                    ..ControllerConfig::default() };
    let ctl = JobLifecycleController::new(Arc::clone(&store), config);
    let (job_id, _stream) = started_job(&ctl).await;
    assert_eq!(ctl.active_polls(), 0);

    let h1 = ctl.poll(job_id).await.unwrap().expect("running job");
    let h2 = ctl.poll(job_id).await.unwrap().expect("running job");
    assert_eq!(ctl.active_polls(), 1);
    assert_eq!(h1.job_id(), h2.job_id());

    h1.cancel();
    assert!(h2.is_cancelled());
    h2.cancel();
    h2.released().await;
}

#[tokio::test(start_paused = true)]
async fn handle_is_released_after_natural_termination() {
    let store = Arc::new(InMemoryJobStore::new().with_default_script(vec![BackendStep::Succeed("done".into())]));
    let config = ControllerConfig { auto_poll: false,
                                    poll_interval: Duration::from_secs(1),
                                    ..ControllerConfig::default() };
    let ctl = JobLifecycleController::new(Arc::clone(&store), config);
    let (job_id, stream) = started_job(&ctl).await;

    let handle = ctl.poll(job_id).await.unwrap().unwrap();
    handle.released().await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(handle.is_finished());
    handle.cancel();
    assert!(!ctl.cancel_polling(job_id));
    assert_eq!(drain(stream).await.last().unwrap().status, JobStatus::Succeeded);

    // Terminal: no hay nada que consultar.
    assert!(ctl.poll(job_id).await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn running_job_from_another_session_can_be_resumed() {
    let store = Arc::new(InMemoryJobStore::new());
    let first = JobLifecycleController::new(Arc::clone(&store), ControllerConfig { auto_poll: false,
                                                                                   ..ControllerConfig::default() });
    let (job_id, _stream) = started_job(&first).await;
    drop(first);

    store.script(job_id, BackendStep::happy_path("omega"));
    let second = JobLifecycleController::new(Arc::clone(&store), ControllerConfig::default());
    assert!(second.current_state(job_id).is_none());

    // La carga desde el store ya es una lectura de estado (consume "received").
    let stream = second.observe_status(job_id).await.expect("loaded from store");
    second.poll(job_id).await.unwrap().expect("still running");
    let statuses: Vec<JobStatus> = drain(stream).await.iter().map(|r| r.status).collect();
    assert_eq!(statuses,
               vec![JobStatus::Running(RunningPhase::Received),
                    JobStatus::Running(RunningPhase::Processing),
                    JobStatus::Succeeded]);
    assert_eq!(second.current_state(job_id).unwrap().result_ref.as_deref(), Some("omega"));
}

#[tokio::test(start_paused = true)]
async fn independent_jobs_poll_in_parallel() {
    let store = Arc::new(InMemoryJobStore::new());
    let ctl = JobLifecycleController::new(Arc::clone(&store), ControllerConfig::default());
    let (a, stream_a) = started_job(&ctl).await;
    let (b, stream_b) = started_job(&ctl).await;
    assert_ne!(a, b);
    assert_eq!(ctl.active_polls(), 2);

    let (seen_a, seen_b) = tokio::join!(drain(stream_a), drain(stream_b));
    assert_eq!(seen_a.last().unwrap().status, JobStatus::Succeeded);
    assert_eq!(seen_b.last().unwrap().status, JobStatus::Succeeded);
    assert_eq!(ctl.active_polls(), 0);
}

#[tokio::test(start_paused = true)]
async fn lagging_backend_reads_never_move_the_stream_backwards() {
    let store = Arc::new(InMemoryJobStore::new().with_default_script(vec![BackendStep::Phase(RunningPhase::Processing),
                                                                          BackendStep::Stale(JobStatus::Startable),
                                                                          BackendStep::Stale(JobStatus::Created),
                                                                          BackendStep::Succeed("late".into())]));
    let ctl = JobLifecycleController::new(Arc::clone(&store), ControllerConfig::default());
    let (job_id, stream) = started_job(&ctl).await;

    let statuses: Vec<JobStatus> = drain(stream).await.iter().map(|r| r.status).collect();
    assert_eq!(statuses,
               vec![JobStatus::Created,
                    JobStatus::Startable,
                    JobStatus::Running(RunningPhase::Queued),
                    JobStatus::Running(RunningPhase::Processing),
                    JobStatus::Succeeded]);
    assert!(statuses.windows(2).all(|w| w[0].rank() <= w[1].rank()));
    assert!(!ctl.history(job_id)
                .iter()
                .any(|e| matches!(e.kind, JobEventKind::StatusObserved { status } if !status.is_running())));
}

#[tokio::test(start_paused = true)]
async fn unchanged_ticks_are_not_logged() {
    let store = Arc::new(InMemoryJobStore::new().with_default_script(vec![BackendStep::Phase(RunningPhase::Received),
                                                                          BackendStep::Phase(RunningPhase::Received),
                                                                          BackendStep::Phase(RunningPhase::Received),
                                                                          BackendStep::Succeed("r".into())]));
    let ctl = JobLifecycleController::new(Arc::clone(&store), ControllerConfig::default());
    let (job_id, stream) = started_job(&ctl).await;

    let statuses: Vec<JobStatus> = drain(stream).await.iter().map(|r| r.status).collect();
    assert_eq!(statuses.iter().filter(|s| **s == JobStatus::Running(RunningPhase::Received)).count(), 1);
    let observed = ctl.history(job_id).iter().filter(|e| matches!(e.kind, JobEventKind::StatusObserved { .. })).count();
    assert_eq!(observed, 1);
    assert_eq!(store.fetch_calls(), 4 + 2);
}
