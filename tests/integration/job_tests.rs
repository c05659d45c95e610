use crate::common::{closed_port_url, html_page, mount_index, mount_users_site, test_config};
use spec_weaver::pipeline::JobError;
use spec_weaver::store::{InMemoryProviderStore, SqliteProviderStore};
use spec_weaver::{JobManager, JobStatus, SpecSource};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_job_runs_to_done() {
    let mock_server = MockServer::start().await;
    mount_users_site(&mock_server).await;

    let manager = JobManager::new();
    let id = manager
        .submit(&mock_server.uri(), test_config())
        .expect("job accepted");

    let result = manager.result(id).await.expect("job succeeds");
    assert_eq!(manager.status(id), Ok(JobStatus::Done));
    assert_eq!(result.report.spec_source, SpecSource::Synthesized);
    assert_eq!(result.report.pages_classified_as_api_doc, 2);

    // The result stays available
    let again = manager.result(id).await.expect("result kept");
    assert_eq!(again.spec, result.spec);
}

#[tokio::test]
async fn test_removed_job_releases_result() {
    let mock_server = MockServer::start().await;
    mount_users_site(&mock_server).await;

    let manager = JobManager::new();
    let id = manager
        .submit(&mock_server.uri(), test_config())
        .expect("job accepted");
    let result = manager.result(id).await.expect("job succeeds");

    let removed = manager.remove(id).expect("job known");
    assert_eq!(removed.map(|r| r.spec), Some(result.spec));
    assert_eq!(manager.status(id), Err(JobError::UnknownJob(id)));
    assert_eq!(manager.result(id).await.unwrap_err(), JobError::UnknownJob(id));
    assert_eq!(manager.remove(id).unwrap_err(), JobError::UnknownJob(id));
}

#[tokio::test]
async fn test_failed_job_reports_failure() {
    let uri = closed_port_url();

    let mut config = test_config();
    config.crawler.max_retries = 0;
    let manager = JobManager::new();
    let id = manager.submit(&uri, config).expect("job accepted");

    let err = manager.result(id).await.unwrap_err();
    assert!(matches!(err, JobError::Failed { .. }));
    assert_eq!(manager.status(id), Ok(JobStatus::Failed));
}

#[tokio::test]
async fn test_cancelled_job_finishes_partial() {
    let mock_server = MockServer::start().await;
    mount_index(&mock_server, &["/slow"]).await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(html_page("Slow", "<pre>GET /slow</pre>"), "text/html")
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&mock_server)
        .await;

    let mut config = test_config();
    config.crawler.per_page_timeout_ms = 20_000;
    config.pipeline.overall_timeout_ms = 60_000;

    let manager = JobManager::new();
    let id = manager
        .submit(&mock_server.uri(), config)
        .expect("job accepted");

    tokio::time::sleep(Duration::from_millis(500)).await;
    manager.cancel(id).expect("job known");

    let result = tokio::time::timeout(Duration::from_secs(5), manager.result(id))
        .await
        .expect("cancelled job finishes promptly")
        .expect("cancelled job still succeeds");
    assert!(result.report.partial);
    assert_eq!(manager.status(id), Ok(JobStatus::Done));
}

#[tokio::test]
async fn test_finished_job_saved_to_sqlite_store() {
    let mock_server = MockServer::start().await;
    mount_users_site(&mock_server).await;

    let dir = TempDir::new().expect("temp dir");
    let store = Arc::new(SqliteProviderStore::new(&dir.path().join("providers.db")).expect("store opens"));

    let manager = JobManager::new().with_store(store.clone());
    let id = manager
        .submit(&mock_server.uri(), test_config())
        .expect("job accepted");
    manager.result(id).await.expect("job succeeds");

    let record = store
        .latest("127.0.0.1")
        .expect("query succeeds")
        .expect("provider saved");
    assert_eq!(record.endpoint_count(), 2);
    assert_eq!(record.title(), Some("Acme API"));
    assert_eq!(record.report.pages_visited, 5);
    assert_eq!(store.count().expect("count succeeds"), 1);
}

#[tokio::test]
async fn test_probed_job_saved_to_memory_store() {
    let mock_server = MockServer::start().await;
    mount_index(&mock_server, &[]).await;
    Mock::given(method("GET"))
        .and(path("/swagger.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"swagger": "2.0", "info": {"title": "Legacy", "version": "1"}, "paths": {"/ping": {}}}"#,
        ))
        .mount(&mock_server)
        .await;

    let store = Arc::new(InMemoryProviderStore::new());
    let manager = JobManager::new().with_store(store.clone());
    let id = manager
        .submit(&mock_server.uri(), test_config())
        .expect("job accepted");
    let result = manager.result(id).await.expect("job succeeds");
    assert_eq!(result.report.spec_source, SpecSource::Probed);

    let records = store.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].title(), Some("Legacy"));
    assert_eq!(records[0].report.spec_source, SpecSource::Probed);
}
