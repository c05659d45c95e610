use crate::common::{closed_port_url, html_page, mount_index, mount_page, mount_users_site, test_config};
use serde_json::json;
use spec_weaver::pipeline::SpecDocument;
use spec_weaver::url::ScopeMode;
use spec_weaver::{Pipeline, SpecSource, WeaverError};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_probed_spec_returned_verbatim() {
    let mock_server = MockServer::start().await;
    let spec = json!({
        "openapi": "3.0.0",
        "info": {"title": "Acme", "version": "2.1.0"},
        "paths": {"/widgets": {"get": {"responses": {"200": {"description": "ok"}}}}}
    });
    let raw = serde_json::to_string_pretty(&spec).expect("spec serializes");

    mount_index(&mock_server, &["/guide"]).await;
    Mock::given(method("GET"))
        .and(path("/openapi.json"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(raw.clone(), "application/json"))
        .mount(&mock_server)
        .await;

    // Probe precedence: nothing beyond the root is crawled
    Mock::given(method("GET"))
        .and(path("/guide"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let pipeline = Pipeline::new(test_config()).expect("valid config");
    let result = pipeline.run(&mock_server.uri()).await.expect("run succeeds");

    assert_eq!(result.report.spec_source, SpecSource::Probed);
    assert_eq!(result.report.pages_visited, 0);
    assert!(result
        .report
        .probed_from
        .as_deref()
        .is_some_and(|u| u.ends_with("/openapi.json")));
    assert_eq!(result.spec.to_json(), spec);
    match &result.spec {
        SpecDocument::Probed(found) => assert_eq!(found.raw, raw),
        other => panic!("expected probed spec, got {:?}", other),
    }
}

#[tokio::test]
async fn test_probe_disabled_crawls_instead() {
    let mock_server = MockServer::start().await;
    mount_users_site(&mock_server).await;
    Mock::given(method("GET"))
        .and(path("/openapi.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut config = test_config();
    config.pipeline.probe = false;
    let result = Pipeline::new(config)
        .expect("valid config")
        .run(&mock_server.uri())
        .await
        .expect("run succeeds");

    assert_eq!(result.report.spec_source, SpecSource::Synthesized);
    assert_eq!(result.report.pages_visited, 5);
}

#[tokio::test]
async fn test_synthesized_spec_from_five_page_site() {
    let mock_server = MockServer::start().await;
    mount_users_site(&mock_server).await;

    let pipeline = Pipeline::new(test_config()).expect("valid config");
    let result = pipeline.run(&mock_server.uri()).await.expect("run succeeds");
    let report = &result.report;

    assert_eq!(report.spec_source, SpecSource::Synthesized);
    assert_eq!(report.pages_visited, 5);
    assert_eq!(report.pages_classified_as_api_doc, 2);
    assert!(report.extraction_failures.is_empty());
    assert!(report.merge_conflicts.is_empty());
    assert!(!report.partial);

    let spec = result.spec.to_json();
    assert_eq!(spec["info"]["title"], "Acme API");
    let users = &spec["paths"]["/users"];
    assert_eq!(users["get"]["summary"], "List users");
    assert_eq!(users["post"]["summary"], "Create user");
    assert_eq!(spec["paths"].as_object().map(|p| p.len()), Some(1));
}

#[tokio::test]
async fn test_runs_are_idempotent() {
    let mock_server = MockServer::start().await;
    mount_users_site(&mock_server).await;

    let pipeline = Pipeline::new(test_config()).expect("valid config");
    let first = pipeline.run(&mock_server.uri()).await.expect("first run");
    let second = pipeline.run(&mock_server.uri()).await.expect("second run");

    assert_eq!(first.spec, second.spec);
    assert_eq!(first.spec.to_json(), second.spec.to_json());
}

#[tokio::test]
async fn test_one_malformed_page_does_not_sink_the_run() {
    let mock_server = MockServer::start().await;
    mount_index(&mock_server, &["/orders", "/reference"]).await;
    mount_page(
        &mock_server,
        "/orders",
        html_page(
            "Orders",
            "<h2>Get order</h2><pre>GET /orders/{id}</pre><p>Fetches a single order by id.</p>",
        ),
    )
    .await;
    // Looks like API docs but never names an endpoint
    mount_page(
        &mock_server,
        "/reference",
        html_page(
            "Reference",
            r#"<h1>API Reference</h1>
               <table><tr><th>Parameter</th><th>Type</th></tr><tr><td>id</td><td>string</td></tr></table>
               <pre>{"id": "o_1"}</pre>"#,
        ),
    )
    .await;

    let pipeline = Pipeline::new(test_config()).expect("valid config");
    let result = pipeline.run(&mock_server.uri()).await.expect("run succeeds");
    let report = &result.report;

    assert_eq!(report.pages_classified_as_api_doc, 2);
    assert_eq!(report.extraction_failures.len(), 1);
    assert!(report.extraction_failures[0].url.ends_with("/reference"));

    let spec = result.spec.to_json();
    let get = &spec["paths"]["/orders/{id}"]["get"];
    assert!(get.is_object());
    assert_eq!(get["parameters"][0]["name"], "id");
    assert_eq!(get["parameters"][0]["in"], "path");
    assert_eq!(get["parameters"][0]["required"], true);
}

#[tokio::test]
async fn test_same_operation_on_two_pages_is_merged() {
    let mock_server = MockServer::start().await;
    mount_index(&mock_server, &["/items-a", "/items-b"]).await;
    mount_page(
        &mock_server,
        "/items-a",
        html_page(
            "Items",
            "<h2>List items</h2><pre>GET /items</pre><p>Lists items in pages of twenty.</p>",
        ),
    )
    .await;
    mount_page(
        &mock_server,
        "/items-b",
        html_page(
            "Items again",
            "<h2>List items</h2><pre>GET /items</pre><p>Returns all items in the store.</p>",
        ),
    )
    .await;

    let pipeline = Pipeline::new(test_config()).expect("valid config");
    let result = pipeline.run(&mock_server.uri()).await.expect("run succeeds");

    assert!(result.report.merge_conflicts.is_empty());
    let spec = result.spec.to_json();
    let paths = spec["paths"].as_object().expect("paths object");
    assert_eq!(paths.len(), 1);

    let get = &spec["paths"]["/items"]["get"];
    let description = get["description"].as_str().expect("merged description");
    assert!(description.contains("Lists items in pages of twenty."));
    assert!(description.contains("Returns all items in the store."));
    assert!(description.contains("/items-a]"));
    assert_eq!(get["x-requires-manual-review"], false);
    assert_eq!(get["x-source-urls"].as_array().map(|s| s.len()), Some(2));
}

#[tokio::test]
async fn test_site_without_api_pages_gets_note() {
    let mock_server = MockServer::start().await;
    mount_index(&mock_server, &["/blog"]).await;
    mount_page(
        &mock_server,
        "/blog",
        html_page("Blog", "<h1>Company news</h1><p>We moved offices.</p>"),
    )
    .await;

    let pipeline = Pipeline::new(test_config()).expect("valid config");
    let result = pipeline.run(&mock_server.uri()).await.expect("run succeeds");

    assert_eq!(result.report.pages_visited, 2);
    assert_eq!(result.report.pages_classified_as_api_doc, 0);
    assert!(result
        .report
        .notes
        .iter()
        .any(|n| n.contains("confidence floor")));
    assert_eq!(result.spec.to_json()["paths"], json!({}));
}

#[tokio::test]
async fn test_unreachable_root_is_fatal() {
    let uri = closed_port_url();

    let mut config = test_config();
    config.crawler.max_retries = 0;
    let err = Pipeline::new(config)
        .expect("valid config")
        .run(&uri)
        .await
        .unwrap_err();
    assert!(matches!(err, WeaverError::RootUnreachable { .. }));
}

#[tokio::test]
async fn test_root_outside_prefix_is_rejected() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut config = test_config();
    config.crawler.scope = ScopeMode::Prefix;
    config.crawler.path_prefix = Some("/reference".to_string());
    let err = Pipeline::new(config)
        .expect("valid config")
        .run(&mock_server.uri())
        .await
        .unwrap_err();
    assert!(matches!(err, WeaverError::InvalidRootUrl { .. }));
}

#[tokio::test]
async fn test_overall_timeout_yields_partial_result() {
    let mock_server = MockServer::start().await;
    mount_index(&mock_server, &["/slow1", "/slow2"]).await;
    for route in ["/slow1", "/slow2"] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(html_page("Slow", "<pre>GET /slow</pre>"), "text/html")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&mock_server)
            .await;
    }

    let mut config = test_config();
    config.crawler.crawl_concurrency = 1;
    config.crawler.max_retries = 0;
    config.crawler.per_page_timeout_ms = 1_000;
    config.pipeline.overall_timeout_ms = 1_500;

    let started = std::time::Instant::now();
    let result = Pipeline::new(config)
        .expect("valid config")
        .run(&mock_server.uri())
        .await
        .expect("partial run still succeeds");

    assert!(result.report.partial);
    assert!(result.report.notes.iter().any(|n| n.contains("partial")));
    assert!(result.report.pages_visited >= 1);
    assert!(started.elapsed() < Duration::from_secs(5));
}
