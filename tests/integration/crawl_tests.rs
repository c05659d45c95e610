use crate::common::{html_page, mount_index, mount_page, test_config};
use spec_weaver::crawler::{build_http_client, CrawlOptions, SiteCrawler};
use spec_weaver::url::{normalize_url, CrawlScope, ScopeMode};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn crawler_for(config: &spec_weaver::Config, root: &url::Url) -> SiteCrawler {
    let scope = CrawlScope::from_mode(
        root,
        config.crawler.scope,
        config.crawler.path_prefix.as_deref(),
    );
    let client = build_http_client(&config.user_agent).expect("Failed to build client");
    SiteCrawler::new(client, CrawlOptions::from_config(config, scope))
}

#[tokio::test]
async fn test_full_crawl_single_site() {
    let mock_server = MockServer::start().await;
    mount_index(&mock_server, &["/page1", "/page2"]).await;
    mount_page(
        &mock_server,
        "/page1",
        html_page("Page 1", r#"<p>Content 1</p><a href="/page2">again</a>"#),
    )
    .await;
    mount_page(&mock_server, "/page2", html_page("Page 2", "<p>Content 2</p>")).await;

    let config = test_config();
    let root = normalize_url(&mock_server.uri()).expect("Failed to parse base URL");
    let outcome = crawler_for(&config, &root)
        .crawl(root.clone(), CancellationToken::new())
        .await;

    let urls: Vec<&str> = outcome.pages.iter().map(|p| p.url.as_str()).collect();
    assert_eq!(urls.len(), 3, "Expected 3 pages, got {:?}", urls);
    assert!(urls.iter().any(|u| u.ends_with("/page1")));
    assert!(urls.iter().any(|u| u.ends_with("/page2")));

    let home = outcome
        .pages
        .iter()
        .find(|p| p.depth == 0)
        .expect("Root page missing");
    assert_eq!(home.title.as_deref(), Some("Acme API"));
    assert!(outcome.stats.failures.is_empty());
    assert!(!outcome.stats.cancelled);
}

#[tokio::test]
async fn test_prefix_scope_containment() {
    let mock_server = MockServer::start().await;
    mount_page(
        &mock_server,
        "/docs",
        html_page(
            "Docs",
            r#"<a href="/docs/intro">Intro</a>
               <a href="/blog/launch">Blog</a>
               <a href="https://elsewhere.example.com/">Partner</a>"#,
        ),
    )
    .await;
    mount_page(&mock_server, "/docs/intro", html_page("Intro", "<p>Hello</p>")).await;

    Mock::given(method("GET"))
        .and(path("/blog/launch"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut config = test_config();
    config.crawler.scope = ScopeMode::Prefix;
    let root = normalize_url(&format!("{}/docs/", mock_server.uri())).expect("valid root");
    let outcome = crawler_for(&config, &root)
        .crawl(root.clone(), CancellationToken::new())
        .await;

    assert_eq!(outcome.pages.len(), 2);
    assert!(outcome.pages.iter().all(|p| p.url.contains("/docs")));
    assert_eq!(outcome.stats.out_of_scope.len(), 2);
    assert!(outcome
        .stats
        .out_of_scope
        .iter()
        .any(|u| u.contains("elsewhere.example.com")));
}

#[tokio::test]
async fn test_root_outside_explicit_prefix_not_fetched() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "/reference/a", html_page("A", "<p>a</p>")).await;

    let mut config = test_config();
    config.crawler.scope = ScopeMode::Prefix;
    config.crawler.path_prefix = Some("/reference".to_string());
    let root = normalize_url(&mock_server.uri()).expect("valid root");
    let outcome = crawler_for(&config, &root)
        .crawl(root.clone(), CancellationToken::new())
        .await;

    assert!(outcome.pages.is_empty());
    assert!(outcome.stats.out_of_scope.contains(root.as_str()));
}

#[tokio::test]
async fn test_failed_page_is_retried_and_recorded() {
    let mock_server = MockServer::start().await;
    mount_index(&mock_server, &["/ok", "/flaky"]).await;
    mount_page(&mock_server, "/ok", html_page("Ok", "<p>fine</p>")).await;

    // One attempt plus one retry
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&mock_server)
        .await;

    let config = test_config();
    let root = normalize_url(&mock_server.uri()).expect("valid root");
    let outcome = crawler_for(&config, &root)
        .crawl(root.clone(), CancellationToken::new())
        .await;

    assert_eq!(outcome.pages.len(), 2);
    assert_eq!(outcome.stats.failures.len(), 1);
    let failure = &outcome.stats.failures[0];
    assert!(failure.url.ends_with("/flaky"));
    assert_eq!(failure.attempts, 2);
}

#[tokio::test]
async fn test_robots_txt_respect() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /admin"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/admin"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    mount_index(&mock_server, &["/allowed", "/admin"]).await;
    mount_page(&mock_server, "/allowed", html_page("Allowed", "<p>ok</p>")).await;

    let config = test_config();
    let root = normalize_url(&mock_server.uri()).expect("valid root");
    let outcome = crawler_for(&config, &root)
        .crawl(root.clone(), CancellationToken::new())
        .await;

    assert_eq!(outcome.pages.len(), 2);
    assert_eq!(outcome.stats.robots_disallowed, 1);
    assert_eq!(outcome.stats.skipped(), 1);
}

#[tokio::test]
async fn test_non_html_pages_skipped() {
    let mock_server = MockServer::start().await;
    mount_index(&mock_server, &["/logo.png"]).await;

    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![0x89, 0x50, 0x4e, 0x47])
                .insert_header("content-type", "image/png"),
        )
        .mount(&mock_server)
        .await;

    let config = test_config();
    let root = normalize_url(&mock_server.uri()).expect("valid root");
    let outcome = crawler_for(&config, &root)
        .crawl(root.clone(), CancellationToken::new())
        .await;

    assert_eq!(outcome.pages.len(), 1);
    assert_eq!(outcome.stats.content_mismatches, 1);
}

#[tokio::test]
async fn test_page_budget_respected() {
    let mock_server = MockServer::start().await;
    mount_index(&mock_server, &["/a", "/b", "/c", "/d"]).await;
    for route in ["/a", "/b", "/c", "/d"] {
        mount_page(&mock_server, route, html_page(route, "<p>page</p>")).await;
    }

    let mut config = test_config();
    config.crawler.max_pages = 3;
    let root = normalize_url(&mock_server.uri()).expect("valid root");
    let outcome = crawler_for(&config, &root)
        .crawl(root.clone(), CancellationToken::new())
        .await;

    assert_eq!(outcome.pages.len(), 3);
}
