use spec_weaver::config::Config;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Configuration tuned for a local mock server
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.crawler.crawl_concurrency = 2;
    config.crawler.per_page_timeout_ms = 2_000;
    config.crawler.max_retries = 1;
    config.crawler.retry_backoff_ms = 10;
    config.crawler.max_backoff_ms = 20;
    config.pipeline.overall_timeout_ms = 30_000;
    config.user_agent.crawler_name = "TestBot".to_string();
    config
}

/// URL of a local port nothing listens on
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local address");
    drop(listener);
    format!("http://{}", addr)
}

pub fn html_page(title: &str, body: &str) -> String {
    format!(
        "<html><head><title>{}</title></head><body>{}</body></html>",
        title, body
    )
}

/// Serves `html` as a text/html page at `route`
pub async fn mount_page(server: &MockServer, route: &str, html: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(html, "text/html"))
        .mount(server)
        .await;
}

/// Root page linking to every route
pub async fn mount_index(server: &MockServer, routes: &[&str]) {
    let links: String = routes
        .iter()
        .map(|r| format!(r#"<a href="{}">{}</a>"#, r, r))
        .collect();
    mount_page(server, "/", html_page("Acme API", &format!("<h1>Welcome</h1>{}", links))).await;
}

/// Five-page site where two pages document `/users`
pub async fn mount_users_site(server: &MockServer) {
    mount_index(server, &["/guide", "/about", "/users/list", "/users/create"]).await;
    mount_page(
        server,
        "/guide",
        html_page("Guide", "<h1>Getting started</h1><p>Sign up for an account.</p>"),
    )
    .await;
    mount_page(
        server,
        "/about",
        html_page("About", "<h1>About us</h1><p>We sell widgets.</p>"),
    )
    .await;
    mount_page(
        server,
        "/users/list",
        html_page(
            "List users",
            "<h2>List users</h2><pre>GET /users</pre><p>Returns every user in the account.</p>",
        ),
    )
    .await;
    mount_page(
        server,
        "/users/create",
        html_page(
            "Create user",
            "<h2>Create user</h2><pre>POST /users</pre><p>Creates a user from the request body.</p>",
        ),
    )
    .await;
}
