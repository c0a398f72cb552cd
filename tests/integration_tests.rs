//! Integration tests for the newsdesk reader backend
//!
//! These tests run the coordinators against a mocked news service over real
//! HTTP, exercise the on-disk database, and drive the JSON API end to end.

use std::io::Write;
use tempfile::NamedTempFile;

mod common {
    use std::sync::Arc;
    use std::time::Duration;

    use newsdesk::client::NewsClient;
    use newsdesk::config::Config;
    use newsdesk::connectivity::TcpProbe;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Create a temporary directory for test databases
    pub fn create_temp_dir() -> TempDir {
        tempfile::tempdir().expect("Failed to create temp directory")
    }

    /// Create a test database path
    pub fn create_db_path(temp_dir: &TempDir) -> String {
        let db_path = temp_dir.path().join("test.db");
        format!("sqlite:{}?mode=rwc", db_path.display())
    }

    pub fn create_config(base_url: &str) -> Config {
        Config::from_str(&format!(
            r#"
                api_key = "integration-key"
                base_url = "{}"
                country = "us"
                categories = ["technology", "science"]
                request_timeout_secs = 5
                connectivity_timeout_ms = 500
            "#,
            base_url
        ))
        .expect("Failed to build test config")
    }

    pub fn create_client(server: &MockServer) -> Arc<NewsClient> {
        Arc::new(NewsClient::new(&create_config(&server.uri())).expect("Failed to build client"))
    }

    pub fn create_probe(server: &MockServer) -> TcpProbe {
        TcpProbe::new(server.address().to_string(), Duration::from_millis(500))
    }

    pub fn articles(prefix: &str, count: usize) -> Vec<Value> {
        (1..=count)
            .map(|n| {
                json!({
                    "source": {"id": null, "name": "Wire"},
                    "title": format!("{} {}", prefix, n),
                    "description": "desc",
                    "url": format!("https://wire.example.com/{}/{}", prefix, n),
                    "urlToImage": null,
                    "publishedAt": "2024-12-09T12:00:00Z"
                })
            })
            .collect()
    }

    /// Serve `pages[i]` for `page=i+1` on `endpoint`, filtered by one extra query pair.
    pub async fn mount_pages(
        server: &MockServer,
        endpoint: &str,
        filter: (&str, &str),
        pages: Vec<Vec<Value>>,
    ) {
        let total: usize = pages.iter().map(Vec::len).sum();
        for (i, page) in pages.into_iter().enumerate() {
            Mock::given(method("GET"))
                .and(path(endpoint))
                .and(query_param(filter.0, filter.1))
                .and(query_param("page", (i + 1).to_string()))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "status": "ok",
                    "totalResults": total,
                    "articles": page
                })))
                .mount(server)
                .await;
        }
    }
}

#[cfg(test)]
mod config_integration_tests {
    use super::*;
    use newsdesk::config::Config;

    #[test]
    fn test_load_actual_config() {
        // Test loading the actual newsdesk.toml from the project
        let config = Config::load("newsdesk.toml");
        assert!(config.is_ok(), "Failed to load newsdesk.toml: {:?}", config.err());

        let config = config.unwrap();
        assert!(!config.categories.is_empty(), "newsdesk.toml should list categories");
        assert!(config.request_timeout_secs > 0, "request timeout should be positive");
    }

    #[test]
    fn test_config_from_file() {
        let toml_content = r#"
            api_key = "k"
            country = "fr"
            categories = ["sports", "health"]
            bind_address = "127.0.0.1:8080"
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.country, "fr");
        assert_eq!(config.default_category(), "sports");
        assert_eq!(config.bind_address, "127.0.0.1:8080");
        assert_eq!(config.base_url, "https://newsapi.org");
    }
}

#[cfg(test)]
mod database_integration_tests {
    use super::common::*;
    use newsdesk::db::Database;
    use newsdesk::models::Article;

    fn article(n: u32) -> Article {
        serde_json::from_value(serde_json::json!({
            "source": {"name": "Disk"},
            "title": format!("Persisted {}", n),
            "url": format!("https://disk.example.com/{}", n)
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_saved_articles_persist() {
        let temp_dir = create_temp_dir();
        let db_url = create_db_path(&temp_dir);

        {
            let db = Database::new(&db_url).await.unwrap();
            db.initialize().await.unwrap();
            db.save_article(&article(1)).await.unwrap();
            db.save_article(&article(2)).await.unwrap();
            db.set_dark_mode(true).await.unwrap();
        }

        // Reopen database and verify data persists
        {
            let db = Database::new(&db_url).await.unwrap();

            let saved = db.get_saved_articles().await.unwrap();
            assert_eq!(saved.len(), 2);
            assert!(db.is_saved("https://disk.example.com/1").await.unwrap());
            assert!(db.get_dark_mode().await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_repeated_saves_do_not_duplicate() {
        let temp_dir = create_temp_dir();
        let db = Database::new(&create_db_path(&temp_dir)).await.unwrap();
        db.initialize().await.unwrap();

        for _ in 0..3 {
            for n in 1..=4 {
                db.save_article(&article(n)).await.unwrap();
            }
        }

        assert_eq!(db.get_saved_articles().await.unwrap().len(), 4);
    }
}

#[cfg(test)]
mod coordinator_integration_tests {
    use super::common::*;
    use std::sync::Arc;

    use newsdesk::client::{Everything, TopHeadlines};
    use newsdesk::connectivity::{Connectivity, StaticConnectivity};
    use newsdesk::coordinator::{Coordinator, FetchStatus, MergePolicy};
    use newsdesk::models::Article;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn titles(status: &FetchStatus<Article>) -> Vec<String> {
        match status {
            FetchStatus::Success(articles) => articles.iter().map(|a| a.title.clone()).collect(),
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_headline_pages_accumulate_over_http() {
        let server = MockServer::start().await;
        mount_pages(
            &server,
            "/v2/top-headlines",
            ("category", "technology"),
            vec![articles("t", 5), articles("u", 3)],
        )
        .await;

        let connectivity: Arc<dyn Connectivity> = Arc::new(create_probe(&server));
        let coordinator = Coordinator::<Article>::new(
            "headlines",
            Arc::new(TopHeadlines(create_client(&server))),
            connectivity,
            MergePolicy::Append,
        );

        let first = coordinator.start("technology").await;
        assert_eq!(titles(&first).len(), 5);
        assert_eq!(coordinator.page().await, 2);

        let second = coordinator.fetch_next().await;
        let all = titles(&second);
        assert_eq!(all.len(), 8);
        assert_eq!(all[0], "t 1");
        assert_eq!(all[5], "u 1");
        assert_eq!(coordinator.page().await, 3);
        assert!(!coordinator.view().await.has_more);
    }

    #[tokio::test]
    async fn test_offline_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let connectivity: Arc<dyn Connectivity> = Arc::new(StaticConnectivity::offline());
        let coordinator = Coordinator::<Article>::new(
            "search",
            Arc::new(Everything(create_client(&server))),
            connectivity,
            MergePolicy::Append,
        );

        let status = coordinator.start("bitcoin").await;

        assert_eq!(status, FetchStatus::Error("No Internet Connection".to_string()));
        assert_eq!(coordinator.page().await, 1);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_http_error_keeps_accumulated_result() {
        let server = MockServer::start().await;
        mount_pages(&server, "/v2/everything", ("q", "rust"), vec![articles("r", 4)]).await;
        Mock::given(method("GET"))
            .and(path("/v2/everything"))
            .respond_with(ResponseTemplate::new(426).set_body_json(json!({
                "status": "error",
                "code": "parameterInvalid",
                "message": "You have requested too many results."
            })))
            .mount(&server)
            .await;

        let connectivity: Arc<dyn Connectivity> = Arc::new(StaticConnectivity::online());
        let coordinator = Coordinator::<Article>::new(
            "search",
            Arc::new(Everything(create_client(&server))),
            connectivity,
            MergePolicy::Append,
        );

        coordinator.start("rust").await;
        let status = coordinator.fetch_next().await;

        assert_eq!(
            status,
            FetchStatus::Error("You have requested too many results.".to_string())
        );
        let view = coordinator.view().await;
        assert_eq!(view.page, 2);
        assert_eq!(view.query.as_deref(), Some("rust"));
    }

    #[tokio::test]
    async fn test_search_close_restores_without_refetch() {
        let server = MockServer::start().await;
        mount_pages(
            &server,
            "/v2/everything",
            ("q", "a"),
            vec![articles("a", 5), articles("aa", 5)],
        )
        .await;
        mount_pages(&server, "/v2/everything", ("q", "b"), vec![articles("b", 2)]).await;

        let connectivity: Arc<dyn Connectivity> = Arc::new(StaticConnectivity::online());
        let coordinator = Coordinator::<Article>::new(
            "search",
            Arc::new(Everything(create_client(&server))),
            connectivity,
            MergePolicy::Append,
        );

        coordinator.start("a").await;
        coordinator.fetch_next().await;
        let before = coordinator.status();
        coordinator.snapshot().await;

        coordinator.start("b").await;
        assert_eq!(titles(&coordinator.status()).len(), 2);

        let requests_before_restore = server.received_requests().await.unwrap().len();
        assert!(coordinator.restore_snapshot().await);

        assert_eq!(coordinator.status(), before);
        assert_eq!(titles(&before).len(), 10);
        assert_eq!(coordinator.page().await, 3);
        assert_eq!(
            server.received_requests().await.unwrap().len(),
            requests_before_restore
        );
    }
}

#[cfg(test)]
mod api_end_to_end_tests {
    use super::common::*;
    use std::sync::Arc;

    use axum_test::TestServer;
    use newsdesk::client::{Everything, SourceDirectory, TopHeadlines};
    use newsdesk::connectivity::Connectivity;
    use newsdesk::coordinator::{Coordinator, MergePolicy};
    use newsdesk::db::Database;
    use newsdesk::models::{Article, Source};
    use newsdesk::routes::{router, AppState};
    use serde_json::{json, Value};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn create_test_server(news: &MockServer) -> TestServer {
        let db = Database::new("sqlite::memory:").await.unwrap();
        db.initialize().await.unwrap();

        let config = create_config(&news.uri());
        let client = create_client(news);
        let connectivity: Arc<dyn Connectivity> = Arc::new(create_probe(news));

        let state = Arc::new(AppState {
            db: Arc::new(db),
            headlines: Arc::new(Coordinator::<Article>::new(
                "headlines",
                Arc::new(TopHeadlines(client.clone())),
                connectivity.clone(),
                MergePolicy::Append,
            )),
            search: Arc::new(Coordinator::<Article>::new(
                "search",
                Arc::new(Everything(client.clone())),
                connectivity.clone(),
                MergePolicy::Append,
            )),
            sources: Arc::new(Coordinator::<Source>::new(
                "sources",
                Arc::new(SourceDirectory(client)),
                connectivity,
                MergePolicy::Replace,
            )),
            categories: config.categories.clone(),
            country: config.country.clone(),
        });

        TestServer::new(router(state)).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let news = MockServer::start().await;
        let server = create_test_server(&news).await;

        let response = server.get("/health").await;
        response.assert_status_ok();
        response.assert_text("OK");
    }

    #[tokio::test]
    async fn test_headlines_load_and_more() {
        let news = MockServer::start().await;
        mount_pages(
            &news,
            "/v2/top-headlines",
            ("category", "technology"),
            vec![articles("t", 5), articles("u", 3)],
        )
        .await;
        let server = create_test_server(&news).await;

        let body: Value = server.post("/headlines").await.json();
        assert_eq!(body["query"], "technology");
        assert_eq!(body["status"]["data"].as_array().unwrap().len(), 5);

        let body: Value = server.post("/headlines/more").await.json();
        assert_eq!(body["status"]["state"], "success");
        assert_eq!(body["status"]["data"].as_array().unwrap().len(), 8);
        assert_eq!(body["page"], 3);
        assert_eq!(body["has_more"], false);

        let body: Value = server.get("/headlines").await.json();
        assert_eq!(body["status"]["data"][7]["title"], "u 3");
    }

    #[tokio::test]
    async fn test_search_then_close() {
        let news = MockServer::start().await;
        mount_pages(
            &news,
            "/v2/everything",
            ("q", "a"),
            vec![articles("a", 5), articles("aa", 5)],
        )
        .await;
        mount_pages(&news, "/v2/everything", ("q", "b"), vec![articles("b", 1)]).await;
        let server = create_test_server(&news).await;

        server.post("/search").json(&json!({"query": "a"})).await;
        let before: Value = server.post("/search/more").await.json();
        assert_eq!(before["status"]["data"].as_array().unwrap().len(), 10);

        let during: Value = server.post("/search").json(&json!({"query": "b"})).await.json();
        assert_eq!(during["query"], "b");

        let after: Value = server.delete("/search").await.json();
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn test_sources_listing() {
        let news = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/sources"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok",
                "sources": [
                    {"id": "abc-news", "name": "ABC News", "category": "general", "country": "us"},
                    {"id": "wired", "name": "Wired", "category": "technology", "country": "us"}
                ]
            })))
            .expect(2)
            .mount(&news)
            .await;
        let server = create_test_server(&news).await;

        server.post("/sources").await;
        let body: Value = server.post("/sources").await.json();

        assert_eq!(body["status"]["data"].as_array().unwrap().len(), 2);
        assert_eq!(body["status"]["data"][1]["name"], "Wired");
        assert_eq!(body["page"], 1);
    }

    #[tokio::test]
    async fn test_saved_articles_and_ui_mode() {
        let news = MockServer::start().await;
        let server = create_test_server(&news).await;

        let article = &articles("s", 1)[0];
        server
            .post("/saved")
            .json(article)
            .await
            .assert_status(axum::http::StatusCode::CREATED);

        let saved: Value = server.get("/saved").await.json();
        assert_eq!(saved[0]["url"], "https://wire.example.com/s/1");

        server
            .put("/settings/ui-mode")
            .json(&json!({"dark_mode": true}))
            .await
            .assert_status_ok();
        let mode: Value = server.get("/settings/ui-mode").await.json();
        assert_eq!(mode["dark_mode"], true);
    }
}
