//! Endpoint tests against the full router over a temporary SQLite store

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use outreach_tracker::config::AppConfig;
use outreach_tracker::notify::DisabledNotifier;
use outreach_tracker::routes::PIXEL_GIF;
use outreach_tracker::store::SqliteStore;
use outreach_tracker::{router, AppState, TrackingService};

struct TestApp {
    router: Router,
    dir: tempfile::TempDir,
}

impl TestApp {
    async fn new() -> Self {
        Self::build(true).await
    }

    async fn without_schema() -> Self {
        Self::build(false).await
    }

    async fn build(setup: bool) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteStore::new(dir.path().join("tracking.db"), 5000));
        let service = TrackingService::new(store, Arc::new(DisabledNotifier), Duration::from_secs(1));
        if setup {
            service.setup().await.unwrap();
        }

        let mut config = AppConfig::default();
        config.dashboard.template_path = dir.path().join("dashboard.html").display().to_string();

        Self {
            router: router(AppState::new(config, service)),
            dir,
        }
    }

    fn db_path(&self) -> std::path::PathBuf {
        self.dir.path().join("tracking.db")
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body.to_vec())
    }

    async fn get(&self, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
        let (status, _, body) = self.get(uri).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn post(&self, content_type: &str, body: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let request = Request::post("/formulario")
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }
}

fn multipart_body(boundary: &str, fields: &[(&str, &str)]) -> String {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    body.push_str(&format!("--{boundary}--\r\n"));
    body
}

#[tokio::test]
async fn pixel_is_served_and_recorded() {
    let app = TestApp::new().await;

    let request = Request::get("/track/acme-corp_1712345678.gif")
        .header("x-forwarded-for", "203.0.113.50, 10.0.0.1")
        .header(header::USER_AGENT, "Mozilla/5.0 (Mail)")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "image/gif");
    assert_eq!(
        headers[header::CACHE_CONTROL],
        "no-cache, no-store, must-revalidate"
    );
    assert_eq!(body, PIXEL_GIF.to_vec());
    assert_eq!(body.len(), 43);

    let (status, stats) = app.get_json("/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_aperturas"], 1);
    let open = &stats["aperturas"][0];
    assert_eq!(open["email_id"], "acme-corp_1712345678");
    assert_eq!(open["institucion"], "Acme Corp");
    assert_eq!(open["ip"], "203.0.113.50");
    assert_eq!(open["user_agent"], "Mozilla/5.0 (Mail)");
    assert!(open["timestamp"].as_str().is_some());
}

#[tokio::test]
async fn pixel_requires_gif_suffix() {
    let app = TestApp::new().await;

    let (status, _, _) = app.get("/track/acme_1.png").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _, _) = app.get("/track/.gif").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, stats) = app.get_json("/stats").await;
    assert_eq!(stats["total_aperturas"], 0);
}

#[tokio::test]
async fn stats_over_several_opens() {
    let app = TestApp::new().await;
    for identifier in ["acme_1", "acme_2", "beta_1"] {
        let (status, _, _) = app.get(&format!("/track/{identifier}.gif")).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, stats) = app.get_json("/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_aperturas"], 3);
    assert_eq!(stats["emails_unicos"], 3);
    assert_eq!(stats["promedio_aperturas"], 1.0);
    assert_eq!(stats["aperturas"][0]["email_id"], "beta_1");
    assert_eq!(stats["aperturas"][0]["ip"], "");
}

#[tokio::test]
async fn empty_stats_have_zero_average() {
    let app = TestApp::new().await;

    let (status, stats) = app.get_json("/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_aperturas"], 0);
    assert_eq!(stats["emails_unicos"], 0);
    assert_eq!(stats["promedio_aperturas"], 0.0);
    assert_eq!(stats["aperturas"], Value::Array(Vec::new()));
}

#[tokio::test]
async fn json_submission_gets_json_reply() {
    let app = TestApp::new().await;

    let (status, headers, body) = app
        .post(
            "application/json",
            r#"{"nombre": "Ana", "email": "ana@example.org", "institucion": "ITSE", "telefono": 60001234}"#,
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("application/json"));
    let reply: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(reply["success"], true);
    assert!(reply["message"].as_str().is_some());
}

#[tokio::test]
async fn form_submission_gets_confirmation_page() {
    let app = TestApp::new().await;

    let (status, headers, body) = app
        .post(
            "application/x-www-form-urlencoded",
            "nombre=Ana+P%C3%A9rez&institucion=ITSE&dia=martes",
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    let page = String::from_utf8(body).unwrap();
    assert!(page.contains("Ana Pérez"));
    assert!(page.contains("ITSE"));
}

#[tokio::test]
async fn json_and_form_store_identical_rows() {
    let app = TestApp::new().await;

    app.post(
        "application/json",
        r#"{"nombre": "Luis", "email": "luis@example.org", "institucion": "UTP", "dia": "jueves", "horario": "tarde"}"#,
    )
    .await;
    app.post(
        "application/x-www-form-urlencoded",
        "nombre=Luis&email=luis%40example.org&institucion=UTP&dia=jueves&horario=tarde",
    )
    .await;
    app.post(
        "multipart/form-data; boundary=outreach-boundary",
        &multipart_body(
            "outreach-boundary",
            &[
                ("nombre", "Luis"),
                ("email", "luis@example.org"),
                ("institucion", "UTP"),
                ("dia", "jueves"),
                ("horario", "tarde"),
            ],
        ),
    )
    .await;

    let conn = rusqlite::Connection::open(app.db_path()).unwrap();
    let mut statement = conn
        .prepare(
            "SELECT contact_name, contact_email, organization, phone, preferred_day, preferred_window
             FROM contact_submissions ORDER BY id",
        )
        .unwrap();
    let rows: Vec<[Option<String>; 6]> = statement
        .query_map([], |row| {
            Ok([
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
            ])
        })
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0], rows[1]);
    assert_eq!(rows[0], rows[2]);
    assert_eq!(rows[0][0].as_deref(), Some("Luis"));
    assert_eq!(rows[0][3], None);
}

#[tokio::test]
async fn multipart_submission_gets_confirmation_page() {
    let app = TestApp::new().await;

    let (status, _, body) = app
        .post(
            "multipart/form-data; boundary=XX",
            &multipart_body("XX", &[("nombre", "Ana"), ("institucion", "ITSE")]),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body).unwrap().contains("Ana"));

    let conn = rusqlite::Connection::open(app.db_path()).unwrap();
    let row: (Option<String>, Option<String>) = conn
        .query_row(
            "SELECT contact_name, organization FROM contact_submissions",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(row.0.as_deref(), Some("Ana"));
    assert_eq!(row.1.as_deref(), Some("ITSE"));
}

#[tokio::test]
async fn unreadable_submission_is_stored_empty() {
    let app = TestApp::new().await;

    let (status, _, body) = app.post("application/json", "{\"nombre\": ").await;
    assert_eq!(status, StatusCode::OK);
    let reply: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(reply["success"], true);

    let conn = rusqlite::Connection::open(app.db_path()).unwrap();
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM contact_submissions WHERE contact_name IS NULL",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn storage_failure_is_a_server_error() {
    let app = TestApp::without_schema().await;

    let (status, stats) = app.get_json("/stats").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(stats["success"], false);

    let (status, _, body) = app.post("application/json", r#"{"nombre": "Ana"}"#).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let reply: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(reply["success"], false);
    assert!(reply["message"].as_str().is_some());

    let (status, _, _) = app.get("/track/acme_1.gif").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn setup_db_is_idempotent() {
    let app = TestApp::without_schema().await;

    for _ in 0..2 {
        let (status, reply) = app.get_json("/setup-db").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["success"], true);
    }

    let (status, _) = app.get_json("/stats").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn health_reports_database_kind() {
    let app = TestApp::new().await;

    let (status, health) = app.get_json("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "ok");
    assert_eq!(health["database"], "sqlite");
    assert_eq!(health["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn dashboard_serves_template_file() {
    let app = TestApp::new().await;

    let (status, _, _) = app.get("/").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    std::fs::write(
        app.dir.path().join("dashboard.html"),
        "<html><body>panel</body></html>",
    )
    .unwrap();

    let (status, headers, body) = app.get("/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    assert_eq!(body, b"<html><body>panel</body></html>".to_vec());
}
