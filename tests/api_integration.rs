use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::util::ServiceExt;

use folio_api::create_app;

async fn setup() -> Result<(TempDir, Router)> {
    let dir = tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("test_api.db");
    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"),
    )
    .await?;
    migrator.run(&pool).await?;

    std::env::set_var("JWT_SECRET", "test-secret");
    let app = create_app(pool).await?;

    Ok((dir, app))
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    payload: Option<Value>,
) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match payload {
        Some(payload) => builder
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))?,
        None => builder.body(Body::empty())?,
    };

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), 10_485_760).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };

    Ok((status, value))
}

#[tokio::test]
async fn health_reports_database_status() -> Result<()> {
    let (_dir, app) = setup().await?;

    let (status, body) = send(&app, "GET", "/health", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["db_ok"], true);

    Ok(())
}

#[tokio::test]
async fn register_login_me_round_trip() -> Result<()> {
    let (_dir, app) = setup().await?;

    let (status, registered) = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({"name": "Flow", "email": "flow@example.com", "password": "password123"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(registered["user"]["email"], "flow@example.com");
    assert_eq!(registered["user"]["role"], "user");
    assert!(registered["user"].get("password_hash").is_none());

    let (status, logged_in) = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({"email": "flow@example.com", "password": "password123"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    let token = logged_in["access_token"].as_str().context("missing access_token")?;

    let (status, me) = send(&app, "GET", "/auth/me", Some(token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], registered["user"]["id"]);
    assert_eq!(me["name"], "Flow");

    Ok(())
}

#[tokio::test]
async fn listings_use_the_page_envelope() -> Result<()> {
    let (_dir, app) = setup().await?;

    let (status, registered) = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({"name": "Pager", "email": "pager@example.com", "password": "password123"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    let token = registered["access_token"]
        .as_str()
        .context("missing access_token")?
        .to_string();

    for i in 0..25 {
        let (status, _) = send(
            &app,
            "POST",
            "/portfolios",
            Some(&token),
            Some(json!({"name": format!("Portfolio {i:02}"), "public": false})),
        )
        .await?;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, page) = send(&app, "GET", "/portfolios?limit=10&page=2", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["page"], 2);
    assert_eq!(page["limit"], 10);
    assert_eq!(page["totalPages"], 3);
    assert_eq!(page["totalResults"], 25);
    assert_eq!(page["results"].as_array().context("results not an array")?.len(), 10);
    // Envelope keys are camelCase.
    assert!(page.get("total_results").is_none());

    // Past the last page: empty results, totals intact.
    let (status, page) = send(&app, "GET", "/portfolios?limit=10&page=9", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["results"].as_array().context("results not an array")?.len(), 0);
    assert_eq!(page["totalResults"], 25);

    Ok(())
}

#[tokio::test]
async fn sorting_is_validated_against_known_columns() -> Result<()> {
    let (_dir, app) = setup().await?;

    let (status, registered) = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({"name": "Sorter", "email": "sorter@example.com", "password": "password123"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    let token = registered["access_token"]
        .as_str()
        .context("missing access_token")?
        .to_string();

    for name in ["Charlie", "Alpha", "Bravo"] {
        let (status, _) = send(
            &app,
            "POST",
            "/portfolios",
            Some(&token),
            Some(json!({"name": name, "public": false})),
        )
        .await?;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, page) = send(&app, "GET", "/portfolios?sortBy=name:asc", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = page["results"]
        .as_array()
        .context("results not an array")?
        .iter()
        .filter_map(|p| p["name"].as_str())
        .collect();
    assert_eq!(names, vec!["Alpha", "Bravo", "Charlie"]);

    let (status, page) = send(&app, "GET", "/portfolios?sortBy=name:desc", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["results"][0]["name"], "Charlie");

    // Unknown column or direction is rejected rather than passed to SQL.
    let (status, _) = send(
        &app,
        "GET",
        "/portfolios?sortBy=password_hash:asc",
        Some(&token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/portfolios?sortBy=name:sideways", Some(&token), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn unknown_ids_are_not_found() -> Result<()> {
    let (_dir, app) = setup().await?;

    let (status, registered) = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({"name": "Misser", "email": "misser@example.com", "password": "password123"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    let token = registered["access_token"]
        .as_str()
        .context("missing access_token")?
        .to_string();

    let ghost = uuid::Uuid::new_v4();
    let (status, body) = send(&app, "GET", &format!("/portfolios/{ghost}"), Some(&token), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, _) = send(
        &app,
        "GET",
        &format!("/portfolios/{ghost}/instruments"),
        Some(&token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}
