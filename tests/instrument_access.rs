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
    let db_path = dir.path().join("test_instruments.db");
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

async fn register(app: &Router, name: &str, email: &str) -> Result<String> {
    let (status, body) = send(
        app,
        "POST",
        "/auth/register",
        None,
        Some(json!({"name": name, "email": email, "password": "password123"})),
    )
    .await?;
    anyhow::ensure!(status == StatusCode::CREATED, "register failed: {body}");
    let token = body["access_token"]
        .as_str()
        .context("missing access_token")?
        .to_string();
    Ok(token)
}

async fn create_portfolio(app: &Router, token: &str, name: &str, public: bool) -> Result<String> {
    let (status, body) = send(
        app,
        "POST",
        "/portfolios",
        Some(token),
        Some(json!({"name": name, "public": public})),
    )
    .await?;
    anyhow::ensure!(status == StatusCode::CREATED, "create portfolio failed: {body}");
    Ok(body["id"].as_str().context("missing id")?.to_string())
}

#[tokio::test]
async fn instruments_follow_portfolio_visibility() -> Result<()> {
    let (_dir, app) = setup().await?;
    let alice = register(&app, "Alice", "alice@example.com").await?;
    let bob = register(&app, "Bob", "bob@example.com").await?;

    let pid = create_portfolio(&app, &alice, "Holdings", false).await?;

    let (status, created) = send(
        &app,
        "POST",
        &format!("/portfolios/{pid}/instruments"),
        Some(&alice),
        Some(json!({"symbol": "MSFT", "name": "Microsoft"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    let iid = created["id"].as_str().context("missing id")?.to_string();

    // Private parent: the other user can neither list nor fetch.
    let (status, _) = send(
        &app,
        "GET",
        &format!("/portfolios/{pid}/instruments"),
        Some(&bob),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        "GET",
        &format!("/portfolios/{pid}/instruments/{iid}"),
        Some(&bob),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Make the parent public; reads open up, writes stay closed.
    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/portfolios/{pid}"),
        Some(&alice),
        Some(json!({"public": true})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, page) = send(
        &app,
        "GET",
        &format!("/portfolios/{pid}/instruments"),
        Some(&bob),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["totalResults"], 1);

    let (status, seen) = send(
        &app,
        "GET",
        &format!("/portfolios/{pid}/instruments/{iid}"),
        Some(&bob),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(seen["symbol"], "MSFT");

    let (status, _) = send(
        &app,
        "POST",
        &format!("/portfolios/{pid}/instruments"),
        Some(&bob),
        Some(json!({"symbol": "EVIL", "name": "Not yours"})),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/portfolios/{pid}/instruments/{iid}"),
        Some(&bob),
        Some(json!({"name": "Renamed"})),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/portfolios/{pid}/instruments/{iid}"),
        Some(&bob),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn owner_manages_instruments_end_to_end() -> Result<()> {
    let (_dir, app) = setup().await?;
    let alice = register(&app, "Alice", "alice2@example.com").await?;
    let pid = create_portfolio(&app, &alice, "Trading", false).await?;

    let (status, created) = send(
        &app,
        "POST",
        &format!("/portfolios/{pid}/instruments"),
        Some(&alice),
        Some(json!({"symbol": "NVDA", "name": "Nvidia"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    let iid = created["id"].as_str().context("missing id")?.to_string();
    assert_eq!(created["portfolio_id"], pid);

    let (status, updated) = send(
        &app,
        "PATCH",
        &format!("/portfolios/{pid}/instruments/{iid}"),
        Some(&alice),
        Some(json!({"name": "NVIDIA Corp"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "NVIDIA Corp");
    assert_eq!(updated["symbol"], "NVDA");

    // Empty body is rejected.
    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/portfolios/{pid}/instruments/{iid}"),
        Some(&alice),
        Some(json!({})),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/portfolios/{pid}/instruments/{iid}"),
        Some(&alice),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        "GET",
        &format!("/portfolios/{pid}/instruments/{iid}"),
        Some(&alice),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn instrument_lookup_is_scoped_to_its_portfolio() -> Result<()> {
    let (_dir, app) = setup().await?;
    let alice = register(&app, "Alice", "alice3@example.com").await?;

    let first = create_portfolio(&app, &alice, "First", false).await?;
    let second = create_portfolio(&app, &alice, "Second", false).await?;

    let (status, created) = send(
        &app,
        "POST",
        &format!("/portfolios/{first}/instruments"),
        Some(&alice),
        Some(json!({"symbol": "TSLA", "name": "Tesla"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    let iid = created["id"].as_str().context("missing id")?.to_string();

    // Same instrument id under the wrong portfolio is a miss.
    let (status, _) = send(
        &app,
        "GET",
        &format!("/portfolios/{second}/instruments/{iid}"),
        Some(&alice),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn instrument_listing_supports_symbol_filter() -> Result<()> {
    let (_dir, app) = setup().await?;
    let alice = register(&app, "Alice", "alice4@example.com").await?;
    let pid = create_portfolio(&app, &alice, "Filtered", false).await?;

    for (symbol, name) in [("AAPL", "Apple"), ("GOOG", "Alphabet"), ("AMZN", "Amazon")] {
        let (status, _) = send(
            &app,
            "POST",
            &format!("/portfolios/{pid}/instruments"),
            Some(&alice),
            Some(json!({"symbol": symbol, "name": name})),
        )
        .await?;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, page) = send(
        &app,
        "GET",
        &format!("/portfolios/{pid}/instruments?symbol=GOOG"),
        Some(&alice),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["totalResults"], 1);
    assert_eq!(page["results"][0]["name"], "Alphabet");

    Ok(())
}
