use std::{path::Path, sync::Arc};

use serde_json::{Value, json};
use storefront_api::{
    config::Config,
    error::RATE_LIMIT_MESSAGE,
    payments::PaymentClient,
    server::{self, AppState, build_app, rate_limiter},
    store::MemoryStore,
};
use tempfile::TempDir;
use tokio::task::JoinHandle;

struct TestApp {
    addr: String,
    handle: JoinHandle<()>,
    // Keeps the static root alive for the lifetime of the server
    _public: TempDir,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn test_config(public_dir: &Path, extra: &[(&str, &str)]) -> Config {
    let mut pairs = vec![
        ("ATLAS_URI".to_string(), "mongodb://localhost:27017/test".to_string()),
        ("STRIPE_PRIVATE_KEY".to_string(), "sk_test_123".to_string()),
        ("PUBLIC_DIR".to_string(), public_dir.join("public").display().to_string()),
    ];
    pairs.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    Config::from_iter(pairs).expect("valid test config")
}

async fn spawn_app(extra: &[(&str, &str)]) -> TestApp {
    let root = tempfile::tempdir().expect("temp dir");
    let public = root.path().join("public");
    std::fs::create_dir(&public).unwrap();
    std::fs::write(public.join("index.html"), "<h1>storefront</h1>").unwrap();
    std::fs::write(public.join("styles.css"), "body { margin: 0; }").unwrap();
    // Outside the public directory; must never be served
    std::fs::write(root.path().join("secret.txt"), "top secret").unwrap();

    let config = test_config(root.path(), extra);
    let payments = PaymentClient::new(&config.stripe_private_key, config.request_timeout())
        .expect("payment client");
    let state = AppState::new(Arc::new(MemoryStore::new()), payments);
    let app = build_app(state, &config, rate_limiter(&config)).expect("build app");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = format!("http://{}", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
        server::serve(listener, app, std::future::pending())
            .await
            .expect("server run");
    });

    TestApp {
        addr,
        handle,
        _public: root,
    }
}

#[tokio::test]
async fn hundred_and_first_request_in_window_is_rejected() {
    let app = spawn_app(&[]).await;
    let client = reqwest::Client::new();

    for i in 0..100 {
        let res = client
            .get(format!("{}/cart", app.addr))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::OK, "request {}", i + 1);
    }

    let res = client
        .get(format!("{}/cart", app.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = res.headers()["retry-after"]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after > 0 && retry_after <= 600);
    assert_eq!(res.text().await.unwrap(), RATE_LIMIT_MESSAGE);
}

#[tokio::test]
async fn rate_limited_responses_stay_readable_cross_origin() {
    let app = spawn_app(&[("RATE_LIMIT_MAX", "1")]).await;
    let client = reqwest::Client::new();

    let mut statuses = Vec::new();
    for _ in 0..2 {
        let res = client
            .get(format!("{}/cart", app.addr))
            .header("origin", "http://localhost:3000")
            .send()
            .await
            .unwrap();
        assert_eq!(
            res.headers()["access-control-allow-origin"],
            "http://localhost:3000"
        );
        statuses.push(res.status());
    }

    assert_eq!(
        statuses,
        [reqwest::StatusCode::OK, reqwest::StatusCode::TOO_MANY_REQUESTS]
    );
}

#[tokio::test]
async fn trusted_proxy_hops_are_limited_separately() {
    let app = spawn_app(&[("RATE_LIMIT_MAX", "1"), ("TRUST_PROXY", "true")]).await;
    let client = reqwest::Client::new();

    let get_as = |hop: &'static str| {
        client
            .get(format!("{}/reviews", app.addr))
            .header("x-forwarded-for", format!("{hop}, 10.0.0.1"))
            .send()
    };

    assert_eq!(get_as("203.0.113.7").await.unwrap().status(), 200);
    assert_eq!(get_as("203.0.113.7").await.unwrap().status(), 429);
    assert_eq!(get_as("203.0.113.8").await.unwrap().status(), 200);
}

#[tokio::test]
async fn forwarded_header_is_ignored_without_trusted_proxy() {
    let app = spawn_app(&[("RATE_LIMIT_MAX", "1")]).await;
    let client = reqwest::Client::new();

    for (hop, expected) in [("203.0.113.7", 200), ("203.0.113.8", 429)] {
        let res = client
            .get(format!("{}/reviews", app.addr))
            .header("x-forwarded-for", hop)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), expected, "{hop}");
    }
}

#[tokio::test]
async fn allowed_responses_report_remaining_budget() {
    let app = spawn_app(&[("RATE_LIMIT_MAX", "5")]).await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/favorites", app.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["ratelimit-limit"], "5");
    assert_eq!(res.headers()["ratelimit-remaining"], "4");
}

#[tokio::test]
async fn user_prefixes_route_by_specificity() {
    let app = spawn_app(&[]).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/user/login", app.addr))
        .json(&json!({ "email": "ada@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::CREATED);
    let login: Value = res.json().await.unwrap();
    let login_id = login["_id"].as_str().unwrap().to_string();

    let res = client
        .post(format!("{}/user/password-reset", app.addr))
        .json(&json!({ "email": "ada@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::CREATED);
    let reset: Value = res.json().await.unwrap();
    let reset_id = reset["_id"].as_str().unwrap().to_string();

    // Nothing reached the registration group
    let users: Vec<Value> = client
        .get(format!("{}/user", app.addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(users.is_empty());

    let res = client
        .get(format!("{}/user/login/{}", app.addr, login_id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::OK);

    let res = client
        .get(format!("{}/user/password-reset/{}", app.addr, reset_id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::OK);

    let res = client
        .get(format!("{}/user/{}", app.addr, login_id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["code"], "document_not_found");

    let logins: Vec<Value> = client
        .get(format!("{}/user/login", app.addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(logins.len(), 1);
}

#[tokio::test]
async fn json_body_reaches_the_route_group() {
    let app = spawn_app(&[]).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/cart", app.addr))
        .json(&json!({ "sku": "A-1", "quantity": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::CREATED);
    let created: Value = res.json().await.unwrap();
    assert_eq!(created["data"]["sku"], "A-1");
    assert_eq!(created["data"]["quantity"], 2);

    let id = created["_id"].as_str().unwrap();
    let fetched: Value = client
        .get(format!("{}/cart/{}", app.addr, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn form_body_is_parsed() {
    let app = spawn_app(&[]).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/reviews", app.addr))
        .form(&[("rating", "5"), ("comment", "great tea")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::CREATED);
    let created: Value = res.json().await.unwrap();
    assert_eq!(created["data"]["rating"], "5");
    assert_eq!(created["data"]["comment"], "great tea");
}

#[tokio::test]
async fn bodyless_post_creates_an_empty_document() {
    let app = spawn_app(&[]).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/cart", app.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::CREATED);
    let created: Value = res.json().await.unwrap();
    assert_eq!(created["data"], json!({}));
}

#[tokio::test]
async fn malformed_json_is_a_client_error_and_server_keeps_serving() {
    let app = spawn_app(&[]).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/delivery", app.addr))
        .header("content-type", "application/json")
        .body("{\"address\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["code"], "malformed_request_body");

    let res = client
        .post(format!("{}/delivery", app.addr))
        .header("content-type", "text/plain")
        .body("address")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let res = client
        .get(format!("{}/delivery", app.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::OK);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let app = spawn_app(&[("BODY_LIMIT_BYTES", "64")]).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/storeAdmin", app.addr))
        .json(&json!({ "notes": "x".repeat(256) }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn delete_removes_once() {
    let app = spawn_app(&[]).await;
    let client = reqwest::Client::new();

    let created: Value = client
        .post(format!("{}/favorites", app.addr))
        .json(&json!({ "product_id": "sku-9" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = created["_id"].as_str().unwrap();

    let res = client
        .delete(format!("{}/favorites/{}", app.addr, id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::NO_CONTENT);

    let res = client
        .delete(format!("{}/favorites/{}", app.addr, id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unmounted_paths_fall_through_to_static_files() {
    let app = spawn_app(&[]).await;
    let client = reqwest::Client::new();

    let res = client.get(format!("{}/", app.addr)).send().await.unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::OK);
    assert!(
        res.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/html")
    );
    assert_eq!(res.text().await.unwrap(), "<h1>storefront</h1>");

    let res = client
        .get(format!("{}/styles.css", app.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::OK);
    assert!(
        res.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/css")
    );

    for res in [
        client.get(format!("{}/nowhere", app.addr)).send().await.unwrap(),
        client.post(format!("{}/nowhere", app.addr)).send().await.unwrap(),
    ] {
        assert_eq!(res.status(), reqwest::StatusCode::NOT_FOUND);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error"]["code"], "route_not_found");
    }
}

#[tokio::test]
async fn static_files_cannot_escape_the_public_directory() {
    let app = spawn_app(&[]).await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/..%2Fsecret.txt", app.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::NOT_FOUND);
    assert!(!res.text().await.unwrap().contains("top secret"));
}

#[tokio::test]
async fn responses_carry_one_cors_policy_and_security_headers() {
    let app = spawn_app(&[]).await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/cart", app.addr))
        .header("origin", "http://evil.example")
        .send()
        .await
        .unwrap();
    let headers = res.headers();
    assert_eq!(headers["access-control-allow-origin"], "http://localhost:3000");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert!(
        headers["content-security-policy"]
            .to_str()
            .unwrap()
            .starts_with("default-src 'self'")
    );
    assert!(headers.get("server").is_none());
    assert!(headers.get("x-powered-by").is_none());

    let res = client
        .request(reqwest::Method::OPTIONS, format!("{}/cart", app.addr))
        .header("origin", "http://localhost:3000")
        .header("access-control-request-method", "DELETE")
        .header("access-control-request-headers", "content-type, authorization")
        .send()
        .await
        .unwrap();
    assert!(res.status().is_success());
    let headers = res.headers();
    assert_eq!(headers["access-control-allow-origin"], "http://localhost:3000");

    let methods = headers["access-control-allow-methods"].to_str().unwrap();
    for method in ["GET", "POST", "DELETE"] {
        assert!(methods.contains(method), "{methods}");
    }
    assert!(!methods.contains("PUT"));

    let allowed_headers = headers["access-control-allow-headers"]
        .to_str()
        .unwrap()
        .to_ascii_lowercase();
    assert!(allowed_headers.contains("content-type"));
    assert!(allowed_headers.contains("authorization"));
}

#[tokio::test]
async fn security_headers_stage_can_be_disabled() {
    let app = spawn_app(&[("SECURITY_HEADERS", "false")]).await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/reviews", app.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::OK);
    assert!(res.headers().get("x-frame-options").is_none());
    // CORS is independent of the security-header stage
    assert_eq!(
        res.headers()["access-control-allow-origin"],
        "http://localhost:3000"
    );
}

#[tokio::test]
async fn health_reports_connected_store() {
    let app = spawn_app(&[]).await;

    let body: Value = reqwest::get(format!("{}/health", app.addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
}
