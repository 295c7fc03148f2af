use std::time::{Duration, Instant};

use storefront_api::{config::Config, error::StartupError, server};

fn config(pairs: &[(&str, &str)]) -> Config {
    Config::from_iter(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string())),
    )
    .expect("valid test config")
}

#[tokio::test]
async fn invalid_database_uri_fails_startup() {
    let config = config(&[
        ("ATLAS_URI", "definitely not a uri"),
        ("STRIPE_PRIVATE_KEY", "sk_test_123"),
        ("PORT", "0"),
    ]);

    let err = server::run(config).await.unwrap_err();
    let startup = err
        .downcast_ref::<StartupError>()
        .expect("startup error");
    assert!(matches!(startup, StartupError::InvalidConfiguration(_)));
}

#[tokio::test]
async fn unreachable_database_fails_within_budget() {
    let config = config(&[
        ("ATLAS_URI", "mongodb://127.0.0.1:1/?directConnection=true"),
        ("STRIPE_PRIVATE_KEY", "sk_test_123"),
        ("PORT", "0"),
        ("DB_CONNECT_ATTEMPTS", "1"),
        ("DB_CONNECT_TIMEOUT_MS", "200"),
    ]);

    let started = Instant::now();
    let err = server::run(config).await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<StartupError>(),
        Some(StartupError::DatabaseConnectFailure { attempts: 1, .. })
    ));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn missing_payment_key_is_reported_by_name() {
    let err = Config::from_iter([(
        "ATLAS_URI".to_string(),
        "mongodb://localhost:27017".to_string(),
    )])
    .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Missing required configuration: STRIPE_PRIVATE_KEY"
    );
}
