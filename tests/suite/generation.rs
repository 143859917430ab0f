//! End-to-end dispatch tests: key rotation over a mock Gemini endpoint.

use std::sync::Arc;
use std::time::Duration;

use easel_engine::{ImageGeneration, TaskError};
use wiremock::MockServer;

use crate::common::{
    LogCapture, StaticKeyStore, fast_settings, mock_client, mount_image, mount_image_for_key,
    mount_slow_response_for_key, mount_status_for_key, mount_unreachable,
};

#[tokio::test]
async fn first_key_success_skips_rotation() {
    let server = MockServer::start().await;
    mount_image_for_key(&server, "k-first-000001", b"PNGDATA").await;

    let store = Arc::new(StaticKeyStore::gemini(&["k-first-000001", "k-spare-000002"]));
    let generation = ImageGeneration::new(Arc::<StaticKeyStore>::clone(&store), &fast_settings())
        .with_client(mock_client(&server));
    let logs = LogCapture::new();
    let capture = |line: &str| logs.push(line);

    let image = generation
        .run("a red square", Some(&capture))
        .await
        .unwrap();

    assert_eq!(image.bytes, b"PNGDATA");
    assert_eq!(image.mime_type, "image/png");
    assert_eq!(logs.wait_count(), 0);
    assert!(logs.lines().iter().any(|l| l == "Found 2 Gemini API keys"));
}

#[tokio::test]
async fn timed_out_key_rotates_to_the_next() {
    let server = MockServer::start().await;
    mount_slow_response_for_key(&server, "k-slow-000001", Duration::from_secs(3)).await;
    mount_image_for_key(&server, "k-fast-000002", b"PNGDATA").await;

    let store = Arc::new(StaticKeyStore::gemini(&["k-slow-000001", "k-fast-000002"]));
    let generation = ImageGeneration::new(Arc::<StaticKeyStore>::clone(&store), &fast_settings())
        .with_client(mock_client(&server));
    let logs = LogCapture::new();
    let capture = |line: &str| logs.push(line);

    let image = generation
        .run("a red square", Some(&capture))
        .await
        .unwrap();

    assert_eq!(image.bytes, b"PNGDATA");
    assert_eq!(logs.wait_count(), 1);
    let joined = logs.lines().join("\n");
    assert!(joined.contains("Key 1/2 failed"));
    assert!(joined.contains("Key 2/2 succeeded"));
}

#[tokio::test]
async fn exhausted_pool_reports_the_last_api_error() {
    let server = MockServer::start().await;
    mount_status_for_key(&server, "k-one-000001", 500, r#"{"error":"backend down"}"#).await;
    mount_status_for_key(&server, "k-two-000002", 503, r#"{"error":"overloaded"}"#).await;

    let store = Arc::new(StaticKeyStore::gemini(&["k-one-000001", "k-two-000002"]));
    let generation = ImageGeneration::new(Arc::<StaticKeyStore>::clone(&store), &fast_settings())
        .with_client(mock_client(&server));
    let logs = LogCapture::new();
    let capture = |line: &str| logs.push(line);

    let err = generation
        .run("a red square", Some(&capture))
        .await
        .unwrap_err();

    match err {
        TaskError::Other { kind, detail } => {
            assert_eq!(kind, "ApiError");
            assert!(detail.contains("all 2 API keys failed"));
            assert!(detail.contains("overloaded"));
        }
        other => panic!("expected Other, got {other:?}"),
    }
    assert_eq!(logs.wait_count(), 1);
}

#[tokio::test]
async fn empty_pool_fails_without_any_request() {
    let server = MockServer::start().await;
    mount_unreachable(&server).await;

    let store = Arc::new(StaticKeyStore::empty());
    let generation = ImageGeneration::new(Arc::<StaticKeyStore>::clone(&store), &fast_settings())
        .with_client(mock_client(&server));

    let err = generation.run("a red square", None).await.unwrap_err();

    assert_eq!(err, TaskError::MissingApiKey);
    assert_eq!(store.refresh_count(), 1);
}

#[tokio::test]
async fn every_run_refreshes_the_store() {
    let server = MockServer::start().await;
    mount_image(&server, b"PNGDATA").await;

    let store = Arc::new(StaticKeyStore::gemini(&["k-only-000001"]));
    let generation = ImageGeneration::new(Arc::<StaticKeyStore>::clone(&store), &fast_settings())
        .with_client(mock_client(&server));

    generation.run("first prompt", None).await.unwrap();
    generation.run("second prompt", None).await.unwrap();

    assert_eq!(store.refresh_count(), 2);
}

#[tokio::test]
async fn all_keys_timing_out_classifies_as_timeout() {
    let server = MockServer::start().await;
    mount_slow_response_for_key(&server, "k-slow-000001", Duration::from_secs(3)).await;

    let store = Arc::new(StaticKeyStore::gemini(&["k-slow-000001"]));
    let generation = ImageGeneration::new(Arc::<StaticKeyStore>::clone(&store), &fast_settings())
        .with_client(mock_client(&server));

    let err = generation.run("a red square", None).await.unwrap_err();

    match err {
        TaskError::Timeout(detail) => assert!(detail.contains("all 1 API keys failed")),
        other => panic!("expected Timeout, got {other:?}"),
    }
}
