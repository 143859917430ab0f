//! Background task lifecycle tests over the full engine stack.

use std::sync::Arc;
use std::time::Duration;

use easel_engine::{GeneratedImage, ImageGeneration, TaskEvent, TaskRunner, TaskState};
use wiremock::MockServer;

use crate::common::{
    StaticKeyStore, fast_settings, mock_client, mount_image_for_key, mount_slow_response_for_key,
    mount_unreachable,
};

async fn drain(runner: &mut TaskRunner<GeneratedImage>) -> Vec<TaskEvent<GeneratedImage>> {
    let mut events = Vec::new();
    while let Some(event) = runner.next_event().await {
        events.push(event);
    }
    events
}

fn terminal_count(events: &[TaskEvent<GeneratedImage>]) -> usize {
    events.iter().filter(|event| event.is_terminal()).count()
}

#[tokio::test]
async fn successful_generation_emits_progress_then_done() {
    let server = MockServer::start().await;
    mount_image_for_key(&server, "k-task-000001", b"PNGDATA").await;

    let store = Arc::new(StaticKeyStore::gemini(&["k-task-000001"]));
    let generation = ImageGeneration::new(Arc::<StaticKeyStore>::clone(&store), &fast_settings())
        .with_client(mock_client(&server));

    let mut runner = TaskRunner::new("Generating image");
    runner.start(async move { generation.run("a red square", None).await });

    let events = drain(&mut runner).await;

    assert_eq!(runner.state(), TaskState::Completed);
    assert_eq!(events.len(), 3);
    assert!(matches!(&events[0], TaskEvent::Progress(line) if line == "Generating image..."));
    assert!(matches!(&events[1], TaskEvent::Progress(line) if line == "Done!"));
    match &events[2] {
        TaskEvent::Done(image) => assert_eq!(image.bytes, b"PNGDATA"),
        other => panic!("expected Done, got {other:?}"),
    }
    assert_eq!(terminal_count(&events), 1);
}

#[tokio::test]
async fn missing_key_failure_directs_to_configuration() {
    let server = MockServer::start().await;
    mount_unreachable(&server).await;

    let store = Arc::new(StaticKeyStore::empty());
    let generation = ImageGeneration::new(Arc::<StaticKeyStore>::clone(&store), &fast_settings())
        .with_client(mock_client(&server));

    let mut runner = TaskRunner::new("Generating image");
    runner.start(async move { generation.run("a red square", None).await });

    let events = drain(&mut runner).await;

    assert_eq!(runner.state(), TaskState::Failed);
    assert_eq!(terminal_count(&events), 1);
    assert!(
        !events
            .iter()
            .any(|event| matches!(event, TaskEvent::Done(_)))
    );
    match events.last() {
        Some(TaskEvent::Failed(message)) => {
            assert!(message.contains("API key missing"));
            assert!(message.contains("config.toml"));
        }
        other => panic!("expected Failed last, got {other:?}"),
    }
}

#[tokio::test]
async fn timeout_failure_names_connectivity() {
    let server = MockServer::start().await;
    mount_slow_response_for_key(&server, "k-slow-000001", Duration::from_secs(3)).await;

    let store = Arc::new(StaticKeyStore::gemini(&["k-slow-000001"]));
    let generation = ImageGeneration::new(Arc::<StaticKeyStore>::clone(&store), &fast_settings())
        .with_client(mock_client(&server));

    let mut runner = TaskRunner::new("Generating image");
    runner.start(async move { generation.run("a red square", None).await });

    let events = drain(&mut runner).await;

    assert_eq!(runner.state(), TaskState::Failed);
    assert_eq!(terminal_count(&events), 1);
    match events.last() {
        Some(TaskEvent::Failed(message)) => {
            assert!(message.contains("Request timed out"));
            assert!(message.contains("network"));
        }
        other => panic!("expected Failed last, got {other:?}"),
    }
}
