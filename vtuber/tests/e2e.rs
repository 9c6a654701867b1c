//! End-to-end tests: controller, HTTP client and an in-process backend

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use llm_core::BackendClient;
use vtuber::{Attachment, ControllerState, MessageStatus, TurnOutcome};

use common::*;

#[tokio::test]
async fn test_turn_over_http() {
    let backend = spawn_backend(StatusCode::OK, &["안녕", "하세요!", " 무엇을", " 도와드릴까요?"]).await;
    let client = BackendClient::new(&backend.url()).unwrap();
    let (controller, engine, _actuator) = build_controller(Arc::new(client), None);

    let photo = Attachment::new("photo.png", "image/png", vec![1, 2, 3]).unwrap();
    let extra = Attachment::new("extra.png", "image/png", vec![4]).unwrap();
    let turn = controller.send("이거 봐", vec![photo, extra]).into_handle().unwrap();

    let outcome = turn.finished().await;
    let TurnOutcome::Completed(summary) = outcome else {
        panic!("turn did not complete: {outcome:?}");
    };
    assert_eq!(summary.text, "안녕하세요! 무엇을 도와드릴까요?");

    let transcript = controller.transcript();
    assert_eq!(transcript[1].text, summary.text);
    assert_eq!(transcript[1].status, MessageStatus::Complete);
    assert_eq!(transcript[0].attachments.len(), 2);
    assert_eq!(engine.spoken(), vec!["안녕하세요!", "무엇을 도와드릴까요?"]);

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].question.as_deref(), Some("이거 봐"));
    assert_eq!(requests[0].files, vec![("photo.png".to_string(), "image/png".to_string())]);
}

#[tokio::test]
async fn test_backend_error_lands_in_transcript() {
    let backend = spawn_backend(StatusCode::INTERNAL_SERVER_ERROR, &[]).await;
    let client = BackendClient::new(&backend.url()).unwrap();
    let (controller, engine, _actuator) = build_controller(Arc::new(client), None);

    let turn = controller.send("Hello!", Vec::new()).into_handle().unwrap();
    assert!(matches!(turn.finished().await, TurnOutcome::Failed(_)));

    let last = controller.transcript().pop().unwrap();
    assert_eq!(
        last.text,
        "An error occurred: Backend responded with status 500: backend exploded"
    );
    assert_eq!(last.status, MessageStatus::Failed);
    assert!(engine.spoken().is_empty());
    assert_eq!(controller.state(), ControllerState::Idle);
}
