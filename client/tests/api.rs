use std::time::Duration;

use chat_client::api::{ApiClient, ApiError};
use chat_client::config::ClientConfig;
use chat_shared::{ConfigurationId, ConversationId, FeedbackKind, FeedbackRequest, MessageId, Role};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn client_for(server: &MockServer) -> ApiClient {
    ApiClient::new(&server.uri()).expect("client")
}

#[tokio::test]
async fn send_message_posts_json_and_decodes_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({ "message": "hello", "conversation_id": 3 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "hi there",
            "conversation_id": 3,
            "message_id": 17
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = client_for(&server)
        .await
        .send_message("hello", Some(ConversationId::new(3)))
        .await
        .expect("reply");

    assert_eq!(reply.response, "hi there");
    assert_eq!(reply.conversation_id, ConversationId::new(3));
    assert_eq!(reply.message_id, MessageId::new(17));
}

#[tokio::test]
async fn first_message_omits_conversation_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat"))
        .and(body_json(json!({ "message": "start" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "ok",
            "conversation_id": 1,
            "message_id": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server)
        .await
        .send_message("start", None)
        .await
        .expect("reply");
}

#[tokio::test]
async fn conversation_messages_decode_backend_timestamps() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/conversations/8/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 1, "role": "user", "content": "q", "created_at": "2024-05-01T10:00:00.250000" },
            { "id": 2, "role": "assistant", "content": "a", "created_at": "2024-05-01T10:00:01" }
        ])))
        .mount(&server)
        .await;

    let messages = client_for(&server)
        .await
        .conversation_messages(ConversationId::new(8))
        .await
        .expect("messages");

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].role, Role::Assistant);
    assert!(messages[0].created_at.is_some());
}

#[tokio::test]
async fn list_endpoints_decode_summaries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/conversations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": 4,
            "title": null,
            "created_at": "2024-05-01T10:00:00",
            "updated_at": "2024-05-02T10:00:00",
            "message_count": 6
        }])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/configurations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": 1,
            "name": "Friendly",
            "description": "Warm and casual",
            "version": 3,
            "is_active": true,
            "tags": ["casual"],
            "updated_at": "2024-05-01T10:00:00Z"
        }])))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let conversations = client.list_conversations().await.expect("conversations");
    let configurations = client.list_configurations().await.expect("configurations");

    assert_eq!(conversations[0].display_title(), "Untitled Conversation");
    assert_eq!(conversations[0].message_count, 6);
    assert_eq!(configurations[0].name, "Friendly");
    assert_eq!(configurations[0].version, 3);
}

#[tokio::test]
async fn feedback_and_activation_ignore_response_bodies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/feedback"))
        .and(body_json(json!({ "message_id": 5, "feedback_type": "thumbs_up" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "status": "recorded", "feedback_id": 1 })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/configurations/2/activate"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    client
        .submit_feedback(FeedbackRequest {
            message_id: MessageId::new(5),
            feedback_type: FeedbackKind::ThumbsUp,
        })
        .await
        .expect("feedback");
    client
        .activate_configuration(ConfigurationId::new(2))
        .await
        .expect("activate");
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/conversations/99/messages"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "detail": "Conversation not found" })),
        )
        .mount(&server)
        .await;

    let err = client_for(&server)
        .await
        .conversation_messages(ConversationId::new(99))
        .await
        .unwrap_err();

    match err {
        ApiError::Status { status, body, .. } => {
            assert_eq!(status.as_u16(), 404);
            assert!(body.contains("Conversation not found"));
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/configurations"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .await
        .list_configurations()
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Decode { .. }));
}

#[tokio::test]
async fn configured_timeout_bounds_a_hung_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let config = ClientConfig {
        base_url: server.uri(),
        request_timeout_secs: 1,
        ..ClientConfig::default()
    };
    let client = ApiClient::from_config(&config).expect("client");

    let err = client.send_message("anyone there?", None).await.unwrap_err();

    assert!(err.is_timeout(), "unexpected error: {err}");
}

#[tokio::test]
async fn health_is_served_outside_the_api_prefix() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "healthy" })))
        .mount(&server)
        .await;

    let health = client_for(&server).await.health().await.expect("health");

    assert!(health.is_healthy());
}
