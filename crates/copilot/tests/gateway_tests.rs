mod common;

use std::sync::Arc;

use common::test_board;
use copilot::app::{Action, Copilot};
use copilot::controller::ASK_FAILED;
use copilot::gateway::{Attachment, Endpoint, Gateway, HttpGateway, Payload, Request};
use copilot::history::ExchangeState;
use copilot::notify::{NoticeBoard, Severity};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, header_regex, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gateway_for(server: &MockServer) -> (HttpGateway, Arc<NoticeBoard>) {
    let board = test_board();
    (HttpGateway::new(&server.uri(), board.clone()), board)
}

#[tokio::test]
async fn ask_encodes_question_and_parses_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ask"))
        .and(query_param("question", "What is VaR & CVaR?"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"answer": "Risk"})))
        .expect(1)
        .mount(&server)
        .await;

    let (gateway, board) = gateway_for(&server);
    let payload = gateway
        .call(Request::get(Endpoint::Ask).with_query("question", "What is VaR & CVaR?"))
        .await
        .unwrap();

    assert_eq!(payload, Payload::Json(json!({"answer": "Risk"})));
    assert!(board.active().is_empty());
}

#[tokio::test]
async fn non_json_success_is_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let (gateway, _board) = gateway_for(&server);
    let payload = gateway.call(Request::get(Endpoint::Health)).await.unwrap();

    assert_eq!(payload, Payload::Text("ok".into()));
}

#[tokio::test]
async fn error_detail_becomes_message_and_single_notice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload_pdf"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"detail": "Only PDF files are supported."})),
        )
        .mount(&server)
        .await;

    let (gateway, board) = gateway_for(&server);
    let failure = gateway
        .call(Request::post(Endpoint::Upload))
        .await
        .unwrap_err();

    assert_eq!(failure.message, "Only PDF files are supported.");
    assert_eq!(failure.status, Some(400));
    let notices = board.active();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].message, "Only PDF files are supported.");
    assert_eq!(notices[0].severity, Severity::Error);
}

#[tokio::test]
async fn plain_text_error_body_is_used_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stats"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error\n"))
        .mount(&server)
        .await;

    let (gateway, _board) = gateway_for(&server);
    let failure = gateway.call(Request::get(Endpoint::Stats)).await.unwrap_err();

    assert_eq!(failure.message, "Internal Server Error");
}

#[tokio::test]
async fn empty_error_body_falls_back_to_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rebuild"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let (gateway, _board) = gateway_for(&server);
    let failure = gateway
        .call(Request::post(Endpoint::Rebuild))
        .await
        .unwrap_err();

    assert_eq!(failure.message, "Request failed (503)");
    assert_eq!(failure.status, Some(503));
}

#[tokio::test]
async fn malformed_json_success_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{not json", "application/json"))
        .mount(&server)
        .await;

    let (gateway, board) = gateway_for(&server);
    let failure = gateway.call(Request::get(Endpoint::Stats)).await.unwrap_err();

    assert!(failure.message.starts_with("Invalid JSON from stats"));
    assert_eq!(board.active().len(), 1);
}

#[tokio::test]
async fn unreachable_server_is_a_transport_failure() {
    // Reserve a free port, then close it so connections are refused.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let board = test_board();
    let gateway = HttpGateway::new(&format!("http://{addr}"), board.clone());
    let failure = gateway.call(Request::get(Endpoint::Health)).await.unwrap_err();

    assert_eq!(failure.status, None);
    assert!(failure.message.contains("/health"));
    assert_eq!(board.active().len(), 1);
}

#[tokio::test]
async fn upload_sends_multipart_file_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload_pdf"))
        .and(header_regex("content-type", "^multipart/form-data; boundary="))
        .and(body_string_contains("name=\"file\"; filename=\"report.pdf\""))
        .and(body_string_contains("%PDF-1.4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"chunk_count": 12})))
        .expect(1)
        .mount(&server)
        .await;

    let (gateway, _board) = gateway_for(&server);
    let attachment = Attachment::new("report.pdf", "application/pdf", b"%PDF-1.4".to_vec());
    let payload = gateway
        .call(Request::post(Endpoint::Upload).with_attachment(attachment))
        .await
        .unwrap();

    assert_eq!(payload.field("chunk_count"), Some(&json!(12)));
}

#[tokio::test]
async fn trailing_slash_in_base_url_is_ignored() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let board = test_board();
    let gateway = HttpGateway::new(&format!("{}/", server.uri()), board);
    assert_eq!(gateway.base_url(), server.uri());
    gateway.call(Request::get(Endpoint::Stats)).await.unwrap();
}

#[tokio::test]
async fn failed_ask_is_reported_once_and_settles_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ask"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"detail": "LLM unavailable"})))
        .mount(&server)
        .await;

    let board = test_board();
    let gateway = HttpGateway::new(&server.uri(), board.clone());
    let copilot = Copilot::new(Arc::new(gateway), board);

    let outcome = copilot.dispatch(Action::Ask("Capital of France?".into())).await;
    assert!(!outcome.is_success());

    let snapshot = copilot.snapshot().await;
    assert_eq!(snapshot.exchanges[0].state(), ExchangeState::Failed);
    assert_eq!(snapshot.exchanges[0].answer(), Some(ASK_FAILED));
    assert_eq!(snapshot.notices.len(), 1);
    assert_eq!(snapshot.notices[0].message, "LLM unavailable");
}
