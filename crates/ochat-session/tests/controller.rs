//! End-to-end controller tests against a mock proxy.

use std::sync::Arc;
use std::time::Duration;

use ochat_ai::{Message, StreamClient, error::CONNECTION_FAILED_MESSAGE};
use ochat_session::{ChatController, FailureKind, HttpTransport, SessionState, SubmitOutcome};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn controller_for(uri: &str) -> ChatController {
    ChatController::new(Arc::new(HttpTransport::new(StreamClient::new(uri))))
}

#[tokio::test]
async fn streamed_reply_lands_in_bot_message() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "{\"response\":\"The answer \"}\n\n{\"response\":\"is 4.\"}\n{\"done\":true}\n",
        ))
        .mount(&mock_server)
        .await;

    let mut ctl = controller_for(&mock_server.uri());
    let outcome = ctl.submit("2+2?").await;

    assert_eq!(outcome, SubmitOutcome::Finished(SessionState::Completed));
    assert_eq!(
        ctl.messages(),
        &[Message::user("2+2?"), Message::bot("The answer is 4.")]
    );
    assert!(ctl.error().is_none());
}

#[tokio::test]
async fn multibyte_character_survives_the_wire() {
    let mock_server = MockServer::start().await;
    let body = "{\"response\":\"π ≈ 3.14159 ✓\"}\n";
    Mock::given(method("POST"))
        .and(path("/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.as_bytes().to_vec()))
        .mount(&mock_server)
        .await;

    let mut ctl = controller_for(&mock_server.uri());
    ctl.submit("pi").await;
    assert_eq!(ctl.messages()[1].text, "π ≈ 3.14159 ✓");
}

#[tokio::test]
async fn service_unavailable_keeps_empty_placeholder() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/stream"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&mock_server)
        .await;

    let mut ctl = controller_for(&mock_server.uri());
    let outcome = ctl.submit("hello").await;

    assert_eq!(
        outcome,
        SubmitOutcome::Finished(SessionState::Failed(FailureKind::Server))
    );
    assert_eq!(ctl.messages(), &[Message::user("hello"), Message::bot("")]);
    assert!(ctl.error().unwrap().contains("503"));
    assert!(!ctl.is_loading());
}

#[tokio::test]
async fn unreachable_proxy_reports_generic_message() {
    let mut ctl = controller_for("http://127.0.0.1:1");
    let outcome = ctl.submit("hello").await;

    assert_eq!(
        outcome,
        SubmitOutcome::Finished(SessionState::Failed(FailureKind::Network))
    );
    assert_eq!(ctl.error(), Some(CONNECTION_FAILED_MESSAGE));
}

#[tokio::test]
async fn abort_before_headers_cancels_quietly() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("{\"response\":\"late\"}\n")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&mock_server)
        .await;

    let mut ctl = controller_for(&mock_server.uri());
    let handle = ctl.handle();
    let abort = async move {
        while !handle.is_running() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort()
    };

    let (outcome, aborted) = tokio::join!(ctl.submit("slow"), abort);

    assert!(aborted);
    assert_eq!(outcome, SubmitOutcome::Finished(SessionState::Cancelled));
    assert!(ctl.error().is_none());
    assert_eq!(ctl.messages()[1], Message::bot(""));

    // Ready for the next turn
    assert!(!ctl.is_loading());
}

/// Serve one connection: error headers and a short body, then stall
async fn stalled_error_server() -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        let _ = socket.read(&mut buf).await;
        let _ = socket
            .write_all(b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 100\r\n\r\npartial")
            .await;
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(socket);
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn abort_while_error_body_stalls_cancels_quietly() {
    let mut ctl = controller_for(&stalled_error_server().await);
    let handle = ctl.handle();
    let abort = async move {
        while !handle.is_running() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tokio::time::sleep(Duration::from_millis(300)).await;
        handle.abort()
    };

    let (outcome, aborted) = tokio::time::timeout(
        Duration::from_secs(3),
        async { tokio::join!(ctl.submit("q"), abort) },
    )
    .await
    .expect("abort should end the turn");

    assert!(aborted);
    assert_eq!(outcome, SubmitOutcome::Finished(SessionState::Cancelled));
    assert!(ctl.error().is_none());
    assert!(!ctl.is_loading());
}
