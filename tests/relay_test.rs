//! End-to-end tests: the relay runs on an ephemeral port in front of a
//! wiremock upstream and is driven with reqwest.

use chat_relay::config::ApiKey;
use chat_relay::relay::{ChatForwarder, RelayServer, TRANSPORT_FAILURE_MESSAGE};
use chat_relay::RelayConfig;
use futures::future::join_all;
use serde_json::{json, Value};
use std::net::{SocketAddr, TcpListener};
use std::time::Duration;
use wiremock::matchers::{body_json, body_string, header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const UPSTREAM_PATH: &str = "/api/v1/chat/completions";

/// Upstream that answers 200 with whatever body it received
struct EchoBody;

impl Respond for EchoBody {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(request.body.clone(), "application/json")
    }
}

fn relay_config(upstream_url: String, api_key: Option<&str>) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.listen_addr = "127.0.0.1:0".parse().unwrap();
    config.upstream.url = upstream_url;
    config.upstream.use_system_proxy = false;
    config.api_key = api_key.map(ApiKey::new);
    config
}

async fn spawn_server(server: RelayServer) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server.run(listener, std::future::pending()));
    addr
}

async fn spawn_relay(config: RelayConfig) -> SocketAddr {
    spawn_server(RelayServer::with_config(config).unwrap()).await
}

fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

fn chat_url(addr: SocketAddr) -> String {
    format!("http://{}/api/chat", addr)
}

fn chat_request() -> Value {
    json!({
        "model": "openai/gpt-4o-mini",
        "messages": [
            {"role": "system", "content": "You are terse."},
            {"role": "user", "content": "Say hi"}
        ],
        "temperature": 0.2
    })
}

#[tokio::test]
async fn relays_success_with_credential_attached() {
    let upstream = MockServer::start().await;
    let completion = json!({
        "id": "gen-123",
        "object": "chat.completion",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": "hi"}}]
    });

    Mock::given(method("POST"))
        .and(path(UPSTREAM_PATH))
        .and(header("authorization", "Bearer sk-test"))
        .and(header("content-type", "application/json"))
        .and(body_json(chat_request()))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion.clone()))
        .expect(1)
        .mount(&upstream)
        .await;

    let addr = spawn_relay(relay_config(
        format!("{}{}", upstream.uri(), UPSTREAM_PATH),
        Some("sk-test"),
    ))
    .await;

    let response = client()
        .post(chat_url(addr))
        .json(&chat_request())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.json::<Value>().await.unwrap(), completion);
}

#[tokio::test]
async fn passes_through_upstream_unauthorized() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(UPSTREAM_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "invalid key"})))
        .expect(1)
        .mount(&upstream)
        .await;

    let addr = spawn_relay(relay_config(
        format!("{}{}", upstream.uri(), UPSTREAM_PATH),
        Some("sk-wrong"),
    ))
    .await;

    let response = client()
        .post(chat_url(addr))
        .json(&chat_request())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
    assert_eq!(
        response.json::<Value>().await.unwrap(),
        json!({"error": "invalid key"})
    );
}

#[tokio::test]
async fn passes_through_upstream_server_errors() {
    let upstream = MockServer::start().await;
    let error_body = json!({"error": {"code": 503, "message": "No available providers"}});
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_json(error_body.clone()))
        .expect(1)
        .mount(&upstream)
        .await;

    let addr = spawn_relay(relay_config(
        format!("{}{}", upstream.uri(), UPSTREAM_PATH),
        Some("sk-test"),
    ))
    .await;

    let response = client()
        .post(chat_url(addr))
        .json(&chat_request())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 503);
    assert_eq!(response.json::<Value>().await.unwrap(), error_body);
}

#[tokio::test]
async fn missing_credential_surfaces_as_upstream_auth_error() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"error": {"message": "No auth credentials found", "code": 401}})),
        )
        .expect(1)
        .mount(&upstream)
        .await;

    let addr = spawn_relay(relay_config(
        format!("{}{}", upstream.uri(), UPSTREAM_PATH),
        None,
    ))
    .await;

    let response = client()
        .post(chat_url(addr))
        .json(&chat_request())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);

    let received = upstream.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    let authorization = received[0].headers.get("authorization").unwrap();
    assert!(authorization.to_str().unwrap().starts_with("Bearer"));
}

#[tokio::test]
async fn forwards_malformed_json_as_is() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string("{\"model\": \"x\", "))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": {"message": "Invalid JSON"}})),
        )
        .expect(1)
        .mount(&upstream)
        .await;

    let addr = spawn_relay(relay_config(
        format!("{}{}", upstream.uri(), UPSTREAM_PATH),
        Some("sk-test"),
    ))
    .await;

    let response = client()
        .post(chat_url(addr))
        .header("content-type", "application/json")
        .body("{\"model\": \"x\", ")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    assert_eq!(
        response.json::<Value>().await.unwrap(),
        json!({"error": {"message": "Invalid JSON"}})
    );
}

#[tokio::test]
async fn forwards_empty_body_as_is() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": "messages is required"})),
        )
        .expect(1)
        .mount(&upstream)
        .await;

    let addr = spawn_relay(relay_config(
        format!("{}{}", upstream.uri(), UPSTREAM_PATH),
        Some("sk-test"),
    ))
    .await;

    let response = client()
        .post(chat_url(addr))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);

    let received = upstream.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    assert!(received[0].body.is_empty());
}

#[tokio::test]
async fn unreachable_upstream_is_a_transport_failure() {
    // Grab a free port and release it so nothing is listening there
    let closed = TcpListener::bind("127.0.0.1:0").unwrap();
    let closed_addr = closed.local_addr().unwrap();
    drop(closed);

    let addr = spawn_relay(relay_config(
        format!("http://{}{}", closed_addr, UPSTREAM_PATH),
        Some("sk-test"),
    ))
    .await;

    let response = client()
        .post(chat_url(addr))
        .json(&chat_request())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
    let body = response.json::<Value>().await.unwrap();
    assert_eq!(body["error"], TRANSPORT_FAILURE_MESSAGE);
    assert!(!body["details"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn redacts_transport_details_when_configured() {
    let closed = TcpListener::bind("127.0.0.1:0").unwrap();
    let closed_addr = closed.local_addr().unwrap();
    drop(closed);

    let mut config = relay_config(
        format!("http://{}{}", closed_addr, UPSTREAM_PATH),
        Some("sk-test"),
    );
    config.redact_transport_details = true;
    let addr = spawn_relay(config).await;

    let response = client()
        .post(chat_url(addr))
        .json(&chat_request())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
    let body = response.json::<Value>().await.unwrap();
    assert_eq!(body["error"], TRANSPORT_FAILURE_MESSAGE);
    assert_eq!(body["details"], "Upstream request failed");
}

#[tokio::test]
async fn missing_transport_never_contacts_upstream() {
    let config = relay_config("http://127.0.0.1:9/unused".to_string(), Some("sk-test"));
    let server = RelayServer::with_forwarder(config, ChatForwarder::without_transport());
    let addr = spawn_server(server).await;

    let response = client()
        .post(chat_url(addr))
        .json(&chat_request())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
    let body = response.json::<Value>().await.unwrap();
    assert_eq!(body["error"], TRANSPORT_FAILURE_MESSAGE);
    assert!(body["details"].is_string());
}

#[tokio::test]
async fn concurrent_requests_are_isolated() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(EchoBody)
        .expect(50)
        .mount(&upstream)
        .await;

    let addr = spawn_relay(relay_config(
        format!("{}{}", upstream.uri(), UPSTREAM_PATH),
        Some("sk-test"),
    ))
    .await;

    let client = client();
    let requests = (0..50).map(|n| {
        let client = client.clone();
        async move {
            let body = json!({
                "model": "openai/gpt-4o-mini",
                "messages": [{"role": "user", "content": format!("request {}", n)}]
            });
            let response = client.post(chat_url(addr)).json(&body).send().await.unwrap();
            let status = response.status();
            (body, status, response.json::<Value>().await.unwrap())
        }
    });

    for (sent, status, received) in join_all(requests).await {
        assert_eq!(status, 200);
        assert_eq!(received, sent);
    }
}

#[tokio::test]
async fn oversized_body_is_rejected_without_forwarding() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&upstream)
        .await;

    let mut config = relay_config(
        format!("{}{}", upstream.uri(), UPSTREAM_PATH),
        Some("sk-test"),
    );
    config.max_body_size = 32;
    let addr = spawn_relay(config).await;

    let response = client()
        .post(chat_url(addr))
        .json(&chat_request())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 413);
}

#[tokio::test]
async fn health_endpoint_is_served_locally() {
    let addr = spawn_relay(relay_config(
        "http://127.0.0.1:9/unused".to_string(),
        None,
    ))
    .await;

    let response = client()
        .get(format!("http://{}/health", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body = response.json::<Value>().await.unwrap();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn slow_upstream_past_request_timeout_is_a_transport_failure() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": "gen-late"}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&upstream)
        .await;

    let mut config = relay_config(
        format!("{}{}", upstream.uri(), UPSTREAM_PATH),
        Some("sk-test"),
    );
    config.upstream.request_timeout_secs = Some(1);
    let addr = spawn_relay(config).await;

    let response = client()
        .post(chat_url(addr))
        .json(&chat_request())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
    let body = response.json::<Value>().await.unwrap();
    assert_eq!(body["error"], TRANSPORT_FAILURE_MESSAGE);
    assert!(!body["details"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn credential_unusable_as_header_never_reaches_upstream() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&upstream)
        .await;

    let addr = spawn_relay(relay_config(
        format!("{}{}", upstream.uri(), UPSTREAM_PATH),
        Some("sk-bad\nkey"),
    ))
    .await;

    let response = client()
        .post(chat_url(addr))
        .json(&chat_request())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
    let body = response.json::<Value>().await.unwrap();
    assert_eq!(body["error"], TRANSPORT_FAILURE_MESSAGE);
    assert!(!body["details"].as_str().unwrap().contains("sk-bad"));
    assert!(upstream.received_requests().await.unwrap().is_empty());
}
