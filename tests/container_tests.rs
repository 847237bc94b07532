//! Container-compute init: identity and credentials resolved from the
//! container agent's local HTTP endpoint.

mod support;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use gamelift_server_sdk::app::config::{self, ServerParameters};
use gamelift_server_sdk::core::container::ContainerMetadataClient;
use gamelift_server_sdk::core::state::GameLiftServerState;

use support::{test_config, MockTransport};

static ENV_LOCK: parking_lot::Mutex<()> = parking_lot::Mutex::new(());

const TASK_BODY: &str =
    r#"{"Cluster":"c1","TaskARN":"arn:aws:ecs:us-west-2:123456789012:task/c1/tk42"}"#;
const CREDS_BODY: &str =
    r#"{"AccessKeyId":"AKIAFETCHED","SecretAccessKey":"fetched-secret","Token":"fetched-token","Expiration":"2030-01-01T00:00:00Z"}"#;

/// Minimal HTTP stub answering the two container-agent endpoints.
async fn spawn_http_stub() -> (String, Arc<AtomicU32>, Arc<AtomicU32>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let task_hits = Arc::new(AtomicU32::new(0));
    let cred_hits = Arc::new(AtomicU32::new(0));

    let task_counter = task_hits.clone();
    let cred_counter = cred_hits.clone();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let task_counter = task_counter.clone();
            let cred_counter = cred_counter.clone();
            tokio::spawn(async move {
                let mut buffer = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buffer.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buffer.extend_from_slice(&chunk[..n]),
                    }
                }
                let head = String::from_utf8_lossy(&buffer);
                let body = if head.starts_with("GET /task") {
                    task_counter.fetch_add(1, Ordering::SeqCst);
                    TASK_BODY
                } else {
                    cred_counter.fetch_add(1, Ordering::SeqCst);
                    CREDS_BODY
                };
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    (format!("http://{addr}"), task_hits, cred_hits)
}

#[tokio::test]
async fn metadata_client_fetches_task_id_and_credentials() {
    let (base, task_hits, cred_hits) = spawn_http_stub().await;
    let client = ContainerMetadataClient::new(base.clone(), format!("{base}/creds"));

    assert_eq!(client.fetch_task_id().await.unwrap(), "tk42");
    let credentials = client.fetch_credentials().await.unwrap();
    assert_eq!(credentials.access_key, "AKIAFETCHED");
    assert_eq!(credentials.secret_key, "fetched-secret");
    assert_eq!(credentials.session_token, "fetched-token");

    assert_eq!(task_hits.load(Ordering::SeqCst), 1);
    assert_eq!(cred_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn agentless_container_init_resolves_identity_from_the_agent() {
    let _guard = ENV_LOCK.lock();
    let (base, task_hits, cred_hits) = spawn_http_stub().await;

    std::env::set_var("ECS_CONTAINER_METADATA_URI_V4", &base);
    std::env::set_var("AWS_CONTAINER_CREDENTIALS_FULL_URI", format!("{base}/creds"));
    std::env::set_var(config::ENV_COMPUTE_TYPE, "CONTAINER");
    std::env::set_var(config::ENV_PROCESS_ID, config::AGENTLESS_CONTAINER_PROCESS_ID);
    std::env::set_var(config::ENV_WEBSOCKET_URL, "wss://t/");
    std::env::set_var(config::ENV_FLEET_ID, "f1");
    std::env::set_var(config::ENV_AWS_REGION, "us-west-2");
    std::env::remove_var(config::ENV_AUTH_TOKEN);
    std::env::remove_var(config::ENV_HOST_ID);

    let transport = MockTransport::new();
    let state = GameLiftServerState::connect_configured(
        ServerParameters::default(),
        transport.clone(),
        test_config(),
    )
    .await
    .expect("container init");

    // Each agent endpoint was hit exactly once.
    assert_eq!(task_hits.load(Ordering::SeqCst), 1);
    assert_eq!(cred_hits.load(Ordering::SeqCst), 1);

    // Host identity comes from the task, the process id is minted, and the
    // dial is SigV4-signed instead of token-authorised.
    let url = transport.last_connect_url();
    assert!(url.contains("ComputeId=tk42"), "url: {url}");
    assert!(!url.contains(config::AGENTLESS_CONTAINER_PROCESS_ID), "url: {url}");
    assert!(url.contains("pID="), "url: {url}");
    assert!(!url.contains("Authorization="), "url: {url}");
    assert!(url.contains("X-Amz-Signature="), "url: {url}");
    assert!(url.contains("X-Amz-Credential=AKIAFETCHED"), "url: {url}");
    assert!(url.contains("X-Amz-Security-Token="), "url: {url}");

    state.destroy().await.unwrap();

    for key in [
        "ECS_CONTAINER_METADATA_URI_V4",
        "AWS_CONTAINER_CREDENTIALS_FULL_URI",
        config::ENV_COMPUTE_TYPE,
        config::ENV_PROCESS_ID,
        config::ENV_WEBSOCKET_URL,
        config::ENV_FLEET_ID,
        config::ENV_AWS_REGION,
    ] {
        std::env::remove_var(key);
    }
}
