//! Bot client behavior against a scripted relay.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use clawboard_bot::tasks::{SimulatedProcessor, TaskError, TaskProcessor};
use clawboard_bot::{BotClient, BotConfig, RunOutcome};
use clawboard_core::BotState;
use clawboard_core::protocol::TaskAssignment;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};

type Relay = WebSocketStream<TcpStream>;

const TIMEOUT: Duration = Duration::from_secs(5);

fn fast_config(url: String) -> BotConfig {
    BotConfig {
        name: "Test Bot".into(),
        ws_url: url,
        max_reconnect_attempts: 2,
        reconnect_interval: Duration::from_millis(20),
        restart_delay: Duration::from_millis(20),
        context_delay: Duration::from_millis(20),
        heartbeat_interval: Duration::from_secs(3600),
    }
}

fn spawn_bot(
    config: BotConfig,
    processor: Arc<dyn TaskProcessor>,
) -> (Arc<BotClient>, tokio::task::JoinHandle<RunOutcome>) {
    let client = Arc::new(BotClient::new(config, processor));
    let handle = tokio::spawn({
        let client = client.clone();
        async move { client.run().await }
    });
    (client, handle)
}

async fn listener() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    (listener, url)
}

async fn accept(listener: &TcpListener) -> Relay {
    let (tcp, _) = tokio::time::timeout(TIMEOUT, listener.accept())
        .await
        .expect("bot did not connect")
        .unwrap();
    accept_async(tcp).await.unwrap()
}

async fn recv(relay: &mut Relay) -> Value {
    tokio::time::timeout(TIMEOUT, async {
        loop {
            match relay.next().await {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(text.as_str()).unwrap();
                }
                Some(Ok(_)) => {}
                other => panic!("relay stream ended: {other:?}"),
            }
        }
    })
    .await
    .expect("no frame from bot")
}

async fn recv_status(relay: &mut Relay) -> String {
    let frame = recv(relay).await;
    assert_eq!(frame["type"], "bot_status_update", "unexpected frame {frame}");
    assert_eq!(frame["bot"], "Test Bot");
    frame["status"].as_str().unwrap().to_owned()
}

async fn send(relay: &mut Relay, value: Value) {
    relay.send(Message::text(value.to_string())).await.unwrap();
}

struct FailingProcessor;

#[async_trait]
impl TaskProcessor for FailingProcessor {
    async fn process(&self, _task: &TaskAssignment) -> Result<(), TaskError> {
        Err(TaskError("disk full".into()))
    }
}

fn quick_processor() -> Arc<dyn TaskProcessor> {
    Arc::new(SimulatedProcessor::new(Duration::from_millis(20)))
}

#[tokio::test]
async fn reports_active_on_connect() {
    let (listener, url) = listener().await;
    let (client, handle) = spawn_bot(fast_config(url), quick_processor());

    let mut relay = accept(&listener).await;
    let frame = recv(&mut relay).await;
    assert_eq!(frame["type"], "bot_status_update");
    assert_eq!(frame["status"], "active");
    assert!(frame["timestamp"].as_str().unwrap().ends_with('Z'));
    assert_eq!(client.state(), BotState::Active);

    client.shutdown();
    assert_eq!(handle.await.unwrap(), RunOutcome::Shutdown);
}

#[tokio::test]
async fn task_assign_runs_and_acks_completed() {
    let (listener, url) = listener().await;
    let (client, _handle) = spawn_bot(fast_config(url), quick_processor());
    let mut relay = accept(&listener).await;
    assert_eq!(recv_status(&mut relay).await, "active");

    send(&mut relay, json!({"type":"task_assign","task":{"id":"t-9","title":"Write docs"}})).await;
    assert_eq!(recv_status(&mut relay).await, "working");
    assert_eq!(recv_status(&mut relay).await, "active");

    let ack = recv(&mut relay).await;
    assert_eq!(ack["type"], "task_update");
    assert_eq!(ack["taskId"], "t-9");
    assert_eq!(ack["status"], "completed");
    assert_eq!(ack["bot"], "Test Bot");
    assert!(ack.get("error").is_none());

    client.shutdown();
}

#[tokio::test]
async fn failing_task_acks_failed_with_detail() {
    let (listener, url) = listener().await;
    let (client, _handle) = spawn_bot(fast_config(url), Arc::new(FailingProcessor));
    let mut relay = accept(&listener).await;
    let _ = recv_status(&mut relay).await;

    send(&mut relay, json!({"type":"task_assign","task":{"id":4}})).await;
    assert_eq!(recv_status(&mut relay).await, "working");
    assert_eq!(recv_status(&mut relay).await, "error");
    let ack = recv(&mut relay).await;
    assert_eq!(ack["taskId"], 4);
    assert_eq!(ack["status"], "failed");
    assert_eq!(ack["error"], "disk full");

    client.shutdown();
}

#[tokio::test]
async fn context_update_processes_then_returns_active() {
    let (listener, url) = listener().await;
    let (client, _handle) = spawn_bot(fast_config(url), quick_processor());
    let mut relay = accept(&listener).await;
    let _ = recv_status(&mut relay).await;

    send(&mut relay, json!({"type":"context_update","context":{"filename":"notes.md"}})).await;
    assert_eq!(recv_status(&mut relay).await, "processing");
    assert_eq!(recv_status(&mut relay).await, "active");

    client.shutdown();
}

#[tokio::test]
async fn pause_and_resume_commands() {
    let (listener, url) = listener().await;
    let (client, _handle) = spawn_bot(fast_config(url), quick_processor());
    let mut relay = accept(&listener).await;
    let _ = recv_status(&mut relay).await;

    send(&mut relay, json!({"type":"bot_command","command":{"action":"pause"}})).await;
    assert_eq!(recv_status(&mut relay).await, "paused");
    assert_eq!(client.state(), BotState::Paused);

    // bare form, as forwarded by the command bridge
    send(&mut relay, json!({"type":"resume"})).await;
    assert_eq!(recv_status(&mut relay).await, "active");

    client.shutdown();
}

#[tokio::test]
async fn unknown_action_and_garbage_keep_connection() {
    let (listener, url) = listener().await;
    let (client, _handle) = spawn_bot(fast_config(url), quick_processor());
    let mut relay = accept(&listener).await;
    let _ = recv_status(&mut relay).await;

    send(&mut relay, json!({"type":"bot_command","command":{"action":"dance"}})).await;
    relay.send(Message::text("not json")).await.unwrap();
    send(&mut relay, json!({"type":"status_request"})).await;
    assert_eq!(recv_status(&mut relay).await, "active");

    client.shutdown();
}

#[tokio::test]
async fn heartbeat_reports_status_periodically() {
    let (listener, url) = listener().await;
    let config = BotConfig {
        heartbeat_interval: Duration::from_millis(50),
        ..fast_config(url)
    };
    let (client, _handle) = spawn_bot(config, quick_processor());
    let mut relay = accept(&listener).await;

    assert_eq!(recv_status(&mut relay).await, "active");
    assert_eq!(recv_status(&mut relay).await, "active");
    assert_eq!(recv_status(&mut relay).await, "active");

    client.shutdown();
}

#[tokio::test]
async fn restart_closes_and_reconnects_once() {
    let (listener, url) = listener().await;
    let (client, _handle) = spawn_bot(fast_config(url), quick_processor());
    let mut first = accept(&listener).await;
    let _ = recv_status(&mut first).await;

    send(&mut first, json!({"type":"bot_command","command":{"action":"restart"}})).await;

    let mut second = accept(&listener).await;
    assert_eq!(recv_status(&mut second).await, "active");

    // no duplicate connect attempt is pending
    let extra = tokio::time::timeout(Duration::from_millis(200), listener.accept()).await;
    assert!(extra.is_err());

    client.shutdown();
}

#[tokio::test]
async fn reconnects_after_disconnect_and_resets_counter() {
    let (listener, url) = listener().await;
    let (client, _handle) = spawn_bot(fast_config(url), quick_processor());

    // more disconnects than max_reconnect_attempts, each followed by a
    // successful reconnect
    for _ in 0..4 {
        let mut relay = accept(&listener).await;
        assert_eq!(recv_status(&mut relay).await, "active");
        relay.close(None).await.unwrap();
    }

    let mut relay = accept(&listener).await;
    assert_eq!(recv_status(&mut relay).await, "active");
    client.shutdown();
}

#[tokio::test]
async fn transport_error_reports_error_and_reconnects() {
    let (listener, url) = listener().await;
    let (client, _handle) = spawn_bot(fast_config(url), quick_processor());

    // more broken sessions than max_reconnect_attempts; each reconnect
    // succeeds, so the bot never gives up
    for _ in 0..4 {
        let mut relay = accept(&listener).await;
        assert_eq!(recv_status(&mut relay).await, "active");

        // reserved opcode with RSV bits set: not a valid frame
        relay.get_mut().write_all(&[0xFF, 0x00]).await.unwrap();
        relay.get_mut().flush().await.unwrap();

        // whatever the bot still gets out reports the error state
        while let Ok(Some(Ok(msg))) = tokio::time::timeout(TIMEOUT, relay.next()).await {
            if let Message::Text(text) = msg {
                let frame: Value = serde_json::from_str(text.as_str()).unwrap();
                assert_eq!(frame["status"], "error");
            }
        }
    }

    let mut relay = accept(&listener).await;
    assert_eq!(recv_status(&mut relay).await, "active");
    assert_eq!(client.state(), BotState::Active);
    client.shutdown();
}

#[tokio::test]
async fn task_without_id_acks_without_task_id() {
    let (listener, url) = listener().await;
    let (client, _handle) = spawn_bot(fast_config(url), quick_processor());
    let mut relay = accept(&listener).await;
    let _ = recv_status(&mut relay).await;

    send(&mut relay, json!({"type":"task_assign","task":{"title":"untracked"}})).await;
    assert_eq!(recv_status(&mut relay).await, "working");
    assert_eq!(recv_status(&mut relay).await, "active");
    let ack = recv(&mut relay).await;
    assert_eq!(ack["type"], "task_update");
    assert_eq!(ack["status"], "completed");
    assert!(ack.get("taskId").is_none());

    client.shutdown();
}

#[tokio::test]
async fn gives_up_after_max_attempts() {
    let (listener, url) = listener().await;
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();
    let _acceptor = tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            let _ = counter.fetch_add(1, Ordering::SeqCst);
            drop(tcp);
        }
    });

    let config = BotConfig {
        max_reconnect_attempts: 3,
        ..fast_config(url)
    };
    let (client, handle) = spawn_bot(config, quick_processor());

    let outcome = tokio::time::timeout(TIMEOUT, handle).await.unwrap().unwrap();
    assert_eq!(outcome, RunOutcome::GaveUp { attempts: 3 });
    assert_eq!(accepted.load(Ordering::SeqCst), 4);
    assert_eq!(client.state(), BotState::Inactive);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(accepted.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn shutdown_cancels_pending_reconnect() {
    let (listener, url) = listener().await;
    drop(listener);

    let config = BotConfig {
        reconnect_interval: Duration::from_secs(3600),
        ..fast_config(url)
    };
    let (client, handle) = spawn_bot(config, quick_processor());
    tokio::time::sleep(Duration::from_millis(50)).await;

    client.shutdown();
    let outcome = tokio::time::timeout(TIMEOUT, handle).await.unwrap().unwrap();
    assert_eq!(outcome, RunOutcome::Shutdown);
}

#[tokio::test]
async fn shutdown_sends_close_frame() {
    let (listener, url) = listener().await;
    let (client, handle) = spawn_bot(fast_config(url), quick_processor());
    let mut relay = accept(&listener).await;
    let _ = recv_status(&mut relay).await;

    client.shutdown();
    let closed = tokio::time::timeout(TIMEOUT, async {
        loop {
            match relay.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok());
    assert_eq!(handle.await.unwrap(), RunOutcome::Shutdown);
}
