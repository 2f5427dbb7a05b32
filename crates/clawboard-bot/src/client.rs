//! Relay connection supervisor.
//!
//! One loop owns the socket and the reconnect timer. A `restart` command and
//! an ordinary disconnect both return control to that loop, so at most one
//! connect attempt is ever pending.

use std::sync::Arc;
use std::time::Duration;

use clawboard_core::protocol::{BotAction, BotInbound, BotOutbound, TaskAssignment, TaskResult};
use clawboard_core::{BotState, timestamp_now};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::BotConfig;
use crate::errors::BotError;
use crate::tasks::{TaskError, TaskProcessor};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// How [`BotClient::run`] finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Shutdown was requested.
    Shutdown,
    /// Reconnects were exhausted.
    GaveUp {
        /// Reconnect attempts made after the last disconnect.
        attempts: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Shutdown,
    Restart,
    Closed,
}

/// Background work spawned per connection.
enum Work {
    Task {
        id: Value,
        result: Result<(), TaskError>,
    },
    ContextApplied,
}

/// The bot's relay client.
pub struct BotClient {
    config: BotConfig,
    processor: Arc<dyn TaskProcessor>,
    state: Mutex<BotState>,
    cancel: CancellationToken,
}

impl BotClient {
    /// Create a client. Nothing connects until [`run`](Self::run).
    pub fn new(config: BotConfig, processor: Arc<dyn TaskProcessor>) -> Self {
        Self {
            config,
            processor,
            state: Mutex::new(BotState::Inactive),
            cancel: CancellationToken::new(),
        }
    }

    /// Current session state.
    pub fn state(&self) -> BotState {
        *self.state.lock()
    }

    /// Close the connection and cancel any pending reconnect.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Connect and stay connected until shutdown or until reconnects run out.
    ///
    /// After a disconnect the client waits `reconnect_interval` and retries,
    /// at most `max_reconnect_attempts` times in a row. A successful connect
    /// resets the count.
    #[instrument(skip_all, fields(bot = %self.config.name, url = %self.config.ws_url))]
    pub async fn run(&self) -> RunOutcome {
        let mut reconnects: u32 = 0;
        let mut delay: Option<Duration> = None;

        loop {
            if let Some(wait) = delay.take() {
                tokio::select! {
                    () = tokio::time::sleep(wait) => {}
                    () = self.cancel.cancelled() => return RunOutcome::Shutdown,
                }
            }

            let connected = tokio::select! {
                result = self.connect() => result,
                () = self.cancel.cancelled() => return RunOutcome::Shutdown,
            };

            let end = match connected {
                Ok(ws) => {
                    reconnects = 0;
                    self.run_session(ws).await
                }
                Err(e) => {
                    warn!(attempt = reconnects, error = %e, "relay connection failed");
                    self.set_state(BotState::Error);
                    SessionEnd::Closed
                }
            };
            self.set_state(BotState::Inactive);

            match end {
                SessionEnd::Shutdown => return RunOutcome::Shutdown,
                SessionEnd::Restart => {
                    info!(delay = ?self.config.restart_delay, "restarting relay connection");
                    delay = Some(self.config.restart_delay);
                }
                SessionEnd::Closed => {
                    if reconnects >= self.config.max_reconnect_attempts {
                        error!(attempts = reconnects, "giving up on relay connection");
                        return RunOutcome::GaveUp {
                            attempts: reconnects,
                        };
                    }
                    reconnects += 1;
                    info!(
                        attempt = reconnects,
                        max_attempts = self.config.max_reconnect_attempts,
                        delay = ?self.config.reconnect_interval,
                        "scheduling reconnect"
                    );
                    delay = Some(self.config.reconnect_interval);
                }
            }
        }
    }

    async fn connect(&self) -> Result<WsStream, BotError> {
        let url = self.config.ws_url.as_str();
        let (ws, _response) = connect_async(url).await.map_err(|source| BotError::Connect {
            url: url.to_owned(),
            source,
        })?;
        Ok(ws)
    }

    async fn run_session(&self, ws: WsStream) -> SessionEnd {
        let (mut sink, mut stream) = ws.split();
        let mut work: JoinSet<Work> = JoinSet::new();

        info!("connected to relay");
        self.set_state(BotState::Active);
        self.emit_status(&mut sink).await;

        let period = self.config.heartbeat_interval;
        let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);

        let end = loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    info!("closing relay connection");
                    let _ = sink.send(Message::Close(None)).await;
                    break SessionEnd::Shutdown;
                }
                _ = heartbeat.tick() => self.emit_status(&mut sink).await,
                Some(done) = work.join_next(), if !work.is_empty() => match done {
                    Ok(finished) => self.on_work_done(&mut sink, finished).await,
                    Err(e) => warn!(error = %e, "background work aborted"),
                },
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        let end = self.on_frame(&mut sink, &mut work, text.as_str()).await;
                        if let Some(end) = end {
                            break end;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("relay closed the connection");
                        break SessionEnd::Closed;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "relay transport error");
                        self.set_state(BotState::Error);
                        self.emit_status(&mut sink).await;
                        break SessionEnd::Closed;
                    }
                },
            }
        };

        work.abort_all();
        end
    }

    async fn on_frame(
        &self,
        sink: &mut WsSink,
        work: &mut JoinSet<Work>,
        text: &str,
    ) -> Option<SessionEnd> {
        let message = match BotInbound::decode(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(code = e.code(), error = %e, "ignoring malformed frame");
                return None;
            }
        };
        debug!(message_type = message.message_type(), "frame received");

        match message {
            BotInbound::TaskAssign(task) => self.start_task(sink, work, task).await,
            BotInbound::ContextUpdate(context) => {
                info!(
                    filename = context.filename.as_deref().unwrap_or("-"),
                    "context update received"
                );
                self.set_state(BotState::Processing);
                self.emit_status(sink).await;
                let delay = self.config.context_delay;
                let _ = work.spawn(async move {
                    tokio::time::sleep(delay).await;
                    Work::ContextApplied
                });
            }
            BotInbound::Command(command) => match command.kind() {
                Some(BotAction::Restart) => {
                    info!("restart requested");
                    let _ = sink.send(Message::Close(None)).await;
                    return Some(SessionEnd::Restart);
                }
                Some(BotAction::Pause) => {
                    info!("paused");
                    self.set_state(BotState::Paused);
                    self.emit_status(sink).await;
                }
                Some(BotAction::Resume) => {
                    info!("resumed");
                    self.set_state(BotState::Active);
                    self.emit_status(sink).await;
                }
                None => warn!(action = %command.action, "ignoring unknown command"),
            },
            BotInbound::StatusRequest => self.emit_status(sink).await,
            BotInbound::Unknown { message_type } => {
                debug!(message_type = %message_type, "ignoring unknown message type");
            }
        }
        None
    }

    async fn start_task(&self, sink: &mut WsSink, work: &mut JoinSet<Work>, task: TaskAssignment) {
        info!(
            task_id = %task.id,
            title = task.title.as_deref().unwrap_or(""),
            "task assigned"
        );
        self.set_state(BotState::Working);
        self.emit_status(sink).await;

        let processor = Arc::clone(&self.processor);
        let _ = work.spawn(async move {
            let result = processor.process(&task).await;
            Work::Task {
                id: task.id,
                result,
            }
        });
    }

    async fn on_work_done(&self, sink: &mut WsSink, finished: Work) {
        match finished {
            Work::Task { id, result: Ok(()) } => {
                info!(task_id = %id, "task completed");
                self.set_state(BotState::Active);
                self.emit_status(sink).await;
                self.emit(sink, &self.task_update(id, TaskResult::Completed, None)).await;
            }
            Work::Task {
                id,
                result: Err(e),
            } => {
                warn!(task_id = %id, error = %e, "task failed");
                self.set_state(BotState::Error);
                self.emit_status(sink).await;
                self.emit(sink, &self.task_update(id, TaskResult::Failed, Some(e.0)))
                    .await;
            }
            Work::ContextApplied => {
                self.set_state(BotState::Active);
                self.emit_status(sink).await;
            }
        }
    }

    fn set_state(&self, next: BotState) {
        let mut state = self.state.lock();
        if *state != next {
            debug!(from = %*state, to = %next, "state change");
            *state = next;
        }
    }

    fn task_update(
        &self,
        task_id: Value,
        status: TaskResult,
        error: Option<String>,
    ) -> BotOutbound {
        BotOutbound::TaskUpdate {
            task_id,
            status,
            error,
            bot: self.config.name.clone(),
            timestamp: timestamp_now(),
        }
    }

    async fn emit_status(&self, sink: &mut WsSink) {
        let frame = BotOutbound::BotStatusUpdate {
            bot: self.config.name.clone(),
            status: self.state(),
            timestamp: timestamp_now(),
        };
        self.emit(sink, &frame).await;
    }

    async fn emit(&self, sink: &mut WsSink, frame: &BotOutbound) {
        if let Err(e) = send_frame(sink, frame).await {
            warn!(error = %e, "failed to send frame to relay");
        }
    }
}

async fn send_frame(sink: &mut WsSink, frame: &BotOutbound) -> Result<(), BotError> {
    let json = serde_json::to_string(frame)?;
    sink.send(Message::text(json)).await?;
    Ok(())
}
