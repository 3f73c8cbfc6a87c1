//! Socket Mode listener.
//!
//! The `SlackBot` is the long-running side of the transport:
//! - Connects to Slack via Socket Mode (WebSocket)
//! - Acknowledges every envelope before doing any work
//! - Hands channel messages to the registered `SlackEventHandler`
//! - Reconnects when Slack drops or recycles the connection
//!
//! # Example
//!
//! ```rust,ignore
//! use jirabot_slack::{SlackBot, SlackConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SlackConfig::from_env()?;
//!     let bot = SlackBot::new(config)?;
//!     bot.set_event_handler(MyHandler).await;
//!
//!     // Runs until `shutdown` is called
//!     bot.start().await?;
//!
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{RwLock, mpsc, watch};
use tokio::time::interval;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};

use crate::api::SlackApiClient;
use crate::config::SlackConfig;
use crate::error::{SlackError, SlackResult};
use crate::events::{
    EventPayload, SlackEvent, SlackEventHandler, SocketModeAck, SocketModeEnvelope, parse_event,
};

/// Type alias for the WebSocket connection.
type WsConnection = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Configuration for listener behavior.
#[derive(Debug, Clone)]
pub struct BotOptions {
    /// Delay between reconnection attempts.
    pub reconnect_delay: Duration,
    /// Ping interval for WebSocket keep-alive.
    pub ping_interval: Duration,
}

impl Default for BotOptions {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(5),
            ping_interval: Duration::from_secs(30),
        }
    }
}

/// What the read loop should do after an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SocketAction {
    Continue,
    Reconnect,
}

/// How a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionEnd {
    Shutdown,
    Dropped,
}

/// Socket Mode bot.
pub struct SlackBot {
    /// Web API client.
    api: SlackApiClient,
    /// Listener options.
    options: BotOptions,
    /// Bot's own user ID (set after authentication).
    bot_user_id: Arc<RwLock<Option<String>>>,
    /// Shutdown flag; stays set once raised.
    shutdown_tx: watch::Sender<bool>,
    /// Event handler (optional).
    event_handler: Arc<RwLock<Option<Arc<dyn SlackEventHandler>>>>,
}

impl SlackBot {
    /// Create a new bot with the given configuration.
    pub fn new(config: SlackConfig) -> SlackResult<Self> {
        Self::with_options(config, BotOptions::default())
    }

    /// Create a new bot with custom options.
    pub fn with_options(config: SlackConfig, options: BotOptions) -> SlackResult<Self> {
        config.validate()?;

        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            api: SlackApiClient::new(config)?,
            options,
            bot_user_id: Arc::new(RwLock::new(None)),
            shutdown_tx,
            event_handler: Arc::new(RwLock::new(None)),
        })
    }

    /// Web API client used by this bot.
    pub fn api(&self) -> &SlackApiClient {
        &self.api
    }

    /// Set the event handler for processing messages.
    pub async fn set_event_handler(&self, handler: Arc<dyn SlackEventHandler>) {
        let mut guard = self.event_handler.write().await;
        *guard = Some(handler);
    }

    /// Get the bot's user ID (if known).
    pub async fn bot_user_id(&self) -> Option<String> {
        self.bot_user_id.read().await.clone()
    }

    /// Authenticate and run the Socket Mode loop until shutdown.
    ///
    /// Returns `Ok(())` right away when `shutdown` was called before or
    /// during authentication.
    pub async fn start(&self) -> SlackResult<()> {
        info!("Starting Slack listener...");

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let user_id = tokio::select! {
            _ = shutdown_requested(&mut shutdown_rx) => {
                info!("Shutdown requested before the listener connected");
                return Ok(());
            }
            result = self.api.auth_test() => result?,
        };
        info!("Authenticated as bot user: {}", user_id);
        *self.bot_user_id.write().await = Some(user_id);

        self.run_socket_mode(&mut shutdown_rx).await
    }

    /// Shutdown the bot gracefully.
    pub fn shutdown(&self) {
        info!("Shutting down Slack listener...");
        self.shutdown_tx.send_replace(true);
    }

    /// Run the Socket Mode connection loop.
    async fn run_socket_mode(&self, shutdown_rx: &mut watch::Receiver<bool>) -> SlackResult<()> {
        loop {
            let opened = tokio::select! {
                _ = shutdown_requested(shutdown_rx) => break,
                opened = self.api.open_socket_url() => opened,
            };

            let result = match opened {
                Ok(ws_url) => {
                    info!("Connecting to Socket Mode...");
                    self.connect_and_run(&ws_url, shutdown_rx).await
                }
                Err(e @ (SlackError::Auth(_) | SlackError::Config(_))) => return Err(e),
                Err(e) => Err(e),
            };

            match result {
                Ok(ConnectionEnd::Shutdown) => {
                    info!("Socket Mode connection closed gracefully");
                    break;
                }
                Ok(ConnectionEnd::Dropped) => {
                    info!("Socket Mode connection dropped, reconnecting");
                }
                Err(e) => {
                    error!("Socket Mode connection error: {}", e);

                    let delay = match e {
                        SlackError::RateLimited { retry_after_secs } => {
                            Duration::from_secs(retry_after_secs)
                        }
                        _ => self.options.reconnect_delay,
                    };

                    info!("Reconnecting in {:?}...", delay);
                    tokio::select! {
                        _ = shutdown_requested(shutdown_rx) => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        Ok(())
    }

    /// Connect to WebSocket and run event loop.
    async fn connect_and_run(
        &self,
        ws_url: &str,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> SlackResult<ConnectionEnd> {
        let (ws_stream, _) = connect_async(ws_url).await?;
        let (mut write, read) = ws_stream.split();

        let (msg_tx, mut msg_rx) = mpsc::channel::<WsMessage>(100);

        let write_task = tokio::spawn(async move {
            while let Some(msg) = msg_rx.recv().await {
                if let Err(e) = write.send(msg).await {
                    error!("Failed to send WebSocket message: {}", e);
                    break;
                }
            }
        });

        let ping_tx = msg_tx.clone();
        let ping_interval = self.options.ping_interval;
        let ping_task = tokio::spawn(async move {
            let mut interval = interval(ping_interval);
            loop {
                interval.tick().await;
                if ping_tx.send(WsMessage::Ping(vec![])).await.is_err() {
                    break;
                }
            }
        });

        let result = self.process_messages(read, msg_tx, shutdown_rx).await;

        ping_task.abort();
        write_task.abort();

        result
    }

    /// Process incoming WebSocket messages.
    async fn process_messages(
        &self,
        mut read: SplitStream<WsConnection>,
        msg_tx: mpsc::Sender<WsMessage>,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> SlackResult<ConnectionEnd> {
        loop {
            tokio::select! {
                _ = shutdown_requested(shutdown_rx) => {
                    info!("Received shutdown signal");
                    return Ok(ConnectionEnd::Shutdown);
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(WsMessage::Text(text))) => {
                            if self.handle_socket_message(&text, &msg_tx).await
                                == SocketAction::Reconnect
                            {
                                return Ok(ConnectionEnd::Dropped);
                            }
                        }
                        Some(Ok(WsMessage::Ping(data))) => {
                            let _ = msg_tx.send(WsMessage::Pong(data)).await;
                        }
                        Some(Ok(WsMessage::Close(_))) => {
                            info!("WebSocket closed by server");
                            return Ok(ConnectionEnd::Dropped);
                        }
                        Some(Err(e)) => {
                            return Err(SlackError::WebSocket(e.to_string()));
                        }
                        None => {
                            return Ok(ConnectionEnd::Dropped);
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    /// Handle a Socket Mode message.
    async fn handle_socket_message(
        &self,
        text: &str,
        msg_tx: &mpsc::Sender<WsMessage>,
    ) -> SocketAction {
        debug!("Received Socket Mode message: {}", text);

        let envelope: SocketModeEnvelope = match serde_json::from_str(text) {
            Ok(env) => env,
            Err(e) => {
                warn!("Failed to parse Socket Mode envelope: {}", e);
                return SocketAction::Continue;
            }
        };

        // Slack retries envelopes that are not acknowledged within 3 seconds
        if !envelope.envelope_id.is_empty() {
            match serde_json::to_string(&SocketModeAck::new(&envelope.envelope_id)) {
                Ok(ack_json) => {
                    let _ = msg_tx.send(WsMessage::Text(ack_json)).await;
                }
                Err(e) => warn!("Failed to encode acknowledgment: {}", e),
            }
        }

        match envelope.envelope_type.as_str() {
            "events_api" => {
                if let Some(payload) = envelope.payload {
                    self.handle_event_payload(payload).await;
                }
                SocketAction::Continue
            }
            "hello" => {
                info!("Socket Mode connection established");
                SocketAction::Continue
            }
            "disconnect" => {
                info!("Received disconnect request from Slack");
                SocketAction::Reconnect
            }
            _ => {
                debug!("Unknown envelope type: {}", envelope.envelope_type);
                SocketAction::Continue
            }
        }
    }

    /// Dispatch an events API payload to the handler on its own task.
    async fn handle_event_payload(&self, payload: EventPayload) {
        let event = match parse_event(&payload) {
            Ok(SlackEvent::Message(event)) => event,
            Ok(SlackEvent::Unknown) => {
                debug!("Received unknown event type");
                return;
            }
            Err(e) => {
                warn!("Failed to parse event: {}", e);
                return;
            }
        };

        if event.user.is_some() && *self.bot_user_id.read().await == event.user {
            debug!("Ignoring own message {} in {}", event.ts, event.channel);
            return;
        }

        let Some(handler) = self.event_handler.read().await.clone() else {
            debug!("No event handler registered, dropping message");
            return;
        };

        tokio::spawn(async move {
            let channel = event.channel.clone();
            if let Err(e) = handler.handle_message(event).await {
                error!(channel = %channel, "Failed to handle message: {}", e);
            }
        });
    }
}

/// Resolve once the shutdown flag is raised.
async fn shutdown_requested(shutdown_rx: &mut watch::Receiver<bool>) {
    let _ = shutdown_rx.wait_for(|stop| *stop).await;
}
