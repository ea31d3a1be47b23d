use crate::messages::ChatMessage;
use crate::network::{Connection, ConnectionError, ConnectionReader, ConnectionWriter};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

// Send loop pacing: uniform interval between generated messages
pub const MIN_SEND_INTERVAL: Duration = Duration::from_secs(3);
pub const MAX_SEND_INTERVAL: Duration = Duration::from_secs(7);

/// Configuration for one side of a duplex chat session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Fixed sender identity stamped on every outbound envelope
    pub sender: String,
    /// Lower bound of the randomized pause between sends
    pub min_send_interval: Duration,
    /// Upper bound of the randomized pause between sends
    pub max_send_interval: Duration,
}

impl SessionConfig {
    pub fn new(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            min_send_interval: MIN_SEND_INTERVAL,
            max_send_interval: MAX_SEND_INTERVAL,
        }
    }
}

/// Why a session loop stopped.
///
/// Each loop terminates independently; one loop's outcome never forces the
/// other loop to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopOutcome {
    /// The peer closed the stream cleanly
    StreamClosed,
    /// An unrecoverable transport error ended the loop
    TransportError,
    /// An external shutdown request interrupted the loop
    ShutdownRequested,
}

/// Terminal outcomes of both directions of a finished session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub receive: LoopOutcome,
    pub send: LoopOutcome,
}

/// A bidirectional chat exchange over one established connection.
///
/// Runs a receive loop and a send loop as independent tasks sharing nothing
/// but the split stream: the receive loop owns the read half, the send loop
/// the write half. The session is over only when both loops have exited;
/// [`ChatSession::run`] waits for the pair and reports both outcomes.
pub struct ChatSession {
    config: SessionConfig,
    rng: StdRng,
}

impl ChatSession {
    pub fn new(config: SessionConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Construct with an explicit rng so pacing and message generation are
    /// reproducible
    pub fn with_rng(config: SessionConfig, rng: StdRng) -> Self {
        Self { config, rng }
    }

    /// Run both directions to completion.
    ///
    /// Neither loop retries: any closure or transport error ends that loop
    /// permanently. Reconnection means restarting the whole
    /// connector-then-session pipeline from above.
    pub async fn run(
        self,
        connection: Connection,
        shutdown: watch::Receiver<bool>,
    ) -> SessionSummary {
        let (reader, writer) = connection.into_split();

        let recv_task = tokio::spawn(receive_loop(reader, shutdown.clone()));
        let send_task = tokio::spawn(send_loop(writer, self.config, self.rng, shutdown));

        let (receive, send) = tokio::join!(recv_task, send_task);
        let receive = receive.unwrap_or_else(|e| {
            error!("Receive task aborted: {}", e);
            LoopOutcome::TransportError
        });
        let send = send.unwrap_or_else(|e| {
            error!("Send task aborted: {}", e);
            LoopOutcome::TransportError
        });

        SessionSummary { receive, send }
    }
}

/// Resolve only when a shutdown has actually been requested.
///
/// A dropped sender means no shutdown can ever arrive, so the future parks
/// forever rather than spinning on the closed channel.
pub(crate) async fn shutdown_signal(rx: &mut watch::Receiver<bool>) {
    if *rx.borrow() {
        return;
    }
    while rx.changed().await.is_ok() {
        if *rx.borrow() {
            return;
        }
    }
    std::future::pending::<()>().await;
}

/// Drain inbound envelopes until the peer closes, a read fails, or shutdown
/// is requested
async fn receive_loop(
    mut reader: ConnectionReader,
    mut shutdown: watch::Receiver<bool>,
) -> LoopOutcome {
    loop {
        tokio::select! {
            _ = shutdown_signal(&mut shutdown) => {
                info!("Receive loop stopping: shutdown requested");
                return LoopOutcome::ShutdownRequested;
            }
            result = reader.receive() => match result {
                Ok(envelope) => {
                    info!("Received from {}: {}", envelope.sender(), envelope.message());
                }
                Err(ConnectionError::Closed) => {
                    info!("Peer disconnected.");
                    return LoopOutcome::StreamClosed;
                }
                Err(e) => {
                    error!("Error receiving message: {}", e);
                    return LoopOutcome::TransportError;
                }
            }
        }
    }
}

/// Periodically emit a freshly generated envelope until a write fails or
/// shutdown is requested
async fn send_loop(
    mut writer: ConnectionWriter,
    config: SessionConfig,
    mut rng: StdRng,
    mut shutdown: watch::Receiver<bool>,
) -> LoopOutcome {
    loop {
        let pause = send_interval(&config, &mut rng);
        tokio::select! {
            _ = shutdown_signal(&mut shutdown) => {
                info!("Send loop stopping: shutdown requested");
                return LoopOutcome::ShutdownRequested;
            }
            _ = tokio::time::sleep(pause) => {}
        }

        let envelope = chat_line(&config.sender, &mut rng);
        match writer.send(&envelope).await {
            Ok(()) => info!("Sent: {}", envelope.message()),
            Err(e) => {
                error!("Error sending message: {}", e);
                return LoopOutcome::TransportError;
            }
        }
    }
}

/// Pick the next pause before sending: uniform whole milliseconds in
/// `[min_send_interval, max_send_interval]`
pub fn send_interval(config: &SessionConfig, rng: &mut impl Rng) -> Duration {
    let min = config.min_send_interval.as_millis() as u64;
    let max = config.max_send_interval.as_millis() as u64;
    Duration::from_millis(rng.gen_range(min..=max))
}

/// Generate the next outbound envelope for `sender`: a fixed template with a
/// random numeric suffix
pub fn chat_line(sender: &str, rng: &mut impl Rng) -> ChatMessage {
    let suffix: u32 = rng.gen_range(0..100);
    ChatMessage::new(sender, format!("{} says: Random message {}", sender, suffix))
}
