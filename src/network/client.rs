use crate::network::Connection;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

// Client connection establishment constants
pub const MAX_CONNECT_ATTEMPTS: u32 = 5;
pub const CONNECT_BASE_DELAY: Duration = Duration::from_secs(2);
pub const CONNECT_MAX_BACKOFF: Duration = Duration::from_secs(30);
pub const READY_TIMEOUT: Duration = Duration::from_secs(30);
pub const READY_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Observed state of the connection being established.
///
/// Owned exclusively by the [`Connector`]; sessions only ever see a
/// connection that already reached `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Ready,
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Ready => "ready",
            ConnectionState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Configuration for the connection retry state machine
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum connection attempts before giving up
    pub max_attempts: u32,
    /// Base delay for the exponential backoff term
    pub base_delay: Duration,
    /// Hard cap on any single backoff delay
    pub max_backoff: Duration,
    /// How long one attempt waits for the server to become ready
    pub ready_timeout: Duration,
    /// Interval between readiness probes within one attempt
    pub poll_interval: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: MAX_CONNECT_ATTEMPTS,
            base_delay: CONNECT_BASE_DELAY,
            max_backoff: CONNECT_MAX_BACKOFF,
            ready_timeout: READY_TIMEOUT,
            poll_interval: READY_POLL_INTERVAL,
        }
    }
}

/// Errors produced by connection establishment
#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("Invalid server address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Server did not become ready within {timeout:?}")]
    ReadyTimeout { timeout: Duration },

    #[error("Unable to connect after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

/// Compute the retry delay for a 1-indexed attempt number.
///
/// The delay is `base * 2^attempt` plus a uniform jitter in
/// `[0, base * 2^attempt)`, with the sum clamped to `max_backoff`. The
/// resulting delay always satisfies
/// `base * 2^attempt <= delay <= min(max_backoff, 2 * base * 2^attempt)`.
pub fn backoff_with_jitter(config: &RetryConfig, attempt: u32, rng: &mut impl Rng) -> Duration {
    let exp_backoff = config.base_delay.as_secs_f64() * 2f64.powi(attempt as i32);
    let jitter = rng.gen::<f64>() * exp_backoff;
    let delay = (exp_backoff + jitter).min(config.max_backoff.as_secs_f64());
    Duration::from_secs_f64(delay)
}

/// Client-side connection establishment.
///
/// Given a target address, produces a ready-to-use [`Connection`] or fails
/// permanently once the attempt budget is spent. Each attempt resolves the
/// address, then polls readiness at a fixed interval under an overall
/// timeout; failed attempts back off exponentially with jitter.
pub struct Connector {
    config: RetryConfig,
    rng: StdRng,
    state: ConnectionState,
}

impl Default for Connector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector {
    pub fn new() -> Self {
        Self::with_config(RetryConfig::default())
    }

    pub fn with_config(config: RetryConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Construct with an explicit rng so backoff decisions are reproducible
    pub fn with_rng(config: RetryConfig, rng: StdRng) -> Self {
        Self {
            config,
            rng,
            state: ConnectionState::Idle,
        }
    }

    /// Current state of the connection being established
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Establish a connection to `addr`, retrying with backoff until the
    /// attempt budget is exhausted.
    ///
    /// On exhaustion the connector is in the terminal `Failed` state and
    /// returns [`ConnectError::RetriesExhausted`]; there is no recovery path
    /// short of restarting the whole pipeline. Callers at the process level
    /// treat that as fatal.
    pub async fn connect(&mut self, addr: &str) -> Result<Connection, ConnectError> {
        let max_attempts = self.config.max_attempts;

        for attempt in 1..=max_attempts {
            info!(
                "Attempt {}/{}: connecting to chat server at {}...",
                attempt, max_attempts, addr
            );

            let failure = match resolve_address(addr).await {
                Ok(target) => match self.wait_for_ready(target).await {
                    Ok(stream) => {
                        info!("Connected to the chat server");
                        return Ok(Connection::new(stream));
                    }
                    Err(e) => e,
                },
                Err(e) => e,
            };

            warn!(
                "Connection failed (attempt {}/{}): {}",
                attempt, max_attempts, failure
            );

            if attempt < max_attempts {
                let delay = backoff_with_jitter(&self.config, attempt, &mut self.rng);
                info!("Retrying in {:.1}s...", delay.as_secs_f64());
                tokio::time::sleep(delay).await;
            }
        }

        self.state = ConnectionState::Failed;
        Err(ConnectError::RetriesExhausted {
            attempts: max_attempts,
        })
    }

    /// Poll the transport until it reports ready or the readiness timeout
    /// elapses.
    ///
    /// Each tick nudges the connection forward with an idempotent dial
    /// bounded by the poll interval and inspects the resulting state. A
    /// timeout here is an attempt failure, not a terminal one.
    async fn wait_for_ready(&mut self, target: SocketAddr) -> Result<TcpStream, ConnectError> {
        self.state = ConnectionState::Connecting;
        info!("Waiting for chat server to become available...");

        let ready_timeout = self.config.ready_timeout;
        let deadline = tokio::time::sleep(ready_timeout);
        tokio::pin!(deadline);
        let mut ticker = tokio::time::interval(self.config.poll_interval);

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    warn!(
                        "Server did not become available within {}s",
                        ready_timeout.as_secs()
                    );
                    return Err(ConnectError::ReadyTimeout { timeout: ready_timeout });
                }
                _ = ticker.tick() => {
                    match tokio::time::timeout(
                        self.config.poll_interval,
                        TcpStream::connect(target),
                    ).await {
                        Ok(Ok(stream)) => {
                            self.state = ConnectionState::Ready;
                            info!("Connection state: {}", self.state);
                            return Ok(stream);
                        }
                        Ok(Err(e)) => {
                            debug!("Connection state: {} ({})", self.state, e);
                        }
                        Err(_) => {
                            debug!("Connection state: {} (dial still pending)", self.state);
                        }
                    }
                }
            }
        }
    }
}

/// Resolve `host:port` to a socket address.
///
/// Resolution failure is a per-attempt configuration error, reported back to
/// the retry loop rather than escalated.
async fn resolve_address(addr: &str) -> Result<SocketAddr, ConnectError> {
    let mut candidates =
        tokio::net::lookup_host(addr)
            .await
            .map_err(|e| ConnectError::InvalidAddress {
                address: addr.to_string(),
                reason: e.to_string(),
            })?;

    candidates.next().ok_or_else(|| ConnectError::InvalidAddress {
        address: addr.to_string(),
        reason: "address resolved to no candidates".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_rng(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    #[test]
    fn test_backoff_within_bounds_for_every_attempt() {
        let config = RetryConfig::default();

        for seed in 0..50 {
            let mut rng = seeded_rng(seed);
            for attempt in 1..=config.max_attempts {
                let delay = backoff_with_jitter(&config, attempt, &mut rng);
                let exp = config.base_delay.as_secs_f64() * 2f64.powi(attempt as i32);
                let upper = (2.0 * exp).min(config.max_backoff.as_secs_f64());
                let lower = exp.min(config.max_backoff.as_secs_f64());

                assert!(
                    delay.as_secs_f64() >= lower,
                    "attempt {} delay {:?} below lower bound {}s",
                    attempt,
                    delay,
                    lower
                );
                assert!(
                    delay.as_secs_f64() <= upper,
                    "attempt {} delay {:?} above upper bound {}s",
                    attempt,
                    delay,
                    upper
                );
            }
        }
    }

    #[test]
    fn test_backoff_never_exceeds_max() {
        let config = RetryConfig::default();
        let mut rng = seeded_rng(7);

        for attempt in 1..=10 {
            let delay = backoff_with_jitter(&config, attempt, &mut rng);
            assert!(delay <= config.max_backoff);
        }
    }

    #[test]
    fn test_backoff_grows_with_attempt_before_cap() {
        // With zeroed jitter the pre-cap delays double per attempt. Using the
        // lower bound (jitter >= 0) is enough to see the growth.
        let config = RetryConfig {
            base_delay: Duration::from_millis(10),
            max_backoff: Duration::from_secs(3600),
            ..RetryConfig::default()
        };
        let mut rng = seeded_rng(42);

        let d1 = backoff_with_jitter(&config, 1, &mut rng);
        let d5 = backoff_with_jitter(&config, 5, &mut rng);
        assert!(d1.as_secs_f64() >= 0.020 && d1.as_secs_f64() < 0.040);
        assert!(d5.as_secs_f64() >= 0.320 && d5.as_secs_f64() < 0.640);
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Idle.to_string(), "idle");
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
        assert_eq!(ConnectionState::Ready.to_string(), "ready");
        assert_eq!(ConnectionState::Failed.to_string(), "failed");
    }

    #[test]
    fn test_default_config_matches_constants() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.base_delay, Duration::from_secs(2));
        assert_eq!(config.max_backoff, Duration::from_secs(30));
        assert_eq!(config.ready_timeout, Duration::from_secs(30));
        assert_eq!(config.poll_interval, Duration::from_secs(2));
    }

    #[test]
    fn test_connector_starts_idle() {
        let connector = Connector::new();
        assert_eq!(connector.state(), ConnectionState::Idle);
    }
}
