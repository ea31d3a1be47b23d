//! Connection establishment tests
//!
//! Exercises the client-side retry state machine against live, refused, and
//! unresolvable targets: attempt budgeting, readiness timeout behavior, and
//! the terminal states on success and exhaustion.

use parley::network::{ConnectError, ConnectionState, Connector, RetryConfig};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;

/// Production shape, scaled down so exhausting the budget takes well under a
/// second
fn fast_retry_config() -> RetryConfig {
    RetryConfig {
        max_attempts: 5,
        base_delay: Duration::from_millis(1),
        max_backoff: Duration::from_millis(10),
        ready_timeout: Duration::from_millis(100),
        poll_interval: Duration::from_millis(20),
    }
}

/// An address on which nothing is listening
async fn refused_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind failed");
    let addr = listener.local_addr().expect("no local addr");
    drop(listener);
    addr.to_string()
}

#[tokio::test]
async fn test_connect_succeeds_against_live_listener() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind failed");
    let addr = listener.local_addr().expect("no local addr").to_string();

    let mut connector = Connector::with_config(fast_retry_config());
    let result = connector.connect(&addr).await;

    assert!(result.is_ok(), "expected success, got {:?}", result.err());
    assert_eq!(connector.state(), ConnectionState::Ready);
}

#[tokio::test]
async fn test_ready_strictly_before_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind failed");
    let addr = listener.local_addr().expect("no local addr").to_string();

    let config = RetryConfig {
        ready_timeout: Duration::from_secs(5),
        ..fast_retry_config()
    };
    let mut connector = Connector::with_config(config);

    let start = Instant::now();
    connector.connect(&addr).await.expect("connect failed");

    // Success must come from the readiness poll observing ready, not from
    // the timeout arm.
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_retries_exhausted_against_refused_port() {
    let addr = refused_addr().await;

    let mut connector = Connector::with_config(fast_retry_config());
    let err = connector.connect(&addr).await.unwrap_err();

    assert!(matches!(
        err,
        ConnectError::RetriesExhausted { attempts: 5 }
    ));
    assert_eq!(connector.state(), ConnectionState::Failed);
}

#[tokio::test]
async fn test_attempt_budget_is_respected() {
    let addr = refused_addr().await;

    let config = RetryConfig {
        max_attempts: 2,
        ..fast_retry_config()
    };
    let mut connector = Connector::with_config(config);
    let err = connector.connect(&addr).await.unwrap_err();

    assert!(matches!(
        err,
        ConnectError::RetriesExhausted { attempts: 2 }
    ));
}

#[tokio::test]
async fn test_unresolvable_address_is_attempt_failure_not_panic() {
    // No port, not resolvable: every attempt fails at address resolution and
    // the budget still governs the outcome.
    let config = RetryConfig {
        max_attempts: 3,
        ..fast_retry_config()
    };
    let mut connector = Connector::with_config(config);
    let err = connector.connect("definitely not an address").await.unwrap_err();

    assert!(matches!(
        err,
        ConnectError::RetriesExhausted { attempts: 3 }
    ));
    assert_eq!(connector.state(), ConnectionState::Failed);
}

#[tokio::test]
async fn test_readiness_wait_holds_attempt_open_until_timeout() {
    let addr = refused_addr().await;

    let config = RetryConfig {
        max_attempts: 1,
        ready_timeout: Duration::from_millis(150),
        poll_interval: Duration::from_millis(30),
        ..fast_retry_config()
    };
    let mut connector = Connector::with_config(config);

    let start = Instant::now();
    let err = connector.connect(&addr).await.unwrap_err();
    let elapsed = start.elapsed();

    // Refused dials are instant, so only the readiness wait can account for
    // the attempt taking its full timeout.
    assert!(matches!(err, ConnectError::RetriesExhausted { attempts: 1 }));
    assert!(
        elapsed >= Duration::from_millis(150),
        "attempt gave up after {:?}, before the readiness timeout",
        elapsed
    );
}
