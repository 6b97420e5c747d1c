//! Redis connection management and shared primitives
//!
//! Wraps the `redis` crate's [`ConnectionManager`] behind a small pool type
//! and provides the sliding-window counter used for request rate limiting.

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

/// Shared Redis connection manager guarded by a Tokio mutex.
pub type SharedConnectionManager = Arc<Mutex<ConnectionManager>>;

/// Redis connection pool.
///
/// `ConnectionManager` multiplexes a single connection and reconnects on
/// failure, so one instance is shared by every caller.
pub struct RedisPool {
    manager: SharedConnectionManager,
}

impl RedisPool {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url).context("failed to construct Redis client")?;
        let connection_manager = ConnectionManager::new(client)
            .await
            .context("failed to initialize Redis connection manager")?;

        info!("Redis connection manager initialized");

        Ok(Self {
            manager: Arc::new(Mutex::new(connection_manager)),
        })
    }

    pub fn manager(&self) -> SharedConnectionManager {
        self.manager.clone()
    }
}

/// Outcome of a sliding-window check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowDecision {
    pub allowed: bool,
    /// Requests observed in the window, including this one when allowed.
    pub count: u32,
}

/// Sliding-window request counter over a Redis sorted set.
///
/// Each request is a member scored by its timestamp in milliseconds. On every
/// check, entries older than the window are dropped, the remainder counted,
/// and the new request admitted only while the count is below `max_requests`.
pub struct SlidingWindow {
    pub max_requests: u32,
    pub window: Duration,
}

impl SlidingWindow {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    /// Run the window check for `key` at `now_ms`.
    ///
    /// The caller supplies the timestamp so the operation stays deterministic
    /// under test. The sorted-set member is a UUID to keep same-millisecond
    /// requests distinct.
    pub async fn check(
        &self,
        conn: &mut ConnectionManager,
        key: &str,
        now_ms: u64,
    ) -> Result<WindowDecision, redis::RedisError> {
        let window_start = now_ms.saturating_sub(self.window.as_millis() as u64);
        let member = format!("{}:{}", now_ms, uuid::Uuid::new_v4());

        let (_, count): ((), u32) = redis::pipe()
            .atomic()
            .cmd("ZREMRANGEBYSCORE")
            .arg(key)
            .arg("-inf")
            .arg(window_start)
            .cmd("ZCARD")
            .arg(key)
            .query_async(conn)
            .await?;

        if count >= self.max_requests {
            return Ok(WindowDecision {
                allowed: false,
                count,
            });
        }

        let _: () = redis::pipe()
            .atomic()
            .cmd("ZADD")
            .arg(key)
            .arg(now_ms)
            .arg(&member)
            .ignore()
            .cmd("EXPIRE")
            .arg(key)
            .arg(self.window.as_secs().max(1))
            .ignore()
            .query_async(conn)
            .await?;

        Ok(WindowDecision {
            allowed: true,
            count: count + 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_configuration() {
        let window = SlidingWindow::new(10, Duration::from_secs(60));
        assert_eq!(window.max_requests, 10);
        assert_eq!(window.window.as_secs(), 60);
    }

    #[test]
    fn test_window_start_saturates_at_zero() {
        let window = SlidingWindow::new(5, Duration::from_secs(900));
        // A now earlier than the window length must not underflow.
        let now_ms: u64 = 1_000;
        let window_start = now_ms.saturating_sub(window.window.as_millis() as u64);
        assert_eq!(window_start, 0);
    }
}
