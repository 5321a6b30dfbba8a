// src/utils/http.rs

//! HTTP client utilities.

use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::ApiConfig;

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &ApiConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Status code and body of a completed GET.
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub status: u16,
    pub body: String,
}

/// Serializes every outbound request through one global slot.
///
/// The slot is held for the request plus a fixed pause after it completes,
/// which caps the total request rate no matter how many jobs are polling.
/// Every wait observes the cancellation token, and the slot guard is dropped
/// on every exit path, including when the caller drops the future.
pub struct RateLimitedTransport {
    client: reqwest::Client,
    slot: Mutex<()>,
    delay: Duration,
}

impl RateLimitedTransport {
    pub fn new(client: reqwest::Client, delay: Duration) -> Self {
        Self {
            client,
            slot: Mutex::new(()),
            delay,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `request` while holding the slot, then keep it for the configured delay.
    pub async fn execute<F, T>(&self, cancel: &CancellationToken, request: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let _slot = tokio::select! {
            guard = self.slot.lock() => guard,
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
        };

        let result = tokio::select! {
            result = request => result,
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
        };

        tokio::select! {
            _ = tokio::time::sleep(self.delay) => {}
            _ = cancel.cancelled() => {}
        }

        result
    }

    /// GET `url` and read the whole body inside the slot.
    pub async fn get(&self, url: Url, cancel: &CancellationToken) -> Result<FetchedBody> {
        let client = &self.client;
        self.execute(cancel, async move {
            let response = client.get(url).send().await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok(FetchedBody { status, body })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    fn transport(delay_ms: u64) -> Arc<RateLimitedTransport> {
        Arc::new(RateLimitedTransport::new(
            reqwest::Client::new(),
            Duration::from_millis(delay_ms),
        ))
    }

    #[test]
    fn test_create_client() {
        assert!(create_async_client(&ApiConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_requests_are_spaced() {
        let transport = transport(80);
        let starts = Arc::new(std::sync::Mutex::new(Vec::new()));
        let cancel = CancellationToken::new();

        let request = |starts: Arc<std::sync::Mutex<Vec<Instant>>>| async move {
            starts.lock().unwrap().push(Instant::now());
            Ok::<_, AppError>(())
        };

        let (a, b) = tokio::join!(
            transport.execute(&cancel, request(Arc::clone(&starts))),
            transport.execute(&cancel, request(Arc::clone(&starts))),
        );
        assert!(a.is_ok() && b.is_ok());

        let starts = starts.lock().unwrap();
        assert_eq!(starts.len(), 2);
        assert!(starts[1].duration_since(starts[0]) >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn test_cancelled_request_releases_slot() {
        let transport = transport(10_000);
        let cancel = CancellationToken::new();

        let pending = {
            let transport = Arc::clone(&transport);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                transport
                    .execute(&cancel, std::future::pending::<Result<()>>())
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
        let result = pending.await.unwrap();
        assert!(matches!(result, Err(AppError::Cancelled)));

        assert!(transport.slot.try_lock().is_ok());
    }

    #[tokio::test]
    async fn test_cancel_during_delay_keeps_result() {
        let transport = transport(10_000);
        let cancel = CancellationToken::new();

        let task = {
            let transport = Arc::clone(&transport);
            let cancel = cancel.clone();
            tokio::spawn(async move { transport.execute(&cancel, async { Ok(5) }).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("delay should be interrupted")
            .unwrap();
        assert_eq!(result.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_cancel_while_waiting_for_slot() {
        let transport = transport(10_000);
        let holder = CancellationToken::new();
        let waiter = CancellationToken::new();

        let _busy = {
            let transport = Arc::clone(&transport);
            let holder = holder.clone();
            tokio::spawn(async move { transport.execute(&holder, async { Ok(()) }).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        waiter.cancel();
        let result = transport.execute(&waiter, async { Ok(()) }).await;
        assert!(matches!(result, Err(AppError::Cancelled)));

        holder.cancel();
    }
}
