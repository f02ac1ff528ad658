//! Cancellation and deadline propagation for crawl calls.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::adapter::AdapterError;

/// Call-scoped context handed to every adapter operation.
///
/// A context is cancelled either explicitly (through [`CrawlContext::cancel`]
/// on it or any ancestor) or implicitly once its deadline passes. Child
/// contexts created with [`CrawlContext::with_timeout`] inherit the parent's
/// cancellation and keep the tighter of the two deadlines.
#[derive(Debug, Clone)]
pub struct CrawlContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for CrawlContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CrawlContext {
    /// Root context with no deadline.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(current) if current <= candidate => current,
            _ => candidate,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Child context that can be cancelled without affecting this one.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.deadline_passed()
    }

    /// The error describing why this context is done, if it is.
    pub fn err(&self) -> Option<AdapterError> {
        if self.token.is_cancelled() {
            Some(AdapterError::cancelled())
        } else if self.deadline_passed() {
            Some(AdapterError::deadline_exceeded())
        } else {
            None
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> AdapterError {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => AdapterError::cancelled(),
                    _ = tokio::time::sleep_until(deadline) => AdapterError::deadline_exceeded(),
                }
            }
            None => {
                self.token.cancelled().await;
                AdapterError::cancelled()
            }
        }
    }

    /// Runs `future` until it completes or the context is done, whichever is first.
    pub async fn run<F, T>(&self, future: F) -> Result<T, AdapterError>
    where
        F: Future<Output = T>,
    {
        if let Some(error) = self.err() {
            return Err(error);
        }
        tokio::select! {
            biased;
            error = self.done() => Err(error),
            output = future => Ok(output),
        }
    }

    /// Sleeps for `delay` unless the context finishes first.
    pub async fn sleep(&self, delay: Duration) -> Result<(), AdapterError> {
        self.run(tokio::time::sleep(delay)).await
    }

    fn deadline_passed(&self) -> bool {
        self.deadline
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false)
    }
}
