//! In-memory [`VersionSource`] that counts fetches

use crate::core::{Result, UpdateError};
use crate::upgrade::VersionSource;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Version source returning a fixed version, with queued one-shot errors
#[derive(Debug)]
pub struct FakeVersionSource {
    latest: String,
    errors: Mutex<VecDeque<UpdateError>>,
    delay: Mutex<Duration>,
    calls: AtomicUsize,
}

impl FakeVersionSource {
    pub fn new(latest: &str) -> Self {
        Self {
            latest: latest.to_string(),
            errors: Mutex::new(VecDeque::new()),
            delay: Mutex::new(Duration::ZERO),
            calls: AtomicUsize::new(0),
        }
    }

    /// Make the next fetch fail with `error`
    pub fn push_error(&self, error: UpdateError) {
        if let Ok(mut errors) = self.errors.lock() {
            errors.push_back(error);
        }
    }

    /// Sleep this long inside every fetch
    pub fn set_delay(&self, delay: Duration) {
        if let Ok(mut current) = self.delay.lock() {
            *current = delay;
        }
    }

    /// Number of fetches so far, failed ones included
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl VersionSource for FakeVersionSource {
    async fn fetch_latest(&self) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.delay.lock().map(|d| *d).unwrap_or_default();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.errors.lock().ok().and_then(|mut errors| errors.pop_front()) {
            return Err(error);
        }
        Ok(self.latest.clone())
    }
}
