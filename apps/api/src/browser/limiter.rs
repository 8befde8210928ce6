use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::models::JobSource;

pub const DEFAULT_SESSIONS_PER_SOURCE: usize = 2;

/// Caps concurrent browser sessions per job source. Callers over the cap wait in
/// FIFO order instead of failing; the permit is released when the session closes.
#[derive(Debug)]
pub struct SessionLimiter {
    per_source: usize,
    semaphores: Mutex<HashMap<JobSource, Arc<Semaphore>>>,
}

impl SessionLimiter {
    pub fn new(per_source: usize) -> Self {
        Self {
            per_source: per_source.max(1),
            semaphores: Mutex::new(HashMap::new()),
        }
    }

    pub async fn acquire(&self, source: JobSource) -> Result<OwnedSemaphorePermit, AcquireError> {
        let semaphore = self.semaphore(source);
        if semaphore.available_permits() == 0 {
            debug!("Session limit reached for {}, queueing", source.as_str());
        }
        semaphore.acquire_owned().await
    }

    pub fn available(&self, source: JobSource) -> usize {
        self.semaphore(source).available_permits()
    }

    fn semaphore(&self, source: JobSource) -> Arc<Semaphore> {
        let mut semaphores = self
            .semaphores
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        semaphores
            .entry(source)
            .or_insert_with(|| Arc::new(Semaphore::new(self.per_source)))
            .clone()
    }
}

impl Default for SessionLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_SESSIONS_PER_SOURCE)
    }
}
