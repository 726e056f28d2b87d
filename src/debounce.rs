// Debounce Module - trailing-edge debounce with one pending slot per key
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::str::FromStr;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

/// How parameter updates share debounce slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceScope {
    /// Each parameter has its own slot; edits to different parameters never cancel each other
    PerParameter,
    /// One slot for all parameters; only the last-touched parameter in a burst is sent
    Shared,
}

impl DebounceScope {
    pub fn key_for(self, name: &str) -> String {
        match self {
            DebounceScope::PerParameter => name.to_string(),
            DebounceScope::Shared => String::new(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DebounceScope::PerParameter => "per_parameter",
            DebounceScope::Shared => "shared",
        }
    }
}

impl FromStr for DebounceScope {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "per_parameter" | "per-parameter" | "parameter" => Ok(DebounceScope::PerParameter),
            "shared" | "single" => Ok(DebounceScope::Shared),
            other => anyhow::bail!("Unknown debounce scope: {} (expected 'per_parameter' or 'shared')", other),
        }
    }
}

pub struct Debouncer<K> {
    delay: Duration,
    pending: HashMap<K, JoinHandle<()>>,
}

impl<K: Eq + Hash> Debouncer<K> {
    pub fn new(delay: Duration) -> Self {
        Debouncer {
            delay,
            pending: HashMap::new(),
        }
    }

    /// Cancel whatever is waiting under `key` and run `task` once `delay`
    /// passes without another call for the same key.
    ///
    /// Only the wait is cancellable: once the delay elapses the task is
    /// detached, so a request already on the wire is never aborted.
    pub fn schedule<F>(&mut self, key: K, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel(&key);
        self.pending.retain(|_, handle| !handle.is_finished());

        let deadline = Instant::now() + self.delay;
        let handle = tokio::spawn(async move {
            sleep_until(deadline).await;
            tokio::spawn(task);
        });
        self.pending.insert(key, handle);
    }

    /// Drop the pending task for `key`. Returns true if one was still waiting.
    pub fn cancel(&mut self, key: &K) -> bool {
        match self.pending.remove(key) {
            Some(handle) => {
                let waiting = !handle.is_finished();
                handle.abort();
                waiting
            }
            None => false,
        }
    }

    /// Number of keys still waiting for their delay to elapse
    pub fn pending(&self) -> usize {
        self.pending.values().filter(|h| !h.is_finished()).count()
    }
}

impl<K> Drop for Debouncer<K> {
    fn drop(&mut self) {
        for handle in self.pending.values() {
            handle.abort();
        }
    }
}
