// Request sequencing - makes rendering last-request-wins instead of last-response-wins
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::api::Endpoint;

/// What a newer request supersedes: a whole endpoint, or one named item on
/// it (a parameter on `/param_update`). Different targets never drop each
/// other's results.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub endpoint: Endpoint,
    pub name: Option<String>,
}

impl Target {
    pub fn named(endpoint: Endpoint, name: impl Into<String>) -> Self {
        Target {
            endpoint,
            name: Some(name.into()),
        }
    }
}

impl From<Endpoint> for Target {
    fn from(endpoint: Endpoint) -> Self {
        Target { endpoint, name: None }
    }
}

/// Hands out one increasing ticket per request and remembers, per target,
/// the newest ticket whose response has already been rendered.
#[derive(Debug)]
pub struct RequestSequencer {
    issued: [AtomicU64; Endpoint::COUNT],
    completed: Mutex<HashMap<Target, u64>>,
}

impl Default for RequestSequencer {
    fn default() -> Self {
        RequestSequencer {
            issued: std::array::from_fn(|_| AtomicU64::new(0)),
            completed: Mutex::new(HashMap::new()),
        }
    }
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ticket for a request about to be sent. Tickets start at 1 and
    /// increase per endpoint, so they also order requests within a target.
    pub fn begin(&self, endpoint: Endpoint) -> u64 {
        self.issued[endpoint.index()].fetch_add(1, Ordering::Relaxed) + 1
    }

    /// True if this response should be rendered, i.e. no newer request to
    /// the same target has been accepted yet.
    pub fn accept(&self, target: &Target, ticket: u64) -> bool {
        let mut completed = self.completed.lock().unwrap_or_else(PoisonError::into_inner);
        match completed.get_mut(target) {
            Some(newest) if *newest >= ticket => false,
            Some(newest) => {
                *newest = ticket;
                true
            }
            None => {
                completed.insert(target.clone(), ticket);
                true
            }
        }
    }
}
