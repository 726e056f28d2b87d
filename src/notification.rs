// Notification banner - transient success/error messages that expire on their own
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub text: String,
    pub kind: NotificationKind,
}

impl Notification {
    pub fn success(text: impl Into<String>) -> Self {
        Notification { text: text.into(), kind: NotificationKind::Success }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Notification { text: text.into(), kind: NotificationKind::Error }
    }
}

/// Holds at most one message. A new message replaces the current one and
/// restarts the timeout.
#[derive(Debug)]
pub struct NotificationBanner {
    ttl: Duration,
    current: Option<(Notification, Instant)>,
}

impl NotificationBanner {
    pub fn new(ttl: Duration) -> Self {
        NotificationBanner { ttl, current: None }
    }

    pub fn show(&mut self, notification: Notification, now: Instant) {
        self.current = Some((notification, now));
    }

    /// The message on display at `now`, if it has not expired
    pub fn visible(&self, now: Instant) -> Option<&Notification> {
        match &self.current {
            Some((notification, shown_at)) if now.duration_since(*shown_at) < self.ttl => Some(notification),
            _ => None,
        }
    }

    /// Forget an expired message
    pub fn expire(&mut self, now: Instant) {
        if self.visible(now).is_none() {
            self.current = None;
        }
    }
}
