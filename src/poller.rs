// Poller Module - self-rescheduling periodic polling
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

/// Run `tick` forever. The next tick is due `period` after the previous one
/// started; a tick that overruns delays the next one instead of overlapping it.
pub async fn poll_every<F, Fut>(period: Duration, mut tick: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        let started = Instant::now();
        tick().await;
        sleep_until(started + period).await;
    }
}

/// A spawned poll loop that stops when dropped
pub struct PollTask(JoinHandle<()>);

impl PollTask {
    pub fn spawn<F, Fut>(period: Duration, tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        PollTask(tokio::spawn(poll_every(period, tick)))
    }
}

impl Drop for PollTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}
