// Dispatch Module - fire-and-forget requests that report back to the panel's event loop
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::api::{ApiError, DeviceClient, MonitorSnapshot, SensorSnapshot};
use crate::notification::Notification;
use crate::sequence::{RequestSequencer, Target};

/// Results delivered to a panel's event loop. Each carries the ticket it
/// was sent with so stale responses can be dropped.
#[derive(Debug)]
pub enum PanelEvent {
    Settled {
        target: Target,
        ticket: u64,
        notice: Option<Notification>,
    },
    /// A parameter value left the debounce queue and is on its way to the device
    ParamSent {
        name: String,
        value: f64,
    },
    Sensor {
        ticket: u64,
        snapshot: SensorSnapshot,
    },
    Monitor {
        ticket: u64,
        snapshot: MonitorSnapshot,
    },
}

#[derive(Clone)]
pub struct Dispatcher {
    client: DeviceClient,
    sequencer: Arc<RequestSequencer>,
    events: UnboundedSender<PanelEvent>,
}

impl Dispatcher {
    pub fn new(client: DeviceClient) -> (Self, UnboundedReceiver<PanelEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher {
            client,
            sequencer: Arc::new(RequestSequencer::new()),
            events,
        };
        (dispatcher, rx)
    }

    pub fn client(&self) -> &DeviceClient {
        &self.client
    }

    pub fn sequencer(&self) -> &RequestSequencer {
        &self.sequencer
    }

    /// Take a ticket now, run `request` on its own task and send the
    /// notice produced by `outcome` back to the panel.
    pub fn fire<T, Fut, O>(&self, target: impl Into<Target>, request: Fut, outcome: O)
    where
        T: Send + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
        O: FnOnce(Result<T, ApiError>) -> Option<Notification> + Send + 'static,
    {
        let target = target.into();
        let ticket = self.sequencer.begin(target.endpoint);
        let events = self.events.clone();
        debug!(endpoint = %target.endpoint, name = ?target.name, ticket, "dispatching");
        tokio::spawn(async move {
            let notice = outcome(request.await);
            // The panel may already be gone; nothing left to render into
            let _ = events.send(PanelEvent::Settled { target, ticket, notice });
        });
    }

    pub fn send(&self, event: PanelEvent) {
        let _ = self.events.send(event);
    }
}
