// Parameter Panel - live tuning of the balance controller with server reconciliation
use std::collections::BTreeMap;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::api::{Endpoint, MonitorSnapshot};
use crate::config::PanelConfig;
use crate::debounce::{DebounceScope, Debouncer};
use crate::dispatch::{Dispatcher, PanelEvent};
use crate::notification::{Notification, NotificationBanner};
use crate::poller::PollTask;
use crate::sequence::Target;
use crate::slider::{three_decimals, Slider};

pub struct ParamGroup {
    pub title: &'static str,
    pub sliders: Vec<Slider>,
}

fn param(name: &'static str, label: &'static str, range: (f64, f64, f64), default: f64) -> Slider {
    Slider::new(name, label, range, default, three_decimals)
}

/// Every tunable the device accepts on `/param_update`, grouped as on the robot
pub fn default_groups() -> Vec<ParamGroup> {
    vec![
        ParamGroup {
            title: "Kalman Filter",
            sliders: vec![
                param("Q", "Process Noise (Q)", (0.001, 1.0, 0.001), 0.01),
                param("R", "Measurement Noise (R)", (0.01, 1.0, 0.01), 0.1),
                param("alpha", "Innovation Alpha", (0.0, 1.0, 0.01), 0.01),
                param("history", "History Window", (10.0, 100.0, 1.0), 50.0),
            ],
        },
        ParamGroup {
            title: "PID Control",
            sliders: vec![
                param("P", "P Gain", (0.0, 10.0, 0.1), 5.0),
                param("I", "I Gain", (0.0, 1.0, 0.001), 0.01),
                param("D", "D Gain", (0.0, 1.0, 0.001), 0.0),
                param("windup", "Windup Guard", (0.0, 100.0, 1.0), 20.0),
            ],
        },
        ParamGroup {
            title: "Movement",
            sliders: vec![
                param("speed_scale", "Speed Scale", (0.1, 2.0, 0.1), 1.0),
                param("turn_scale", "Turn Scale", (0.1, 2.0, 0.1), 1.0),
                param("step_size", "Step Size", (1.0, 10.0, 1.0), 5.0),
                param("smoothing", "Movement Smoothing", (0.0, 1.0, 0.01), 0.5),
            ],
        },
        ParamGroup {
            title: "Balance",
            sliders: vec![
                param("x_target", "X Balance Target", (-10.0, 10.0, 0.1), 0.0),
                param("y_target", "Y Balance Target", (-10.0, 10.0, 0.1), 0.0),
                param("sensitivity", "Balance Sensitivity", (0.1, 2.0, 0.1), 1.0),
                param("threshold", "Stability Threshold", (0.1, 5.0, 0.1), 1.0),
            ],
        },
    ]
}

/// Diagnostics text, "--" until the first monitor poll lands
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorView {
    pub kalman_x: String,
    pub kalman_y: String,
    pub pid_status: String,
    pub stability: String,
}

impl Default for MonitorView {
    fn default() -> Self {
        MonitorView {
            kalman_x: "--".to_string(),
            kalman_y: "--".to_string(),
            pid_status: "--".to_string(),
            stability: "--".to_string(),
        }
    }
}

pub struct ParameterPanel {
    pub groups: Vec<ParamGroup>,
    pub monitor: MonitorView,
    pub banner: NotificationBanner,
    unsent: BTreeMap<String, f64>,     // Latest edit per parameter that has not left the debounce yet
    debouncer: Debouncer<String>,
    scope: DebounceScope,
    epsilon: f64,
    dispatcher: Dispatcher,
}

impl ParameterPanel {
    pub fn new(config: &PanelConfig, dispatcher: Dispatcher) -> Self {
        ParameterPanel {
            groups: default_groups(),
            monitor: MonitorView::default(),
            banner: NotificationBanner::new(Duration::from_millis(config.param_notification_ms)),
            unsent: BTreeMap::new(),
            debouncer: Debouncer::new(Duration::from_millis(config.param_debounce_ms)),
            scope: config.debounce_scope(),
            epsilon: config.reconcile_epsilon,
            dispatcher,
        }
    }

    pub fn slider(&self, name: &str) -> Option<&Slider> {
        self.groups.iter().flat_map(|g| g.sliders.iter()).find(|s| s.id == name)
    }

    fn slider_mut(&mut self, name: &str) -> Option<&mut Slider> {
        self.groups.iter_mut().flat_map(|g| g.sliders.iter_mut()).find(|s| s.id == name)
    }

    /// A parameter slider moved: show the new value now, send it once the
    /// debounce window closes. Returns the new readout.
    pub fn update_param(&mut self, name: &str, value: f64) -> Option<String> {
        let Some(slider) = self.slider_mut(name) else {
            warn!(name, "update for unknown parameter");
            return None;
        };
        let value = slider.set(value);
        let readout = slider.readout();

        self.unsent.insert(name.to_string(), value);
        let task = send_param(self.dispatcher.clone(), name.to_string(), value);
        self.debouncer.schedule(self.scope.key_for(name), task);
        Some(readout)
    }

    pub fn nudge_param(&mut self, name: &str, steps: i32) -> Option<String> {
        let mut preview = self.slider(name)?.clone();
        let value = preview.nudge(steps);
        self.update_param(name, value)
    }

    /// Send every edit that has not reached the network yet, skipping the
    /// debounce. With a shared debounce slot this includes edits the slot
    /// dropped. Returns how many were sent.
    pub fn apply_pending(&mut self) -> usize {
        let unsent = std::mem::take(&mut self.unsent);
        let sent = unsent.len();
        for (name, value) in unsent {
            self.send_now(name, value);
        }
        info!(sent, "applied pending parameter changes");
        sent
    }

    /// Unsent edits, and how many debounce slots are still waiting
    pub fn pending_updates(&self) -> (usize, usize) {
        (self.unsent.len(), self.debouncer.pending())
    }

    /// Return every slider to its default and send all defaults right away,
    /// whatever the debounce scope. Returns how many were sent.
    pub fn reset_defaults(&mut self) -> usize {
        self.unsent.clear();
        let defaults: Vec<(&'static str, f64)> = self
            .groups
            .iter_mut()
            .flat_map(|g| g.sliders.iter_mut())
            .map(|s| (s.id, s.set(s.default)))
            .collect();
        for &(name, value) in &defaults {
            self.send_now(name.to_string(), value);
        }
        info!(count = defaults.len(), "parameters reset to defaults");
        defaults.len()
    }

    fn send_now(&mut self, name: String, value: f64) {
        self.debouncer.cancel(&self.scope.key_for(&name));
        tokio::spawn(send_param(self.dispatcher.clone(), name, value));
    }

    pub fn handle_event(&mut self, event: PanelEvent, now: Instant) {
        match event {
            PanelEvent::Settled { target, ticket, notice } => {
                if !self.dispatcher.sequencer().accept(&target, ticket) {
                    debug!(endpoint = %target.endpoint, name = ?target.name, ticket, "dropping stale response");
                    return;
                }
                if let Some(notice) = notice {
                    self.banner.show(notice, now);
                }
            }
            PanelEvent::Monitor { ticket, snapshot } => {
                if self.dispatcher.sequencer().accept(&Endpoint::MonitorData.into(), ticket) {
                    self.render_monitor(&snapshot);
                }
            }
            PanelEvent::ParamSent { name, value } => {
                // A newer edit made since then is still unsent
                if self.unsent.get(&name) == Some(&value) {
                    self.unsent.remove(&name);
                }
            }
            PanelEvent::Sensor { .. } => {}
        }
    }

    /// Overwrite the diagnostics and pull sliders to the device's values.
    /// Returns the parameters that were snapped.
    pub fn render_monitor(&mut self, snapshot: &MonitorSnapshot) -> Vec<String> {
        self.monitor = MonitorView {
            kalman_x: format!("X: {:.3} (Q: {:.3})", snapshot.kalman_x.value, snapshot.kalman_x.q),
            kalman_y: format!("Y: {:.3} (Q: {:.3})", snapshot.kalman_y.value, snapshot.kalman_y.q),
            pid_status: format!("Error: {:.3}", snapshot.pid_error),
            stability: format!("{:.1}", snapshot.stability),
        };
        self.reconcile(&snapshot.parameters)
    }

    /// The device is authoritative: any slider more than epsilon away from
    /// the reported value is moved to it. This can override a slider that
    /// is being dragged.
    pub fn reconcile(&mut self, parameters: &BTreeMap<String, f64>) -> Vec<String> {
        let epsilon = self.epsilon;
        let mut snapped = Vec::new();
        for (name, &value) in parameters {
            if let Some(slider) = self.slider_mut(name) {
                if (slider.value() - value).abs() > epsilon {
                    slider.set(value);
                    snapped.push(name.clone());
                }
            }
        }
        if !snapped.is_empty() {
            debug!(?snapped, "sliders reconciled with device");
        }
        snapped
    }

    pub fn start_monitor_poll(&self, period: Duration) -> PollTask {
        let dispatcher = self.dispatcher.clone();
        PollTask::spawn(period, move || {
            let dispatcher = dispatcher.clone();
            async move {
                poll_monitor(&dispatcher).await;
            }
        })
    }
}

fn send_param(dispatcher: Dispatcher, name: String, value: f64) -> impl Future<Output = ()> + Send + 'static {
    async move {
        dispatcher.send(PanelEvent::ParamSent { name: name.clone(), value });
        let client = dispatcher.client().clone();
        let request_name = name.clone();
        dispatcher.fire(
            Target::named(Endpoint::ParamUpdate, name.clone()),
            async move { client.param_update(&request_name, value).await },
            move |result| match result {
                Ok(response) if response.success => Some(Notification::success(response.message)),
                Ok(response) => {
                    warn!(name = %name, value, message = %response.message, "device rejected parameter");
                    let message = if response.message.is_empty() {
                        format!("Parameter {} rejected", name)
                    } else {
                        response.message
                    };
                    Some(Notification::error(message))
                }
                Err(e) => {
                    error!(error = %e, name = %name, value, "parameter update failed");
                    Some(Notification::error("Failed to update parameter"))
                }
            },
        );
    }
}

/// One monitor poll. Failures are logged and otherwise ignored.
pub async fn poll_monitor(dispatcher: &Dispatcher) -> bool {
    let ticket = dispatcher.sequencer().begin(Endpoint::MonitorData);
    match dispatcher.client().monitor_data().await {
        Ok(snapshot) => {
            dispatcher.send(PanelEvent::Monitor { ticket, snapshot });
            true
        }
        Err(e) => {
            warn!(error = %e, "monitor poll failed");
            false
        }
    }
}
