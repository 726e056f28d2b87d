// Command Panel - hop and lighting commands plus live sensor status
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use crate::api::Endpoint;
use crate::api::SensorSnapshot;
use crate::config::PanelConfig;
use crate::dispatch::{Dispatcher, PanelEvent};
use crate::notification::{Notification, NotificationBanner};
use crate::poller::PollTask;
use crate::slider::{self, Slider};
use crate::types::Rgb;

pub const HOP_SPEED: &str = "hopSpeed";
pub const AIR_TIME: &str = "airTime";
pub const BRIGHTNESS: &str = "brightness";

/// Lighting patterns the device understands, in button order
pub const PATTERNS: [&str; 4] = ["rainbow", "pulse", "breath", "none"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Checking,
    Connected,
    Disconnected,
}

pub struct CommandPanel {
    pub speed: Slider,
    pub air_time: Slider,
    pub brightness: Slider,
    pub color: String,
    pub sensor_lines: Vec<String>,
    pub connection: ConnectionState,
    pub banner: NotificationBanner,
    dispatcher: Dispatcher,
}

impl CommandPanel {
    pub fn new(config: &PanelConfig, dispatcher: Dispatcher) -> Self {
        CommandPanel {
            speed: Slider::new(HOP_SPEED, "Speed (1-100)", (1.0, 100.0, 1.0), config.hop_speed, slider::integer),
            air_time: Slider::new(AIR_TIME, "Air Time (0.1-1.0s)", (1.0, 10.0, 1.0), config.air_time, slider::tenths),
            brightness: Slider::new(BRIGHTNESS, "Brightness", (0.0, 255.0, 1.0), config.brightness, slider::integer),
            color: config.color.clone(),
            sensor_lines: vec!["Initializing sensors...".to_string()],
            connection: ConnectionState::Checking,
            banner: NotificationBanner::new(Duration::from_millis(config.command_notification_ms)),
            dispatcher,
        }
    }

    pub fn sliders(&self) -> [&Slider; 3] {
        [&self.speed, &self.air_time, &self.brightness]
    }

    fn slider_mut(&mut self, id: &str) -> Option<&mut Slider> {
        match id {
            HOP_SPEED => Some(&mut self.speed),
            AIR_TIME => Some(&mut self.air_time),
            BRIGHTNESS => Some(&mut self.brightness),
            _ => None,
        }
    }

    /// A slider moved. The readout changes right away; brightness is also
    /// pushed to the device on every movement.
    pub fn on_slider_input(&mut self, id: &str, value: f64) -> Option<String> {
        let slider = self.slider_mut(id)?;
        let value = slider.set(value);
        let readout = slider.readout();
        if id == BRIGHTNESS {
            self.set_brightness(value);
        }
        Some(readout)
    }

    /// Nudge a slider by whole steps, going through the same path as direct input
    pub fn on_slider_nudge(&mut self, id: &str, steps: i32) -> Option<String> {
        let slider = self.slider_mut(id)?;
        let mut preview = slider.clone();
        let value = preview.nudge(steps);
        self.on_slider_input(id, value)
    }

    pub fn send_hop(&self) {
        let speed = self.speed.value().round() as u32;
        let air_time = slider::scaled_tenths(self.air_time.value());
        let client = self.dispatcher.client().clone();

        self.dispatcher.fire(
            Endpoint::Hop,
            async move { client.hop(speed, air_time).await },
            |result| match result {
                Ok(()) => Some(Notification::success("Hop executed successfully")),
                Err(e) => {
                    error!(error = %e, "hop command failed");
                    Some(Notification::error("Hop failed"))
                }
            },
        );
    }

    pub fn set_brightness(&self, value: f64) {
        let brightness = value.round().clamp(0.0, 255.0) as u8;
        let client = self.dispatcher.client().clone();

        self.dispatcher.fire(
            Endpoint::Brightness,
            async move { client.set_brightness(brightness).await },
            |result| match result {
                Ok(()) => None,
                Err(e) => {
                    error!(error = %e, "setting brightness failed");
                    Some(Notification::error("Failed to set brightness"))
                }
            },
        );
    }

    /// Send the color currently in the color input
    pub fn set_color(&mut self) {
        let rgb = match Rgb::from_hex(&self.color) {
            Ok(rgb) => rgb,
            Err(e) => {
                warn!(error = %e, "rejected color input");
                self.banner
                    .show(Notification::error(format!("Invalid color {}", self.color)), Instant::now());
                return;
            }
        };
        let client = self.dispatcher.client().clone();

        self.dispatcher.fire(
            Endpoint::Color,
            async move { client.set_color(rgb).await },
            |result| match result {
                Ok(()) => Some(Notification::success("Color updated")),
                Err(e) => {
                    error!(error = %e, "setting color failed");
                    Some(Notification::error("Failed to set color"))
                }
            },
        );
    }

    pub fn set_pattern(&self, name: &str) {
        let client = self.dispatcher.client().clone();
        let pattern = name.to_string();

        self.dispatcher.fire(
            Endpoint::Pattern,
            async move { client.set_pattern(&pattern).await },
            {
                let pattern = name.to_string();
                move |result| match result {
                    Ok(()) => Some(Notification::success(format!("Pattern {} activated", pattern))),
                    Err(e) => {
                        error!(error = %e, pattern = %pattern, "setting pattern failed");
                        Some(Notification::error("Failed to set pattern"))
                    }
                }
            },
        );
    }

    pub fn handle_event(&mut self, event: PanelEvent, now: Instant) {
        match event {
            PanelEvent::Settled { target, ticket, notice } => {
                if !self.dispatcher.sequencer().accept(&target, ticket) {
                    debug!(endpoint = %target.endpoint, ticket, "dropping stale response");
                    return;
                }
                if let Some(notice) = notice {
                    self.banner.show(notice, now);
                }
            }
            PanelEvent::Sensor { ticket, snapshot } => {
                if self.dispatcher.sequencer().accept(&Endpoint::HopStatus.into(), ticket) {
                    self.render_sensor(&snapshot);
                }
            }
            PanelEvent::Monitor { .. } | PanelEvent::ParamSent { .. } => {}
        }
    }

    /// Overwrite the sensor display. Returns false if the snapshot was
    /// unusable and the previous display was kept.
    pub fn render_sensor(&mut self, snapshot: &SensorSnapshot) -> bool {
        if !snapshot.connected {
            self.sensor_lines = vec!["No sensor data available".to_string()];
            self.connection = ConnectionState::Disconnected;
            return true;
        }

        match snapshot.reading() {
            Some(reading) => {
                self.sensor_lines = vec![
                    format!("X: {:.2} (raw: {:.2})", reading.x, reading.raw_x),
                    format!("Y: {:.2} (raw: {:.2})", reading.y, reading.raw_y),
                ];
                self.connection = ConnectionState::Connected;
                true
            }
            None => {
                warn!(?snapshot, "sensor reported connected without readings");
                false
            }
        }
    }

    pub fn start_sensor_poll(&self, period: Duration) -> PollTask {
        let dispatcher = self.dispatcher.clone();
        PollTask::spawn(period, move || {
            let dispatcher = dispatcher.clone();
            async move {
                poll_sensor(&dispatcher).await;
            }
        })
    }
}

/// One sensor poll. Failures are only logged: at 2Hz a banner would never go away.
pub async fn poll_sensor(dispatcher: &Dispatcher) -> bool {
    let ticket = dispatcher.sequencer().begin(Endpoint::HopStatus);
    match dispatcher.client().hop_status().await {
        Ok(snapshot) => {
            dispatcher.send(PanelEvent::Sensor { ticket, snapshot });
            true
        }
        Err(e) => {
            warn!(error = %e, "sensor poll failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::DeviceClient;
    use crate::notification::NotificationKind;
    use crate::test_support::{closed_port_url, spawn_mock_device, MockDevice};
    use std::sync::atomic::Ordering;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn panel_for(url: &str) -> (CommandPanel, UnboundedReceiver<PanelEvent>) {
        let client = DeviceClient::new(url, Duration::from_secs(2)).unwrap();
        let (dispatcher, rx) = Dispatcher::new(client);
        (CommandPanel::new(&PanelConfig::default(), dispatcher), rx)
    }

    async fn settle(panel: &mut CommandPanel, rx: &mut UnboundedReceiver<PanelEvent>) {
        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("no event within 2s")
            .expect("channel closed");
        panel.handle_event(event, Instant::now());
    }

    fn banner_text(panel: &CommandPanel) -> Option<(String, NotificationKind)> {
        panel
            .banner
            .visible(Instant::now())
            .map(|n| (n.text.clone(), n.kind))
    }

    async fn mock_panel() -> (MockDevice, CommandPanel, UnboundedReceiver<PanelEvent>) {
        let device = spawn_mock_device().await;
        let (panel, rx) = panel_for(&device.base_url);
        (device, panel, rx)
    }

    #[tokio::test]
    async fn test_send_hop_scales_air_time() {
        let (device, mut panel, mut rx) = mock_panel().await;
        panel.on_slider_input(HOP_SPEED, 42.0);
        assert_eq!(panel.on_slider_input(AIR_TIME, 5.0).as_deref(), Some("0.5"));

        panel.send_hop();
        settle(&mut panel, &mut rx).await;

        let hops = device.state.requests_to("/hop");
        assert_eq!(hops.len(), 1);
        assert_eq!(hops[0].body["speed"], 42);
        assert_eq!(hops[0].body["air_time"], 0.5);
        assert_eq!(
            banner_text(&panel),
            Some(("Hop executed successfully".to_string(), NotificationKind::Success))
        );
    }

    #[tokio::test]
    async fn test_send_hop_failure_notifies() {
        let (device, mut panel, mut rx) = mock_panel().await;
        device.state.fail_commands.store(true, Ordering::SeqCst);

        panel.send_hop();
        settle(&mut panel, &mut rx).await;

        assert_eq!(banner_text(&panel), Some(("Hop failed".to_string(), NotificationKind::Error)));
    }

    #[tokio::test]
    async fn test_brightness_readout_updates_before_network() {
        let (mut panel, mut rx) = panel_for(&closed_port_url());

        let readout = panel.on_slider_input(BRIGHTNESS, 128.0);
        assert_eq!(readout.as_deref(), Some("128"));
        assert_eq!(panel.brightness.readout(), "128");
        assert!(banner_text(&panel).is_none());

        // The request itself fails, the slider stays where the user left it
        settle(&mut panel, &mut rx).await;
        assert_eq!(
            banner_text(&panel),
            Some(("Failed to set brightness".to_string(), NotificationKind::Error))
        );
        assert_eq!(panel.brightness.value(), 128.0);
    }

    #[tokio::test]
    async fn test_brightness_success_is_silent() {
        let (device, mut panel, mut rx) = mock_panel().await;
        panel.on_slider_input(BRIGHTNESS, 64.0);
        settle(&mut panel, &mut rx).await;

        assert!(banner_text(&panel).is_none());
        let sent = device.state.requests_to("/lights/brightness");
        assert_eq!(sent[0].body["brightness"], 64);
    }

    #[tokio::test]
    async fn test_set_color_decomposes_hex() {
        let (device, mut panel, mut rx) = mock_panel().await;
        panel.color = "#1A2B3C".to_string();

        panel.set_color();
        settle(&mut panel, &mut rx).await;

        let sent = device.state.requests_to("/lights/color");
        assert_eq!(sent[0].body["r"], 26);
        assert_eq!(sent[0].body["g"], 43);
        assert_eq!(sent[0].body["b"], 60);
        assert_eq!(banner_text(&panel), Some(("Color updated".to_string(), NotificationKind::Success)));
    }

    #[tokio::test]
    async fn test_invalid_color_never_reaches_device() {
        let (device, mut panel, _rx) = mock_panel().await;
        panel.color = "#12".to_string();

        panel.set_color();

        assert_eq!(banner_text(&panel).map(|(_, kind)| kind), Some(NotificationKind::Error));
        assert!(device.state.requests_to("/lights/color").is_empty());
    }

    #[tokio::test]
    async fn test_set_pattern_message_names_pattern() {
        let (device, mut panel, mut rx) = mock_panel().await;

        panel.set_pattern("rainbow");
        settle(&mut panel, &mut rx).await;

        assert_eq!(device.state.requests_to("/lights/pattern")[0].body["pattern"], "rainbow");
        assert_eq!(
            banner_text(&panel),
            Some(("Pattern rainbow activated".to_string(), NotificationKind::Success))
        );
    }

    #[tokio::test]
    async fn test_late_response_to_older_request_is_ignored() {
        let (mut panel, _rx) = panel_for(&closed_port_url());
        let older = panel.dispatcher.sequencer().begin(Endpoint::Pattern);
        let newer = panel.dispatcher.sequencer().begin(Endpoint::Pattern);
        let now = Instant::now();

        panel.handle_event(
            PanelEvent::Settled {
                target: Endpoint::Pattern.into(),
                ticket: newer,
                notice: Some(Notification::error("Failed to set pattern")),
            },
            now,
        );
        panel.handle_event(
            PanelEvent::Settled {
                target: Endpoint::Pattern.into(),
                ticket: older,
                notice: Some(Notification::success("Pattern pulse activated")),
            },
            now,
        );

        assert_eq!(
            banner_text(&panel),
            Some(("Failed to set pattern".to_string(), NotificationKind::Error))
        );
    }

    #[tokio::test]
    async fn test_render_sensor_states() {
        let (mut panel, _rx) = panel_for(&closed_port_url());
        assert_eq!(panel.connection, ConnectionState::Checking);

        let connected = SensorSnapshot {
            connected: true,
            x: Some(0.256),
            y: Some(-1.0),
            raw_x: Some(0.3),
            raw_y: Some(-0.999),
        };
        assert!(panel.render_sensor(&connected));
        assert_eq!(panel.sensor_lines, vec!["X: 0.26 (raw: 0.30)", "Y: -1.00 (raw: -1.00)"]);
        assert_eq!(panel.connection, ConnectionState::Connected);

        let disconnected = SensorSnapshot { connected: false, x: None, y: None, raw_x: None, raw_y: None };
        assert!(panel.render_sensor(&disconnected));
        assert_eq!(panel.sensor_lines, vec!["No sensor data available"]);
        assert_eq!(panel.connection, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_sensor_poll_failure_keeps_previous_render() {
        let (mut panel, mut rx) = panel_for(&closed_port_url());
        let snapshot = SensorSnapshot {
            connected: true,
            x: Some(1.0),
            y: Some(2.0),
            raw_x: Some(1.5),
            raw_y: Some(2.5),
        };
        panel.render_sensor(&snapshot);
        let before = panel.sensor_lines.clone();

        assert!(!poll_sensor(&panel.dispatcher).await);

        assert!(rx.try_recv().is_err());
        assert_eq!(panel.sensor_lines, before);
        assert_eq!(panel.connection, ConnectionState::Connected);
        assert!(banner_text(&panel).is_none());
    }

    #[tokio::test]
    async fn test_sensor_poll_renders_device_reading() {
        let (_device, mut panel, mut rx) = mock_panel().await;

        assert!(poll_sensor(&panel.dispatcher).await);
        settle(&mut panel, &mut rx).await;

        assert_eq!(panel.connection, ConnectionState::Connected);
        assert_eq!(panel.sensor_lines[0], "X: 0.25 (raw: 0.31)");
    }

    #[tokio::test]
    async fn test_air_time_slider_is_bounded_to_one_second() {
        let (mut panel, _rx) = panel_for(&closed_port_url());

        assert_eq!(panel.on_slider_input(AIR_TIME, 55.0).as_deref(), Some("1.0"));
        assert_eq!(panel.air_time.value(), 10.0);
        assert_eq!(panel.on_slider_input(AIR_TIME, 0.0).as_deref(), Some("0.1"));
    }

    #[tokio::test]
    async fn test_banner_hides_after_command_timeout() {
        let (mut panel, _rx) = panel_for(&closed_port_url());
        let ticket = panel.dispatcher.sequencer().begin(Endpoint::Color);
        let shown = Instant::now();

        panel.handle_event(
            PanelEvent::Settled {
                target: Endpoint::Color.into(),
                ticket,
                notice: Some(Notification::success("Color updated")),
            },
            shown,
        );

        assert!(panel.banner.visible(shown + Duration::from_millis(2999)).is_some());
        assert!(panel.banner.visible(shown + Duration::from_millis(3000)).is_none());
    }
}
