// Config Module - Configuration management and command-line argument parsing
use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use crate::debounce::DebounceScope;
use crate::types::{PanelKind, Rgb};

// Global storage for custom config path
static CUSTOM_CONFIG_PATH: OnceLock<Option<String>> = OnceLock::new();

#[derive(Parser, Debug, Default)]
#[command(
    author,
    version,
    about = "Terminal control panel for a hopping/balancing robot",
    long_about = "Sends hop and lighting commands to the robot's HTTP API, shows live accelerometer readings,\n\
                  and tunes Kalman filter, PID, movement and balance parameters while monitoring the controller."
)]
pub struct Args {
    /// Base URL of the robot's HTTP API (e.g. http://raspclaws.local:5000)
    #[arg(short, long)]
    pub device: Option<String>,

    /// Panel to open first (command, parameters)
    #[arg(short, long)]
    pub panel: Option<String>,

    /// Parameter debounce scope (per_parameter, shared)
    #[arg(long)]
    pub debounce_scope: Option<String>,

    /// Poll interval in milliseconds for both sensor and monitor data
    #[arg(long)]
    pub poll_ms: Option<u64>,

    /// HTTP request timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Config file path or name (e.g., --cfg /full/path or --cfg lab for ~/.config/hopctl/lab.conf)
    #[arg(long)]
    pub cfg: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    #[serde(skip)]
    pub config_path: Option<PathBuf>,  // Stores the config file path (not serialized)

    pub device_url: String,
    pub panel: String,               // Panel shown at startup: command, parameters
    pub request_timeout_ms: u64,
    pub sensor_poll_ms: u64,
    pub monitor_poll_ms: u64,
    pub param_debounce_ms: u64,
    pub debounce_scope: String,      // per_parameter or shared
    pub command_notification_ms: u64,
    pub param_notification_ms: u64,
    pub reconcile_epsilon: f64,      // Server value must differ by more than this to move a slider
    pub ui_tick_ms: u64,
    pub hop_speed: f64,              // Initial slider positions for the command panel
    pub air_time: f64,               // Tenths of a second
    pub brightness: f64,
    pub color: String,
}

impl Default for PanelConfig {
    fn default() -> Self {
        PanelConfig {
            config_path: None,
            device_url: "http://raspclaws.local:5000".to_string(),
            panel: "command".to_string(),
            request_timeout_ms: 3000,
            sensor_poll_ms: 500,
            monitor_poll_ms: 500,
            param_debounce_ms: 100,
            debounce_scope: "per_parameter".to_string(),
            command_notification_ms: 3000,
            param_notification_ms: 2000,
            reconcile_epsilon: 0.001,
            ui_tick_ms: 50,       // 20 redraws per second is enough for banner expiry
            hop_speed: 20.0,
            air_time: 3.0,        // 0.3s
            brightness: 255.0,
            color: "#0000FF".to_string(),
        }
    }
}

impl PanelConfig {
    pub fn merge_with_args(&mut self, args: &Args) -> bool {
        // Track if any args were actually provided
        let mut args_provided = false;

        if let Some(ref device) = args.device {
            self.device_url = device.clone();
            args_provided = true;
        }

        if let Some(ref panel) = args.panel {
            self.panel = panel.clone();
            args_provided = true;
        }

        if let Some(ref scope) = args.debounce_scope {
            self.debounce_scope = scope.clone();
            args_provided = true;
        }

        // One flag drives both polls
        if let Some(poll_ms) = args.poll_ms {
            self.sensor_poll_ms = poll_ms;
            self.monitor_poll_ms = poll_ms;
            args_provided = true;
        }

        if let Some(timeout_ms) = args.timeout_ms {
            self.request_timeout_ms = timeout_ms;
            args_provided = true;
        }

        args_provided
    }

    /// Set the global config path (called once at startup)
    pub fn set_config_path(cfg: Option<String>) {
        let _ = CUSTOM_CONFIG_PATH.set(cfg);
    }

    /// Get the global config path (if set)
    fn get_config_path_arg() -> Option<&'static str> {
        CUSTOM_CONFIG_PATH.get()
            .and_then(|opt| opt.as_deref())
    }

    pub fn config_dir() -> Result<PathBuf> {
        let home = std::env::var("HOME").context("HOME is not set")?;
        let config_dir = PathBuf::from(home).join(".config").join("hopctl");
        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }

    pub fn config_path(cfg_arg: Option<&str>) -> Result<PathBuf> {
        // Priority: explicit arg > global > None
        let cfg = cfg_arg.or_else(|| Self::get_config_path_arg());

        if let Some(cfg) = cfg {
            // Check if it's an absolute path
            let path = PathBuf::from(cfg);
            if path.is_absolute() {
                return Ok(path);
            }

            // Check if it contains path separators (relative path)
            if cfg.contains('/') || cfg.contains('\\') {
                return Ok(path);
            }

            // Otherwise treat as config name in config directory
            let filename = if cfg.ends_with(".conf") {
                cfg.to_string()
            } else {
                format!("{}.conf", cfg)
            };

            Ok(Self::config_dir()?.join(filename))
        } else {
            Ok(Self::config_dir()?.join("config.conf"))
        }
    }

    pub fn load_with_path(cfg_arg: Option<&str>) -> Result<Self> {
        let path = Self::config_path(cfg_arg)?;
        Self::load_from(path)
    }

    pub fn load_from(path: PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let mut parsed: Self = toml::from_str(&contents)
            .with_context(|| format!("parsing {}", path.display()))?;
        parsed.config_path = Some(path);
        parsed.sanitize();
        Ok(parsed)
    }

    /// Sanitize config values to handle common formatting issues
    pub fn sanitize(&mut self) {
        // Sanitize string values (trim whitespace)
        self.device_url = self.device_url.trim().trim_end_matches('/').to_string();
        if !self.device_url.contains("://") && !self.device_url.is_empty() {
            self.device_url = format!("http://{}", self.device_url);
        }
        self.panel = self.panel.trim().to_lowercase();
        if self.panel.parse::<PanelKind>().is_err() {
            self.panel = "command".to_string();
        }
        self.debounce_scope = self.debounce_scope.trim().to_lowercase();
        if self.debounce_scope.parse::<DebounceScope>().is_err() {
            self.debounce_scope = DebounceScope::PerParameter.as_str().to_string();
        }
        self.color = match Rgb::from_hex(self.color.trim()) {
            Ok(rgb) => rgb.to_hex(),
            Err(_) => "#0000FF".to_string(),
        };

        // Clamp numeric values to reasonable ranges
        self.request_timeout_ms = self.request_timeout_ms.max(100).min(60000);
        self.sensor_poll_ms = self.sensor_poll_ms.max(50).min(60000);
        self.monitor_poll_ms = self.monitor_poll_ms.max(50).min(60000);
        self.param_debounce_ms = self.param_debounce_ms.min(5000);
        self.command_notification_ms = self.command_notification_ms.max(100).min(60000);
        self.param_notification_ms = self.param_notification_ms.max(100).min(60000);
        self.reconcile_epsilon = self.reconcile_epsilon.max(0.0).min(1.0);
        self.ui_tick_ms = self.ui_tick_ms.max(10).min(1000);
        self.hop_speed = self.hop_speed.max(1.0).min(100.0);
        self.air_time = self.air_time.max(1.0).min(10.0);
        self.brightness = self.brightness.max(0.0).min(255.0);
    }

    pub fn panel_kind(&self) -> PanelKind {
        self.panel.parse().unwrap_or(PanelKind::Command)
    }

    pub fn debounce_scope(&self) -> DebounceScope {
        self.debounce_scope.parse().unwrap_or(DebounceScope::PerParameter)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn load() -> Result<Self> {
        Self::load_with_path(None)
    }

    pub fn save(&self) -> Result<()> {
        let path = match self.config_path.clone() {
            Some(path) => path,
            None => Self::config_path(None)?,
        };

        // Sanitize values before saving
        let mut sanitized = self.clone();
        sanitized.sanitize();

        // Build TOML with comments manually for better documentation
        let contents = format!(
            r#"# hopctl Configuration File
# Edit this file while the program is running; the open panel restarts with the new settings

# Base URL of the robot's HTTP API
device_url = "{}"

# Panel shown at startup: "command" or "parameters"
panel = "{}"

# HTTP request timeout in milliseconds
request_timeout_ms = {}

# Sensor status poll interval (command panel), milliseconds
sensor_poll_ms = {}

# Monitoring data poll interval (parameter panel), milliseconds
monitor_poll_ms = {}

# Quiet period before a parameter edit is sent, milliseconds
param_debounce_ms = {}

# "per_parameter": every parameter debounces on its own
# "shared": one slot for all parameters; editing a second parameter within the
#           quiet period drops the pending update of the first
debounce_scope = "{}"

# How long notifications stay visible, milliseconds
command_notification_ms = {}
param_notification_ms = {}

# A slider is moved to the device-reported value only if they differ by more than this
reconcile_epsilon = {}

# Screen redraw interval, milliseconds
ui_tick_ms = {}

# Initial command panel controls
hop_speed = {}
# Air time in tenths of a second (3 = 0.3s)
air_time = {}
brightness = {}
color = "{}"
"#,
            sanitized.device_url,
            sanitized.panel,
            sanitized.request_timeout_ms,
            sanitized.sensor_poll_ms,
            sanitized.monitor_poll_ms,
            sanitized.param_debounce_ms,
            sanitized.debounce_scope,
            sanitized.command_notification_ms,
            sanitized.param_notification_ms,
            fmt_float(sanitized.reconcile_epsilon),
            sanitized.ui_tick_ms,
            fmt_float(sanitized.hop_speed),
            fmt_float(sanitized.air_time),
            fmt_float(sanitized.brightness),
            sanitized.color,
        );

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&path, contents)
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}

// TOML needs a decimal point to read a value back as a float
fn fmt_float(value: f64) -> String {
    let text = value.to_string();
    if text.contains('.') || text.contains('e') {
        text
    } else {
        format!("{}.0", text)
    }
}

/// Config info lines for the TUI overlay
pub fn config_summary(config: &PanelConfig) -> Vec<(&'static str, String)> {
    vec![
        ("Device URL", config.device_url.clone()),
        ("Config File", config.config_path.as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(not saved)".to_string())),
        ("Request Timeout", format!("{} ms", config.request_timeout_ms)),
        ("Sensor Poll", format!("{} ms", config.sensor_poll_ms)),
        ("Monitor Poll", format!("{} ms", config.monitor_poll_ms)),
        ("Param Debounce", format!("{} ms ({})", config.param_debounce_ms, config.debounce_scope)),
        ("Reconcile Epsilon", format!("{}", config.reconcile_epsilon)),
        ("Notifications", format!("{} ms / {} ms", config.command_notification_ms, config.param_notification_ms)),
    ]
}
