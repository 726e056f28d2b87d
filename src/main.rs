// hopctl - terminal control panel for a hopping/balancing robot
// Command panel for hops and lights, parameter panel for live controller tuning
use anyhow::Result;
use clap::Parser;
use notify::{Config, Event as NotifyEvent, RecommendedWatcher, RecursiveMode, Watcher};
use std::io::{self, Write};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

mod api;
mod command_panel;
mod config;
mod debounce;
mod dispatch;
mod logging;
mod notification;
mod parameter_panel;
mod poller;
mod sequence;
mod slider;
mod tui;
mod types;

#[cfg(test)]
mod test_support;

use api::DeviceClient;
use config::{Args, PanelConfig};
use types::{PanelExit, PanelKind};

fn run_first_time_setup() -> Result<PanelConfig> {
    println!("\n=== hopctl - First Time Setup ===\n");

    let default_url = PanelConfig::default().device_url;
    print!("Enter the robot's API address (default {}): ", default_url);
    io::stdout().flush()?;

    let mut device_url = String::new();
    io::stdin().read_line(&mut device_url)?;
    let device_url = device_url.trim();

    let mut config = PanelConfig::default();
    if !device_url.is_empty() {
        config.device_url = device_url.to_string();
    }
    config.sanitize();

    println!("\n=== Configuration Summary ===");
    println!("Device URL: {}", config.device_url);
    println!("\nAll other settings will use default values.");
    println!("You can modify these later in the config file; running panels pick up changes automatically.\n");

    config.save()?;
    println!("Configuration saved to: {}\n", PanelConfig::config_path(None)?.display());

    // Give user a moment to read the summary
    thread::sleep(Duration::from_secs(2));

    Ok(config)
}

/// Watch the config file and broadcast a message whenever it is modified
fn spawn_config_watcher(config_change_tx: broadcast::Sender<()>) -> Result<()> {
    let config_path = PanelConfig::config_path(None)?;

    thread::spawn(move || {
        let (tx, rx) = mpsc::channel();
        let mut watcher = match RecommendedWatcher::new(tx, Config::default()) {
            Ok(w) => w,
            Err(e) => {
                warn!(error = %e, "config watcher unavailable");
                return;
            }
        };

        if let Err(e) = watcher.watch(&config_path, RecursiveMode::NonRecursive) {
            warn!(error = %e, path = %config_path.display(), "cannot watch config file");
            return;
        }

        while let Ok(result) = rx.recv() {
            if let Ok(NotifyEvent { kind: notify::EventKind::Modify(_), .. }) = result {
                let _ = config_change_tx.send(());
            }
        }
    });

    Ok(())
}

/// Panel switching loop. Each panel gets a fresh client built from the
/// current config, and its polls stop as soon as it returns.
async fn run_panels(
    terminal: &mut tui::Tui,
    mut config: PanelConfig,
    config_change_tx: &broadcast::Sender<()>,
) -> Result<()> {
    let mut kind = config.panel_kind();
    let mut config_change_rx = config_change_tx.subscribe();

    loop {
        let client = DeviceClient::new(&config.device_url, config.request_timeout())?;
        info!(panel = %kind, device = %client.base_url(), "opening panel");

        let exit = match kind {
            PanelKind::Command => {
                tui::run_command_panel(&config, client, terminal, &mut config_change_rx).await?
            }
            PanelKind::Parameters => {
                tui::run_parameter_panel(&config, client, terminal, &mut config_change_rx).await?
            }
        };

        match exit {
            PanelExit::UserQuit => return Ok(()),
            PanelExit::SwitchPanel => kind = kind.other(),
            PanelExit::ConfigChanged => {
                // Editors often write in several steps; one reload is enough
                while config_change_rx.try_recv().is_ok() {}
                match PanelConfig::load() {
                    Ok(new_config) => config = new_config,
                    Err(e) => warn!(error = %e, "keeping previous config"),
                }
            }
        }
    }
}

async fn run(config: PanelConfig, config_change_tx: broadcast::Sender<()>) -> Result<()> {
    let mut terminal = tui::setup_terminal()?;
    let result = run_panels(&mut terminal, config, &config_change_tx).await;
    tui::restore_terminal(&mut terminal)?;
    result
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Set global config path immediately (before any config loads)
    PanelConfig::set_config_path(args.cfg.clone());

    let cfg_arg = args.cfg.as_deref();
    let config_path = PanelConfig::config_path(cfg_arg)?;

    // Only the default config gets the interactive setup, and only when no device was given
    if !config_path.exists() && cfg_arg.is_none() && args.device.is_none() {
        run_first_time_setup()?;
    }

    let config_file_exists = config_path.exists();
    let mut config = if config_file_exists {
        match PanelConfig::load_with_path(cfg_arg) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("\n❌ Failed to load config file: {}", e);
                eprintln!("Config file: {}", config_path.display());
                eprintln!("\nPlease fix the config file or delete it to regenerate with defaults.");
                return Err(e);
            }
        }
    } else {
        PanelConfig {
            config_path: Some(config_path.clone()),
            ..PanelConfig::default()
        }
    };

    let args_provided = config.merge_with_args(&args);
    config.sanitize();

    // Save only when creating the file or persisting command-line choices
    if !config_file_exists || args_provided {
        config.save()?;
    }

    let log_path = logging::init_logging(&PanelConfig::config_dir()?)?;
    println!("Using config file: {}", config_path.display());
    println!("Logging to: {}", log_path.display());

    let rt = tokio::runtime::Runtime::new()?;

    let (config_change_tx, _config_change_rx) = broadcast::channel(16);
    spawn_config_watcher(config_change_tx.clone())?;

    let result = rt.block_on(run(config, config_change_tx));
    match &result {
        Ok(()) => println!("\n👋 hopctl exiting."),
        Err(e) => {
            error!(error = %e, "panel stopped with error");
            eprintln!("\n❌ Panel error: {}", e);
        }
    }
    result
}
