// TUI Module - terminal front end for both panels
use anyhow::{anyhow, Result};
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::ExecutableCommand;
use futures::StreamExt;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::{Frame, Terminal};
use std::io::{self, Stdout};
use std::time::{Duration, Instant};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::api::DeviceClient;
use crate::command_panel::{CommandPanel, ConnectionState, AIR_TIME, BRIGHTNESS, HOP_SPEED, PATTERNS};
use crate::config::{config_summary, PanelConfig};
use crate::dispatch::Dispatcher;
use crate::notification::{NotificationBanner, NotificationKind};
use crate::parameter_panel::ParameterPanel;
use crate::slider::Slider;
use crate::types::{PanelExit, Rgb};

pub type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Command panel slider rows, top to bottom
const COMMAND_SLIDERS: [&str; 3] = [HOP_SPEED, AIR_TIME, BRIGHTNESS];

const BAR_WIDTH: usize = 24;
const FOOTER_HINT: &str = "Press 'i' for config, Tab to switch panel, 'q' or Ctrl+C to quit";

pub fn setup_terminal() -> Result<Tui> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    terminal.hide_cursor()?;
    Ok(terminal)
}

pub fn restore_terminal(terminal: &mut Tui) -> Result<()> {
    terminal.show_cursor()?;
    disable_raw_mode()?;
    terminal.backend_mut().execute(LeaveAlternateScreen)?;
    Ok(())
}

#[derive(Debug, Default)]
struct CommandUi {
    selected: usize,
    color_edit: Option<String>,
    show_info: bool,
}

#[derive(Debug, Default)]
struct ParamUi {
    group: usize,
    selected: usize,
    show_info: bool,
}

fn is_ctrl_c(key: &KeyEvent) -> bool {
    key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL)
}

fn nudge_steps(key: &KeyEvent) -> i32 {
    if key.modifiers.contains(KeyModifiers::SHIFT) {
        10
    } else {
        1
    }
}

/// Map a config-change broadcast to a panel exit. A closed channel means the
/// watcher is gone, which only happens on shutdown.
fn config_exit(changed: Result<(), RecvError>) -> Result<PanelExit> {
    match changed {
        Ok(()) | Err(RecvError::Lagged(_)) => {
            info!("config file changed, restarting panel");
            Ok(PanelExit::ConfigChanged)
        }
        Err(RecvError::Closed) => Err(anyhow!("config watcher stopped")),
    }
}

/// Command panel main loop. Returns when the user quits, switches panel,
/// or the config file changes. The sensor poll stops when this returns.
pub async fn run_command_panel(
    config: &PanelConfig,
    client: DeviceClient,
    terminal: &mut Tui,
    config_change_rx: &mut broadcast::Receiver<()>,
) -> Result<PanelExit> {
    let (dispatcher, mut panel_rx) = Dispatcher::new(client);
    let mut panel = CommandPanel::new(config, dispatcher);
    let mut ui = CommandUi::default();

    let mut events = EventStream::new();
    let mut tick = tokio::time::interval(Duration::from_millis(config.ui_tick_ms));
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let _sensor_poll = panel.start_sensor_poll(Duration::from_millis(config.sensor_poll_ms));

    info!(device = %config.device_url, "command panel started");

    loop {
        terminal.draw(|f| draw_command_panel(f, &panel, &ui, config))?;

        tokio::select! {
            maybe_event = events.next() => match maybe_event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    if let Some(exit) = handle_command_key(&mut panel, &mut ui, key) {
                        return Ok(exit);
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(PanelExit::UserQuit),
            },
            Some(event) = panel_rx.recv() => panel.handle_event(event, Instant::now()),
            _ = tick.tick() => panel.banner.expire(Instant::now()),
            changed = config_change_rx.recv() => return config_exit(changed),
        }
    }
}

/// Parameter panel main loop; same exits as the command panel
pub async fn run_parameter_panel(
    config: &PanelConfig,
    client: DeviceClient,
    terminal: &mut Tui,
    config_change_rx: &mut broadcast::Receiver<()>,
) -> Result<PanelExit> {
    let (dispatcher, mut panel_rx) = Dispatcher::new(client);
    let mut panel = ParameterPanel::new(config, dispatcher);
    let mut ui = ParamUi::default();

    let mut events = EventStream::new();
    let mut tick = tokio::time::interval(Duration::from_millis(config.ui_tick_ms));
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let _monitor_poll = panel.start_monitor_poll(Duration::from_millis(config.monitor_poll_ms));

    info!(device = %config.device_url, scope = %config.debounce_scope, "parameter panel started");

    loop {
        terminal.draw(|f| draw_parameter_panel(f, &panel, &ui, config))?;

        tokio::select! {
            maybe_event = events.next() => match maybe_event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    if let Some(exit) = handle_param_key(&mut panel, &mut ui, key) {
                        return Ok(exit);
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(PanelExit::UserQuit),
            },
            Some(event) = panel_rx.recv() => panel.handle_event(event, Instant::now()),
            _ = tick.tick() => panel.banner.expire(Instant::now()),
            changed = config_change_rx.recv() => return config_exit(changed),
        }
    }
}

fn handle_command_key(panel: &mut CommandPanel, ui: &mut CommandUi, key: KeyEvent) -> Option<PanelExit> {
    if is_ctrl_c(&key) {
        return Some(PanelExit::UserQuit);
    }

    // Color entry swallows everything until Enter or Esc
    if let Some(buffer) = ui.color_edit.as_mut() {
        match key.code {
            KeyCode::Enter => {
                panel.color = buffer.trim().to_string();
                ui.color_edit = None;
                panel.set_color();
            }
            KeyCode::Esc => ui.color_edit = None,
            KeyCode::Backspace => {
                buffer.pop();
            }
            KeyCode::Char(c) if buffer.len() < 7 => buffer.push(c),
            _ => {}
        }
        return None;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') => return Some(PanelExit::UserQuit),
        KeyCode::Tab => return Some(PanelExit::SwitchPanel),
        KeyCode::Char('i') | KeyCode::Char('I') => ui.show_info = !ui.show_info,
        KeyCode::Up => ui.selected = ui.selected.saturating_sub(1),
        KeyCode::Down => ui.selected = (ui.selected + 1).min(COMMAND_SLIDERS.len() - 1),
        KeyCode::Left => {
            panel.on_slider_nudge(COMMAND_SLIDERS[ui.selected], -nudge_steps(&key));
        }
        KeyCode::Right => {
            panel.on_slider_nudge(COMMAND_SLIDERS[ui.selected], nudge_steps(&key));
        }
        KeyCode::Char('h') | KeyCode::Char('H') | KeyCode::Enter => panel.send_hop(),
        KeyCode::Char('c') | KeyCode::Char('C') => ui.color_edit = Some(panel.color.clone()),
        KeyCode::Char(c @ '1'..='4') => {
            let index = c as usize - '1' as usize;
            panel.set_pattern(PATTERNS[index]);
        }
        _ => {}
    }
    None
}

fn handle_param_key(panel: &mut ParameterPanel, ui: &mut ParamUi, key: KeyEvent) -> Option<PanelExit> {
    if is_ctrl_c(&key) {
        return Some(PanelExit::UserQuit);
    }

    let group_count = panel.groups.len();
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') => return Some(PanelExit::UserQuit),
        KeyCode::Tab => return Some(PanelExit::SwitchPanel),
        KeyCode::Char('i') | KeyCode::Char('I') => ui.show_info = !ui.show_info,
        KeyCode::Char(']') => {
            ui.group = (ui.group + 1) % group_count;
            ui.selected = 0;
        }
        KeyCode::Char('[') => {
            ui.group = (ui.group + group_count - 1) % group_count;
            ui.selected = 0;
        }
        KeyCode::Up => ui.selected = ui.selected.saturating_sub(1),
        KeyCode::Down => {
            let last = panel.groups[ui.group].sliders.len().saturating_sub(1);
            ui.selected = (ui.selected + 1).min(last);
        }
        KeyCode::Left | KeyCode::Right => {
            let direction = if key.code == KeyCode::Left { -1 } else { 1 };
            let name = panel.groups[ui.group].sliders[ui.selected].id;
            panel.nudge_param(name, direction * nudge_steps(&key));
        }
        KeyCode::Char('a') | KeyCode::Char('A') => {
            let sent = panel.apply_pending();
            debug!(sent, "apply requested");
        }
        KeyCode::Char('r') | KeyCode::Char('R') => {
            let sent = panel.reset_defaults();
            debug!(sent, "reset requested");
        }
        _ => {}
    }
    None
}

/// Filled/empty bar for a slider position in [0, 1]
fn slider_bar(fraction: f64, width: usize) -> String {
    let filled = ((fraction.clamp(0.0, 1.0) * width as f64).round() as usize).min(width);
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

fn slider_line(slider: &Slider, selected: bool) -> Line<'static> {
    let marker = if selected { "▶" } else { " " };
    let style = if selected {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    Line::from(vec![
        Span::styled(format!("{} {:<24}", marker, slider.label), style),
        Span::styled(slider_bar(slider.fraction(), BAR_WIDTH), Style::default().fg(Color::Cyan)),
        Span::styled(format!(" {:>8}", slider.readout()), style),
    ])
}

fn stability_text(stability: &str) -> String {
    if stability == "--" {
        stability.to_string()
    } else {
        format!("{}%", stability)
    }
}

/// Config info overlay, toggled with 'i'
fn config_info_lines(config: &PanelConfig) -> Vec<Line<'static>> {
    config_summary(config)
        .into_iter()
        .map(|(key, value)| {
            Line::from(vec![
                Span::styled(format!("{:<18}", key), Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(value),
            ])
        })
        .collect()
}

fn banner_widget(banner: &NotificationBanner) -> Paragraph<'static> {
    let (text, style) = match banner.visible(Instant::now()) {
        Some(n) => {
            let color = match n.kind {
                NotificationKind::Success => Color::Green,
                NotificationKind::Error => Color::Red,
            };
            (n.text.clone(), Style::default().fg(color).add_modifier(Modifier::BOLD))
        }
        None => (String::new(), Style::default()),
    };
    Paragraph::new(text).style(style).block(Block::default().borders(Borders::ALL))
}

/// Header, main content, notification banner, footer
fn frame_chunks(area: Rect) -> std::rc::Rc<[Rect]> {
    Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),  // Header
            Constraint::Min(10),    // Main content
            Constraint::Length(3),  // Notification
            Constraint::Length(3),  // Footer
        ])
        .split(area)
}

fn draw_command_panel(f: &mut Frame, panel: &CommandPanel, ui: &CommandUi, config: &PanelConfig) {
    let chunks = frame_chunks(f.size());

    let (status, status_color) = match panel.connection {
        ConnectionState::Checking => ("Checking connection...", Color::Yellow),
        ConnectionState::Connected => ("Connected", Color::Green),
        ConnectionState::Disconnected => ("Disconnected", Color::Red),
    };
    let header = Paragraph::new(Line::from(vec![
        Span::raw(format!("🤖 Command Panel | Device: {} | Sensor: ", config.device_url)),
        Span::styled(status, Style::default().fg(status_color).add_modifier(Modifier::BOLD)),
    ]))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(header, chunks[0]);

    if ui.show_info {
        let config_widget = Paragraph::new(config_info_lines(config))
            .block(Block::default().borders(Borders::ALL).title("Configuration (Press 'i' to hide)"));
        f.render_widget(config_widget, chunks[1]);
    } else {
        let main_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
            .split(chunks[1]);

        let mut lines: Vec<Line> = panel
            .sliders()
            .iter()
            .enumerate()
            .map(|(i, s)| slider_line(s, i == ui.selected))
            .collect();
        lines.push(Line::from(""));

        let swatch = match Rgb::from_hex(&panel.color) {
            Ok(rgb) => Span::styled("■■■", Style::default().fg(Color::Rgb(rgb.r, rgb.g, rgb.b))),
            Err(_) => Span::raw("   "),
        };
        let color_line = match &ui.color_edit {
            Some(buffer) => Line::from(vec![
                Span::raw("  Color: "),
                Span::styled(format!("{}_", buffer), Style::default().fg(Color::Yellow)),
                Span::raw("  (Enter to send, Esc to cancel)"),
            ]),
            None => Line::from(vec![Span::raw(format!("  Color: {} ", panel.color)), swatch]),
        };
        lines.push(color_line);

        let patterns = PATTERNS
            .iter()
            .enumerate()
            .map(|(i, p)| format!("[{}] {}", i + 1, p))
            .collect::<Vec<_>>()
            .join("  ");
        lines.push(Line::from(format!("  Patterns: {}", patterns)));
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "  ↑↓ select  ←→ adjust (Shift x10)  h hop  c color  1-4 pattern",
            Style::default().fg(Color::Gray),
        )));

        let controls = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Controls"));
        f.render_widget(controls, main_chunks[0]);

        let sensor_text: Vec<Line> = panel.sensor_lines.iter().map(|s| Line::from(s.as_str())).collect();
        let sensor = Paragraph::new(sensor_text)
            .block(Block::default().borders(Borders::ALL).title("Accelerometer"));
        f.render_widget(sensor, main_chunks[1]);
    }

    f.render_widget(banner_widget(&panel.banner), chunks[2]);

    let footer_text = format!("Poll: {}ms | Timeout: {}ms | {}", config.sensor_poll_ms, config.request_timeout_ms, FOOTER_HINT);
    let footer = Paragraph::new(footer_text).block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, chunks[3]);
}

fn draw_parameter_panel(f: &mut Frame, panel: &ParameterPanel, ui: &ParamUi, config: &PanelConfig) {
    let chunks = frame_chunks(f.size());

    let (unsent, waiting) = panel.pending_updates();
    let header_text = format!(
        "🎛  Parameter Panel | Device: {} | Unsent: {} | Debouncing: {}",
        config.device_url, unsent, waiting
    );
    let header = Paragraph::new(header_text).block(Block::default().borders(Borders::ALL));
    f.render_widget(header, chunks[0]);

    if ui.show_info {
        let config_widget = Paragraph::new(config_info_lines(config))
            .block(Block::default().borders(Borders::ALL).title("Configuration (Press 'i' to hide)"));
        f.render_widget(config_widget, chunks[1]);
    } else {
        let main_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
            .split(chunks[1]);

        let tabs: Vec<Span> = panel
            .groups
            .iter()
            .enumerate()
            .flat_map(|(i, g)| {
                let style = if i == ui.group {
                    Style::default().fg(Color::Black).bg(Color::Cyan)
                } else {
                    Style::default().fg(Color::Gray)
                };
                [Span::styled(format!(" {} ", g.title), style), Span::raw(" ")]
            })
            .collect();

        let group = &panel.groups[ui.group];
        let mut lines = vec![Line::from(tabs), Line::from("")];
        lines.extend(
            group
                .sliders
                .iter()
                .enumerate()
                .map(|(i, s)| slider_line(s, i == ui.selected)),
        );
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "  [ ] group  ↑↓ select  ←→ adjust (Shift x10)  a apply  r reset",
            Style::default().fg(Color::Gray),
        )));

        let params = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title(group.title));
        f.render_widget(params, main_chunks[0]);

        let monitor = &panel.monitor;
        let monitor_lines = vec![
            Line::from(Span::styled("Kalman Filter", Style::default().add_modifier(Modifier::BOLD))),
            Line::from(format!("  {}", monitor.kalman_x)),
            Line::from(format!("  {}", monitor.kalman_y)),
            Line::from(""),
            Line::from(Span::styled("PID", Style::default().add_modifier(Modifier::BOLD))),
            Line::from(format!("  {}", monitor.pid_status)),
            Line::from(""),
            Line::from(vec![
                Span::styled("Stability: ", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(stability_text(&monitor.stability)),
            ]),
        ];
        let monitor_widget = Paragraph::new(monitor_lines)
            .block(Block::default().borders(Borders::ALL).title("Monitor"));
        f.render_widget(monitor_widget, main_chunks[1]);
    }

    f.render_widget(banner_widget(&panel.banner), chunks[2]);

    let footer_text = format!(
        "Poll: {}ms | Debounce: {}ms ({}) | {}",
        config.monitor_poll_ms, config.param_debounce_ms, config.debounce_scope, FOOTER_HINT
    );
    let footer = Paragraph::new(footer_text).block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, chunks[3]);
}
