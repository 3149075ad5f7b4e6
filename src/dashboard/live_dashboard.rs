use anyhow::{Context, Result};
use chrono::Local;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::{debug, error, info, warn};
use ratatui::{
    Frame, Terminal,
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Sparkline},
};
use std::{
    collections::VecDeque,
    io,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::watch;

use crate::display::formatting::format_speed_line;
use crate::display::{build_notification, overlay_lines};
use crate::sampler::{RateSampler, SpeedReading, effective_interval};
use crate::settings::SettingsHandle;

/// Number of points kept for the sparklines
const HISTORY_LEN: usize = 60;
/// One sparkline point per period, whether or not a new reading was published
const HISTORY_PERIOD: Duration = Duration::from_secs(1);

/// Real-time terminal dashboard fed by a rate sampler
pub struct Dashboard {
    sampler: RateSampler,
    settings: Arc<SettingsHandle>,
    readings: watch::Receiver<SpeedReading>,
    current: SpeedReading,
    download_history: VecDeque<u64>,
    upload_history: VecDeque<u64>,
    /// Readings received since the dashboard opened
    publications: u64,
    last_publication: Option<Instant>,
    status_message: Option<String>,
}

impl Dashboard {
    pub fn new(sampler: RateSampler, settings: Arc<SettingsHandle>) -> Self {
        let readings = sampler.subscribe();
        Self {
            sampler,
            settings,
            readings,
            current: SpeedReading::ZERO,
            download_history: VecDeque::with_capacity(HISTORY_LEN),
            upload_history: VecDeque::with_capacity(HISTORY_LEN),
            publications: 0,
            last_publication: None,
            status_message: None,
        }
    }

    /// Main entry point for the dashboard
    /// Sets up terminal, runs the UI loop, and cleans up on exit
    pub async fn run(&mut self) -> Result<()> {
        self.sampler.start().context("Failed to start rate sampler")?;
        info!(
            "Starting live dashboard on {} source",
            self.sampler.source_name()
        );

        debug!("Setting up terminal for full-screen UI");
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let res = self.run_app(&mut terminal).await;

        // Cleanup terminal state before exiting
        debug!("Cleaning up terminal state");
        self.sampler.stop();
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        if let Err(err) = res {
            error!("Dashboard error: {err:?}");
            eprintln!("Error: {err:?}");
        } else {
            info!("Dashboard exited normally");
        }

        Ok(())
    }

    async fn run_app<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()>
    where
        B::Error: Send + Sync + 'static,
    {
        let mut last_history_push = Instant::now();

        loop {
            self.drain_readings();
            terminal.draw(|f| self.ui(f))?;

            // Non-blocking input check with a 100ms timeout
            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                        KeyCode::Char('s') => self.toggle_sampling(),
                        KeyCode::Char('b') => self.toggle_battery_saver(),
                        _ => {}
                    }
                }
            }

            if last_history_push.elapsed() >= HISTORY_PERIOD {
                self.push_history();
                last_history_push = Instant::now();
            }

            tokio::task::yield_now().await;
        }
    }

    fn drain_readings(&mut self) {
        if self.readings.has_changed().unwrap_or(false) {
            self.current = *self.readings.borrow_and_update();
            if self.sampler.is_running() {
                self.publications += 1;
                self.last_publication = Some(Instant::now());
            }
        }
    }

    fn push_history(&mut self) {
        self.download_history.push_back(self.current.download_bps);
        self.upload_history.push_back(self.current.upload_bps);
        if self.download_history.len() > HISTORY_LEN {
            self.download_history.pop_front();
        }
        if self.upload_history.len() > HISTORY_LEN {
            self.upload_history.pop_front();
        }
    }

    fn toggle_sampling(&mut self) {
        if self.sampler.is_running() {
            self.sampler.stop();
            self.status_message = Some("Sampling stopped".to_string());
        } else {
            match self.sampler.start() {
                Ok(()) => self.status_message = None,
                Err(e) => {
                    warn!("Failed to restart sampler: {e}");
                    self.status_message = Some(e.to_string());
                }
            }
        }
    }

    fn toggle_battery_saver(&mut self) {
        let result = self
            .settings
            .update_sampler(|config| config.battery_saver = !config.battery_saver);
        if let Err(e) = result {
            warn!("Failed to toggle battery saver: {e}");
            self.status_message = Some(e.to_string());
        }
    }

    fn ui(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints(
                [
                    Constraint::Length(3), // Header
                    Constraint::Length(3), // Sampler state
                    Constraint::Length(6), // Current rates
                    Constraint::Min(6),    // Sparklines
                    Constraint::Length(4), // Overlay and notification preview
                    Constraint::Length(3), // Footer
                ]
                .as_ref(),
            )
            .split(frame.area());

        self.render_header(frame, chunks[0]);
        self.render_status(frame, chunks[1]);
        self.render_current_speed(frame, chunks[2]);
        self.render_sparklines(frame, chunks[3]);
        self.render_preview(frame, chunks[4]);
        self.render_footer(frame, chunks[5]);
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let header = vec![Line::from(vec![
            Span::raw("Pulse Meter - Live Throughput"),
            Span::raw("    "),
            Span::styled(
                Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                Style::default().fg(Color::Yellow),
            ),
        ])];

        let block = Block::default()
            .borders(Borders::ALL)
            .style(Style::default().fg(Color::White));

        frame.render_widget(Paragraph::new(header).block(block), area);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let config = self.settings.current().sampler;
        let cadence = format!(
            "Source: {} | Interval: {} ms{}{}",
            self.sampler.source_name(),
            effective_interval(&config, false).as_millis(),
            if config.battery_saver { " (battery saver)" } else { "" },
            if config.low_traffic_throttle {
                format!(", up to {} ms when idle", effective_interval(&config, true).as_millis())
            } else {
                String::new()
            }
        );

        let line = if let Some(message) = &self.status_message {
            Line::from(vec![
                Span::styled("⚠ ", Style::default().fg(Color::Yellow)),
                Span::styled(message.clone(), Style::default().fg(Color::Yellow)),
                Span::raw(" | "),
                Span::styled(cadence, Style::default().fg(Color::DarkGray)),
            ])
        } else if self.sampler.is_running() {
            let updates = format!(
                "Updates: {} | Last: {}",
                self.publications,
                self.last_publication
                    .map(|t| format!("{:.1}s ago", t.elapsed().as_secs_f32()))
                    .unwrap_or_else(|| "waiting".to_string())
            );
            Line::from(vec![
                Span::styled("● ", Style::default().fg(Color::Green)),
                Span::raw("Sampling | "),
                Span::raw(updates),
                Span::raw(" | "),
                Span::styled(cadence, Style::default().fg(Color::DarkGray)),
            ])
        } else {
            Line::from(vec![
                Span::styled("○ ", Style::default().fg(Color::DarkGray)),
                Span::raw("Stopped | "),
                Span::styled(cadence, Style::default().fg(Color::DarkGray)),
            ])
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .title("Sampler")
            .style(Style::default().fg(Color::White));
        frame.render_widget(Paragraph::new(vec![line]).block(block), area);
    }

    fn render_current_speed(&self, frame: &mut Frame, area: Rect) {
        let reading = self.current;
        let speed_text = vec![
            Line::from(vec![
                Span::raw("Download: "),
                Span::styled(
                    format!("↓ {}", format_speed_line(reading.download_bps)),
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::from(vec![
                Span::raw("Upload:   "),
                Span::styled(
                    format!("↑ {}", format_speed_line(reading.upload_bps)),
                    Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::from(""),
            Line::from(vec![
                Span::raw("Total:    "),
                Span::raw(format_speed_line(reading.total_bps())),
            ]),
        ];

        let block = Block::default()
            .borders(Borders::ALL)
            .title("Current Rate")
            .style(Style::default().fg(Color::White));
        frame.render_widget(Paragraph::new(speed_text).block(block), area);
    }

    fn render_sparklines(&self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)].as_ref())
            .split(area);

        // KB/s keeps small rates visible next to bursts
        let download_data: Vec<u64> = self.download_history.iter().map(|&b| b / 1024).collect();
        let upload_data: Vec<u64> = self.upload_history.iter().map(|&b| b / 1024).collect();
        let max_download = download_data.iter().max().copied().unwrap_or(1);
        let max_upload = upload_data.iter().max().copied().unwrap_or(1);

        let download_title = match self.download_history.iter().max() {
            Some(&peak) => format!("Download (Peak: {})", format_speed_line(peak)),
            None => "Download (No data)".to_string(),
        };
        let upload_title = match self.upload_history.iter().max() {
            Some(&peak) => format!("Upload (Peak: {})", format_speed_line(peak)),
            None => "Upload (No data)".to_string(),
        };

        let download_sparkline = Sparkline::default()
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(download_title)
                    .title_style(Style::default().fg(Color::Green)),
            )
            .data(&download_data)
            .max(max_download.max(1))
            .style(Style::default().fg(Color::Green));

        let upload_sparkline = Sparkline::default()
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(upload_title)
                    .title_style(Style::default().fg(Color::Blue)),
            )
            .data(&upload_data)
            .max(max_upload.max(1))
            .style(Style::default().fg(Color::Blue));

        frame.render_widget(download_sparkline, chunks[0]);
        frame.render_widget(upload_sparkline, chunks[1]);
    }

    /// Shows the reading as the overlay and notification would render it
    fn render_preview(&self, frame: &mut Frame, area: Rect) {
        let settings = self.settings.current();
        let [first, second] = overlay_lines(&self.current, &settings.overlay);
        let notification = build_notification(&self.current, &settings.notification);

        let lines = vec![
            Line::from(vec![
                Span::styled("Overlay:      ", Style::default().fg(Color::DarkGray)),
                Span::raw(format!("{first}  {second}")),
            ]),
            Line::from(vec![
                Span::styled("Notification: ", Style::default().fg(Color::DarkGray)),
                Span::raw(notification.to_string()),
            ]),
        ];

        let block = Block::default()
            .borders(Borders::ALL)
            .title("Preview")
            .style(Style::default().fg(Color::White));
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn render_footer(&self, frame: &mut Frame, area: Rect) {
        let footer = Paragraph::new("'s' start/stop sampling | 'b' battery saver | 'q' or ESC to quit")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::TOP));

        frame.render_widget(footer, area);
    }
}
