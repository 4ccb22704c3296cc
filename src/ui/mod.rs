//! Terminal UI
//!
//! Architecture:
//! - terminal.rs: raw mode / alternate screen lifecycle
//! - keys.rs: key and resize events → [`Action`]
//! - render.rs: records, status bar and help bar → styled lines
//! - theme.rs: dark and light palettes
//!
//! [`App`] owns the viewport and all display state; [`run`] wires it to a
//! [`Tailer`] and the terminal.

mod keys;
mod render;
mod terminal;
pub mod theme;

pub use keys::{Action, action_for};
pub use render::{TextLayout, render_record};

use crate::envelope;
use crate::tail::{TailConfig, TailError, TailStatus, Tailer};
use crate::viewport::Viewport;
use anyhow::{Context, Result};
use crossterm::event::EventStream;
use futures_util::StreamExt;
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout};
use ratatui::text::Line;
use ratatui::widgets::Paragraph;
use render::StatusLine;
use std::path::Path;
use theme::{ThemeColors, ThemeStyle};
use tracing::{debug, info, warn};

/// Rows taken by the status and help bars.
const CHROME_ROWS: u16 = 2;

fn body_height(terminal_height: u16) -> usize {
    terminal_height.saturating_sub(CHROME_ROWS) as usize
}

/// Display state for one tailed file.
pub struct App {
    file_name: String,
    viewport: Viewport<TextLayout>,
    colors: ThemeColors,
    status: TailStatus,
    decode_errors: usize,
    last_error: Option<String>,
    quit: bool,
}

impl App {
    pub fn new(path: &Path, theme: ThemeStyle, width: u16, height: u16) -> Self {
        let colors = theme.colors();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            file_name,
            viewport: Viewport::new(TextLayout::new(colors), width, body_height(height)),
            colors,
            status: TailStatus::default(),
            decode_errors: 0,
            last_error: None,
            quit: false,
        }
    }

    pub fn viewport(&self) -> &Viewport<TextLayout> {
        &self.viewport
    }

    pub fn decode_errors(&self) -> usize {
        self.decode_errors
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    /// Decode one line and append its records. Malformed lines are counted and skipped.
    pub fn ingest_line(&mut self, line: &[u8]) {
        match envelope::decode(line) {
            Ok(records) => self.viewport.append(records),
            Err(e) => {
                self.decode_errors += 1;
                debug!(error = %e, len = line.len(), "skipping malformed line");
            }
        }
    }

    pub fn record_error(&mut self, error: &TailError) {
        warn!(error = %error, "tail error");
        self.last_error = Some(error.to_string());
    }

    pub fn set_status(&mut self, status: TailStatus) {
        if status.epoch != self.status.epoch {
            // A fresh session supersedes whatever went wrong with the last one.
            self.last_error = None;
        }
        self.status = status;
    }

    pub fn apply(&mut self, action: Action) {
        match action {
            Action::Quit => self.quit = true,
            Action::ScrollUp => self.viewport.scroll_by(-1),
            Action::ScrollDown => self.viewport.scroll_by(1),
            Action::PageUp => self.viewport.page_up(),
            Action::PageDown => self.viewport.page_down(),
            Action::Top => self.viewport.jump_to_top(),
            Action::Bottom => self.viewport.jump_to_bottom(),
            Action::ToggleFollow => self.viewport.toggle_follow(),
            Action::Resize { width, height } => {
                self.viewport.resize(width, body_height(height));
            }
        }
    }

    pub fn draw(&self, frame: &mut Frame) {
        let [status_area, body_area, help_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        let info = StatusLine {
            file_name: &self.file_name,
            records: self.viewport.len(),
            status: self.status,
            decode_errors: self.decode_errors,
            last_error: self.last_error.as_deref(),
        };
        frame.render_widget(
            Paragraph::new(render::status_bar(&info, status_area.width, &self.colors))
                .style(self.colors.status_bar()),
            status_area,
        );

        let body = if self.viewport.is_empty() {
            vec![render::placeholder(&self.file_name, &self.colors)]
        } else {
            self.visible_body()
        };
        frame.render_widget(Paragraph::new(body), body_area);

        frame.render_widget(
            Paragraph::new(render::help_bar(self.viewport.follow(), &self.colors)),
            help_area,
        );
    }

    fn visible_body(&self) -> Vec<Line<'static>> {
        let window = self.viewport.visible_lines();
        let mut lines = Vec::with_capacity(window.len());
        for (first, record) in self.viewport.visible_records() {
            let rendered = render_record(record, self.viewport.width(), &self.colors);
            lines.extend(rendered.into_iter().skip(window.start.saturating_sub(first)));
        }
        lines.truncate(window.len());
        lines
    }
}

/// Tail `path` and show it until the user quits.
///
/// Startup failures (missing file, watch setup) are returned before the
/// terminal is touched.
pub async fn run(path: &Path, tail_config: TailConfig, theme: ThemeStyle) -> Result<()> {
    let mut tailer = Tailer::start(path, tail_config)
        .with_context(|| format!("cannot tail {}", path.display()))?;

    terminal::install_panic_hook();
    let mut tui = terminal::setup_terminal()?;
    let result = event_loop(&mut tui, &mut tailer, path, theme).await;
    tailer.stop();
    let restored = terminal::restore_terminal();
    result.and(restored)
}

async fn event_loop(
    tui: &mut terminal::Tui,
    tailer: &mut Tailer,
    path: &Path,
    theme: ThemeStyle,
) -> Result<()> {
    let size = tui.size().context("Failed to read terminal size")?;
    let mut app = App::new(path, theme, size.width, size.height);
    let errors = tailer.errors();
    let mut status = tailer.status();
    let mut events = EventStream::new();
    let mut errors_open = true;
    let mut status_open = true;

    tui.draw(|frame| app.draw(frame)).context("Failed to draw")?;

    loop {
        tokio::select! {
            line = tailer.next_line() => match line {
                Some(line) => app.ingest_line(&line),
                None => {
                    info!("tailer closed");
                    break;
                }
            },
            error = errors.recv(), if errors_open => match error {
                Some(error) => app.record_error(&error),
                None => errors_open = false,
            },
            changed = status.changed(), if status_open => match changed {
                Ok(()) => app.set_status(*status.borrow_and_update()),
                Err(_) => status_open = false,
            },
            event = events.next() => match event {
                Some(Ok(event)) => {
                    if let Some(action) = action_for(&event) {
                        app.apply(action);
                    }
                }
                Some(Err(e)) => return Err(e).context("Failed to read terminal input"),
                None => break,
            },
        }

        if app.should_quit() {
            debug!("quit requested");
            break;
        }
        tui.draw(|frame| app.draw(frame)).context("Failed to draw")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tail::TailPhase;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    const SYSTEM: &str = r#"{"type":"system","model":"claude-sonnet","cwd":"/work"}"#;
    const TEXT: &str =
        r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Looking now"}]}}"#;

    fn app() -> App {
        App::new(Path::new("/logs/run.jsonl"), ThemeStyle::Dark, 60, 12)
    }

    fn screen(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let width = buffer.area.width as usize;
        buffer
            .content
            .chunks(width)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn ingest_appends_records_and_counts_bad_lines() {
        let mut app = app();
        app.ingest_line(SYSTEM.as_bytes());
        app.ingest_line(b"{not json");
        app.ingest_line(TEXT.as_bytes());
        app.ingest_line(b"   ");

        assert_eq!(app.viewport().len(), 2);
        assert_eq!(app.decode_errors(), 1);
    }

    #[test]
    fn actions_drive_the_viewport() {
        let mut app = App::new(Path::new("run.jsonl"), ThemeStyle::Dark, 60, 6);
        for _ in 0..10 {
            app.ingest_line(TEXT.as_bytes());
        }
        assert!(app.viewport().follow());

        app.apply(Action::ScrollUp);
        assert!(!app.viewport().follow());
        app.apply(Action::ToggleFollow);
        assert!(app.viewport().follow());
        app.apply(Action::Top);
        assert_eq!(app.viewport().offset(), 0);

        app.apply(Action::Resize {
            width: 60,
            height: 40,
        });
        assert_eq!(app.viewport().height(), 38);

        app.apply(Action::Quit);
        assert!(app.should_quit());
    }

    #[test]
    fn new_session_clears_last_error() {
        let mut app = app();
        app.set_status(TailStatus {
            phase: TailPhase::Tailing,
            epoch: 1,
            offset: 0,
        });
        app.record_error(&TailError::Watch(notify::Error::generic("boom")));
        assert!(app.last_error().is_some_and(|e| e.contains("boom")));

        app.set_status(TailStatus {
            phase: TailPhase::Opening,
            epoch: 2,
            offset: 0,
        });
        assert!(app.last_error().is_none());
    }

    #[test]
    fn empty_view_shows_placeholder() {
        let app = app();
        let mut terminal = Terminal::new(TestBackend::new(60, 12)).unwrap();
        terminal.draw(|frame| app.draw(frame)).unwrap();

        let screen = screen(&terminal);
        assert!(screen.contains("watching: run.jsonl"));
        assert!(screen.contains("Waiting for events from run.jsonl..."));
        assert!(screen.contains("[FOLLOW]"));
    }

    #[test]
    fn records_are_drawn_in_order() {
        let mut app = app();
        app.ingest_line(SYSTEM.as_bytes());
        app.ingest_line(TEXT.as_bytes());

        let mut terminal = Terminal::new(TestBackend::new(60, 12)).unwrap();
        terminal.draw(|frame| app.draw(frame)).unwrap();

        let screen = screen(&terminal);
        let system = screen.find("model: claude-sonnet").unwrap();
        let text = screen.find("Looking now").unwrap();
        assert!(system < text);
        assert!(screen.contains("2 events"));
    }
}
