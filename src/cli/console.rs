use crate::camera::CameraStatus;
use crate::cli::ascii_preview::AsciiRenderer;
use crate::common::config::RenderConfig;
use crate::common::Result;
use crate::core::runner::{Command, Console};
use crate::core::session::{Mode, Session, STATUS_POSE_READY};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::{cursor, execute, queue, style, terminal};
use image::DynamicImage;
use std::io::{self, Write};
use std::time::Duration;

const BAR_WIDTH: usize = 20;

/// Raw-mode terminal screen. Restores the terminal when dropped.
pub struct TerminalConsole {
    ascii: Option<AsciiRenderer>,
}

impl TerminalConsole {
    pub fn new(render: &RenderConfig) -> Result<Self> {
        let ascii = render
            .ascii_preview
            .then(|| AsciiRenderer::new(render.ascii_width, render.ascii_height));

        terminal::enable_raw_mode()?;
        execute!(io::stdout(), terminal::EnterAlternateScreen, cursor::Hide)?;
        Ok(Self { ascii })
    }
}

impl Drop for TerminalConsole {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), cursor::Show, terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

impl Console for TerminalConsole {
    fn poll_command(&mut self, timeout: Duration) -> Result<Option<Command>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => Ok(command_for_key(key)),
            _ => Ok(None),
        }
    }

    fn draw(&mut self, session: &Session, preview: Option<&DynamicImage>) -> Result<()> {
        let preview_lines = match (&self.ascii, preview) {
            (Some(ascii), Some(frame)) => Some(ascii.render(frame, preview_banner(session))),
            _ => None,
        };
        let lines = compose_screen(session, preview_lines.as_deref());

        let mut stdout = io::stdout();
        queue!(stdout, terminal::Clear(terminal::ClearType::All), cursor::MoveTo(0, 0))?;
        for line in lines {
            queue!(stdout, style::Print(line), style::Print("\r\n"))?;
        }
        stdout.flush()?;
        Ok(())
    }

    fn alert(&mut self, message: &str) -> Result<()> {
        let mut stdout = io::stdout();
        queue!(stdout, style::Print("\r\n"))?;
        for line in message.lines() {
            queue!(stdout, style::Print(format!("  ⚠  {}\r\n", line)))?;
        }
        queue!(stdout, style::Print("  Press any key to continue\r\n"))?;
        stdout.flush()?;

        loop {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    return Ok(());
                }
            }
        }
    }
}

pub fn command_for_key(key: KeyEvent) -> Option<Command> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(Command::Quit);
    }
    match key.code {
        KeyCode::Char('c') | KeyCode::Char(' ') => Some(Command::Capture),
        KeyCode::Char('a') | KeyCode::Enter => Some(Command::Analyze),
        KeyCode::Char('q') | KeyCode::Esc => Some(Command::Quit),
        _ => None,
    }
}

/// Overlay for the preview's top row once a capture can be taken.
pub fn preview_banner(session: &Session) -> Option<&'static str> {
    session.capture_available().then_some(STATUS_POSE_READY)
}

/// Text of one full screen for the current session state.
pub fn compose_screen(session: &Session, preview: Option<&[String]>) -> Vec<String> {
    let mut lines = Vec::new();

    let title = match session.mode() {
        Mode::Continuous => "FaceLens · Live face shape",
        Mode::Gated => "FaceLens · Skin analysis",
    };
    lines.push(title.to_string());
    lines.push(format!("● {}", session.status()));
    if let CameraStatus::Error(reason) = session.camera() {
        lines.push(format!("  {}", reason));
    }
    lines.push(String::new());

    if let Some(preview) = preview {
        lines.extend(preview.iter().cloned());
        lines.push(String::new());
    }

    match session.mode() {
        Mode::Continuous => {
            for (name, value) in session.readout().fields() {
                lines.push(format!("{:<15} {}", name, value));
            }
            let bar = session.confidence_bar();
            let pct = bar.percent().map_or_else(String::new, |p| format!(" {}%", p));
            lines.push(format!("{:<15} {}{}", "", bar.render(BAR_WIDTH), pct));
            lines.push(String::new());
            lines.push("[q] quit".to_string());
        }
        Mode::Gated => {
            let tracker = session.tracker();
            lines.push(format!("Stable polls: {}", tracker.consecutive_stable_frames()));

            let mut keys = Vec::new();
            if session.capture_available() {
                keys.push("[c] capture");
            }
            if session.analyze_enabled() {
                keys.push("[a] analyze");
            }
            keys.push("[q] quit");
            lines.push(keys.join("   "));
            lines.push(String::new());

            for row in session.result_box() {
                lines.push(format!("  {}", row));
            }
            if let Some(chart) = session.chart() {
                lines.push(format!("Radar chart: {} (#{})", chart.path.display(), chart.generation));
            }
            if let Some(err) = session.chart_error() {
                lines.push(format!("Radar chart unavailable: {}", err));
            }
        }
    }

    lines
}
