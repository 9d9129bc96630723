//! Terminal presenter: prompts on stdin/stdout, windows as PNG files.

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use facegate_core::{Presenter, PresenterError};
use image::RgbImage;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Renders workflow output on the terminal. Each named window is a PNG file
/// under `display_dir` that is overwritten on every update.
pub struct TerminalPresenter {
    display_dir: PathBuf,
}

impl TerminalPresenter {
    pub fn new(display_dir: impl Into<PathBuf>) -> Self {
        Self {
            display_dir: display_dir.into(),
        }
    }

    pub fn window_path(&self, window: &str) -> PathBuf {
        self.display_dir.join(format!("{}.png", window_slug(window)))
    }
}

impl Presenter for TerminalPresenter {
    fn prompt_name(&mut self, message: &str) -> Result<Option<String>, PresenterError> {
        print!("{message} ");
        io::stdout().flush()?;
        Ok(read_line(&mut io::stdin().lock())?)
    }

    fn notice(&mut self, message: &str) -> Result<(), PresenterError> {
        println!("{message}");
        print!("Press Enter to continue...");
        io::stdout().flush()?;
        read_line(&mut io::stdin().lock())?;
        Ok(())
    }

    fn notice_nonblocking(&mut self, message: &str) -> Result<(), PresenterError> {
        say(message)?;
        Ok(())
    }

    fn show_frame(&mut self, window: &str, image: &RgbImage, caption: Option<&str>) -> Result<(), PresenterError> {
        let path = self.window_path(window);
        write_window(&path, image)?;
        tracing::debug!(window, path = %path.display(), "window updated");
        if let Some(caption) = caption {
            say(&format!("[{window}] {caption} ({})", path.display()))?;
        }
        Ok(())
    }

    fn cancel_requested(&mut self) -> Result<bool, PresenterError> {
        let mut cancel = false;
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                cancel |= is_stop_key(&key);
            }
        }
        Ok(cancel)
    }
}

/// Raw terminal mode for the duration of a scan, so single key presses
/// reach `cancel_requested` without Enter.
pub struct RawModeGuard(());

impl RawModeGuard {
    pub fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self(()))
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            tracing::warn!(error = %e, "failed to restore terminal mode");
        }
    }
}

fn is_stop_key(key: &KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

/// Print a line that renders correctly in raw mode as well.
pub fn say(message: &str) -> io::Result<()> {
    let mut out = io::stdout().lock();
    write!(out, "{message}\r\n")?;
    out.flush()
}

/// One line without its terminator; `None` at end of input.
pub fn read_line<R: BufRead>(input: &mut R) -> io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let trimmed = line.trim_end_matches(['\n', '\r']).len();
    line.truncate(trimmed);
    Ok(Some(line))
}

fn write_window(path: &Path, image: &RgbImage) -> Result<(), PresenterError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    image.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}

/// File-system-safe form of a window title: "Biometric Login" -> "biometric-login".
fn window_slug(window: &str) -> String {
    let mut slug = String::with_capacity(window.len());
    for c in window.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("window");
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use facegate_core::presenter::{IDENTIFIED_WINDOW, LOGIN_WINDOW};

    #[test]
    fn test_window_slugs() {
        assert_eq!(window_slug(LOGIN_WINDOW), "biometric-login");
        assert_eq!(window_slug(IDENTIFIED_WINDOW), "identified-user");
        assert_eq!(window_slug("  Left / Right  "), "left-right");
        assert_eq!(window_slug("///"), "window");
    }

    #[test]
    fn test_read_line_strips_terminator_only() {
        let mut input = io::Cursor::new(b" Ana Lima \r\nnext\n".to_vec());
        assert_eq!(read_line(&mut input).unwrap().as_deref(), Some(" Ana Lima "));
        assert_eq!(read_line(&mut input).unwrap().as_deref(), Some("next"));
        assert_eq!(read_line(&mut input).unwrap(), None);
    }

    #[test]
    fn test_read_line_empty_line_is_empty_name() {
        let mut input = io::Cursor::new(b"\n".to_vec());
        assert_eq!(read_line(&mut input).unwrap().as_deref(), Some(""));
    }

    #[test]
    fn test_show_frame_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let mut presenter = TerminalPresenter::new(dir.path().join("display"));
        let image = RgbImage::from_pixel(4, 3, image::Rgb([10, 200, 30]));

        presenter.show_frame(LOGIN_WINDOW, &image, None).unwrap();

        let written = image::open(presenter.window_path(LOGIN_WINDOW)).unwrap().to_rgb8();
        assert_eq!(written.dimensions(), (4, 3));
        assert_eq!(written.get_pixel(2, 1), &image::Rgb([10, 200, 30]));
    }

    #[test]
    fn test_stop_keys() {
        let q = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        let c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::NONE);
        assert!(is_stop_key(&q));
        assert!(is_stop_key(&ctrl_c));
        assert!(!is_stop_key(&c));
    }
}
