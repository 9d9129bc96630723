//! Operator-facing surface used by the workflows.

use image::RgbImage;
use thiserror::Error;

/// Window showing the live scan with detected faces outlined.
pub const LOGIN_WINDOW: &str = "Biometric Login";
/// Window showing the frame or face crop of an identified user.
pub const IDENTIFIED_WINDOW: &str = "Identified User";

#[derive(Error, Debug)]
pub enum PresenterError {
    #[error("terminal I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("image output: {0}")]
    Image(#[from] image::ImageError),
}

/// Prompts, notices, frame display and the cancel key.
///
/// Every call blocks the caller except `notice_nonblocking` and
/// `cancel_requested`, which must return promptly.
pub trait Presenter {
    /// Ask for a display name. `None` means the operator dismissed the prompt.
    fn prompt_name(&mut self, message: &str) -> Result<Option<String>, PresenterError>;

    /// Show a notice and wait for the operator to acknowledge it.
    fn notice(&mut self, message: &str) -> Result<(), PresenterError>;

    /// Show a notice without waiting.
    fn notice_nonblocking(&mut self, message: &str) -> Result<(), PresenterError>;

    /// Display `image` in the named window, optionally captioned.
    fn show_frame(&mut self, window: &str, image: &RgbImage, caption: Option<&str>) -> Result<(), PresenterError>;

    /// Poll (without blocking) whether the operator pressed the stop key.
    fn cancel_requested(&mut self) -> Result<bool, PresenterError>;
}
