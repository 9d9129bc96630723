//! Pieces shared by the enrollment and authentication workflows.

use crate::embedder::EmbedderError;
use crate::presenter::PresenterError;
use crate::store::StoreError;
use crate::types::BoundingBox;
use facegate_hw::{CameraError, Frame, FrameSource};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use thiserror::Error;

const FACE_BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("no face detected in the captured frame")]
    NoFaceDetected,
    #[error("registration aborted: no name was entered")]
    NameNotProvided,
    #[error("camera failed {attempts} consecutive reads: {source}")]
    Capture {
        attempts: u32,
        #[source]
        source: CameraError,
    },
    #[error("embedding provider: {0}")]
    Embedder(#[from] EmbedderError),
    #[error("provider returned {got} embeddings for {expected} faces")]
    EmbeddingCount { expected: usize, got: usize },
    #[error("storage: {0}")]
    Store(#[from] StoreError),
    #[error("presentation: {0}")]
    Presenter(#[from] PresenterError),
}

/// Knobs shared by both workflows.
#[derive(Debug, Clone, Copy)]
pub struct WorkflowOptions {
    /// Consecutive failed camera reads tolerated before giving up.
    pub capture_retries: u32,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self { capture_retries: 3 }
    }
}

/// Read one frame, retrying up to `capture_retries` times after a failure.
pub(crate) fn read_frame<S: FrameSource>(
    source: &mut S,
    options: &WorkflowOptions,
) -> Result<Frame, WorkflowError> {
    let attempts = options.capture_retries + 1;
    let mut attempt = 1;
    loop {
        match source.read_frame() {
            Ok(frame) => return Ok(frame),
            Err(err) if attempt >= attempts => {
                return Err(WorkflowError::Capture { attempts, source: err });
            }
            Err(err) => {
                tracing::warn!(attempt, attempts, error = %err, "camera read failed, retrying");
                attempt += 1;
            }
        }
    }
}

/// Outline every face on `image` with a 2px green rectangle.
pub(crate) fn draw_face_boxes(image: &mut RgbImage, faces: &[BoundingBox]) {
    let (width, height) = image.dimensions();
    for face in faces {
        let Some((x, y, w, h)) = face.pixel_rect(width, height) else {
            continue;
        };
        draw_hollow_rect_mut(image, Rect::at(x as i32, y as i32).of_size(w, h), FACE_BOX_COLOR);
        if w > 2 && h > 2 {
            let inner = Rect::at(x as i32 + 1, y as i32 + 1).of_size(w - 2, h - 2);
            draw_hollow_rect_mut(image, inner, FACE_BOX_COLOR);
        }
    }
}
