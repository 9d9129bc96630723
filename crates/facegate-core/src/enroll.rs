//! Enrollment: capture one frame, take its first face, store crop and embedding.

use crate::embedder::FaceEmbedder;
use crate::presenter::Presenter;
use crate::store::{validate_name, FaceStore};
use crate::types::EmbeddingRecord;
use crate::workflow::{read_frame, WorkflowError, WorkflowOptions};
use facegate_hw::FrameSource;
use image::{imageops, DynamicImage, GrayImage};
use std::path::PathBuf;

const NAME_PROMPT: &str = "Please enter your name:";
const NO_FACE_NOTICE: &str = "No face was detected for registration.";

/// A completed enrollment.
#[derive(Debug, Clone)]
pub struct Enrollment {
    pub name: String,
    /// Grayscale crop of the enrolled face, as stored in the image store.
    pub face_image: GrayImage,
    pub image_path: PathBuf,
    pub record_path: PathBuf,
}

/// Enroll the face in the next captured frame under an operator-supplied name.
///
/// Faces are located on the luma image and encoded on the colour frame; only
/// the first location is used. The reference image is written before the
/// embedding record, and an existing entry with the same name is replaced.
pub fn register<S, E, P>(
    capture: &mut S,
    embedder: &mut E,
    presenter: &mut P,
    store: &FaceStore,
    options: &WorkflowOptions,
) -> Result<Enrollment, WorkflowError>
where
    S: FrameSource,
    E: FaceEmbedder,
    P: Presenter,
{
    let frame = read_frame(capture, options)?;
    let luma = frame.luma();

    let locations = embedder.locate_faces(&DynamicImage::ImageLuma8(luma.clone()))?;
    let Some(face) = locations.first() else {
        tracing::info!(sequence = frame.sequence, "registration: no face in frame");
        presenter.notice(NO_FACE_NOTICE)?;
        return Err(WorkflowError::NoFaceDetected);
    };
    if locations.len() > 1 {
        tracing::debug!(count = locations.len(), "registration: using first of several faces");
    }

    let Some((x, y, w, h)) = face.pixel_rect(luma.width(), luma.height()) else {
        tracing::warn!(?face, "registration: face box lies outside the frame");
        presenter.notice(NO_FACE_NOTICE)?;
        return Err(WorkflowError::NoFaceDetected);
    };
    let face_image = imageops::crop_imm(&luma, x, y, w, h).to_image();

    let color = DynamicImage::ImageRgb8(frame.image);
    let mut encodings = embedder.encode_faces(&color, std::slice::from_ref(face))?;
    if encodings.len() != 1 {
        return Err(WorkflowError::EmbeddingCount {
            expected: 1,
            got: encodings.len(),
        });
    }
    let embedding = encodings.remove(0);

    let name = presenter
        .prompt_name(NAME_PROMPT)?
        .ok_or(WorkflowError::NameNotProvided)?;
    validate_name(&name)?;

    let image_path = store.images.save(&name, &face_image)?;
    let record_path = store.embeddings.save(&EmbeddingRecord::new(name.clone(), embedding))?;

    tracing::info!(name = %name, image = %image_path.display(), record = %record_path.display(), "user registered");
    presenter.notice(&format!("User {name} registered successfully."))?;

    Ok(Enrollment {
        name,
        face_image,
        image_path,
        record_path,
    })
}
