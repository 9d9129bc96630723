//! Authentication: scan frames until a stored face matches or the operator cancels.

use crate::embedder::FaceEmbedder;
use crate::presenter::{Presenter, IDENTIFIED_WINDOW, LOGIN_WINDOW};
use crate::store::FaceStore;
use crate::types::{ComparisonError, Embedding};
use crate::workflow::{draw_face_boxes, read_frame, WorkflowError, WorkflowOptions};
use facegate_hw::FrameSource;
use image::{DynamicImage, RgbImage};
use std::path::Path;

/// How an authentication scan ended.
#[derive(Debug)]
pub enum AuthOutcome {
    /// A stored record matched a face in `frame`.
    Matched { name: String, frame: RgbImage },
    /// The operator pressed the stop key before any match.
    Cancelled,
}

/// Why a stored record could not be compared against a probe.
#[derive(Debug)]
enum ComparisonFailure<'a> {
    Unreadable(&'a crate::store::StoreError),
    Provider(ComparisonError),
}

impl std::fmt::Display for ComparisonFailure<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unreadable(e) => write!(f, "stored record unreadable: {e}"),
            Self::Provider(e) => write!(f, "{e}"),
        }
    }
}

/// Scan camera frames until a face matches a stored embedding or the
/// operator cancels.
///
/// Stored records are visited in store order and, for each, every face of
/// the current frame; the first positive comparison wins. Records that
/// cannot be read or compared are logged and treated as non-matches.
pub fn authenticate<S, E, P>(
    capture: &mut S,
    embedder: &mut E,
    presenter: &mut P,
    store: &FaceStore,
    options: &WorkflowOptions,
) -> Result<AuthOutcome, WorkflowError>
where
    S: FrameSource,
    E: FaceEmbedder,
    P: Presenter,
{
    tracing::info!(store = %store.embeddings.dir().display(), "authentication scan started");

    loop {
        let frame = read_frame(capture, options)?;
        let locations = embedder.locate_faces(&DynamicImage::ImageLuma8(frame.luma()))?;

        if !locations.is_empty() {
            let mut image = frame.image;
            let probes = embedder.encode_faces(&DynamicImage::ImageRgb8(image.clone()), &locations)?;
            if probes.len() != locations.len() {
                return Err(WorkflowError::EmbeddingCount {
                    expected: locations.len(),
                    got: probes.len(),
                });
            }

            if let Some(name) = first_match(embedder, store, &probes)? {
                tracing::info!(name = %name, sequence = frame.sequence, "user identified");
                presenter.notice_nonblocking(&format!("Welcome, {name}. Access granted."))?;
                presenter.show_frame(IDENTIFIED_WINDOW, &image, Some(&name))?;
                return Ok(AuthOutcome::Matched { name, frame: image });
            }

            draw_face_boxes(&mut image, &locations);
            presenter.show_frame(LOGIN_WINDOW, &image, None)?;
        }

        if presenter.cancel_requested()? {
            tracing::info!("authentication cancelled by operator");
            return Ok(AuthOutcome::Cancelled);
        }
    }
}

/// Name of the first stored record (in store order) matching any probe.
fn first_match<E: FaceEmbedder>(
    embedder: &E,
    store: &FaceStore,
    probes: &[Embedding],
) -> Result<Option<String>, WorkflowError> {
    for stored in store.embeddings.scan()? {
        let known = match &stored.record {
            Ok(record) => std::slice::from_ref(&record.embedding),
            Err(e) => {
                log_failure(&stored.name, &stored.path, &ComparisonFailure::Unreadable(e));
                continue;
            }
        };

        for probe in probes {
            match embedder.compare_faces(known, probe) {
                Ok(verdicts) if verdicts.iter().any(|&m| m) => return Ok(Some(stored.name)),
                Ok(_) => {}
                Err(e) => log_failure(&stored.name, &stored.path, &ComparisonFailure::Provider(e)),
            }
        }
    }
    Ok(None)
}

fn log_failure(name: &str, path: &Path, failure: &ComparisonFailure<'_>) {
    tracing::warn!(name, path = %path.display(), error = %failure, "face comparison failed; treating as no match");
}
