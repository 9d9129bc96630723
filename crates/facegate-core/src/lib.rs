//! facegate-core: face enrollment and authentication engine.
//!
//! Faces are located with SCRFD and embedded with ArcFace, both through
//! ONNX Runtime, behind the [`FaceEmbedder`] trait. Reference images and
//! embedding records live in two flat directories keyed by display name.

pub mod alignment;
pub mod authenticate;
pub mod detector;
pub mod embedder;
pub mod enroll;
pub mod presenter;
pub mod recognizer;
pub mod store;
pub mod types;
pub mod workflow;

pub use authenticate::{authenticate, AuthOutcome};
pub use embedder::{EmbedderError, FaceEmbedder, OnnxEmbedder};
pub use enroll::{register, Enrollment};
pub use presenter::{Presenter, PresenterError};
pub use store::{EmbeddingStore, FaceStore, ImageStore, StoreError};
pub use types::{BoundingBox, ComparisonError, CosineMatcher, Embedding, EmbeddingRecord};
pub use workflow::{WorkflowError, WorkflowOptions};
