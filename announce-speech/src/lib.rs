//! HUB75 Announce Speech Library
//!
//! Turns announcement text into WAV artifacts on disk.
//!
//! - [`request`] - announcement validation and collision-free artifact ids
//! - [`engine`] - subprocess speech engines (espeak primary, pyttsx3 fallback)
//! - [`synthesizer`] - primary/fallback orchestration with timeouts
//! - [`retention`] - oldest-first cleanup of generated artifacts

pub mod engine;
pub mod request;
pub mod retention;
pub mod synthesizer;

pub use engine::{EspeakEngine, Pyttsx3Engine, SpeechEngine, run_engine};
pub use request::{
    ARTIFACT_EXTENSION, ARTIFACT_PREFIX, Announcement, ArtifactId, IdGenerator, validate_text,
};
pub use retention::{ArtifactPattern, RetentionPolicy, RetentionReport, count_artifacts};
pub use synthesizer::{Artifact, Synthesizer};
