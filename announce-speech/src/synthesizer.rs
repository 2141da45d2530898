//! Speech synthesis with engine fallback.
//!
//! One call turns one announcement into one WAV artifact:
//!
//! 1. run the primary engine under its timeout;
//! 2. on absence, failure, timeout or empty output, run the fallback engine;
//! 3. accept an attempt only if the process exited 0 and wrote a non-empty file;
//! 4. move the file to its final name and apply the retention cap.
//!
//! Engines write to a hidden partial file first, so the artifact server never
//! hands out a half-written WAV under its published name.

use crate::engine::{EspeakEngine, Pyttsx3Engine, SpeechEngine};
use crate::request::{Announcement, ArtifactId, validate_text};
use crate::retention::RetentionPolicy;
use announce_common::config::Config;
use announce_common::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// A generated audio file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Id the artifact was generated under.
    pub id: ArtifactId,
    /// Location on disk.
    pub path: PathBuf,
    /// File size; always greater than zero.
    pub size_bytes: u64,
    /// Engine that produced it.
    pub engine: String,
}

impl Artifact {
    /// File name as served over HTTP.
    pub fn file_name(&self) -> String {
        self.id.file_name()
    }
}

/// Primary/fallback speech synthesizer bound to one output directory.
pub struct Synthesizer {
    output_dir: PathBuf,
    primary: Box<dyn SpeechEngine>,
    fallback: Option<Box<dyn SpeechEngine>>,
    retention: RetentionPolicy,
}

impl Synthesizer {
    /// Create a synthesizer with a fallback engine.
    pub fn new(
        output_dir: impl Into<PathBuf>,
        primary: Box<dyn SpeechEngine>,
        fallback: Box<dyn SpeechEngine>,
        max_files: usize,
    ) -> Self {
        let output_dir = output_dir.into();
        Self {
            retention: RetentionPolicy::new(output_dir.clone(), max_files),
            output_dir,
            primary,
            fallback: Some(fallback),
        }
    }

    /// Create a synthesizer that only has one engine.
    pub fn without_fallback(
        output_dir: impl Into<PathBuf>,
        primary: Box<dyn SpeechEngine>,
        max_files: usize,
    ) -> Self {
        let output_dir = output_dir.into();
        Self {
            retention: RetentionPolicy::new(output_dir.clone(), max_files),
            output_dir,
            primary,
            fallback: None,
        }
    }

    /// espeak primary with pyttsx3 fallback, as configured.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.output_dir.clone(),
            Box::new(EspeakEngine::from_config(config)),
            Box::new(Pyttsx3Engine::from_config(config)),
            config.max_audio_files,
        )
    }

    /// Directory artifacts are written to.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Retention policy applied after each success.
    pub fn retention(&self) -> &RetentionPolicy {
        &self.retention
    }

    /// Names of the configured engines, in the order they are tried.
    pub fn engine_names(&self) -> Vec<&str> {
        self.engines().map(|e| e.name()).collect()
    }

    fn engines(&self) -> impl Iterator<Item = &(dyn SpeechEngine + 'static)> {
        std::iter::once(self.primary.as_ref()).chain(self.fallback.as_deref())
    }

    /// Synthesize one announcement.
    ///
    /// # Errors
    /// - `Error::Validation` for blank text (no engine is started)
    /// - `Error::SynthesisFailed` when every engine failed; no artifact is
    ///   left behind
    #[instrument(level = "info", skip(self, announcement), fields(id = %announcement.id()))]
    pub async fn synthesize(&self, announcement: &Announcement) -> Result<Artifact> {
        validate_text(announcement.text())?;
        fs::create_dir_all(&self.output_dir).await?;

        info!(text = %announcement.text(), "Generating speech");

        let target = self.output_dir.join(announcement.id().file_name());
        let mut failures = Vec::new();

        for engine in self.engines() {
            match self.attempt(engine, announcement, &target).await {
                Ok(size_bytes) => {
                    info!(
                        engine = engine.name(),
                        file = %announcement.id().file_name(),
                        bytes = size_bytes,
                        "Audio generated"
                    );
                    let report = self.retention.enforce().await;
                    debug!(
                        kept = report.kept,
                        removed = report.removed.len(),
                        "Retention applied"
                    );
                    return Ok(Artifact {
                        id: announcement.id(),
                        path: target,
                        size_bytes,
                        engine: engine.name().to_string(),
                    });
                }
                Err(e) => {
                    if e.is_engine_unavailable() {
                        warn!(engine = engine.name(), "Speech engine not found, trying next");
                    } else {
                        warn!(engine = engine.name(), error = %e, "Speech engine failed");
                    }
                    failures.push(format!("{}: {}", engine.name(), e));
                }
            }
        }

        Err(Error::synthesis_failed(failures.join("; ")))
    }

    /// Run one engine; on any failure the partial file is removed.
    async fn attempt(
        &self,
        engine: &dyn SpeechEngine,
        announcement: &Announcement,
        target: &Path,
    ) -> Result<u64> {
        let partial = self.output_dir.join(format!(
            ".{}.{}.partial.wav",
            announcement.id(),
            Uuid::new_v4().simple()
        ));

        let result = run_attempt(engine, announcement.text(), &partial, target).await;
        if result.is_err() {
            remove_partial(&partial).await;
        }
        result
    }
}

async fn run_attempt(
    engine: &dyn SpeechEngine,
    text: &str,
    partial: &Path,
    target: &Path,
) -> Result<u64> {
    let budget = engine.timeout();
    match tokio::time::timeout(budget, engine.synthesize(text, partial)).await {
        Ok(result) => result?,
        Err(_) => return Err(Error::timeout(engine.name(), whole_seconds(budget))),
    }

    let settle = engine.settle_delay();
    if !settle.is_zero() {
        tokio::time::sleep(settle).await;
    }

    let size = match fs::metadata(partial).await {
        Ok(metadata) => metadata.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::engine(engine.name(), "no audio file was written"));
        }
        Err(e) => return Err(e.into()),
    };
    if size == 0 {
        return Err(Error::engine(engine.name(), "audio file is empty"));
    }

    fs::rename(partial, target).await?;
    Ok(size)
}

async fn remove_partial(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => debug!(file = %path.display(), "Removed partial audio file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(file = %path.display(), error = %e, "Could not remove partial audio file"),
    }
}

fn whole_seconds(duration: Duration) -> u64 {
    duration.as_secs_f64().ceil() as u64
}
