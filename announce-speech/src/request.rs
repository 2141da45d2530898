//! Announcement requests and artifact identifiers.
//!
//! Artifact names are `announcement_<unixSeconds>.wav`. A second announcement
//! within the same second gets a sequence suffix (`announcement_<secs>_1.wav`)
//! instead of overwriting a file the display may still be downloading.

use announce_common::error::{Error, Result};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// File name prefix shared by every artifact.
pub const ARTIFACT_PREFIX: &str = "announcement_";

/// Artifact container extension.
pub const ARTIFACT_EXTENSION: &str = "wav";

/// Identifier of one generated artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactId {
    seconds: u64,
    sequence: u32,
}

impl ArtifactId {
    /// Create an id from a unix timestamp and an in-second sequence number.
    pub fn new(seconds: u64, sequence: u32) -> Self {
        Self { seconds, sequence }
    }

    /// Unix timestamp (seconds) the id was allocated in.
    pub fn seconds(&self) -> u64 {
        self.seconds
    }

    /// Position within its second; zero for the first announcement.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// File name of the artifact, e.g. `announcement_1700000000.wav`.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self, ARTIFACT_EXTENSION)
    }

    /// Parse an id from either its stem or its file name.
    pub fn parse(s: &str) -> Option<Self> {
        let stem = s
            .strip_suffix(ARTIFACT_EXTENSION)
            .and_then(|rest| rest.strip_suffix('.'))
            .unwrap_or(s);
        let rest = stem.strip_prefix(ARTIFACT_PREFIX)?;

        let (seconds, sequence) = match rest.split_once('_') {
            Some((secs, seq)) => {
                let sequence: u32 = parse_digits(seq)?;
                if sequence == 0 {
                    return None;
                }
                (parse_digits(secs)?, sequence)
            }
            None => (parse_digits(rest)?, 0),
        };
        Some(Self { seconds, sequence })
    }
}

fn parse_digits<T: std::str::FromStr>(s: &str) -> Option<T> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sequence == 0 {
            write!(f, "{}{}", ARTIFACT_PREFIX, self.seconds)
        } else {
            write!(f, "{}{}_{}", ARTIFACT_PREFIX, self.seconds, self.sequence)
        }
    }
}

/// Allocates strictly increasing artifact ids.
///
/// Never hands out the same id twice, even if the wall clock steps backwards.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: Option<ArtifactId>,
}

impl IdGenerator {
    /// Create a generator with no history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id for the current wall-clock second.
    pub fn next_id(&mut self) -> ArtifactId {
        let seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.next_at(seconds)
    }

    /// Allocate an id for the given unix second.
    pub fn next_at(&mut self, seconds: u64) -> ArtifactId {
        let id = match self.last {
            Some(last) if seconds <= last.seconds => ArtifactId::new(last.seconds, last.sequence + 1),
            _ => ArtifactId::new(seconds, 0),
        };
        self.last = Some(id);
        id
    }
}

/// Reject text that has nothing to speak.
///
/// # Errors
/// Returns `Error::Validation` for empty or whitespace-only text.
pub fn validate_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(Error::validation("announcement text is empty"));
    }
    Ok(())
}

/// One announcement: the text to speak and the id of the artifact it becomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    text: String,
    id: ArtifactId,
}

impl Announcement {
    /// Create an announcement, rejecting blank text.
    ///
    /// The text is kept verbatim; only the emptiness check trims.
    pub fn new(text: impl Into<String>, id: ArtifactId) -> Result<Self> {
        let text = text.into();
        validate_text(&text)?;
        Ok(Self { text, id })
    }

    /// Text to speak.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Id of the artifact this announcement produces.
    pub fn id(&self) -> ArtifactId {
        self.id
    }
}
