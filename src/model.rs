use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::compat::key::KeyRelation;

/// Stable track identity: the content hash of the audio file.
/// Ordering on this type is the secondary key for every tie-break.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub String);

impl TrackId {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One region of a tempo map, starting at `beat_index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoSegment {
    pub beat_index: u32,
    pub bpm: f64,
}

/// Detected beats for a track. Either part may be empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Beatgrid {
    pub tempo_map: Vec<TempoSegment>,
    /// Beat timestamps in seconds.
    pub beats: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyEstimate {
    /// Wheel notation, e.g. "8A".
    pub notation: String,
    #[serde(default)]
    pub confidence: f64,
}

/// Labeled beat range (intro, drop, outro, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub label: String,
    pub start_beat: u32,
    pub end_beat: u32,
    #[serde(default)]
    pub confidence: f64,
}

/// A beat range suited for mixing in or out of another track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionWindow {
    pub start_beat: u32,
    pub end_beat: u32,
    pub tag: String,
}

/// Immutable per-track analysis snapshot produced by the analysis pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackAnalysis {
    pub id: TrackId,
    pub path: PathBuf,
    #[serde(default)]
    pub tempo: Beatgrid,
    #[serde(default)]
    pub key: Option<KeyEstimate>,
    /// Global energy level, 1-10. Clamped upstream.
    pub energy_global: u8,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub transition_windows: Vec<TransitionWindow>,
    /// Timbre embedding. The snapshot loader guarantees `EMBEDDING_DIM` values.
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

impl TrackAnalysis {
    /// Key notation if one was recorded.
    pub fn key_notation(&self) -> Option<&str> {
        self.key.as_ref().map(|k| k.notation.as_str())
    }

    /// Tag of the first transition window, the only one the sequencer reads.
    pub fn first_window_tag(&self) -> Option<&str> {
        self.transition_windows.first().map(|w| w.tag.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceMode {
    /// Start low, keep energy from dropping.
    #[default]
    WarmUp,
    /// Start high, stay high.
    PeakTime,
    /// Start from the slowest track, no energy direction.
    OpenFormat,
}

impl SequenceMode {
    pub fn label(&self) -> &'static str {
        match self {
            Self::WarmUp => "warm-up",
            Self::PeakTime => "peak-time",
            Self::OpenFormat => "open-format",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceOptions {
    pub mode: SequenceMode,
    pub allow_key_jumps: bool,
    /// Soft limit on BPM distance between neighbors. 0 = unconstrained.
    pub max_bpm_step: f64,
    pub must_play: BTreeSet<TrackId>,
    pub ban: BTreeSet<TrackId>,
}

/// Why one track was placed after another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeExplanation {
    pub from: TrackId,
    pub to: TrackId,
    pub score: f64,
    /// `to - from` in BPM, `None` when either tempo is unknown.
    pub tempo_delta: Option<f64>,
    /// `to - from` on the 1-10 scale.
    pub energy_delta: i32,
    pub key_relation: KeyRelation,
    pub window_overlap_tag: Option<String>,
    pub reason: String,
}

/// Output of the sequencer: a playing order plus one explanation per edge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SequencePlan {
    pub order: Vec<TrackId>,
    pub explanations: Vec<EdgeExplanation>,
}

/// One ranked candidate from the similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub track_id: TrackId,
    /// Combined score, 0-1.
    pub score: f64,
    // Per-term matches, 0-100
    pub vibe_match: u8,
    pub tempo_match: u8,
    pub key_match: u8,
    pub energy_match: u8,
    /// Candidate minus query, `None` when either tempo is unknown.
    pub bpm_delta: Option<f64>,
    pub key_relation: KeyRelation,
    pub energy_delta: i32,
    pub explanation: String,
}
