use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::embedding::{EMBEDDING_DIM, EmbeddingError, check_dimension, decode_embedding};
use crate::model::{Beatgrid, KeyEstimate, Section, TrackAnalysis, TrackId, TransitionWindow};

/// Valid range for `energy_global`.
const ENERGY_RANGE: std::ops::RangeInclusive<u8> = 1..=10;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Bad embedding for track {track}: {source}")]
    Embedding {
        track: TrackId,
        source: EmbeddingError,
    },
}

/// Embedding as stored in a snapshot: the packed little-endian f32 blob
/// (`{"le_f32": [..bytes..]}`) or a plain float array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SnapshotEmbedding {
    Packed { le_f32: Vec<u8> },
    Values(Vec<f32>),
}

impl SnapshotEmbedding {
    fn into_vector(self) -> Result<Vec<f32>, EmbeddingError> {
        match self {
            Self::Packed { le_f32 } => decode_embedding(&le_f32, EMBEDDING_DIM),
            Self::Values(values) => check_dimension(values, EMBEDDING_DIM),
        }
    }
}

/// One snapshot entry as written on disk.
#[derive(Debug, Deserialize)]
struct SnapshotRecord {
    id: TrackId,
    path: PathBuf,
    #[serde(default)]
    tempo: Beatgrid,
    #[serde(default)]
    key: Option<KeyEstimate>,
    energy_global: u8,
    #[serde(default)]
    sections: Vec<Section>,
    #[serde(default)]
    transition_windows: Vec<TransitionWindow>,
    #[serde(default)]
    embedding: Option<SnapshotEmbedding>,
}

impl SnapshotRecord {
    fn into_analysis(self) -> Result<TrackAnalysis, SnapshotError> {
        let embedding = match self.embedding {
            Some(raw) => Some(raw.into_vector().map_err(|source| SnapshotError::Embedding {
                track: self.id.clone(),
                source,
            })?),
            None => None,
        };

        let mut energy_global = self.energy_global;
        if !ENERGY_RANGE.contains(&energy_global) {
            let clamped = energy_global.clamp(*ENERGY_RANGE.start(), *ENERGY_RANGE.end());
            log::warn!(
                "Track {} energy {} outside 1-10, clamped to {}",
                self.id,
                energy_global,
                clamped
            );
            energy_global = clamped;
        }

        Ok(TrackAnalysis {
            id: self.id,
            path: self.path,
            tempo: self.tempo,
            key: self.key,
            energy_global,
            sections: self.sections,
            transition_windows: self.transition_windows,
            embedding,
        })
    }
}

/// Read a JSON array of track analyses from disk.
pub fn load_snapshot(path: &Path) -> Result<Vec<TrackAnalysis>, SnapshotError> {
    let contents = std::fs::read_to_string(path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let tracks = parse_snapshot(&contents)?;
    log::info!("Loaded {} track analyses from {}", tracks.len(), path.display());
    Ok(tracks)
}

/// Parse a snapshot, decode embeddings to exactly [`EMBEDDING_DIM`] values
/// and clamp energy levels into 1-10.
///
/// The scoring core assumes both; this is the boundary where they hold.
pub fn parse_snapshot(json: &str) -> Result<Vec<TrackAnalysis>, SnapshotError> {
    let records: Vec<SnapshotRecord> = serde_json::from_str(json)?;
    records.into_iter().map(SnapshotRecord::into_analysis).collect()
}

/// Find a track by exact id, falling back to a unique id prefix.
pub fn find_track<'a>(tracks: &'a [TrackAnalysis], id: &str) -> Option<&'a TrackAnalysis> {
    let exact = TrackId::new(id);
    if let Some(track) = tracks.iter().find(|t| t.id == exact) {
        return Some(track);
    }
    let mut matches = tracks.iter().filter(|t| t.id.as_str().starts_with(id));
    match (matches.next(), matches.next()) {
        (Some(track), None) => Some(track),
        _ => None,
    }
}
