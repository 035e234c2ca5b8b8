use crate::compat::energy::{energy_distance, signed_energy_delta};
use crate::compat::key::{KeyRelation, classify_keys};
use crate::compat::tempo::{representative_bpm, signed_bpm_delta, track_tempo_distance};
use crate::config::{KeyTierScores, SimilarityWeights};
use crate::embedding::cosine_similarity;
use crate::model::{SimilarityResult, TrackAnalysis};

/// Per-term similarity, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityTerms {
    pub embedding: f64,
    pub tempo: f64,
    pub key: f64,
    pub energy: f64,
}

impl SimilarityTerms {
    /// Weighted mean of the terms, clamped to [0, 1].
    pub fn combine(&self, weights: &SimilarityWeights) -> f64 {
        let total = weights.total();
        if total <= 0.0 {
            return 0.0;
        }
        let sum = weights.embedding * self.embedding
            + weights.tempo * self.tempo
            + weights.key * self.key
            + weights.energy * self.energy;
        let score = sum / total;
        if score.is_finite() { score.clamp(0.0, 1.0) } else { 0.0 }
    }
}

/// Cosine between two optional embeddings; `None` when either is absent or
/// the pair cannot be compared (empty, length mismatch, zero norm).
pub fn embedding_cosine(a: Option<&[f32]>, b: Option<&[f32]>) -> Option<f64> {
    cosine_similarity(a?, b?)
}

/// Cosine similarity mapped from [-1, 1] to [0, 1]; 0 when undefined.
pub fn embedding_term(a: Option<&[f32]>, b: Option<&[f32]>) -> f64 {
    cosine_to_term(embedding_cosine(a, b))
}

fn cosine_to_term(cosine: Option<f64>) -> f64 {
    cosine.map_or(0.0, |c| (c + 1.0) / 2.0)
}

/// Linear ramp: full match at `full_match_bpm`, nothing at `zero_match_bpm`.
pub fn tempo_term(distance: Option<f64>, weights: &SimilarityWeights) -> f64 {
    let Some(d) = distance else {
        return weights.unknown_tempo;
    };
    if d <= weights.full_match_bpm {
        1.0
    } else if d >= weights.zero_match_bpm {
        0.0
    } else {
        (weights.zero_match_bpm - d) / (weights.zero_match_bpm - weights.full_match_bpm)
    }
}

pub fn key_term(relation: KeyRelation, tiers: &KeyTierScores) -> f64 {
    match relation {
        KeyRelation::Same => tiers.same,
        KeyRelation::Relative => tiers.relative,
        KeyRelation::Adjacent => tiers.adjacent,
        KeyRelation::CrossModeAdjacent => tiers.cross_mode_adjacent,
        KeyRelation::EnergyBoost => tiers.energy_boost,
        KeyRelation::Clash => tiers.clash,
        KeyRelation::Unparseable => tiers.unparseable,
        KeyRelation::Missing => tiers.missing,
    }
}

pub fn energy_term(a: u8, b: u8, weights: &SimilarityWeights) -> f64 {
    (1.0 - f64::from(energy_distance(a, b)) / weights.energy_zero_distance).max(0.0)
}

fn percent(term: f64) -> u8 {
    (term * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Symmetric similarity between a query and a candidate on a 0-1 scale.
///
/// Unrelated to the sequencer's edge score: this answers "how alike are these
/// two tracks", not "what should play next".
pub fn score_pair(
    query: &TrackAnalysis,
    candidate: &TrackAnalysis,
    weights: &SimilarityWeights,
) -> SimilarityResult {
    let query_bpm = representative_bpm(&query.tempo);
    let candidate_bpm = representative_bpm(&candidate.tempo);
    let distance = track_tempo_distance(query_bpm, candidate_bpm);
    let bpm_delta = signed_bpm_delta(query_bpm, candidate_bpm);
    let relation = classify_keys(query.key_notation(), candidate.key_notation());
    let cosine = embedding_cosine(query.embedding.as_deref(), candidate.embedding.as_deref());

    let terms = SimilarityTerms {
        embedding: cosine_to_term(cosine),
        tempo: tempo_term(distance, weights),
        key: key_term(relation, &weights.key_tiers),
        energy: energy_term(query.energy_global, candidate.energy_global, weights),
    };
    let score = terms.combine(weights);
    let energy_delta = signed_energy_delta(query.energy_global, candidate.energy_global);

    let mut parts: Vec<String> = Vec::with_capacity(4);
    match cosine {
        Some(_) => parts.push(format!("vibe {}%", percent(terms.embedding))),
        None if query.embedding.is_none() || candidate.embedding.is_none() => {
            parts.push("no embedding to compare".to_string())
        }
        None => parts.push("embedding not comparable".to_string()),
    }
    match (distance, bpm_delta) {
        (Some(d), Some(delta)) if d + 1e-9 < delta.abs() => {
            parts.push(format!("tempo {delta:+.1} BPM (half/double-time)"))
        }
        (Some(_), Some(delta)) => parts.push(format!("tempo {delta:+.1} BPM")),
        _ => parts.push("tempo unknown".to_string()),
    }
    parts.push(format!(
        "{} ({} / {})",
        relation.label(),
        query.key_notation().unwrap_or("?"),
        candidate.key_notation().unwrap_or("?"),
    ));
    parts.push(format!("energy {energy_delta:+}"));

    SimilarityResult {
        track_id: candidate.id.clone(),
        score,
        vibe_match: percent(terms.embedding),
        tempo_match: percent(terms.tempo),
        key_match: percent(terms.key),
        energy_match: percent(terms.energy),
        bpm_delta,
        key_relation: relation,
        energy_delta,
        explanation: parts.join(", "),
    }
}
