use crate::compat::energy::{directional_bonus, energy_distance, signed_energy_delta};
use crate::compat::key::{KeyRelation, classify_keys};
use crate::compat::tempo::{representative_bpm, signed_bpm_delta, track_tempo_distance};
use crate::config::EdgeWeights;
use crate::model::{EdgeExplanation, SequenceOptions, TrackAnalysis};

/// A track plus the values the edge scorer derives from it once.
#[derive(Debug, Clone, Copy)]
pub struct TrackProfile<'a> {
    pub track: &'a TrackAnalysis,
    pub bpm: Option<f64>,
}

impl<'a> TrackProfile<'a> {
    pub fn new(track: &'a TrackAnalysis) -> Self {
        Self {
            track,
            bpm: representative_bpm(&track.tempo),
        }
    }
}

/// Directed score for playing `to` right after `from`, split into its terms.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeScore {
    pub tempo: f64,
    pub key: f64,
    pub energy: f64,
    pub window: f64,
    pub total: f64,
    pub explanation: EdgeExplanation,
}

/// Key term for a relation. Allowing jumps scales negative terms toward zero
/// without ever turning them into a reward.
pub fn key_term(relation: KeyRelation, allow_key_jumps: bool, weights: &EdgeWeights) -> f64 {
    let k = &weights.key;
    let base = match relation {
        KeyRelation::Same => k.same,
        KeyRelation::Relative => k.relative,
        KeyRelation::Adjacent => k.adjacent,
        KeyRelation::CrossModeAdjacent => k.cross_mode_adjacent,
        KeyRelation::EnergyBoost => k.energy_boost,
        KeyRelation::Clash => k.clash,
        KeyRelation::Unparseable => k.unparseable,
        KeyRelation::Missing => k.missing,
    };
    if allow_key_jumps && base < 0.0 {
        base * weights.key_jump_softening
    } else {
        base
    }
}

/// Score the directed edge `from -> to`.
///
/// Total = tempo + key + energy + window. The window term only checks that
/// both tracks carry at least one transition window; the tags themselves are
/// reported but never compared.
pub fn score_edge(
    from: &TrackProfile<'_>,
    to: &TrackProfile<'_>,
    options: &SequenceOptions,
    weights: &EdgeWeights,
) -> EdgeScore {
    let mut reasons: Vec<String> = Vec::with_capacity(4);

    // Key
    let relation = classify_keys(from.track.key_notation(), to.track.key_notation());
    let key = key_term(relation, options.allow_key_jumps, weights);
    reasons.push(format!(
        "{} ({} -> {})",
        relation.label(),
        from.track.key_notation().unwrap_or("?"),
        to.track.key_notation().unwrap_or("?"),
    ));

    // Tempo
    let tempo_delta = signed_bpm_delta(from.bpm, to.bpm);
    let tempo = match (track_tempo_distance(from.bpm, to.bpm), tempo_delta) {
        (Some(distance), Some(delta)) => {
            let mut term = weights.tempo_base - distance * weights.tempo_slope;
            let mut reason = format!("tempo {delta:+.1} BPM");
            if distance + 1e-9 < delta.abs() {
                reason.push_str(" (half/double-time)");
            }
            if options.max_bpm_step > 0.0 && distance > options.max_bpm_step {
                term -= weights.bpm_step_penalty;
                reason.push_str(&format!(" exceeds max step {:.1}", options.max_bpm_step));
            }
            reasons.push(reason);
            term
        }
        _ => {
            reasons.push("tempo unknown".to_string());
            weights.unknown_tempo
        }
    };

    // Energy
    let (from_energy, to_energy) = (from.track.energy_global, to.track.energy_global);
    let energy_delta = signed_energy_delta(from_energy, to_energy);
    let energy = weights.energy_base
        - f64::from(energy_distance(from_energy, to_energy)) * weights.energy_slope
        + directional_bonus(options.mode, from_energy, to_energy, weights);
    reasons.push(format!("energy {energy_delta:+}"));

    // Transition windows
    let window_overlap_tag = match (from.track.first_window_tag(), to.track.first_window_tag()) {
        (Some(out_tag), Some(in_tag)) => Some(format!("{out_tag}->{in_tag}")),
        _ => None,
    };
    let window = if window_overlap_tag.is_some() {
        weights.window_bonus
    } else {
        0.0
    };
    if let Some(tag) = &window_overlap_tag {
        reasons.push(format!("windows {tag}"));
    }

    let total = tempo + key + energy + window;

    EdgeScore {
        tempo,
        key,
        energy,
        window,
        total,
        explanation: EdgeExplanation {
            from: from.track.id.clone(),
            to: to.track.id.clone(),
            score: total,
            tempo_delta,
            energy_delta,
            key_relation: relation,
            window_overlap_tag,
            reason: reasons.join(", "),
        },
    }
}
