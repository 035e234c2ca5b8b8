//! Greedy set sequencing.
//!
//! The sequencer walks `Filtering -> ChoosingStart -> Extending(k) -> Done`.
//! Each extension scores the current tail against every remaining track with
//! [`edge::score_edge`] and appends the best one. This is a fast heuristic
//! with explanations, not a minimum-cost path solver: O(n²) edge scores for
//! n surviving tracks.
//!
//! Ties are always broken by [`TrackId`] order (lowest content hash wins),
//! never by input order, so identical inputs give identical plans.

pub mod edge;

use std::collections::BTreeSet;

use thiserror::Error;

use crate::config::EdgeWeights;
use crate::model::{EdgeExplanation, SequenceMode, SequenceOptions, SequencePlan, TrackAnalysis, TrackId};
use edge::{EdgeScore, TrackProfile, score_edge};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SequenceError {
    #[error("No tracks to sequence (input empty or every track banned)")]
    EmptyInput,
    #[error("Must-play track {0} has no analysis in the candidate set")]
    MissingMustPlay(TrackId),
    #[error("Non-finite edge score from {from} to {to}")]
    ScoreNonFinite { from: TrackId, to: TrackId },
    #[error("Inconsistent plan: {0}")]
    InvalidPlan(String),
}

/// Where the sequencer is. `Extending(k)` means `k` tracks are placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Filtering,
    ChoosingStart,
    Extending(usize),
    Done,
}

pub struct Sequencer<'a> {
    tracks: &'a [TrackAnalysis],
    options: &'a SequenceOptions,
    weights: &'a EdgeWeights,
    phase: Phase,
    /// Unplaced tracks, kept sorted by id.
    remaining: Vec<TrackProfile<'a>>,
    order: Vec<TrackProfile<'a>>,
    explanations: Vec<EdgeExplanation>,
}

impl<'a> Sequencer<'a> {
    pub fn new(
        tracks: &'a [TrackAnalysis],
        options: &'a SequenceOptions,
        weights: &'a EdgeWeights,
    ) -> Self {
        Self {
            tracks,
            options,
            weights,
            phase: Phase::Filtering,
            remaining: Vec::new(),
            order: Vec::with_capacity(tracks.len()),
            explanations: Vec::with_capacity(tracks.len().saturating_sub(1)),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Advance one phase (or one extension). Returns the new phase.
    pub fn step(&mut self) -> Result<Phase, SequenceError> {
        self.phase = match self.phase {
            Phase::Filtering => {
                self.filter()?;
                Phase::ChoosingStart
            }
            Phase::ChoosingStart => {
                let start = self.remaining.remove(start_index(&self.remaining, self.options.mode));
                log::debug!(
                    "Start track {} ({} mode, energy {}, bpm {:?})",
                    start.track.id,
                    self.options.mode.label(),
                    start.track.energy_global,
                    start.bpm
                );
                self.order.push(start);
                self.next_phase()
            }
            Phase::Extending(_) => {
                self.extend();
                self.next_phase()
            }
            Phase::Done => Phase::Done,
        };
        Ok(self.phase)
    }

    /// Run to completion and return the plan.
    pub fn run(mut self) -> Result<SequencePlan, SequenceError> {
        while self.phase != Phase::Done {
            self.step()?;
        }

        let plan = SequencePlan {
            order: self.order.iter().map(|p| p.track.id.clone()).collect(),
            explanations: self.explanations,
        };
        validate_plan(&plan)?;
        log::info!(
            "Sequenced {} tracks in {} mode",
            plan.order.len(),
            self.options.mode.label()
        );
        Ok(plan)
    }

    fn next_phase(&self) -> Phase {
        if self.remaining.is_empty() {
            Phase::Done
        } else {
            Phase::Extending(self.order.len())
        }
    }

    /// Drop banned and duplicate ids, then check every must-play id survived.
    fn filter(&mut self) -> Result<(), SequenceError> {
        let mut seen: BTreeSet<&TrackId> = BTreeSet::new();
        let mut survivors: Vec<TrackProfile<'a>> = Vec::with_capacity(self.tracks.len());

        for track in self.tracks {
            if self.options.ban.contains(&track.id) {
                log::debug!("Skipping banned track {}", track.id);
                continue;
            }
            if !seen.insert(&track.id) {
                log::warn!("Duplicate analysis for track {}, keeping the first", track.id);
                continue;
            }
            survivors.push(TrackProfile::new(track));
        }

        if survivors.is_empty() {
            return Err(SequenceError::EmptyInput);
        }
        // Must-play only guarantees presence; every survivor gets placed anyway.
        if let Some(missing) = self.options.must_play.iter().find(|id| !seen.contains(id)) {
            return Err(SequenceError::MissingMustPlay(missing.clone()));
        }

        survivors.sort_by(|a, b| a.track.id.cmp(&b.track.id));
        log::debug!(
            "{} of {} tracks survive filtering",
            survivors.len(),
            self.tracks.len()
        );
        self.remaining = survivors;
        Ok(())
    }

    /// Append the best-scoring remaining track, or the whole remainder if
    /// nothing scores.
    fn extend(&mut self) {
        let Some(tail) = self.order.last().copied() else {
            return;
        };

        match best_next(&tail, &self.remaining, self.options, self.weights) {
            Some((index, scored)) => {
                let next = self.remaining.remove(index);
                log::debug!("{} -> {} ({:.2})", tail.track.id, next.track.id, scored.total);
                self.explanations.push(scored.explanation);
                self.order.push(next);
            }
            None => self.append_residual(tail),
        }
    }

    /// Completeness outranks optimality: place the rest in id order.
    fn append_residual(&mut self, mut tail: TrackProfile<'a>) {
        log::error!(
            "No finite edge score from {}; appending {} remaining tracks in id order",
            tail.track.id,
            self.remaining.len()
        );
        for next in std::mem::take(&mut self.remaining) {
            let mut explanation = score_edge(&tail, &next, self.options, self.weights).explanation;
            explanation.score = 0.0;
            explanation.reason = format!("appended without a scorable transition: {}", explanation.reason);
            self.explanations.push(explanation);
            self.order.push(next);
            tail = next;
        }
    }
}

/// Index of the start track: most extreme on the mode's axis, lowest id on ties.
/// Open-format tracks with unknown tempo sort after every known tempo.
fn start_index(remaining: &[TrackProfile<'_>], mode: SequenceMode) -> usize {
    let axis = |p: &TrackProfile<'_>| -> f64 {
        match mode {
            SequenceMode::WarmUp => f64::from(p.track.energy_global),
            SequenceMode::PeakTime => -f64::from(p.track.energy_global),
            SequenceMode::OpenFormat => p.bpm.unwrap_or(f64::INFINITY),
        }
    };
    // min_by keeps the first of equal elements, and `remaining` is id-sorted
    remaining
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| axis(a).total_cmp(&axis(b)))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Best finite-scoring successor of `tail`. Strictly-greater comparison over
/// the id-sorted list keeps the lowest id on ties.
fn best_next(
    tail: &TrackProfile<'_>,
    remaining: &[TrackProfile<'_>],
    options: &SequenceOptions,
    weights: &EdgeWeights,
) -> Option<(usize, EdgeScore)> {
    let mut best: Option<(usize, EdgeScore)> = None;
    for (index, candidate) in remaining.iter().enumerate() {
        let scored = score_edge(tail, candidate, options, weights);
        if !scored.total.is_finite() {
            log::error!(
                "Non-finite edge score {} -> {}: {}",
                tail.track.id,
                candidate.track.id,
                scored.total
            );
            continue;
        }
        let better = match &best {
            Some((_, current)) => scored.total > current.total,
            None => true,
        };
        if better {
            best = Some((index, scored));
        }
    }
    best
}

/// Check the output guarantees: no duplicates, one explanation per
/// consecutive pair linking `order[i]` to `order[i + 1]`, finite scores.
pub fn validate_plan(plan: &SequencePlan) -> Result<(), SequenceError> {
    let unique: BTreeSet<&TrackId> = plan.order.iter().collect();
    if unique.len() != plan.order.len() {
        return Err(SequenceError::InvalidPlan("duplicate track in order".to_string()));
    }
    if plan.explanations.len() != plan.order.len().saturating_sub(1) {
        return Err(SequenceError::InvalidPlan(format!(
            "{} explanations for {} tracks",
            plan.explanations.len(),
            plan.order.len()
        )));
    }
    for (i, edge) in plan.explanations.iter().enumerate() {
        if edge.from != plan.order[i] || edge.to != plan.order[i + 1] {
            return Err(SequenceError::InvalidPlan(format!(
                "explanation {i} links {} -> {}, expected {} -> {}",
                edge.from,
                edge.to,
                plan.order[i],
                plan.order[i + 1]
            )));
        }
        if !edge.score.is_finite() {
            return Err(SequenceError::ScoreNonFinite {
                from: edge.from.clone(),
                to: edge.to.clone(),
            });
        }
    }
    Ok(())
}

/// Order `tracks` into a playable sequence.
pub fn build_sequence(
    tracks: &[TrackAnalysis],
    options: &SequenceOptions,
    weights: &EdgeWeights,
) -> Result<SequencePlan, SequenceError> {
    Sequencer::new(tracks, options, weights).run()
}
