pub mod scorer;

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::config::SimilarityWeights;
use crate::model::{SimilarityResult, TrackAnalysis, TrackId};
pub use scorer::score_pair;

#[derive(Error, Debug)]
pub enum SimilarityError {
    #[error("Failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Ranked neighbors of one track.
#[derive(Debug, Clone, Serialize)]
pub struct Neighbors {
    pub track_id: TrackId,
    pub results: Vec<SimilarityResult>,
}

/// Rank `candidates` by similarity to `query`, best first, at most `limit` results.
///
/// The query itself is skipped. Ties keep candidate input order. Returns an
/// empty list when the query has no embedding or there are no candidates;
/// callers decide whether that is an error.
pub fn rank_similar(
    query: &TrackAnalysis,
    candidates: &[TrackAnalysis],
    limit: usize,
    weights: &SimilarityWeights,
) -> Vec<SimilarityResult> {
    if query.embedding.as_deref().is_none_or(|e| e.is_empty()) {
        log::debug!("Track {} has no embedding, nothing to rank", query.id);
        return Vec::new();
    }

    let mut results: Vec<SimilarityResult> = candidates
        .iter()
        .filter(|c| c.id != query.id)
        .map(|c| score_pair(query, c, weights))
        .collect();

    // sort_by is stable: equal scores stay in input order
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results.truncate(limit);
    results
}

/// Rank every track against the rest of the set on a rayon pool.
/// Output order follows `tracks`; `on_progress` fires once per finished track.
pub fn neighbor_table<F>(
    tracks: &[TrackAnalysis],
    limit: usize,
    weights: &SimilarityWeights,
    jobs: usize,
    on_progress: F,
) -> Result<Vec<Neighbors>, SimilarityError>
where
    F: Fn() + Sync,
{
    log::info!("Ranking neighbors for {} tracks with {} workers", tracks.len(), jobs);

    let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;

    let table = pool.install(|| {
        tracks
            .par_iter()
            .map(|query| {
                let results = rank_similar(query, tracks, limit, weights);
                on_progress();
                Neighbors {
                    track_id: query.id.clone(),
                    results,
                }
            })
            .collect()
    });

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EMBEDDING_DIM;
    use crate::model::{Beatgrid, KeyEstimate, TempoSegment};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn seeded(seed: f32) -> Vec<f32> {
        (0..EMBEDDING_DIM).map(|i| seed + i as f32 * 0.001).collect()
    }

    fn track(id: &str, bpm: f64, energy: u8, key: &str, embedding: Option<Vec<f32>>) -> TrackAnalysis {
        TrackAnalysis {
            id: TrackId::new(id),
            path: format!("/music/{id}.aiff").into(),
            tempo: Beatgrid {
                tempo_map: vec![TempoSegment { beat_index: 0, bpm }],
                beats: vec![],
            },
            key: Some(KeyEstimate { notation: key.to_string(), confidence: 0.7 }),
            energy_global: energy,
            sections: vec![],
            transition_windows: vec![],
            embedding,
        }
    }

    #[test]
    fn test_same_seed_ranks_above_far_seed() {
        let query = track("query", 126.0, 6, "8A", Some(seeded(0.5)));
        let candidates = vec![
            track("far", 126.0, 6, "8A", Some(seeded(100.0))),
            track("near", 126.0, 6, "8A", Some(seeded(0.5))),
        ];
        let results = rank_similar(&query, &candidates, 10, &SimilarityWeights::default());
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].track_id, TrackId::new("near"));
        assert!(results[0].score > results[1].score);
        assert!(!results[0].explanation.is_empty());
    }

    #[test]
    fn test_excludes_query_and_truncates() {
        let query = track("q", 124.0, 5, "8A", Some(seeded(0.1)));
        let mut candidates = vec![query.clone()];
        for i in 0..6 {
            candidates.push(track(&format!("c{i}"), 124.0 + i as f64, 5, "8A", Some(seeded(0.1))));
        }
        let results = rank_similar(&query, &candidates, 3, &SimilarityWeights::default());
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.track_id != query.id));
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(results[0].track_id, TrackId::new("c0"));
    }

    #[test]
    fn test_ties_keep_input_order() {
        let query = track("q", 124.0, 5, "8A", Some(seeded(0.2)));
        let candidates = vec![
            track("zeta", 124.0, 5, "8A", Some(seeded(0.2))),
            track("alpha", 124.0, 5, "8A", Some(seeded(0.2))),
            track("mid", 124.0, 5, "8A", Some(seeded(0.2))),
        ];
        let results = rank_similar(&query, &candidates, 10, &SimilarityWeights::default());
        let ids: Vec<&str> = results.iter().map(|r| r.track_id.as_str()).collect();
        assert_eq!(ids, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_empty_cases() {
        let weights = SimilarityWeights::default();
        let query = track("q", 124.0, 5, "8A", Some(seeded(0.2)));
        assert!(rank_similar(&query, &[], 10, &weights).is_empty());
        assert!(rank_similar(&query, &[query.clone()], 10, &weights).is_empty());

        let no_embedding = track("n", 124.0, 5, "8A", None);
        let candidates = vec![track("c", 124.0, 5, "8A", Some(seeded(0.2)))];
        assert!(rank_similar(&no_embedding, &candidates, 10, &weights).is_empty());
        let empty_embedding = track("e", 124.0, 5, "8A", Some(vec![]));
        assert!(rank_similar(&empty_embedding, &candidates, 10, &weights).is_empty());
    }

    #[test]
    fn test_candidate_without_embedding_still_ranked() {
        let query = track("q", 124.0, 5, "8A", Some(seeded(0.2)));
        let candidates = vec![
            track("bare", 124.0, 5, "8A", None),
            track("full", 124.0, 5, "8A", Some(seeded(0.2))),
        ];
        let results = rank_similar(&query, &candidates, 10, &SimilarityWeights::default());
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].track_id, TrackId::new("bare"));
        assert_eq!(results[1].vibe_match, 0);
        assert!((0.0..=1.0).contains(&results[1].score));
    }

    #[test]
    fn test_deterministic() {
        let query = track("q", 124.0, 5, "8A", Some(seeded(0.3)));
        let candidates: Vec<_> = (0..8)
            .map(|i| track(&format!("c{i}"), 120.0 + i as f64, (i % 10 + 1) as u8, &format!("{}A", i + 1), Some(seeded(i as f32))))
            .collect();
        let weights = SimilarityWeights::default();
        let a = serde_json::to_string(&rank_similar(&query, &candidates, 5, &weights)).unwrap();
        let b = serde_json::to_string(&rank_similar(&query, &candidates, 5, &weights)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_neighbor_table_matches_serial() {
        let tracks: Vec<_> = (0..6)
            .map(|i| track(&format!("t{i}"), 118.0 + 2.0 * i as f64, (i + 3) as u8, &format!("{}B", i + 4), Some(seeded(i as f32 * 0.5))))
            .collect();
        let weights = SimilarityWeights::default();
        let counter = AtomicUsize::new(0);
        let table = neighbor_table(&tracks, 3, &weights, 2, || {
            counter.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();

        assert_eq!(counter.load(Ordering::Relaxed), tracks.len());
        assert_eq!(table.len(), tracks.len());
        for (row, query) in table.iter().zip(&tracks) {
            assert_eq!(row.track_id, query.id);
            assert_eq!(row.results, rank_similar(query, &tracks, 3, &weights));
        }
    }
}
