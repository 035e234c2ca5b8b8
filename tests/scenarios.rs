use std::collections::BTreeSet;

use segue::compat::key::{KeyRelation, classify_keys};
use segue::config::ScoringConfig;
use segue::embedding::{EMBEDDING_DIM, decode_embedding, encode_embedding};
use segue::model::{
    Beatgrid, KeyEstimate, SequenceMode, SequenceOptions, TempoSegment, TrackAnalysis, TrackId,
    TransitionWindow,
};
use segue::sequencer::edge::{TrackProfile, score_edge};
use segue::sequencer::{SequenceError, build_sequence};
use segue::similarity::rank_similar;
use segue::similarity::scorer::{key_term, score_pair};

fn seeded(seed: f32) -> Vec<f32> {
    (0..EMBEDDING_DIM).map(|i| seed + i as f32 * 0.001).collect()
}

fn track(id: &str, bpm: f64, energy: u8, key: &str, seed: Option<f32>) -> TrackAnalysis {
    TrackAnalysis {
        id: TrackId::new(id),
        path: format!("/sets/friday/{id}.flac").into(),
        tempo: Beatgrid {
            tempo_map: vec![TempoSegment { beat_index: 0, bpm }],
            beats: vec![],
        },
        key: Some(KeyEstimate {
            notation: key.to_string(),
            confidence: 0.85,
        }),
        energy_global: energy,
        sections: vec![],
        transition_windows: vec![TransitionWindow {
            start_beat: 0,
            end_beat: 32,
            tag: "intro".to_string(),
        }],
        embedding: seed.map(seeded),
    }
}

/// A mixed crate: varied tempos (including a half-time track), keys and energies.
fn crate_of(n: usize) -> Vec<TrackAnalysis> {
    (0..n)
        .map(|i| {
            let bpm = if i % 7 == 3 { 64.0 } else { 118.0 + (i * 5 % 17) as f64 };
            let key = format!("{}{}", i * 5 % 12 + 1, if i % 3 == 0 { 'B' } else { 'A' });
            track(
                &format!("{:08x}", i * 2_654_435_761 % 4_294_967_291),
                bpm,
                (i * 3 % 10 + 1) as u8,
                &key,
                Some(i as f32 * 0.37),
            )
        })
        .collect()
}

#[test]
fn warm_up_three_track_scenario() {
    let tracks = vec![
        track("c", 128.0, 7, "9A", None),
        track("a", 124.0, 5, "7A", None),
        track("b", 126.0, 6, "8A", None),
    ];
    let config = ScoringConfig::default();
    let options = SequenceOptions {
        mode: SequenceMode::WarmUp,
        ..Default::default()
    };
    let plan = build_sequence(&tracks, &options, &config.edge).unwrap();

    assert_eq!(plan.order[0], TrackId::new("a"));
    assert_eq!(plan.explanations.len(), 2);
    for edge in &plan.explanations {
        assert!(edge.score > 0.0, "{edge:?}");
        assert!(!edge.reason.is_empty());
    }
}

#[test]
fn five_tracks_one_banned() {
    let tracks = crate_of(5);
    let banned = tracks[2].id.clone();
    let options = SequenceOptions {
        ban: [banned.clone()].into(),
        ..Default::default()
    };
    let plan = build_sequence(&tracks, &options, &ScoringConfig::default().edge).unwrap();
    assert_eq!(plan.order.len(), 4);
    assert!(!plan.order.contains(&banned));
}

#[test]
fn completeness_for_every_size_and_mode() {
    let edge = ScoringConfig::default().edge;
    for n in 1..=24 {
        let tracks = crate_of(n);
        for mode in [SequenceMode::WarmUp, SequenceMode::PeakTime, SequenceMode::OpenFormat] {
            for allow_key_jumps in [false, true] {
                let options = SequenceOptions {
                    mode,
                    allow_key_jumps,
                    max_bpm_step: 4.0,
                    ..Default::default()
                };
                let plan = build_sequence(&tracks, &options, &edge).unwrap();
                assert_eq!(plan.order.len(), n);
                let unique: BTreeSet<_> = plan.order.iter().collect();
                assert_eq!(unique.len(), n);
                assert_eq!(plan.explanations.len(), n - 1);
                assert!(plan.explanations.iter().all(|e| e.score.is_finite()));
            }
        }
    }
}

#[test]
fn outputs_are_byte_identical_across_calls() {
    let tracks = crate_of(16);
    let config = ScoringConfig::default();
    let options = SequenceOptions {
        mode: SequenceMode::PeakTime,
        ..Default::default()
    };

    let first = serde_json::to_string(&build_sequence(&tracks, &options, &config.edge).unwrap()).unwrap();
    let second = serde_json::to_string(&build_sequence(&tracks, &options, &config.edge).unwrap()).unwrap();
    assert_eq!(first, second);

    let ranked = |q: &TrackAnalysis| serde_json::to_string(&rank_similar(q, &tracks, 10, &config.similarity)).unwrap();
    assert_eq!(ranked(&tracks[4]), ranked(&tracks[4]));
}

#[test]
fn must_play_missing_fails() {
    let tracks = crate_of(6);
    let options = SequenceOptions {
        must_play: [TrackId::new("not-analyzed")].into(),
        ..Default::default()
    };
    assert_eq!(
        build_sequence(&tracks, &options, &ScoringConfig::default().edge),
        Err(SequenceError::MissingMustPlay(TrackId::new("not-analyzed")))
    );
}

#[test]
fn same_seed_beats_far_seed() {
    let query = track("query", 126.0, 6, "8A", Some(3.0));
    let candidates = vec![
        track("far", 126.0, 6, "8A", Some(100.0)),
        track("near", 126.0, 6, "8A", Some(3.0)),
        query.clone(),
    ];
    let results = rank_similar(&query, &candidates, 10, &ScoringConfig::default().similarity);
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].track_id, TrackId::new("near"));
    assert!(!results[0].explanation.is_empty());
}

#[test]
fn similarity_scores_bounded_and_symmetric() {
    let tracks = crate_of(12);
    let weights = ScoringConfig::default().similarity;
    for a in &tracks {
        for b in &tracks {
            let ab = score_pair(a, b, &weights);
            let ba = score_pair(b, a, &weights);
            assert!((0.0..=1.0).contains(&ab.score));
            assert!((ab.score - ba.score).abs() < 1e-12);
        }
    }
}

#[test]
fn key_symmetry_over_whole_wheel() {
    let tiers = ScoringConfig::default().similarity.key_tiers;
    let keys: Vec<String> = (1..=12).flat_map(|n| [format!("{n}A"), format!("{n}B")]).collect();
    for a in &keys {
        for b in &keys {
            let ab = key_term(classify_keys(Some(a), Some(b)), &tiers);
            let ba = key_term(classify_keys(Some(b), Some(a)), &tiers);
            assert_eq!(ab, ba, "{a}/{b}");
        }
    }
    // Wrap-around counts as adjacent in both scorers
    assert_eq!(classify_keys(Some("1A"), Some("12A")), KeyRelation::Adjacent);
}

#[test]
fn clash_pair_scores_low_in_both_scorers() {
    let config = ScoringConfig::default();
    let a = track("a", 126.0, 6, "8A", Some(1.0));
    let b = track("b", 126.0, 6, "11B", Some(1.0));

    let strict = score_edge(
        &TrackProfile::new(&a),
        &TrackProfile::new(&b),
        &SequenceOptions::default(),
        &config.edge,
    );
    assert!(strict.key < 0.0);

    let jumps = score_edge(
        &TrackProfile::new(&a),
        &TrackProfile::new(&b),
        &SequenceOptions {
            allow_key_jumps: true,
            ..Default::default()
        },
        &config.edge,
    );
    assert!(jumps.total > strict.total);

    let similarity = score_pair(&a, &b, &config.similarity);
    assert_eq!(similarity.key_relation, KeyRelation::Clash);
    assert!(f64::from(similarity.key_match) / 100.0 < 0.3);
}

#[test]
fn embedding_round_trip_through_bytes() {
    let mut vector = seeded(-0.25);
    vector[10] = 0.0;
    vector[11] = -0.0;
    vector[12] = -123.456;
    let bytes = encode_embedding(&vector);
    assert_eq!(bytes.len(), 4 * EMBEDDING_DIM);
    let decoded = decode_embedding(&bytes, EMBEDDING_DIM).unwrap();
    assert!(vector.iter().zip(&decoded).all(|(a, b)| a.to_bits() == b.to_bits()));
}
