use crate::model::Beatgrid;

/// Representative BPM for a track.
///
/// Prefers the first tempo-map segment; otherwise derives the tempo from the
/// gap between the first two beats. Returns `None` when neither gives a
/// positive, finite tempo.
pub fn representative_bpm(grid: &Beatgrid) -> Option<f64> {
    if let Some(segment) = grid.tempo_map.first() {
        if segment.bpm.is_finite() && segment.bpm > 0.0 {
            return Some(segment.bpm);
        }
        log::debug!("Ignoring tempo-map segment with bpm {}", segment.bpm);
    }

    match grid.beats.as_slice() {
        [first, second, ..] => {
            let delta = second - first;
            let bpm = 60.0 / delta;
            (delta > 0.0 && bpm.is_finite() && bpm > 0.0).then_some(bpm)
        }
        _ => None,
    }
}

/// Octave-aware BPM distance: the smaller of the direct gap and the
/// half/double-time gaps, so 140 and 70 count as a match.
pub fn tempo_distance(a: f64, b: f64) -> f64 {
    let direct = (a - b).abs();
    let double_b = (a - 2.0 * b).abs();
    let double_a = (2.0 * a - b).abs();
    direct.min(double_b).min(double_a)
}

/// Distance between two optional tempos; `None` if either is unknown.
pub fn track_tempo_distance(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    Some(tempo_distance(a?, b?))
}

/// Direct signed delta `to - from`, used for display.
pub fn signed_bpm_delta(from: Option<f64>, to: Option<f64>) -> Option<f64> {
    Some(to? - from?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TempoSegment;

    fn grid(map: &[f64], beats: &[f64]) -> Beatgrid {
        Beatgrid {
            tempo_map: map
                .iter()
                .enumerate()
                .map(|(i, &bpm)| TempoSegment { beat_index: i as u32 * 64, bpm })
                .collect(),
            beats: beats.to_vec(),
        }
    }

    #[test]
    fn test_prefers_tempo_map() {
        let g = grid(&[126.0, 128.0], &[0.0, 0.5]);
        assert_eq!(representative_bpm(&g), Some(126.0));
    }

    #[test]
    fn test_falls_back_to_beats() {
        let g = grid(&[], &[1.0, 1.5, 2.0]);
        let bpm = representative_bpm(&g).unwrap();
        assert!((bpm - 120.0).abs() < 1e-9);

        // Bad tempo-map entry falls through to the beats
        let g = grid(&[0.0], &[0.0, 0.4]);
        assert!((representative_bpm(&g).unwrap() - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_tempo() {
        assert_eq!(representative_bpm(&grid(&[], &[])), None);
        assert_eq!(representative_bpm(&grid(&[], &[3.0])), None);
        assert_eq!(representative_bpm(&grid(&[], &[2.0, 2.0])), None);
        assert_eq!(representative_bpm(&grid(&[f64::NAN], &[2.0, 1.0])), None);
        // An infinite gap would give 0 BPM, which is not a tempo
        assert_eq!(representative_bpm(&grid(&[], &[0.0, f64::INFINITY])), None);
    }

    #[test]
    fn test_octave_aware_distance() {
        assert!(tempo_distance(140.0, 70.0).abs() < 1e-9);
        assert!(tempo_distance(70.0, 140.0).abs() < 1e-9);
        assert!((tempo_distance(124.0, 128.0) - 4.0).abs() < 1e-9);
        // 87 vs 174: double-time match
        assert!((tempo_distance(87.0, 172.0) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_optional_helpers() {
        assert_eq!(track_tempo_distance(None, Some(120.0)), None);
        assert_eq!(signed_bpm_delta(Some(128.0), Some(124.0)), Some(-4.0));
        assert_eq!(signed_bpm_delta(Some(128.0), None), None);
    }
}
