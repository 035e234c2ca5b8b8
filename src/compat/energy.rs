use crate::config::EdgeWeights;
use crate::model::SequenceMode;

/// Absolute distance on the 1-10 energy scale.
pub fn energy_distance(a: u8, b: u8) -> u8 {
    a.abs_diff(b)
}

/// `to - from`, positive when energy rises.
pub fn signed_energy_delta(from: u8, to: u8) -> i32 {
    i32::from(to) - i32::from(from)
}

/// Mode-directional bonus for a sequencing step.
///
/// Warm-up rewards non-decreasing energy, peak-time rewards energy that does
/// not drop, open-format has no preferred direction.
pub fn directional_bonus(mode: SequenceMode, from: u8, to: u8, weights: &EdgeWeights) -> f64 {
    let rising_or_flat = to >= from;
    match mode {
        SequenceMode::WarmUp if rising_or_flat => weights.warm_up_bonus,
        SequenceMode::PeakTime if rising_or_flat => weights.peak_time_bonus,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_and_delta() {
        assert_eq!(energy_distance(3, 8), 5);
        assert_eq!(energy_distance(8, 3), 5);
        assert_eq!(signed_energy_delta(8, 3), -5);
        assert_eq!(signed_energy_delta(3, 3), 0);
    }

    #[test]
    fn test_directional_bonus() {
        let w = EdgeWeights::default();
        assert_eq!(directional_bonus(SequenceMode::WarmUp, 5, 6, &w), w.warm_up_bonus);
        assert_eq!(directional_bonus(SequenceMode::WarmUp, 5, 5, &w), w.warm_up_bonus);
        assert_eq!(directional_bonus(SequenceMode::WarmUp, 6, 5, &w), 0.0);
        assert_eq!(directional_bonus(SequenceMode::PeakTime, 9, 9, &w), w.peak_time_bonus);
        assert_eq!(directional_bonus(SequenceMode::PeakTime, 9, 7, &w), 0.0);
        assert_eq!(directional_bonus(SequenceMode::OpenFormat, 2, 9, &w), 0.0);
    }
}
