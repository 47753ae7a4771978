//! Maps a mastery estimate onto a target difficulty and scales generator
//! parameter ranges with it.

use mathlern_core::{clamp_unit, BaseRanges, ParamRange};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AdaptiveError;

/// Offset applied in the learning zone (and when no zone is requested).
const LEARNING_OFFSET: f64 = 0.05;
const COMFORT_OFFSET: f64 = -0.10;
const STRUGGLE_OFFSET: f64 = 0.15;

/// `difficulty - mastery` below this is classified as comfort.
const COMFORT_BOUNDARY: f64 = -0.15;
/// `difficulty - mastery` above this is classified as struggle.
const STRUGGLE_BOUNDARY: f64 = 0.25;

/// Challenge band relative to current mastery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyZone {
    Comfort,
    Learning,
    Struggle,
}

impl DifficultyZone {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DifficultyZone::Comfort => "comfort",
            DifficultyZone::Learning => "learning",
            DifficultyZone::Struggle => "struggle",
        }
    }

    /// Zone implied by the gap between difficulty and mastery.
    #[must_use]
    pub fn classify(difficulty: f64, mastery: f64) -> Self {
        let gap = difficulty - mastery;
        if gap < COMFORT_BOUNDARY {
            DifficultyZone::Comfort
        } else if gap > STRUGGLE_BOUNDARY {
            DifficultyZone::Struggle
        } else {
            DifficultyZone::Learning
        }
    }
}

impl fmt::Display for DifficultyZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DifficultyZone {
    type Err = AdaptiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "comfort" => Ok(DifficultyZone::Comfort),
            "learning" => Ok(DifficultyZone::Learning),
            "struggle" => Ok(DifficultyZone::Struggle),
            _ => Err(AdaptiveError::UnknownZone(s.to_string())),
        }
    }
}

/// Result of [`DifficultyMapper::map`]. Built per request, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultyMapping {
    pub difficulty: f64,
    /// Zone recomputed from the clamped difficulty. May differ from the
    /// requested zone near 0 and 1.
    pub zone: DifficultyZone,
    pub adjustment_reason: String,
}

/// Stateless mastery → difficulty mapping. Construct one and pass it to
/// whoever needs it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DifficultyMapper;

impl DifficultyMapper {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Target difficulty for `mastery` in the requested zone (learning when
    /// `None`). Inputs outside `[0, 1]` are clamped.
    #[must_use]
    pub fn map(&self, mastery: f64, target_zone: Option<DifficultyZone>) -> DifficultyMapping {
        let mastery = clamp_unit(mastery);
        let requested = target_zone.unwrap_or(DifficultyZone::Learning);
        let offset = match requested {
            DifficultyZone::Learning => LEARNING_OFFSET,
            DifficultyZone::Comfort => COMFORT_OFFSET,
            DifficultyZone::Struggle => STRUGGLE_OFFSET,
        };
        let difficulty = clamp_unit(mastery + offset);
        let zone = DifficultyZone::classify(difficulty, mastery);

        let adjustment_reason = match target_zone {
            None => format!("mastery {mastery:.2} → default learning zone"),
            Some(z) if z == zone => format!("mastery {mastery:.2} → {z} zone"),
            Some(z) => format!("mastery {mastery:.2} → {z} zone requested, {zone} after clamping"),
        };

        DifficultyMapping {
            difficulty,
            zone,
            adjustment_reason,
        }
    }

    /// Nudges a difficulty by the learner's current streaks. Correct
    /// streaks are checked first.
    #[must_use]
    pub fn adjust_for_streak(
        &self,
        base_difficulty: f64,
        correct_streak: u32,
        incorrect_streak: u32,
    ) -> f64 {
        let delta = if correct_streak >= 5 {
            (f64::from(correct_streak) * 0.02).min(0.15)
        } else if correct_streak >= 3 {
            0.05
        } else if incorrect_streak >= 3 {
            -(f64::from(incorrect_streak) * 0.03).min(0.15)
        } else if incorrect_streak >= 2 {
            -0.05
        } else {
            0.0
        };
        clamp_unit(base_difficulty + delta)
    }

    /// Scales every base range towards its upper end as difficulty grows.
    ///
    /// Each result satisfies `min >= base.min` and `max >= min + 1`, so it is
    /// never empty, even for degenerate bases. Spans are computed in `i128`;
    /// only a base starting at `i64::MAX` saturates to a single value.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn get_parameter_ranges(&self, difficulty: f64, base_ranges: &BaseRanges) -> BaseRanges {
        let difficulty = clamp_unit(difficulty);
        let scale = 0.2 + 0.8 * difficulty;
        base_ranges
            .iter()
            .map(|(name, base)| {
                let lo = i128::from(base.min);
                let span = (i128::from(base.max) - lo) as f64;
                let new_max = lo + (span * scale).floor() as i128;
                let new_min = lo + (((new_max - lo) as f64) * difficulty * 0.3).floor() as i128;
                let new_min = new_min.max(lo);
                let new_max = new_max.max(new_min + 1);
                (name.clone(), ParamRange::new(saturate(new_min), saturate(new_max)))
            })
            .collect()
    }
}

fn saturate(value: i128) -> i64 {
    i64::try_from(value).unwrap_or(if value < 0 { i64::MIN } else { i64::MAX })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn zones() -> impl Strategy<Value = Option<DifficultyZone>> {
        prop_oneof![
            Just(None),
            Just(Some(DifficultyZone::Comfort)),
            Just(Some(DifficultyZone::Learning)),
            Just(Some(DifficultyZone::Struggle)),
        ]
    }

    #[test]
    fn map_offsets_per_zone() {
        let mapper = DifficultyMapper::new();
        let learning = mapper.map(0.5, None);
        assert!((learning.difficulty - 0.55).abs() < 1e-9);
        assert_eq!(learning.zone, DifficultyZone::Learning);

        let comfort = mapper.map(0.5, Some(DifficultyZone::Comfort));
        assert!((comfort.difficulty - 0.4).abs() < 1e-9);
        // -0.10 is not below -0.15, so the gap still reads as learning.
        assert_eq!(comfort.zone, DifficultyZone::Learning);

        let struggle = mapper.map(0.5, Some(DifficultyZone::Struggle));
        assert!((struggle.difficulty - 0.65).abs() < 1e-9);
        assert_eq!(struggle.zone, DifficultyZone::Learning);
    }

    #[test]
    fn clamped_zone_is_reported_not_corrected() {
        let mapper = DifficultyMapper::new();
        let m = mapper.map(1.0, Some(DifficultyZone::Struggle));
        assert!((m.difficulty - 1.0).abs() < f64::EPSILON);
        assert_eq!(m.zone, DifficultyZone::Learning);
        assert!(m.adjustment_reason.contains("after clamping"));
    }

    #[test]
    fn streak_tiers() {
        let mapper = DifficultyMapper::new();
        assert!((mapper.adjust_for_streak(0.5, 0, 0) - 0.5).abs() < 1e-9);
        assert!((mapper.adjust_for_streak(0.5, 3, 0) - 0.55).abs() < 1e-9);
        assert!((mapper.adjust_for_streak(0.5, 6, 0) - 0.62).abs() < 1e-9);
        assert!((mapper.adjust_for_streak(0.5, 20, 0) - 0.65).abs() < 1e-9);
        assert!((mapper.adjust_for_streak(0.5, 0, 2) - 0.45).abs() < 1e-9);
        assert!((mapper.adjust_for_streak(0.5, 0, 4) - 0.38).abs() < 1e-9);
        assert!((mapper.adjust_for_streak(0.5, 0, 9) - 0.35).abs() < 1e-9);
        // correct streak wins
        assert!((mapper.adjust_for_streak(0.5, 3, 4) - 0.55).abs() < 1e-9);
        assert!((mapper.adjust_for_streak(0.98, 10, 0) - 1.0).abs() < 1e-9);
        assert!(mapper.adjust_for_streak(0.02, 0, 5).abs() < 1e-9);
    }

    #[test]
    fn parameter_ranges_follow_formula() {
        let mapper = DifficultyMapper::new();
        let mut base = BaseRanges::new();
        base.insert("a".into(), ParamRange::new(1, 101));

        let easy = mapper.get_parameter_ranges(0.0, &base);
        assert_eq!(easy["a"], ParamRange::new(1, 21));

        let hard = mapper.get_parameter_ranges(1.0, &base);
        assert_eq!(hard["a"], ParamRange::new(31, 101));

        let mid = mapper.get_parameter_ranges(0.5, &base);
        // scale 0.6 → max 61; min 1 + floor(60 * 0.15) = 10
        assert_eq!(mid["a"], ParamRange::new(10, 61));
    }

    #[test]
    fn extreme_ranges_scale_without_overflow() {
        let mapper = DifficultyMapper::new();
        let mut base = BaseRanges::new();
        base.insert("p".into(), ParamRange::new(-(1 << 62) - 10, 1 << 62));
        base.insert("full".into(), ParamRange::new(i64::MIN, i64::MAX));

        for d in [0.0, 0.5, 1.0] {
            let scaled = mapper.get_parameter_ranges(d, &base);
            for (name, range) in &scaled {
                assert!(range.min >= base[name].min, "{name} at {d}");
                assert!(range.max > range.min, "{name} at {d}");
            }
        }
        let hard = mapper.get_parameter_ranges(1.0, &base);
        assert!(hard["full"].max > i64::MAX / 2);
    }

    #[test]
    fn zone_parses_case_insensitively() {
        assert_eq!("Struggle".parse::<DifficultyZone>().unwrap(), DifficultyZone::Struggle);
        assert!(matches!(
            "panic".parse::<DifficultyZone>(),
            Err(AdaptiveError::UnknownZone(_))
        ));
    }

    proptest! {
        #[test]
        fn mapped_difficulty_stays_in_unit_interval(m in -0.5f64..1.5, zone in zones()) {
            let d = DifficultyMapper::new().map(m, zone).difficulty;
            prop_assert!((0.0..=1.0).contains(&d));
        }

        #[test]
        fn streak_adjustment_stays_in_unit_interval(base in -1.0f64..2.0, c in 0u32..50, i in 0u32..50) {
            let d = DifficultyMapper::new().adjust_for_streak(base, c, i);
            prop_assert!((0.0..=1.0).contains(&d));
        }

        #[test]
        fn scaled_ranges_are_never_degenerate(
            min in -1000i64..1000,
            width in 0i64..5000,
            d in 0.0f64..=1.0,
        ) {
            let mut base = BaseRanges::new();
            base.insert("p".into(), ParamRange::new(min, min + width));
            let scaled = DifficultyMapper::new().get_parameter_ranges(d, &base)["p"];
            prop_assert!(scaled.min >= min);
            prop_assert!(scaled.max >= scaled.min + 1);
        }

        #[test]
        fn any_i64_range_scales_without_panicking(
            min in i64::MIN..i64::MAX,
            max in any::<i64>(),
            d in 0.0f64..=1.0,
        ) {
            let mut base = BaseRanges::new();
            base.insert("p".into(), ParamRange::new(min, max));
            let scaled = DifficultyMapper::new().get_parameter_ranges(d, &base)["p"];
            prop_assert!(scaled.min >= min);
            prop_assert!(scaled.max >= scaled.min + 1);
        }
    }
}
