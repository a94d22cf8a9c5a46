//! Closed-form soft stretch of a two-segment limb.
//!
//! While a limb is in IK the host evaluates this continuously:
//!
//! ```text
//! scaledDistance = d / s
//! maxLen         = top + bottom
//! softDist       = maxLen - p
//! excess         = scaledDistance - softDist
//! softAmount     = p * exp(-excess / p)
//! shortLen       = maxLen - softAmount
//! factor         = scaledDistance / shortLen     (only past the soft knee)
//! ```
//!
//! `softAmount` decays exponentially and never reaches zero, so the chain
//! never locks rigidly at `maxLen`.

use serde::{Deserialize, Serialize};

/// Lower bound of the soft-stretch parameter; zero would divide by zero.
pub const MIN_SOFT: f64 = 0.001;

/// Rest lengths of the upper and lower segment along the bone axis.
///
/// Mirrored chains author negative lengths; the model runs on magnitudes and
/// the sign comes back on the output lengths.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SoftStretch {
    pub rest_top: f64,
    pub rest_bottom: f64,
}

/// Every intermediate of one evaluation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StretchSolve {
    pub scaled_distance: f64,
    pub max_len: f64,
    pub soft_dist: f64,
    pub excess: f64,
    pub soft_amount: f64,
    pub short_len: f64,
    /// Multiplier on the segment lengths; exactly 1 below the soft knee.
    pub factor: f64,
}

impl StretchSolve {
    #[inline]
    pub fn is_stretching(&self) -> bool {
        self.scaled_distance > self.soft_dist
    }
}

impl SoftStretch {
    pub fn new(rest_top: f64, rest_bottom: f64) -> Self {
        Self {
            rest_top,
            rest_bottom,
        }
    }

    fn sign(&self) -> f64 {
        if self.rest_top + self.rest_bottom < 0.0 {
            -1.0
        } else {
            1.0
        }
    }

    /// Evaluate the model for end-to-end `distance` under uniform rig `scale`.
    ///
    /// `stretch_top`/`stretch_bottom` scale the rest lengths before the model
    /// runs, the same way the param-node channels feed the host network.
    pub fn solve(
        &self,
        distance: f64,
        scale: f64,
        stretch_top: f64,
        stretch_bottom: f64,
        soft: f64,
    ) -> StretchSolve {
        let p = soft.max(MIN_SOFT);
        let s = if scale.abs() > f64::EPSILON { scale.abs() } else { 1.0 };
        let scaled_distance = distance.abs() / s;
        let max_len = (self.rest_top * stretch_top + self.rest_bottom * stretch_bottom).abs();
        let soft_dist = max_len - p;
        let excess = scaled_distance - soft_dist;
        let soft_amount = p * (-excess / p).exp();
        let short_len = max_len - soft_amount;
        let factor = if scaled_distance > soft_dist && short_len > f64::EPSILON {
            scaled_distance / short_len
        } else {
            1.0
        };
        StretchSolve {
            scaled_distance,
            max_len,
            soft_dist,
            excess,
            soft_amount,
            short_len,
            factor,
        }
    }

    /// Segment lengths the rig drives: rest × stretch channel × factor, with the
    /// factor blended against 1 by the `stretch_dial` in `[0, 1]`.
    pub fn segment_lengths(
        &self,
        distance: f64,
        scale: f64,
        stretch_dial: f64,
        stretch_top: f64,
        stretch_bottom: f64,
        soft: f64,
    ) -> (f64, f64) {
        let solve = self.solve(distance, scale, stretch_top, stretch_bottom, soft);
        let dial = stretch_dial.clamp(0.0, 1.0);
        let blended = 1.0 + dial * (solve.factor - 1.0);
        let sign = self.sign();
        let top = (self.rest_top * stretch_top).abs() * blended * sign;
        let bottom = (self.rest_bottom * stretch_bottom).abs() * blended * sign;
        (top, bottom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arm() -> SoftStretch {
        SoftStretch::new(5.0, 5.0)
    }

    #[test]
    fn near_unity_just_past_the_knee() {
        let s = arm().solve(9.95, 1.0, 1.0, 1.0, 0.1);
        assert!((s.max_len - 10.0).abs() < 1e-12);
        assert!((s.soft_dist - 9.9).abs() < 1e-12);
        assert!((s.excess - 0.05).abs() < 1e-9);
        assert!(s.soft_amount > 0.0 && s.soft_amount < 0.1);
        assert!(s.short_len > 9.9 && s.short_len < 10.0);
        assert!(s.factor > 1.0 && s.factor < 1.01, "factor {}", s.factor);
    }

    #[test]
    fn below_knee_is_rest_length() {
        let s = arm().solve(6.0, 1.0, 1.0, 1.0, 0.1);
        assert!(!s.is_stretching());
        assert_eq!(s.factor, 1.0);
        assert_eq!(arm().segment_lengths(6.0, 1.0, 1.0, 1.0, 1.0, 0.1), (5.0, 5.0));
    }

    #[test]
    fn asymptote_approaches_hard_limit_without_reaching_it() {
        let stretch = arm();
        let mut last_gap = f64::INFINITY;
        for d in [10.0, 11.0, 12.0, 14.0] {
            let s = stretch.solve(d, 1.0, 1.0, 1.0, 0.5);
            let hard = s.scaled_distance / s.max_len;
            let gap = s.factor - hard;
            assert!(gap > 0.0, "soft factor must stay above the hard one");
            assert!(gap < last_gap);
            assert!(s.short_len < s.max_len);
            last_gap = gap;
        }
    }

    #[test]
    fn uniform_scale_divides_distance() {
        let a = arm().solve(20.0, 2.0, 1.0, 1.0, 0.1);
        let b = arm().solve(10.0, 1.0, 1.0, 1.0, 0.1);
        assert!((a.factor - b.factor).abs() < 1e-12);
    }

    #[test]
    fn dial_blends_and_channels_scale_rest() {
        let stretch = arm();
        let full = stretch.segment_lengths(12.0, 1.0, 1.0, 1.0, 1.0, 0.1);
        let half = stretch.segment_lengths(12.0, 1.0, 0.5, 1.0, 1.0, 0.1);
        let off = stretch.segment_lengths(12.0, 1.0, 0.0, 1.0, 1.0, 0.1);
        assert_eq!(off, (5.0, 5.0));
        assert!(full.0 > half.0 && half.0 > off.0);
        assert!(((half.0 - 5.0) * 2.0 - (full.0 - 5.0)).abs() < 1e-12);

        let channels = stretch.segment_lengths(6.0, 1.0, 1.0, 1.2, 0.8, 0.1);
        assert!((channels.0 - 6.0).abs() < 1e-12);
        assert!((channels.1 - 4.0).abs() < 1e-12);
    }

    #[test]
    fn mirrored_chain_keeps_sign() {
        let mirrored = SoftStretch::new(-5.0, -5.0);
        let (top, bottom) = mirrored.segment_lengths(12.0, 1.0, 1.0, 1.0, 1.0, 0.1);
        let (ref_top, ref_bottom) = arm().segment_lengths(12.0, 1.0, 1.0, 1.0, 1.0, 0.1);
        assert!((top + ref_top).abs() < 1e-12);
        assert!((bottom + ref_bottom).abs() < 1e-12);
    }
}
