//! Per-turn stimulus signals
//!
//! S, D and C come from an upstream language-model analysis step and are
//! treated as untrusted. They are clamped into safe ranges, never rejected.

use crate::channel::sanitize_f32;
use crate::config::StimulusConfig;
use serde::{Deserialize, Serialize};

/// One turn's stimulus: positive magnitude S, negative magnitude D and
/// context multiplier C (1.0 is neutral).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stimulus {
    pub positive: f32,
    pub negative: f32,
    pub context: f32,
}

impl Default for Stimulus {
    fn default() -> Self {
        Self::neutral()
    }
}

impl Stimulus {
    pub fn new(positive: f32, negative: f32, context: f32) -> Self {
        Self {
            positive,
            negative,
            context,
        }
    }

    /// No stimulus at neutral context: decay only.
    pub fn neutral() -> Self {
        Self::new(0.0, 0.0, 1.0)
    }

    /// Clamp into the configured safe ranges. Non-finite S/D become 0 and a
    /// non-finite C becomes 1.0 before clamping.
    pub fn sanitized(&self, bounds: &StimulusConfig) -> Self {
        let clean = Self {
            positive: sanitize_f32(self.positive, 0.0).clamp(0.0, bounds.signal_max),
            negative: sanitize_f32(self.negative, 0.0).clamp(0.0, bounds.signal_max),
            context: sanitize_f32(self.context, 1.0).clamp(bounds.context_min, bounds.context_max),
        };
        if clean != *self {
            tracing::warn!(
                "Stimulus out of range (S={}, D={}, C={}), clamped to (S={:.3}, D={:.3}, C={:.3})",
                self.positive,
                self.negative,
                self.context,
                clean.positive,
                clean.negative,
                clean.context
            );
        }
        clean
    }

    /// Stress level used to stretch half-lives: `D * C` in [0, 1.5].
    pub fn stress_level(&self) -> f32 {
        (self.negative * self.context).clamp(0.0, 1.5)
    }

    /// How strongly this turn engages cross-hormone coupling, in [0, 1].
    /// Zero for a stimulus-free turn, so pure decay stays uncoupled.
    pub fn drive(&self) -> f32 {
        ((self.positive + self.negative) * self.context).clamp(0.0, 1.0)
    }

    /// Whether the positive signal outweighs the negative one.
    pub fn is_positive(&self) -> bool {
        self.positive > self.negative
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitized_clamps_out_of_range() {
        let bounds = StimulusConfig::default();
        let s = Stimulus::new(5.0, -1.0, 100.0).sanitized(&bounds);
        assert_eq!(s.positive, bounds.signal_max);
        assert_eq!(s.negative, 0.0);
        assert_eq!(s.context, bounds.context_max);
    }

    #[test]
    fn test_sanitized_replaces_non_finite() {
        let bounds = StimulusConfig::default();
        let s = Stimulus::new(f32::NAN, f32::INFINITY, f32::NEG_INFINITY).sanitized(&bounds);
        assert_eq!(s.positive, 0.0);
        assert_eq!(s.negative, 0.0);
        assert_eq!(s.context, 1.0);
    }

    #[test]
    fn test_in_range_is_untouched() {
        let bounds = StimulusConfig::default();
        let s = Stimulus::new(0.2, 0.6, 1.1);
        assert_eq!(s.sanitized(&bounds), s);
    }

    #[test]
    fn test_drive_zero_without_signal() {
        assert_eq!(Stimulus::neutral().drive(), 0.0);
        assert!(Stimulus::new(0.2, 0.6, 1.1).drive() > 0.8);
    }
}
