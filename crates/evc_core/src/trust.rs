//! Trust & Memory Tracker
//!
//! Trust is a scalar relationship estimate with an asymmetric update. The
//! sign of `S - D` picks the direction: a positive turn gains in proportion to
//! the headroom below `max`, a negative one loses in proportion to the room
//! above `min`. The loss exponent is flatter so negative turns bite harder.
//! Emotional memory is an EMA of emotion vectors.

use crate::channel::sanitize_f32;
use crate::config::{StimulusConfig, TrustConfig};
use crate::emotion::{EmotionVector, EmotionalMemory};
use crate::stimulus::Stimulus;

#[derive(Debug, Clone)]
pub struct TrustTracker {
    config: TrustConfig,
    bounds: StimulusConfig,
}

impl Default for TrustTracker {
    fn default() -> Self {
        Self::new(TrustConfig::default(), StimulusConfig::default())
    }
}

impl TrustTracker {
    pub fn new(config: TrustConfig, bounds: StimulusConfig) -> Self {
        Self { config, bounds }
    }

    pub fn initial(&self) -> f32 {
        self.config.initial
    }

    /// One trust step, scaled by the margin `|S - D|`. A tie leaves trust
    /// unchanged. Non-finite trust restarts from the configured initial value.
    pub fn step_trust(&self, trust: f32, stimulus: &Stimulus) -> f32 {
        let c = &self.config;
        let s = stimulus.sanitized(&self.bounds);
        let t = sanitize_f32(trust, c.initial).clamp(c.min, c.max);
        let margin = s.positive - s.negative;

        let next = if s.is_positive() {
            t + c.up_rate * margin * (c.max - t).max(0.0).powf(c.up_exp)
        } else if margin < 0.0 {
            t + c.down_rate * margin * (t - c.min).max(0.0).powf(c.down_exp)
        } else {
            t
        };
        next.clamp(c.min, c.max)
    }

    /// `memory' = alpha * emotions + (1 - alpha) * memory`
    pub fn step_memory(&self, memory: &EmotionalMemory, emotions: &EmotionVector) -> EmotionalMemory {
        memory.lerp(emotions, self.config.memory_alpha)
    }

    /// Returns `(new_trust, new_memory)`.
    pub fn update(
        &self,
        trust: f32,
        emotions: &EmotionVector,
        memory: &EmotionalMemory,
        stimulus: &Stimulus,
    ) -> (f32, EmotionalMemory) {
        (self.step_trust(trust, stimulus), self.step_memory(memory, emotions))
    }
}
