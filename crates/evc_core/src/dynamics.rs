//! Hormone System: the per-turn update law
//!
//! h' = clamp( couple( decay(h, dt) + impulse(S, D, C) ) )
//!
//! - decay: each channel relaxes toward its baseline with a half-life law,
//!   `b + (h - b) * 0.5^(dt / t_half)`. The half-life stretches under stress
//!   and while a channel is far from baseline.
//! - impulse: an 8x2 sensitivity matrix applied to (S, D*bias), scaled by C,
//!   the global gain and the personality vector K.
//! - couple: one linear pass of the 8x8 interaction matrix over the
//!   deviation from baseline, gated by the turn's drive.
//!
//! The update is a pure function of its inputs; identical inputs give
//! bit-identical outputs.

use crate::channel::{sanitize_f32, CHANNELS};
use crate::config::{EvcConfig, HormoneConfig, StimulusConfig};
use crate::hormone::HormoneVector;
use crate::stimulus::Stimulus;

#[derive(Debug, Clone)]
pub struct HormoneSystem {
    config: HormoneConfig,
    personality: [f32; CHANNELS],
    bounds: StimulusConfig,
}

impl Default for HormoneSystem {
    fn default() -> Self {
        Self::from_config(&EvcConfig::default())
    }
}

impl HormoneSystem {
    pub fn from_config(config: &EvcConfig) -> Self {
        Self {
            config: config.hormones.clone(),
            personality: config.personality.sensitivity(),
            bounds: config.stimulus.clone(),
        }
    }

    pub fn baseline(&self) -> HormoneVector {
        HormoneVector::from_array(self.config.baseline)
    }

    /// Advance hormones by one turn.
    ///
    /// `elapsed_turns` that is zero, negative or non-finite means no decay;
    /// the stimulus is still applied.
    pub fn update(&self, current: &HormoneVector, elapsed_turns: f32, stimulus: Stimulus) -> HormoneVector {
        let stimulus = stimulus.sanitized(&self.bounds);
        let decayed = self.decay_raw(current, elapsed_turns, stimulus.stress_level());
        let impulse = self.impulse(&stimulus);

        let mut next = [0.0; CHANNELS];
        for i in 0..CHANNELS {
            next[i] = decayed[i] + impulse[i];
        }

        HormoneVector::from_array(self.couple(&next, stimulus.drive()))
    }

    /// Decay only, at zero stress. Used for read-only previews.
    pub fn decay(&self, current: &HormoneVector, elapsed_turns: f32) -> HormoneVector {
        HormoneVector::from_array(self.decay_raw(current, elapsed_turns, 0.0))
    }

    /// Effective half-life per channel for the given state and stress.
    pub fn effective_half_lives(&self, current: &HormoneVector, stress: f32) -> [f32; CHANNELS] {
        let c = &self.config;
        let h = current.to_array();
        let mut out = [0.0; CHANNELS];
        for i in 0..CHANNELS {
            let activation = (h[i] - c.baseline[i]).abs();
            let factor = (1.0
                + c.half_life_stress_sens[i] * stress
                + c.half_life_activation_sens[i] * activation)
                .clamp(c.half_life_min_factor, c.half_life_max_factor);
            out[i] = (c.half_life_turns[i] * factor).max(1e-6);
        }
        out
    }

    fn decay_raw(&self, current: &HormoneVector, elapsed_turns: f32, stress: f32) -> [f32; CHANNELS] {
        let h = current.to_array();
        let dt = sanitize_f32(elapsed_turns, 0.0).max(0.0);
        if dt == 0.0 {
            return h;
        }

        let half_lives = self.effective_half_lives(current, stress);
        let mut out = [0.0; CHANNELS];
        for i in 0..CHANNELS {
            let b = self.config.baseline[i];
            out[i] = b + (h[i] - b) * 0.5f32.powf(dt / half_lives[i]);
        }
        out
    }

    /// Stimulus impulse per channel (before coupling and clamping).
    pub fn impulse(&self, stimulus: &Stimulus) -> [f32; CHANNELS] {
        let c = &self.config;
        let s = stimulus.positive * stimulus.context;
        let d = stimulus.negative * c.negativity_bias * stimulus.context;
        let mut out = [0.0; CHANNELS];
        for i in 0..CHANNELS {
            let [w_s, w_d] = c.stimulus_sensitivity[i];
            out[i] = c.stimulus_gain * self.personality[i] * (w_s * s + w_d * d);
        }
        out
    }

    fn couple(&self, values: &[f32; CHANNELS], drive: f32) -> [f32; CHANNELS] {
        let c = &self.config;
        let strength = c.interaction_strength * drive;
        if strength == 0.0 {
            return *values;
        }

        let mut deviation = [0.0; CHANNELS];
        for j in 0..CHANNELS {
            deviation[j] = values[j] - c.baseline[j];
        }

        let mut out = *values;
        for (i, row) in c.interaction.iter().enumerate() {
            let pull: f32 = row.iter().zip(deviation.iter()).map(|(m, dev)| m * dev).sum();
            out[i] += strength * pull;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Channel;
    use crate::config::Personality;
    use crate::hormone::Hormone;

    fn stressed_stimulus() -> Stimulus {
        Stimulus::new(0.2, 0.6, 1.1)
    }

    #[test]
    fn test_negative_stimulus_raises_stress_hormones() {
        let system = HormoneSystem::default();
        let base = system.baseline();
        let next = system.update(&base, 1.0, stressed_stimulus());

        assert!(next[Hormone::Cortisol] > base[Hormone::Cortisol]);
        assert!(next[Hormone::Adrenaline] > base[Hormone::Adrenaline]);
        assert!(next[Hormone::Gaba] < base[Hormone::Gaba]);
        assert!(next[Hormone::Dopamine] < base[Hormone::Dopamine]);
    }

    #[test]
    fn test_positive_stimulus_raises_reward_hormones() {
        let system = HormoneSystem::default();
        let base = system.baseline();
        let next = system.update(&base, 1.0, Stimulus::new(0.9, 0.0, 1.0));

        assert!(next[Hormone::Dopamine] > base[Hormone::Dopamine]);
        assert!(next[Hormone::Oxytocin] > base[Hormone::Oxytocin]);
        assert!(next[Hormone::Cortisol] < base[Hormone::Cortisol]);
    }

    #[test]
    fn test_baseline_is_fixed_point_without_stimulus() {
        let system = HormoneSystem::default();
        let base = system.baseline();
        for dt in [0.0, 0.5, 1.0, 12.0] {
            let next = system.update(&base, dt, Stimulus::neutral());
            assert!(next.max_abs_diff(&base) < 1e-6, "dt={dt}");
        }
    }

    #[test]
    fn test_decay_follows_half_life() {
        let system = HormoneSystem::default();
        let config = HormoneConfig::default();
        let mut h = system.baseline();
        h.set(Hormone::Serotonin, 1.0);

        // Activation stretches the half-life, so one nominal half-life
        // leaves more than half of the deviation.
        let after = system.decay(&h, config.half_life_turns[Hormone::Serotonin.index()]);
        let start_dev = 1.0 - config.baseline[1];
        let dev = after[Hormone::Serotonin] - config.baseline[1];
        assert!(dev > 0.0 && dev < start_dev);
        assert!(dev >= start_dev * 0.5 - 1e-6);
    }

    #[test]
    fn test_cortisol_outlasts_dopamine() {
        let system = HormoneSystem::default();
        let config = HormoneConfig::default();
        let mut h = system.baseline();
        h.set(Hormone::Dopamine, 0.9);
        h.set(Hormone::Cortisol, 0.7);

        let after = system.decay(&h, 2.0);
        let dopa_left = (after[Hormone::Dopamine] - config.baseline[0]) / (0.9 - config.baseline[0]);
        let cort_left = (after[Hormone::Cortisol] - config.baseline[4]) / (0.7 - config.baseline[4]);
        assert!(cort_left > dopa_left);
    }

    #[test]
    fn test_zero_or_negative_elapsed_means_no_decay() {
        let system = HormoneSystem::default();
        let mut h = system.baseline();
        h.set(Hormone::Cortisol, 0.9);
        for dt in [0.0, -5.0, f32::NAN] {
            assert_eq!(system.decay(&h, dt), h);
        }
        // Stimulus still applies with zero elapsed
        let next = system.update(&h, 0.0, Stimulus::new(0.0, 0.5, 1.0));
        assert!(next[Hormone::Adrenaline] > h[Hormone::Adrenaline]);
    }

    #[test]
    fn test_stress_stretches_cortisol_half_life() {
        let system = HormoneSystem::default();
        let base = system.baseline();
        let calm = system.effective_half_lives(&base, 0.0);
        let stressed = system.effective_half_lives(&base, 1.0);
        let i = Hormone::Cortisol.index();
        assert!(stressed[i] > calm[i]);
    }

    #[test]
    fn test_malformed_input_is_clamped() {
        let system = HormoneSystem::default();
        let base = system.baseline();
        let next = system.update(&base, f32::INFINITY, Stimulus::new(f32::NAN, 1e9, -3.0));
        for (_, v) in next.iter() {
            assert!(v.is_finite() && (0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_update_is_deterministic() {
        let system = HormoneSystem::default();
        let mut h = system.baseline();
        h.set(Hormone::Oxytocin, 0.77);
        let a = system.update(&h, 0.37, Stimulus::new(0.4, 0.3, 1.3));
        let b = system.update(&h, 0.37, Stimulus::new(0.4, 0.3, 1.3));
        for (x, y) in a.to_array().iter().zip(b.to_array().iter()) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
    }

    #[test]
    fn test_personality_scales_impulse() {
        let calm = HormoneSystem::from_config(&EvcConfig {
            personality: Personality::Calm,
            ..Default::default()
        });
        let sensitive = HormoneSystem::from_config(&EvcConfig {
            personality: Personality::Sensitive,
            ..Default::default()
        });
        let s = stressed_stimulus();
        let i = Hormone::Cortisol.index();
        assert!(sensitive.impulse(&s)[i] > calm.impulse(&s)[i]);
    }

    #[test]
    fn test_coupling_only_with_drive() {
        let system = HormoneSystem::default();
        let mut h = system.baseline();
        h.set(Hormone::Cortisol, 0.9);
        let uncoupled = system.couple(&h.to_array(), 0.0);
        assert_eq!(uncoupled, h.to_array());

        // High cortisol suppresses serotonin once coupling is engaged
        let coupled = system.couple(&h.to_array(), 1.0);
        assert!(coupled[Hormone::Serotonin.index()] < h[Hormone::Serotonin]);
    }
}
