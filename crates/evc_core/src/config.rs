use crate::channel::{sanitize_f32, Channel, CHANNELS};
use crate::emotion::Emotion;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Row-major 8x8 coupling matrix.
pub type Matrix8 = [[f32; CHANNELS]; CHANNELS];

// ============================================================================
// Top-level config
// ============================================================================

/// Engine tuning, read once at startup and shared immutably afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EvcConfig {
    pub personality: Personality,
    pub hormones: HormoneConfig,
    pub emotions: EmotionConfig,
    pub trust: TrustConfig,
    pub stimulus: StimulusConfig,
    pub session: SessionConfig,
}

impl EvcConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied and the result is sanitized.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: EvcConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config.sanitized())
    }

    /// Try to load from path; if the file is missing or invalid, use defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({:#}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg.sanitized()
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("EVC_PERSONALITY") {
            match v.parse() {
                Ok(p) => self.personality = p,
                Err(e) => tracing::warn!("Ignoring EVC_PERSONALITY: {}", e),
            }
        }
        if let Ok(v) = std::env::var("EVC_LOCK_TIMEOUT_MS") {
            if let Ok(n) = v.parse() {
                self.session.lock_timeout_ms = n;
            }
        }
        if let Ok(v) = std::env::var("EVC_DB_PATH") {
            self.session.db_path = v;
        }
    }

    /// Replace non-finite or out-of-domain tuning values so the numeric
    /// pipeline stays total no matter what the file contained.
    pub fn sanitized(mut self) -> Self {
        let d = EvcConfig::default();

        let h = &mut self.hormones;
        sanitize_array(&mut h.baseline, &d.hormones.baseline, 0.0, 1.0);
        sanitize_array(&mut h.half_life_turns, &d.hormones.half_life_turns, 1e-3, f32::MAX);
        sanitize_array(&mut h.half_life_stress_sens, &d.hormones.half_life_stress_sens, -10.0, 10.0);
        sanitize_array(
            &mut h.half_life_activation_sens,
            &d.hormones.half_life_activation_sens,
            -10.0,
            10.0,
        );
        for (row, default_row) in h.stimulus_sensitivity.iter_mut().zip(d.hormones.stimulus_sensitivity) {
            sanitize_array(row, &default_row, -10.0, 10.0);
        }
        for (row, default_row) in h.interaction.iter_mut().zip(d.hormones.interaction) {
            sanitize_array(row, &default_row, -1.0, 1.0);
        }
        h.half_life_min_factor = sanitize_f32(h.half_life_min_factor, d.hormones.half_life_min_factor).max(0.01);
        h.half_life_max_factor = sanitize_f32(h.half_life_max_factor, d.hormones.half_life_max_factor)
            .max(h.half_life_min_factor);
        h.negativity_bias = sanitize_f32(h.negativity_bias, d.hormones.negativity_bias).clamp(0.0, 10.0);
        h.stimulus_gain = sanitize_f32(h.stimulus_gain, d.hormones.stimulus_gain).clamp(0.0, 10.0);
        h.interaction_strength =
            sanitize_f32(h.interaction_strength, d.hormones.interaction_strength).clamp(0.0, 1.0);

        let e = &mut self.emotions;
        for (row, default_row) in e.weights.iter_mut().zip(d.emotions.weights) {
            sanitize_array(row, &default_row, -10.0, 10.0);
        }
        e.memory_inertia = sanitize_f32(e.memory_inertia, d.emotions.memory_inertia).clamp(0.0, 1.0);
        e.blend_threshold = sanitize_f32(e.blend_threshold, d.emotions.blend_threshold).clamp(0.0, 1.0);
        e.blend_top_n = e.blend_top_n.clamp(1, CHANNELS);
        e.priority = complete_priority(&e.priority);

        let t = &mut self.trust;
        t.min = sanitize_f32(t.min, d.trust.min).clamp(0.0, 1.0);
        t.max = sanitize_f32(t.max, d.trust.max).clamp(t.min, 1.0);
        t.initial = sanitize_f32(t.initial, d.trust.initial).clamp(t.min, t.max);
        t.up_rate = sanitize_f32(t.up_rate, d.trust.up_rate).clamp(0.0, 1.0);
        t.down_rate = sanitize_f32(t.down_rate, d.trust.down_rate).clamp(0.0, 1.0);
        t.up_exp = sanitize_f32(t.up_exp, d.trust.up_exp).clamp(0.1, 5.0);
        t.down_exp = sanitize_f32(t.down_exp, d.trust.down_exp).clamp(0.1, 5.0);
        t.memory_alpha = sanitize_f32(t.memory_alpha, d.trust.memory_alpha).clamp(0.0, 1.0);

        let s = &mut self.stimulus;
        s.signal_max = sanitize_f32(s.signal_max, d.stimulus.signal_max).max(0.0);
        s.context_min = sanitize_f32(s.context_min, d.stimulus.context_min).max(1e-3);
        s.context_max = sanitize_f32(s.context_max, d.stimulus.context_max).max(s.context_min);

        let ss = &mut self.session;
        ss.turn_seconds = sanitize_f32(ss.turn_seconds, d.session.turn_seconds).max(1e-3);
        ss.min_elapsed_turns = sanitize_f32(ss.min_elapsed_turns, d.session.min_elapsed_turns).max(0.0);
        ss.max_elapsed_turns =
            sanitize_f32(ss.max_elapsed_turns, d.session.max_elapsed_turns).max(ss.min_elapsed_turns);
        ss.first_turn_elapsed = sanitize_f32(ss.first_turn_elapsed, d.session.first_turn_elapsed)
            .clamp(0.0, ss.max_elapsed_turns);
        ss.lock_timeout_ms = ss.lock_timeout_ms.max(1);
        ss.signal_history_len = ss.signal_history_len.max(1);

        if let Personality::Custom(ref mut k) = self.personality {
            sanitize_array(k, &[1.0; CHANNELS], 0.0, 10.0);
        }

        self
    }
}

fn sanitize_array<const N: usize>(values: &mut [f32; N], defaults: &[f32; N], lo: f32, hi: f32) {
    for (v, fallback) in values.iter_mut().zip(defaults) {
        if !v.is_finite() {
            tracing::warn!("Non-finite tuning value replaced with default {}", fallback);
        }
        *v = sanitize_f32(*v, *fallback).clamp(lo, hi);
    }
}

/// Deduplicate and append any emotion missing from the configured order.
pub(crate) fn complete_priority(priority: &[Emotion]) -> Vec<Emotion> {
    let mut out: Vec<Emotion> = Vec::with_capacity(CHANNELS);
    for e in priority.iter().chain(Emotion::ALL.iter()) {
        if !out.contains(e) {
            out.push(*e);
        }
    }
    out
}

// ============================================================================
// Personality
// ============================================================================

/// Per-hormone sensitivity to the stimulus impulse (K).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Personality {
    #[default]
    Balanced,
    /// Reactive: strong dopamine/cortisol swings, weak GABA buffering
    Sensitive,
    /// Buffered: high serotonin/GABA gain, muted stress response
    Calm,
    /// Upbeat: strong reward response, muted stress response
    Cheerful,
    Custom([f32; CHANNELS]),
}

impl Personality {
    pub fn sensitivity(&self) -> [f32; CHANNELS] {
        match self {
            Personality::Balanced => [1.0; CHANNELS],
            Personality::Sensitive => [1.5, 0.8, 1.3, 1.0, 1.5, 1.3, 0.7, 1.2],
            Personality::Calm => [0.8, 1.3, 1.0, 1.2, 0.6, 0.5, 1.5, 0.6],
            Personality::Cheerful => [1.5, 1.2, 1.3, 1.2, 0.5, 0.5, 1.2, 0.6],
            Personality::Custom(k) => *k,
        }
    }
}

impl FromStr for Personality {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "balanced" | "default" => Ok(Personality::Balanced),
            "sensitive" => Ok(Personality::Sensitive),
            "calm" => Ok(Personality::Calm),
            "cheerful" => Ok(Personality::Cheerful),
            other => Err(format!("unknown personality preset '{}'", other)),
        }
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

/// Hormone dynamics tuning. Channel order: Dopamine, Serotonin, Oxytocin,
/// Endorphin, Cortisol, Adrenaline, GABA, Norepinephrine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HormoneConfig {
    /// Homeostatic target each channel decays toward
    pub baseline: [f32; CHANNELS],
    /// Half-life in turn units (1 turn = `session.turn_seconds`)
    pub half_life_turns: [f32; CHANNELS],
    /// How stress (D * C) stretches each half-life
    pub half_life_stress_sens: [f32; CHANNELS],
    /// How distance from baseline stretches each half-life
    pub half_life_activation_sens: [f32; CHANNELS],
    pub half_life_min_factor: f32,
    pub half_life_max_factor: f32,
    /// Per-hormone response: `[weight on S, weight on D]`.
    /// Positive D weight means the hormone rises under negative stimulus.
    pub stimulus_sensitivity: [[f32; 2]; CHANNELS],
    /// Multiplier on D before application
    pub negativity_bias: f32,
    /// Global gain on the stimulus impulse
    pub stimulus_gain: f32,
    /// `interaction[i][j]`: how deviation of hormone j moves hormone i
    pub interaction: Matrix8,
    pub interaction_strength: f32,
}

impl Default for HormoneConfig {
    fn default() -> Self {
        Self {
            baseline: [0.50, 0.60, 0.40, 0.30, 0.30, 0.20, 0.50, 0.30],
            half_life_turns: [0.4, 6.0, 0.8, 4.0, 15.0, 0.5, 6.0, 0.5],
            half_life_stress_sens: [-0.15, -0.10, -0.20, 0.05, 0.65, 0.45, -0.05, 0.35],
            half_life_activation_sens: [0.25, 0.20, 0.20, 0.20, 0.70, 0.40, 0.20, 0.35],
            half_life_min_factor: 0.65,
            half_life_max_factor: 2.00,
            stimulus_sensitivity: [
                [0.80, -0.60], // Dopamine
                [0.50, -0.50], // Serotonin
                [0.60, -0.40], // Oxytocin
                [0.40, -0.20], // Endorphin
                [-0.30, 0.80], // Cortisol
                [0.10, 0.60],  // Adrenaline
                [0.30, -0.40], // GABA
                [0.10, 0.50],  // Norepinephrine
            ],
            negativity_bias: 1.5,
            stimulus_gain: 0.60,
            interaction: [
                //  Dopa   Sero  Oxyto  Endor  Corti  Adren  GABA   NorEp
                [0.00, 0.05, 0.03, 0.02, -0.04, 0.02, 0.00, 0.03],
                [0.03, 0.00, 0.04, 0.03, -0.08, -0.02, 0.05, -0.02],
                [0.02, 0.03, 0.00, 0.02, -0.06, -0.03, 0.03, -0.02],
                [0.03, 0.04, 0.03, 0.00, -0.03, 0.00, 0.02, 0.00],
                [-0.02, -0.03, -0.06, -0.04, 0.00, 0.04, -0.05, 0.03],
                [0.02, -0.02, -0.03, 0.00, 0.05, 0.00, -0.08, 0.05],
                [0.02, 0.04, 0.03, 0.03, -0.04, -0.03, 0.00, -0.03],
                [0.03, -0.02, -0.02, 0.00, 0.04, 0.05, -0.06, 0.00],
            ],
            interaction_strength: 0.15,
        }
    }
}

/// Hormone → emotion mapping tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmotionConfig {
    /// `weights[emotion][hormone]`
    pub weights: Matrix8,
    /// Share of the carried emotional memory in each fresh emotion vector
    pub memory_inertia: f32,
    /// Tie-break order for the dominant emotion (earlier wins)
    pub priority: Vec<Emotion>,
    /// Channels below this are left out of the blend description
    pub blend_threshold: f32,
    pub blend_top_n: usize,
}

impl Default for EmotionConfig {
    fn default() -> Self {
        Self {
            weights: [
                //  Dopa   Sero  Oxyto  Endor  Corti  Adren  GABA   NorEp
                [0.35, 0.20, 0.15, 0.20, -0.15, 0.00, 0.10, 0.00],   // Joy
                [0.05, 0.35, 0.10, 0.15, -0.20, -0.15, 0.30, -0.10], // Serenity
                [0.10, 0.15, 0.40, 0.10, -0.10, -0.05, 0.10, 0.00],  // Love
                [0.25, -0.05, 0.05, 0.15, 0.00, 0.30, -0.15, 0.20],  // Excitement
                [-0.20, -0.40, -0.15, -0.15, 0.45, 0.05, -0.20, 0.05], // Sadness
                [-0.10, -0.15, -0.10, -0.10, 0.35, 0.25, -0.20, 0.25], // Fear
                [-0.10, -0.20, -0.15, -0.05, 0.25, 0.20, -0.25, 0.30], // Anger
                [0.10, -0.10, 0.00, 0.05, 0.10, 0.30, -0.20, 0.25],  // Surprise
            ],
            memory_inertia: 0.15,
            priority: Emotion::ALL.to_vec(),
            blend_threshold: 0.05,
            blend_top_n: 3,
        }
    }
}

/// Trust and emotional-memory tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustConfig {
    pub initial: f32,
    pub min: f32,
    pub max: f32,
    /// Gain per unit of S
    pub up_rate: f32,
    /// Gain per unit of D
    pub down_rate: f32,
    /// Curvature on remaining headroom; > 1 slows growth near `max`
    pub up_exp: f32,
    /// Curvature on remaining floor room; < 1 keeps losses sharp at high trust
    pub down_exp: f32,
    /// EMA smoothing constant for emotional memory
    pub memory_alpha: f32,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            initial: 0.5,
            min: 0.05,
            max: 0.95,
            up_rate: 0.06,
            down_rate: 0.05,
            up_exp: 1.2,
            down_exp: 0.8,
            memory_alpha: 0.1,
        }
    }
}

/// Safe ranges for untrusted stimulus input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StimulusConfig {
    /// S and D are clamped to [0, signal_max]
    pub signal_max: f32,
    pub context_min: f32,
    pub context_max: f32,
}

impl Default for StimulusConfig {
    fn default() -> Self {
        Self {
            signal_max: 1.0,
            context_min: 0.2,
            context_max: 3.0,
        }
    }
}

/// Session-level timing, locking and storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Wall-clock seconds per turn unit
    pub turn_seconds: f32,
    /// Floor so rapid-fire turns still move the dynamics
    pub min_elapsed_turns: f32,
    /// Cap for long inactivity gaps
    pub max_elapsed_turns: f32,
    /// Elapsed turns assumed for a session's first turn
    pub first_turn_elapsed: f32,
    pub lock_timeout_ms: u64,
    /// Stimulus records kept per session for mood/trend
    pub signal_history_len: usize,
    pub db_path: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            turn_seconds: 300.0,
            min_elapsed_turns: 0.05,
            max_elapsed_turns: 12.0,
            first_turn_elapsed: 1.0,
            lock_timeout_ms: 5_000,
            signal_history_len: 50,
            db_path: "evc.db".to_string(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = EvcConfig::default();
        assert_eq!(cfg.personality, Personality::Balanced);
        assert!((cfg.trust.initial - 0.5).abs() < 1e-6);
        assert_eq!(cfg.emotions.priority, Emotion::ALL.to_vec());
        assert_eq!(cfg.session.lock_timeout_ms, 5_000);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
personality = "calm"

[trust]
initial = 0.6
"#;
        let cfg: EvcConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.personality, Personality::Calm);
        assert!((cfg.trust.initial - 0.6).abs() < 1e-6);
        // Defaults for unspecified fields
        assert!((cfg.trust.down_rate - 0.05).abs() < 1e-6);
        assert!((cfg.hormones.baseline[4] - 0.30).abs() < 1e-6);
    }

    #[test]
    fn test_parse_custom_personality_and_tables() {
        let toml_str = r#"
personality = { custom = [1.0, 1.0, 1.0, 1.0, 2.0, 1.0, 1.0, 1.0] }

[hormones]
baseline = [0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5]
half_life_turns = [1.0, 1.0, 1.0, 1.0, 10.0, 1.0, 1.0, 1.0]

[emotions]
priority = ["Fear", "Sadness"]
blend_threshold = 0.1

[session]
lock_timeout_ms = 250
"#;
        let cfg: EvcConfig = toml::from_str(toml_str).unwrap();
        let cfg = cfg.sanitized();
        assert_eq!(cfg.personality.sensitivity()[4], 2.0);
        assert_eq!(cfg.hormones.half_life_turns[4], 10.0);
        assert_eq!(cfg.emotions.priority.len(), CHANNELS);
        assert_eq!(cfg.emotions.priority[0], Emotion::Fear);
        assert_eq!(cfg.emotions.priority[1], Emotion::Sadness);
        assert_eq!(cfg.emotions.priority[2], Emotion::Joy);
        assert_eq!(cfg.session.lock_timeout_ms, 250);
    }

    #[test]
    fn test_sanitized_repairs_bad_values() {
        let mut cfg = EvcConfig::default();
        cfg.hormones.half_life_turns[0] = 0.0;
        cfg.hormones.baseline[1] = f32::NAN;
        cfg.hormones.baseline[2] = 3.0;
        cfg.trust.min = 0.9;
        cfg.trust.max = 0.1;
        cfg.trust.memory_alpha = f32::INFINITY;
        cfg.emotions.blend_top_n = 0;

        let cfg = cfg.sanitized();
        assert!(cfg.hormones.half_life_turns[0] > 0.0);
        assert!((cfg.hormones.baseline[1] - 0.60).abs() < 1e-6);
        assert_eq!(cfg.hormones.baseline[2], 1.0);
        assert!(cfg.trust.max >= cfg.trust.min);
        assert!(cfg.trust.initial >= cfg.trust.min && cfg.trust.initial <= cfg.trust.max);
        assert!((cfg.trust.memory_alpha - 0.1).abs() < 1e-6);
        assert_eq!(cfg.emotions.blend_top_n, 1);
    }

    #[test]
    fn test_personality_from_str() {
        assert_eq!("Sensitive".parse::<Personality>().unwrap(), Personality::Sensitive);
        assert_eq!("default".parse::<Personality>().unwrap(), Personality::Balanced);
        assert!("grumpy".parse::<Personality>().is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let cfg = EvcConfig::load_or_default("/nonexistent/evc.toml");
        assert!((cfg.hormones.stimulus_gain - 0.6).abs() < 1e-6);
    }
}
