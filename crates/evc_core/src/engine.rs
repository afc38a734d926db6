//! Affect Engine: one turn of Hormone System → Emotion Mapper → Trust & Memory.
//!
//! The engine is stateless; it borrows a `SessionState` for the duration of a
//! turn and never holds on to it. Time is passed in explicitly (Unix millis)
//! so callers control the clock.

use crate::channel::{round_to, ChannelDelta};
use crate::config::EvcConfig;
use crate::dynamics::HormoneSystem;
use crate::emotion::{EmotionMapper, EmotionVector};
use crate::hormone::Hormone;
use crate::signals::SignalHistory;
use crate::state::{PublicState, SessionState, Subject};
use crate::stimulus::Stimulus;
use crate::trust::TrustTracker;

#[derive(Debug, Clone)]
pub struct AffectEngine {
    config: EvcConfig,
    hormones: HormoneSystem,
    mapper: EmotionMapper,
    trust: TrustTracker,
}

impl Default for AffectEngine {
    fn default() -> Self {
        Self::new(EvcConfig::default())
    }
}

impl AffectEngine {
    pub fn new(config: EvcConfig) -> Self {
        let config = config.sanitized();
        Self {
            hormones: HormoneSystem::from_config(&config),
            mapper: EmotionMapper::from_config(&config.emotions),
            trust: TrustTracker::new(config.trust.clone(), config.stimulus.clone()),
            config,
        }
    }

    pub fn config(&self) -> &EvcConfig {
        &self.config
    }

    pub fn hormone_system(&self) -> &HormoneSystem {
        &self.hormones
    }

    pub fn mapper(&self) -> &EmotionMapper {
        &self.mapper
    }

    /// Fresh record: hormones at baseline, neutral trust, empty memory, turn 0.
    pub fn initial_state(&self, session_id: &str, subject: Subject) -> SessionState {
        SessionState {
            session_id: session_id.to_string(),
            subject,
            hormones: self.hormones.baseline(),
            trust: self.trust.initial(),
            memory: EmotionVector::zeros(),
            turn: 0,
            last_updated_at: None,
            signals: SignalHistory::with_capacity(self.config.session.signal_history_len),
        }
    }

    /// Bring a stored record in line with the current config.
    pub fn adopt(&self, mut state: SessionState) -> SessionState {
        state.normalize(self.trust.initial());
        state.signals.set_capacity(self.config.session.signal_history_len);
        state
    }

    /// Wall-clock gap since the last turn, in turn units and clamped to
    /// `[min_elapsed_turns, max_elapsed_turns]`. A first turn uses
    /// `first_turn_elapsed`.
    pub fn elapsed_turns(&self, state: &SessionState, now_ms: i64) -> f32 {
        let s = &self.config.session;
        match self.raw_elapsed(state, now_ms) {
            Some(turns) => turns.clamp(s.min_elapsed_turns, s.max_elapsed_turns),
            None => s.first_turn_elapsed,
        }
    }

    fn raw_elapsed(&self, state: &SessionState, now_ms: i64) -> Option<f32> {
        let last = state.last_updated_at?;
        let seconds = now_ms.saturating_sub(last) as f64 / 1000.0;
        Some((seconds / self.config.session.turn_seconds as f64) as f32)
    }

    /// Apply one turn in place and return the projection.
    pub fn apply_turn(&self, state: &mut SessionState, stimulus: Stimulus, now_ms: i64) -> PublicState {
        let stimulus = stimulus.sanitized(&self.config.stimulus);
        let elapsed = self.elapsed_turns(state, now_ms);

        let before = state.hormones;
        let hormones = self.hormones.update(&before, elapsed, stimulus);
        let emotions = self.mapper.map(&hormones, &state.memory);
        let (trust, memory) = self.trust.update(state.trust, &emotions, &state.memory, &stimulus);

        state.hormones = hormones;
        state.trust = trust;
        state.memory = memory;
        state.turn = state.turn.saturating_add(1);
        state.last_updated_at = Some(state.last_updated_at.map_or(now_ms, |last| last.max(now_ms)));
        state.signals.record(state.turn, &stimulus);

        let public = self.project(state, &emotions, hormones.delta_from(&before));
        tracing::debug!(
            session = %state.session_id,
            subject = %state.subject,
            turn = state.turn,
            elapsed_turns = elapsed,
            dominant = %public.dominant_emotion,
            trust = public.trust,
            "Turn applied"
        );
        public
    }

    /// State as of `now_ms` with decay only. Does not touch `state`.
    ///
    /// Emotions are recomputed from the decayed hormones against the stored
    /// memory, so a peek right after a turn can differ slightly from that
    /// turn's returned emotions.
    pub fn preview(&self, state: &SessionState, now_ms: i64) -> PublicState {
        let elapsed = self
            .raw_elapsed(state, now_ms)
            .map_or(0.0, |t| t.clamp(0.0, self.config.session.max_elapsed_turns));

        let mut view = state.clone();
        view.hormones = self.hormones.decay(&state.hormones, elapsed);
        let emotions = self.mapper.map(&view.hormones, &view.memory);
        self.project(&view, &emotions, ChannelDelta::default())
    }

    /// Build the outbound projection for `state` with already computed emotions.
    pub fn project(
        &self,
        state: &SessionState,
        emotions: &EmotionVector,
        hormone_delta: ChannelDelta<Hormone>,
    ) -> PublicState {
        let (dominant_emotion, dominant_score) = self.mapper.dominant(emotions);
        PublicState {
            session_id: state.session_id.clone(),
            subject: state.subject,
            turn: state.turn,
            hormones: state.hormones.rounded(4),
            hormone_delta: hormone_delta.rounded(4),
            emotions: emotions.rounded(4),
            dominant_emotion,
            dominant_score: round_to(dominant_score, 4),
            emotion_blend: self.mapper.blend(emotions),
            trust: round_to(state.trust, 4),
            output_intensity: round_to(state.trust * dominant_score, 4),
            mood: state.mood(),
            trend: state.trend(),
        }
    }
}
