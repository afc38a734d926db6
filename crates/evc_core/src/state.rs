//! Session state records
//!
//! `SessionState` is the durable unit of ownership: one per (session, subject).
//! `PublicState` is the read-only projection handed to the reply generator.

use crate::channel::{sanitize_f32, Channel, ChannelDelta};
use crate::emotion::{Emotion, EmotionBlend, EmotionVector, EmotionalMemory};
use crate::hormone::{Hormone, HormoneVector};
use crate::signals::{Mood, SignalHistory, SignalStats, Trend};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Whose affect a record models. Each session carries one of each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    /// The assistant's own simulated affect
    Assistant,
    /// The inferred affect of the user
    User,
}

impl Subject {
    pub const ALL: [Subject; 2] = [Subject::Assistant, Subject::User];

    pub fn as_str(self) -> &'static str {
        match self {
            Subject::Assistant => "assistant",
            Subject::User => "user",
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Subject {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "assistant" | "bot" => Ok(Subject::Assistant),
            "user" => Ok(Subject::User),
            other => Err(format!("unknown subject '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    pub subject: Subject,
    pub hormones: HormoneVector,
    pub trust: f32,
    pub memory: EmotionalMemory,
    /// Completed turns; 0 for a fresh record
    pub turn: u64,
    /// Unix millis of the last applied turn; `None` until the first turn
    pub last_updated_at: Option<i64>,
    #[serde(default)]
    pub signals: SignalHistory,
}

impl SessionState {
    /// Repair a record read from storage. Vectors are already clamped on
    /// deserialization; only the scalars need attention.
    pub fn normalize(&mut self, trust_fallback: f32) {
        self.trust = sanitize_f32(self.trust, trust_fallback).clamp(0.0, 1.0);
        if self.turn == 0 {
            self.last_updated_at = None;
        }
    }

    pub fn mood(&self) -> Mood {
        self.signals.mood()
    }

    pub fn trend(&self) -> Trend {
        self.signals.trend()
    }

    pub fn signal_stats(&self) -> SignalStats {
        self.signals.stats()
    }
}

/// Outbound snapshot. Values are rounded to 4 decimals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicState {
    pub session_id: String,
    pub subject: Subject,
    pub turn: u64,
    pub hormones: HormoneVector,
    /// Hormone movement during this turn; zero for peeks
    pub hormone_delta: ChannelDelta<Hormone>,
    pub emotions: EmotionVector,
    pub dominant_emotion: Emotion,
    pub dominant_score: f32,
    pub emotion_blend: EmotionBlend,
    pub trust: f32,
    /// `trust * dominant_score`: how strongly the reply should express the emotion
    pub output_intensity: f32,
    pub mood: Mood,
    pub trend: Trend,
}

impl PublicState {
    /// Prompt fragment for the reply generator.
    pub fn describe_for_context(&self) -> String {
        let hormones: Vec<String> = self
            .hormones
            .iter()
            .map(|(h, v)| format!("{}={:.2}", h.name(), v))
            .collect();
        let blend = if self.emotion_blend.is_empty() {
            format!("{}({:.2})", self.dominant_emotion, self.dominant_score)
        } else {
            self.emotion_blend.to_string()
        };

        let mut lines = vec![
            match self.subject {
                Subject::Assistant => format!("[EVC STATE] Turn {}", self.turn),
                Subject::User => format!("[EVC USER STATE] Turn {}", self.turn),
            },
            format!("Hormones: {}", hormones.join(", ")),
            format!("Emotion: {}", blend),
            format!("Dominant: {} ({:.2})", self.dominant_emotion, self.dominant_score),
            format!("Trust: {:.2}", self.trust),
        ];
        match self.subject {
            Subject::Assistant => {
                lines.push(format!("Respond naturally with tone matching: {}", self.dominant_emotion));
            }
            Subject::User => {
                lines.push(format!("User mood: {} (trend: {})", self.mood, self.trend));
            }
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HormoneConfig;

    fn sample_state() -> SessionState {
        SessionState {
            session_id: "abc".into(),
            subject: Subject::Assistant,
            hormones: HormoneVector::from_array(HormoneConfig::default().baseline),
            trust: 0.5,
            memory: EmotionalMemory::zeros(),
            turn: 0,
            last_updated_at: None,
            signals: SignalHistory::default(),
        }
    }

    #[test]
    fn test_subject_round_trip() {
        assert_eq!("User".parse::<Subject>().unwrap(), Subject::User);
        assert_eq!(serde_json::to_string(&Subject::Assistant).unwrap(), "\"assistant\"");
        assert!("robot".parse::<Subject>().is_err());
    }

    #[test]
    fn test_session_state_json_is_lossless() {
        let mut state = sample_state();
        state.turn = 7;
        state.trust = 0.4321;
        state.last_updated_at = Some(1_700_000_000_000);
        state.memory.set(Emotion::Love, 0.25);

        let json = serde_json::to_string(&state).unwrap();
        let back: SessionState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_normalize_repairs_trust() {
        let mut state = sample_state();
        state.trust = f32::NAN;
        state.last_updated_at = Some(5);
        state.normalize(0.5);
        assert_eq!(state.trust, 0.5);
        assert_eq!(state.last_updated_at, None);

        state.trust = 7.0;
        state.normalize(0.5);
        assert_eq!(state.trust, 1.0);
    }

    #[test]
    fn test_missing_signal_history_defaults() {
        let state = sample_state();
        let mut value = serde_json::to_value(&state).unwrap();
        value.as_object_mut().unwrap().remove("signals");
        let back: SessionState = serde_json::from_value(value).unwrap();
        assert!(back.signals.is_empty());
    }
}
