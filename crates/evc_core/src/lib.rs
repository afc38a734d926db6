pub mod channel;
pub mod config;
pub mod dynamics;
pub mod emotion;
pub mod engine;
pub mod hormone;
pub mod signals;
pub mod state;
pub mod stimulus;
pub mod trust;

pub use channel::{Channel, ChannelDelta, ChannelVector, CHANNELS};
pub use config::{EvcConfig, Personality};
pub use dynamics::HormoneSystem;
pub use emotion::{Emotion, EmotionBlend, EmotionMapper, EmotionVector, EmotionalMemory};
pub use engine::AffectEngine;
pub use hormone::{Hormone, HormoneVector};
pub use signals::{Mood, SignalHistory, SignalRecord, SignalStats, Trend};
pub use state::{PublicState, SessionState, Subject};
pub use stimulus::Stimulus;
pub use trust::TrustTracker;
