//! Emotion Mapper
//!
//! Emotions are a linear read-out of the hormone vector through a fixed 8x8
//! weight matrix (rows = emotions, columns = hormones), blended with the
//! carried emotional memory so affect has continuity across turns.
//!
//! The result is a blend, not a distribution: channels are clamped to [0, 1]
//! individually and several may be high at once.

use crate::channel::{round_to, Channel, ChannelVector, CHANNELS};
use crate::config::{complete_priority, EmotionConfig, Matrix8};
use crate::hormone::HormoneVector;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Emotion {
    Joy,
    Serenity,
    Love,
    Excitement,
    Sadness,
    Fear,
    Anger,
    Surprise,
}

impl Channel for Emotion {
    const ALL: [Self; CHANNELS] = [
        Emotion::Joy,
        Emotion::Serenity,
        Emotion::Love,
        Emotion::Excitement,
        Emotion::Sadness,
        Emotion::Fear,
        Emotion::Anger,
        Emotion::Surprise,
    ];

    fn name(self) -> &'static str {
        match self {
            Emotion::Joy => "Joy",
            Emotion::Serenity => "Serenity",
            Emotion::Love => "Love",
            Emotion::Excitement => "Excitement",
            Emotion::Sadness => "Sadness",
            Emotion::Fear => "Fear",
            Emotion::Anger => "Anger",
            Emotion::Surprise => "Surprise",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl Emotion {
    /// Whether the emotion reads as pleasant.
    pub fn is_positive(self) -> bool {
        matches!(
            self,
            Emotion::Joy | Emotion::Serenity | Emotion::Love | Emotion::Excitement
        )
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Derived emotion intensities, each in [0, 1].
pub type EmotionVector = ChannelVector<Emotion>;

/// Exponential moving average of past emotion vectors ("mood").
pub type EmotionalMemory = ChannelVector<Emotion>;

/// Ordered top contributors, e.g. `Serenity(0.30) + Love(0.20) + Joy(0.15)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmotionBlend(pub Vec<(Emotion, f32)>);

impl EmotionBlend {
    pub fn entries(&self) -> &[(Emotion, f32)] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for EmotionBlend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (emotion, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" + ")?;
            }
            write!(f, "{}({:.2})", emotion, value)?;
        }
        Ok(())
    }
}

/// Serialized as the joined label string.
impl Serialize for EmotionBlend {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Converts hormone vectors into emotion vectors and ranks them.
#[derive(Debug, Clone)]
pub struct EmotionMapper {
    weights: Matrix8,
    memory_inertia: f32,
    priority: Vec<Emotion>,
    blend_threshold: f32,
    blend_top_n: usize,
}

impl Default for EmotionMapper {
    fn default() -> Self {
        Self::from_config(&EmotionConfig::default())
    }
}

impl EmotionMapper {
    pub fn from_config(config: &EmotionConfig) -> Self {
        Self {
            weights: config.weights,
            memory_inertia: config.memory_inertia,
            priority: complete_priority(&config.priority),
            blend_threshold: config.blend_threshold,
            blend_top_n: config.blend_top_n,
        }
    }

    /// Unclamped `W x H`.
    pub fn raw_scores(&self, hormones: &HormoneVector) -> [f32; CHANNELS] {
        let h = hormones.to_array();
        let mut out = [0.0; CHANNELS];
        for (score, row) in out.iter_mut().zip(self.weights.iter()) {
            *score = row.iter().zip(h.iter()).map(|(w, x)| w * x).sum();
        }
        out
    }

    /// Map hormones to emotions, carrying `memory` with a fixed inertia.
    pub fn map(&self, hormones: &HormoneVector, memory: &EmotionalMemory) -> EmotionVector {
        let raw = self.raw_scores(hormones);
        let carried = memory.to_array();
        let w = self.memory_inertia;
        let mut blended = [0.0; CHANNELS];
        for i in 0..CHANNELS {
            blended[i] = (1.0 - w) * raw[i] + w * carried[i];
        }
        EmotionVector::from_array(blended)
    }

    /// Arg-max; ties go to the emotion listed first in the priority order.
    pub fn dominant(&self, emotions: &EmotionVector) -> (Emotion, f32) {
        let mut best = (self.priority[0], emotions[self.priority[0]]);
        for &e in &self.priority[1..] {
            if emotions[e] > best.1 {
                best = (e, emotions[e]);
            }
        }
        best
    }

    /// Top `top_n` channels at or above the blend threshold, strongest first.
    pub fn blend_description(&self, emotions: &EmotionVector, top_n: usize) -> EmotionBlend {
        // Priority order first so the stable sort keeps tie-break order.
        let mut ranked: Vec<(Emotion, f32)> = self
            .priority
            .iter()
            .map(|&e| (e, emotions[e]))
            .filter(|(_, v)| *v >= self.blend_threshold)
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(top_n);
        EmotionBlend(
            ranked
                .into_iter()
                .map(|(e, v)| (e, round_to(v, 4)))
                .collect(),
        )
    }

    /// Blend with the configured `top_n`.
    pub fn blend(&self, emotions: &EmotionVector) -> EmotionBlend {
        self.blend_description(emotions, self.blend_top_n)
    }
}
