//! Stimulus history and the coarse mood/trend read-outs derived from it.

use crate::channel::round_to;
use crate::stimulus::Stimulus;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

const STRESSED_D: f32 = 0.45;
const VERY_STRESSED_D: f32 = 0.65;
const HAPPY_S: f32 = 0.55;
const VERY_HAPPY_S: f32 = 0.70;
const NEUTRAL_MARGIN: f32 = 0.15;

const RECENT_WINDOW: usize = 5;
const OLDER_WINDOW: usize = 15;
const TREND_THRESHOLD: f32 = 0.12;

/// One turn's (sanitized) stimulus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub turn: u64,
    pub positive: f32,
    pub negative: f32,
    pub context: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    VeryStressed,
    Stressed,
    VeryHappy,
    Happy,
    Neutral,
    SlightlyPositive,
    SlightlyNegative,
    /// No signals recorded yet
    Unknown,
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mood::VeryStressed => "very stressed",
            Mood::Stressed => "stressed",
            Mood::VeryHappy => "very happy",
            Mood::Happy => "happy",
            Mood::Neutral => "neutral",
            Mood::SlightlyPositive => "slightly positive",
            Mood::SlightlyNegative => "slightly negative",
            Mood::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Worsening,
    Stable,
    /// Fewer than `RECENT_WINDOW + 2` records
    Insufficient,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Trend::Improving => "improving",
            Trend::Worsening => "worsening",
            Trend::Stable => "stable",
            Trend::Insufficient => "insufficient data",
        };
        f.write_str(s)
    }
}

/// Averages over the whole retained history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SignalStats {
    pub avg_positive: f32,
    pub avg_negative: f32,
    pub avg_context: f32,
    pub count: usize,
}

/// Bounded FIFO of recent signals; the oldest record is dropped first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalHistory {
    capacity: usize,
    records: VecDeque<SignalRecord>,
}

impl Default for SignalHistory {
    fn default() -> Self {
        Self::with_capacity(50)
    }
}

impl SignalHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: VecDeque::with_capacity(capacity),
        }
    }

    pub fn record(&mut self, turn: u64, stimulus: &Stimulus) {
        // A deserialized record may carry capacity 0
        while self.records.len() >= self.capacity.max(1) {
            self.records.pop_front();
        }
        self.records.push_back(SignalRecord {
            turn,
            positive: round_to(stimulus.positive, 4),
            negative: round_to(stimulus.negative, 4),
            context: round_to(stimulus.context, 4),
        });
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Resize after loading a record written under a different config.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.records.len() > self.capacity {
            self.records.pop_front();
        }
    }

    pub fn records(&self) -> impl Iterator<Item = &SignalRecord> + '_ {
        self.records.iter()
    }

    /// The last `n` records, oldest first.
    pub fn recent(&self, n: usize) -> Vec<SignalRecord> {
        let skip = self.records.len().saturating_sub(n);
        self.records.iter().skip(skip).copied().collect()
    }

    /// Mood over the recent window.
    pub fn mood(&self) -> Mood {
        if self.records.is_empty() {
            return Mood::Unknown;
        }
        let recent = self.recent(RECENT_WINDOW);
        let s = avg(&recent, |r| r.positive);
        let d = avg(&recent, |r| r.negative);

        if d >= STRESSED_D && d > s {
            if d >= VERY_STRESSED_D {
                Mood::VeryStressed
            } else {
                Mood::Stressed
            }
        } else if s >= HAPPY_S && s > d {
            if s >= VERY_HAPPY_S {
                Mood::VeryHappy
            } else {
                Mood::Happy
            }
        } else if (s - d).abs() < NEUTRAL_MARGIN {
            Mood::Neutral
        } else if s > d {
            Mood::SlightlyPositive
        } else {
            Mood::SlightlyNegative
        }
    }

    /// Net positivity (S - D) of the recent window against the window before it.
    pub fn trend(&self) -> Trend {
        let n = self.records.len();
        if n < RECENT_WINDOW + 2 {
            return Trend::Insufficient;
        }
        let all: Vec<SignalRecord> = self.records.iter().copied().collect();
        let recent = &all[n - RECENT_WINDOW..];
        let older = &all[n.saturating_sub(OLDER_WINDOW)..n - RECENT_WINDOW];

        let positivity = |rs: &[SignalRecord]| avg(rs, |r| r.positive) - avg(rs, |r| r.negative);
        let diff = positivity(recent) - positivity(older);

        if diff > TREND_THRESHOLD {
            Trend::Improving
        } else if diff < -TREND_THRESHOLD {
            Trend::Worsening
        } else {
            Trend::Stable
        }
    }

    pub fn stats(&self) -> SignalStats {
        let all: Vec<SignalRecord> = self.records.iter().copied().collect();
        if all.is_empty() {
            return SignalStats {
                avg_positive: 0.0,
                avg_negative: 0.0,
                avg_context: 1.0,
                count: 0,
            };
        }
        SignalStats {
            avg_positive: round_to(avg(&all, |r| r.positive), 3),
            avg_negative: round_to(avg(&all, |r| r.negative), 3),
            avg_context: round_to(avg(&all, |r| r.context), 3),
            count: all.len(),
        }
    }
}

fn avg(records: &[SignalRecord], field: impl Fn(&SignalRecord) -> f32) -> f32 {
    if records.is_empty() {
        return 0.0;
    }
    records.iter().map(field).sum::<f32>() / records.len() as f32
}
