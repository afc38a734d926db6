//! Evaluation mode: replay randomly drawn canned stimuli through one session
//! and summarize how the affective state moved.

use anyhow::{Context, Result};
use evc_core::{Channel, Emotion, EvcConfig, Hormone, PublicState, Stimulus, CHANNELS};
use evc_session::{ManualClock, MemoryStore, SessionManager};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

const SESSION: &str = "eval";
const EPOCH_MS: i64 = 1_700_000_000_000;
const JITTER: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Category {
    Positive,
    Neutral,
    SlightlyNegative,
    VeryNegative,
    Mixed,
}

impl Category {
    fn label(self) -> &'static str {
        match self {
            Category::Positive => "positive",
            Category::Neutral => "neutral",
            Category::SlightlyNegative => "slightly_negative",
            Category::VeryNegative => "very_negative",
            Category::Mixed => "mixed",
        }
    }
}

/// Canned (S, D, C) triples.
const PROBES: &[(Category, f32, f32, f32)] = &[
    (Category::Positive, 0.75, 0.05, 1.0),
    (Category::Positive, 0.80, 0.00, 1.0),
    (Category::Positive, 0.70, 0.00, 1.1),
    (Category::Positive, 0.65, 0.00, 1.0),
    (Category::Positive, 0.60, 0.00, 1.2),
    (Category::Positive, 0.85, 0.00, 1.3),
    (Category::Positive, 0.90, 0.00, 1.1),
    (Category::Positive, 0.55, 0.05, 1.0),
    (Category::Positive, 0.80, 0.00, 1.3),
    (Category::Positive, 0.75, 0.00, 1.0),
    (Category::Neutral, 0.30, 0.10, 1.0),
    (Category::Neutral, 0.25, 0.05, 0.8),
    (Category::Neutral, 0.15, 0.10, 1.0),
    (Category::Neutral, 0.20, 0.10, 0.8),
    (Category::Neutral, 0.20, 0.05, 0.9),
    (Category::Neutral, 0.15, 0.05, 0.7),
    (Category::Neutral, 0.10, 0.15, 0.9),
    (Category::Neutral, 0.10, 0.20, 1.0),
    (Category::Neutral, 0.15, 0.15, 1.0),
    (Category::Neutral, 0.20, 0.10, 1.0),
    (Category::SlightlyNegative, 0.05, 0.40, 1.0),
    (Category::SlightlyNegative, 0.00, 0.50, 1.1),
    (Category::SlightlyNegative, 0.05, 0.45, 1.0),
    (Category::SlightlyNegative, 0.00, 0.55, 1.1),
    (Category::SlightlyNegative, 0.00, 0.40, 0.9),
    (Category::SlightlyNegative, 0.00, 0.50, 1.0),
    (Category::VeryNegative, 0.00, 0.80, 1.2),
    (Category::VeryNegative, 0.00, 0.85, 1.3),
    (Category::VeryNegative, 0.00, 0.70, 1.1),
    (Category::VeryNegative, 0.00, 0.75, 1.2),
    (Category::VeryNegative, 0.00, 0.80, 1.2),
    (Category::Mixed, 0.30, 0.35, 1.0),
    (Category::Mixed, 0.40, 0.40, 1.0),
    (Category::Mixed, 0.35, 0.30, 1.0),
    (Category::Mixed, 0.25, 0.30, 1.0),
    (Category::Mixed, 0.30, 0.15, 0.9),
];

#[derive(Debug, Clone)]
pub struct EvalTurn {
    pub category: Category,
    pub stimulus: Stimulus,
    pub state: PublicState,
}

#[derive(Debug, Clone)]
pub struct EvalReport {
    pub seed: u64,
    pub turns: Vec<EvalTurn>,
}

impl EvalReport {
    pub fn final_trust(&self) -> Option<f32> {
        self.turns.last().map(|t| t.state.trust)
    }

    pub fn trust_range(&self) -> Option<(f32, f32)> {
        let mut iter = self.turns.iter().map(|t| t.state.trust);
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }

    pub fn dominant_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for t in &self.turns {
            *counts.entry(t.state.dominant_emotion.name()).or_insert(0) += 1;
        }
        counts
    }

    pub fn category_counts(&self) -> BTreeMap<Category, usize> {
        let mut counts = BTreeMap::new();
        for t in &self.turns {
            *counts.entry(t.category).or_insert(0) += 1;
        }
        counts
    }

    pub fn mean_hormones(&self) -> [f32; CHANNELS] {
        let mut sums = [0.0; CHANNELS];
        if self.turns.is_empty() {
            return sums;
        }
        for t in &self.turns {
            for (h, v) in t.state.hormones.iter() {
                sums[h.index()] += v;
            }
        }
        sums.map(|s| s / self.turns.len() as f32)
    }
}

/// Replay `turns` random probes through a fresh in-memory session. Each turn
/// is spaced one turn unit apart on a manual clock, so the run is fully
/// determined by `config` and `seed`.
pub async fn run_eval(config: EvcConfig, turns: usize, seed: u64) -> Result<EvalReport> {
    let turn_ms = (f64::from(config.session.turn_seconds) * 1000.0) as i64;
    let clock = Arc::new(ManualClock::new(EPOCH_MS));
    let manager = SessionManager::with_clock(config, Arc::new(MemoryStore::new()), clock.clone());
    let mut rng = StdRng::seed_from_u64(seed);

    let mut out = Vec::with_capacity(turns);
    for _ in 0..turns {
        let (category, s, d, c) = PROBES[rng.gen_range(0..PROBES.len())];
        let s = (s + rng.gen_range(-JITTER..=JITTER)).clamp(0.0, 1.0);
        let d = (d + rng.gen_range(-JITTER..=JITTER)).clamp(0.0, 1.0);
        let stimulus = Stimulus::new(s, d, c);

        let state = manager.apply_turn(SESSION, stimulus).await?;
        out.push(EvalTurn {
            category,
            stimulus,
            state,
        });
        clock.advance(turn_ms);
    }

    Ok(EvalReport { seed, turns: out })
}

pub fn print_report(report: &EvalReport, personality: &str) {
    let rule = "=".repeat(70);
    println!("{rule}");
    println!("  EVC EVALUATION");
    println!("  Personality: {personality}");
    println!("  Turns: {}", report.turns.len());
    println!("  Seed: {}", report.seed);
    println!("{rule}");

    for (i, t) in report.turns.iter().enumerate() {
        if i == 0 || (i + 1) % 10 == 0 {
            println!(
                "  Turn {:3}: S={:.2} D={:.2} C={:.2} | {} | Trust: {:.2}",
                t.state.turn,
                t.stimulus.positive,
                t.stimulus.negative,
                t.stimulus.context,
                t.state.emotion_blend,
                t.state.trust
            );
        }
    }

    println!("{rule}");
    if let (Some(last), Some((lo, hi))) = (report.final_trust(), report.trust_range()) {
        println!("  Final trust: {last:.3} (min {lo:.3}, max {hi:.3})");
    }
    println!("  Stimulus mix:");
    for (category, n) in report.category_counts() {
        println!("    {:<18} {n}", category.label());
    }
    println!("  Dominant emotions:");
    let mut dominant: Vec<_> = report.dominant_counts().into_iter().collect();
    dominant.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    for (name, n) in dominant {
        println!("    {name:<18} {n}");
    }
    println!("  Mean hormone levels:");
    let means = report.mean_hormones();
    for h in Hormone::ALL {
        println!("    {:<18} {:.3}", h.name(), means[h.index()]);
    }
}

/// One row per turn: stimulus, all hormone and emotion channels, dominant, trust.
pub fn write_csv(report: &EvalReport, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;

    let mut header: Vec<String> = ["turn", "category", "S", "D", "C"].iter().map(|s| s.to_string()).collect();
    header.extend(Hormone::ALL.iter().map(|h| h.name().to_string()));
    header.extend(Emotion::ALL.iter().map(|e| e.name().to_string()));
    header.extend(["dominant", "trust"].iter().map(|s| s.to_string()));
    writer.write_record(&header)?;

    for t in &report.turns {
        let mut row = vec![
            t.state.turn.to_string(),
            t.category.label().to_string(),
            format!("{:.4}", t.stimulus.positive),
            format!("{:.4}", t.stimulus.negative),
            format!("{:.4}", t.stimulus.context),
        ];
        row.extend(t.state.hormones.iter().map(|(_, v)| format!("{v:.4}")));
        row.extend(t.state.emotions.iter().map(|(_, v)| format!("{v:.4}")));
        row.push(t.state.dominant_emotion.to_string());
        row.push(format!("{:.4}", t.state.trust));
        writer.write_record(&row)?;
    }

    writer.flush().context("Failed to flush CSV file")?;
    tracing::info!("Wrote {} eval rows to {}", report.turns.len(), path.display());
    Ok(())
}
