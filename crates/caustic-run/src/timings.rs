//! Wall-clock time spent in each pipeline stage.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Initialization,
    Density,
    Transforms,
    CollapseTimes,
    Displacements,
    Sorting,
    Fragmentation,
    Io,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::Initialization,
        Stage::Density,
        Stage::Transforms,
        Stage::CollapseTimes,
        Stage::Displacements,
        Stage::Sorting,
        Stage::Fragmentation,
        Stage::Io,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Stage::Initialization => "initialization",
            Stage::Density => "density",
            Stage::Transforms => "transforms",
            Stage::CollapseTimes => "collapse times",
            Stage::Displacements => "displacements",
            Stage::Sorting => "sorting",
            Stage::Fragmentation => "fragmentation",
            Stage::Io => "i/o",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Accumulated durations; a stage may be entered several times.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Timings {
    spent: [Duration; 8],
}

impl Timings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, stage: Stage, elapsed: Duration) {
        self.spent[stage as usize] += elapsed;
    }

    /// Run `f`, charging its wall-clock time to `stage`.
    pub fn time<T>(&mut self, stage: Stage, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        self.add(stage, start.elapsed());
        out
    }

    pub fn get(&self, stage: Stage) -> Duration {
        self.spent[stage as usize]
    }

    pub fn total(&self) -> Duration {
        self.spent.iter().sum()
    }

    /// `(stage, time, percent of total)` for every stage.
    pub fn report(&self) -> Vec<(Stage, Duration, f64)> {
        let total = self.total().as_secs_f64();
        Stage::ALL
            .iter()
            .map(|&stage| {
                let spent = self.get(stage);
                let share = if total > 0.0 {
                    100.0 * spent.as_secs_f64() / total
                } else {
                    0.0
                };
                (stage, spent, share)
            })
            .collect()
    }

    pub fn log(&self) {
        for (stage, spent, share) in self.report() {
            info!(stage = %stage, seconds = spent.as_secs_f64(), percent = format_args!("{share:.1}"), "stage time");
        }
        info!(seconds = self.total().as_secs_f64(), "total time");
    }
}
