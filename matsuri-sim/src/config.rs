//! Runner settings and per-step performance budget.
//!
//! Simulation tuning lives in `matsuri_core::config::MatsuriConfig`. This
//! module only adds what the run-loop itself needs: where to find the TOML
//! file, how fast to step, how long to run, and the step time budget.

use std::path::PathBuf;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Runner settings
// ---------------------------------------------------------------------------

/// Settings for the runner binary, read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerConfig {
    /// Path of `matsuri.toml`; built-in defaults when absent.
    pub config_path: Option<PathBuf>,
    /// Emit JSON log lines instead of human-readable ones.
    pub json_logs: bool,
    /// Virtual seconds per step.
    pub step_secs: f32,
    /// Stop after this many virtual seconds; run until Ctrl-C when absent.
    pub run_secs: Option<f32>,
    /// Interval between debug dumps, in virtual seconds. Zero disables.
    pub debug_dump_secs: f32,
    /// Wall-clock budget for one step, in milliseconds.
    pub step_budget_ms: f64,
}

/// Longest accepted step, in seconds.
const MAX_STEP_SECS: f32 = 1.0;

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            config_path: None,
            json_logs: false,
            step_secs: 1.0 / 30.0,
            run_secs: None,
            debug_dump_secs: 30.0,
            step_budget_ms: 2.0,
        }
    }
}

impl RunnerConfig {
    /// Read `MATSURI_CONFIG`, `MATSURI_LOG_JSON`, `MATSURI_STEP_SECS`,
    /// `MATSURI_RUN_SECS`, `MATSURI_DEBUG_DUMP_SECS` and
    /// `MATSURI_STEP_BUDGET_MS`. Unset or unparsable values keep defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`RunnerConfig::from_env`] with an arbitrary lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse_f32 = |key: &str| lookup(key).and_then(|v| v.trim().parse::<f32>().ok());
        Self {
            config_path: lookup("MATSURI_CONFIG").filter(|p| !p.is_empty()).map(PathBuf::from),
            json_logs: lookup("MATSURI_LOG_JSON")
                .is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")),
            step_secs: parse_f32("MATSURI_STEP_SECS")
                .filter(|s| s.is_finite() && *s > 0.0 && *s <= MAX_STEP_SECS)
                .unwrap_or(defaults.step_secs),
            run_secs: parse_f32("MATSURI_RUN_SECS").filter(|s| s.is_finite() && *s > 0.0),
            debug_dump_secs: parse_f32("MATSURI_DEBUG_DUMP_SECS")
                .filter(|s| s.is_finite() && *s >= 0.0)
                .unwrap_or(defaults.debug_dump_secs),
            step_budget_ms: lookup("MATSURI_STEP_BUDGET_MS")
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|b| b.is_finite() && *b > 0.0)
                .unwrap_or(defaults.step_budget_ms),
        }
    }

    /// Step length as a [`Duration`].
    #[must_use]
    pub fn step(&self) -> Duration {
        Duration::try_from_secs_f32(self.step_secs).unwrap_or(Duration::from_millis(33))
    }
}

// ---------------------------------------------------------------------------
// Performance Budget Tracker
// ---------------------------------------------------------------------------

/// Wall-clock time spent in each phase of one simulation step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PerformanceBudget {
    /// Applying drained completions (μs).
    pub inbox_us: u64,
    /// Health polling (μs).
    pub health_us: u64,
    /// Motion update (μs).
    pub motion_us: u64,
    /// Proximity scan and session opening (μs).
    pub claims_us: u64,
    /// Turn scheduling and closures (μs).
    pub dialog_us: u64,
    /// Bubble animation and presentation pushes (μs).
    pub bubbles_us: u64,
    /// Shipping outbound requests (μs).
    pub flush_us: u64,
    /// Characters in the world this step.
    pub active_agents: u32,
    /// Completions applied this step.
    pub completions: u32,
}

impl PerformanceBudget {
    /// Total time spent this step (μs).
    #[must_use]
    pub fn total_us(&self) -> u64 {
        self.inbox_us
            + self.health_us
            + self.motion_us
            + self.claims_us
            + self.dialog_us
            + self.bubbles_us
            + self.flush_us
    }

    /// Whether the step stayed under `budget_ms`.
    #[must_use]
    pub fn within_budget(&self, budget_ms: f64) -> bool {
        (self.total_us() as f64) < budget_ms * 1000.0
    }

    /// Reset counters for a new step.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Microseconds elapsed since `start`, saturating.
pub(crate) fn elapsed_us(start: std::time::Instant) -> u64 {
    u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX)
}
