// Timed motion plans for autonomous runs
//
// A Sequencer walks a Plan one step at a time against a caller-supplied
// clock reading. It never sleeps itself: the caller polls it, and it hands
// back an Emission only when the commanded power changes.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::kinematics::{MotionPrimitive, primitive_to_power};
use super::power::{MotorPowerVector, PowerLimit};
use crate::config::DEFAULT_BUDGET_MS;
use crate::error::ConfigError;

/// Side length in time for the single-lap square
pub const LONG_SQUARE_HOLD_MS: u64 = 2_000;

/// One motion held for a fixed time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanStep {
    pub primitive: MotionPrimitive,
    pub magnitude: f64,
    pub hold_ms: u64,
}

impl PlanStep {
    pub const fn new(primitive: MotionPrimitive, magnitude: f64, hold_ms: u64) -> Self {
        Self {
            primitive,
            magnitude,
            hold_ms,
        }
    }
}

/// Ordered steps plus a hard time budget for the whole run
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    steps: Vec<PlanStep>,
    budget_ms: u64,
    repeat: bool,
}

impl Plan {
    /// Build a validated plan.
    ///
    /// A repeating plan wraps back to its first step and only ends on the
    /// budget or a stop request.
    pub fn new(steps: Vec<PlanStep>, budget_ms: u64, repeat: bool) -> Result<Self, ConfigError> {
        for (i, step) in steps.iter().enumerate() {
            if !(0.0..=1.0).contains(&step.magnitude) {
                return Err(ConfigError::MagnitudeOutOfRange {
                    step: i,
                    magnitude: step.magnitude,
                });
            }
        }
        if repeat && !steps.is_empty() && steps.iter().all(|s| s.hold_ms == 0) {
            return Err(ConfigError::StalledRepeat);
        }
        Ok(Self {
            steps,
            budget_ms,
            repeat,
        })
    }

    /// Forward, right, back, left at full power, looped until the budget runs out
    pub fn square(hold_ms: u64, budget_ms: u64) -> Self {
        Self::full_power(
            &[
                MotionPrimitive::Forward,
                MotionPrimitive::StrafeRight,
                MotionPrimitive::Backward,
                MotionPrimitive::StrafeLeft,
            ],
            hold_ms,
            budget_ms,
            hold_ms > 0,
        )
    }

    /// One lap of the square, run once
    pub fn long_square(hold_ms: u64) -> Self {
        Self::full_power(
            &[
                MotionPrimitive::Forward,
                MotionPrimitive::StrafeRight,
                MotionPrimitive::Backward,
                MotionPrimitive::StrafeLeft,
            ],
            hold_ms,
            DEFAULT_BUDGET_MS,
            false,
        )
    }

    /// Two mirrored squares sharing the start corner, looped for up to 30s
    pub fn double_square(hold_ms: u64) -> Self {
        use MotionPrimitive::*;
        Self::full_power(
            &[
                Forward,
                StrafeRight,
                Backward,
                StrafeLeft,
                Backward,
                StrafeRight,
                Forward,
                StrafeLeft,
            ],
            hold_ms,
            30_000,
            hold_ms > 0,
        )
    }

    fn full_power(primitives: &[MotionPrimitive], hold_ms: u64, budget_ms: u64, repeat: bool) -> Self {
        Self {
            steps: primitives
                .iter()
                .map(|&p| PlanStep::new(p, 1.0, hold_ms))
                .collect(),
            budget_ms,
            repeat,
        }
    }

    /// Parse a plan from JSON, e.g.
    /// `{"budget_ms": 5000, "steps": [{"primitive": "forward", "hold_ms": 1000}]}`
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let file: PlanFile = serde_json::from_str(text)?;
        file.into_plan()
    }

    /// Read and parse a JSON plan file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadPlan {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Same steps under a different time budget
    pub fn with_budget(self, budget_ms: u64) -> Self {
        Self { budget_ms, ..self }
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn budget_ms(&self) -> u64 {
        self.budget_ms
    }

    pub fn repeats(&self) -> bool {
        self.repeat
    }

    /// Sum of all step holds for one pass
    pub fn total_hold_ms(&self) -> u64 {
        self.steps.iter().map(|s| s.hold_ms).sum()
    }
}

// On-disk form. Durations are signed so a negative value reaches validation
// instead of failing as a type mismatch.
#[derive(Debug, Deserialize)]
struct PlanFile {
    steps: Vec<StepFile>,
    #[serde(default = "default_budget")]
    budget_ms: i64,
    #[serde(default)]
    repeat: bool,
}

#[derive(Debug, Deserialize)]
struct StepFile {
    primitive: MotionPrimitive,
    #[serde(default = "full_magnitude")]
    magnitude: f64,
    hold_ms: i64,
}

fn default_budget() -> i64 {
    DEFAULT_BUDGET_MS as i64
}

fn full_magnitude() -> f64 {
    1.0
}

impl PlanFile {
    fn into_plan(self) -> Result<Plan, ConfigError> {
        let budget_ms = u64::try_from(self.budget_ms).map_err(|_| ConfigError::NegativeBudget {
            budget_ms: self.budget_ms,
        })?;

        let steps = self
            .steps
            .into_iter()
            .enumerate()
            .map(|(i, s)| {
                let hold_ms = u64::try_from(s.hold_ms).map_err(|_| ConfigError::NegativeHold {
                    step: i,
                    hold_ms: s.hold_ms,
                })?;
                Ok(PlanStep::new(s.primitive, s.magnitude, hold_ms))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Plan::new(steps, budget_ms, self.repeat)
    }
}

/// Why a run ended. None of these are failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Completed,
    BudgetExpired,
    StopRequested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    Idle,
    Running { step: usize },
    Stopped(StopReason),
}

/// A power command produced by a sequencer transition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Emission {
    pub primitive: MotionPrimitive,
    pub power: MotorPowerVector,
    /// Plan index, `None` for the final stop
    pub step: Option<usize>,
    /// Milliseconds since the run started
    pub at_ms: u64,
}

pub struct Sequencer {
    plan: Plan,
    limit: PowerLimit,
    state: SequencerState,
    started_at_ms: u64,
    step_started_at_ms: u64,
}

impl Sequencer {
    pub fn new(plan: Plan, limit: PowerLimit) -> Self {
        Self {
            plan,
            limit,
            state: SequencerState::Idle,
            started_at_ms: 0,
            step_started_at_ms: 0,
        }
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    /// Leave Idle and command the first step.
    ///
    /// Returns `None` if the sequencer has already been started.
    pub fn start(&mut self, now_ms: u64, stop_requested: bool) -> Option<Emission> {
        if self.state != SequencerState::Idle {
            debug!("Sequencer already started ({:?})", self.state);
            return None;
        }

        info!(
            "Sequencer started: {} steps, {}ms budget{}",
            self.plan.steps.len(),
            self.plan.budget_ms,
            if self.plan.repeat { ", repeating" } else { "" }
        );
        self.started_at_ms = now_ms;

        let emission = if stop_requested {
            self.stop(now_ms, StopReason::StopRequested)
        } else if self.plan.budget_ms == 0 {
            self.stop(now_ms, StopReason::BudgetExpired)
        } else if self.plan.steps.is_empty() {
            self.stop(now_ms, StopReason::Completed)
        } else {
            self.enter(0, now_ms)
        };
        Some(emission)
    }

    /// Advance against the clock.
    ///
    /// The budget is checked on every poll and cuts a hold short. A stop
    /// request only takes effect once the current hold has finished.
    pub fn poll(&mut self, now_ms: u64, stop_requested: bool) -> Option<Emission> {
        let SequencerState::Running { step } = self.state else {
            return None;
        };

        if now_ms.saturating_sub(self.started_at_ms) >= self.plan.budget_ms {
            return Some(self.stop(now_ms, StopReason::BudgetExpired));
        }

        let hold_ms = self.plan.steps[step].hold_ms;
        if now_ms.saturating_sub(self.step_started_at_ms) < hold_ms {
            return None;
        }

        if stop_requested {
            return Some(self.stop(now_ms, StopReason::StopRequested));
        }

        let next = step + 1;
        if next < self.plan.steps.len() {
            Some(self.enter(next, now_ms))
        } else if self.plan.repeat {
            Some(self.enter(0, now_ms))
        } else {
            Some(self.stop(now_ms, StopReason::Completed))
        }
    }

    /// Clock reading at which the next transition is due, while running
    pub fn next_deadline_ms(&self) -> Option<u64> {
        let SequencerState::Running { step } = self.state else {
            return None;
        };
        let budget_end = self.started_at_ms.saturating_add(self.plan.budget_ms);
        let hold_end = self
            .step_started_at_ms
            .saturating_add(self.plan.steps[step].hold_ms);
        Some(budget_end.min(hold_end))
    }

    fn enter(&mut self, step: usize, now_ms: u64) -> Emission {
        let PlanStep {
            primitive,
            magnitude,
            hold_ms,
        } = self.plan.steps[step];
        debug!("Step {}: {} at {} for {}ms", step, primitive, magnitude, hold_ms);

        self.state = SequencerState::Running { step };
        self.step_started_at_ms = now_ms;
        Emission {
            primitive,
            power: self.limit.clamp(primitive_to_power(primitive, magnitude)),
            step: Some(step),
            at_ms: now_ms.saturating_sub(self.started_at_ms),
        }
    }

    fn stop(&mut self, now_ms: u64, reason: StopReason) -> Emission {
        let at_ms = now_ms.saturating_sub(self.started_at_ms);
        info!("Sequencer stopped after {}ms: {:?}", at_ms, reason);

        self.state = SequencerState::Stopped(reason);
        Emission {
            primitive: MotionPrimitive::Stop,
            power: MotorPowerVector::zero(),
            step: None,
            at_ms,
        }
    }
}
