// Mode loops: autonomous plan or manual joystick, exactly one per run.
//
// Both loops are single-threaded and cooperative. The only place they yield
// is LifecycleGate::idle, so the environment's heartbeat keeps running
// while a step is held.

use std::time::Duration;

use tracing::{info, warn};

use crate::config::TICK;
use crate::drive::{
    Emission, ManualDriver, MotionPrimitive, MotorPowerVector, Plan, PowerLimit, Sequencer,
    SequencerState, StopReason,
};
use crate::error::RuntimeError;
use crate::io::{Clock, IntentSource, LifecycleGate, MotorSink, Telemetry};
use crate::messages::TelemetryFrame;
use crate::transport::{
    MonotonicClock, ZenohIntentSource, ZenohLifecycle, ZenohMotorSink, ZenohTelemetry,
};

/// Which loop to run
#[derive(Debug, Clone)]
pub enum Mode {
    Manual,
    Autonomous(Plan),
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub mode: Mode,
    pub limit: PowerLimit,
    /// Skip waiting for the operator's start signal
    pub autostart: bool,
    /// Publish telemetry frames
    pub telemetry: bool,
}

/// Run a plan to completion, budget expiry or a stop request.
///
/// Always ends by commanding zero power, whichever way the run stops.
pub async fn run_autonomous<C, G, S, T>(
    sequencer: &mut Sequencer,
    clock: &C,
    gate: &mut G,
    sink: &mut S,
    telemetry: &mut T,
) -> Result<StopReason, RuntimeError>
where
    C: Clock,
    G: LifecycleGate,
    S: MotorSink,
    T: Telemetry,
{
    info!("Autonomous mode: waiting for start signal...");
    gate.wait_for_start().await?;

    let stop_requested = gate.is_stop_requested();
    let mut pending = sequencer.start(clock.elapsed_millis(), stop_requested);
    let mut last = MotorPowerVector::zero();

    loop {
        // Zero-length holds can produce several transitions back to back
        while let Some(emission) = pending {
            emit(sink, telemetry, &mut last, &emission).await?;
            pending = sequencer.poll(clock.elapsed_millis(), gate.is_stop_requested());
        }

        if let SequencerState::Stopped(reason) = sequencer.state() {
            return Ok(reason);
        }

        let now = clock.elapsed_millis();
        let wait = match sequencer.next_deadline_ms() {
            Some(deadline) => Duration::from_millis(deadline.saturating_sub(now)).min(TICK),
            None => TICK,
        };
        gate.idle(wait).await;

        pending = sequencer.poll(clock.elapsed_millis(), gate.is_stop_requested());
    }
}

async fn emit<S, T>(
    sink: &mut S,
    telemetry: &mut T,
    last: &mut MotorPowerVector,
    emission: &Emission,
) -> Result<(), RuntimeError>
where
    S: MotorSink,
    T: Telemetry,
{
    command(sink, last, emission.power).await?;
    telemetry
        .record(&TelemetryFrame {
            label: emission.primitive.to_string(),
            power: emission.power,
            primitive: Some(emission.primitive),
            run_time_ms: emission.at_ms,
        })
        .await;
    Ok(())
}

/// Send one power command. `last` tracks what the wheels were last told.
///
/// A failed command is not resent. The wheels may still be running at
/// `last`, so the warning names it.
async fn command<S: MotorSink>(
    sink: &mut S,
    last: &mut MotorPowerVector,
    power: MotorPowerVector,
) -> Result<(), RuntimeError> {
    if let Err(e) = sink.apply(power).await {
        warn!(
            "Motor sink failed to apply {:?}, last commanded power was {:?}",
            power, last
        );
        return Err(e);
    }
    *last = power;
    Ok(())
}

/// Drive from joystick intent once per tick until a stop is requested
pub async fn run_manual<C, G, I, S, T>(
    driver: &ManualDriver,
    clock: &C,
    gate: &mut G,
    input: &mut I,
    sink: &mut S,
    telemetry: &mut T,
) -> Result<(), RuntimeError>
where
    C: Clock,
    G: LifecycleGate,
    I: IntentSource,
    S: MotorSink,
    T: Telemetry,
{
    info!("Manual mode: waiting for start signal...");
    gate.wait_for_start().await?;
    let started_at = clock.elapsed_millis();
    let mut last = MotorPowerVector::zero();

    while !gate.is_stop_requested() {
        let power = driver.tick(input.read_continuous_intent());
        command(sink, &mut last, power).await?;
        telemetry
            .record(&TelemetryFrame {
                label: "manual".to_string(),
                power,
                primitive: None,
                run_time_ms: clock.elapsed_millis().saturating_sub(started_at),
            })
            .await;
        gate.idle(TICK).await;
    }

    info!("Stop requested, stopping robot");
    let zero = MotorPowerVector::zero();
    command(sink, &mut last, zero).await?;
    telemetry
        .record(&TelemetryFrame {
            label: MotionPrimitive::Stop.to_string(),
            power: zero,
            primitive: Some(MotionPrimitive::Stop),
            run_time_ms: clock.elapsed_millis().saturating_sub(started_at),
        })
        .await;
    Ok(())
}

/// Open a zenoh session and run the selected mode against it
pub async fn run(config: RunConfig) -> Result<(), RuntimeError> {
    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default())
        .await
        .map_err(RuntimeError::Transport)?;

    info!("Setting up publishers and subscribers...");
    let clock = MonotonicClock::new();
    let mut gate = ZenohLifecycle::declare(&session, config.autostart).await?;
    let mut sink = ZenohMotorSink::declare(&session).await?;
    let mut telemetry = ZenohTelemetry::declare(&session, config.telemetry).await?;

    info!(
        "Runtime started: {}ms tick, wheel power limited to {}",
        TICK.as_millis(),
        config.limit.max()
    );

    match config.mode {
        Mode::Autonomous(plan) => {
            let mut sequencer = Sequencer::new(plan, config.limit);
            let reason =
                run_autonomous(&mut sequencer, &clock, &mut gate, &mut sink, &mut telemetry)
                    .await?;
            info!("Autonomous run finished: {:?}", reason);
        }
        Mode::Manual => {
            let driver = ManualDriver::new(config.limit);
            let mut input = ZenohIntentSource::declare(&session).await?;
            run_manual(
                &driver,
                &clock,
                &mut gate,
                &mut input,
                &mut sink,
                &mut telemetry,
            )
            .await?;
        }
    }

    if let Err(e) = session.close().await {
        warn!("Failed to close Zenoh session: {}", e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::drive::{ContinuousIntent, PlanStep};

    #[derive(Clone, Default)]
    struct FakeClock(Rc<Cell<u64>>);

    impl Clock for FakeClock {
        fn elapsed_millis(&self) -> u64 {
            self.0.get()
        }
    }

    /// Advances the shared clock on idle; raises stop once `stop_at` is reached
    struct FakeGate {
        clock: FakeClock,
        stop_at: Option<u64>,
        started: bool,
    }

    impl FakeGate {
        fn new(clock: &FakeClock, stop_at: Option<u64>) -> Self {
            Self {
                clock: clock.clone(),
                stop_at,
                started: false,
            }
        }
    }

    impl LifecycleGate for FakeGate {
        async fn wait_for_start(&mut self) -> Result<(), RuntimeError> {
            self.started = true;
            Ok(())
        }

        fn is_stop_requested(&mut self) -> bool {
            self.stop_at
                .is_some_and(|t| self.clock.elapsed_millis() >= t)
        }

        async fn idle(&mut self, max_wait: Duration) {
            let now = self.clock.0.get();
            self.clock.0.set(now + max_wait.as_millis() as u64);
        }
    }

    struct RecordingSink {
        clock: FakeClock,
        applied: Vec<(u64, MotorPowerVector)>,
    }

    impl RecordingSink {
        fn new(clock: &FakeClock) -> Self {
            Self {
                clock: clock.clone(),
                applied: Vec::new(),
            }
        }
    }

    impl MotorSink for RecordingSink {
        async fn apply(&mut self, power: MotorPowerVector) -> Result<(), RuntimeError> {
            self.applied.push((self.clock.elapsed_millis(), power));
            Ok(())
        }
    }

    /// Accepts `ok_calls` commands, then fails every one after
    struct FailingSink {
        ok_calls: usize,
        calls: usize,
    }

    impl MotorSink for FailingSink {
        async fn apply(&mut self, _power: MotorPowerVector) -> Result<(), RuntimeError> {
            self.calls += 1;
            if self.calls > self.ok_calls {
                return Err(RuntimeError::Transport("motor link down".into()));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingTelemetry {
        frames: Vec<TelemetryFrame>,
    }

    impl Telemetry for RecordingTelemetry {
        async fn record(&mut self, frame: &TelemetryFrame) {
            self.frames.push(frame.clone());
        }
    }

    struct FixedIntent(ContinuousIntent);

    impl IntentSource for FixedIntent {
        fn read_continuous_intent(&mut self) -> ContinuousIntent {
            self.0
        }
    }

    fn four_step_plan(hold_ms: u64, budget_ms: u64) -> Plan {
        Plan::new(
            vec![
                PlanStep::new(MotionPrimitive::Forward, 1.0, hold_ms),
                PlanStep::new(MotionPrimitive::StrafeRight, 1.0, hold_ms),
                PlanStep::new(MotionPrimitive::Backward, 1.0, hold_ms),
                PlanStep::new(MotionPrimitive::StrafeLeft, 1.0, hold_ms),
            ],
            budget_ms,
            false,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_plan_runs_every_step_then_zero() {
        let clock = FakeClock::default();
        let mut gate = FakeGate::new(&clock, None);
        let mut sink = RecordingSink::new(&clock);
        let mut telemetry = RecordingTelemetry::default();
        let mut sequencer = Sequencer::new(four_step_plan(1000, 10_000), PowerLimit::default());

        let reason = run_autonomous(&mut sequencer, &clock, &mut gate, &mut sink, &mut telemetry)
            .await
            .unwrap();

        assert!(gate.started);
        assert_eq!(reason, StopReason::Completed);
        assert_eq!(sink.applied.len(), 5);
        for (_, power) in &sink.applied[..4] {
            assert!(!power.is_zero());
        }
        let (stopped_at, last) = sink.applied[4];
        assert!(last.is_zero());
        assert!(stopped_at >= 4000, "stopped at {}ms", stopped_at);

        let labels: Vec<&str> = telemetry.frames.iter().map(|f| f.label.as_str()).collect();
        assert_eq!(
            labels,
            ["forward", "strafe_right", "backward", "strafe_left", "stop"]
        );
    }

    #[tokio::test]
    async fn test_budget_stops_run_with_steps_left() {
        let clock = FakeClock::default();
        let mut gate = FakeGate::new(&clock, None);
        let mut sink = RecordingSink::new(&clock);
        let mut sequencer = Sequencer::new(four_step_plan(1000, 2500), PowerLimit::default());

        let reason = run_autonomous(
            &mut sequencer,
            &clock,
            &mut gate,
            &mut sink,
            &mut RecordingTelemetry::default(),
        )
        .await
        .unwrap();

        assert_eq!(reason, StopReason::BudgetExpired);
        assert_eq!(sink.applied.len(), 4);
        let (stopped_at, last) = *sink.applied.last().unwrap();
        assert!(last.is_zero());
        assert!(stopped_at <= 2500, "stopped at {}ms", stopped_at);
    }

    #[tokio::test]
    async fn test_stop_request_skips_remaining_steps() {
        let clock = FakeClock::default();
        // Operator stops during step 1, so step 2 never starts
        let mut gate = FakeGate::new(&clock, Some(1500));
        let mut sink = RecordingSink::new(&clock);
        let mut telemetry = RecordingTelemetry::default();
        let mut sequencer = Sequencer::new(four_step_plan(1000, 10_000), PowerLimit::default());

        let reason = run_autonomous(&mut sequencer, &clock, &mut gate, &mut sink, &mut telemetry)
            .await
            .unwrap();

        assert_eq!(reason, StopReason::StopRequested);
        let primitives: Vec<_> = telemetry.frames.iter().map(|f| f.primitive).collect();
        assert_eq!(
            primitives,
            [
                Some(MotionPrimitive::Forward),
                Some(MotionPrimitive::StrafeRight),
                Some(MotionPrimitive::Stop),
            ]
        );
        assert_eq!(sink.applied[2], (2000, MotorPowerVector::zero()));
    }

    #[tokio::test]
    async fn test_repeating_square_runs_to_budget() {
        let clock = FakeClock::default();
        let mut gate = FakeGate::new(&clock, None);
        let mut sink = RecordingSink::new(&clock);
        let mut sequencer = Sequencer::new(Plan::square(1000, 10_000), PowerLimit::default());

        let reason = run_autonomous(
            &mut sequencer,
            &clock,
            &mut gate,
            &mut sink,
            &mut RecordingTelemetry::default(),
        )
        .await
        .unwrap();

        assert_eq!(reason, StopReason::BudgetExpired);
        assert_eq!(sink.applied.len(), 11);
        assert_eq!(sink.applied[10], (10_000, MotorPowerVector::zero()));
    }

    #[tokio::test]
    async fn test_every_emission_is_clamped() {
        let clock = FakeClock::default();
        let mut gate = FakeGate::new(&clock, None);
        let mut sink = RecordingSink::new(&clock);
        let limit = PowerLimit::new(0.4).unwrap();
        let plan = Plan::new(
            MotionPrimitive::ALL
                .iter()
                .map(|&p| PlanStep::new(p, 1.0, 100))
                .collect(),
            10_000,
            false,
        )
        .unwrap();
        let mut sequencer = Sequencer::new(plan, limit);

        run_autonomous(
            &mut sequencer,
            &clock,
            &mut gate,
            &mut sink,
            &mut RecordingTelemetry::default(),
        )
        .await
        .unwrap();

        assert_eq!(sink.applied.len(), MotionPrimitive::ALL.len() + 1);
        for (_, power) in &sink.applied {
            for p in power.as_array() {
                assert!(p.abs() <= limit.max());
            }
        }
        // Emissions are strictly time-ordered
        assert!(sink.applied.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[tokio::test]
    async fn test_manual_drives_each_tick_then_zero() {
        let clock = FakeClock::default();
        let mut gate = FakeGate::new(&clock, Some(100));
        let mut sink = RecordingSink::new(&clock);
        let mut telemetry = RecordingTelemetry::default();
        let mut input = FixedIntent(ContinuousIntent::new(1.0, 0.0, 0.0));
        let driver = ManualDriver::default();

        run_manual(
            &driver,
            &clock,
            &mut gate,
            &mut input,
            &mut sink,
            &mut telemetry,
        )
        .await
        .unwrap();

        // 20ms ticks at 0, 20, 40, 60, 80, then the stop at 100
        assert_eq!(sink.applied.len(), 6);
        for (_, power) in &sink.applied[..5] {
            assert_eq!(*power, MotorPowerVector::new(0.6, 0.6, 0.6, 0.6));
        }
        assert_eq!(sink.applied[5], (100, MotorPowerVector::zero()));
        assert_eq!(telemetry.frames[0].label, "manual");
        assert_eq!(telemetry.frames[5].primitive, Some(MotionPrimitive::Stop));
    }

    #[tokio::test]
    async fn test_manual_stop_before_first_tick() {
        let clock = FakeClock::default();
        let mut gate = FakeGate::new(&clock, Some(0));
        let mut sink = RecordingSink::new(&clock);
        let mut input = FixedIntent(ContinuousIntent::new(0.5, 0.5, 0.5));

        run_manual(
            &ManualDriver::default(),
            &clock,
            &mut gate,
            &mut input,
            &mut sink,
            &mut RecordingTelemetry::default(),
        )
        .await
        .unwrap();

        assert_eq!(sink.applied, [(0, MotorPowerVector::zero())]);
    }

    #[tokio::test]
    async fn test_sink_failure_ends_run_without_resend() {
        let clock = FakeClock::default();
        let mut gate = FakeGate::new(&clock, None);
        let mut sink = FailingSink {
            ok_calls: 1,
            calls: 0,
        };
        let mut telemetry = RecordingTelemetry::default();
        let mut sequencer = Sequencer::new(four_step_plan(1000, 10_000), PowerLimit::default());

        let result =
            run_autonomous(&mut sequencer, &clock, &mut gate, &mut sink, &mut telemetry).await;

        assert!(matches!(result, Err(RuntimeError::Transport(_))));
        assert_eq!(sink.calls, 2, "failed command must not be resent");
        // Only the accepted command is reported
        assert_eq!(telemetry.frames.len(), 1);
        assert_eq!(telemetry.frames[0].primitive, Some(MotionPrimitive::Forward));
    }

    #[tokio::test]
    async fn test_manual_sink_failure_propagates() {
        let clock = FakeClock::default();
        let mut gate = FakeGate::new(&clock, None);
        let mut sink = FailingSink {
            ok_calls: 0,
            calls: 0,
        };
        let driver = ManualDriver::new(PowerLimit::default());
        let mut input = FixedIntent(ContinuousIntent::new(1.0, 0.0, 0.0));

        let result = run_manual(
            &driver,
            &clock,
            &mut gate,
            &mut input,
            &mut sink,
            &mut RecordingTelemetry::default(),
        )
        .await;

        assert!(matches!(result, Err(RuntimeError::Transport(_))));
        assert_eq!(sink.calls, 1);
    }
}
