// Zenoh-backed collaborators for the mode loops
//
// Wheel power goes out as JSON on TOPIC_RT_WHEELS for the hardware bridge,
// joystick intent and lifecycle signals come in from teleop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use zenoh::Session;
use zenoh::handlers::FifoChannelHandler;
use zenoh::pubsub::{Publisher, Subscriber};
use zenoh::sample::Sample;

use crate::config::{
    CMD_TIMEOUT, TICK, TOPIC_CMD_INTENT, TOPIC_CMD_LIFECYCLE, TOPIC_RT_WHEELS, TOPIC_TELEMETRY,
};
use crate::drive::{ContinuousIntent, MotorPowerVector};
use crate::error::RuntimeError;
use crate::io::{Clock, IntentSource, LifecycleGate, MotorSink, Telemetry};
use crate::messages::{IntentCommand, LifecycleSignal, TelemetryFrame};

type SampleSubscriber = Subscriber<FifoChannelHandler<Sample>>;

/// Milliseconds since the runtime came up
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn elapsed_millis(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Intent freshness, tracked for the watchdog
#[derive(Debug, Clone, Copy, PartialEq)]
enum IntentHealth {
    Ok,
    Stale,
}

/// Keeps the latest intent and zeroes it once it is older than CMD_TIMEOUT
#[derive(Debug, Clone)]
pub struct IntentWatchdog {
    latest: Option<ContinuousIntent>,
    received_at: Instant,
    health: IntentHealth,
}

impl IntentWatchdog {
    pub fn new(now: Instant) -> Self {
        Self {
            latest: None,
            received_at: now,
            health: IntentHealth::Stale, // Start stale until first intent
        }
    }

    /// Process an incoming intent payload
    pub fn on_payload(&mut self, payload: &[u8], now: Instant) {
        match serde_json::from_slice::<IntentCommand>(payload) {
            Ok(cmd) => self.on_intent(ContinuousIntent::from(&cmd), now),
            Err(e) => warn!("Failed to parse intent: {}", e),
        }
    }

    pub fn on_intent(&mut self, intent: ContinuousIntent, now: Instant) {
        self.latest = Some(intent);
        self.received_at = now;
    }

    /// Intent to drive with at `now`, zero when none is fresh
    pub fn current(&mut self, now: Instant) -> ContinuousIntent {
        let age = now.saturating_duration_since(self.received_at);
        match self.latest {
            Some(intent) if age <= CMD_TIMEOUT => {
                if self.health == IntentHealth::Stale {
                    info!("Intent stream live");
                }
                self.health = IntentHealth::Ok;
                intent
            }
            _ => {
                if self.health == IntentHealth::Ok {
                    warn!("Intent stale ({:?} old), stopping robot", age);
                }
                self.health = IntentHealth::Stale;
                ContinuousIntent::default()
            }
        }
    }

    pub fn is_stale(&self) -> bool {
        self.health == IntentHealth::Stale
    }
}

/// Latest joystick intent from teleop, zeroed when it goes stale
pub struct ZenohIntentSource {
    subscriber: SampleSubscriber,
    watchdog: IntentWatchdog,
}

impl ZenohIntentSource {
    pub async fn declare(session: &Session) -> Result<Self, RuntimeError> {
        let subscriber = session
            .declare_subscriber(TOPIC_CMD_INTENT)
            .await
            .map_err(RuntimeError::Transport)?;
        info!("Subscribed to: {}", TOPIC_CMD_INTENT);

        Ok(Self {
            subscriber,
            watchdog: IntentWatchdog::new(Instant::now()),
        })
    }
}

impl IntentSource for ZenohIntentSource {
    fn read_continuous_intent(&mut self) -> ContinuousIntent {
        // Drain all pending samples (non-blocking), keep latest
        while let Ok(Some(sample)) = self.subscriber.try_recv() {
            self.watchdog
                .on_payload(&sample.payload().to_bytes(), Instant::now());
        }
        self.watchdog.current(Instant::now())
    }
}

/// Start/stop state of the operator gate.
///
/// A stop is sticky: a Start arriving after it does not clear it.
#[derive(Debug, Clone)]
pub struct GateState {
    started: bool,
    stop_requested: Arc<AtomicBool>,
}

impl GateState {
    pub fn new(autostart: bool) -> Self {
        Self {
            started: autostart,
            stop_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Process an incoming lifecycle payload; malformed ones are ignored
    pub fn on_payload(&mut self, payload: &[u8]) {
        match serde_json::from_slice::<LifecycleSignal>(payload) {
            Ok(signal) => self.on_signal(signal),
            Err(e) => warn!("Failed to parse lifecycle signal: {}", e),
        }
    }

    pub fn on_signal(&mut self, signal: LifecycleSignal) {
        match signal {
            LifecycleSignal::Start => {
                if !self.started {
                    info!("Start signal received");
                }
                self.started = true;
            }
            LifecycleSignal::Stop => {
                info!("Stop signal received");
                self.request_stop();
            }
        }
    }

    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// A stop before start also releases the gate; the loop then sees it
    pub fn is_released(&self) -> bool {
        self.started || self.is_stop_requested()
    }
}

/// Operator start/stop over zenoh, with Ctrl-C as a stop request
pub struct ZenohLifecycle {
    subscriber: SampleSubscriber,
    state: GateState,
}

impl ZenohLifecycle {
    pub async fn declare(session: &Session, autostart: bool) -> Result<Self, RuntimeError> {
        let subscriber = session
            .declare_subscriber(TOPIC_CMD_LIFECYCLE)
            .await
            .map_err(RuntimeError::Transport)?;
        info!("Subscribed to: {}", TOPIC_CMD_LIFECYCLE);

        let state = GateState::new(autostart);
        let ctrl_c = state.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, requesting stop");
                ctrl_c.request_stop();
            }
        });

        Ok(Self { subscriber, state })
    }
}

impl LifecycleGate for ZenohLifecycle {
    async fn wait_for_start(&mut self) -> Result<(), RuntimeError> {
        while !self.state.is_released() {
            match tokio::time::timeout(TICK, self.subscriber.recv_async()).await {
                Ok(sample) => {
                    let sample = sample.map_err(RuntimeError::Transport)?;
                    self.state.on_payload(&sample.payload().to_bytes());
                }
                Err(_elapsed) => {} // Re-check the Ctrl-C flag
            }
        }
        Ok(())
    }

    fn is_stop_requested(&mut self) -> bool {
        while let Ok(Some(sample)) = self.subscriber.try_recv() {
            self.state.on_payload(&sample.payload().to_bytes());
        }
        self.state.is_stop_requested()
    }

    async fn idle(&mut self, max_wait: Duration) {
        tokio::time::sleep(max_wait).await;
    }
}

/// Publishes wheel power for the hardware bridge
pub struct ZenohMotorSink {
    publisher: Publisher<'static>,
}

impl ZenohMotorSink {
    pub async fn declare(session: &Session) -> Result<Self, RuntimeError> {
        let publisher = session
            .declare_publisher(TOPIC_RT_WHEELS)
            .await
            .map_err(RuntimeError::Transport)?;
        info!("Publishing to: {}", TOPIC_RT_WHEELS);
        Ok(Self { publisher })
    }
}

impl MotorSink for ZenohMotorSink {
    async fn apply(&mut self, power: MotorPowerVector) -> Result<(), RuntimeError> {
        let json = serde_json::to_string(&power)?;
        self.publisher
            .put(json)
            .await
            .map_err(RuntimeError::Transport)
    }
}

/// Driver station feed; also mirrors each frame to the debug log
pub struct ZenohTelemetry {
    publisher: Option<Publisher<'static>>,
}

impl ZenohTelemetry {
    pub async fn declare(session: &Session, enabled: bool) -> Result<Self, RuntimeError> {
        if !enabled {
            return Ok(Self { publisher: None });
        }
        let publisher = session
            .declare_publisher(TOPIC_TELEMETRY)
            .await
            .map_err(RuntimeError::Transport)?;
        info!("Publishing to: {}", TOPIC_TELEMETRY);
        Ok(Self {
            publisher: Some(publisher),
        })
    }
}

impl Telemetry for ZenohTelemetry {
    async fn record(&mut self, frame: &TelemetryFrame) {
        let p = &frame.power;
        debug!(
            "{} @{}ms  FL | FR {:.3} | {:.3}  BL | BR {:.3} | {:.3}",
            frame.label, frame.run_time_ms, p.front_left, p.front_right, p.back_left, p.back_right
        );

        let Some(publisher) = &self.publisher else {
            return;
        };
        let json = match serde_json::to_string(frame) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to encode telemetry: {}", e);
                return;
            }
        };
        if let Err(e) = publisher.put(json).await {
            warn!("Failed to publish telemetry: {}", e);
        }
    }
}
