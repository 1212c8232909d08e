//! Public sequencer handle and its driver task.
//!
//! One tokio task serialises the three triggers: motion changes, the armed
//! timer and work deferred by `update_all` / `on`. Engine state sits behind
//! a single mutex; handlers run after it is released, so they may call back
//! into the sequencer.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use contracts::{
    AxisOp, Cue, CueData, CueKey, CueOp, EventKind, Interval, ReadyState, SequencerConfig,
};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

use crate::builder::Request;
use crate::clock::Clock;
use crate::engine::{EditBatch, Emission, SequencerEngine};
use crate::error::{Result, SequencerError};
use crate::motion::Motion;
use crate::provider::{DataProvider, NoData};
use crate::registry::{Delivery, Handler, HandlerToken, Registry};
use crate::timeout::{PreciseTimer, Timer, TimerFuture};

#[derive(Debug)]
enum Deferred {
    Flush(EditBatch),
    Replay(HandlerToken),
}

#[derive(Debug, Clone, Copy)]
enum Trigger {
    Motion,
    Deferred,
    Timeout(f64),
}

#[derive(Debug)]
struct State {
    engine: SequencerEngine,
    registry: Registry,
    deferred: VecDeque<Deferred>,
    closed: bool,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<State>,
    wake: Notify,
    shutdown: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn defer(&self, work: Deferred) {
        self.lock().deferred.push_back(work);
        self.wake.notify_one();
    }

    /// Run one engine step, then deliver outside the lock.
    fn run(&self, trigger: Trigger) {
        let deliveries = {
            let mut guard = self.lock();
            if guard.closed {
                return;
            }
            let state = &mut *guard;
            let mut deliveries = Vec::new();
            match trigger {
                Trigger::Motion => {
                    let result = state.engine.handle_motion_change();
                    collect(&state.registry, result, &mut deliveries);
                }
                Trigger::Timeout(deadline) => {
                    let result = state.engine.on_timeout(deadline);
                    collect(&state.registry, result, &mut deliveries);
                }
                Trigger::Deferred => {
                    while let Some(work) = state.deferred.pop_front() {
                        match work {
                            Deferred::Flush(batch) => {
                                let result = state.engine.flush_edit(batch);
                                collect(&state.registry, result, &mut deliveries);
                            }
                            Deferred::Replay(token) => {
                                let events = state.engine.replay();
                                deliveries.extend(state.registry.replay_deliveries(token, events));
                            }
                        }
                    }
                }
            }
            deliveries
        };
        for delivery in deliveries {
            delivery.invoke();
        }
    }

    fn deadline(&self) -> Option<f64> {
        self.lock().engine.deadline()
    }

    fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

fn collect(registry: &Registry, result: Result<Vec<Emission>>, out: &mut Vec<Delivery>) {
    match result {
        Ok(emissions) => {
            for emission in emissions {
                out.extend(registry.deliveries(emission));
            }
        }
        Err(e) => error!(error = %e, "sequencer step failed"),
    }
}

async fn drive(
    shared: Arc<Shared>,
    motion: Arc<dyn Motion>,
    clock: Arc<dyn Clock>,
    timer: Arc<dyn Timer>,
    mut changes: watch::Receiver<u64>,
) {
    match motion.ready_state() {
        ReadyState::Closed => {
            info!("motion already closed, sequencer idle");
            return;
        }
        ReadyState::Open => shared.run(Trigger::Motion),
        ReadyState::Init => {}
    }

    loop {
        let deadline = shared.deadline();
        let armed: TimerFuture = match deadline {
            Some(ts) => timer.arm_once(clock.instant_at(ts)),
            None => Box::pin(std::future::pending()),
        };

        tokio::select! {
            _ = shared.shutdown.notified() => break,
            changed = changes.changed() => {
                if changed.is_err() {
                    debug!("motion source dropped");
                    break;
                }
                if motion.ready_state() == ReadyState::Closed {
                    info!("motion closed, stopping sequencer driver");
                    break;
                }
                shared.run(Trigger::Motion);
            }
            _ = shared.wake.notified() => shared.run(Trigger::Deferred),
            _ = armed => {
                if let Some(ts) = deadline {
                    shared.run(Trigger::Timeout(ts));
                }
            }
        }

        if shared.is_closed() {
            break;
        }
    }
    debug!("sequencer driver stopped");
}

/// Cue sequencer bound to a motion.
///
/// Must be created inside a tokio runtime; the driver task is spawned on
/// construction and stops on [`Sequencer::close`] or when dropped.
pub struct Sequencer {
    shared: Arc<Shared>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequencer")
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Sequencer {
    /// Sequencer with default configuration and no data provider.
    pub fn new(motion: Arc<dyn Motion>, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::with_config(motion, clock, Arc::new(NoData), &SequencerConfig::default())
    }

    pub fn with_config(
        motion: Arc<dyn Motion>,
        clock: Arc<dyn Clock>,
        provider: Arc<dyn DataProvider>,
        config: &SequencerConfig,
    ) -> Result<Self> {
        let timer = Arc::new(PreciseTimer::new(&config.timer));
        Self::with_timer(motion, clock, provider, timer, config.lookahead_s)
    }

    pub fn with_timer(
        motion: Arc<dyn Motion>,
        clock: Arc<dyn Clock>,
        provider: Arc<dyn DataProvider>,
        timer: Arc<dyn Timer>,
        lookahead: f64,
    ) -> Result<Self> {
        let changes = motion.subscribe();
        let engine = SequencerEngine::new(motion.clone(), clock.clone(), provider, lookahead)?;
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                engine,
                registry: Registry::new(),
                deferred: VecDeque::new(),
                closed: false,
            }),
            wake: Notify::new(),
            shutdown: Notify::new(),
        });
        let driver = tokio::spawn(drive(shared.clone(), motion, clock, timer, changes));
        info!(lookahead, "sequencer started");
        Ok(Self {
            shared,
            driver: Mutex::new(Some(driver)),
        })
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.shared.lock()
    }

    fn ensure_open(&self, state: &State) -> Result<()> {
        if state.closed {
            return Err(SequencerError::Closed);
        }
        if state.engine.motion().ready_state() == ReadyState::Closed {
            return Err(SequencerError::MotionClosed);
        }
        Ok(())
    }

    /// Register `handler` for `kind`.
    ///
    /// `events` and `enter` handlers first receive the active cues, once,
    /// on the next tick.
    #[instrument(name = "sequencer_on", skip(self, handler))]
    pub fn on(&self, kind: EventKind, handler: Handler) -> Result<HandlerToken> {
        let (token, added) = {
            let mut state = self.state();
            self.ensure_open(&state)?;
            state.registry.register(kind, handler)
        };
        if added && kind.replays_active() {
            self.shared.defer(Deferred::Replay(token));
        }
        Ok(token)
    }

    /// Like [`Sequencer::on`] with the kind given by name.
    pub fn on_str(&self, kind: &str, handler: Handler) -> Result<HandlerToken> {
        let kind = kind
            .parse::<EventKind>()
            .map_err(|e| SequencerError::UnsupportedEvent { kind: e.0 })?;
        self.on(kind, handler)
    }

    pub fn off(&self, token: HandlerToken) -> bool {
        self.state().registry.unregister(token)
    }

    /// Apply cue edits; notifications follow on the next tick.
    pub fn update_all(&self, ops: Vec<CueOp>) -> Result<Vec<AxisOp>> {
        let (applied, batch) = {
            let mut state = self.state();
            if state.closed {
                return Err(SequencerError::Closed);
            }
            state.engine.update_all(ops)?
        };
        if let Some(batch) = batch {
            self.shared.defer(Deferred::Flush(batch));
        }
        Ok(applied)
    }

    pub fn add_cue(
        &self,
        key: impl Into<CueKey>,
        interval: Interval,
        data: Option<CueData>,
    ) -> Result<Vec<AxisOp>> {
        self.update_all(vec![CueOp::upsert(key, interval, data)])
    }

    pub fn remove_cue(&self, key: impl Into<CueKey>) -> Result<Vec<AxisOp>> {
        self.update_all(vec![CueOp::remove(key)])
    }

    pub fn request(&self) -> Request<'_> {
        Request::new(self)
    }

    pub fn has_cue(&self, key: &str) -> bool {
        self.state().engine.has_cue(key)
    }

    pub fn keys(&self) -> Vec<CueKey> {
        self.state().engine.keys()
    }

    pub fn get_cue(&self, key: &str) -> Option<Cue> {
        self.state().engine.get_cue(key)
    }

    pub fn get_cues(&self) -> Vec<Cue> {
        self.state().engine.cues()
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.state().engine.is_active(key)
    }

    pub fn active_keys(&self) -> Vec<CueKey> {
        self.state().engine.active_keys()
    }

    pub fn active_cues(&self) -> Vec<Cue> {
        self.state().engine.active_cues()
    }

    pub fn get_cues_by_point(&self, point: f64) -> Vec<Cue> {
        self.state().engine.cues_by_point(point)
    }

    pub fn get_cues_by_interval(&self, search: &Interval) -> Vec<Cue> {
        self.state().engine.cues_by_interval(search)
    }

    pub fn get_cues_covered_by_interval(&self, search: &Interval) -> Vec<Cue> {
        self.state().engine.cues_covered_by_interval(search)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Stop the driver; later edits and registrations fail with `Closed`.
    pub fn close(&self) {
        {
            let mut state = self.state();
            if state.closed {
                return;
            }
            state.closed = true;
        }
        self.shared.shutdown.notify_one();
        info!("sequencer closed");
    }

    /// Close and wait for the driver task to finish.
    pub async fn shutdown(&self) {
        self.close();
        let driver = self
            .driver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(driver) = driver {
            if let Err(e) = driver.await {
                error!(error = %e, "sequencer driver failed");
            }
        }
    }
}

impl Drop for Sequencer {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TokioClock;
    use crate::motion::LocalMotion;
    use crate::registry::Notification;
    use contracts::Verb;
    use std::time::Duration;

    type Log = Arc<Mutex<Vec<(String, Verb)>>>;

    fn enter_exit_logger() -> (Handler, Log) {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let handler: Handler = Arc::new(move |n: &Notification| {
            if let Notification::Events(events) = n {
                let mut log = sink.lock().unwrap();
                log.extend(events.iter().map(|e| (e.key.to_string(), e.verb)));
            }
        });
        (handler, log)
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    fn setup() -> (Arc<TokioClock>, Arc<LocalMotion>, Sequencer) {
        let clock = Arc::new(TokioClock::new());
        let motion = Arc::new(LocalMotion::new(clock.clone(), Interval::unbounded()));
        let sequencer = Sequencer::new(motion.clone(), clock.clone()).unwrap();
        (clock, motion, sequencer)
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_follow_motion() {
        let (_clock, motion, sequencer) = setup();
        sequencer
            .add_cue("A", Interval::closed(0.0, 1.0).unwrap(), None)
            .unwrap();
        let (handler, log) = enter_exit_logger();
        sequencer.on(EventKind::Events, handler).unwrap();

        motion.update(Some(0.0), Some(1.0), Some(0.0)).unwrap();
        settle().await;
        assert_eq!(*log.lock().unwrap(), vec![("A".to_string(), Verb::Enter)]);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(
            *log.lock().unwrap(),
            vec![("A".to_string(), Verb::Enter), ("A".to_string(), Verb::Exit)]
        );
        assert!(sequencer.active_keys().is_empty());
        sequencer.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_handler_gets_single_replay() {
        let (_clock, motion, sequencer) = setup();
        motion.update(Some(0.0), Some(0.0), Some(0.0)).unwrap();
        sequencer
            .add_cue("A", Interval::closed(0.0, 1.0).unwrap(), None)
            .unwrap();
        settle().await;
        assert!(sequencer.is_active("A"));

        let (handler, log) = enter_exit_logger();
        let token = sequencer.on(EventKind::Events, handler.clone()).unwrap();
        assert_eq!(sequencer.on(EventKind::Events, handler).unwrap(), token);
        settle().await;
        assert_eq!(*log.lock().unwrap(), vec![("A".to_string(), Verb::Enter)]);
        assert!(sequencer.off(token));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsupported_kind_and_close() {
        let (_clock, _motion, sequencer) = setup();
        let (handler, _) = enter_exit_logger();
        let err = sequencer.on_str("resize", handler.clone()).unwrap_err();
        assert!(matches!(err, SequencerError::UnsupportedEvent { .. }));

        sequencer.close();
        assert!(matches!(
            sequencer.on(EventKind::Enter, handler),
            Err(SequencerError::Closed)
        ));
        assert!(matches!(
            sequencer.remove_cue("x"),
            Err(SequencerError::Closed)
        ));
        sequencer.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_keeps_first_position() {
        let (_clock, _motion, sequencer) = setup();
        let mut request = sequencer.request();
        request
            .add_cue("a", Interval::closed(0.0, 1.0).unwrap(), None)
            .add_cue("b", Interval::closed(1.0, 2.0).unwrap(), None)
            .add_cue("a", Interval::closed(5.0, 6.0).unwrap(), None);
        assert_eq!(request.len(), 2);
        let ops = request.submit().unwrap();
        assert!(request.is_empty());
        let keys: Vec<&str> = ops.iter().map(|op| op.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(
            sequencer.get_cue("a").unwrap().interval,
            Interval::closed(5.0, 6.0).unwrap()
        );
    }
}
