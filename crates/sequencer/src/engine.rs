//! Sequencer engine: the synchronous core behind [`crate::Sequencer`].
//!
//! The engine owns the axis, the schedule and the active set. Every entry
//! point returns the notifications it produced as [`Emission`]s; delivering
//! them to handlers and arming the timer for [`SequencerEngine::deadline`]
//! is left to the driver.

use std::collections::HashSet;
use std::sync::Arc;

use contracts::{
    AxisOp, Cue, CueChange, CueData, CueKey, CueOp, Direction, Interval, MotionInfo, OpType,
    PointInfo, PointType, ReadyState, SequencerEvent, Verb,
};
use cue_index::Axis;
use indexmap::{IndexMap, IndexSet};
use tracing::{debug, instrument, trace, warn};

use crate::clock::Clock;
use crate::error::{Result, SequencerError};
use crate::kinematics::{
    calculate_vector, direction_at, is_moving, position_interval, range_violation,
    solutions_in_interval,
};
use crate::motion::Motion;
use crate::provider::DataProvider;
use crate::schedule::{DueTask, Schedule};

/// A batch of notifications produced by one engine step.
#[derive(Debug, Clone, PartialEq)]
pub enum Emission {
    /// Ordered enter/exit events
    Events(Vec<SequencerEvent>),
    /// Edits of active cues that kept their activation
    Changes(Vec<CueChange>),
}

/// Notifications of a cue edit, held back until the next driver tick.
#[derive(Debug, Clone)]
pub struct EditBatch {
    exits: Vec<Cue>,
    enters: Vec<Cue>,
    changes: Vec<CueChange>,
}

impl EditBatch {
    pub fn is_empty(&self) -> bool {
        self.exits.is_empty() && self.enters.is_empty() && self.changes.is_empty()
    }
}

/// Where and when a set of events happened.
#[derive(Debug, Clone, Copy)]
struct Moment {
    point: f64,
    direction: Direction,
    due_ts: f64,
    delivery_ts: f64,
}

fn make_event(cue: Cue, verb: Verb, at: Moment) -> SequencerEvent {
    SequencerEvent {
        point_type: PointType::classify(at.point, &cue.interval),
        key: cue.key,
        interval: cue.interval,
        data: cue.data,
        point: at.point,
        verb,
        direction: at.direction,
        due_ts: at.due_ts,
        delivery_ts: at.delivery_ts,
        delay: at.delivery_ts - at.due_ts,
    }
}

/// Slot of an event among events sharing point and due time.
///
/// exit `>`, enter `[`, enter singular, exit singular, exit `]`, enter `<`.
fn precedence(event: &SequencerEvent) -> usize {
    let closed = match event.point_type {
        PointType::Low => event.interval.low_include(),
        PointType::High => event.interval.high_include(),
        _ => false,
    };
    match (event.point_type, event.verb) {
        (PointType::Singular, Verb::Enter) => 2,
        (PointType::Singular, Verb::Exit) => 3,
        (_, Verb::Exit) if !closed => 0,
        (_, Verb::Enter) if closed => 1,
        (_, Verb::Exit) => 4,
        (_, Verb::Enter) => 5,
    }
}

/// Stable reorder of consecutive runs sharing `(point, due_ts)`.
pub fn reorder_events(events: Vec<SequencerEvent>) -> Vec<SequencerEvent> {
    if events.len() < 2 {
        return events;
    }
    let mut ordered = Vec::with_capacity(events.len());
    let mut slots: [Vec<SequencerEvent>; 6] = Default::default();
    let mut run: Option<(f64, f64)> = None;
    for event in events {
        if run != Some((event.point, event.due_ts)) {
            slots.iter_mut().for_each(|slot| ordered.append(slot));
            run = Some((event.point, event.due_ts));
        }
        slots[precedence(&event)].push(event);
    }
    slots.iter_mut().for_each(|slot| ordered.append(slot));
    ordered
}

#[derive(Debug)]
pub struct SequencerEngine {
    axis: Axis,
    /// Created by the first motion change
    schedule: Option<Schedule>,
    /// Active keys in activation order, with the interval they were entered with
    active: IndexMap<CueKey, Interval>,
    motion: Arc<dyn Motion>,
    clock: Arc<dyn Clock>,
    provider: Arc<dyn DataProvider>,
    lookahead: f64,
    /// Clock time the main loop wants to run next
    deadline: Option<f64>,
}

impl SequencerEngine {
    /// Create an engine and apply the provider's initial cue batch.
    pub fn new(
        motion: Arc<dyn Motion>,
        clock: Arc<dyn Clock>,
        provider: Arc<dyn DataProvider>,
        lookahead: f64,
    ) -> Result<Self> {
        let mut axis = Axis::new();
        let initial = provider.load();
        if !initial.is_empty() {
            let applied = axis.update_all(initial)?;
            debug!(cues = applied.len(), "initial cues loaded");
        }
        Ok(Self {
            axis,
            schedule: None,
            active: IndexMap::new(),
            motion,
            clock,
            provider,
            lookahead,
            deadline: None,
        })
    }

    pub fn motion(&self) -> &Arc<dyn Motion> {
        &self.motion
    }

    pub fn deadline(&self) -> Option<f64> {
        self.deadline
    }

    pub fn is_started(&self) -> bool {
        self.schedule.is_some()
    }

    /// Number of crossings waiting in the schedule.
    pub fn pending_tasks(&self) -> usize {
        self.schedule.as_ref().map_or(0, Schedule::len)
    }

    fn resolve_data(&self, key: &CueKey, stored: Option<&CueData>) -> Option<CueData> {
        self.provider.get_data(key).or_else(|| stored.cloned())
    }

    /// Current cue for `key`, falling back to the interval it was activated with.
    fn item(&self, key: &CueKey) -> Option<Cue> {
        match self.axis.get(key) {
            Some(cue) => Some(Cue::new(
                key.clone(),
                cue.interval,
                self.resolve_data(key, cue.data.as_ref()),
            )),
            None => self
                .active
                .get(key)
                .map(|interval| Cue::new(key.clone(), *interval, self.provider.get_data(key))),
        }
    }

    /// Re-evaluate the active set after the motion changed.
    #[instrument(name = "sequencer_motion_change", skip(self), level = "debug")]
    pub fn handle_motion_change(&mut self) -> Result<Vec<Emission>> {
        if self.motion.ready_state() == ReadyState::Closed {
            self.deadline = None;
            return Ok(Vec::new());
        }
        let Some(info) = self.motion.info() else {
            return Ok(Vec::new());
        };
        let init = info.vector;
        let now = match self.schedule.as_mut() {
            None => {
                let now = self.clock.now();
                self.schedule = Some(Schedule::new(now, self.lookahead)?);
                now
            }
            Some(schedule) => {
                // late updates are evaluated from their own timestamp
                let now = init.timestamp;
                schedule.advance(now)?;
                now
            }
        };

        let position = calculate_vector(&init, now).position;
        let mut covering: Vec<CueKey> = self
            .axis
            .lookup_by_point(Some(position))
            .into_iter()
            .map(|cue| cue.key.clone())
            .collect();
        covering.sort();
        let covered: HashSet<&CueKey> = covering.iter().collect();
        let mut exit_keys: Vec<CueKey> = self
            .active
            .keys()
            .filter(|key| !covered.contains(key))
            .cloned()
            .collect();
        let mut enter_keys: Vec<CueKey> = covering
            .iter()
            .filter(|key| !self.active.contains_key(*key))
            .cloned()
            .collect();

        // endpoints exactly at the position while moving
        if is_moving(&init) {
            let direction = direction_at(&init, now);
            for point in self.axis.lookup_by_interval(&Interval::singular(position)?) {
                let interval = point.interval;
                let (closed, entering) = match point.point_type {
                    PointType::Singular => {
                        exit_keys.push(point.key);
                        continue;
                    }
                    PointType::Low => (
                        interval.low_include(),
                        direction != Direction::Backwards,
                    ),
                    PointType::High => (
                        interval.high_include(),
                        direction != Direction::Forwards,
                    ),
                    _ => continue,
                };
                if !entering && closed {
                    exit_keys.push(point.key);
                } else if entering && !closed {
                    enter_keys.push(point.key);
                }
            }
        }

        let exits: Vec<Cue> = exit_keys.iter().filter_map(|key| self.item(key)).collect();
        let enters: Vec<Cue> = enter_keys.iter().filter_map(|key| self.item(key)).collect();
        debug!(
            now,
            position,
            exits = exits.len(),
            enters = enters.len(),
            "active set re-evaluated"
        );

        let mut out = Vec::new();
        self.emit_interval_events(&info, now, position, exits, enters, &mut out);
        self.load(&info, now, None)?;
        self.main_loop(&info, now, &mut out)?;
        Ok(out)
    }

    /// Apply a batch of cue edits.
    ///
    /// Returns the axis ops and, once the sequencer runs, the notifications
    /// to flush on the next tick with [`SequencerEngine::flush_edit`].
    #[instrument(name = "sequencer_update_all", skip(self, ops), fields(ops = ops.len()), level = "debug")]
    pub fn update_all(&mut self, ops: Vec<CueOp>) -> Result<(Vec<AxisOp>, Option<EditBatch>)> {
        let ready_state = self.motion.ready_state();
        if ready_state == ReadyState::Closed {
            return Err(SequencerError::MotionClosed);
        }
        let applied = self.axis.update_all(ops)?;
        if ready_state == ReadyState::Init || self.schedule.is_none() {
            return Ok((applied, None));
        }
        let Some(info) = self.motion.info() else {
            return Ok((applied, None));
        };

        let now = self.clock.now();
        let now_vector = calculate_vector(&info.vector, now);
        let position = now_vector.position;

        let mut exits = Vec::new();
        let mut enters = Vec::new();
        for op in applied.iter().filter(|op| op.op_type != OpType::Noop) {
            let is_active = self.active.contains_key(&op.key);
            let should_be_active = matches!(op.op_type, OpType::Create | OpType::Update)
                && op.interval.is_some_and(|i| i.covers_point(position));
            let data = match op.op_type {
                OpType::Remove => op.data.clone(),
                _ => self.resolve_data(&op.key, op.data.as_ref()),
            };
            let Some(interval) = op.interval.or_else(|| self.active.get(&op.key).copied()) else {
                continue;
            };
            if is_active && !should_be_active {
                exits.push(Cue::new(op.key.clone(), interval, data));
            } else if !is_active && should_be_active {
                enters.push(Cue::new(op.key.clone(), interval, data));
            } else if is_active && op.op_type == OpType::Update {
                self.active.insert(op.key.clone(), interval);
            }
        }

        let flipped: HashSet<&CueKey> = exits.iter().chain(&enters).map(|cue| &cue.key).collect();
        let changes: Vec<CueChange> = applied
            .iter()
            .filter(|op| self.active.contains_key(&op.key) && !flipped.contains(&op.key))
            .filter(|op| op.op_type != OpType::Noop || op.data.is_some())
            .map(|op| CueChange {
                key: op.key.clone(),
                interval: op.interval,
                data: op.data.clone(),
            })
            .collect();

        let batch = EditBatch {
            exits,
            enters,
            changes,
        };
        self.reconcile_schedule(&info, now, &applied)?;
        Ok((applied, Some(batch)))
    }

    /// Bring the schedule in line with edited cues.
    fn reconcile_schedule(&mut self, info: &MotionInfo, now: f64, applied: &[AxisOp]) -> Result<()> {
        let moving = is_moving(&calculate_vector(&info.vector, now));
        let Some(schedule) = self.schedule.as_mut() else {
            return Ok(());
        };
        if !moving {
            schedule.advance(now)?;
            return Ok(());
        }

        let edited = applied.iter().filter(|op| op.op_type != OpType::Noop);
        let mut invalidated = 0;
        for op in edited.clone() {
            invalidated += schedule.invalidate(&op.key);
        }

        let mut reload = Vec::new();
        if let Some(window) = schedule.pos_window().copied() {
            for op in edited.filter(|op| matches!(op.op_type, OpType::Create | OpType::Update)) {
                let Some(interval) = op.interval else {
                    continue;
                };
                let mut points = vec![interval.low()];
                if !interval.is_singular() {
                    points.push(interval.high());
                }
                for point in points.into_iter().filter(|p| window.covers_point(*p)) {
                    reload.push(PointInfo {
                        key: op.key.clone(),
                        interval,
                        point,
                        point_type: PointType::classify(point, &interval),
                        data: op.data.clone(),
                    });
                }
            }
        }
        trace!(invalidated, reload = reload.len(), "schedule reconciled");
        if !reload.is_empty() {
            self.load(info, now, Some(reload))?;
        }
        Ok(())
    }

    /// Emit a deferred edit batch and restart the main loop.
    ///
    /// Enters and exits are re-checked against the axis and the motion as
    /// they are now, so an edit reverted before the flush produces nothing
    /// and a motion change handled in between wins.
    #[instrument(name = "sequencer_flush_edit", skip(self, batch), level = "debug")]
    pub fn flush_edit(&mut self, batch: EditBatch) -> Result<Vec<Emission>> {
        let Some(info) = self.motion.info() else {
            return Ok(Vec::new());
        };
        let EditBatch {
            exits,
            enters,
            changes,
        } = batch;
        let now = self.clock.now();
        let position = calculate_vector(&info.vector, now).position;

        let mut kept_exits = Vec::with_capacity(exits.len());
        for cue in exits {
            match self.axis.get(&cue.key).map(|current| current.interval) {
                Some(interval) if interval.covers_point(position) => {
                    // still covered, keep the active entry in step with the axis
                    if let Some(active) = self.active.get_mut(&cue.key) {
                        *active = interval;
                    }
                }
                _ => kept_exits.push(cue),
            }
        }
        let exits = kept_exits;
        let enters: Vec<Cue> = enters
            .into_iter()
            .filter_map(|cue| {
                let current = self.axis.get(&cue.key)?;
                current
                    .interval
                    .covers_point(position)
                    .then(|| self.item(&cue.key))
                    .flatten()
            })
            .collect();

        let mut out = Vec::new();
        self.emit_interval_events(&info, now, position, exits, enters, &mut out);
        if !changes.is_empty() {
            out.push(Emission::Changes(changes));
        }
        self.main_loop(&info, now, &mut out)?;
        Ok(out)
    }

    /// Run the main loop for a timer armed at `deadline`.
    pub fn on_timeout(&mut self, deadline: f64) -> Result<Vec<Emission>> {
        let Some(info) = self.motion.info() else {
            return Ok(Vec::new());
        };
        if self
            .schedule
            .as_ref()
            .is_some_and(|s| s.is_expired(self.clock.now()))
        {
            debug!(deadline, late_s = self.clock.now() - deadline, "timer fired past the window");
        }
        // the timer never fires before its deadline
        let now = self.clock.now().max(deadline);
        let mut out = Vec::new();
        self.main_loop(&info, now, &mut out)?;
        Ok(out)
    }

    /// Enter events for every active cue, for a newly registered handler.
    ///
    /// The active set is left untouched.
    pub fn replay(&self) -> Vec<SequencerEvent> {
        if self.motion.ready_state() == ReadyState::Init || self.active.is_empty() {
            return Vec::new();
        }
        let Some(info) = self.motion.info() else {
            return Vec::new();
        };
        let now = self.clock.now();
        let at = Moment {
            point: calculate_vector(&info.vector, now).position,
            direction: direction_at(&info.vector, now),
            due_ts: now,
            delivery_ts: self.clock.now(),
        };
        let events = self
            .active
            .keys()
            .filter_map(|key| self.item(key))
            .map(|cue| make_event(cue, Verb::Enter, at))
            .collect();
        reorder_events(events)
    }

    #[instrument(name = "sequencer_main", skip(self, info, out), level = "trace")]
    fn main_loop(&mut self, info: &MotionInfo, now: f64, out: &mut Vec<Emission>) -> Result<()> {
        self.deadline = None;
        let Some(due) = self.schedule.as_mut().map(|s| s.pop(now)) else {
            return Ok(());
        };
        self.emit_schedule_events(info, due, out);

        let moving = is_moving(&info.vector);
        // nothing left before the window end, a timer armed for it fires exactly at it
        let expired = self
            .schedule
            .as_ref()
            .filter(|s| s.delay_next(now) == 0.0)
            .map(|s| s.time_window().high());
        if let Some(window_end) = expired.filter(|_| moving) {
            let now = window_end;
            if let Some(schedule) = self.schedule.as_mut() {
                schedule.advance(now)?;
            }
            self.load(info, now, None)?;
            let due = self.schedule.as_mut().map(|s| s.pop(now)).unwrap_or_default();
            self.emit_schedule_events(info, due, out);
        }

        if moving {
            self.deadline = self.schedule.as_ref().map(Schedule::next_due);
            trace!(deadline = ?self.deadline, "timer requested");
        }
        Ok(())
    }

    /// Load crossings for the current window into the schedule.
    ///
    /// `given` restricts the load to known points.
    #[instrument(name = "sequencer_load", skip(self, info, given), level = "trace")]
    fn load(&mut self, info: &MotionInfo, now: f64, given: Option<Vec<PointInfo>>) -> Result<()> {
        if !is_moving(&info.vector) {
            return Ok(());
        }
        let Self {
            axis,
            schedule,
            provider,
            ..
        } = self;
        let Some(schedule) = schedule.as_mut() else {
            return Ok(());
        };

        let window = *schedule.time_window();
        let t_start = window.low();
        let t_delta = window.length();
        let start = calculate_vector(&info.vector, t_start);

        let points = match given {
            Some(points) => points,
            None => {
                let (low, high) = position_interval(&start, t_delta);
                let low = low.max(info.range.low());
                let high = high.min(info.range.high());
                if low > high {
                    schedule.set_pos_window(None);
                    return Ok(());
                }
                let pos_window = Interval::closed(low, high)?;
                schedule.set_pos_window(Some(pos_window));
                axis.lookup_by_interval(&pos_window)
            }
        };
        let points: Vec<PointInfo> = points
            .into_iter()
            .map(|mut point| {
                point.data = provider.get_data(&point.key).or(point.data);
                point
            })
            .collect();

        let violation = range_violation(&start, &info.range).map(|(d, _)| d);
        let mut pushed = 0;
        for (d, task) in solutions_in_interval(&start, t_delta, points) {
            // already handled by the previous window
            if d == 0.0 {
                continue;
            }
            if violation.is_some_and(|r| d >= r) {
                continue;
            }
            if matches!(task.point_type, PointType::Low | PointType::High)
                && calculate_vector(&info.vector, t_start + d).velocity == 0.0
            {
                // touching an endpoint without crossing it
                continue;
            }
            if schedule.push(now, t_start + d, task) {
                pushed += 1;
            }
        }
        trace!(pushed, window = %window, "window loaded");
        Ok(())
    }

    fn emit_schedule_events(&mut self, info: &MotionInfo, due: Vec<DueTask>, out: &mut Vec<Emission>) {
        if due.is_empty() {
            return;
        }
        let delivery_ts = self.clock.now();
        let mut events = Vec::with_capacity(due.len());
        for DueTask { task, due_ts, .. } in due {
            let direction = direction_at(&info.vector, due_ts);
            let at = Moment {
                point: task.point,
                direction,
                due_ts,
                delivery_ts,
            };
            let cue = Cue::new(task.key, task.interval, task.data);
            if cue.interval.is_singular() {
                events.push(make_event(cue.clone(), Verb::Enter, at));
                events.push(make_event(cue, Verb::Exit, at));
                continue;
            }
            let verb_int = -(PointType::classify(at.point, &cue.interval).to_int() * direction.to_int());
            match Verb::from_int(verb_int) {
                Some(verb) => events.push(make_event(cue, verb, at)),
                None => warn!(key = %cue.key, point = at.point, "crossing without a verb dropped"),
            }
        }
        self.settle(events, out);
    }

    fn emit_interval_events(
        &mut self,
        info: &MotionInfo,
        now: f64,
        position: f64,
        exits: Vec<Cue>,
        enters: Vec<Cue>,
        out: &mut Vec<Emission>,
    ) {
        if exits.is_empty() && enters.is_empty() {
            return;
        }
        let at = Moment {
            point: position,
            direction: direction_at(&info.vector, now),
            due_ts: now,
            delivery_ts: self.clock.now(),
        };
        let events = exits
            .into_iter()
            .map(|cue| make_event(cue, Verb::Exit, at))
            .chain(enters.into_iter().map(|cue| make_event(cue, Verb::Enter, at)))
            .collect();
        self.settle(events, out);
    }

    /// Order events, apply them to the active set and drop duplicates.
    fn settle(&mut self, events: Vec<SequencerEvent>, out: &mut Vec<Emission>) {
        let mut delivered = Vec::with_capacity(events.len());
        for event in reorder_events(events) {
            let fresh = match event.verb {
                Verb::Exit => self.active.shift_remove(&event.key).is_some(),
                Verb::Enter if self.active.contains_key(&event.key) => false,
                Verb::Enter => {
                    self.active.insert(event.key.clone(), event.interval);
                    true
                }
            };
            if !fresh {
                trace!(key = %event.key, verb = %event.verb, "duplicate event dropped");
                continue;
            }
            observability::record_event_emitted(event.verb.as_str(), event.delay);
            delivered.push(event);
        }
        if !delivered.is_empty() {
            observability::record_active_cues(self.active.len());
            out.push(Emission::Events(delivered));
        }
    }

    // Queries

    pub fn has_cue(&self, key: &str) -> bool {
        self.axis.has_key(key)
    }

    pub fn keys(&self) -> Vec<CueKey> {
        let mut keys: Vec<CueKey> = self.axis.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn get_cue(&self, key: &str) -> Option<Cue> {
        let cue = self.axis.get(key)?;
        Some(Cue::new(
            cue.key.clone(),
            cue.interval,
            self.resolve_data(&cue.key, cue.data.as_ref()),
        ))
    }

    /// Every cue, ordered by key.
    pub fn cues(&self) -> Vec<Cue> {
        self.keys().iter().filter_map(|key| self.get_cue(key)).collect()
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.active.contains_key(key)
    }

    /// Active keys in activation order.
    pub fn active_keys(&self) -> Vec<CueKey> {
        self.active.keys().cloned().collect()
    }

    pub fn active_cues(&self) -> Vec<Cue> {
        self.active.keys().filter_map(|key| self.item(key)).collect()
    }

    /// Cues covering `point`.
    pub fn cues_by_point(&self, point: f64) -> Vec<Cue> {
        let mut keys: Vec<CueKey> = self
            .axis
            .lookup_by_point(Some(point))
            .into_iter()
            .map(|cue| cue.key.clone())
            .collect();
        keys.sort();
        keys.iter().filter_map(|key| self.get_cue(key)).collect()
    }

    /// Cues with an endpoint in `search` that `search` also covers.
    pub fn cues_by_interval(&self, search: &Interval) -> Vec<Cue> {
        let keys: IndexSet<CueKey> = self
            .axis
            .lookup_by_interval(search)
            .into_iter()
            .map(|point| point.key)
            .collect();
        keys.iter()
            .filter_map(|key| self.get_cue(key))
            .filter(|cue| search.covers_interval(&cue.interval))
            .collect()
    }

    /// Like [`SequencerEngine::cues_by_interval`], restricted to cues overlapping `search`.
    pub fn cues_covered_by_interval(&self, search: &Interval) -> Vec<Cue> {
        self.cues_by_interval(search)
            .into_iter()
            .filter(|cue| search.overlaps_interval(&cue.interval))
            .collect()
    }
}
