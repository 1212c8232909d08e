//! Look-ahead queue of boundary crossings.
//!
//! The schedule covers a sliding time window of `lookahead` seconds. Tasks
//! are accepted only when due inside the window and not already in the past;
//! advancing the window drops everything queued.

use contracts::{ContractError, Interval, PointInfo};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
struct Entry {
    due_ts: f64,
    push_ts: f64,
    task: PointInfo,
}

/// A task handed back by [`Schedule::pop`].
#[derive(Debug, Clone)]
pub struct DueTask {
    pub task: PointInfo,
    pub due_ts: f64,
    pub push_ts: f64,
    pub pop_ts: f64,
}

#[derive(Debug)]
pub struct Schedule {
    lookahead: f64,
    time_window: Interval,
    pos_window: Option<Interval>,
    /// Ascending by `due_ts`, ties in push order
    queue: Vec<Entry>,
}

impl Schedule {
    /// First window is closed: `[now, now + lookahead]`.
    pub fn new(now: f64, lookahead: f64) -> Result<Self, ContractError> {
        Ok(Self {
            lookahead,
            time_window: Interval::closed(now, now + lookahead)?,
            pos_window: None,
            queue: Vec::new(),
        })
    }

    /// Drop all tasks and restart the window as `<now, now + lookahead]`.
    pub fn advance(&mut self, now: f64) -> Result<(), ContractError> {
        if now < self.time_window.low() {
            warn!(
                behind_s = self.time_window.low() - now,
                "schedule advancing backwards"
            );
        }
        self.time_window = Interval::new(now, now + self.lookahead, false, true)?;
        self.queue.clear();
        self.pos_window = None;
        metrics::counter!("sequencer_window_advances_total").increment(1);
        Ok(())
    }

    /// Queue `task` for `due_ts`.
    ///
    /// Returns false if `due_ts` falls outside the window or before `now`.
    pub fn push(&mut self, now: f64, due_ts: f64, task: PointInfo) -> bool {
        if !self.time_window.covers_point(due_ts) {
            debug!(key = %task.key, due_ts, window = %self.time_window, "task outside window");
            return false;
        }
        if due_ts < now {
            debug!(key = %task.key, late_s = now - due_ts, "task pushed too late");
            observability::record_schedule_rejected();
            return false;
        }
        let pos = self.queue.partition_point(|e| e.due_ts <= due_ts);
        self.queue.insert(
            pos,
            Entry {
                due_ts,
                push_ts: now,
                task,
            },
        );
        true
    }

    /// Remove and return every task due at or before `now`.
    pub fn pop(&mut self, now: f64) -> Vec<DueTask> {
        let n = self.queue.partition_point(|e| e.due_ts <= now);
        self.queue
            .drain(..n)
            .map(|e| DueTask {
                task: e.task,
                due_ts: e.due_ts,
                push_ts: e.push_ts,
                pop_ts: now,
            })
            .collect()
    }

    /// Drop all tasks for `key`; returns how many were dropped.
    pub fn invalidate(&mut self, key: &str) -> usize {
        let before = self.queue.len();
        self.queue.retain(|e| e.task.key != key);
        before - self.queue.len()
    }

    pub fn is_expired(&self, now: f64) -> bool {
        now > self.time_window.high()
    }

    /// Due time of the next task, or the window end when the queue is empty.
    pub fn next_due(&self) -> f64 {
        self.queue
            .first()
            .map_or(self.time_window.high(), |e| e.due_ts)
    }

    /// Seconds from `ts` until the next task, or until the window expires.
    pub fn delay_next(&self, ts: f64) -> f64 {
        (self.next_due() - ts).max(0.0)
    }

    pub fn time_window(&self) -> &Interval {
        &self.time_window
    }

    pub fn pos_window(&self) -> Option<&Interval> {
        self.pos_window.as_ref()
    }

    pub fn set_pos_window(&mut self, window: Option<Interval>) {
        self.pos_window = window;
    }

    pub fn lookahead(&self) -> f64 {
        self.lookahead
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{CueKey, PointType};

    fn task(key: &str, point: f64) -> PointInfo {
        PointInfo {
            key: CueKey::from(key),
            interval: Interval::singular(point).unwrap(),
            point,
            point_type: PointType::Singular,
            data: None,
        }
    }

    #[test]
    fn test_push_keeps_due_order() {
        let mut s = Schedule::new(0.0, 5.0).unwrap();
        assert!(s.push(0.0, 3.0, task("c", 3.0)));
        assert!(s.push(0.0, 1.0, task("a", 1.0)));
        assert!(s.push(0.0, 2.0, task("b", 2.0)));
        assert!(s.push(0.0, 2.0, task("b2", 2.0)));

        let popped: Vec<String> = s.pop(2.5).iter().map(|t| t.task.key.to_string()).collect();
        assert_eq!(popped, vec!["a", "b", "b2"]);
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_push_rejects_outside_window_and_late() {
        let mut s = Schedule::new(0.0, 5.0).unwrap();
        assert!(!s.push(0.0, 5.5, task("x", 1.0)));
        assert!(!s.push(2.0, 1.0, task("late", 1.0)));
        assert!(s.push(0.0, 5.0, task("edge", 1.0)));

        s.advance(10.0).unwrap();
        // window is now <10, 15]
        assert!(!s.push(10.0, 10.0, task("start", 1.0)));
        assert!(s.push(10.0, 15.0, task("end", 1.0)));
    }

    #[test]
    fn test_pop_never_returns_future_tasks() {
        let mut s = Schedule::new(0.0, 5.0).unwrap();
        for (i, ts) in [0.5, 1.0, 1.5, 4.0].into_iter().enumerate() {
            s.push(0.0, ts, task(&format!("t{i}"), ts));
        }
        let due = s.pop(1.0);
        assert!(due.iter().all(|t| t.due_ts <= 1.0));
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].pop_ts, 1.0);
        assert_eq!(due[0].push_ts, 0.0);
    }

    #[test]
    fn test_advance_clears_queue_and_pos_window() {
        let mut s = Schedule::new(0.0, 5.0).unwrap();
        s.push(0.0, 1.0, task("a", 1.0));
        s.set_pos_window(Some(Interval::closed(0.0, 5.0).unwrap()));
        s.advance(3.0).unwrap();
        assert!(s.is_empty());
        assert!(s.pos_window().is_none());
        assert_eq!(s.time_window().low(), 3.0);
        assert!(!s.time_window().low_include());
        assert_eq!(s.time_window().high(), 8.0);
    }

    #[test]
    fn test_invalidate_by_key() {
        let mut s = Schedule::new(0.0, 5.0).unwrap();
        s.push(0.0, 1.0, task("a", 1.0));
        s.push(0.0, 2.0, task("b", 2.0));
        s.push(0.0, 3.0, task("a", 3.0));
        assert_eq!(s.invalidate("a"), 2);
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_delay_next_and_expiry() {
        let mut s = Schedule::new(0.0, 5.0).unwrap();
        assert_eq!(s.delay_next(1.0), 4.0);
        s.push(0.0, 2.0, task("a", 2.0));
        assert_eq!(s.delay_next(1.0), 1.0);
        assert_eq!(s.delay_next(3.0), 0.0);
        assert_eq!(s.next_due(), 2.0);
        assert!(!s.is_expired(5.0));
        assert!(s.is_expired(5.01));
    }
}
