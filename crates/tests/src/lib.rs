//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约序列化测试
//! - 本地 motion 驱动的 e2e 测试（paused tokio 时间）
//! - 会话文件加载到 sequencer 的完整链路

#[cfg(test)]
mod contract_tests {
    use contracts::{Interval, IntervalSpec};

    #[test]
    fn test_interval_json_omits_infinite_bounds() {
        let interval = Interval::new(2.0, f64::INFINITY, true, false).unwrap();
        let json = serde_json::to_value(interval).unwrap();
        assert_eq!(json.get("high"), None);

        let back: Interval = serde_json::from_value(json).unwrap();
        assert_eq!(back, interval);
        assert!(back.high_include());
    }

    #[test]
    fn test_singular_spec_forces_inclusive() {
        let spec = IntervalSpec {
            low: Some(3.0),
            high: Some(3.0),
            low_include: Some(false),
            high_include: Some(false),
        };
        let interval = Interval::try_from(spec).unwrap();
        assert!(interval.is_singular());
        assert!(interval.covers_point(3.0));
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use sequencer::{
        Clock, CueChange, Direction, EventKind, Handler, Interval, LocalMotion, Notification,
        OpType, Sequencer, SequencerEvent, TokioClock, Verb,
    };

    type EventLog = Arc<Mutex<Vec<SequencerEvent>>>;

    fn event_logger() -> (Handler, EventLog) {
        let log: EventLog = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let handler: Handler = Arc::new(move |n: &Notification| match n {
            Notification::Events(events) => sink.lock().unwrap().extend(events.iter().cloned()),
            Notification::Enter(event) | Notification::Exit(event) => {
                sink.lock().unwrap().push((**event).clone())
            }
            _ => {}
        });
        (handler, log)
    }

    fn verbs(log: &EventLog) -> Vec<(String, Verb)> {
        log.lock()
            .unwrap()
            .iter()
            .map(|e| (e.key.to_string(), e.verb))
            .collect()
    }

    fn closed(low: f64, high: f64) -> Interval {
        Interval::closed(low, high).unwrap()
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    fn setup() -> (Arc<TokioClock>, Arc<LocalMotion>, Sequencer) {
        let clock = Arc::new(TokioClock::new());
        let motion = Arc::new(LocalMotion::new(clock.clone(), Interval::unbounded()));
        let sequencer = Sequencer::new(motion.clone(), clock.clone()).unwrap();
        (clock, motion, sequencer)
    }

    /// 静止于 0，订阅 enter 后恰好收到一次 A 的合成 enter
    #[tokio::test(start_paused = true)]
    async fn test_rest_subscription_replays_once() {
        let (_clock, motion, sequencer) = setup();
        sequencer.add_cue("A", closed(0.0, 1.0), None).unwrap();
        motion.update(Some(0.0), Some(0.0), Some(0.0)).unwrap();
        settle().await;

        let (handler, log) = event_logger();
        sequencer.on(EventKind::Enter, handler).unwrap();
        settle().await;
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(verbs(&log), vec![("A".to_string(), Verb::Enter)]);
        sequencer.shutdown().await;
    }

    /// 从 0 以速度 1 出发，到达 1 时 A 退出
    #[tokio::test(start_paused = true)]
    async fn test_exit_fires_at_boundary() {
        let (clock, motion, sequencer) = setup();
        sequencer.add_cue("A", closed(0.0, 1.0), None).unwrap();
        let (handler, log) = event_logger();
        sequencer.on(EventKind::Exit, handler).unwrap();

        motion.update(Some(0.0), Some(1.0), Some(0.0)).unwrap();
        tokio::time::sleep(Duration::from_millis(900)).await;
        assert!(log.lock().unwrap().is_empty());
        assert!(sequencer.is_active("A"));

        tokio::time::sleep(Duration::from_millis(200)).await;
        let log = log.lock().unwrap();
        assert_eq!(log.len(), 1);
        let exit = &log[0];
        assert_eq!(exit.verb, Verb::Exit);
        assert_eq!(exit.point, 1.0);
        assert_eq!(exit.direction, Direction::Forwards);
        assert!((exit.due_ts - 1.0).abs() < 1e-9);
        assert!(exit.delay >= 0.0);
        assert!(clock.now() >= 1.0);
        assert!(!sequencer.is_active("A"));
    }

    /// B = [0,5)，C = [5,10]，前进到 5：exit(B) 先于 enter(C)
    #[tokio::test(start_paused = true)]
    async fn test_adjacent_cues_exit_before_enter() {
        let (_clock, motion, sequencer) = setup();
        sequencer
            .add_cue("B", Interval::new(0.0, 5.0, true, false).unwrap(), None)
            .unwrap();
        sequencer.add_cue("C", closed(5.0, 10.0), None).unwrap();
        let (handler, log) = event_logger();
        sequencer.on(EventKind::Events, handler).unwrap();

        motion.update(Some(4.0), Some(1.0), Some(0.0)).unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(
            verbs(&log),
            vec![
                ("B".to_string(), Verb::Enter),
                ("B".to_string(), Verb::Exit),
                ("C".to_string(), Verb::Enter),
            ]
        );
        assert_eq!(sequencer.active_keys(), vec!["C"]);
        sequencer.shutdown().await;
    }

    /// add_cue 紧接 remove_cue：Create 然后 Remove，且没有任何通知
    #[tokio::test(start_paused = true)]
    async fn test_add_then_remove_is_silent() {
        let (_clock, motion, sequencer) = setup();
        motion.update(Some(0.5), Some(0.0), Some(0.0)).unwrap();
        settle().await;
        let (handler, log) = event_logger();
        sequencer.on(EventKind::Events, handler).unwrap();
        settle().await;

        let created = sequencer.add_cue("x", closed(0.0, 1.0), None).unwrap();
        let removed = sequencer.remove_cue("x").unwrap();
        settle().await;

        assert_eq!(created[0].op_type, OpType::Create);
        assert_eq!(removed[0].op_type, OpType::Remove);
        assert!(log.lock().unwrap().is_empty());
        assert!(!sequencer.is_active("x"));
    }

    /// add_cue 后同一 tick 内 motion 跳走：无论驱动先处理哪一个，x 都不应保持活跃
    #[tokio::test(start_paused = true)]
    async fn test_edit_then_motion_jump_settles_on_coverage() {
        for _ in 0..40 {
            let (_clock, motion, sequencer) = setup();
            motion.update(Some(0.0), Some(0.0), Some(0.0)).unwrap();
            settle().await;

            sequencer.add_cue("x", closed(-1.0, 1.0), None).unwrap();
            motion.update(Some(10.0), Some(0.0), Some(0.0)).unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;

            assert!(!sequencer.is_active("x"));
            assert!(sequencer.get_cues_by_point(10.0).is_empty());
            sequencer.shutdown().await;
        }
    }

    /// 静止时活跃集合等于覆盖当前位置的 cue 集合
    #[tokio::test(start_paused = true)]
    async fn test_active_set_matches_coverage() {
        let (clock, motion, sequencer) = setup();
        let mut request = sequencer.request();
        for i in 0..12 {
            let low = i as f64;
            request.add_cue(
                format!("span{i}"),
                Interval::new(low, low + 2.0, true, false).unwrap(),
                None,
            );
            request.add_cue(format!("mark{i}"), Interval::singular(low + 0.5).unwrap(), None);
        }
        request.submit().unwrap();

        motion.update(Some(0.0), Some(0.5), Some(0.1)).unwrap();

        // Sampled at t = 1.3, 4.0, 8.1 and 15.0, away from any cue boundary
        for step in [1.3, 2.7, 4.1, 6.9] {
            tokio::time::sleep(Duration::from_secs_f64(step)).await;
            let position = motion_position(&motion, clock.now());

            let mut expected: Vec<String> = sequencer
                .get_cues_by_point(position)
                .into_iter()
                .map(|cue| cue.key.to_string())
                .collect();
            expected.sort();
            let mut active: Vec<String> = sequencer
                .active_keys()
                .into_iter()
                .map(|key| key.to_string())
                .collect();
            active.sort();
            assert_eq!(active, expected, "position {position}");
        }
        sequencer.shutdown().await;
    }

    fn motion_position(motion: &LocalMotion, now: f64) -> f64 {
        use sequencer::Motion;
        let info = motion.info().unwrap();
        sequencer::calculate_vector(&info.vector, now).position
    }

    /// 反向运动时事件方向为 Backwards
    #[tokio::test(start_paused = true)]
    async fn test_backwards_motion_reverses_order() {
        let (_clock, motion, sequencer) = setup();
        sequencer.add_cue("low", closed(0.0, 2.0), None).unwrap();
        sequencer.add_cue("high", closed(3.0, 5.0), None).unwrap();
        let (handler, log) = event_logger();
        sequencer.on(EventKind::Events, handler).unwrap();

        motion.update(Some(4.0), Some(-1.0), Some(0.0)).unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;

        assert_eq!(
            verbs(&log),
            vec![
                ("high".to_string(), Verb::Enter),
                ("high".to_string(), Verb::Exit),
                ("low".to_string(), Verb::Enter),
            ]
        );
        let log = log.lock().unwrap();
        assert_eq!(log[1].point, 3.0);
        assert_eq!(log[1].direction, Direction::Backwards);
        assert_eq!(log[2].point, 2.0);
    }

    /// 一个处理器 panic 不影响其他处理器
    #[tokio::test(start_paused = true)]
    async fn test_handler_panic_is_isolated() {
        let (_clock, motion, sequencer) = setup();
        sequencer.add_cue("A", closed(0.0, 1.0), None).unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let faulty: Handler = Arc::new(move |_: &Notification| {
            counter.fetch_add(1, Ordering::SeqCst);
            panic!("handler failure");
        });
        sequencer.on(EventKind::Events, faulty).unwrap();
        let (handler, log) = event_logger();
        sequencer.on(EventKind::Events, handler).unwrap();

        motion.update(Some(0.0), Some(1.0), Some(0.0)).unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(
            verbs(&log),
            vec![("A".to_string(), Verb::Enter), ("A".to_string(), Verb::Exit)]
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!sequencer.is_closed());
    }

    /// 修改活跃 cue 的数据产生 change 通知
    #[tokio::test(start_paused = true)]
    async fn test_data_edit_on_active_cue_emits_change() {
        let (_clock, motion, sequencer) = setup();
        sequencer.add_cue("A", closed(0.0, 10.0), None).unwrap();
        motion.update(Some(1.0), Some(0.0), Some(0.0)).unwrap();
        settle().await;

        let changes: Arc<Mutex<Vec<CueChange>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = changes.clone();
        sequencer
            .on(
                EventKind::Change,
                Arc::new(move |n: &Notification| {
                    if let Notification::Change(change) = n {
                        sink.lock().unwrap().push((**change).clone());
                    }
                }),
            )
            .unwrap();
        let (handler, log) = event_logger();
        sequencer.on(EventKind::Events, handler).unwrap();
        settle().await;
        log.lock().unwrap().clear();

        let ops = sequencer
            .add_cue("A", closed(0.0, 10.0), Some(serde_json::json!({ "label": "edited" })))
            .unwrap();
        settle().await;

        assert_eq!(ops[0].op_type, OpType::Noop);
        let changes = changes.lock().unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].key, "A");
        assert_eq!(
            changes[0].data,
            Some(serde_json::json!({ "label": "edited" }))
        );
        assert!(log.lock().unwrap().is_empty());
    }

    /// motion 关闭后 sequencer 拒绝编辑
    #[tokio::test(start_paused = true)]
    async fn test_closed_motion_rejects_edits() {
        let (_clock, motion, sequencer) = setup();
        motion.update(Some(0.0), Some(0.0), Some(0.0)).unwrap();
        settle().await;
        motion.close();
        settle().await;

        let (handler, _) = event_logger();
        assert!(matches!(
            sequencer.on(EventKind::Events, handler),
            Err(sequencer::SequencerError::MotionClosed)
        ));
    }
}

#[cfg(test)]
mod session_tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use observability::DeliveryStatsAggregator;
    use sequencer::{
        EventKind, LocalMotion, Notification, Sequencer, StaticProvider, TokioClock, Verb,
    };

    const SESSION: &str = r#"
[sequencer]
lookahead_s = 2.0

[motion]
position = 0.0
velocity = 2.0
range_low = 0.0
range_high = 100.0

[[cues]]
key = "intro"
low = 0.0
high = 3.0

[[cues]]
key = "beat"
low = 4.0
high = 4.0

[cues.data]
label = "drop"

[[cues]]
key = "outro"
low = 8.0
"#;

    /// 会话文件 -> StaticProvider -> Sequencer -> 聚合统计
    #[tokio::test(start_paused = true)]
    async fn test_session_file_drives_sequencer() {
        let session = ConfigLoader::load_from_str(SESSION, ConfigFormat::Toml).unwrap();

        let clock = Arc::new(TokioClock::new());
        let motion = Arc::new(LocalMotion::new(
            clock.clone(),
            session.motion.range().unwrap(),
        ));
        let provider = Arc::new(StaticProvider::new(session.cue_ops().unwrap()));
        let sequencer =
            Sequencer::with_config(motion.clone(), clock, provider, &session.sequencer).unwrap();
        assert_eq!(sequencer.keys().len(), 3);

        let stats = Arc::new(Mutex::new(DeliveryStatsAggregator::new()));
        let order = Arc::new(Mutex::new(Vec::new()));
        let (stats_sink, order_sink) = (stats.clone(), order.clone());
        sequencer
            .on(
                EventKind::Events,
                Arc::new(move |n: &Notification| {
                    if let Notification::Events(events) = n {
                        let mut stats = stats_sink.lock().unwrap();
                        let mut order = order_sink.lock().unwrap();
                        for event in events.iter() {
                            stats.update(event);
                            order.push((event.key.to_string(), event.verb, event.data.clone()));
                        }
                    }
                }),
            )
            .unwrap();

        let setup = &session.motion;
        motion
            .update(
                Some(setup.position),
                Some(setup.velocity),
                Some(setup.acceleration),
            )
            .unwrap();
        tokio::time::sleep(Duration::from_millis(4500)).await;

        let order = order.lock().unwrap();
        let keys: Vec<(&str, Verb)> = order.iter().map(|(k, v, _)| (k.as_str(), *v)).collect();
        assert_eq!(
            keys,
            vec![
                ("intro", Verb::Enter),
                ("intro", Verb::Exit),
                ("beat", Verb::Enter),
                ("beat", Verb::Exit),
                ("outro", Verb::Enter),
            ]
        );
        assert_eq!(order[2].2, Some(serde_json::json!({ "label": "drop" })));

        let summary = stats.lock().unwrap().summary();
        assert_eq!(summary.total_events, 5);
        assert_eq!(summary.enters, 3);
        assert_eq!(summary.key_counts.get("beat"), Some(&2));
        assert_eq!(sequencer.active_keys(), vec!["outro"]);
        sequencer.shutdown().await;
    }
}
