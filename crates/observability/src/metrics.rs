//! Sequencer 指标收集模块
//!
//! 记录通知投递、调度拒绝与处理器故障，并在内存中聚合投递延迟。

use std::collections::HashMap;

use contracts::{SequencerEvent, Verb};
use metrics::{counter, gauge, histogram};

/// 记录一次已投递的 enter/exit 事件
///
/// `delay` 为 `delivery_ts - due_ts`（秒）。
pub fn record_event_emitted(verb: &'static str, delay: f64) {
    counter!("sequencer_events_total", "verb" => verb).increment(1);
    histogram!("sequencer_event_delay_seconds").record(delay);
}

/// 记录因到期时间已过而被调度器拒绝的任务
pub fn record_schedule_rejected() {
    counter!("sequencer_schedule_rejected_total").increment(1);
}

/// 记录处理器 panic
pub fn record_handler_fault(kind: &'static str) {
    counter!("sequencer_handler_faults_total", "kind" => kind).increment(1);
}

/// 记录当前活跃 cue 数量
pub fn record_active_cues(count: usize) {
    gauge!("sequencer_active_cues").set(count as f64);
}

/// 投递指标聚合器
///
/// 在内存中聚合事件，便于运行结束时输出摘要。
#[derive(Debug, Clone, Default)]
pub struct DeliveryStatsAggregator {
    /// 事件总数
    pub total_events: u64,

    pub enters: u64,

    pub exits: u64,

    /// change 通知条数
    pub changes: u64,

    /// 投递延迟统计（毫秒）
    pub delay_stats: RunningStats,

    /// 各 cue 的事件次数
    pub key_counts: HashMap<String, u64>,
}

impl DeliveryStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, event: &SequencerEvent) {
        self.total_events += 1;
        match event.verb {
            Verb::Enter => self.enters += 1,
            Verb::Exit => self.exits += 1,
        }
        self.delay_stats.push(event.delay * 1000.0);
        *self.key_counts.entry(event.key.to_string()).or_insert(0) += 1;
    }

    pub fn record_changes(&mut self, count: usize) {
        self.changes += count as u64;
    }

    /// 生成摘要报告
    pub fn summary(&self) -> DeliverySummary {
        DeliverySummary {
            total_events: self.total_events,
            enters: self.enters,
            exits: self.exits,
            changes: self.changes,
            delay_ms: StatsSummary::from(&self.delay_stats),
            key_counts: self.key_counts.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 投递摘要
#[derive(Debug, Clone, Default)]
pub struct DeliverySummary {
    pub total_events: u64,
    pub enters: u64,
    pub exits: u64,
    pub changes: u64,
    pub delay_ms: StatsSummary,
    pub key_counts: HashMap<String, u64>,
}

impl std::fmt::Display for DeliverySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Sequencer Delivery Summary ===")?;
        writeln!(
            f,
            "Events: {} (enter {}, exit {})",
            self.total_events, self.enters, self.exits
        )?;
        writeln!(f, "Changes: {}", self.changes)?;
        writeln!(f, "Delay (ms): {}", self.delay_ms)?;

        if !self.key_counts.is_empty() {
            writeln!(f, "Events per cue:")?;
            let mut keys: Vec<_> = self.key_counts.iter().collect();
            keys.sort();
            for (key, count) in keys {
                writeln!(f, "  {}: {}", key, count)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
