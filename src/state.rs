//! 线程安全的阶段状态
//!
//! 每个并发阶段（DNS暴破、HTTP探测）只共享两样东西：结果收集器和已处理计数器。
//! `StageState` 把两者封装在一起，由所有worker克隆持有。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use log::info;

/// 并发阶段的共享状态
#[derive(Debug, Clone)]
pub struct StageState {
    label: &'static str,
    total: usize,
    report_every: usize,
    processed: Arc<AtomicUsize>,
    results: Arc<Mutex<Vec<String>>>,
}

impl StageState {
    /// 创建新的阶段状态，`report_every` 为进度输出间隔
    pub fn new(label: &'static str, total: usize, report_every: usize) -> Self {
        StageState {
            label,
            total,
            report_every: report_every.max(1),
            processed: Arc::new(AtomicUsize::new(0)),
            results: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// 记录一个成功结果（按完成顺序追加）
    pub fn add_result(&self, value: String) {
        if let Ok(mut results) = self.results.lock() {
            results.push(value);
        }
    }

    /// 标记一个工作单元已完成，返回完成后的计数
    pub fn mark_processed(&self) -> usize {
        let processed = self.processed.fetch_add(1, Ordering::SeqCst) + 1;
        if self.should_report(processed) {
            let percent = processed as f64 / self.total.max(1) as f64 * 100.0;
            info!(
                "{} progress: {}/{} ({:.1}%)",
                self.label, processed, self.total, percent
            );
        }
        processed
    }

    /// 是否到达进度输出点：每 `report_every` 个或最后一个
    pub fn should_report(&self, processed: usize) -> bool {
        processed % self.report_every == 0 || processed == self.total
    }

    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// 取出所有结果
    pub fn take_results(&self) -> Vec<String> {
        match self.results.lock() {
            Ok(mut results) => std::mem::take(&mut *results),
            Err(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_thread_safety() {
        let state = StageState::new("test", 10, 500);
        let mut handles = vec![];

        for i in 0..10 {
            let state_clone = state.clone();
            handles.push(thread::spawn(move || {
                state_clone.add_result(format!("test{}.example.com", i));
                state_clone.mark_processed();
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(state.processed(), 10);
        let mut results = state.take_results();
        results.sort();
        assert_eq!(results.len(), 10);
        assert_eq!(results[0], "test0.example.com");
        assert!(state.take_results().is_empty());
    }

    #[test]
    fn test_report_cadence() {
        let state = StageState::new("bruteforce", 1203, 500);
        assert!(!state.should_report(1));
        assert!(state.should_report(500));
        assert!(!state.should_report(501));
        assert!(state.should_report(1000));
        assert!(state.should_report(1203));

        let probe = StageState::new("probe", 7, 5);
        let reported: Vec<usize> = (1..=7).filter(|n| probe.should_report(*n)).collect();
        assert_eq!(reported, vec![5, 7]);
    }

    #[test]
    fn test_state_isolation() {
        let state1 = StageState::new("a", 1, 1);
        let state2 = StageState::new("b", 1, 1);
        state1.add_result("test1.example.com".to_string());
        state2.add_result("test2.example.com".to_string());
        assert_eq!(state1.take_results(), vec!["test1.example.com"]);
        assert_eq!(state2.take_results(), vec!["test2.example.com"]);
    }
}
