//! 批处理状态管理模块
//!
//! 提供统一的批处理统计管理，支持串行和并行两种模式。
//! "无峰"样本单独计数：它们不是失败，但也不产生结果行。

use crate::error::ErrorCategory;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// 批处理统计快照
#[derive(Debug, Clone, Default)]
pub struct BatchStatsSnapshot {
    /// 成功分析的文件数
    pub processed: usize,
    /// 无峰文件数（计入processed）
    pub no_peaks: usize,
    /// 失败的文件数
    pub failed: usize,
    /// 错误分类统计（错误类型 -> 失败文件及原因）
    pub error_stats: HashMap<ErrorCategory, Vec<String>>,
}

impl BatchStatsSnapshot {
    /// 按类别排序的错误统计（输出稳定）
    pub fn sorted_errors(&self) -> Vec<(ErrorCategory, &Vec<String>)> {
        let mut entries: Vec<_> = self.error_stats.iter().map(|(k, v)| (*k, v)).collect();
        entries.sort_by_key(|(k, _)| *k);
        entries
    }
}

/// 串行批处理统计（单线程）
#[derive(Debug, Default)]
pub struct SerialBatchStats {
    processed: usize,
    no_peaks: usize,
    failed: usize,
    error_stats: HashMap<ErrorCategory, Vec<String>>,
}

impl SerialBatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// 增加成功处理计数
    #[inline]
    pub fn inc_processed(&mut self, no_peaks: bool) -> usize {
        self.processed += 1;
        if no_peaks {
            self.no_peaks += 1;
        }
        self.processed
    }

    /// 增加失败计数并记录错误分类
    #[inline]
    pub fn inc_failed(&mut self, category: ErrorCategory, entry: String) -> usize {
        self.failed += 1;
        self.error_stats.entry(category).or_default().push(entry);
        self.failed
    }

    pub fn snapshot(&self) -> BatchStatsSnapshot {
        BatchStatsSnapshot {
            processed: self.processed,
            no_peaks: self.no_peaks,
            failed: self.failed,
            error_stats: self.error_stats.clone(),
        }
    }
}

/// 并行批处理统计（多线程安全）
#[derive(Debug, Clone, Default)]
pub struct ParallelBatchStats {
    processed: Arc<AtomicUsize>,
    no_peaks: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,
    error_stats: Arc<Mutex<HashMap<ErrorCategory, Vec<String>>>>,
}

impl ParallelBatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// 增加成功处理计数（线程安全）
    #[inline]
    pub fn inc_processed(&self, no_peaks: bool) -> usize {
        if no_peaks {
            self.no_peaks.fetch_add(1, Ordering::Relaxed);
        }
        self.processed.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// 增加失败计数并记录错误分类（线程安全）
    pub fn inc_failed(&self, category: ErrorCategory, entry: String) -> usize {
        let count = self.failed.fetch_add(1, Ordering::Relaxed) + 1;

        if let Ok(mut stats) = self.error_stats.lock() {
            stats.entry(category).or_default().push(entry);
        }

        count
    }

    pub fn snapshot(&self) -> BatchStatsSnapshot {
        BatchStatsSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            no_peaks: self.no_peaks.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            error_stats: self
                .error_stats
                .lock()
                .map(|stats| stats.clone())
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FragmentError;

    #[test]
    fn test_serial_stats_basic() {
        let mut stats = SerialBatchStats::new();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.processed, 0);
        assert!(snapshot.error_stats.is_empty());

        assert_eq!(stats.inc_processed(false), 1);
        assert_eq!(stats.inc_processed(true), 2);

        let category = ErrorCategory::from_error(&FragmentError::Assignment("none".to_string()));
        assert_eq!(stats.inc_failed(category, "a.csv".to_string()), 1);
        assert_eq!(stats.inc_failed(category, "b.csv".to_string()), 2);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.processed, 2);
        assert_eq!(snapshot.no_peaks, 1);
        assert_eq!(snapshot.failed, 2);
        assert_eq!(snapshot.error_stats[&ErrorCategory::Ladder].len(), 2);
    }

    #[test]
    fn test_sorted_errors_order() {
        let mut stats = SerialBatchStats::new();
        stats.inc_failed(ErrorCategory::Fitting, "f.csv".to_string());
        stats.inc_failed(ErrorCategory::Input, "i.csv".to_string());
        let snapshot = stats.snapshot();
        let order: Vec<ErrorCategory> = snapshot.sorted_errors().iter().map(|(k, _)| *k).collect();
        assert_eq!(order, vec![ErrorCategory::Input, ErrorCategory::Fitting]);
    }

    #[test]
    fn test_parallel_stats_concurrent_updates() {
        use rayon::prelude::*;

        let stats = ParallelBatchStats::new();

        (0..100).into_par_iter().for_each(|i| {
            stats.inc_processed(i % 10 == 0);
        });
        (0..50).into_par_iter().for_each(|i| {
            stats.inc_failed(ErrorCategory::Input, format!("file{i}.csv"));
        });

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.processed, 100);
        assert_eq!(snapshot.no_peaks, 10);
        assert_eq!(snapshot.failed, 50);
        assert_eq!(snapshot.error_stats[&ErrorCategory::Input].len(), 50);
    }

    #[test]
    fn test_parallel_stats_clone_shares_state() {
        let stats1 = ParallelBatchStats::new();
        stats1.inc_processed(false);
        let stats2 = stats1.clone();
        stats2.inc_processed(false);
        assert_eq!(stats1.snapshot().processed, 2);
    }
}
