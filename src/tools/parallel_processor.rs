//! 多文件并行处理模块
//!
//! 使用rayon实现文件级并行处理，按原始索引排序保证输出顺序一致

use super::batch_state::{BatchStatsSnapshot, ParallelBatchStats};
use super::cli::AppConfig;
use super::processor::{self, BatchEntry};
use super::utils;
use crate::error::{ErrorCategory, FragmentError, FragmentResult};
use crate::processing::SampleAnalyzer;
use crate::trace::TraceSource;
use rayon::prelude::*;
use std::path::PathBuf;

/// 多文件并行处理
///
/// 样本之间没有共享可变状态，统计信息通过 `ParallelBatchStats` 汇总。
pub fn process_batch_parallel(
    trace_files: &[PathBuf],
    analyzer: &SampleAnalyzer,
    source: &dyn TraceSource,
    config: &AppConfig,
    parallel_degree: usize,
) -> FragmentResult<(Vec<BatchEntry>, BatchStatsSnapshot)> {
    println!("[INFO] 多文件并行处理 / Parallel processing: {parallel_degree} 并发度");

    let stats = ParallelBatchStats::new();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(parallel_degree)
        .thread_name(|i| format!("fragscope-worker-{i}"))
        .build()
        .map_err(|e| FragmentError::ResourceError(format!("线程池创建失败: {e}")))?;

    let mut entries: Vec<BatchEntry> = pool.install(|| {
        trace_files
            .par_iter()
            .enumerate()
            .map(|(index, trace_file)| {
                if !config.verbose {
                    print!(".");
                    use std::io::Write;
                    std::io::stdout().flush().ok();
                }

                let result = processor::process_single_file(trace_file, analyzer, source);

                match &result {
                    Ok(outcome) => {
                        let count = stats.inc_processed(outcome.is_no_peaks());
                        if config.verbose {
                            println!(
                                "[OK] [{}/{}] {}",
                                count,
                                trace_files.len(),
                                utils::extract_filename_lossy(trace_file)
                            );
                        }
                    }
                    Err(e) => {
                        let category = ErrorCategory::from_error(e);
                        let entry = processor::failure_entry(trace_file, e);
                        let count = stats.inc_failed(category, entry);
                        if config.verbose {
                            println!(
                                "[FAIL] [{}/{}] {} - {e}",
                                count,
                                trace_files.len(),
                                utils::extract_filename_lossy(trace_file)
                            );
                        }
                    }
                }

                BatchEntry {
                    index,
                    file_path: trace_file.clone(),
                    result,
                }
            })
            .collect()
    });

    if !config.verbose {
        println!();
    }

    entries.sort_by_key(|e| e.index);
    Ok((entries, stats.snapshot()))
}
