//! 文件处理模块
//!
//! 单文件分析、串行批处理和批处理收尾（结果表、汇总、终端表格）。

use super::batch_state::{BatchStatsSnapshot, SerialBatchStats};
use super::cli::AppConfig;
use super::{formatter, utils};
use crate::error::{ErrorCategory, FragmentError, FragmentResult};
use crate::processing::{PeakRow, SampleAnalyzer, SampleOutcome};
use crate::trace::TraceSource;
use std::path::{Path, PathBuf};

/// 单个文件的处理结果（带原始索引，保证输出顺序）
#[derive(Debug)]
pub struct BatchEntry {
    /// 原始文件索引
    pub index: usize,
    pub file_path: PathBuf,
    pub result: FragmentResult<SampleOutcome>,
}

/// 批处理产物路径
#[derive(Debug, Clone, PartialEq)]
pub struct BatchArtifacts {
    pub table_path: PathBuf,
    pub summary_path: PathBuf,
}

/// 分析单个文件
pub fn process_single_file(
    path: &Path,
    analyzer: &SampleAnalyzer,
    source: &dyn TraceSource,
) -> FragmentResult<SampleOutcome> {
    analyzer.analyze_file(source, path)
}

/// 失败记录文本：文件名 + 原因
pub fn failure_entry(path: &Path, error: &FragmentError) -> String {
    format!("{} - {error}", utils::extract_filename_lossy(path))
}

/// 串行批处理：逐个文件分析，单个样本失败不影响后续文件
pub fn process_batch_serial(
    trace_files: &[PathBuf],
    analyzer: &SampleAnalyzer,
    source: &dyn TraceSource,
    config: &AppConfig,
) -> (Vec<BatchEntry>, BatchStatsSnapshot) {
    let mut stats = SerialBatchStats::new();
    let mut entries = Vec::with_capacity(trace_files.len());

    for (index, trace_file) in trace_files.iter().enumerate() {
        if config.verbose {
            println!(
                "[PROCESSING] [{}/{}] 处理 / Processing: {}",
                index + 1,
                trace_files.len(),
                utils::extract_filename_lossy(trace_file)
            );
        }

        let result = process_single_file(trace_file, analyzer, source);
        match &result {
            Ok(outcome) => {
                stats.inc_processed(outcome.is_no_peaks());
                if config.verbose {
                    if outcome.is_no_peaks() {
                        println!("   [INFO] 未找到峰 / No peaks found");
                    } else {
                        println!("   [OK] 处理成功 / Processing succeeded");
                    }
                }
            }
            Err(e) => {
                let category = ErrorCategory::from_error(e);
                report_failure(trace_file, e, category, index, trace_files.len(), config.verbose);
                stats.inc_failed(category, failure_entry(trace_file, e));
            }
        }

        entries.push(BatchEntry {
            index,
            file_path: trace_file.clone(),
            result,
        });
    }

    (entries, stats.snapshot())
}

/// 打印单个文件的失败信息
pub(crate) fn report_failure(
    path: &Path,
    error: &FragmentError,
    category: ErrorCategory,
    index: usize,
    total: usize,
    verbose: bool,
) {
    if verbose {
        println!("   [FAIL] 处理失败 / Processing failed");
        println!("      文件 / File: {}", path.display());
        println!("      类别 / Category: {}", category.display_name());
        println!("      错误 / Error: {error}");
        if let Some(source) = std::error::Error::source(error) {
            println!("      原因 / Cause: {source}");
        }
    } else {
        println!(
            "[FAIL] [{}/{}] {} - [{}] {error} / 处理失败",
            index + 1,
            total,
            utils::extract_filename_lossy(path),
            category.display_name()
        );
    }
}

/// 批处理收尾：按原始顺序合并结果行，写结果表和汇总文本，打印终端表格
pub fn finalize_batch(
    config: &AppConfig,
    mut entries: Vec<BatchEntry>,
    snapshot: &BatchStatsSnapshot,
) -> FragmentResult<BatchArtifacts> {
    entries.sort_by_key(|e| e.index);

    let outcomes: Vec<&SampleOutcome> = entries
        .iter()
        .filter_map(|e| e.result.as_ref().ok())
        .collect();
    let rows: Vec<PeakRow> = outcomes.iter().flat_map(|o| o.rows()).collect();

    let table_path = formatter::batch_output_path(config);
    formatter::write_peak_table(&table_path, &rows)?;

    let summary_path = formatter::sibling_path(&table_path, "_summary.txt");
    let summary = formatter::create_batch_summary(config, entries.len(), &outcomes, snapshot);
    formatter::write_text(&summary_path, &summary)?;

    if !outcomes.is_empty() {
        println!("{}", formatter::render_summary_table(&outcomes));
    }
    show_batch_completion_info(&table_path, &summary_path, snapshot, entries.len());

    Ok(BatchArtifacts {
        table_path,
        summary_path,
    })
}

/// 单文件模式输出：结果表 + 可选JSON报告 + 终端表格
pub fn output_single_result(
    config: &AppConfig,
    outcome: &SampleOutcome,
) -> FragmentResult<PathBuf> {
    let table_path = formatter::single_output_path(config);
    formatter::write_peak_table(&table_path, &outcome.rows())?;

    println!("{}", formatter::render_summary_table(&[outcome]));

    match outcome.report() {
        Some(report) => {
            if config.json {
                let json_path = formatter::sibling_path(&table_path, "_report.json");
                formatter::write_json_report(&json_path, report)?;
                println!("[INFO] JSON报告 / JSON report: {}", json_path.display());
            }
            if config.verbose {
                for assay in &report.assays {
                    for peak in &assay.peaks {
                        println!(
                            "--- assay {} / peak {} ---\n{}",
                            assay.number, peak.info.peak_number, peak.report
                        );
                    }
                }
            }
        }
        None => {
            println!(
                "[INFO] {} 中未找到峰，请检查原始数据 / No peaks could be found in {}",
                outcome.file_name(),
                outcome.file_name()
            );
        }
    }

    println!("[OK] 结果表 / Peak table: {}", table_path.display());
    Ok(table_path)
}

/// 显示批量处理完成信息
pub fn show_batch_completion_info(
    table_path: &Path,
    summary_path: &Path,
    snapshot: &BatchStatsSnapshot,
    total_count: usize,
) {
    println!();
    println!("[INFO] 批量处理完成 / Batch finished");
    println!(
        "   成功处理 / Processed: {} / {total_count} 个文件",
        snapshot.processed
    );
    if snapshot.no_peaks > 0 {
        println!("   无峰 / No peaks: {}", snapshot.no_peaks);
    }
    if snapshot.failed > 0 {
        println!("   失败文件 / Failed: {} 个", snapshot.failed);
    }
    println!();
    println!("   结果表 / Peak table: {}", table_path.display());
    println!("   汇总 / Summary: {}", summary_path.display());
}
