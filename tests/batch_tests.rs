//! 批处理集成测试
//!
//! 在临时目录中写出CSV轨迹文件，验证加载器、串行/并行批处理、失败隔离和结果表输出。


use fragscope::error::{ErrorCategory, FragmentError};
use fragscope::processing::SampleAnalyzer;
use fragscope::tools::{self, AppConfig, cli};
use fragscope::trace::{ChannelSelectors, DelimitedTraceSource, TraceSource};
use std::path::{Path, PathBuf};
use trace_fixtures::*;

fn batch_config(dir: &Path) -> AppConfig {
    let dir = dir.to_string_lossy().to_string();
    cli::try_parse_from(["fragscope", dir.as_str(), "--ladder", "ROX"]).expect("参数应该有效")
}

/// good.csv（两个assay）、flat.csv（无峰）、broken.csv（缺少阶梯通道）
fn write_batch_dir(dir: &Path) -> Vec<PathBuf> {
    write_trace_csv(&dir.join("good.csv"), &two_assay_sample(), &rox_ladder());
    write_trace_csv(&dir.join("flat.csv"), &flat_sample(), &rox_ladder());
    std::fs::write(dir.join("broken.csv"), "DATA1,DATA2\n1,2\n3,4\n").unwrap();

    let source = DelimitedTraceSource::new();
    tools::scan_trace_files(dir, source.extensions(), false).unwrap()
}

#[test]
fn test_csv_loader_selects_channels() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("good.csv");
    write_trace_csv(&path, &two_assay_sample(), &rox_ladder());

    let channels = ChannelSelectors {
        trace_channel: SAMPLE_CHANNEL.to_string(),
        size_standard_channel: LADDER_CHANNEL.to_string(),
    };
    let input = DelimitedTraceSource::new().load(&path, &channels).unwrap();

    assert_eq!(input.file_name, "good.csv");
    assert_eq!(input.sample.len(), TRACE_LEN);
    assert_eq!(input.size_standard.intensities(), rox_ladder().as_slice());
    log("CSV加载器按列名取通道", "CSV loader picks channels by header");
}

#[test]
fn test_rox_cli_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = batch_config(dir.path());
    assert!(config.is_batch_mode());

    let sample = config.sample_config().unwrap();
    assert_eq!(sample.size_standard_channel, LADDER_CHANNEL);
    assert_eq!(sample.trace_channel, SAMPLE_CHANNEL);
}

#[test]
fn test_unsupported_model_fails_before_processing() {
    let result = cli::try_parse_from(["fragscope", "run.csv", "--peak-model", "cauchy"])
        .unwrap()
        .sample_config();
    assert!(matches!(result, Err(FragmentError::UnsupportedModel { .. })));
}

#[test]
fn test_serial_batch_isolates_failures() {
    let dir = tempfile::tempdir().unwrap();
    let files = write_batch_dir(dir.path());
    assert_eq!(files.len(), 3);

    let config = batch_config(dir.path());
    let analyzer = SampleAnalyzer::new(config.sample_config().unwrap()).unwrap();
    let source = DelimitedTraceSource::new();

    let (entries, snapshot) = tools::process_batch_serial(&files, &analyzer, &source, &config);
    log(
        format!(
            "成功 {} / 无峰 {} / 失败 {}",
            snapshot.processed, snapshot.no_peaks, snapshot.failed
        ),
        "processed / no peaks / failed",
    );
    assert_eq!(snapshot.processed, 2);
    assert_eq!(snapshot.no_peaks, 1);
    assert_eq!(snapshot.failed, 1);
    assert_eq!(snapshot.error_stats[&ErrorCategory::Input].len(), 1);
    assert!(snapshot.error_stats[&ErrorCategory::Input][0].starts_with("broken.csv - "));

    let artifacts = tools::finalize_batch(&config, entries, &snapshot).unwrap();
    let table = std::fs::read_to_string(&artifacts.table_path).unwrap();
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines.len(), 1 + 5, "表头 + good.csv 的5个峰");
    assert!(lines[1..].iter().all(|l| l.starts_with("good.csv,")));

    let summary = std::fs::read_to_string(&artifacts.summary_path).unwrap();
    assert!(summary.contains("flat.csv"));
    assert!(summary.contains("broken.csv"));
}

#[test]
fn test_parallel_batch_matches_serial() {
    let dir = tempfile::tempdir().unwrap();
    let files = write_batch_dir(dir.path());

    let config = batch_config(dir.path());
    let analyzer = SampleAnalyzer::new(config.sample_config().unwrap()).unwrap();
    let source = DelimitedTraceSource::new();

    let (serial, _) = tools::process_batch_serial(&files, &analyzer, &source, &config);
    let (parallel, snapshot) =
        tools::process_batch_parallel(&files, &analyzer, &source, &config, 2).unwrap();

    assert_eq!(snapshot.processed, 2);
    assert_eq!(snapshot.failed, 1);

    let indices: Vec<usize> = parallel.iter().map(|e| e.index).collect();
    assert_eq!(indices, vec![0, 1, 2], "并行结果必须按原始顺序排列");

    let rows = |entries: &[tools::BatchEntry]| -> Vec<_> {
        entries
            .iter()
            .filter_map(|e| e.result.as_ref().ok())
            .flat_map(|o| o.rows())
            .collect()
    };
    assert_eq!(rows(&serial), rows(&parallel));
}

#[test]
fn test_batch_rerun_ignores_previous_outputs() {
    let dir = tempfile::tempdir().unwrap();
    write_trace_csv(&dir.path().join("good.csv"), &two_assay_sample(), &rox_ladder());

    let mut config = batch_config(dir.path());
    config.parallel_files = None;
    let analyzer = SampleAnalyzer::new(config.sample_config().unwrap()).unwrap();
    let source = DelimitedTraceSource::new();

    let mut tables = Vec::new();
    for run in 1..=2 {
        let files = tools::scan_trace_files(dir.path(), source.extensions(), false).unwrap();
        assert_eq!(files.len(), 1, "第{run}次扫描只应包含样本文件");

        let (entries, snapshot) = tools::process_batch_serial(&files, &analyzer, &source, &config);
        log(
            format!("第{run}次: 成功 {} / 失败 {}", snapshot.processed, snapshot.failed),
            "rerun statistics",
        );
        assert_eq!(snapshot.processed, 1);
        assert_eq!(snapshot.failed, 0);

        let artifacts = tools::finalize_batch(&config, entries, &snapshot).unwrap();
        tables.push(std::fs::read_to_string(&artifacts.table_path).unwrap());
    }
    assert_eq!(tables[0], tables[1], "重复批处理的结果表必须一致");
}
