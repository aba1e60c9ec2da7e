//! 输出格式化模块
//!
//! 结果表（CSV/TSV）、批量汇总文本、单样本JSON报告和终端汇总表格。

use super::batch_state::BatchStatsSnapshot;
use super::cli::AppConfig;
use super::utils;
use crate::error::{FragmentError, FragmentResult, format_error};
use crate::processing::{PeakRow, SampleOutcome, SampleReport};
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::UTF8_FULL};
use std::io::Write;
use std::path::{Path, PathBuf};

/// 应用程序版本信息
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 按扩展名选择分隔符（.tsv/.txt为制表符，其余为逗号）
pub fn delimiter_for_output(path: &Path) -> u8 {
    match utils::extension_lowercase(path).as_deref() {
        Some("tsv") | Some("txt") => b'\t',
        _ => b',',
    }
}

/// 把结果行写入任意writer
pub fn write_peak_rows<W: Write>(writer: W, rows: &[PeakRow], delimiter: u8) -> FragmentResult<()> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// 写出结果表文件；没有任何行时只写表头
pub fn write_peak_table(path: &Path, rows: &[PeakRow]) -> FragmentResult<()> {
    let delimiter = delimiter_for_output(path);
    if rows.is_empty() {
        let header = PEAK_TABLE_COLUMNS.join(if delimiter == b'\t' { "\t" } else { "," });
        std::fs::write(path, format!("{header}\n"))?;
        return Ok(());
    }
    let file = std::fs::File::create(path)?;
    write_peak_rows(file, rows, delimiter)
}

/// 结果表列名（与 `PeakRow` 字段顺序一致）
pub const PEAK_TABLE_COLUMNS: [&str; 12] = [
    "file_name",
    "assay_number",
    "peak_name",
    "peak_number",
    "model",
    "time",
    "basepairs",
    "peak_height",
    "fitted_peak_height",
    "area",
    "quotient",
    "calibration_r2",
];

/// 写出单样本JSON报告
pub fn write_json_report(path: &Path, report: &SampleReport) -> FragmentResult<()> {
    let json =
        serde_json::to_string_pretty(report).map_err(|e| format_error("JSON序列化失败", e))?;
    std::fs::write(path, json)?;
    Ok(())
}

/// 单文件模式结果表路径：未指定时放在输入文件旁边
pub fn single_output_path(config: &AppConfig) -> PathBuf {
    config.output_path.clone().unwrap_or_else(|| {
        let stem = utils::extract_file_stem_string(&config.input_path);
        utils::get_parent_dir(&config.input_path).join(format!("{stem}_peaks.csv"))
    })
}

/// 批量模式结果表路径：未指定时放在扫描目录下
pub fn batch_output_path(config: &AppConfig) -> PathBuf {
    config.output_path.clone().unwrap_or_else(|| {
        config
            .input_path
            .join(super::constants::defaults::BATCH_TABLE_NAME)
    })
}

/// 与结果表同名的附属文件路径（如 `_summary.txt`、`_report.json`）
pub fn sibling_path(table_path: &Path, suffix: &str) -> PathBuf {
    let stem = utils::extract_file_stem_string(table_path);
    utils::get_parent_dir(table_path).join(format!("{stem}{suffix}"))
}

/// 本工具自己写出的文件（结果表、汇总、JSON报告），扫描时跳过
pub fn is_output_artifact(path: &Path) -> bool {
    let name = utils::extract_filename_lossy(path).to_lowercase();
    name == super::constants::defaults::BATCH_TABLE_NAME
        || name.ends_with("_summary.txt")
        || name.ends_with("_report.json")
        || ["csv", "tsv", "txt"]
            .iter()
            .any(|ext| name.ends_with(&format!("_peaks.{ext}")))
}

/// 生成批量汇总文本
pub fn create_batch_summary(
    config: &AppConfig,
    total_files: usize,
    outcomes: &[&SampleOutcome],
    snapshot: &BatchStatsSnapshot,
) -> String {
    let mut output = String::new();
    let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");

    output.push_str("=====================================\n");
    output.push_str("   fragscope Fragment Analysis Report\n");
    output.push_str("   批量分析结果 / Batch summary\n");
    output.push_str("=====================================\n\n");
    output.push_str(&format!("log date: {now}\n"));
    output.push_str(&format!("扫描目录 / Directory: {}\n", config.input_path.display()));
    output.push_str(&format!(
        "阶梯 / Ladder: {}   峰形 / Model: {}\n\n",
        config.ladder, config.peak_model
    ));

    output.push_str("文件名\tassays\tpeaks\tcalibration R²\n");
    output.push_str("--------------------------------------------------------\n");
    for outcome in outcomes {
        match outcome {
            SampleOutcome::Analyzed(report) => {
                let peaks: usize = report.assays.iter().map(|a| a.peaks.len()).sum();
                output.push_str(&format!(
                    "{}\t{}\t{}\t{:.5}\n",
                    report.file_name,
                    report.assays.len(),
                    peaks,
                    report.calibration.r2
                ));
            }
            SampleOutcome::NoPeaks {
                file_name,
                calibration,
            } => {
                output.push_str(&format!(
                    "{file_name}\t-\t0\t{:.5}\t(no peaks found)\n",
                    calibration.r2
                ));
            }
        }
    }

    output.push('\n');
    output.push_str("=====================================\n");
    output.push_str("批量处理统计 / Statistics:\n");
    output.push_str(&format!("   总文件数 / Total: {total_files}\n"));
    output.push_str(&format!("   成功处理 / Processed: {}\n", snapshot.processed));
    output.push_str(&format!("   无峰 / No peaks: {}\n", snapshot.no_peaks));
    output.push_str(&format!("   处理失败 / Failed: {}\n", snapshot.failed));
    if total_files > 0 {
        output.push_str(&format!(
            "   处理成功率 / Success rate: {:.1}%\n",
            snapshot.processed as f64 / total_files as f64 * 100.0
        ));
    }

    if !snapshot.error_stats.is_empty() {
        output.push_str("\n失败文件 / Failed files:\n");
        for (category, entries) in snapshot.sorted_errors() {
            output.push_str(&format!("   [{}]\n", category.display_name()));
            for entry in entries {
                output.push_str(&format!("      {entry}\n"));
            }
        }
    }

    output.push('\n');
    output.push_str(&format!("生成工具 / Generated by: fragscope v{VERSION}\n"));

    output
}

/// 终端汇总表格：每个assay一行
pub fn render_summary_table(outcomes: &[&SampleOutcome]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "File / 文件",
        "Assay",
        "Peaks / 峰数",
        "Mean bp / 平均bp",
        "Quotient / 商值",
        "R²",
    ]);

    for outcome in outcomes {
        match outcome {
            SampleOutcome::Analyzed(report) => {
                for assay in &report.assays {
                    table.add_row(vec![
                        Cell::new(&report.file_name),
                        Cell::new(assay.number).set_alignment(CellAlignment::Right),
                        Cell::new(assay.peaks.len()).set_alignment(CellAlignment::Right),
                        Cell::new(format!("{:.2}", assay.mean_basepairs))
                            .set_alignment(CellAlignment::Right),
                        Cell::new(format!("{:.4}", assay.quotient))
                            .set_alignment(CellAlignment::Right),
                        Cell::new(format!("{:.5}", report.calibration.r2))
                            .set_alignment(CellAlignment::Right),
                    ]);
                }
            }
            SampleOutcome::NoPeaks {
                file_name,
                calibration,
            } => {
                table.add_row(vec![
                    Cell::new(file_name),
                    Cell::new("-"),
                    Cell::new(0).set_alignment(CellAlignment::Right),
                    Cell::new("-"),
                    Cell::new("no peaks"),
                    Cell::new(format!("{:.5}", calibration.r2)).set_alignment(CellAlignment::Right),
                ]);
            }
        }
    }

    table.to_string()
}

/// 写文本文件并把I/O错误附上路径
pub fn write_text(path: &Path, content: &str) -> FragmentResult<()> {
    std::fs::write(path, content).map_err(|e| {
        FragmentError::IoError(std::io::Error::new(
            e.kind(),
            format!("{}: {e}", path.display()),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(file: &str, peak: usize) -> PeakRow {
        PeakRow {
            file_name: file.to_string(),
            assay_number: 1,
            peak_name: format!("Peak {peak}"),
            peak_number: 2,
            model: "gaussian".to_string(),
            time: 1200 + peak,
            basepairs: 150.5,
            peak_height: 1000.0,
            fitted_peak_height: 990.0,
            area: 2500.0,
            quotient: 1.5,
            calibration_r2: 0.9999,
        }
    }

    #[test]
    fn test_csv_header_matches_columns() {
        let mut buffer = Vec::new();
        write_peak_rows(&mut buffer, &[row("s1.csv", 1), row("s1.csv", 2)], b',').unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), PEAK_TABLE_COLUMNS.join(","));
        assert!(lines.next().unwrap().starts_with("s1.csv,1,Peak 1,2,gaussian,1201,"));
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn test_tsv_by_extension() {
        assert_eq!(delimiter_for_output(Path::new("out.tsv")), b'\t');
        assert_eq!(delimiter_for_output(Path::new("out.CSV")), b',');
    }

    #[test]
    fn test_empty_table_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        write_peak_table(&path, &[]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.trim_end(), PEAK_TABLE_COLUMNS.join(","));
    }

    #[test]
    fn test_output_artifacts_are_recognized() {
        assert!(is_output_artifact(Path::new("/run/fragscope_peaks.csv")));
        assert!(is_output_artifact(Path::new("/run/fragscope_peaks_summary.txt")));
        assert!(is_output_artifact(Path::new("/run/s1_peaks.csv")));
        assert!(is_output_artifact(Path::new("/run/s1_peaks_report.json")));
        assert!(!is_output_artifact(Path::new("/run/s1.csv")));
        assert!(!is_output_artifact(Path::new("/run/peaks.tsv")));
    }

    #[test]
    fn test_sibling_path() {
        let p = sibling_path(Path::new("/tmp/run/fragscope_peaks.csv"), "_summary.txt");
        assert_eq!(p, PathBuf::from("/tmp/run/fragscope_peaks_summary.txt"));
    }
}
