//! fragscope - 主程序入口
//!
//! 纯流程控制器，负责协调各个工具模块完成片段分析任务。

use anyhow::Context;
use fragscope::{
    error::{ErrorCategory, FragmentError},
    processing::SampleAnalyzer,
    tools::{self, AppConfig},
    trace::{DelimitedTraceSource, TraceSource},
};
use std::path::PathBuf;
use std::process;

/// 错误退出码定义
mod exit_codes {
    /// 输入/配置错误
    pub const INPUT_ERROR: i32 = 2;
    /// 阶梯校准失败
    pub const LADDER_ERROR: i32 = 3;
    /// 拟合/计算错误
    pub const FITTING_ERROR: i32 = 4;
    /// 资源/并发错误
    pub const RESOURCE_ERROR: i32 = 5;
}

/// 获取错误建议文本
fn get_error_suggestion(error: &FragmentError) -> &'static str {
    match error {
        FragmentError::UnsupportedModel { .. } => {
            "使用 --peak-model gauss|voigt|lorentzian 之一 / Use one of --peak-model gauss|voigt|lorentzian"
        }
        FragmentError::InsufficientPeaks { .. } => {
            "尝试降低 --ladder-min-height 或检查阶梯通道 --size-standard-channel / Try lowering --ladder-min-height or check --size-standard-channel"
        }
        FragmentError::Assignment(_) => {
            "尝试增大 --max-ladder-trace-distance 或更换 --scoring / Try a larger --max-ladder-trace-distance or another --scoring"
        }
        FragmentError::ResourceError(_) => {
            "资源不可用，尝试 --serial 串行模式 / Resource unavailable, try --serial"
        }
        _ => match ErrorCategory::from_error(error) {
            ErrorCategory::Input => {
                "检查文件路径、分隔符和通道列名 / Check file path, delimiter and channel column names"
            }
            ErrorCategory::Configuration => {
                "检查命令行参数是否正确，使用 --help 查看完整用法 / Check command-line arguments, use --help to see full usage"
            }
            ErrorCategory::Fitting => {
                "拟合未收敛，尝试其它峰形模型或调整 --padding / Fit failed, try another model or adjust --padding"
            }
            ErrorCategory::Ladder => {
                "检查阶梯类型 --ladder 是否与数据一致 / Check that --ladder matches the data"
            }
        },
    }
}

/// 错误处理和建议
fn handle_error(error: FragmentError) -> ! {
    eprintln!("[ERROR] 错误 / Error: {error}");
    eprintln!("[INFO] 建议 / Suggestion: {}", get_error_suggestion(&error));

    let exit_code = match &error {
        FragmentError::ResourceError(_) => exit_codes::RESOURCE_ERROR,
        _ => match ErrorCategory::from_error(&error) {
            ErrorCategory::Input | ErrorCategory::Configuration => exit_codes::INPUT_ERROR,
            ErrorCategory::Ladder => exit_codes::LADDER_ERROR,
            ErrorCategory::Fitting => exit_codes::FITTING_ERROR,
        },
    };

    process::exit(exit_code);
}

/// 初始化日志：RUST_LOG优先，否则按 --verbose 选择级别
fn init_logging(verbose: bool) -> anyhow::Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
        .context("日志初始化失败 / failed to initialize logging")
}

/// 批量处理目录中的轨迹文件
fn process_batch_mode(
    config: &AppConfig,
    analyzer: &SampleAnalyzer,
    source: &dyn TraceSource,
) -> Result<(), FragmentError> {
    let extensions = source.extensions();
    let trace_files = tools::scan_trace_files(&config.input_path, extensions, config.recursive)?;

    tools::show_scan_results(config, &trace_files, extensions);

    if trace_files.is_empty() {
        return Ok(());
    }

    let (entries, snapshot) = match config.parallel_files {
        None => tools::process_batch_serial(&trace_files, analyzer, source, config),
        Some(degree) => {
            let actual_degree =
                tools::utils::effective_parallel_degree(degree, Some(trace_files.len()));

            if actual_degree == 1 {
                if config.verbose {
                    println!("[INFO] 并发度为1，使用串行模式 / Parallelism=1, using serial mode");
                }
                tools::process_batch_serial(&trace_files, analyzer, source, config)
            } else {
                process_parallel_or_fallback(&trace_files, analyzer, source, config, actual_degree)
            }
        }
    };

    tools::finalize_batch(config, entries, &snapshot)?;
    Ok(())
}

/// 尝试并行处理，线程池创建失败则降级串行
fn process_parallel_or_fallback(
    trace_files: &[PathBuf],
    analyzer: &SampleAnalyzer,
    source: &dyn TraceSource,
    config: &AppConfig,
    degree: usize,
) -> (Vec<tools::BatchEntry>, tools::BatchStatsSnapshot) {
    tools::process_batch_parallel(trace_files, analyzer, source, config, degree).unwrap_or_else(
        |e| {
            eprintln!("[WARNING] 并行处理失败 / Parallel processing failed: {e}，回退到串行模式 / fallback to serial");
            tools::process_batch_serial(trace_files, analyzer, source, config)
        },
    )
}

/// 单文件处理模式
fn process_single_mode(
    config: &AppConfig,
    analyzer: &SampleAnalyzer,
    source: &dyn TraceSource,
) -> Result<(), FragmentError> {
    let outcome = tools::process_single_file(&config.input_path, analyzer, source)?;
    tools::output_single_result(config, &outcome)?;
    Ok(())
}

/// 应用程序主逻辑
fn run(config: &AppConfig) -> Result<(), FragmentError> {
    tools::show_startup_info(config);

    // 配置在处理任何样本之前一次性验证
    let analyzer = SampleAnalyzer::new(config.sample_config()?)?;
    let source = DelimitedTraceSource::new();

    if config.is_batch_mode() {
        process_batch_mode(config, &analyzer, &source)?;
    } else {
        process_single_mode(config, &analyzer, &source)?;
    }

    tools::show_completion_info(config);
    Ok(())
}

fn main() {
    let config = tools::parse_args();

    if let Err(e) = init_logging(config.verbose) {
        eprintln!("[WARNING] {e:#}");
    }

    if let Err(error) = run(&config) {
        handle_error(error);
    }
}
