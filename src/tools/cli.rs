//! 命令行接口模块
//!
//! 负责命令行参数解析、配置管理和程序信息展示。

use super::constants::{defaults, demultiplex};
use crate::core::ladder_assigner::AssignmentScoring;
use crate::error::{FragmentError, FragmentResult};
use crate::processing::SampleConfig;
use crate::trace::LadderKind;
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use std::path::PathBuf;

/// 应用程序版本信息
const VERSION: &str = env!("CARGO_PKG_VERSION");
const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// 应用程序配置
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// 输入文件路径（单文件模式）或扫描目录（批量模式）
    pub input_path: PathBuf,

    /// 是否显示详细信息
    pub verbose: bool,

    /// 输出文件路径（可选，批量模式时自动生成）
    pub output_path: Option<PathBuf>,

    /// 单文件模式下额外写出JSON报告
    pub json: bool,

    /// 批量模式递归扫描子目录
    pub recursive: bool,

    /// 多文件并行度（None表示串行）
    pub parallel_files: Option<usize>,

    /// 阶梯类型名
    pub ladder: String,

    /// 峰形模型名
    pub peak_model: String,

    /// 阶梯评分策略名
    pub scoring: String,

    pub min_ratio: f64,
    pub search_peaks_start: f64,
    pub peak_height: f64,
    pub distance_between_assays: f64,
    pub cutoff: Option<f64>,
    pub padding: usize,

    /// 样本通道
    pub trace_channel: String,

    /// 阶梯通道（None时使用阶梯表默认值）
    pub size_standard_channel: Option<String>,

    /// 阶梯检测阈值覆盖
    pub ladder_min_height: Option<f64>,
    pub ladder_min_distance: Option<usize>,
    pub max_ladder_trace_distance: Option<usize>,

    /// 先做基线校正
    pub normalize: bool,
}

impl AppConfig {
    /// 智能判断是否为批量模式（基于路径类型）
    #[inline]
    pub fn is_batch_mode(&self) -> bool {
        self.input_path.is_dir()
    }

    /// 验证全部标量参数并构造样本配置（只在入口调用一次）
    pub fn sample_config(&self) -> FragmentResult<SampleConfig> {
        let ladder: LadderKind = self.ladder.parse()?;
        let mut config = SampleConfig::new(ladder);

        config.model = self.peak_model.parse()?;
        config.scoring = self.scoring.parse::<AssignmentScoring>()?;
        config.trace_channel = self.trace_channel.clone();
        if let Some(channel) = &self.size_standard_channel {
            config.size_standard_channel = channel.clone();
        }
        if let Some(height) = self.ladder_min_height {
            config.ladder_spec.min_height = height;
        }
        if let Some(distance) = self.ladder_min_distance {
            config.ladder_spec.min_distance = distance;
        }
        if let Some(distance) = self.max_ladder_trace_distance {
            config.ladder_spec.max_ladder_trace_distance = distance;
        }

        config.demultiplex.min_ratio = self.min_ratio;
        config.demultiplex.search_peaks_start = self.search_peaks_start;
        config.demultiplex.peak_height = self.peak_height;
        config.demultiplex.distance_between_assays = self.distance_between_assays;
        config.demultiplex.padding = self.padding;
        config.cutoff = self.cutoff;
        config.normalize = self.normalize;

        config.validate()?;
        Ok(config)
    }
}

/// 构造命令行定义
pub fn build_command() -> Command {
    Command::new("fragscope")
        .version(VERSION)
        .about(DESCRIPTION)
        .arg(
            Arg::new("INPUT")
                .help("轨迹文件或目录路径 (CSV/TSV导出，表头为通道名) / Trace file or directory")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("显示详细处理信息 / Show detailed progress")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .help("结果表输出路径 / Output table path (.csv or .tsv)")
                .value_name("FILE"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("单文件模式下写出完整JSON报告 / Write the full JSON report in single-file mode")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("recursive")
                .long("recursive")
                .short('r')
                .help("递归扫描子目录 / Scan sub-directories")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("parallel-files")
                .long("parallel-files")
                .help("多文件并行度 / Number of files processed in parallel")
                .value_name("N")
                .value_parser(value_parser!(usize))
                .default_value(defaults::PARALLEL_FILES_DEGREE.to_string()),
        )
        .arg(
            Arg::new("serial")
                .long("serial")
                .help("串行处理 / Disable parallel file processing")
                .action(ArgAction::SetTrue)
                .conflicts_with("parallel-files"),
        )
        .arg(
            Arg::new("ladder")
                .long("ladder")
                .help("阶梯类型 / Size-standard ladder [ROX, LIZ]")
                .default_value(defaults::LADDER),
        )
        .arg(
            Arg::new("peak-model")
                .long("peak-model")
                .help("峰形模型 / Peak model [gauss, voigt, lorentzian]")
                .default_value(defaults::PEAK_MODEL),
        )
        .arg(
            Arg::new("scoring")
                .long("scoring")
                .help("阶梯匹配评分 / Ladder assignment scoring [polynomial, spline, fractional]")
                .default_value("polynomial"),
        )
        .arg(
            float_arg(
                "min-ratio",
                "assay内最小峰比值 / Minimum ratio to the tallest peak of the assay",
            )
            .default_value(demultiplex::MIN_RATIO.to_string()),
        )
        .arg(
            float_arg(
                "search-peaks-start",
                "搜索起点(bp) / Basepair where the peak search starts",
            )
            .default_value(demultiplex::SEARCH_PEAKS_START.to_string()),
        )
        .arg(
            float_arg("peak-height", "样本峰最小高度 / Minimum sample peak height")
                .default_value(demultiplex::PEAK_HEIGHT.to_string()),
        )
        .arg(
            float_arg(
                "distance-between-assays",
                "assay间距(bp) / Gap that starts a new assay",
            )
            .default_value(demultiplex::DISTANCE_BETWEEN_ASSAYS.to_string()),
        )
        .arg(float_arg(
            "cutoff",
            "2峰assay方向翻转阈值(bp) / Flip two-peak quotients below this mean basepair",
        ))
        .arg(
            Arg::new("padding")
                .long("padding")
                .help("峰窗口padding / Extra points on both sides of a peak window")
                .value_parser(value_parser!(usize))
                .default_value(demultiplex::WINDOW_PADDING.to_string()),
        )
        .arg(
            Arg::new("trace-channel")
                .long("trace-channel")
                .help("样本通道 / Sample channel")
                .default_value(defaults::TRACE_CHANNEL),
        )
        .arg(
            Arg::new("size-standard-channel")
                .long("size-standard-channel")
                .help("阶梯通道（默认取决于阶梯类型） / Ladder channel (defaults per ladder)"),
        )
        .arg(float_arg("ladder-min-height", "阶梯峰最小高度 / Minimum ladder peak height"))
        .arg(
            Arg::new("ladder-min-distance")
                .long("ladder-min-distance")
                .help("阶梯峰最小间距 / Minimum ladder peak distance")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("max-ladder-trace-distance")
                .long("max-ladder-trace-distance")
                .help("相邻阶梯峰最大距离 / Maximum scan distance between assigned ladder peaks")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("normalize")
                .long("normalize")
                .help("基线校正后再分析 / Remove baseline before analysis")
                .action(ArgAction::SetTrue),
        )
}

fn float_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .help(help)
        .allow_negative_numbers(true)
        .value_parser(value_parser!(f64))
}

/// 从解析结果构造配置
pub fn config_from_matches(matches: &ArgMatches) -> AppConfig {
    let string = |name: &str| matches.get_one::<String>(name).cloned().unwrap_or_default();
    let float = |name: &str| matches.get_one::<f64>(name).copied();

    let parallel_files = if matches.get_flag("serial") {
        None
    } else {
        matches.get_one::<usize>("parallel-files").copied()
    };

    AppConfig {
        input_path: PathBuf::from(string("INPUT")),
        verbose: matches.get_flag("verbose"),
        output_path: matches.get_one::<String>("output").map(PathBuf::from),
        json: matches.get_flag("json"),
        recursive: matches.get_flag("recursive"),
        parallel_files,
        ladder: string("ladder"),
        peak_model: string("peak-model"),
        scoring: string("scoring"),
        min_ratio: float("min-ratio").unwrap_or(demultiplex::MIN_RATIO),
        search_peaks_start: float("search-peaks-start").unwrap_or(demultiplex::SEARCH_PEAKS_START),
        peak_height: float("peak-height").unwrap_or(demultiplex::PEAK_HEIGHT),
        distance_between_assays: float("distance-between-assays")
            .unwrap_or(demultiplex::DISTANCE_BETWEEN_ASSAYS),
        cutoff: float("cutoff"),
        padding: matches
            .get_one::<usize>("padding")
            .copied()
            .unwrap_or(demultiplex::WINDOW_PADDING),
        trace_channel: string("trace-channel"),
        size_standard_channel: matches.get_one::<String>("size-standard-channel").cloned(),
        ladder_min_height: float("ladder-min-height"),
        ladder_min_distance: matches.get_one::<usize>("ladder-min-distance").copied(),
        max_ladder_trace_distance: matches.get_one::<usize>("max-ladder-trace-distance").copied(),
        normalize: matches.get_flag("normalize"),
    }
}

/// 解析命令行参数并创建配置
pub fn parse_args() -> AppConfig {
    config_from_matches(&build_command().get_matches())
}

/// 从参数列表解析（便于测试）
pub fn try_parse_from<I, T>(args: I) -> FragmentResult<AppConfig>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    build_command()
        .try_get_matches_from(args)
        .map(|m| config_from_matches(&m))
        .map_err(|e| FragmentError::InvalidInput(e.to_string()))
}

/// 显示程序启动信息
pub fn show_startup_info(config: &AppConfig) {
    println!("fragscope v{VERSION}");
    println!("{DESCRIPTION}");
    if config.verbose {
        println!(
            "[INFO] 阶梯 / Ladder: {}, 峰形 / Model: {}, 评分 / Scoring: {}",
            config.ladder, config.peak_model, config.scoring
        );
    }
    println!();
}

/// 显示程序完成信息
pub fn show_completion_info(config: &AppConfig) {
    if config.verbose {
        println!("[OK] 所有任务处理完成 / All tasks completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PeakModel;

    #[test]
    fn test_defaults() {
        let config = try_parse_from(["fragscope", "run.csv"]).unwrap();
        assert_eq!(config.ladder, "LIZ");
        assert_eq!(config.peak_model, "gauss");
        assert_eq!(config.min_ratio, 0.15);
        assert_eq!(config.parallel_files, Some(defaults::PARALLEL_FILES_DEGREE));
        assert_eq!(config.cutoff, None);

        let sample = config.sample_config().unwrap();
        assert_eq!(sample.model, PeakModel::Gaussian);
        assert_eq!(sample.size_standard_channel, "DATA205");
        assert_eq!(sample.demultiplex.padding, 4);
    }

    #[test]
    fn test_overrides() {
        let config = try_parse_from([
            "fragscope",
            "runs",
            "--ladder",
            "rox",
            "--peak-model",
            "voigt",
            "--cutoff",
            "200",
            "--serial",
            "--ladder-min-height",
            "350",
            "--size-standard-channel",
            "DATA105",
        ])
        .unwrap();
        assert_eq!(config.parallel_files, None);

        let sample = config.sample_config().unwrap();
        assert_eq!(sample.model, PeakModel::Voigt);
        assert_eq!(sample.cutoff, Some(200.0));
        assert_eq!(sample.ladder_spec.min_height, 350.0);
        assert_eq!(sample.ladder_spec.spline_knots, 6);
        assert_eq!(sample.size_standard_channel, "DATA105");
    }

    #[test]
    fn test_unsupported_model_rejected_at_entry() {
        let config = try_parse_from(["fragscope", "run.csv", "--peak-model", "cauchy"]).unwrap();
        assert!(matches!(
            config.sample_config(),
            Err(FragmentError::UnsupportedModel { .. })
        ));
    }

    #[test]
    fn test_missing_input_is_error() {
        assert!(try_parse_from(["fragscope"]).is_err());
    }
}
