//! 统一错误处理框架
//!
//! 片段分析流水线的错误类型定义。样本数据相关的失败（阶梯峰不足、阶梯匹配失败）
//! 在批处理中按样本记录后继续；配置错误（峰形模型、assay索引）立即返回给调用方。

use std::fmt;
use std::io;

use crate::core::peak_shape::PeakModel;

/// 片段分析相关的统一错误类型
#[derive(Debug)]
pub enum FragmentError {
    /// 阶梯通道检测到的候选峰少于参考片段数
    InsufficientPeaks {
        /// 检测到的候选峰数量
        found: usize,
        /// 参考片段数量（refCount）
        required: usize,
    },

    /// 在距离约束下找不到任何有效的阶梯匹配
    Assignment(String),

    /// 不支持的峰形模型名称
    UnsupportedModel {
        /// 调用方给出的模型名
        name: String,
    },

    /// 请求的assay索引超出已发现的assay数量
    AssayIndex {
        /// 请求的索引（从0开始）
        index: usize,
        /// 样本中的assay数量
        count: usize,
    },

    /// 输入参数验证错误
    InvalidInput(String),

    /// 文件I/O错误
    IoError(io::Error),

    /// 轨迹文件内容错误（缺少通道、无法解析的数值等）
    FormatError(String),

    /// 数值计算异常（奇异矩阵、拟合发散等）
    CalculationError(String),

    /// 资源错误（线程池创建失败等）
    ResourceError(String),
}

impl fmt::Display for FragmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FragmentError::InsufficientPeaks { found, required } => write!(
                f,
                "阶梯峰不足 / insufficient ladder peaks: found {found}, need {required}"
            ),
            FragmentError::Assignment(msg) => {
                write!(f, "阶梯匹配失败 / ladder assignment failed: {msg}")
            }
            FragmentError::UnsupportedModel { name } => {
                let options: Vec<&str> = PeakModel::ALL.iter().map(|m| m.name()).collect();
                write!(
                    f,
                    "不支持的峰形模型 / unsupported peak model '{name}'. Options: [{}]",
                    options.join(", ")
                )
            }
            FragmentError::AssayIndex { index, count } => write!(
                f,
                "assay索引越界 / assay index {index} out of range: the sample only contains {count} assays (indexing starts at 0)"
            ),
            FragmentError::InvalidInput(msg) => write!(f, "输入验证失败: {msg}"),
            FragmentError::IoError(err) => write!(f, "文件I/O错误: {err}"),
            FragmentError::FormatError(msg) => write!(f, "轨迹格式错误: {msg}"),
            FragmentError::CalculationError(msg) => write!(f, "计算异常: {msg}"),
            FragmentError::ResourceError(msg) => write!(f, "资源错误: {msg}"),
        }
    }
}

impl std::error::Error for FragmentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FragmentError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for FragmentError {
    fn from(err: io::Error) -> Self {
        FragmentError::IoError(err)
    }
}

impl From<csv::Error> for FragmentError {
    fn from(err: csv::Error) -> Self {
        if err.is_io_error() {
            match err.into_kind() {
                csv::ErrorKind::Io(io_err) => FragmentError::IoError(io_err),
                other => FragmentError::FormatError(format!("CSV错误: {other:?}")),
            }
        } else {
            FragmentError::FormatError(format!("CSV错误: {err}"))
        }
    }
}

/// 片段分析操作的标准Result类型
pub type FragmentResult<T> = Result<T, FragmentError>;

// ==================== 错误转换Helper函数 ====================

/// 创建格式错误的helper函数
#[inline]
pub fn format_error<E: fmt::Display>(context: &str, err: E) -> FragmentError {
    FragmentError::FormatError(format!("{context}: {err}"))
}

/// 创建计算错误的helper函数
#[inline]
pub fn calculation_error<E: fmt::Display>(context: &str, err: E) -> FragmentError {
    FragmentError::CalculationError(format!("{context}: {err}"))
}

// ==================== 错误分类系统 ====================
// 用于批量处理中的错误统计和分析

/// 错误类别枚举（用于批量处理统计）
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum ErrorCategory {
    /// 输入相关错误（文件不存在、通道缺失、数值无法解析）
    Input,
    /// 阶梯校准错误（峰不足、匹配失败）
    Ladder,
    /// 峰形拟合/数值计算错误
    Fitting,
    /// 配置错误（模型名、assay索引、参数范围、运行资源）
    Configuration,
}

impl ErrorCategory {
    /// 从FragmentError提取错误类别
    pub fn from_error(e: &FragmentError) -> Self {
        match e {
            FragmentError::IoError(_) | FragmentError::FormatError(_) => Self::Input,
            FragmentError::InsufficientPeaks { .. } | FragmentError::Assignment(_) => Self::Ladder,
            FragmentError::CalculationError(_) => Self::Fitting,
            FragmentError::UnsupportedModel { .. }
            | FragmentError::AssayIndex { .. }
            | FragmentError::InvalidInput(_)
            | FragmentError::ResourceError(_) => Self::Configuration,
        }
    }

    /// 获取错误类别的显示名称
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Input => "输入错误 / Input",
            Self::Ladder => "阶梯校准错误 / Ladder",
            Self::Fitting => "拟合错误 / Fitting",
            Self::Configuration => "配置错误 / Configuration",
        }
    }

    /// 样本级错误：批处理中记录后继续下一个样本
    pub fn is_sample_level(&self) -> bool {
        !matches!(self, Self::Configuration)
    }
}
