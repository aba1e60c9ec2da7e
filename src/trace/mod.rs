//! 轨迹数据源模块
//!
//! 定义核心流水线与外部协作者之间的边界：荧光轨迹、阶梯参数表、
//! 轨迹文件加载器和可选的基线校正滤波器。

pub mod baseline;
pub mod delimited;
pub mod ladder;

pub use baseline::{ArplsBaseline, BaselineFilter};
pub use delimited::DelimitedTraceSource;
pub use ladder::{LadderKind, LadderSpec};

use crate::error::FragmentResult;
use std::path::Path;

/// 单通道荧光轨迹：下标即扫描时间，值为荧光强度
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Trace {
    intensities: Vec<f64>,
}

impl Trace {
    pub fn new(intensities: Vec<f64>) -> Self {
        Self { intensities }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.intensities.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.intensities.is_empty()
    }

    /// 强度序列（按扫描时间排列）
    #[inline]
    pub fn intensities(&self) -> &[f64] {
        &self.intensities
    }

    /// 迭代 (time, intensity)
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.intensities.iter().copied().enumerate()
    }
}

impl From<Vec<f64>> for Trace {
    fn from(intensities: Vec<f64>) -> Self {
        Self::new(intensities)
    }
}

/// 一个样本的完整输入：样本通道 + 同泳道阶梯通道
#[derive(Debug, Clone)]
pub struct SampleInput {
    /// 文件名（用于结果表）
    pub file_name: String,
    /// 样本荧光通道
    pub sample: Trace,
    /// 阶梯（size standard）通道
    pub size_standard: Trace,
}

/// 通道选择
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSelectors {
    /// 样本通道名
    pub trace_channel: String,
    /// 阶梯通道名
    pub size_standard_channel: String,
}

/// 轨迹数据源trait：从文件中取出样本通道和阶梯通道
pub trait TraceSource: Send + Sync {
    /// 加载单个文件
    fn load(&self, path: &Path, channels: &ChannelSelectors) -> FragmentResult<SampleInput>;

    /// 支持的文件扩展名（小写）
    fn extensions(&self) -> &'static [&'static str];
}
