//! fragscope - 毛细管电泳片段分析工具
//!
//! 从荧光轨迹中定位阶梯峰并匹配参考片段长度，用样条回归把扫描时间换算成碱基对，
//! 再把样本峰按片段长度分组为assay，逐峰拟合峰形并计算每个assay的商值。
//!
//! ## 流水线
//! - 阶梯峰检测与子集匹配（三种评分策略）
//! - B样条最小二乘校准
//! - 样本峰检测与assay分组
//! - 高斯/Voigt/洛伦兹峰形拟合（Levenberg-Marquardt）
//! - assay商值

pub mod core;
pub mod error;
pub mod processing;
pub mod tools;
pub mod trace;

// 重新导出核心类型
pub use core::{CalibrationModel, LadderAssigner, PeakModel};
pub use error::{ErrorCategory, FragmentError, FragmentResult};
pub use processing::{PeakRow, SampleAnalyzer, SampleConfig, SampleOutcome, SampleReport};
pub use trace::{DelimitedTraceSource, LadderKind, Trace, TraceSource};
