//! 样本处理模块
//!
//! 把核心算法串成单样本流水线，并把结果平铺成表格行。

pub mod report;
pub mod sample_analyzer;
pub mod sample_config;

// 重新导出公共接口
pub use report::{AssayReport, PeakRow, SampleReport};
pub use sample_analyzer::{SampleAnalyzer, SampleOutcome};
pub use sample_config::SampleConfig;
