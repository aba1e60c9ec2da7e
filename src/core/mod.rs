//! 核心算法模块
//!
//! 阶梯峰检测 → 阶梯匹配 → 校准 → 样本峰分组 → 峰形拟合 → 商值。

pub mod calibration;
pub mod curve_fit;
pub mod demultiplex;
pub mod ladder_assigner;
pub mod linalg;
pub mod peak_detection;
pub mod peak_fitter;
pub mod peak_shape;
pub mod quotient;

// 重新导出公共接口
pub use calibration::{CalibratedPoint, CalibratedTrace, CalibrationModel, CalibrationScore};
pub use demultiplex::{Assay, DemultiplexParams, DemultiplexResult, Demultiplexer, PeakInfo};
pub use ladder_assigner::{
    Assignment, AssignmentScorer, AssignmentScoring, LadderAssigner, LadderAssignerConfig,
};
pub use peak_detection::CandidatePeak;
pub use peak_fitter::{FittedPeak, PeakFitter};
pub use peak_shape::{PeakModel, PeakParams};
