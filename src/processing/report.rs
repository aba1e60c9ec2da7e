//! 样本结果与平铺结果行

use crate::core::calibration::{CalibratedTrace, CalibrationScore};
use crate::core::ladder_assigner::Assignment;
use crate::core::peak_fitter::FittedPeak;
use crate::core::peak_shape::PeakModel;
use crate::trace::LadderKind;
use serde::Serialize;

/// 单个assay的结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssayReport {
    /// assay编号（从1开始）
    pub number: usize,
    pub mean_basepairs: f64,
    pub quotient: f64,
    pub peaks: Vec<FittedPeak>,
}

/// 单个样本的完整结果
#[derive(Debug, Clone, Serialize)]
pub struct SampleReport {
    pub file_name: String,
    pub ladder: LadderKind,
    pub model: PeakModel,
    pub assignment: Assignment,
    pub calibration: CalibrationScore,
    /// 校准后的样本轨迹（体积较大，不写入JSON）
    #[serde(skip)]
    pub calibrated: CalibratedTrace,
    pub assays: Vec<AssayReport>,
}

impl SampleReport {
    /// 每个拟合峰一行，取窗口内原始强度最大的点
    pub fn rows(&self) -> Vec<PeakRow> {
        let mut rows = Vec::new();
        for assay in &self.assays {
            let peak_number = assay.peaks.len();
            for (i, peak) in assay.peaks.iter().enumerate() {
                let Some((apex, fitted_value)) = peak.apex() else {
                    continue;
                };
                rows.push(PeakRow {
                    file_name: self.file_name.clone(),
                    assay_number: assay.number,
                    peak_name: format!("Peak {}", i + 1),
                    peak_number,
                    model: self.model.name().to_string(),
                    time: apex.time,
                    basepairs: apex.basepairs,
                    peak_height: apex.intensity,
                    fitted_peak_height: fitted_value,
                    area: peak.amplitude(),
                    quotient: assay.quotient,
                    calibration_r2: self.calibration.r2,
                });
            }
        }
        rows
    }
}

/// 结果表中的一行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakRow {
    pub file_name: String,
    pub assay_number: usize,
    pub peak_name: String,
    /// assay内的峰数
    pub peak_number: usize,
    pub model: String,
    pub time: usize,
    pub basepairs: f64,
    pub peak_height: f64,
    pub fitted_peak_height: f64,
    pub area: f64,
    pub quotient: f64,
    pub calibration_r2: f64,
}
