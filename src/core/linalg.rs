//! 小型线性代数工具
//!
//! 基于nalgebra的最小二乘求解与拟合优度指标。

use crate::error::{FragmentError, FragmentResult};
use nalgebra::{DMatrix, DVector};

/// 最小范数最小二乘解（SVD伪逆，秩亏时自动截断）
pub fn least_squares(design: &DMatrix<f64>, y: &DVector<f64>) -> FragmentResult<DVector<f64>> {
    if design.nrows() != y.len() {
        return Err(FragmentError::CalculationError(format!(
            "设计矩阵行数 {} 与观测数 {} 不一致",
            design.nrows(),
            y.len()
        )));
    }

    let svd = design.clone().svd(true, true);
    let max_sv = svd.singular_values.iter().cloned().fold(0.0_f64, f64::max);
    let eps = max_sv * design.nrows().max(design.ncols()) as f64 * f64::EPSILON;

    svd.solve(y, eps)
        .map_err(|e| FragmentError::CalculationError(format!("最小二乘求解失败: {e}")))
}

/// 均方误差
pub fn mean_squared_error(truth: &[f64], predicted: &[f64]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    truth
        .iter()
        .zip(predicted)
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / truth.len() as f64
}

/// 决定系数 R²（总平方和为0时：完全拟合返回1，否则0）
pub fn r2_score(truth: &[f64], predicted: &[f64]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let mean = truth.iter().sum::<f64>() / truth.len() as f64;
    let ss_tot: f64 = truth.iter().map(|t| (t - mean).powi(2)).sum();
    let ss_res: f64 = truth
        .iter()
        .zip(predicted)
        .map(|(t, p)| (t - p).powi(2))
        .sum();

    if ss_tot == 0.0 {
        if ss_res == 0.0 { 1.0 } else { 0.0 }
    } else {
        1.0 - ss_res / ss_tot
    }
}
