//! 校准模型
//!
//! 扫描时间 → 碱基对（bp）的映射：均匀节点B样条基变换 + 带截距的线性回归。
//! 节点在阶梯匹配的时间范围内均匀分布，两端各按相同间距外延 `degree` 个节点；
//! 超出范围时沿用边界区间的多项式继续外推（已知局限，不视为错误）。
//!
//! 拟合质量（MSE、R²）只作为诊断信息返回，不阻断流水线。

use crate::core::ladder_assigner::Assignment;
use crate::core::linalg;
use crate::error::{FragmentError, FragmentResult};
use crate::trace::Trace;
use nalgebra::{DMatrix, DVector};
use serde::Serialize;

/// 均匀节点B样条基（外推方式：继续边界多项式）
#[derive(Debug, Clone, PartialEq)]
pub struct BSplineBasis {
    degree: usize,
    /// 完整节点向量（含两端外延节点）
    knots: Vec<f64>,
}

impl BSplineBasis {
    /// 在 [x_min, x_max] 上放置 `n_knots` 个均匀节点
    pub fn uniform(x_min: f64, x_max: f64, n_knots: usize, degree: usize) -> FragmentResult<Self> {
        if n_knots < 2 {
            return Err(FragmentError::InvalidInput(format!(
                "样条节点数至少为2 / spline needs at least 2 knots, got {n_knots}"
            )));
        }
        if degree == 0 {
            return Err(FragmentError::InvalidInput(
                "样条阶数必须为正 / spline degree must be positive".to_string(),
            ));
        }
        let span = x_max - x_min;
        if !(span > 0.0) || !span.is_finite() {
            return Err(FragmentError::CalculationError(format!(
                "校准时间范围无效 / invalid calibration range [{x_min}, {x_max}]"
            )));
        }

        let step = span / (n_knots - 1) as f64;
        let knots: Vec<f64> = (0..n_knots + 2 * degree)
            .map(|i| x_min + (i as f64 - degree as f64) * step)
            .collect();

        Ok(Self { degree, knots })
    }

    /// 基函数个数 = n_knots + degree - 1
    #[inline]
    pub fn n_basis(&self) -> usize {
        self.knots.len() - self.degree - 1
    }

    /// 计算x处所有基函数的值
    pub fn evaluate(&self, x: f64) -> Vec<f64> {
        let p = self.degree;
        let t = &self.knots;
        let n_basis = self.n_basis();

        // 所在区间，范围外夹到首/末有效区间，从而沿用边界多项式
        let mut span = p;
        while span + 1 < n_basis && x >= t[span + 1] {
            span += 1;
        }

        // Cox–de Boor 三角递推
        let mut local = vec![0.0; p + 1];
        let mut left = vec![0.0; p + 1];
        let mut right = vec![0.0; p + 1];
        local[0] = 1.0;
        for j in 1..=p {
            left[j] = x - t[span + 1 - j];
            right[j] = t[span + j] - x;
            let mut saved = 0.0;
            for r in 0..j {
                let temp = local[r] / (right[r + 1] + left[j - r]);
                local[r] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            }
            local[j] = saved;
        }

        let mut values = vec![0.0; n_basis];
        for (r, value) in local.into_iter().enumerate() {
            values[span - p + r] = value;
        }
        values
    }
}

/// 校准诊断指标
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalibrationScore {
    /// 均方误差（bp²）
    pub mse: f64,
    /// 决定系数
    pub r2: f64,
}

/// 已拟合的时间→bp模型
#[derive(Debug, Clone)]
pub struct CalibrationModel {
    basis: BSplineBasis,
    intercept: f64,
    coefficients: Vec<f64>,
    score: CalibrationScore,
}

impl CalibrationModel {
    /// 用阶梯匹配结果拟合模型
    pub fn fit(assignment: &Assignment, degree: usize, n_knots: usize) -> FragmentResult<Self> {
        Self::fit_points(&assignment.times_f64(), &assignment.sizes, degree, n_knots)
    }

    /// 用 (time, size) 点对拟合模型
    pub fn fit_points(
        times: &[f64],
        sizes: &[f64],
        degree: usize,
        n_knots: usize,
    ) -> FragmentResult<Self> {
        if times.len() != sizes.len() || times.is_empty() {
            return Err(FragmentError::InvalidInput(format!(
                "校准点数不匹配 / calibration points mismatch: {} times vs {} sizes",
                times.len(),
                sizes.len()
            )));
        }

        let x_min = times.iter().cloned().fold(f64::INFINITY, f64::min);
        let x_max = times.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let basis = BSplineBasis::uniform(x_min, x_max, n_knots, degree)?;

        // 中心化后求最小范数解，截距由均值回代
        let n = times.len();
        let k = basis.n_basis();
        let rows: Vec<Vec<f64>> = times.iter().map(|&t| basis.evaluate(t)).collect();
        let col_means: Vec<f64> = (0..k)
            .map(|c| rows.iter().map(|r| r[c]).sum::<f64>() / n as f64)
            .collect();
        let y_mean = sizes.iter().sum::<f64>() / n as f64;

        let design = DMatrix::from_fn(n, k, |r, c| rows[r][c] - col_means[c]);
        let y = DVector::from_iterator(n, sizes.iter().map(|s| s - y_mean));
        let coef = linalg::least_squares(&design, &y)?;

        let coefficients: Vec<f64> = coef.iter().cloned().collect();
        let intercept = y_mean
            - coefficients
                .iter()
                .zip(&col_means)
                .map(|(w, m)| w * m)
                .sum::<f64>();

        let mut model = Self {
            basis,
            intercept,
            coefficients,
            score: CalibrationScore { mse: 0.0, r2: 0.0 },
        };

        let predicted: Vec<f64> = times.iter().map(|&t| model.predict(t)).collect();
        model.score = CalibrationScore {
            mse: linalg::mean_squared_error(sizes, &predicted),
            r2: linalg::r2_score(sizes, &predicted),
        };

        tracing::debug!(
            mse = model.score.mse,
            r2 = model.score.r2,
            degree,
            n_knots,
            "calibration model fitted"
        );

        Ok(model)
    }

    /// 预测单个扫描时间的bp值
    pub fn predict(&self, time: f64) -> f64 {
        self.intercept
            + self
                .basis
                .evaluate(time)
                .iter()
                .zip(&self.coefficients)
                .map(|(b, w)| b * w)
                .sum::<f64>()
    }

    /// 拟合诊断
    #[inline]
    pub fn score(&self) -> CalibrationScore {
        self.score
    }

    /// 对整条样本轨迹应用校准，丢弃预测bp为负的行
    pub fn calibrate(&self, trace: &Trace) -> CalibratedTrace {
        let points = trace
            .iter()
            .map(|(time, intensity)| CalibratedPoint {
                time,
                intensity,
                basepairs: self.predict(time as f64),
            })
            .filter(|p| p.basepairs >= 0.0)
            .collect();
        CalibratedTrace { points }
    }
}

/// 带bp注释的轨迹点
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalibratedPoint {
    /// 扫描时间
    pub time: usize,
    /// 荧光强度
    pub intensity: f64,
    /// 预测的bp值
    pub basepairs: f64,
}

/// 校准后的轨迹
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CalibratedTrace {
    pub points: Vec<CalibratedPoint>,
}

impl CalibratedTrace {
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 只保留 bp 大于 `start` 的点
    pub fn after_basepairs(&self, start: f64) -> CalibratedTrace {
        CalibratedTrace {
            points: self
                .points
                .iter()
                .filter(|p| p.basepairs > start)
                .copied()
                .collect(),
        }
    }

    /// 强度序列
    pub fn intensities(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.intensity).collect()
    }
}
