//! 阶梯匹配模块
//!
//! 从阶梯通道的候选峰中选出与参考片段一一对应的子集。
//!
//! ## 流程
//!
//! 1. 阶梯通道峰检测（绝对高度 + 最小间距），候选峰少于参考片段数时报 `InsufficientPeaks`
//! 2. 保留最高的 `refCount + 3` 个候选峰，按扫描时间重新排序
//! 3. 穷举所有保持时间顺序、长度为 `refCount`、相邻间距不超过
//!    `max_ladder_trace_distance` 的子集，按评分策略打分
//! 4. 返回得分最低的子集；得分相同时保留字典序最早（扫描时间最早）的子集
//!
//! 候选峰最多只比参考片段多3个，子集数量为 C(refCount+3, 3) 量级，穷举代价很小。

use crate::core::linalg;
use crate::core::peak_detection::{self, CandidatePeak, PeakDetectionParams};
use crate::error::{FragmentError, FragmentResult};
use crate::tools::constants::ladder_fitting;
use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use std::str::FromStr;

/// 阶梯匹配评分策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum AssignmentScoring {
    /// 扫描时间对参考片段做三次多项式回归，得分为 1 - R²
    #[default]
    PolynomialResidual,

    /// 扫描时间对参考片段的插值三次样条，得分为二阶导数绝对值的最大值
    SplineCurvature,

    /// 参考片段间隔（缩放到观测时间范围）与观测时间间隔的最大相对偏差
    FractionalDeviation,
}

/// 评分trait：分数越低表示匹配越好
pub trait AssignmentScorer {
    /// 对一个候选子集打分
    fn score(&self, times: &[f64], sizes: &[f64]) -> f64;

    /// 策略名（用于日志）
    fn strategy_name(&self) -> &'static str;
}

impl AssignmentScoring {
    /// 该策略能给出有限分数所需的最少参考片段数
    pub fn min_sizes(&self) -> usize {
        match self {
            Self::SplineCurvature => 3,
            Self::PolynomialResidual | Self::FractionalDeviation => 2,
        }
    }
}

impl AssignmentScorer for AssignmentScoring {
    fn score(&self, times: &[f64], sizes: &[f64]) -> f64 {
        match self {
            Self::PolynomialResidual => scoring::polynomial_inverse_r2(sizes, times),
            Self::SplineCurvature => scoring::max_spline_second_derivative(sizes, times),
            Self::FractionalDeviation => scoring::max_fractional_deviation(sizes, times),
        }
    }

    fn strategy_name(&self) -> &'static str {
        match self {
            Self::PolynomialResidual => "polynomial",
            Self::SplineCurvature => "spline",
            Self::FractionalDeviation => "fractional",
        }
    }
}

impl FromStr for AssignmentScoring {
    type Err = FragmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "polynomial" | "poly" => Ok(Self::PolynomialResidual),
            "spline" | "2nd_derivative" => Ok(Self::SplineCurvature),
            "fractional" => Ok(Self::FractionalDeviation),
            _ => Err(FragmentError::InvalidInput(format!(
                "未知阶梯评分策略 / unknown assignment scoring '{s}'. Options: [polynomial, spline, fractional]"
            ))),
        }
    }
}

/// 阶梯匹配参数（由样本配置一次性构造）
#[derive(Debug, Clone, PartialEq)]
pub struct LadderAssignerConfig {
    /// 参考片段大小（严格递增）
    pub ref_sizes: Vec<f64>,
    /// 阶梯峰最小高度
    pub min_height: f64,
    /// 阶梯峰最小间距
    pub min_distance: usize,
    /// 相邻被选峰最大扫描距离
    pub max_ladder_trace_distance: usize,
    /// 评分策略
    pub scoring: AssignmentScoring,
}

/// 阶梯匹配结果：与参考片段一一对应的峰
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    /// 被选峰的扫描时间（严格递增，长度 == refCount）
    pub times: Vec<usize>,
    /// 对应的参考片段大小
    pub sizes: Vec<f64>,
    /// 最优得分
    pub score: f64,
}

impl Assignment {
    /// 扫描时间（浮点）
    pub fn times_f64(&self) -> Vec<f64> {
        self.times.iter().map(|&t| t as f64).collect()
    }
}

/// 阶梯匹配器
#[derive(Debug, Clone)]
pub struct LadderAssigner {
    config: LadderAssignerConfig,
}

impl LadderAssigner {
    pub fn new(config: LadderAssignerConfig) -> Self {
        Self { config }
    }

    /// 参考片段数量
    #[inline]
    pub fn ref_count(&self) -> usize {
        self.config.ref_sizes.len()
    }

    /// 阶梯通道峰检测：返回按时间排序的候选峰（最多 refCount + 3 个）
    pub fn detect_candidates(&self, size_standard: &[f64]) -> FragmentResult<Vec<CandidatePeak>> {
        let mut peaks = peak_detection::find_peaks(
            size_standard,
            &PeakDetectionParams {
                min_height: Some(self.config.min_height),
                min_distance: Some(self.config.min_distance),
            },
        );

        if peaks.len() < self.ref_count() {
            return Err(FragmentError::InsufficientPeaks {
                found: peaks.len(),
                required: self.ref_count(),
            });
        }

        // 保留最高的 refCount + padding 个峰
        let max_peak_count = self.ref_count() + ladder_fitting::PEAK_COUNT_PADDING;
        if peaks.len() > max_peak_count {
            peaks.sort_by(|a, b| {
                b.height
                    .total_cmp(&a.height)
                    .then(a.position.cmp(&b.position))
            });
            peaks.truncate(max_peak_count);
            peaks.sort_by_key(|p| p.position);
        }

        tracing::debug!(candidates = peaks.len(), "ladder candidates detected");
        Ok(peaks)
    }

    /// 完整阶梯匹配：检测候选峰并选出最优子集
    pub fn assign(&self, size_standard: &[f64]) -> FragmentResult<Assignment> {
        let candidates = self.detect_candidates(size_standard)?;
        self.assign_candidates(&candidates)
    }

    /// 在给定候选峰（按时间升序）中选出最优子集
    pub fn assign_candidates(&self, candidates: &[CandidatePeak]) -> FragmentResult<Assignment> {
        let n = self.ref_count();
        let required = self.config.scoring.min_sizes();
        if n < required {
            return Err(FragmentError::InvalidInput(format!(
                "{} 评分至少需要 {required} 个参考片段，当前 {n} 个 / {} scoring requires at least {required} reference sizes, got {n}",
                self.config.scoring.strategy_name(),
                self.config.scoring.strategy_name(),
            )));
        }
        if candidates.len() < n {
            return Err(FragmentError::InsufficientPeaks {
                found: candidates.len(),
                required: n,
            });
        }

        let positions: Vec<usize> = candidates.iter().map(|c| c.position).collect();
        if positions.windows(2).any(|w| w[0] >= w[1]) {
            return Err(FragmentError::InvalidInput(
                "候选峰必须按时间严格递增 / candidates must be strictly ascending in time"
                    .to_string(),
            ));
        }

        let mut search = SubsetSearch {
            positions: &positions,
            sizes: &self.config.ref_sizes,
            max_gap: self.config.max_ladder_trace_distance,
            scorer: &self.config.scoring,
            current: Vec::with_capacity(n),
            best: None,
            evaluated: 0,
        };
        search.descend(0);

        let evaluated = search.evaluated;
        let (best_indices, score) = search.best.ok_or_else(|| {
            FragmentError::Assignment(format!(
                "{} 个候选峰中没有满足最大间距 {} 的 {n} 峰组合 / no {n}-peak subset of {} candidates satisfies max ladder trace distance {}",
                positions.len(),
                self.config.max_ladder_trace_distance,
                positions.len(),
                self.config.max_ladder_trace_distance,
            ))
        })?;

        tracing::debug!(
            strategy = self.config.scoring.strategy_name(),
            evaluated,
            score,
            "ladder assignment selected"
        );

        Ok(Assignment {
            times: best_indices.iter().map(|&i| positions[i]).collect(),
            sizes: self.config.ref_sizes.clone(),
            score,
        })
    }
}

/// 深度优先枚举保序子集（字典序），剪枝：间距约束 + 剩余候选不足
struct SubsetSearch<'a> {
    positions: &'a [usize],
    sizes: &'a [f64],
    max_gap: usize,
    scorer: &'a AssignmentScoring,
    current: Vec<usize>,
    best: Option<(Vec<usize>, f64)>,
    evaluated: usize,
}

impl SubsetSearch<'_> {
    fn descend(&mut self, start: usize) {
        let needed = self.sizes.len() - self.current.len();
        if needed == 0 {
            self.evaluate();
            return;
        }

        let last_start = self.positions.len() - needed;
        for idx in start..=last_start {
            if let Some(&prev) = self.current.last() {
                // 位置递增，超出间距后更靠后的候选也不可能满足
                if self.positions[idx] - self.positions[prev] > self.max_gap {
                    break;
                }
            }
            self.current.push(idx);
            self.descend(idx + 1);
            self.current.pop();
        }
    }

    fn evaluate(&mut self) {
        self.evaluated += 1;
        let times: Vec<f64> = self
            .current
            .iter()
            .map(|&i| self.positions[i] as f64)
            .collect();
        let score = self.scorer.score(&times, self.sizes);
        if !score.is_finite() {
            return;
        }

        // 严格小于：得分相同时保留先枚举到（时间更早）的子集
        let better = match &self.best {
            None => true,
            Some((_, best)) => score < *best,
        };
        if better {
            self.best = Some((self.current.clone(), score));
        }
    }
}

/// 评分函数集合
pub mod scoring {
    use super::*;

    /// 将 `values` 线性缩放到 [lo, hi]
    pub fn minmax_scale(values: &[f64], lo: f64, hi: f64) -> Vec<f64> {
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let span = max - min;
        if span == 0.0 {
            return vec![lo; values.len()];
        }
        values
            .iter()
            .map(|v| lo + (v - min) / span * (hi - lo))
            .collect()
    }

    /// 三次多项式回归 times ~ poly3(sizes)，返回 1 - R²
    pub fn polynomial_inverse_r2(sizes: &[f64], times: &[f64]) -> f64 {
        let n = sizes.len();
        if n < 2 {
            return f64::NAN;
        }
        // 自变量归一化到 [-1, 1] 改善条件数
        let scaled = minmax_scale(sizes, -1.0, 1.0);
        let degree = 3.min(n - 1);
        let design = DMatrix::from_fn(n, degree + 1, |r, c| scaled[r].powi(c as i32));
        let y = DVector::from_column_slice(times);
        match linalg::least_squares(&design, &y) {
            Ok(coef) => {
                let predicted: Vec<f64> = (design * coef).iter().cloned().collect();
                1.0 - linalg::r2_score(times, &predicted)
            }
            Err(_) => f64::NAN,
        }
    }

    /// 自然三次插值样条 times(sizes) 在节点处二阶导数绝对值的最大值
    pub fn max_spline_second_derivative(sizes: &[f64], times: &[f64]) -> f64 {
        natural_spline_second_derivatives(sizes, times)
            .map(|m| m.iter().fold(0.0_f64, |acc, v| acc.max(v.abs())))
            .unwrap_or(f64::NAN)
    }

    /// 参考片段间隔缩放到观测时间范围后，与观测时间间隔的最大相对偏差
    pub fn max_fractional_deviation(sizes: &[f64], times: &[f64]) -> f64 {
        let n = times.len();
        if n < 2 {
            return f64::NAN;
        }
        let scaled = minmax_scale(sizes, times[0], times[n - 1]);
        times
            .windows(2)
            .zip(scaled.windows(2))
            .map(|(t, s)| {
                let observed = t[1] - t[0];
                let expected = s[1] - s[0];
                (observed - expected).abs() / observed
            })
            .fold(0.0_f64, f64::max)
    }

    /// 自然边界三次样条的节点二阶导数（三对角Thomas算法）
    pub fn natural_spline_second_derivatives(x: &[f64], y: &[f64]) -> Option<Vec<f64>> {
        let n = x.len();
        if n < 3 || y.len() != n {
            return None;
        }
        let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
        if h.iter().any(|&v| v <= 0.0) {
            return None;
        }

        // 内部节点方程：h[i-1] M[i-1] + 2(h[i-1]+h[i]) M[i] + h[i] M[i+1] = rhs[i]
        let m = n - 2;
        let mut diag = vec![0.0; m];
        let mut upper = vec![0.0; m];
        let mut rhs = vec![0.0; m];
        for k in 0..m {
            let i = k + 1;
            diag[k] = 2.0 * (h[i - 1] + h[i]);
            upper[k] = h[i];
            rhs[k] = 6.0 * ((y[i + 1] - y[i]) / h[i] - (y[i] - y[i - 1]) / h[i - 1]);
        }

        // 前向消元（下对角元为 h[i-1]）
        for k in 1..m {
            let factor = h[k] / diag[k - 1];
            diag[k] -= factor * upper[k - 1];
            rhs[k] -= factor * rhs[k - 1];
        }
        let mut inner = vec![0.0; m];
        for k in (0..m).rev() {
            let next = if k + 1 < m { upper[k] * inner[k + 1] } else { 0.0 };
            inner[k] = (rhs[k] - next) / diag[k];
        }

        let mut second = Vec::with_capacity(n);
        second.push(0.0);
        second.extend(inner);
        second.push(0.0);
        Some(second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZES: [f64; 8] = [50.0, 75.0, 100.0, 139.0, 150.0, 200.0, 250.0, 300.0];

    fn true_times() -> Vec<usize> {
        // 轻度二次的 time(size) 关系
        SIZES
            .iter()
            .map(|s| (1000.0 + 12.0 * s + 0.004 * s * s).round() as usize)
            .collect()
    }

    fn config(scoring: AssignmentScoring) -> LadderAssignerConfig {
        LadderAssignerConfig {
            ref_sizes: SIZES.to_vec(),
            min_height: 100.0,
            min_distance: 10,
            max_ladder_trace_distance: 1000,
            scoring,
        }
    }

    fn candidates(positions: &[usize]) -> Vec<CandidatePeak> {
        positions
            .iter()
            .map(|&position| CandidatePeak {
                position,
                height: 1000.0,
            })
            .collect()
    }

    #[test]
    fn test_exact_candidates_are_returned() {
        let times = true_times();
        let assigner = LadderAssigner::new(config(AssignmentScoring::default()));
        let assignment = assigner.assign_candidates(&candidates(&times)).unwrap();
        assert_eq!(assignment.times, times);
        assert_eq!(assignment.sizes.len(), SIZES.len());
    }

    #[test]
    fn test_spurious_peaks_are_skipped_by_every_strategy() {
        let times = true_times();
        let mut positions = times.clone();
        positions.push(times[2] + 150); // 片段之间的杂峰
        positions.push(times[0] - 300); // 引物峰
        positions.push(times[7] + 400); // 尾部杂峰
        positions.sort();

        for scoring in [
            AssignmentScoring::PolynomialResidual,
            AssignmentScoring::SplineCurvature,
            AssignmentScoring::FractionalDeviation,
        ] {
            let assigner = LadderAssigner::new(config(scoring));
            let assignment = assigner.assign_candidates(&candidates(&positions)).unwrap();
            assert_eq!(assignment.times, times, "strategy {}", scoring.strategy_name());
            assert!(assignment.times.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_insufficient_candidates() {
        let assigner = LadderAssigner::new(config(AssignmentScoring::default()));
        let result = assigner.assign_candidates(&candidates(&[10, 20, 30]));
        assert!(matches!(
            result,
            Err(FragmentError::InsufficientPeaks {
                found: 3,
                required: 8
            })
        ));
    }

    #[test]
    fn test_distance_constraint_rejects_all() {
        let mut cfg = config(AssignmentScoring::default());
        cfg.max_ladder_trace_distance = 100;
        let assigner = LadderAssigner::new(cfg);
        let result = assigner.assign_candidates(&candidates(&true_times()));
        assert!(matches!(result, Err(FragmentError::Assignment(_))));
    }

    #[test]
    fn test_spline_scoring_needs_three_sizes() {
        let assigner = LadderAssigner::new(LadderAssignerConfig {
            ref_sizes: vec![100.0, 200.0],
            min_height: 100.0,
            min_distance: 10,
            max_ladder_trace_distance: 1000,
            scoring: AssignmentScoring::SplineCurvature,
        });
        let result = assigner.assign_candidates(&candidates(&[2000, 3000, 4000]));
        match result {
            Err(FragmentError::InvalidInput(message)) => {
                assert!(message.contains("spline"), "{message}");
                assert!(message.contains("3"), "{message}");
            }
            other => panic!("两个参考片段不足以计算样条曲率: {other:?}"),
        }

        // 同样两个片段，多项式评分可以给出结果
        let assigner = LadderAssigner::new(LadderAssignerConfig {
            scoring: AssignmentScoring::PolynomialResidual,
            ..assigner.config.clone()
        });
        let assignment = assigner.assign_candidates(&candidates(&[2000, 3000])).unwrap();
        assert_eq!(assignment.times, vec![2000, 3000]);
    }

    #[test]
    fn test_tie_breaks_to_earliest_subset() {
        // 等间距候选 + 等间距参考：平移后的子集得分相同，应选最早的
        let sizes = vec![10.0, 20.0, 30.0];
        let assigner = LadderAssigner::new(LadderAssignerConfig {
            ref_sizes: sizes,
            min_height: 0.0,
            min_distance: 1,
            max_ladder_trace_distance: 1000,
            scoring: AssignmentScoring::FractionalDeviation,
        });
        let assignment = assigner
            .assign_candidates(&candidates(&[100, 200, 300, 400]))
            .unwrap();
        assert_eq!(assignment.times, vec![100, 200, 300]);
    }

    #[test]
    fn test_detect_candidates_caps_to_tallest() {
        let mut trace = vec![0.0; 2000];
        // 10个峰，高度递增
        for k in 0..10 {
            let center = 100 + k * 150;
            for (offset, value) in [(-1i64, 0.5), (0, 1.0), (1, 0.5)] {
                trace[(center as i64 + offset) as usize] = value * (200.0 + 10.0 * k as f64);
            }
        }
        let mut cfg = config(AssignmentScoring::default());
        cfg.ref_sizes = vec![1.0, 2.0, 3.0, 4.0];
        let assigner = LadderAssigner::new(cfg);
        let peaks = assigner.detect_candidates(&trace).unwrap();
        assert_eq!(peaks.len(), 4 + ladder_fitting::PEAK_COUNT_PADDING);
        // 保留的是最后（最高）的7个峰，且按时间排序
        assert_eq!(peaks[0].position, 100 + 3 * 150);
        assert!(peaks.windows(2).all(|w| w[0].position < w[1].position));
    }

    #[test]
    fn test_natural_spline_linear_has_zero_curvature() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0];
        let y = [1.0, 3.0, 5.0, 7.0, 9.0];
        let m = scoring::natural_spline_second_derivatives(&x, &y).unwrap();
        assert!(m.iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn test_scoring_parse() {
        assert_eq!(
            "spline".parse::<AssignmentScoring>().unwrap(),
            AssignmentScoring::SplineCurvature
        );
        assert!("random".parse::<AssignmentScoring>().is_err());
    }
}
