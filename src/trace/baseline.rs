//! 基线校正滤波器
//!
//! arPLS（asymmetrically reweighted penalized least squares）基线估计：
//! 迭代求解 (W + λDᵀD) z = W y，D为二阶差分矩阵，权重按残差的负半部分统计重估。
//! 系统矩阵为五对角对称正定矩阵，使用带状Cholesky分解 O(n) 求解。

use super::Trace;

/// 基线校正trait
pub trait BaselineFilter: Send + Sync {
    /// 返回去除基线后的轨迹
    fn denoise(&self, trace: &Trace) -> Trace;
}

/// arPLS基线校正
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArplsBaseline {
    /// 平滑惩罚系数 λ
    pub lambda: f64,
    /// 权重收敛阈值（相对变化）
    pub ratio: f64,
    /// 最大迭代次数
    pub max_iterations: usize,
}

impl Default for ArplsBaseline {
    fn default() -> Self {
        Self {
            lambda: 1.0e5,
            ratio: 1.0e-6,
            max_iterations: 10,
        }
    }
}

impl ArplsBaseline {
    /// 估计基线
    pub fn estimate(&self, y: &[f64]) -> Vec<f64> {
        let n = y.len();
        if n < 4 {
            return y.to_vec();
        }

        let mut weights = vec![1.0; n];
        let mut baseline = y.to_vec();

        for _ in 0..self.max_iterations {
            let rhs: Vec<f64> = weights.iter().zip(y).map(|(w, v)| w * v).collect();
            match solve_penalized(&weights, self.lambda, &rhs) {
                Some(z) => baseline = z,
                None => break,
            }

            // 残差负半部分的统计量
            let negatives: Vec<f64> = y
                .iter()
                .zip(&baseline)
                .map(|(v, z)| v - z)
                .filter(|d| *d < 0.0)
                .collect();
            if negatives.len() < 2 {
                break;
            }
            let mean = negatives.iter().sum::<f64>() / negatives.len() as f64;
            let std = (negatives.iter().map(|d| (d - mean).powi(2)).sum::<f64>()
                / negatives.len() as f64)
                .sqrt();
            if std <= f64::EPSILON {
                break;
            }

            let new_weights: Vec<f64> = y
                .iter()
                .zip(&baseline)
                .map(|(v, z)| {
                    let d = v - z;
                    let exponent = (2.0 * (d - (2.0 * std - mean)) / std).min(700.0);
                    1.0 / (1.0 + exponent.exp())
                })
                .collect();

            let norm = weights.iter().map(|w| w * w).sum::<f64>().sqrt();
            let change = weights
                .iter()
                .zip(&new_weights)
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
                .sqrt();
            weights = new_weights;
            if norm == 0.0 || change / norm < self.ratio {
                break;
            }
        }

        baseline
    }
}

impl BaselineFilter for ArplsBaseline {
    fn denoise(&self, trace: &Trace) -> Trace {
        let y = trace.intensities();
        let baseline = self.estimate(y);
        Trace::new(y.iter().zip(&baseline).map(|(v, z)| v - z).collect())
    }
}

/// 求解 (diag(w) + λDᵀD) z = rhs（带宽为2的带状Cholesky）
fn solve_penalized(weights: &[f64], lambda: f64, rhs: &[f64]) -> Option<Vec<f64>> {
    let n = weights.len();

    // DᵀD 的三条对角线
    let main = |i: usize| -> f64 {
        if i == 0 || i == n - 1 {
            1.0
        } else if i == 1 || i == n - 2 {
            5.0
        } else {
            6.0
        }
    };
    let off1 = |i: usize| -> f64 {
        // (i, i-1)
        if i == 1 || i == n - 1 { -2.0 } else { -4.0 }
    };

    // L的三条对角线：d[i]=L(i,i), l1[i]=L(i,i-1), l2[i]=L(i,i-2)
    let mut d = vec![0.0; n];
    let mut l1 = vec![0.0; n];
    let mut l2 = vec![0.0; n];

    for i in 0..n {
        let a_ii = weights[i] + lambda * main(i);
        if i >= 2 {
            l2[i] = lambda / d[i - 2];
        }
        if i >= 1 {
            let a_i1 = lambda * off1(i);
            let correction = if i >= 2 { l2[i] * l1[i - 1] } else { 0.0 };
            l1[i] = (a_i1 - correction) / d[i - 1];
        }
        let pivot = a_ii - l1[i] * l1[i] - l2[i] * l2[i];
        if pivot <= 0.0 || !pivot.is_finite() {
            return None;
        }
        d[i] = pivot.sqrt();
    }

    // L u = rhs
    let mut u = vec![0.0; n];
    for i in 0..n {
        let mut acc = rhs[i];
        if i >= 1 {
            acc -= l1[i] * u[i - 1];
        }
        if i >= 2 {
            acc -= l2[i] * u[i - 2];
        }
        u[i] = acc / d[i];
    }

    // Lᵀ z = u
    let mut z = vec![0.0; n];
    for i in (0..n).rev() {
        let mut acc = u[i];
        if i + 1 < n {
            acc -= l1[i + 1] * z[i + 1];
        }
        if i + 2 < n {
            acc -= l2[i + 2] * z[i + 2];
        }
        z[i] = acc / d[i];
    }

    Some(z)
}
