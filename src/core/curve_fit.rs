//! 非线性最小二乘拟合
//!
//! Levenberg–Marquardt（Marquardt对角缩放，前向差分Jacobian），
//! 收敛后由 (JᵀJ)⁻¹·χ²ᵣ 给出参数协方差和标准误差，并生成文本拟合报告。

use crate::error::{FragmentError, FragmentResult};
use crate::tools::constants::curve_fit as limits;
use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use std::fmt::Write as _;

/// 可拟合模型
pub trait FitModel {
    /// 模型名（用于报告）
    fn name(&self) -> &'static str;

    /// 参数名，顺序与参数向量一致
    fn param_names(&self) -> &'static [&'static str];

    /// 在x处求值
    fn evaluate(&self, x: f64, params: &[f64]) -> f64;

    /// 参数约束：把试探步修正到可行域内
    fn constrain(&self, _previous: &[f64], _candidate: &mut [f64]) {}
}

/// 拟合统计量
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FitStatistics {
    /// 函数求值次数（以整条曲线计）
    pub nfev: usize,
    /// 数据点数
    pub ndata: usize,
    /// 自由参数数
    pub nvarys: usize,
    /// 残差平方和
    pub chisqr: f64,
    /// 约化卡方
    pub redchi: f64,
    /// Akaike信息准则
    pub aic: f64,
    /// Bayesian信息准则
    pub bic: f64,
    /// 决定系数
    pub r_squared: f64,
    /// 是否满足收敛判据
    pub converged: bool,
}

/// 拟合结果
#[derive(Debug, Clone, PartialEq)]
pub struct FitOutcome {
    /// 初值
    pub initial: Vec<f64>,
    /// 最优参数
    pub params: Vec<f64>,
    /// 参数标准误差（协方差不可求时为None）
    pub stderr: Option<Vec<f64>>,
    /// 最优参数下的模型曲线
    pub best_fit: Vec<f64>,
    pub statistics: FitStatistics,
}

/// Levenberg–Marquardt 拟合器
#[derive(Debug, Clone, Copy)]
pub struct LevenbergMarquardt {
    pub max_iterations: usize,
    pub ftol: f64,
    pub xtol: f64,
    pub initial_lambda: f64,
}

impl Default for LevenbergMarquardt {
    fn default() -> Self {
        Self {
            max_iterations: limits::MAX_ITERATIONS,
            ftol: limits::FTOL,
            xtol: limits::XTOL,
            initial_lambda: limits::INITIAL_LAMBDA,
        }
    }
}

impl LevenbergMarquardt {
    /// 对 (x, y) 拟合模型
    pub fn fit<M: FitModel + ?Sized>(
        &self,
        model: &M,
        x: &[f64],
        y: &[f64],
        initial: &[f64],
    ) -> FragmentResult<FitOutcome> {
        let n = x.len();
        let k = initial.len();
        if n != y.len() {
            return Err(FragmentError::CalculationError(format!(
                "拟合数据长度不一致: x={n}, y={}",
                y.len()
            )));
        }
        if n < k {
            return Err(FragmentError::CalculationError(format!(
                "拟合数据点不足: {n} 个点, {k} 个参数"
            )));
        }

        let mut params = initial.to_vec();
        let mut residuals = residual_vector(model, x, y, &params);
        let mut chisqr = residuals.norm_squared();
        if !chisqr.is_finite() {
            return Err(FragmentError::CalculationError(format!(
                "{} 模型初值处残差非有限",
                model.name()
            )));
        }

        let mut nfev = 1;
        let mut lambda = self.initial_lambda;
        let mut converged = false;

        'outer: for _ in 0..self.max_iterations {
            let jac = jacobian(model, x, &params);
            nfev += k;
            let jtj = jac.transpose() * &jac;
            let gradient = jac.transpose() * &residuals;

            loop {
                let mut damped = jtj.clone();
                for i in 0..k {
                    let d = jtj[(i, i)];
                    damped[(i, i)] += lambda * if d > 0.0 { d } else { 1.0 };
                }

                let step = match damped.cholesky() {
                    Some(chol) => chol.solve(&gradient),
                    None => {
                        lambda *= 10.0;
                        if lambda > 1.0e16 {
                            break 'outer;
                        }
                        continue;
                    }
                };

                let mut candidate: Vec<f64> =
                    params.iter().zip(step.iter()).map(|(p, s)| p + s).collect();
                model.constrain(&params, &mut candidate);

                let trial = residual_vector(model, x, y, &candidate);
                nfev += 1;
                let trial_chisqr = trial.norm_squared();

                if trial_chisqr.is_finite() && trial_chisqr <= chisqr {
                    let reduction = chisqr - trial_chisqr;
                    let step_norm = step.norm();
                    let param_norm = params.iter().map(|p| p * p).sum::<f64>().sqrt();

                    params = candidate;
                    residuals = trial;
                    chisqr = trial_chisqr;
                    lambda = (lambda / 10.0).max(1.0e-12);

                    if reduction <= self.ftol * chisqr.max(f64::MIN_POSITIVE)
                        || step_norm <= self.xtol * (param_norm + self.xtol)
                    {
                        converged = true;
                        break 'outer;
                    }
                    break;
                }

                lambda *= 10.0;
                if lambda > 1.0e16 {
                    // 无法继续下降，视为已到极小值
                    converged = true;
                    break 'outer;
                }
            }
        }

        let best_fit: Vec<f64> = x.iter().map(|&xi| model.evaluate(xi, &params)).collect();
        let stderr = standard_errors(model, x, &params, chisqr, n, k);
        nfev += k;

        let statistics = statistics(y, chisqr, n, k, nfev, converged);
        if !converged {
            tracing::warn!(
                model = model.name(),
                nfev,
                "curve fit stopped before convergence"
            );
        }

        Ok(FitOutcome {
            initial: initial.to_vec(),
            params,
            stderr,
            best_fit,
            statistics,
        })
    }
}

/// 残差 y - f(x)
fn residual_vector<M: FitModel + ?Sized>(
    model: &M,
    x: &[f64],
    y: &[f64],
    params: &[f64],
) -> DVector<f64> {
    DVector::from_iterator(
        x.len(),
        x.iter().zip(y).map(|(&xi, &yi)| yi - model.evaluate(xi, params)),
    )
}

/// 前向差分Jacobian ∂f/∂p
fn jacobian<M: FitModel + ?Sized>(model: &M, x: &[f64], params: &[f64]) -> DMatrix<f64> {
    let n = x.len();
    let k = params.len();
    let base: Vec<f64> = x.iter().map(|&xi| model.evaluate(xi, params)).collect();
    let mut jac = DMatrix::zeros(n, k);
    let eps = f64::EPSILON.sqrt();

    let mut shifted = params.to_vec();
    for j in 0..k {
        let h = if params[j] == 0.0 {
            eps
        } else {
            eps * params[j].abs()
        };
        shifted[j] = params[j] + h;
        for (i, &xi) in x.iter().enumerate() {
            jac[(i, j)] = (model.evaluate(xi, &shifted) - base[i]) / h;
        }
        shifted[j] = params[j];
    }
    jac
}

/// 协方差 = (JᵀJ)⁻¹ · χ²ᵣ 的对角线开方
fn standard_errors<M: FitModel + ?Sized>(
    model: &M,
    x: &[f64],
    params: &[f64],
    chisqr: f64,
    n: usize,
    k: usize,
) -> Option<Vec<f64>> {
    if n <= k {
        return None;
    }
    let jac = jacobian(model, x, params);
    let covariance = (jac.transpose() * &jac).try_inverse()? * (chisqr / (n - k) as f64);
    let errors: Vec<f64> = (0..k).map(|i| covariance[(i, i)].sqrt()).collect();
    errors.iter().all(|e| e.is_finite()).then_some(errors)
}

fn statistics(
    y: &[f64],
    chisqr: f64,
    n: usize,
    k: usize,
    nfev: usize,
    converged: bool,
) -> FitStatistics {
    let nf = n as f64;
    let kf = k as f64;
    let redchi = if n > k { chisqr / (n - k) as f64 } else { f64::NAN };
    // χ² 为0时取下限，避免 ln(0)
    let log_term = nf * (chisqr.max(f64::MIN_POSITIVE) / nf).ln();

    let mean = y.iter().sum::<f64>() / nf;
    let ss_tot: f64 = y.iter().map(|v| (v - mean).powi(2)).sum();
    let r_squared = if ss_tot > 0.0 {
        1.0 - chisqr / ss_tot
    } else {
        0.0
    };

    FitStatistics {
        nfev,
        ndata: n,
        nvarys: k,
        chisqr,
        redchi,
        aic: log_term + 2.0 * kf,
        bic: log_term + nf.ln() * kf,
        r_squared,
        converged,
    }
}

/// 一个派生量：名称、数值、表达式
pub struct DerivedValue {
    pub name: &'static str,
    pub value: f64,
    pub expression: String,
}

/// 生成文本拟合报告
pub fn fit_report<M: FitModel + ?Sized>(
    model: &M,
    outcome: &FitOutcome,
    derived: &[DerivedValue],
) -> String {
    let stats = &outcome.statistics;
    let mut out = String::new();

    let _ = writeln!(out, "[[Model]]");
    let _ = writeln!(out, "    Model({})", model.name());
    let _ = writeln!(out, "[[Fit Statistics]]");
    let _ = writeln!(out, "    # fitting method   = leastsq");
    let _ = writeln!(out, "    # function evals   = {}", stats.nfev);
    let _ = writeln!(out, "    # data points      = {}", stats.ndata);
    let _ = writeln!(out, "    # variables        = {}", stats.nvarys);
    let _ = writeln!(out, "    chi-square         = {}", format_value(stats.chisqr));
    let _ = writeln!(out, "    reduced chi-square = {}", format_value(stats.redchi));
    let _ = writeln!(out, "    Akaike info crit   = {}", format_value(stats.aic));
    let _ = writeln!(out, "    Bayesian info crit = {}", format_value(stats.bic));
    let _ = writeln!(out, "    R-squared          = {}", format_value(stats.r_squared));
    if !stats.converged {
        let _ = writeln!(out, "##  Warning: fit did not converge");
    }
    let _ = writeln!(out, "[[Variables]]");

    let width = model
        .param_names()
        .iter()
        .map(|n| n.len())
        .chain(derived.iter().map(|d| d.name.len()))
        .max()
        .unwrap_or(0)
        + 1;

    for (i, name) in model.param_names().iter().enumerate() {
        let value = outcome.params.get(i).copied().unwrap_or(f64::NAN);
        let init = outcome.initial.get(i).copied().unwrap_or(f64::NAN);
        let label = format!("{name}:");
        match outcome.stderr.as_ref().and_then(|e| e.get(i)) {
            Some(err) => {
                let relative = if value != 0.0 {
                    format!(" ({:.2}%)", (err / value).abs() * 100.0)
                } else {
                    String::new()
                };
                let _ = writeln!(
                    out,
                    "    {label:<width$} {} +/- {}{relative} (init = {})",
                    format_value(value),
                    format_value(*err),
                    format_value(init)
                );
            }
            None => {
                let _ = writeln!(
                    out,
                    "    {label:<width$} {} (init = {})",
                    format_value(value),
                    format_value(init)
                );
            }
        }
    }
    for d in derived {
        let label = format!("{}:", d.name);
        let _ = writeln!(
            out,
            "    {label:<width$} {} == '{}'",
            format_value(d.value),
            d.expression
        );
    }

    out
}

fn format_value(v: f64) -> String {
    if !v.is_finite() {
        return format!("{v}");
    }
    let abs = v.abs();
    if abs != 0.0 && !(1.0e-4..1.0e7).contains(&abs) {
        format!("{v:.7e}")
    } else {
        format!("{v:.7}")
    }
}
