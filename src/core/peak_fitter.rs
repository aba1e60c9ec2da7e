//! 峰形拟合器
//!
//! 模型在构造时解析一次；`fit_assay` 对指定assay的每个峰窗口
//! （bp为自变量，荧光强度为因变量）做初值估计和非线性拟合。

use crate::core::calibration::CalibratedPoint;
use crate::core::curve_fit::{self, DerivedValue, FitStatistics, LevenbergMarquardt};
use crate::core::demultiplex::{DemultiplexResult, PeakInfo};
use crate::core::peak_shape::{PeakModel, PeakParams};
use crate::error::{FragmentError, FragmentResult};
use serde::Serialize;

/// 单个峰的拟合结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FittedPeak {
    pub info: PeakInfo,
    /// 拟合窗口（含padding）
    pub window: Vec<CalibratedPoint>,
    /// 窗口上的拟合曲线
    pub fitted: Vec<f64>,
    pub params: PeakParams,
    /// 参数标准误差（amplitude, center, sigma）
    pub stderr: Option<Vec<f64>>,
    /// 派生量：半高宽
    pub fwhm: f64,
    /// 派生量：模型峰高
    pub fitted_height: f64,
    pub statistics: FitStatistics,
    /// 文本拟合报告
    pub report: String,
}

impl FittedPeak {
    /// 峰面积（= amplitude）
    #[inline]
    pub fn amplitude(&self) -> f64 {
        self.params.amplitude
    }

    /// 窗口内原始强度最大的点及其拟合值（多个相同最大值时取第一个）
    pub fn apex(&self) -> Option<(&CalibratedPoint, f64)> {
        let mut best: Option<usize> = None;
        for (i, p) in self.window.iter().enumerate() {
            match best {
                Some(b) if self.window[b].intensity >= p.intensity => {}
                _ => best = Some(i),
            }
        }
        best.map(|i| (&self.window[i], self.fitted[i]))
    }
}

/// 峰形拟合器
#[derive(Debug, Clone, Copy)]
pub struct PeakFitter {
    model: PeakModel,
    solver: LevenbergMarquardt,
}

impl PeakFitter {
    pub fn new(model: PeakModel) -> Self {
        Self {
            model,
            solver: LevenbergMarquardt::default(),
        }
    }

    /// 从模型名构造；未知模型名在任何拟合之前返回 `UnsupportedModel`
    pub fn from_name(name: &str) -> FragmentResult<Self> {
        Ok(Self::new(name.parse()?))
    }

    #[inline]
    pub fn model(&self) -> PeakModel {
        self.model
    }

    /// 拟合第 `index` 个assay（从0开始）的全部峰
    pub fn fit_assay(
        &self,
        demultiplexed: &DemultiplexResult,
        index: usize,
    ) -> FragmentResult<Vec<FittedPeak>> {
        let count = demultiplexed.assays.len();
        let assay = demultiplexed
            .assays
            .get(index)
            .ok_or(FragmentError::AssayIndex { index, count })?;

        assay
            .peaks
            .iter()
            .map(|peak| self.fit_peak(peak, demultiplexed.window(peak)))
            .collect()
    }

    /// 拟合单个峰窗口
    pub fn fit_peak(
        &self,
        info: &PeakInfo,
        window: &[CalibratedPoint],
    ) -> FragmentResult<FittedPeak> {
        let x: Vec<f64> = window.iter().map(|p| p.basepairs).collect();
        let y: Vec<f64> = window.iter().map(|p| p.intensity).collect();

        let initial = self.model.guess(&x, &y);
        let outcome = self
            .solver
            .fit(&self.model, &x, &y, &initial.to_vec())
            .map_err(|e| {
                FragmentError::CalculationError(format!(
                    "峰 {} ({:.2} bp) 拟合失败: {e}",
                    info.peak_number, info.basepairs
                ))
            })?;

        let params = PeakParams::from_slice(&outcome.params);
        let fwhm = self.model.fwhm(&params);
        let fitted_height = self.model.height(&params);

        let mut derived = Vec::new();
        if self.model == PeakModel::Voigt {
            derived.push(DerivedValue {
                name: "gamma",
                value: params.sigma,
                expression: "sigma".to_string(),
            });
        }
        derived.push(DerivedValue {
            name: "fwhm",
            value: fwhm,
            expression: self.fwhm_expression().to_string(),
        });
        derived.push(DerivedValue {
            name: "height",
            value: fitted_height,
            expression: self.height_expression().to_string(),
        });
        let report = curve_fit::fit_report(&self.model, &outcome, &derived);

        tracing::debug!(
            peak = info.peak_number,
            basepairs = info.basepairs,
            amplitude = params.amplitude,
            r2 = outcome.statistics.r_squared,
            "peak fitted"
        );

        Ok(FittedPeak {
            info: info.clone(),
            window: window.to_vec(),
            fitted: outcome.best_fit,
            params,
            stderr: outcome.stderr,
            fwhm,
            fitted_height,
            statistics: outcome.statistics,
            report,
        })
    }

    fn fwhm_expression(&self) -> &'static str {
        match self.model {
            PeakModel::Gaussian => "2.3548200*sigma",
            PeakModel::Lorentzian => "2.0000000*sigma",
            PeakModel::Voigt => "1.0692*gamma+sqrt(0.8664*gamma**2+5.545083*sigma**2)",
        }
    }

    fn height_expression(&self) -> &'static str {
        match self.model {
            PeakModel::Gaussian => "0.3989423*amplitude/max(1e-15, sigma)",
            PeakModel::Lorentzian => "0.3183099*amplitude/max(1e-15, sigma)",
            PeakModel::Voigt => "(amplitude/(max(1e-15, sigma*sqrt(2*pi))))*real(wofz((1j*gamma)/(max(1e-15, sigma*sqrt(2)))))",
        }
    }
}
