//! 峰形模型
//!
//! 三种解析峰形（参数约定与常用非线性拟合库一致，`amplitude` 即峰面积）：
//!
//! - Gaussian:   A / (σ√(2π)) · exp(-(x-c)² / (2σ²))
//! - Lorentzian: A / π · σ / ((x-c)² + σ²)
//! - Voigt:      A · Re[w(z)] / (σ√(2π)),  z = (x - c + iγ) / (σ√2)，γ 与 σ 绑定
//!
//! 模型名在拟合入口解析一次为枚举，之后不再按字符串分派。

use crate::core::curve_fit::FitModel;
use crate::error::FragmentError;
use nalgebra::Complex;
use serde::{Serialize, Serializer};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

const SQRT_2: f64 = std::f64::consts::SQRT_2;
const SQRT_2PI: f64 = 2.506_628_274_631_000_7;
/// 2√(2 ln 2)
const GAUSSIAN_FWHM_FACTOR: f64 = 2.354_820_045_030_949;

/// 峰形模型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeakModel {
    Gaussian,
    Voigt,
    Lorentzian,
}

impl PeakModel {
    /// 全部支持的模型
    pub const ALL: [PeakModel; 3] = [PeakModel::Gaussian, PeakModel::Voigt, PeakModel::Lorentzian];

    /// 规范名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gaussian => "gaussian",
            Self::Voigt => "voigt",
            Self::Lorentzian => "lorentzian",
        }
    }

    /// 初值估计的振幅/宽度缩放系数
    fn guess_scales(&self) -> (f64, f64) {
        match self {
            Self::Gaussian => (1.0, 1.0),
            Self::Lorentzian => (1.25, 1.0),
            Self::Voigt => (1.5, 0.65),
        }
    }

    /// 在x处求值
    pub fn evaluate(&self, x: f64, params: &PeakParams) -> f64 {
        let PeakParams {
            amplitude,
            center,
            sigma,
        } = *params;
        let dx = x - center;
        match self {
            Self::Gaussian => {
                amplitude / (sigma * SQRT_2PI) * (-dx * dx / (2.0 * sigma * sigma)).exp()
            }
            Self::Lorentzian => amplitude / PI * sigma / (dx * dx + sigma * sigma),
            Self::Voigt => {
                let gamma = sigma;
                let scale = sigma * SQRT_2;
                amplitude * faddeeva_real(dx / scale, gamma / scale) / (sigma * SQRT_2PI)
            }
        }
    }

    /// 半高宽
    pub fn fwhm(&self, params: &PeakParams) -> f64 {
        let sigma = params.sigma;
        match self {
            Self::Gaussian => GAUSSIAN_FWHM_FACTOR * sigma,
            Self::Lorentzian => 2.0 * sigma,
            Self::Voigt => {
                let gamma = sigma;
                1.0692 * gamma + (0.8664 * gamma * gamma + 5.545_083 * sigma * sigma).sqrt()
            }
        }
    }

    /// 峰高（中心处的函数值）
    pub fn height(&self, params: &PeakParams) -> f64 {
        self.evaluate(params.center, params)
    }

    /// 从数据估计初值：最大值位置为中心，半高以上区间估计宽度
    pub fn guess(&self, x: &[f64], y: &[f64]) -> PeakParams {
        let (ampscale, sigscale) = self.guess_scales();
        if x.is_empty() || y.is_empty() {
            return PeakParams {
                amplitude: 0.0,
                center: 0.0,
                sigma: 1.0,
            };
        }

        let max_y = y.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let min_y = y.iter().cloned().fold(f64::INFINITY, f64::min);
        let max_x = x.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let min_x = x.iter().cloned().fold(f64::INFINITY, f64::min);

        let argmax = y
            .iter()
            .enumerate()
            .fold(0, |best, (i, v)| if *v > y[best] { i } else { best });
        let mut center = x[argmax];
        let height = (max_y - min_y) * 3.0;
        let mut sigma = (max_x - min_x) / 6.0;

        let half_max = (max_y + min_y) / 2.0;
        let above: Vec<usize> = (0..y.len()).filter(|&i| y[i] > half_max).collect();
        if above.len() > 2 {
            let first = above[0];
            let last = above[above.len() - 1];
            sigma = (x[last] - x[first]) / 2.0;
            center = above.iter().map(|&i| x[i]).sum::<f64>() / above.len() as f64;
        }

        if !(sigma > 0.0) || !sigma.is_finite() {
            sigma = 1.0;
        }

        PeakParams {
            amplitude: height * sigma * ampscale,
            center,
            sigma: sigma * sigscale,
        }
    }
}

impl fmt::Display for PeakModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PeakModel {
    type Err = FragmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gauss" | "gaussian" => Ok(Self::Gaussian),
            "voigt" => Ok(Self::Voigt),
            "lorentzian" | "lorentz" => Ok(Self::Lorentzian),
            _ => Err(FragmentError::UnsupportedModel {
                name: s.to_string(),
            }),
        }
    }
}

impl Serialize for PeakModel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// 峰形参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PeakParams {
    /// 峰面积
    pub amplitude: f64,
    /// 峰中心
    pub center: f64,
    /// 宽度参数（Voigt中 γ = σ）
    pub sigma: f64,
}

impl PeakParams {
    pub fn to_vec(&self) -> Vec<f64> {
        vec![self.amplitude, self.center, self.sigma]
    }

    pub fn from_slice(values: &[f64]) -> Self {
        Self {
            amplitude: values.first().copied().unwrap_or(0.0),
            center: values.get(1).copied().unwrap_or(0.0),
            sigma: values.get(2).copied().unwrap_or(1.0),
        }
    }
}

impl FitModel for PeakModel {
    fn name(&self) -> &'static str {
        PeakModel::name(self)
    }

    fn param_names(&self) -> &'static [&'static str] {
        &["amplitude", "center", "sigma"]
    }

    fn evaluate(&self, x: f64, params: &[f64]) -> f64 {
        PeakModel::evaluate(self, x, &PeakParams::from_slice(params))
    }

    fn constrain(&self, previous: &[f64], candidate: &mut [f64]) {
        // σ > 0：越界时步长减半逼近下界
        if let (Some(prev), Some(sigma)) = (previous.get(2), candidate.get_mut(2))
            && !(*sigma > 0.0)
        {
            *sigma = prev / 2.0;
        }
    }
}

/// Faddeeva 函数 w(z) 的实部，z = x + iy，y ≥ 0（Humlicek W4 有理近似）
pub fn faddeeva_real(x: f64, y: f64) -> f64 {
    faddeeva(x, y).re
}

/// Faddeeva 函数 w(z) = exp(-z²) erfc(-iz)，y ≥ 0
pub fn faddeeva(x: f64, y: f64) -> Complex<f64> {
    let c = |v: f64| Complex::new(v, 0.0);
    let t = Complex::new(y, -x);
    let s = x.abs() + y;

    if s >= 15.0 {
        t * 0.564_189_6 / (t * t + 0.5)
    } else if s >= 5.5 {
        let u = t * t;
        t * (u * 0.564_189_6 + 1.410_474) / ((u + 3.0) * u + 0.75)
    } else if y >= 0.195 * x.abs() - 0.176 {
        let num = c(16.4955)
            + t * (c(20.209_33) + t * (c(11.964_82) + t * (c(3.778_987) + t * 0.564_223_6)));
        let den = c(16.4955)
            + t * (c(38.823_63) + t * (c(39.271_21) + t * (c(21.692_74) + t * (c(6.699_398) + t))));
        num / den
    } else {
        let u = t * t;
        let num = t
            * (c(36_183.31)
                - u * (c(3_321.9905)
                    - u * (c(1_540.787)
                        - u * (c(219.0313)
                            - u * (c(35.766_83) - u * (c(1.320_522) - u * 0.56419))))));
        let den = c(32_066.6)
            - u * (c(24_322.84)
                - u * (c(9_022.228)
                    - u * (c(2_186.181)
                        - u * (c(364.2191)
                            - u * (c(61.570_37) - u * (c(1.841_439) - u))))));
        u.exp() - num / den
    }
}
