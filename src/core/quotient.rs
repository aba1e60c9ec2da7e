//! 商值（quotient）计算
//!
//! 每个assay一个比值，由拟合峰面积（amplitude）按峰数决定规则：
//!
//! - 1个峰：0
//! - 2个峰：后峰 / 前峰；设置了 `cutoff` 且assay平均bp低于 `cutoff` 时改为 前峰 / 后峰
//! - 3个及以上：最后一个峰 / 其余峰面积均值

use crate::core::peak_fitter::FittedPeak;

/// 按bp顺序的峰面积计算商值
///
/// `mean_basepairs` 仅在2峰且设置了 `cutoff` 时使用。
pub fn quotient_from_amplitudes(
    amplitudes: &[f64],
    mean_basepairs: f64,
    cutoff: Option<f64>,
) -> f64 {
    match amplitudes {
        [] | [_] => 0.0,
        [first, last] => match cutoff {
            Some(cutoff) if mean_basepairs < cutoff => first / last,
            _ => last / first,
        },
        [rest @ .., last] => {
            let mean = rest.iter().sum::<f64>() / rest.len() as f64;
            last / mean
        }
    }
}

/// 一个assay的拟合峰 → 商值
pub fn assay_quotient(peaks: &[FittedPeak], cutoff: Option<f64>) -> f64 {
    let amplitudes: Vec<f64> = peaks.iter().map(|p| p.amplitude()).collect();
    let mean_basepairs = if peaks.is_empty() {
        0.0
    } else {
        peaks.iter().map(|p| p.info.basepairs).sum::<f64>() / peaks.len() as f64
    };
    quotient_from_amplitudes(&amplitudes, mean_basepairs, cutoff)
}
