//! 峰检测模块
//!
//! 局部极大值检测（含平台峰中点处理）、绝对高度过滤、按高度优先的最小间距抑制，
//! 以及峰突出度（prominence）和相对高度处峰宽的计算。语义与常用科学计算库的
//! `find_peaks` / `peak_prominences` / `peak_widths` 保持一致。

/// 检测到的候选峰
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidatePeak {
    /// 峰位置（扫描下标）
    pub position: usize,
    /// 峰高
    pub height: f64,
}

/// 峰检测参数
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PeakDetectionParams {
    /// 最小峰高（含等于）
    pub min_height: Option<f64>,
    /// 相邻峰最小水平间距（扫描点）
    pub min_distance: Option<usize>,
}

/// 峰宽计算结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakWidth {
    /// 宽度（插值后的扫描点数）
    pub width: f64,
    /// 计算宽度所用的水平线高度
    pub width_height: f64,
    /// 左交点（插值位置）
    pub left_ip: f64,
    /// 右交点（插值位置）
    pub right_ip: f64,
}

impl PeakWidth {
    /// 左边界向下取整
    #[inline]
    pub fn start_index(&self) -> usize {
        self.left_ip.floor().max(0.0) as usize
    }

    /// 右边界向上取整
    #[inline]
    pub fn end_index(&self) -> usize {
        self.right_ip.ceil().max(0.0) as usize
    }
}

/// 峰突出度
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prominence {
    pub prominence: f64,
    pub left_base: usize,
    pub right_base: usize,
}

/// 查找局部极大值（平台峰取中点，首尾点不作为峰）
pub fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if x.len() < 3 {
        return peaks;
    }

    let i_max = x.len() - 1;
    let mut i = 1;
    while i < i_max {
        if x[i - 1] < x[i] {
            let mut i_ahead = i + 1;
            while i_ahead < i_max && x[i_ahead] == x[i] {
                i_ahead += 1;
            }
            if x[i_ahead] < x[i] {
                let left_edge = i;
                let right_edge = i_ahead - 1;
                peaks.push((left_edge + right_edge) / 2);
                i = i_ahead;
            }
        }
        i += 1;
    }

    peaks
}

/// 检测峰：局部极大值 → 高度过滤 → 间距抑制，结果按位置升序
pub fn find_peaks(x: &[f64], params: &PeakDetectionParams) -> Vec<CandidatePeak> {
    let mut peaks: Vec<usize> = local_maxima(x);

    if let Some(min_height) = params.min_height {
        peaks.retain(|&p| x[p] >= min_height);
    }

    if let Some(distance) = params.min_distance
        && distance > 1
        && peaks.len() > 1
    {
        peaks = select_by_distance(&peaks, x, distance);
    }

    peaks
        .into_iter()
        .map(|position| CandidatePeak {
            position,
            height: x[position],
        })
        .collect()
}

/// 按高度从高到低保留峰，移除距离已保留峰小于 `distance` 的较低峰
fn select_by_distance(peaks: &[usize], x: &[f64], distance: usize) -> Vec<usize> {
    let mut keep = vec![true; peaks.len()];

    // 稳定排序：高度相同时靠后的峰优先级更高
    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| x[peaks[a]].total_cmp(&x[peaks[b]]));

    for &j in order.iter().rev() {
        if !keep[j] {
            continue;
        }

        let mut k = j;
        while k > 0 && peaks[j] - peaks[k - 1] < distance {
            keep[k - 1] = false;
            k -= 1;
        }

        let mut k = j + 1;
        while k < peaks.len() && peaks[k] - peaks[j] < distance {
            keep[k] = false;
            k += 1;
        }
    }

    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&p, kept)| kept.then_some(p))
        .collect()
}

/// 计算单个峰的突出度（搜索窗口为整条轨迹）
pub fn peak_prominence(x: &[f64], peak: usize) -> Prominence {
    let peak_height = x[peak];

    // 向左搜索直到遇到更高的点
    let mut left_base = peak;
    let mut left_min = peak_height;
    let mut i = peak as isize;
    while i >= 0 && x[i as usize] <= peak_height {
        if x[i as usize] < left_min {
            left_min = x[i as usize];
            left_base = i as usize;
        }
        i -= 1;
    }

    // 向右搜索
    let mut right_base = peak;
    let mut right_min = peak_height;
    let mut i = peak;
    while i < x.len() && x[i] <= peak_height {
        if x[i] < right_min {
            right_min = x[i];
            right_base = i;
        }
        i += 1;
    }

    Prominence {
        prominence: peak_height - left_min.max(right_min),
        left_base,
        right_base,
    }
}

/// 在相对高度 `rel_height` 处计算峰宽（0.5 = 半高宽，1.0 = 峰底宽）
pub fn peak_width(x: &[f64], peak: usize, rel_height: f64) -> PeakWidth {
    let Prominence {
        prominence,
        left_base,
        right_base,
    } = peak_prominence(x, peak);

    let height = x[peak] - prominence * rel_height;

    // 左交点
    let mut i = peak;
    while left_base < i && height < x[i] {
        i -= 1;
    }
    let mut left_ip = i as f64;
    if x[i] < height && i + 1 < x.len() {
        left_ip += (height - x[i]) / (x[i + 1] - x[i]);
    }

    // 右交点
    let mut i = peak;
    while i < right_base && height < x[i] {
        i += 1;
    }
    let mut right_ip = i as f64;
    if x[i] < height && i > 0 {
        right_ip -= (height - x[i]) / (x[i - 1] - x[i]);
    }

    PeakWidth {
        width: right_ip - left_ip,
        width_height: height,
        left_ip,
        right_ip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gaussian_trace(len: usize, centers: &[(f64, f64, f64)]) -> Vec<f64> {
        (0..len)
            .map(|i| {
                let x = i as f64;
                centers
                    .iter()
                    .map(|(c, h, s)| h * (-(x - c).powi(2) / (2.0 * s * s)).exp())
                    .sum()
            })
            .collect()
    }

    #[test]
    fn test_local_maxima_plateau_midpoint() {
        let x = [0.0, 1.0, 2.0, 2.0, 2.0, 1.0, 0.0, 3.0, 0.0];
        assert_eq!(local_maxima(&x), vec![3, 7]);
    }

    #[test]
    fn test_edges_are_not_peaks() {
        let x = [5.0, 1.0, 0.0, 1.0, 5.0];
        assert!(local_maxima(&x).is_empty());
    }

    #[test]
    fn test_height_filter_inclusive() {
        let x = [0.0, 100.0, 0.0, 99.0, 0.0];
        let peaks = find_peaks(
            &x,
            &PeakDetectionParams {
                min_height: Some(100.0),
                min_distance: None,
            },
        );
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].position, 1);
        assert_eq!(peaks[0].height, 100.0);
    }

    #[test]
    fn test_distance_suppression_keeps_taller() {
        let x = gaussian_trace(100, &[(40.0, 100.0, 2.0), (48.0, 300.0, 2.0), (80.0, 50.0, 2.0)]);
        let peaks = find_peaks(
            &x,
            &PeakDetectionParams {
                min_height: Some(10.0),
                min_distance: Some(10),
            },
        );
        let positions: Vec<usize> = peaks.iter().map(|p| p.position).collect();
        assert_eq!(positions, vec![48, 80]);
    }

    #[test]
    fn test_prominence_and_width() {
        let x = gaussian_trace(200, &[(100.0, 1000.0, 5.0)]);
        let prom = peak_prominence(&x, 100);
        assert!((prom.prominence - 1000.0).abs() < 1e-6);

        let half = peak_width(&x, 100, 0.5);
        // 高斯半高宽 = 2.3548σ
        assert!((half.width - 2.3548 * 5.0).abs() < 0.2, "fwhm {}", half.width);
        assert!(half.left_ip < 100.0 && half.right_ip > 100.0);

        let wide = peak_width(&x, 100, 0.95);
        assert!(wide.width > half.width);
        assert!(wide.start_index() <= wide.left_ip as usize);
        assert!(wide.end_index() as f64 >= wide.right_ip);
    }
}
