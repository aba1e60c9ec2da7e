//! 样本峰检测与assay分组
//!
//! 在校准后的轨迹上（只看 bp > `search_peaks_start` 的部分）检测样本峰，
//! 按相邻峰的bp间距把峰划分为assay，在每个assay内按最高峰计算比值并过滤弱峰，
//! 最后为保留下来的峰和assay重新编号。

use crate::core::calibration::{CalibratedPoint, CalibratedTrace};
use crate::core::peak_detection::{self, PeakDetectionParams, PeakWidth};
use crate::tools::constants::demultiplex as defaults;
use serde::Serialize;

/// 分组参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DemultiplexParams {
    /// 只在 bp 大于该值的区域搜索峰
    pub search_peaks_start: f64,
    /// 样本峰最小高度（含等于）
    pub peak_height: f64,
    /// assay内相对最高峰的最小比值（严格大于）
    pub min_ratio: f64,
    /// 相邻峰bp间距超过该值时开始新的assay
    pub distance_between_assays: f64,
    /// 峰窗口两端额外扩展的点数
    pub padding: usize,
    /// 计算峰宽的相对高度
    pub rel_height: f64,
}

impl Default for DemultiplexParams {
    fn default() -> Self {
        Self {
            search_peaks_start: defaults::SEARCH_PEAKS_START,
            peak_height: defaults::PEAK_HEIGHT,
            min_ratio: defaults::MIN_RATIO,
            distance_between_assays: defaults::DISTANCE_BETWEEN_ASSAYS,
            padding: defaults::WINDOW_PADDING,
            rel_height: defaults::REL_HEIGHT,
        }
    }
}

/// 单个样本峰
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakInfo {
    /// 样本内序号（从1开始，过滤后重新编号）
    pub peak_number: usize,
    /// 在搜索区域中的下标
    pub index: usize,
    /// 扫描时间
    pub time: usize,
    /// bp位置
    pub basepairs: f64,
    /// 峰高
    pub height: f64,
    /// 相对assay内最高峰的比值
    pub ratio: f64,
    /// 所属assay编号（从1开始）
    pub assay: usize,
    /// 峰宽左边界（向下取整，未加padding）
    pub width_start: usize,
    /// 峰宽右边界（向上取整，未加padding）
    pub width_end: usize,
    /// 拟合窗口起点（含padding，闭区间）
    pub start: usize,
    /// 拟合窗口终点（含padding，开区间）
    pub end: usize,
}

/// 一组相邻的样本峰
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assay {
    /// assay编号（从1开始）
    pub number: usize,
    /// 按bp升序排列的峰
    pub peaks: Vec<PeakInfo>,
}

impl Assay {
    /// assay内峰的平均bp位置
    pub fn mean_basepairs(&self) -> f64 {
        if self.peaks.is_empty() {
            return 0.0;
        }
        self.peaks.iter().map(|p| p.basepairs).sum::<f64>() / self.peaks.len() as f64
    }
}

/// 分组结果
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DemultiplexResult {
    /// 搜索区域（bp > search_peaks_start 的校准轨迹）
    pub region: CalibratedTrace,
    /// 按bp升序的assay列表
    pub assays: Vec<Assay>,
}

impl DemultiplexResult {
    /// 样本峰总数
    pub fn peak_count(&self) -> usize {
        self.assays.iter().map(|a| a.peaks.len()).sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.assays.is_empty()
    }

    /// 取出峰的拟合窗口
    pub fn window(&self, peak: &PeakInfo) -> &[CalibratedPoint] {
        let end = peak.end.min(self.region.points.len());
        let start = peak.start.min(end);
        &self.region.points[start..end]
    }
}

/// 样本峰检测 + assay分组
#[derive(Debug, Clone, Copy)]
pub struct Demultiplexer {
    params: DemultiplexParams,
}

impl Demultiplexer {
    pub fn new(params: DemultiplexParams) -> Self {
        Self { params }
    }

    #[inline]
    pub fn params(&self) -> &DemultiplexParams {
        &self.params
    }

    /// 对校准轨迹执行峰检测与分组
    pub fn demultiplex(&self, calibrated: &CalibratedTrace) -> DemultiplexResult {
        let region = calibrated.after_basepairs(self.params.search_peaks_start);
        let intensities = region.intensities();

        let detected = peak_detection::find_peaks(
            &intensities,
            &PeakDetectionParams {
                min_height: Some(self.params.peak_height),
                min_distance: None,
            },
        );

        let mut peaks: Vec<(usize, PeakWidth)> = detected
            .iter()
            .map(|c| {
                (
                    c.position,
                    peak_detection::peak_width(&intensities, c.position, self.params.rel_height),
                )
            })
            .collect();
        peaks.sort_by(|a, b| {
            region.points[a.0]
                .basepairs
                .total_cmp(&region.points[b.0].basepairs)
        });

        let groups = split_by_distance(&region, &peaks, self.params.distance_between_assays);
        let assays = self.build_assays(&region, groups);

        tracing::debug!(
            detected = detected.len(),
            retained = assays.iter().map(|a| a.peaks.len()).sum::<usize>(),
            assays = assays.len(),
            "sample peaks grouped"
        );

        DemultiplexResult { region, assays }
    }

    /// 组内比值过滤、重新编号并生成PeakInfo
    fn build_assays(
        &self,
        region: &CalibratedTrace,
        groups: Vec<Vec<(usize, PeakWidth)>>,
    ) -> Vec<Assay> {
        let len = region.points.len();
        let padding = self.params.padding;
        let mut assays = Vec::new();
        let mut peak_number = 0;

        for group in groups {
            let max_height = group
                .iter()
                .map(|(idx, _)| region.points[*idx].intensity)
                .fold(f64::NEG_INFINITY, f64::max);

            let assay_number = assays.len() + 1;
            let mut kept = Vec::new();
            for (idx, width) in group {
                let point = region.points[idx];
                let ratio = point.intensity / max_height;
                if !(ratio > self.params.min_ratio) {
                    continue;
                }
                peak_number += 1;
                let width_start = width.start_index();
                let width_end = width.end_index();
                kept.push(PeakInfo {
                    peak_number,
                    index: idx,
                    time: point.time,
                    basepairs: point.basepairs,
                    height: point.intensity,
                    ratio,
                    assay: assay_number,
                    width_start,
                    width_end,
                    start: width_start.saturating_sub(padding),
                    end: (width_end + padding).min(len),
                });
            }

            if !kept.is_empty() {
                assays.push(Assay {
                    number: assay_number,
                    peaks: kept,
                });
            }
        }

        assays
    }
}

/// 相邻峰bp间距大于 `distance` 时切分
fn split_by_distance(
    region: &CalibratedTrace,
    peaks: &[(usize, PeakWidth)],
    distance: f64,
) -> Vec<Vec<(usize, PeakWidth)>> {
    let mut groups: Vec<Vec<(usize, PeakWidth)>> = Vec::new();
    let mut previous_bp: Option<f64> = None;

    for &(idx, width) in peaks {
        let bp = region.points[idx].basepairs;
        let new_group = match previous_bp {
            None => true,
            Some(prev) => bp - prev > distance,
        };
        if new_group {
            groups.push(Vec::new());
        }
        if let Some(group) = groups.last_mut() {
            group.push((idx, width));
        }
        previous_bp = Some(bp);
    }

    groups
}
