//! 单样本分析流水线
//!
//! 阶梯峰检测 → 阶梯匹配 → 校准 → 样本峰分组 → 逐assay峰形拟合 → 商值。
//! 各阶段严格顺序执行；样本之间不共享任何可变状态。

use super::report::{AssayReport, SampleReport};
use super::sample_config::SampleConfig;
use crate::core::calibration::{CalibrationModel, CalibrationScore};
use crate::core::demultiplex::Demultiplexer;
use crate::core::ladder_assigner::LadderAssigner;
use crate::core::peak_fitter::PeakFitter;
use crate::core::quotient;
use crate::error::FragmentResult;
use crate::tools::constants::ladder_fitting;
use crate::trace::{ArplsBaseline, BaselineFilter, SampleInput, TraceSource};
use std::path::Path;

/// 单个样本的分析结果
#[derive(Debug, Clone)]
pub enum SampleOutcome {
    /// 完整分析
    Analyzed(Box<SampleReport>),
    /// 校准成功但没有找到合格的样本峰（不是错误，不产生结果行）
    NoPeaks {
        file_name: String,
        calibration: CalibrationScore,
    },
}

impl SampleOutcome {
    pub fn file_name(&self) -> &str {
        match self {
            Self::Analyzed(report) => &report.file_name,
            Self::NoPeaks { file_name, .. } => file_name,
        }
    }

    #[inline]
    pub fn is_no_peaks(&self) -> bool {
        matches!(self, Self::NoPeaks { .. })
    }

    /// 完整报告（NoPeaks时为None）
    pub fn report(&self) -> Option<&SampleReport> {
        match self {
            Self::Analyzed(report) => Some(report.as_ref()),
            Self::NoPeaks { .. } => None,
        }
    }

    /// 平铺后的结果行
    pub fn rows(&self) -> Vec<super::PeakRow> {
        self.report().map(|r| r.rows()).unwrap_or_default()
    }
}

/// 样本分析器：持有一次性构造的各阶段组件
pub struct SampleAnalyzer {
    config: SampleConfig,
    assigner: LadderAssigner,
    demultiplexer: Demultiplexer,
    fitter: PeakFitter,
    baseline: Option<Box<dyn BaselineFilter>>,
}

impl SampleAnalyzer {
    /// 验证配置并构造各阶段组件
    pub fn new(config: SampleConfig) -> FragmentResult<Self> {
        config.validate()?;
        let baseline: Option<Box<dyn BaselineFilter>> = if config.normalize {
            Some(Box::new(ArplsBaseline::default()))
        } else {
            None
        };
        Ok(Self {
            assigner: LadderAssigner::new(config.assigner_config()),
            demultiplexer: Demultiplexer::new(config.demultiplex),
            fitter: PeakFitter::new(config.model),
            baseline,
            config,
        })
    }

    /// 替换基线滤波器（None表示不做基线校正）
    pub fn with_baseline(mut self, baseline: Option<Box<dyn BaselineFilter>>) -> Self {
        self.baseline = baseline;
        self
    }

    #[inline]
    pub fn config(&self) -> &SampleConfig {
        &self.config
    }

    /// 加载并分析单个文件
    pub fn analyze_file(
        &self,
        source: &dyn TraceSource,
        path: &Path,
    ) -> FragmentResult<SampleOutcome> {
        let input = source.load(path, &self.config.channels())?;
        self.analyze(&input)
    }

    /// 分析已加载的样本
    pub fn analyze(&self, input: &SampleInput) -> FragmentResult<SampleOutcome> {
        let (sample, size_standard) = match &self.baseline {
            Some(filter) => (filter.denoise(&input.sample), filter.denoise(&input.size_standard)),
            None => (input.sample.clone(), input.size_standard.clone()),
        };

        // 1. 阶梯匹配
        let assignment = self.assigner.assign(size_standard.intensities())?;

        // 2. 校准
        let spec = &self.config.ladder_spec;
        let model = CalibrationModel::fit(&assignment, spec.spline_degree, spec.spline_knots)?;
        let calibration = model.score();
        if calibration.r2 < ladder_fitting::POOR_CALIBRATION_R2 {
            tracing::warn!(
                file = %input.file_name,
                r2 = calibration.r2,
                "poor ladder calibration"
            );
        }
        let calibrated = model.calibrate(&sample);

        // 3. 样本峰分组
        let demultiplexed = self.demultiplexer.demultiplex(&calibrated);
        if demultiplexed.is_empty() {
            tracing::warn!(file = %input.file_name, "no peaks found");
            return Ok(SampleOutcome::NoPeaks {
                file_name: input.file_name.clone(),
                calibration,
            });
        }

        // 4. 逐assay拟合与商值
        let mut assays = Vec::with_capacity(demultiplexed.assays.len());
        for (index, assay) in demultiplexed.assays.iter().enumerate() {
            let peaks = self.fitter.fit_assay(&demultiplexed, index)?;
            let quotient = quotient::assay_quotient(&peaks, self.config.cutoff);
            assays.push(AssayReport {
                number: index + 1,
                mean_basepairs: assay.mean_basepairs(),
                quotient,
                peaks,
            });
        }

        tracing::info!(
            file = %input.file_name,
            peaks = demultiplexed.peak_count(),
            assays = assays.len(),
            r2 = calibration.r2,
            "sample analyzed"
        );

        Ok(SampleOutcome::Analyzed(Box::new(SampleReport {
            file_name: input.file_name.clone(),
            ladder: self.config.ladder,
            model: self.config.model,
            assignment,
            calibration,
            calibrated,
            assays,
        })))
    }
}
