//! 样本级配置
//!
//! 在流水线入口一次性构造并验证，之后以只读引用在各阶段之间传递。

use crate::core::demultiplex::DemultiplexParams;
use crate::core::ladder_assigner::{AssignmentScorer, AssignmentScoring, LadderAssignerConfig};
use crate::core::peak_shape::PeakModel;
use crate::error::{FragmentError, FragmentResult};
use crate::tools::constants::defaults;
use crate::trace::{ChannelSelectors, LadderKind, LadderSpec};
use serde::Serialize;

/// 单个样本的完整分析配置
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleConfig {
    /// 阶梯类型
    pub ladder: LadderKind,
    /// 阶梯常量（可被命令行覆盖检测阈值）
    #[serde(skip)]
    pub ladder_spec: LadderSpec,
    /// 样本通道名
    pub trace_channel: String,
    /// 阶梯通道名
    pub size_standard_channel: String,
    /// 峰形模型
    pub model: PeakModel,
    /// 阶梯匹配评分策略
    pub scoring: AssignmentScoring,
    /// 样本峰分组参数
    pub demultiplex: DemultiplexParams,
    /// 2峰assay的方向翻转阈值（bp）
    pub cutoff: Option<f64>,
    /// 是否先做基线校正
    pub normalize: bool,
}

impl SampleConfig {
    /// 指定阶梯类型的默认配置
    pub fn new(ladder: LadderKind) -> Self {
        let spec = *ladder.spec();
        Self {
            ladder,
            ladder_spec: spec,
            trace_channel: defaults::TRACE_CHANNEL.to_string(),
            size_standard_channel: spec.channel.to_string(),
            model: PeakModel::Gaussian,
            scoring: AssignmentScoring::default(),
            demultiplex: DemultiplexParams::default(),
            cutoff: None,
            normalize: false,
        }
    }

    /// 检查所有标量参数
    pub fn validate(&self) -> FragmentResult<()> {
        let d = &self.demultiplex;
        require_finite("min_ratio", d.min_ratio)?;
        if !(0.0..1.0).contains(&d.min_ratio) {
            return Err(FragmentError::InvalidInput(format!(
                "min_ratio 必须在 [0, 1) 范围内 / min_ratio must be in [0, 1), got {}",
                d.min_ratio
            )));
        }
        require_finite("search_peaks_start", d.search_peaks_start)?;
        require_non_negative("peak_height", d.peak_height)?;
        require_non_negative("distance_between_assays", d.distance_between_assays)?;
        if !(d.rel_height > 0.0 && d.rel_height <= 1.0) {
            return Err(FragmentError::InvalidInput(format!(
                "rel_height 必须在 (0, 1] 范围内 / rel_height must be in (0, 1], got {}",
                d.rel_height
            )));
        }
        if let Some(cutoff) = self.cutoff {
            require_finite("cutoff", cutoff)?;
        }

        let spec = &self.ladder_spec;
        require_non_negative("ladder_min_height", spec.min_height)?;
        if spec.max_ladder_trace_distance == 0 {
            return Err(FragmentError::InvalidInput(
                "max_ladder_trace_distance 必须为正 / max_ladder_trace_distance must be positive"
                    .to_string(),
            ));
        }
        let required = self.scoring.min_sizes();
        if spec.sizes.len() < required {
            return Err(FragmentError::InvalidInput(format!(
                "{} 评分至少需要 {required} 个参考片段，{} 只有 {} 个 / {} scoring requires at least {required} reference sizes, {} has {}",
                self.scoring.strategy_name(),
                self.ladder,
                spec.sizes.len(),
                self.scoring.strategy_name(),
                self.ladder,
                spec.sizes.len(),
            )));
        }
        if spec.sizes.windows(2).any(|w| w[0] >= w[1]) {
            return Err(FragmentError::InvalidInput(format!(
                "{} 参考片段必须严格递增 / reference sizes must be strictly increasing",
                self.ladder
            )));
        }
        if self.trace_channel.trim().is_empty() || self.size_standard_channel.trim().is_empty() {
            return Err(FragmentError::InvalidInput(
                "通道名不能为空 / channel names must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// 通道选择
    pub fn channels(&self) -> ChannelSelectors {
        ChannelSelectors {
            trace_channel: self.trace_channel.clone(),
            size_standard_channel: self.size_standard_channel.clone(),
        }
    }

    /// 阶梯匹配器配置
    pub fn assigner_config(&self) -> LadderAssignerConfig {
        LadderAssignerConfig {
            ref_sizes: self.ladder_spec.sizes.to_vec(),
            min_height: self.ladder_spec.min_height,
            min_distance: self.ladder_spec.min_distance,
            max_ladder_trace_distance: self.ladder_spec.max_ladder_trace_distance,
            scoring: self.scoring,
        }
    }
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self::new(LadderKind::Liz)
    }
}

fn require_finite(name: &str, value: f64) -> FragmentResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(FragmentError::InvalidInput(format!(
            "{name} 必须是有限数值 / {name} must be finite, got {value}"
        )))
    }
}

fn require_non_negative(name: &str, value: f64) -> FragmentResult<()> {
    require_finite(name, value)?;
    if value < 0.0 {
        return Err(FragmentError::InvalidInput(format!(
            "{name} 不能为负 / {name} must not be negative, got {value}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_ladder_table() {
        let config = SampleConfig::new(LadderKind::Rox);
        assert_eq!(config.size_standard_channel, "DATA4");
        assert_eq!(config.ladder_spec.spline_degree, 4);
        assert_eq!(config.assigner_config().ref_sizes.len(), 16);
        assert!(config.validate().is_ok());

        let liz = SampleConfig::default();
        assert_eq!(liz.ladder, LadderKind::Liz);
        assert_eq!(liz.demultiplex.min_ratio, 0.15);
        assert_eq!(liz.cutoff, None);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = SampleConfig::default();
        config.demultiplex.min_ratio = 1.5;
        assert!(matches!(config.validate(), Err(FragmentError::InvalidInput(_))));

        let mut config = SampleConfig::default();
        config.demultiplex.peak_height = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = SampleConfig::default();
        config.cutoff = Some(f64::INFINITY);
        assert!(config.validate().is_err());

        let mut config = SampleConfig::default();
        config.trace_channel = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_spline_scoring_rejected_for_two_sizes() {
        let mut config = SampleConfig::new(LadderKind::Rox);
        config.ladder_spec.sizes = &[100.0, 200.0];
        config.scoring = AssignmentScoring::SplineCurvature;
        match config.validate() {
            Err(FragmentError::InvalidInput(message)) => {
                assert!(message.contains("spline"), "{message}");
            }
            other => panic!("应在处理样本前拒绝: {other:?}"),
        }

        config.scoring = AssignmentScoring::PolynomialResidual;
        assert!(config.validate().is_ok());
    }
}
