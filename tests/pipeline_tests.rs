//! 单样本流水线集成测试
//!
//! 合成ROX阶梯 + 两个assay的样本通道，验证校准、分组、拟合和商值的端到端结果。


use fragscope::core::PeakModel;
use fragscope::error::FragmentError;
use fragscope::processing::{SampleAnalyzer, SampleConfig, SampleOutcome, SampleReport};
use fragscope::trace::LadderKind;
use trace_fixtures::*;

fn rox_analyzer(model: PeakModel, cutoff: Option<f64>) -> SampleAnalyzer {
    let mut config = SampleConfig::new(LadderKind::Rox);
    config.model = model;
    config.cutoff = cutoff;
    SampleAnalyzer::new(config).expect("配置应该有效")
}

fn analyze_two_assays(analyzer: &SampleAnalyzer) -> SampleReport {
    let input = sample_input("two_assays.csv", two_assay_sample(), rox_ladder());
    match analyzer.analyze(&input).expect("分析应该成功") {
        SampleOutcome::Analyzed(report) => *report,
        SampleOutcome::NoPeaks { .. } => panic!("应该找到样本峰"),
    }
}

#[test]
fn test_end_to_end_two_assays() {
    let report = analyze_two_assays(&rox_analyzer(PeakModel::Gaussian, None));

    log(
        format!("校准R² = {:.6}", report.calibration.r2),
        "calibration R²",
    );
    assert!(report.calibration.r2 > 0.99);
    assert_eq!(report.assignment.times.len(), 16);

    assert_eq!(report.assays.len(), 2);
    let first = &report.assays[0];
    let second = &report.assays[1];
    assert_eq!(first.peaks.len(), 2);
    assert_eq!(second.peaks.len(), 3);
    assert!((first.mean_basepairs - 103.0).abs() < 0.5);
    assert!((second.mean_basepairs - 206.0).abs() < 0.5);

    log(
        format!("商值 / quotients: {:.4}, {:.4}", first.quotient, second.quotient),
        "expected ≈ 1.5 and ≈ 2.667",
    );
    assert!((first.quotient - 1.5).abs() < 0.1);
    assert!((second.quotient - 4000.0 / 1500.0).abs() < 0.15);
}

fn analyze_liz_two_assays(normalize: bool) -> SampleReport {
    let mut config = SampleConfig::new(LadderKind::Liz);
    config.normalize = normalize;
    let analyzer = SampleAnalyzer::new(config).expect("配置应该有效");
    let input = sample_input(
        "liz_two_assays.csv",
        two_assay_sample_with_len(LIZ_TRACE_LEN),
        liz_ladder(),
    );
    match analyzer.analyze(&input).expect("LIZ分析应该成功") {
        SampleOutcome::Analyzed(report) => *report,
        SampleOutcome::NoPeaks { .. } => panic!("应该找到样本峰"),
    }
}

#[test]
fn test_liz_end_to_end_two_assays() {
    let report = analyze_liz_two_assays(false);

    log(
        format!("LIZ校准R² = {:.6}", report.calibration.r2),
        "LIZ calibration R²",
    );
    assert!(report.calibration.r2 > 0.99);
    assert_eq!(report.assignment.times.len(), 36);
    assert_eq!(report.assignment.times.last().copied(), Some(time_of(600.0) as usize));

    assert_eq!(report.assays.len(), 2);
    assert_eq!(report.assays[0].peaks.len(), 2);
    assert_eq!(report.assays[1].peaks.len(), 3);
    assert!((report.assays[0].quotient - 1.5).abs() < 0.1);
    assert!((report.assays[1].quotient - 4000.0 / 1500.0).abs() < 0.15);
}

#[test]
fn test_liz_with_baseline_correction() {
    let report = analyze_liz_two_assays(true);

    log(
        format!(
            "基线校正后商值 / quotients after baseline correction: {:.4}, {:.4}",
            report.assays[0].quotient, report.assays[1].quotient
        ),
        "expected ≈ 1.5 and ≈ 2.667",
    );
    assert!(report.calibration.r2 > 0.99);
    assert_eq!(report.assignment.times.len(), 36);
    assert_eq!(report.assays.len(), 2);
    assert!((report.assays[0].quotient - 1.5).abs() < 0.15);
    assert!((report.assays[1].quotient - 4000.0 / 1500.0).abs() < 0.25);
}

#[test]
fn test_rows_follow_assay_order() {
    let report = analyze_two_assays(&rox_analyzer(PeakModel::Gaussian, None));
    let rows = report.rows();

    assert_eq!(rows.len(), 5);
    assert_eq!(rows[0].peak_name, "Peak 1");
    assert_eq!(rows[0].peak_number, 2);
    assert_eq!(rows[0].assay_number, 1);
    assert_eq!(rows[0].time, 2000);
    assert!((rows[0].basepairs - 100.0).abs() < 0.5);
    assert!((rows[0].peak_height - 2000.0).abs() < 1.0);

    assert_eq!(rows[4].peak_name, "Peak 3");
    assert_eq!(rows[4].peak_number, 3);
    assert_eq!(rows[4].assay_number, 2);
    assert_eq!(rows[4].model, "gaussian");
    assert!(rows.iter().all(|r| r.area > 0.0));
}

#[test]
fn test_analysis_is_idempotent() {
    let analyzer = rox_analyzer(PeakModel::Gaussian, None);
    let first = analyze_two_assays(&analyzer).rows();
    let second = analyze_two_assays(&analyzer).rows();
    assert_eq!(first, second, "同一输入两次分析结果必须一致");
}

#[test]
fn test_cutoff_flips_two_peak_quotient() {
    let report = analyze_two_assays(&rox_analyzer(PeakModel::Gaussian, Some(150.0)));
    let first = &report.assays[0];
    log(
        format!("翻转后商值 / flipped quotient: {:.4}", first.quotient),
        "expected ≈ 0.667",
    );
    assert!((first.quotient - 2000.0 / 3000.0).abs() < 0.05);

    // 3峰assay不受cutoff影响
    assert!((report.assays[1].quotient - 4000.0 / 1500.0).abs() < 0.15);
}

#[test]
fn test_voigt_model_keeps_quotient() {
    let report = analyze_two_assays(&rox_analyzer(PeakModel::Voigt, None));
    assert_eq!(report.model, PeakModel::Voigt);
    let quotient = report.assays[0].quotient;
    assert!(
        (quotient - 1.5).abs() / 1.5 < 0.1,
        "等形峰的面积比应接近高度比: {quotient}"
    );
}

#[test]
fn test_flat_sample_reports_no_peaks() {
    let analyzer = rox_analyzer(PeakModel::Gaussian, None);
    let input = sample_input("flat.csv", flat_sample(), rox_ladder());

    let outcome = analyzer.analyze(&input).unwrap();
    assert!(outcome.is_no_peaks());
    assert_eq!(outcome.file_name(), "flat.csv");
    assert!(outcome.rows().is_empty());
    if let SampleOutcome::NoPeaks { calibration, .. } = outcome {
        assert!(calibration.r2 > 0.99);
    }
}

#[test]
fn test_sparse_ladder_is_insufficient() {
    let analyzer = rox_analyzer(PeakModel::Gaussian, None);
    let input = sample_input("sparse.csv", two_assay_sample(), sparse_ladder());

    let result = analyzer.analyze(&input);
    assert!(matches!(
        result,
        Err(FragmentError::InsufficientPeaks {
            found: 5,
            required: 16
        })
    ));
}

#[test]
fn test_unsupported_model_name() {
    let err = "cauchy".parse::<PeakModel>().unwrap_err();
    assert!(matches!(err, FragmentError::UnsupportedModel { ref name } if name == "cauchy"));
    let message = err.to_string();
    log(&message, "unsupported model message");
    assert!(message.contains("cauchy"));
    assert!(message.contains("gaussian"));
}
