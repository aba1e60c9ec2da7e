//! 阶梯（size standard）类型表
//!
//! 每种阶梯的参考片段大小、默认通道、检测阈值和校准样条常量集中在一张静态表中，
//! 各组件通过 `LadderKind::spec()` 查询，不在组件内部按阶梯类型分支。

use crate::error::FragmentError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// GeneScan 600 LIZ v2.0 参考片段（bp）
const LIZ_SIZES: &[f64] = &[
    20.0, 40.0, 60.0, 80.0, 100.0, 114.0, 120.0, 140.0, 160.0, 180.0, 200.0, 214.0, 220.0, 240.0,
    250.0, 260.0, 280.0, 300.0, 314.0, 320.0, 340.0, 360.0, 380.0, 400.0, 414.0, 420.0, 440.0,
    460.0, 480.0, 500.0, 514.0, 520.0, 540.0, 560.0, 580.0, 600.0,
];

/// GeneScan 500 ROX 参考片段（bp）
const ROX_SIZES: &[f64] = &[
    35.0, 50.0, 75.0, 100.0, 139.0, 150.0, 160.0, 200.0, 250.0, 300.0, 340.0, 350.0, 400.0, 450.0,
    490.0, 500.0,
];

/// 阶梯类型的全部常量
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LadderSpec {
    /// 参考片段大小（严格递增）
    pub sizes: &'static [f64],
    /// 默认阶梯通道名
    pub channel: &'static str,
    /// 阶梯峰最小高度
    pub min_height: f64,
    /// 阶梯峰最小间距（扫描点）
    pub min_distance: usize,
    /// 相邻被选阶梯峰之间允许的最大扫描距离
    pub max_ladder_trace_distance: usize,
    /// 校准样条阶数
    pub spline_degree: usize,
    /// 校准样条节点数
    pub spline_knots: usize,
}

impl LadderSpec {
    /// 参考片段数量（refCount）
    #[inline]
    pub fn ref_count(&self) -> usize {
        self.sizes.len()
    }
}

static ROX_SPEC: LadderSpec = LadderSpec {
    sizes: ROX_SIZES,
    channel: "DATA4",
    min_height: 200.0,
    min_distance: 30,
    max_ladder_trace_distance: 1000,
    spline_degree: 4,
    spline_knots: 6,
};

static LIZ_SPEC: LadderSpec = LadderSpec {
    sizes: LIZ_SIZES,
    channel: "DATA205",
    min_height: 100.0,
    min_distance: 30,
    max_ladder_trace_distance: 500,
    spline_degree: 3,
    spline_knots: 3,
};

/// 支持的阶梯类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LadderKind {
    /// GeneScan 500 ROX
    #[serde(rename = "ROX")]
    Rox,
    /// GeneScan 600 LIZ
    #[serde(rename = "LIZ")]
    Liz,
}

impl LadderKind {
    /// 查询阶梯常量
    pub fn spec(&self) -> &'static LadderSpec {
        match self {
            Self::Rox => &ROX_SPEC,
            Self::Liz => &LIZ_SPEC,
        }
    }

    /// 阶梯标识名
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rox => "ROX",
            Self::Liz => "LIZ",
        }
    }
}

impl fmt::Display for LadderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LadderKind {
    type Err = FragmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ROX" => Ok(Self::Rox),
            "LIZ" => Ok(Self::Liz),
            _ => Err(FragmentError::InvalidInput(format!(
                "未知阶梯类型 / unknown ladder '{s}'. Options: [ROX, LIZ]"
            ))),
        }
    }
}
