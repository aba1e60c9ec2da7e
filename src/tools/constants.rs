//! 常量和默认配置集中管理
//!
//! 将所有重要常量集中定义，避免"默认值漂移"和重复定义

/// 阶梯匹配常量
pub mod ladder_fitting {
    /// 候选峰数量相对参考片段数的余量
    ///
    /// 只保留最高的 refCount + 3 个阶梯峰参与匹配，
    /// 允许少量杂峰（引物峰、拖尾峰）而不让组合搜索膨胀
    pub const PEAK_COUNT_PADDING: usize = 3;

    /// 校准R²低于该值时输出警告
    pub const POOR_CALIBRATION_R2: f64 = 0.99;
}

/// 样本峰分组默认值
pub mod demultiplex {
    /// 默认搜索起点（bp），排除引物峰区域
    pub const SEARCH_PEAKS_START: f64 = 50.0;

    /// 默认样本峰最小高度
    pub const PEAK_HEIGHT: f64 = 500.0;

    /// 默认assay内最小比值
    pub const MIN_RATIO: f64 = 0.15;

    /// 默认assay间距（bp）
    pub const DISTANCE_BETWEEN_ASSAYS: f64 = 15.0;

    /// 峰窗口两端padding（扫描点）
    pub const WINDOW_PADDING: usize = 4;

    /// 峰宽计算的相对高度
    pub const REL_HEIGHT: f64 = 0.95;
}

/// 峰形拟合常量
pub mod curve_fit {
    /// Levenberg–Marquardt 最大迭代次数
    pub const MAX_ITERATIONS: usize = 200;

    /// 残差平方和相对变化收敛阈值
    pub const FTOL: f64 = 1.0e-10;

    /// 参数相对变化收敛阈值
    pub const XTOL: f64 = 1.0e-10;

    /// 初始阻尼系数
    pub const INITIAL_LAMBDA: f64 = 1.0e-3;
}

/// 默认配置值
pub mod defaults {
    /// 默认样本通道
    pub const TRACE_CHANNEL: &str = "DATA1";

    /// 默认阶梯类型
    pub const LADDER: &str = "LIZ";

    /// 默认峰形模型
    pub const PEAK_MODEL: &str = "gauss";

    /// 默认多文件并行并发度
    ///
    /// 用于批量处理多个文件时的并行度，
    /// 4并发度在多数场景下提供良好的性能/资源平衡
    pub const PARALLEL_FILES_DEGREE: usize = 4;

    /// 批量模式峰表文件名
    pub const BATCH_TABLE_NAME: &str = "fragscope_peaks.csv";
}

/// 并发度限制常量
pub mod parallel_limits {
    /// 最小并发度
    ///
    /// 任何并行处理至少需要1个线程/工作单元
    pub const MIN_PARALLEL_DEGREE: usize = 1;

    /// 最大并发度
    ///
    /// 样本计算量小，超过16个线程收益有限
    pub const MAX_PARALLEL_DEGREE: usize = 16;
}
