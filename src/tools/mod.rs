//! 工具模块集合
//!
//! 包含CLI、文件扫描、批处理、格式化等工具模块，支持main.rs的流程控制。

pub mod batch_state;
pub mod cli;
pub mod constants;
pub mod formatter;
pub mod parallel_processor;
pub mod processor;
pub mod scanner;
pub mod utils;

// 重新导出主要的公共接口
pub use batch_state::{BatchStatsSnapshot, ParallelBatchStats, SerialBatchStats};
pub use cli::{AppConfig, parse_args, show_completion_info, show_startup_info};
pub use formatter::{
    batch_output_path, render_summary_table, single_output_path, write_json_report,
    write_peak_table,
};
pub use parallel_processor::process_batch_parallel;
pub use processor::{
    BatchArtifacts, BatchEntry, finalize_batch, output_single_result, process_batch_serial,
    process_single_file,
};
pub use scanner::{scan_trace_files, show_scan_results};
pub use utils::path;
