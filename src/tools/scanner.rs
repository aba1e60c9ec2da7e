//! 文件扫描模块
//!
//! 负责扫描目录中的轨迹文件，可选递归子目录。

use super::cli::AppConfig;
use super::{formatter, utils};
use crate::error::{FragmentError, FragmentResult};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 扫描目录中扩展名受支持的轨迹文件（按路径排序，跳过本工具的输出文件）
pub fn scan_trace_files(
    dir_path: &Path,
    extensions: &[&str],
    recursive: bool,
) -> FragmentResult<Vec<PathBuf>> {
    if !dir_path.exists() {
        return Err(FragmentError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("目录不存在: {}", dir_path.display()),
        )));
    }

    if !dir_path.is_dir() {
        return Err(FragmentError::InvalidInput(format!(
            "路径不是目录: {}",
            dir_path.display()
        )));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut trace_files: Vec<PathBuf> = WalkDir::new(dir_path)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|path| {
            utils::extension_lowercase(path)
                .is_some_and(|ext| extensions.contains(&ext.as_str()))
        })
        .filter(|path| !formatter::is_output_artifact(path))
        .collect();

    trace_files.sort();

    Ok(trace_files)
}

/// 显示文件扫描结果
pub fn show_scan_results(config: &AppConfig, trace_files: &[PathBuf], extensions: &[&str]) {
    let formats: Vec<String> = extensions.iter().map(|s| s.to_uppercase()).collect();
    if trace_files.is_empty() {
        println!(
            "[WARNING] 在目录 {} 中没有找到轨迹文件 / No trace files found",
            config.input_path.display()
        );
        println!("   支持的格式 / Supported formats: {}", formats.join(", "));
        return;
    }

    println!("[INFO] 扫描目录 / Scanning: {}", config.input_path.display());
    println!("[INFO] 找到 {} 个轨迹文件 / trace files found", trace_files.len());

    if config.verbose {
        for (i, file) in trace_files.iter().enumerate() {
            println!("   {}. {}", i + 1, utils::extract_filename_lossy(file));
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_scan_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.csv"), "DATA1\n1\n").unwrap();
        fs::write(dir.path().join("a.TSV"), "DATA1\n1\n").unwrap();
        fs::write(dir.path().join("notes.md"), "x").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.csv"), "DATA1\n1\n").unwrap();

        let exts = ["csv", "tsv", "txt"];
        let flat = scan_trace_files(dir.path(), &exts, false).unwrap();
        let names: Vec<String> = flat.iter().map(|p| utils::extract_filename_lossy(p)).collect();
        assert_eq!(names, vec!["a.TSV", "b.csv"]);

        let deep = scan_trace_files(dir.path(), &exts, true).unwrap();
        assert_eq!(deep.len(), 3);
    }

    #[test]
    fn test_scan_skips_own_outputs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("s1.csv"), "DATA1\n1\n").unwrap();
        fs::write(dir.path().join("fragscope_peaks.csv"), "file_name\n").unwrap();
        fs::write(dir.path().join("fragscope_peaks_summary.txt"), "summary").unwrap();
        fs::write(dir.path().join("s1_peaks.csv"), "file_name\n").unwrap();

        let files = scan_trace_files(dir.path(), &["csv", "tsv", "txt"], false).unwrap();
        let names: Vec<String> = files.iter().map(|p| utils::extract_filename_lossy(p)).collect();
        assert_eq!(names, vec!["s1.csv"]);
    }

    #[test]
    fn test_scan_missing_directory() {
        let result = scan_trace_files(Path::new("/definitely/not/here"), &["csv"], false);
        assert!(matches!(result, Err(FragmentError::IoError(_))));
    }
}
