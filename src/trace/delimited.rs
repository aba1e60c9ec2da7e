//! 分隔文本轨迹加载器
//!
//! 读取带表头的 CSV/TSV 导出文件：每列一个通道（如 `DATA1`、`DATA105`、`DATA205`），
//! 每行一个扫描时间点。仪器二进制格式的解析不在本模块职责内。

use super::{ChannelSelectors, SampleInput, Trace, TraceSource};
use crate::error::{FragmentError, FragmentResult, format_error};
use crate::tools::utils;
use csv::ReaderBuilder;
use std::path::Path;

/// 分隔文本轨迹数据源
#[derive(Debug, Clone, Copy, Default)]
pub struct DelimitedTraceSource;

impl DelimitedTraceSource {
    pub fn new() -> Self {
        Self
    }

    /// 根据扩展名选择分隔符（csv为逗号，其余为制表符）
    fn delimiter_for(path: &Path) -> u8 {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .as_deref()
        {
            Some("csv") => b',',
            _ => b'\t',
        }
    }

    /// 从任意reader读取两个通道（便于测试）
    pub fn read_channels<R: std::io::Read>(
        reader: R,
        delimiter: u8,
        channels: &ChannelSelectors,
    ) -> FragmentResult<(Trace, Trace)> {
        let mut rdr = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let column_of = |name: &str| -> FragmentResult<usize> {
            headers.iter().position(|h| h == name).ok_or_else(|| {
                FragmentError::FormatError(format!(
                    "缺少通道 / missing channel '{name}' (available: {})",
                    headers.iter().collect::<Vec<_>>().join(", ")
                ))
            })
        };
        let sample_col = column_of(&channels.trace_channel)?;
        let ladder_col = column_of(&channels.size_standard_channel)?;

        let mut sample = Vec::new();
        let mut ladder = Vec::new();
        for (row, record) in rdr.records().enumerate() {
            let record = record?;
            let parse = |col: usize| -> FragmentResult<f64> {
                let raw = record.get(col).unwrap_or("");
                raw.parse::<f64>().map_err(|e| {
                    let line = row + 2;
                    format_error(&format!("第{line}行 / row {line}, 值 '{raw}'"), e)
                })
            };
            sample.push(parse(sample_col)?);
            ladder.push(parse(ladder_col)?);
        }

        if sample.is_empty() {
            return Err(FragmentError::FormatError(
                "轨迹文件没有数据行 / trace file contains no data rows".to_string(),
            ));
        }

        Ok((Trace::new(sample), Trace::new(ladder)))
    }
}

impl TraceSource for DelimitedTraceSource {
    fn load(&self, path: &Path, channels: &ChannelSelectors) -> FragmentResult<SampleInput> {
        let file = std::fs::File::open(path)?;
        let (sample, size_standard) =
            Self::read_channels(file, Self::delimiter_for(path), channels)?;

        tracing::debug!(
            file = %path.display(),
            scans = sample.len(),
            "loaded delimited trace"
        );

        Ok(SampleInput {
            file_name: utils::extract_filename_lossy(path),
            sample,
            size_standard,
        })
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["csv", "tsv", "txt"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selectors() -> ChannelSelectors {
        ChannelSelectors {
            trace_channel: "DATA1".to_string(),
            size_standard_channel: "DATA205".to_string(),
        }
    }

    #[test]
    fn test_read_channels_by_header() {
        let data = "DATA205,DATA1\n1,10\n2,20\n3,30\n";
        let (sample, ladder) =
            DelimitedTraceSource::read_channels(data.as_bytes(), b',', &selectors()).unwrap();
        assert_eq!(sample.intensities(), &[10.0, 20.0, 30.0]);
        assert_eq!(ladder.intensities(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_missing_channel_is_format_error() {
        let data = "DATA1\tDATA4\n1\t2\n";
        let result = DelimitedTraceSource::read_channels(data.as_bytes(), b'\t', &selectors());
        assert!(matches!(result, Err(FragmentError::FormatError(_))));
    }

    #[test]
    fn test_unparseable_value_is_format_error() {
        let data = "DATA1,DATA205\n1,abc\n";
        let result = DelimitedTraceSource::read_channels(data.as_bytes(), b',', &selectors());
        assert!(matches!(result, Err(FragmentError::FormatError(_))));
    }

    #[test]
    fn test_delimiter_by_extension() {
        assert_eq!(DelimitedTraceSource::delimiter_for(Path::new("a.CSV")), b',');
        assert_eq!(DelimitedTraceSource::delimiter_for(Path::new("a.tsv")), b'\t');
        assert_eq!(DelimitedTraceSource::delimiter_for(Path::new("a.txt")), b'\t');
    }
}
