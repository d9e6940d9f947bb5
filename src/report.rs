//! レポート出力
//!
//! HTML生成は common 側（純粋関数）。ここではファイルへの書き出しだけを行う。

use crate::error::Result;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tracing::info;

/// 出力先を決める（ディレクトリ・拡張子なしなら既定ファイル名を付ける）
pub fn output_path_for(output: &Path, generated_at: DateTime<Local>) -> PathBuf {
    if output.is_dir() || output.extension().is_none() {
        output.join(format!(
            "inspection-report-{}.html",
            generated_at.format("%Y-%m-%d")
        ))
    } else {
        output.to_path_buf()
    }
}

/// HTMLをファイルに書き出す
///
/// # Returns
/// 書き出したファイルのパス
pub fn write_report(html: &str, output: &Path, generated_at: DateTime<Local>) -> Result<PathBuf> {
    let path = output_path_for(output, generated_at);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    std::fs::write(&path, html)?;
    info!(path = %path.display(), bytes = html.len(), "レポート出力");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_output_path_for_file() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 10, 0, 0).unwrap();
        assert_eq!(
            output_path_for(Path::new("out/report.html"), at),
            PathBuf::from("out/report.html")
        );
    }

    #[test]
    fn test_output_path_for_directory() {
        let dir = tempfile::tempdir().unwrap();
        let at = Local.with_ymd_and_hms(2024, 3, 9, 10, 0, 0).unwrap();
        assert_eq!(
            output_path_for(dir.path(), at),
            dir.path().join("inspection-report-2024-03-09.html")
        );
    }
}
